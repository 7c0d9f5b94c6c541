pub mod connection;
pub mod memory;
pub mod models;
pub mod repos;
pub mod schema;
pub mod store;

use crate::engine::EngineError;

impl From<diesel::result::Error> for EngineError {
    fn from(err: diesel::result::Error) -> Self {
        EngineError::Storage(err.to_string())
    }
}

impl From<r2d2::Error> for EngineError {
    fn from(err: r2d2::Error) -> Self {
        EngineError::Storage(format!("connection pool: {}", err))
    }
}
