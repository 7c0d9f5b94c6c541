use diesel::r2d2::{ConnectionManager, PoolError};
use diesel::PgConnection;
use r2d2::Pool;

use crate::db::store::PgStore;
use crate::engine::{EngineResult, StoreProvider};

pub type PgPool = Pool<ConnectionManager<PgConnection>>;

pub fn init_pool(database_url: &str, max_size: u32) -> Result<PgPool, PoolError> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    Pool::builder().max_size(max_size).build(manager)
}

impl StoreProvider for PgPool {
    type Store = PgStore;

    fn checkout(&self) -> EngineResult<PgStore> {
        Ok(PgStore::new(self.get()?))
    }
}
