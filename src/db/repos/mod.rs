pub mod column;
pub mod issue;
pub mod project;
