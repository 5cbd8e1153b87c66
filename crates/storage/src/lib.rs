pub mod db;
pub mod error;
pub mod memory;
pub mod store;

pub use db::{create_db, DbPool, SqliteStore};
pub use error::StoreError;
pub use memory::{FailurePlan, MemoryStore};
pub use store::{CategoryCatalog, RuleStore, TransactionStore};
