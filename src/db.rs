pub mod store;
pub use store::{finish, AuditSink, Store, UnitOfWork};
pub mod user_repo;
pub use user_repo::UserRepository;
pub mod inventory_repo;
pub use inventory_repo::InventoryRepository;
pub mod loss_repo;
pub use loss_repo::LossRepository;
pub mod transaction_repo;
pub use transaction_repo::TransactionRepository;
pub mod audit_repo;
pub use audit_repo::AuditRepository;

pub mod postgres;
pub use postgres::PgStore;

pub mod memory;
pub use memory::{MemoryAuditSink, MemoryStore};
