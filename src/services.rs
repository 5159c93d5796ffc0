pub mod audit_service;
pub mod auth;
pub mod ledger;
pub mod loss_service;
pub mod parser_service;
pub mod report_service;
pub mod transaction_service;

pub use audit_service::AuditLogger;
pub use auth::AuthService;
pub use ledger::InventoryLedger;
pub use loss_service::LossRecorder;
pub use parser_service::{DraftParser, FallbackDraftParser};
pub use report_service::ReportService;
pub use transaction_service::TransactionEngine;
