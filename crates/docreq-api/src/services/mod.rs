//! Workflow services.
//!
//! Handlers stay thin and call into these; every state transition of a
//! transaction or notification happens here.

pub mod notification_service;
pub mod transaction_service;

pub use notification_service::NotificationService;
pub use transaction_service::TransactionService;
