//! # docreq-core
//!
//! Core types, traits, and configuration for the docreq document-request
//! workflow.
//!
//! This crate provides the data model (transactions and notifications), the
//! error type every layer reports through, and the trait seams to the record
//! stores, object store, and mail sender that other docreq crates implement.
//!
//! ## Logging
//!
//! Every crate logs through `tracing` with the same structured fields:
//! `subsystem`, `component`, `op`, then `transaction_id`, `notification_id`
//! and `file_key` where known, plus `duration_ms`, `size_bytes`,
//! `result_count` and `error`. Partially-failed workflows are reconciled by
//! querying logs for a transaction or notification id.
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | State left inconsistent across stores, needs operator reconciliation |
//! | WARN  | Accepted partial failure (best-effort step failed) |
//! | INFO  | Lifecycle events, completed state transitions |
//! | DEBUG | Store, blob and mail calls |

pub mod config;
pub mod defaults;
pub mod error;
pub mod file_safety;
pub mod ids;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use config::{ConfigError, WorkflowConfig};
pub use error::{Error, ErrorKind, Result};
pub use file_safety::sanitize_filename;
pub use ids::{new_upload_token, new_v7};
pub use models::*;
pub use traits::*;
