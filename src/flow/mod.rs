//! Flow accounting: report decoding, counter accumulation and quota enforcement.

use sea_orm::DbErr;

pub mod ledger;
pub mod pipeline;
pub mod quota;
pub mod report;

pub use ledger::{FlowDelta, FlowLedger, LedgerEntry};
pub use pipeline::{FlowIngestService, IngestOutcome};
pub use report::{FlowReport, IgnoreReason, ParseOutcome, parse_report};

#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    #[error("Forward not found: {0}")]
    ForwardNotFound(i64),
}
