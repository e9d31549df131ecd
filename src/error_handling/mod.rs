//! Error handling and processing statistics.
//!
//! This module provides:
//! - Error type definitions for exports, the pipeline and the ledger
//! - Pipeline stage and outcome kinds
//! - Processing statistics tracking (outcomes, stage failures, warnings)

mod stats;
mod types;

// Re-export public API
pub use stats::ProcessingStats;
pub use types::{
    DatabaseError, ExportError, InitializationError, OutcomeType, PipelineError, Stage,
    WarningType,
};
