//! Error type definitions.
//!
//! This module defines the error taxonomy for exports, the notification
//! pipeline, the ledger database and initialization, plus the outcome and
//! warning kinds counted by `ProcessingStats`.

use log::SetLoggerError;
use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),
}

/// Error types for ledger database operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error creating the database file.
    #[error("Database file creation error: {0}")]
    FileCreationError(String),

    /// SQL execution error.
    #[error("SQL error: {0}")]
    SqlError(#[from] sqlx::Error),

    /// Schema migration error.
    #[error("Migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    /// A group id that does not fit the ledger's signed 64-bit key.
    #[error("Invoice group id {0} is out of range for the ledger")]
    GroupIdOutOfRange(i128),
}

/// Fatal export failures.
///
/// Cell-level failures are not errors: they are rendered as `null` and
/// reported as warnings on the finished export.
#[derive(Error, Debug)]
pub enum ExportError {
    /// No columns were declared.
    #[error("Export requires at least one column")]
    EmptyColumns,

    /// The result set's page count disagrees with its row count and page size.
    #[error(
        "Result set declares {declared} pages but {total_rows} rows at page size {page_size} need {expected}"
    )]
    PageCountMismatch {
        /// Page count reported by the result set
        declared: usize,
        /// Page count implied by the row count
        expected: usize,
        /// Total rows reported by the result set
        total_rows: usize,
        /// Page size reported by the result set
        page_size: usize,
    },

    /// A page could not be fetched. Pages before `page_index` were written.
    #[error(
        "Failed to fetch page {page_index} (rows {first_row}-{last_row}) after {pages_processed} pages and {rows_written} rows: {source}"
    )]
    PageFetch {
        /// Page that failed
        page_index: usize,
        /// Pages fully written before the failure
        pages_processed: usize,
        /// Data rows written before the failure
        rows_written: usize,
        /// First row (zero-based) of the failed page
        first_row: usize,
        /// Last row (zero-based, inclusive) of the failed page
        last_row: usize,
        /// Underlying cause reported by the result set
        #[source]
        source: anyhow::Error,
    },

    /// A page held a different number of rows than its position implies.
    #[error(
        "Page {page_index} returned {actual} rows but {expected} were expected after {rows_written} rows"
    )]
    PageRowCount {
        page_index: usize,
        /// Rows implied by the total row count and page size
        expected: usize,
        /// Rows the page actually held
        actual: usize,
        /// Data rows written before the short or long page
        rows_written: usize,
    },

    /// The standard CSV writer failed.
    #[error("CSV write error: {0}")]
    Write(#[from] csv::Error),
}

/// Stages a single invoice group moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum Stage {
    /// Group is finalized and the customer has recipients
    Validate,
    /// Load the grouped invoices
    FetchRelated,
    /// Render PDFs, archive them and export the detail CSV
    Attach,
    /// Hand the message to the mailer
    Send,
    /// Persist the notified flag
    MarkSent,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Validate => "validate",
            Stage::FetchRelated => "fetch related",
            Stage::Attach => "attach",
            Stage::Send => "send",
            Stage::MarkSent => "mark sent",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stage failure for one invoice group.
#[derive(Error, Debug)]
#[error("{stage} stage failed for invoice group {group_id}: {source:#}")]
pub struct PipelineError {
    /// Stage that failed
    pub stage: Stage,
    /// Invoice group being processed
    pub group_id: u64,
    /// Underlying cause
    #[source]
    pub source: anyhow::Error,
}

impl PipelineError {
    pub fn new(stage: Stage, group_id: u64, source: impl Into<anyhow::Error>) -> Self {
        Self {
            stage,
            group_id,
            source: source.into(),
        }
    }
}

/// Final disposition of a notification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum OutcomeType {
    Sent,
    Skipped,
    AlreadyNotified,
    Failed,
}

/// Recoverable issues that do not stop a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum WarningType {
    /// A detail cell could not be read and was written as `null`
    CellRenderFailure,
    /// A send attempt failed and was retried
    SendRetried,
}

impl std::fmt::Display for OutcomeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            OutcomeType::Sent => "sent",
            OutcomeType::Skipped => "skipped",
            OutcomeType::AlreadyNotified => "already notified",
            OutcomeType::Failed => "failed",
        })
    }
}
