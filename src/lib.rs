//! invoice_group_notify library: invoice group notification and CSV export
//!
//! When an invoice group is finalized, its customer is emailed a ZIP of every
//! invoice PDF in the group together with a CSV of line-item detail. A
//! per-group ledger guarantees each group is notified at most once, whether
//! the trigger is a batch sweep or a single saved record.
//!
//! The CSV comes from [`export::ExportBuilder`], which streams any
//! [`export::PagedResultSet`] page by page into a quoted, CRLF-terminated
//! document.
//!
//! # Example
//!
//! ```
//! use invoice_group_notify::export::{export_csv, Cell, Column, MemoryResultSet, RawValue, Row};
//!
//! let columns = vec![Column::new("id"), Column::new("amount")];
//! let rows = vec![Row::from_cells(
//!     &columns,
//!     vec![
//!         Cell::raw(RawValue::Integer(1001)),
//!         Cell::new(Some(RawValue::Decimal(10.0)), Some("$10.00".to_string())),
//!     ],
//! )];
//!
//! let report = export_csv(&columns, &MemoryResultSet::new(rows, 1000)).unwrap();
//! assert_eq!(report.document.text(), "\"id\",\"amount\"\r\n\"1001\",\"$10.00\"\r\n");
//! ```
//!
//! # Requirements
//!
//! The notification pipeline requires a Tokio runtime.

pub mod config;
mod error_handling;
pub mod export;
pub mod fixture;
pub mod initialization;
pub mod notify;
mod storage;

// Re-export public API
pub use config::{Command, Config, LogFormat, LogLevel, Opt, QuoteStyle};
pub use error_handling::{
    DatabaseError, ExportError, InitializationError, OutcomeType, PipelineError, ProcessingStats,
    Stage, WarningType,
};
pub use notify::{Collaborators, NotificationOutcome, Notifier, SweepReport};
pub use run::{run_command, RunReport};
pub use storage::{run_migrations, Claim, NotificationLedger, NotificationState};

// Command dispatch shared by the binary and integration tests
mod run {
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    use anyhow::{Context, Result};
    use log::info;
    use tokio::io::AsyncWriteExt;

    use crate::config::{Command, Config, Opt};
    use crate::export::ExportReport;
    use crate::fixture::{FixtureBackend, OutboxMailer};
    use crate::initialization::init_ledger;
    use crate::notify::{GroupId, NotificationOutcome, Notifier, SweepReport};

    /// What a command produced.
    #[derive(Debug)]
    pub enum RunReport {
        /// Batch sweep over every finalized group
        Sweep(SweepReport),
        /// Single-group trigger
        Notify(NotificationOutcome),
        /// Detail CSV written without sending anything
        Export {
            group_id: GroupId,
            rows_written: usize,
            warnings: usize,
            /// `None` when written to stdout
            output: Option<PathBuf>,
        },
    }

    /// Runs the command in `opt` against its fixture and outbox.
    ///
    /// # Errors
    ///
    /// Returns an error if the fixture, the ledger or an export output cannot
    /// be opened, or a sweep cannot list its groups. A group that fails to
    /// send is reported in the [`RunReport`], not as an error.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use clap::Parser;
    /// use invoice_group_notify::{run_command, Opt};
    ///
    /// # async fn example() -> anyhow::Result<()> {
    /// let opt = Opt::parse_from(["invoice_group_notify", "--fixture", "data.json", "sweep"]);
    /// let report = run_command(&opt).await?;
    /// println!("{:?}", report);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run_command(opt: &Opt) -> Result<RunReport> {
        let config = Config::from(opt);
        let backend = Arc::new(FixtureBackend::load(&opt.fixture).await?);
        let mailer = Arc::new(OutboxMailer::new(&opt.outbox));
        let ledger = init_ledger(&config.db_path)
            .await
            .with_context(|| format!("Failed to open ledger {}", config.db_path.display()))?;
        let notifier = Notifier::new(config, backend.collaborators(mailer), ledger);

        match &opt.command {
            Command::Sweep => {
                // Claims older than the lease were abandoned by a crashed run.
                let lease = Duration::from_secs(notifier.config().claim_timeout_secs);
                notifier
                    .ledger()
                    .requeue_interrupted(lease)
                    .await
                    .context("Failed to requeue interrupted notifications")?;
                Ok(RunReport::Sweep(notifier.sweep().await?))
            }
            Command::Notify { group_id } => {
                let outcome = notifier.notify(*group_id).await;
                Ok(RunReport::Notify(outcome))
            }
            Command::Export { group_id, output } => {
                let report = notifier.export_details(*group_id).await?;
                write_export(&report, output.as_ref()).await?;
                info!(
                    "Exported {} rows for invoice group {} ({} warnings)",
                    report.rows_written,
                    group_id,
                    report.warnings.len()
                );
                Ok(RunReport::Export {
                    group_id: *group_id,
                    rows_written: report.rows_written,
                    warnings: report.warnings.len(),
                    output: output.clone(),
                })
            }
        }
    }

    async fn write_export(report: &ExportReport, output: Option<&PathBuf>) -> Result<()> {
        match output {
            Some(path) => tokio::fs::write(path, report.document.content())
                .await
                .with_context(|| format!("Failed to write {}", path.display())),
            None => {
                let mut stdout = tokio::io::stdout();
                stdout
                    .write_all(report.document.content())
                    .await
                    .context("Failed to write export to stdout")?;
                stdout.flush().await.context("Failed to flush stdout")
            }
        }
    }
}
