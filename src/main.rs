//! Main application entry point (CLI binary).
//!
//! This is a thin wrapper around the `invoice_group_notify` library that handles:
//! - Command-line argument parsing
//! - Logger initialization
//! - User-facing output formatting
//!
//! All core functionality is implemented in the library crate.

use anyhow::{Context, Result};
use clap::Parser;
use std::process;

use invoice_group_notify::initialization::init_logger_with;
use invoice_group_notify::{run_command, NotificationOutcome, Opt, RunReport};

#[tokio::main]
async fn main() -> Result<()> {
    let opt = Opt::parse();

    init_logger_with(opt.log_level.clone().into(), opt.log_format.clone())
        .context("Failed to initialize logger")?;

    match run_command(&opt).await {
        Ok(RunReport::Sweep(report)) => {
            println!(
                "✅ Swept {} invoice group{} ({} sent, {} skipped, {} already notified, {} failed) in {:.1}s",
                report.total,
                if report.total == 1 { "" } else { "s" },
                report.sent,
                report.skipped,
                report.already_notified,
                report.failed,
                report.elapsed_seconds
            );
            if report.failed > 0 {
                eprintln!("Failed groups: {:?}", report.failed_groups());
                process::exit(1);
            }
            Ok(())
        }
        Ok(RunReport::Notify(outcome)) => match outcome {
            NotificationOutcome::Sent {
                group_id,
                recipients,
                attachment_bytes,
                ..
            } => {
                println!(
                    "✅ Invoice group {} sent to {} recipient{} ({} bytes attached)",
                    group_id,
                    recipients,
                    if recipients == 1 { "" } else { "s" },
                    attachment_bytes
                );
                Ok(())
            }
            NotificationOutcome::Skipped { group_id, reason } => {
                println!("Invoice group {} not sent: {}", group_id, reason);
                Ok(())
            }
            NotificationOutcome::AlreadyNotified { group_id } => {
                println!("Invoice group {} was already notified", group_id);
                Ok(())
            }
            NotificationOutcome::Failed {
                group_id,
                stage,
                message,
            } => {
                eprintln!(
                    "invoice_group_notify error: {} stage failed for invoice group {}: {}",
                    stage, group_id, message
                );
                process::exit(1);
            }
        },
        Ok(RunReport::Export {
            group_id,
            rows_written,
            warnings,
            output,
        }) => {
            if let Some(path) = output {
                println!(
                    "✅ Exported {} rows for invoice group {} to {} ({} warnings)",
                    rows_written,
                    group_id,
                    path.display(),
                    warnings
                );
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("invoice_group_notify error: {:#}", e);
            process::exit(1);
        }
    }
}
