//! Batch sweep over every finalized group that has not been notified.

use std::time::Instant;

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use log::info;

use super::pipeline::{NotificationOutcome, Notifier};
use super::types::GroupId;

/// Results of one sweep.
#[derive(Debug, Clone)]
pub struct SweepReport {
    /// Groups attempted
    pub total: usize,
    /// Groups registered in the ledger for the first time by this sweep
    pub newly_registered: usize,
    pub sent: usize,
    pub skipped: usize,
    pub already_notified: usize,
    pub failed: usize,
    pub elapsed_seconds: f64,
    /// Per-group outcomes, ordered by group id
    pub outcomes: Vec<NotificationOutcome>,
}

impl SweepReport {
    fn from_outcomes(
        mut outcomes: Vec<NotificationOutcome>,
        newly_registered: usize,
        elapsed_seconds: f64,
    ) -> Self {
        outcomes.sort_by_key(NotificationOutcome::group_id);
        let count = |pred: fn(&NotificationOutcome) -> bool| outcomes.iter().filter(|o| pred(o)).count();
        Self {
            total: outcomes.len(),
            newly_registered,
            sent: count(|o| matches!(o, NotificationOutcome::Sent { .. })),
            skipped: count(|o| matches!(o, NotificationOutcome::Skipped { .. })),
            already_notified: count(|o| matches!(o, NotificationOutcome::AlreadyNotified { .. })),
            failed: count(|o| matches!(o, NotificationOutcome::Failed { .. })),
            elapsed_seconds,
            outcomes,
        }
    }

    pub fn failed_groups(&self) -> Vec<GroupId> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, NotificationOutcome::Failed { .. }))
            .map(NotificationOutcome::group_id)
            .collect()
    }
}

impl Notifier {
    /// Registers every finalized group in the ledger, then notifies each
    /// pending one, up to `max_concurrency` at a time.
    ///
    /// # Errors
    ///
    /// Fails only if the finalized groups or the ledger cannot be read.
    /// Per-group failures are reported in the returned [`SweepReport`].
    pub async fn sweep(&self) -> Result<SweepReport> {
        let start = Instant::now();

        let finalized = self
            .collaborators
            .groups
            .finalized_groups()
            .await
            .context("Failed to list finalized invoice groups")?;
        let mut newly_registered = 0;
        for group_id in finalized {
            if self
                .ledger
                .register(group_id)
                .await
                .context("Failed to register invoice group")?
            {
                newly_registered += 1;
            }
        }

        let pending = self
            .ledger
            .pending()
            .await
            .context("Failed to read pending invoice groups")?;
        info!(
            "Sweeping {} pending invoice groups ({} newly registered)",
            pending.len(),
            newly_registered
        );

        let concurrency = self.config.max_concurrency.max(1);
        let outcomes: Vec<NotificationOutcome> = stream::iter(pending)
            .map(|group_id| self.notify(group_id))
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let report = SweepReport::from_outcomes(
            outcomes,
            newly_registered,
            start.elapsed().as_secs_f64(),
        );
        info!(
            "Sweep finished in {:.1}s: {} sent, {} skipped, {} already notified, {} failed",
            report.elapsed_seconds,
            report.sent,
            report.skipped,
            report.already_notified,
            report.failed
        );
        self.stats.log_summary();

        Ok(report)
    }
}
