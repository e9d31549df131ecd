//! The staged notification pipeline for a single invoice group.
//!
//! validate -> claim -> fetch related -> attach -> send -> mark sent
//!
//! Each stage returns a `Result`. The first failure becomes a `Failed`
//! outcome; a group that was claimed but not sent goes back to `pending`,
//! and one that was sent but not recorded is parked as unconfirmed.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use log::{debug, error, info, warn};
use tokio_retry::strategy::ExponentialBackoff;
use tokio_retry::Retry;

use crate::config::{Config, RETRY_BASE, RETRY_MAX_DELAY_SECS, RETRY_UNIT_MS};
use crate::error_handling::{
    OutcomeType, PipelineError, ProcessingStats, Stage, WarningType,
};
use crate::export::{ExportBuilder, ExportReport};
use crate::storage::{Claim, NotificationLedger};

use super::attachments::{check_total_size, render_invoice_archive};
use super::collaborators::{CustomerDirectory, DetailSource, InvoiceGroupSource, InvoiceRenderer, Mailer};
use super::message::compose_message;
use super::types::{GroupId, InvoiceGroup, OutgoingMessage, SkipReason};

/// The external systems the pipeline talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub groups: Arc<dyn InvoiceGroupSource>,
    pub customers: Arc<dyn CustomerDirectory>,
    pub renderer: Arc<dyn InvoiceRenderer>,
    pub details: Arc<dyn DetailSource>,
    pub mailer: Arc<dyn Mailer>,
}

/// What happened to one group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NotificationOutcome {
    Sent {
        group_id: GroupId,
        recipients: usize,
        attachment_bytes: usize,
        /// Detail cells written as `null`
        export_warnings: usize,
    },
    Skipped {
        group_id: GroupId,
        reason: SkipReason,
    },
    AlreadyNotified {
        group_id: GroupId,
    },
    Failed {
        group_id: GroupId,
        stage: Stage,
        message: String,
    },
}

impl NotificationOutcome {
    pub fn kind(&self) -> OutcomeType {
        match self {
            NotificationOutcome::Sent { .. } => OutcomeType::Sent,
            NotificationOutcome::Skipped { .. } => OutcomeType::Skipped,
            NotificationOutcome::AlreadyNotified { .. } => OutcomeType::AlreadyNotified,
            NotificationOutcome::Failed { .. } => OutcomeType::Failed,
        }
    }

    pub fn group_id(&self) -> GroupId {
        match self {
            NotificationOutcome::Sent { group_id, .. }
            | NotificationOutcome::Skipped { group_id, .. }
            | NotificationOutcome::AlreadyNotified { group_id }
            | NotificationOutcome::Failed { group_id, .. } => *group_id,
        }
    }
}

/// Drives invoice groups through the pipeline.
///
/// Cheap to clone; clones share the ledger, statistics and the set of groups
/// currently being processed.
#[derive(Clone)]
pub struct Notifier {
    pub(super) config: Arc<Config>,
    pub(super) collaborators: Collaborators,
    pub(super) ledger: NotificationLedger,
    pub(super) stats: Arc<ProcessingStats>,
    in_flight: Arc<Mutex<HashSet<GroupId>>>,
}

/// Removes a group from the in-flight set when dropped.
struct InFlightGuard {
    set: Arc<Mutex<HashSet<GroupId>>>,
    group_id: GroupId,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Ok(mut set) = self.set.lock() {
            set.remove(&self.group_id);
        }
    }
}

/// Outcome of the checks before a group is claimed.
enum Validated {
    Ready {
        group: InvoiceGroup,
        recipients: Vec<String>,
    },
    Skip(SkipReason),
}

impl Notifier {
    pub fn new(config: Config, collaborators: Collaborators, ledger: NotificationLedger) -> Self {
        Self {
            config: Arc::new(config),
            collaborators,
            ledger,
            stats: Arc::new(ProcessingStats::new()),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn stats(&self) -> &ProcessingStats {
        &self.stats
    }

    pub fn ledger(&self) -> &NotificationLedger {
        &self.ledger
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Notifies one group, as after the group record is saved.
    ///
    /// Never returns an error: every failure is reported as
    /// [`NotificationOutcome::Failed`] with the stage that failed.
    pub async fn notify(&self, group_id: GroupId) -> NotificationOutcome {
        let outcome = match self.enter(group_id) {
            Some(_guard) => match self.run_stages(group_id).await {
                Ok(outcome) => outcome,
                Err(err) => self.fail(err).await,
            },
            None => {
                debug!("Invoice group {} is already being processed", group_id);
                NotificationOutcome::Skipped {
                    group_id,
                    reason: SkipReason::InProgress,
                }
            }
        };

        self.stats.increment_outcome(outcome.kind());
        outcome
    }

    fn enter(&self, group_id: GroupId) -> Option<InFlightGuard> {
        let mut set = match self.in_flight.lock() {
            Ok(set) => set,
            Err(poisoned) => poisoned.into_inner(),
        };
        set.insert(group_id).then(|| InFlightGuard {
            set: Arc::clone(&self.in_flight),
            group_id,
        })
    }

    async fn run_stages(&self, group_id: GroupId) -> Result<NotificationOutcome, PipelineError> {
        if self
            .ledger
            .is_sent(group_id)
            .await
            .map_err(|e| PipelineError::new(Stage::Validate, group_id, e))?
        {
            debug!("Invoice group {} was already notified", group_id);
            return Ok(NotificationOutcome::AlreadyNotified { group_id });
        }

        let (group, recipients) = match self.validate(group_id).await? {
            Validated::Ready { group, recipients } => (group, recipients),
            Validated::Skip(reason) => {
                if reason == SkipReason::NoRecipients {
                    error!(
                        "Invoice group {} not sent: {}",
                        group_id, reason
                    );
                } else {
                    info!("Invoice group {} not sent: {}", group_id, reason);
                }
                return Ok(NotificationOutcome::Skipped { group_id, reason });
            }
        };

        match self
            .ledger
            .claim(group_id)
            .await
            .map_err(|e| PipelineError::new(Stage::Validate, group_id, e))?
        {
            Claim::Claimed => {}
            Claim::AlreadySent => return Ok(NotificationOutcome::AlreadyNotified { group_id }),
            Claim::InProgress => {
                return Ok(NotificationOutcome::Skipped {
                    group_id,
                    reason: SkipReason::InProgress,
                })
            }
        }

        info!(
            "Sending invoice group {} ({}) to {} recipients",
            group_id,
            group.number,
            recipients.len()
        );
        self.deliver(&group, recipients).await
    }

    async fn validate(&self, group_id: GroupId) -> Result<Validated, PipelineError> {
        let stage_err = |e: anyhow::Error| PipelineError::new(Stage::Validate, group_id, e);

        let group = self
            .collaborators
            .groups
            .load_group(group_id)
            .await
            .context("Failed to load invoice group")
            .map_err(stage_err)?;
        if !group.finalized {
            return Ok(Validated::Skip(SkipReason::NotFinalized));
        }

        let customer = self
            .collaborators
            .customers
            .lookup(group.customer_id)
            .await
            .with_context(|| format!("Failed to look up customer {}", group.customer_id))
            .map_err(stage_err)?;
        let Some(customer) = customer else {
            return Ok(Validated::Skip(SkipReason::UnknownCustomer));
        };

        let recipients = customer.recipients();
        if recipients.is_empty() {
            return Ok(Validated::Skip(SkipReason::NoRecipients));
        }

        Ok(Validated::Ready { group, recipients })
    }

    /// Runs the stages after a successful claim. The claim is held until
    /// `mark_sent`, or released by `fail`.
    async fn deliver(
        &self,
        group: &InvoiceGroup,
        recipients: Vec<String>,
    ) -> Result<NotificationOutcome, PipelineError> {
        let group_id = group.id;
        let config = &self.config;

        let invoice_ids = self
            .collaborators
            .groups
            .grouped_invoices(group_id)
            .await
            .map_err(|e| PipelineError::new(Stage::FetchRelated, group_id, e))?;
        debug!(
            "Invoice group {} contains {} invoices",
            group_id,
            invoice_ids.len()
        );

        let message = compose_message(group, &config.signature);

        let archive = render_invoice_archive(self.collaborators.renderer.as_ref(), &invoice_ids)
            .await
            .map_err(|e| PipelineError::new(Stage::Attach, group_id, e))?;

        let attach_err = |e: anyhow::Error| PipelineError::new(Stage::Attach, group_id, e);
        let export = self.export_details(group_id).await.map_err(attach_err)?;
        let export_warnings = export.warnings.len();
        self.stats
            .add_warnings(WarningType::CellRenderFailure, export_warnings);

        let attachments = vec![archive, export.document.into()];
        let attachment_bytes = check_total_size(&attachments, config.max_attachment_bytes)
            .map_err(attach_err)?;

        let outgoing = OutgoingMessage {
            author_id: config.author_id,
            recipients,
            subject: message.subject,
            body: message.body,
            attachments,
            related_group: group_id,
        };
        self.send_with_retry(&outgoing)
            .await
            .map_err(|e| PipelineError::new(Stage::Send, group_id, e))?;

        let marked = self
            .ledger
            .mark_sent(group_id)
            .await
            .map_err(|e| PipelineError::new(Stage::MarkSent, group_id, e))?;
        if !marked {
            warn!(
                "Invoice group {} was sent but its claim had already been released",
                group_id
            );
        }

        info!("Invoice group email sent for group {}", group_id);
        Ok(NotificationOutcome::Sent {
            group_id,
            recipients: outgoing.recipients.len(),
            attachment_bytes,
            export_warnings,
        })
    }

    /// Runs the configured detail query for `group_id` and exports it as CSV.
    pub async fn export_details(&self, group_id: GroupId) -> anyhow::Result<ExportReport> {
        let config = &self.config;
        let columns = self
            .collaborators
            .details
            .columns(&config.details_query)
            .await
            .with_context(|| format!("Failed to load columns of query {}", config.details_query))?;
        let rows = self
            .collaborators
            .details
            .run(&config.details_query, group_id, config.page_size)
            .await
            .with_context(|| format!("Failed to run query {}", config.details_query))?;
        let report = ExportBuilder::default()
            .quote_style(config.quote_style)
            .build(&columns, &*rows)?;
        Ok(report)
    }

    async fn send_with_retry(&self, message: &OutgoingMessage) -> anyhow::Result<()> {
        let strategy = ExponentialBackoff::from_millis(RETRY_BASE)
            .factor(RETRY_UNIT_MS)
            .max_delay(Duration::from_secs(RETRY_MAX_DELAY_SECS))
            .take(self.config.send_retries);

        let attempts = AtomicUsize::new(0);
        let attempts = &attempts;
        let stats = self.stats.as_ref();
        let mailer = self.collaborators.mailer.as_ref();
        Retry::spawn(strategy, move || async move {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst);
            if attempt > 0 {
                stats.add_warnings(WarningType::SendRetried, 1);
            }
            mailer.send(message).await.map_err(|e| {
                warn!(
                    "Send attempt {} for invoice group {} failed: {:#}",
                    attempt + 1,
                    message.related_group,
                    e
                );
                e
            })
        })
        .await
    }

    /// Records a stage failure. A claimed group that was not mailed returns to
    /// `pending`; one that was mailed becomes delivered-unconfirmed.
    async fn fail(&self, err: PipelineError) -> NotificationOutcome {
        error!("{}", err);
        self.stats.increment_failure(err.stage);

        let reason = format!("{}: {:#}", err.stage, err.source);
        match err.stage {
            Stage::FetchRelated | Stage::Attach | Stage::Send => {
                if let Err(e) = self.ledger.release(err.group_id, &reason).await {
                    error!(
                        "Failed to release invoice group {} after {} failure: {}",
                        err.group_id, err.stage, e
                    );
                }
            }
            // The mail went out; park the group where no trigger sends it again.
            Stage::MarkSent => {
                if let Err(e) = self.ledger.mark_unconfirmed(err.group_id, &reason).await {
                    error!(
                        "Invoice group {} was sent but could not be parked as unconfirmed: {}",
                        err.group_id, e
                    );
                }
            }
            Stage::Validate => {}
        }

        NotificationOutcome::Failed {
            group_id: err.group_id,
            stage: err.stage,
            message: format!("{:#}", err.source),
        }
    }
}
