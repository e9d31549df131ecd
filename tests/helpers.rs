// Shared test helpers: in-memory ledger, fixture data and a recording mailer.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use invoice_group_notify::fixture::{FixtureBackend, FixtureData};
use invoice_group_notify::notify::{Mailer, OutgoingMessage};
use invoice_group_notify::{run_migrations, Config, NotificationLedger, Notifier};

/// Creates a ledger on an in-memory database with migrations applied.
/// A single connection keeps every query on the same database.
#[allow(dead_code)]
pub async fn create_test_ledger() -> NotificationLedger {
    create_test_ledger_with_pool().await.0
}

/// Like `create_test_ledger`, also returning the pool for direct SQL.
#[allow(dead_code)]
pub async fn create_test_ledger_with_pool() -> (NotificationLedger, Arc<SqlitePool>) {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create test database pool");
    run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    let pool = Arc::new(pool);
    (NotificationLedger::new(Arc::clone(&pool)), pool)
}

/// Three groups for customer 77 (who has one address) and customer 78 (who
/// has none):
/// - 812: finalized, two invoices, two detail rows
/// - 813: finalized, customer without recipients
/// - 814: not finalized
#[allow(dead_code)]
pub fn fixture_data() -> FixtureData {
    serde_json::from_value(serde_json::json!({
        "customers": [
            {"id": 77, "name": "Acme Corp", "invoice_emails": ["ap@acme.test", " "]},
            {"id": 78, "name": "Globex", "invoice_emails": []}
        ],
        "groups": [
            {"id": 812, "number": "IG-00812", "customer_id": 77, "customer_name": "Acme Corp",
             "subsidiary": "North America", "amount_due": 1250.0, "currency": "USD",
             "due_date": "2025-04-30", "tran_date": "2025-03-31", "finalized": true},
            {"id": 813, "number": "IG-00813", "customer_id": 78, "customer_name": "Globex",
             "subsidiary": "North America", "amount_due": 80.0, "currency": "USD",
             "due_date": "2025-04-30", "tran_date": "2025-03-31", "finalized": true},
            {"id": 814, "number": "IG-00814", "customer_id": 77, "customer_name": "Acme Corp",
             "subsidiary": "North America", "amount_due": 5.0, "currency": "USD",
             "due_date": "2025-04-30", "tran_date": "2025-03-31", "finalized": false}
        ],
        "invoices": [
            {"id": 11, "group_id": 812, "number": "INV11"},
            {"id": 12, "group_id": 812, "number": "INV12"},
            {"id": 21, "group_id": 813, "number": "INV21"}
        ],
        "queries": [
            {"id": "invoice_details",
             "columns": [
                {"name": "tranid", "label": "Invoice"},
                {"name": "amount", "join": "line", "summary": "sum", "label": "Amount"}
             ],
             "rows": [
                {"group_id": 812, "cells": [{"display": "INV11"}, {"raw": 1000.0, "display": "$1,000.00"}]},
                {"group_id": 812, "cells": [{"display": "INV12"}, {"raw": 250.0}]},
                {"group_id": 813, "cells": [{"display": "INV21"}, {"raw": 80.0}]}
             ]}
        ]
    }))
    .expect("fixture should deserialize")
}

/// Expected detail CSV for group 812.
#[allow(dead_code)]
pub const GROUP_812_CSV: &str =
    "\"Invoice\",\"Amount\"\r\n\"INV11\",\"$1,000.00\"\r\n\"INV12\",\"250\"\r\n";

/// Records every message; fails the first `failures` sends.
#[allow(dead_code)]
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingMessage>>,
    failures: AtomicUsize,
}

#[allow(dead_code)]
impl RecordingMailer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing(failures: usize) -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            failures: AtomicUsize::new(failures),
        })
    }

    pub fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &OutgoingMessage) -> Result<()> {
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            bail!("mail relay unavailable");
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Test configuration: no send retries, so failures surface immediately.
#[allow(dead_code)]
pub fn test_config() -> Config {
    Config {
        author_id: 4686,
        send_retries: 0,
        ..Default::default()
    }
}

/// A notifier over `data` that delivers through `mailer`.
#[allow(dead_code)]
pub async fn create_notifier(
    data: FixtureData,
    config: Config,
    mailer: Arc<RecordingMailer>,
) -> Notifier {
    create_notifier_with_ledger(data, config, mailer, create_test_ledger().await)
}

/// A notifier over `data` using an existing ledger.
#[allow(dead_code)]
pub fn create_notifier_with_ledger(
    data: FixtureData,
    config: Config,
    mailer: Arc<RecordingMailer>,
    ledger: NotificationLedger,
) -> Notifier {
    let backend = Arc::new(FixtureBackend::new(data, "."));
    Notifier::new(config, backend.collaborators(mailer), ledger)
}
