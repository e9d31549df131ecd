//! Notification ledger.
//!
//! Owns the "notified" flag for each invoice group. A group moves
//! `pending -> sending -> sent`; a failed send moves it back to `pending`.
//! Claiming is a single conditional `UPDATE`, so two triggers racing on the
//! same group cannot both send. A claim older than its lease is treated as
//! abandoned and may be requeued.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use sqlx::{Row, SqlitePool};

use crate::error_handling::DatabaseError;

/// Persisted state of one invoice group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationState {
    Pending,
    Sending,
    Sent,
    /// The mail went out but `sent` could not be recorded. Terminal: never
    /// requeued or claimed again.
    DeliveredUnconfirmed,
}

impl NotificationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationState::Pending => "pending",
            NotificationState::Sending => "sending",
            NotificationState::Sent => "sent",
            NotificationState::DeliveredUnconfirmed => "delivered_unconfirmed",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(NotificationState::Pending),
            "sending" => Some(NotificationState::Sending),
            "sent" => Some(NotificationState::Sent),
            "delivered_unconfirmed" => Some(NotificationState::DeliveredUnconfirmed),
            _ => None,
        }
    }
}

/// Result of trying to claim a group for sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// This caller owns the send and must call `mark_sent` or `release`
    Claimed,
    /// The group was already notified, confirmed or not
    AlreadySent,
    /// Another caller holds the claim
    InProgress,
}

/// SQLite-backed store of per-group notification state.
#[derive(Clone)]
pub struct NotificationLedger {
    pool: Arc<SqlitePool>,
}

fn to_db_id(group_id: u64) -> Result<i64, DatabaseError> {
    i64::try_from(group_id).map_err(|_| DatabaseError::GroupIdOutOfRange(group_id.into()))
}

fn from_db_id(id: i64) -> Result<u64, DatabaseError> {
    u64::try_from(id).map_err(|_| DatabaseError::GroupIdOutOfRange(id.into()))
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl NotificationLedger {
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    /// Records a finalized group as awaiting notification.
    ///
    /// Returns `true` if the group was not known before. Existing state is
    /// never changed.
    pub async fn register(&self, group_id: u64) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO invoice_group_notifications (group_id, state, registered_at)
             VALUES (?, 'pending', ?)",
        )
        .bind(to_db_id(group_id)?)
        .bind(now_millis())
        .execute(&*self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Groups awaiting notification, in id order.
    pub async fn pending(&self) -> Result<Vec<u64>, DatabaseError> {
        let rows = sqlx::query(
            "SELECT group_id FROM invoice_group_notifications
             WHERE state = 'pending' ORDER BY group_id",
        )
        .fetch_all(&*self.pool)
        .await?;
        rows.iter()
            .map(|r| from_db_id(r.get::<i64, _>("group_id")))
            .collect()
    }

    /// Atomically moves a group from `pending` to `sending`, stamping the
    /// claim time.
    ///
    /// Unknown groups are registered first, so a single-record trigger works
    /// for groups a sweep has never seen.
    pub async fn claim(&self, group_id: u64) -> Result<Claim, DatabaseError> {
        self.register(group_id).await?;

        let result = sqlx::query(
            "UPDATE invoice_group_notifications
             SET state = 'sending', attempts = attempts + 1, claimed_at = ?
             WHERE group_id = ? AND state = 'pending'",
        )
        .bind(now_millis())
        .bind(to_db_id(group_id)?)
        .execute(&*self.pool)
        .await?;

        if result.rows_affected() == 1 {
            debug!("Claimed invoice group {} for sending", group_id);
            return Ok(Claim::Claimed);
        }

        match self.state(group_id).await? {
            Some(NotificationState::Sent | NotificationState::DeliveredUnconfirmed) => {
                Ok(Claim::AlreadySent)
            }
            _ => Ok(Claim::InProgress),
        }
    }

    /// Marks a claimed group as notified. Returns `false` if the group was not
    /// in the `sending` state.
    pub async fn mark_sent(&self, group_id: u64) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE invoice_group_notifications
             SET state = 'sent', sent_at = ?, last_error = NULL
             WHERE group_id = ? AND state = 'sending'",
        )
        .bind(now_millis())
        .bind(to_db_id(group_id)?)
        .execute(&*self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Records that a claimed group was mailed but could not be marked sent.
    pub async fn mark_unconfirmed(&self, group_id: u64, reason: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE invoice_group_notifications
             SET state = 'delivered_unconfirmed', last_error = ?
             WHERE group_id = ? AND state = 'sending'",
        )
        .bind(reason)
        .bind(to_db_id(group_id)?)
        .execute(&*self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Returns a claimed group to `pending`, recording why the send did not
    /// complete.
    pub async fn release(&self, group_id: u64, reason: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE invoice_group_notifications
             SET state = 'pending', last_error = ?
             WHERE group_id = ? AND state = 'sending'",
        )
        .bind(reason)
        .bind(to_db_id(group_id)?)
        .execute(&*self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Returns `sending` groups whose claim is at least `lease` old to
    /// `pending`.
    ///
    /// Younger claims belong to a trigger that may still be sending and are
    /// left alone.
    pub async fn requeue_interrupted(&self, lease: Duration) -> Result<u64, DatabaseError> {
        let lease_ms = i64::try_from(lease.as_millis()).unwrap_or(i64::MAX);
        let cutoff = now_millis().saturating_sub(lease_ms);
        let result = sqlx::query(
            "UPDATE invoice_group_notifications
             SET state = 'pending', last_error = 'interrupted'
             WHERE state = 'sending' AND (claimed_at IS NULL OR claimed_at <= ?)",
        )
        .bind(cutoff)
        .execute(&*self.pool)
        .await?;
        let count = result.rows_affected();
        if count > 0 {
            warn!(
                "Requeued {} notifications claimed more than {}s ago",
                count,
                lease.as_secs()
            );
        }
        Ok(count)
    }

    pub async fn state(&self, group_id: u64) -> Result<Option<NotificationState>, DatabaseError> {
        let row = sqlx::query("SELECT state FROM invoice_group_notifications WHERE group_id = ?")
            .bind(to_db_id(group_id)?)
            .fetch_optional(&*self.pool)
            .await?;
        Ok(row.and_then(|r| NotificationState::parse(&r.get::<String, _>("state"))))
    }

    pub async fn is_sent(&self, group_id: u64) -> Result<bool, DatabaseError> {
        Ok(self.state(group_id).await? == Some(NotificationState::Sent))
    }

    /// Number of claims taken on a group, including failed ones.
    pub async fn attempts(&self, group_id: u64) -> Result<i64, DatabaseError> {
        let attempts: Option<i64> = sqlx::query_scalar(
            "SELECT attempts FROM invoice_group_notifications WHERE group_id = ?",
        )
        .bind(to_db_id(group_id)?)
        .fetch_optional(&*self.pool)
        .await?;
        Ok(attempts.unwrap_or(0))
    }

    pub async fn last_error(&self, group_id: u64) -> Result<Option<String>, DatabaseError> {
        let last_error: Option<Option<String>> = sqlx::query_scalar(
            "SELECT last_error FROM invoice_group_notifications WHERE group_id = ?",
        )
        .bind(to_db_id(group_id)?)
        .fetch_optional(&*self.pool)
        .await?;
        Ok(last_error.flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::run_migrations;
    use sqlx::sqlite::SqlitePoolOptions;

    const LEASE: Duration = Duration::from_secs(600);

    async fn create_test_ledger() -> NotificationLedger {
        // A single connection keeps every query on the same in-memory database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create test database pool");
        run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        NotificationLedger::new(Arc::new(pool))
    }

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let ledger = create_test_ledger().await;
        assert!(ledger.register(7).await.unwrap());
        assert!(!ledger.register(7).await.unwrap());
        assert_eq!(ledger.pending().await.unwrap(), vec![7]);
    }

    #[tokio::test]
    async fn test_claim_then_mark_sent() {
        let ledger = create_test_ledger().await;
        ledger.register(1).await.unwrap();

        assert_eq!(ledger.claim(1).await.unwrap(), Claim::Claimed);
        assert_eq!(
            ledger.state(1).await.unwrap(),
            Some(NotificationState::Sending)
        );
        assert!(ledger.pending().await.unwrap().is_empty());

        assert!(ledger.mark_sent(1).await.unwrap());
        assert!(ledger.is_sent(1).await.unwrap());
        assert_eq!(ledger.claim(1).await.unwrap(), Claim::AlreadySent);
    }

    #[tokio::test]
    async fn test_second_claim_is_in_progress() {
        let ledger = create_test_ledger().await;
        assert_eq!(ledger.claim(3).await.unwrap(), Claim::Claimed);
        assert_eq!(ledger.claim(3).await.unwrap(), Claim::InProgress);
        assert_eq!(ledger.attempts(3).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_release_returns_to_pending() {
        let ledger = create_test_ledger().await;
        ledger.claim(5).await.unwrap();
        assert!(ledger.release(5, "smtp unavailable").await.unwrap());
        assert_eq!(ledger.pending().await.unwrap(), vec![5]);
        assert_eq!(
            ledger.last_error(5).await.unwrap().as_deref(),
            Some("smtp unavailable")
        );
        assert_eq!(ledger.claim(5).await.unwrap(), Claim::Claimed);
        assert_eq!(ledger.attempts(5).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_mark_sent_requires_claim() {
        let ledger = create_test_ledger().await;
        ledger.register(9).await.unwrap();
        assert!(!ledger.mark_sent(9).await.unwrap());
        assert!(!ledger.is_sent(9).await.unwrap());
    }

    #[tokio::test]
    async fn test_fresh_claim_survives_requeue() {
        let ledger = create_test_ledger().await;
        ledger.claim(1).await.unwrap();

        assert_eq!(ledger.requeue_interrupted(LEASE).await.unwrap(), 0);
        assert_eq!(
            ledger.state(1).await.unwrap(),
            Some(NotificationState::Sending)
        );
        assert_eq!(ledger.claim(1).await.unwrap(), Claim::InProgress);
    }

    #[tokio::test]
    async fn test_expired_claim_is_requeued() {
        let ledger = create_test_ledger().await;
        ledger.claim(1).await.unwrap();
        ledger.claim(2).await.unwrap();
        ledger.mark_sent(2).await.unwrap();

        assert_eq!(ledger.requeue_interrupted(Duration::ZERO).await.unwrap(), 1);
        assert_eq!(ledger.pending().await.unwrap(), vec![1]);
        assert_eq!(
            ledger.last_error(1).await.unwrap().as_deref(),
            Some("interrupted")
        );
        assert!(ledger.is_sent(2).await.unwrap());
    }

    #[tokio::test]
    async fn test_unconfirmed_delivery_is_terminal() {
        let ledger = create_test_ledger().await;
        ledger.claim(4).await.unwrap();
        assert!(ledger.mark_unconfirmed(4, "mark sent: disk I/O error").await.unwrap());

        assert_eq!(ledger.requeue_interrupted(Duration::ZERO).await.unwrap(), 0);
        assert!(ledger.pending().await.unwrap().is_empty());
        assert_eq!(ledger.claim(4).await.unwrap(), Claim::AlreadySent);
        assert!(!ledger.release(4, "late failure").await.unwrap());
        assert_eq!(
            ledger.state(4).await.unwrap(),
            Some(NotificationState::DeliveredUnconfirmed)
        );
        assert!(!ledger.is_sent(4).await.unwrap());
    }

    #[tokio::test]
    async fn test_group_id_beyond_i64_is_rejected() {
        let ledger = create_test_ledger().await;
        let huge = i64::MAX as u64 + 1;
        assert!(matches!(
            ledger.register(huge).await,
            Err(DatabaseError::GroupIdOutOfRange(id)) if id == huge as i128
        ));
        assert!(matches!(
            ledger.claim(u64::MAX).await,
            Err(DatabaseError::GroupIdOutOfRange(_))
        ));

        ledger.register(i64::MAX as u64).await.unwrap();
        ledger.register(2).await.unwrap();
        assert_eq!(ledger.pending().await.unwrap(), vec![2, i64::MAX as u64]);
    }

    #[tokio::test]
    async fn test_unknown_group_has_no_state() {
        let ledger = create_test_ledger().await;
        assert_eq!(ledger.state(42).await.unwrap(), None);
        assert!(!ledger.is_sent(42).await.unwrap());
        assert_eq!(ledger.attempts(42).await.unwrap(), 0);
    }
}
