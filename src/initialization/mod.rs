//! Application initialization and resource setup.
//!
//! This module provides functions to initialize shared resources:
//! - Logger (plain or JSON)
//! - Notification ledger (SQLite pool with migrations applied)

mod logger;

use std::path::Path;

use crate::error_handling::DatabaseError;
use crate::storage::{init_db_pool_with_path, run_migrations, NotificationLedger};

// Re-export public API
pub use logger::init_logger_with;

/// Opens the ledger database at `db_path`, creating and migrating it as needed.
///
/// # Errors
///
/// Returns `DatabaseError` if the file cannot be created, the connection
/// fails, or a migration fails.
pub async fn init_ledger(db_path: &Path) -> Result<NotificationLedger, DatabaseError> {
    let pool = init_db_pool_with_path(db_path).await?;
    run_migrations(&pool).await?;
    Ok(NotificationLedger::new(pool))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_ledger_creates_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let ledger = init_ledger(&path).await.unwrap();
        assert!(path.exists());
        assert!(ledger.register(1).await.unwrap());

        // Reopening keeps existing state
        let reopened = init_ledger(&path).await.unwrap();
        assert_eq!(reopened.pending().await.unwrap(), vec![1]);
    }
}
