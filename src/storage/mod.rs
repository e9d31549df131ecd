// storage/mod.rs
// Notification ledger persistence

pub mod ledger;
pub mod migrations;
pub mod pool;

pub use ledger::{Claim, NotificationLedger, NotificationState};
pub use migrations::run_migrations;
pub use pool::init_db_pool_with_path;
