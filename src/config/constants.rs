//! Configuration constants.
//!
//! This module defines the defaults used throughout the application, including
//! export page sizes, attachment names, size limits and retry timing.

/// Default ledger database path
pub const DB_PATH: &str = "./invoice_group_notify.db";

/// Default outbox directory for the file-backed mailer
pub const OUTBOX_DIR: &str = "./outbox";

// Export defaults
/// Rows fetched per page when running a detail query
pub const DEFAULT_PAGE_SIZE: usize = 1000;
/// File name of the line-item detail export
pub const DETAILS_CSV_NAME: &str = "Invoice Details.csv";
/// Content type declared on every CSV export
pub const CSV_CONTENT_TYPE: &str = "text/csv";
/// Token written for cells that have neither display text nor a raw value
pub const NULL_TOKEN: &str = "null";

// Attachment defaults
/// File name of the archive that bundles every invoice PDF in a group
pub const INVOICE_ARCHIVE_NAME: &str = "Related Invoice PDFs.zip";
/// Content type of the invoice archive
pub const ZIP_CONTENT_TYPE: &str = "application/zip";
/// Content type of a rendered invoice
pub const PDF_CONTENT_TYPE: &str = "application/pdf";
/// Maximum combined attachment size in bytes (10MB)
/// Mail relays commonly reject messages above this size
pub const MAX_ATTACHMENT_BYTES: usize = 10 * 1024 * 1024;

// Sweep
/// Groups processed concurrently during a sweep
pub const SWEEP_CONCURRENCY: usize = 4;
/// Seconds a claim is held before a sweep may requeue it as abandoned
pub const CLAIM_TIMEOUT_SECS: u64 = 900;
/// Default saved query that produces the line-item detail
pub const DEFAULT_DETAILS_QUERY: &str = "invoice_details";

// Retry strategy for outbound mail
/// Delay unit in milliseconds; the n-th retry waits `RETRY_UNIT_MS * RETRY_BASE^n`
pub const RETRY_UNIT_MS: u64 = 250;
/// Factor by which retry delay grows on each attempt
pub const RETRY_BASE: u64 = 2;
/// Maximum delay between retries in seconds
pub const RETRY_MAX_DELAY_SECS: u64 = 10;
/// Retries after the first failed send
pub const SEND_RETRIES: usize = 2;
