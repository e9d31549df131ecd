//! Configuration types and CLI options.
//!
//! This module defines enums and structs used for command-line argument parsing
//! and for the explicit configuration handed to the notification pipeline.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::constants::{
    CLAIM_TIMEOUT_SECS, DB_PATH, DEFAULT_DETAILS_QUERY, DEFAULT_PAGE_SIZE, MAX_ATTACHMENT_BYTES, OUTBOX_DIR,
    SEND_RETRIES, SWEEP_CONCURRENCY,
};

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
///
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// How CSV fields are quoted.
///
/// `Naive` wraps each value in double quotes verbatim, which is the format
/// downstream consumers of the detail export have always received. A value
/// containing `"` produces a malformed field in this mode. `Standard` doubles
/// embedded quotes so any RFC 4180 reader can parse the output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum QuoteStyle {
    /// Wrap values in quotes without escaping
    #[default]
    Naive,
    /// Always quote and escape embedded quotes
    Standard,
}

/// Library configuration (no CLI dependencies).
///
/// Everything the pipeline needs is carried here explicitly: sender identity,
/// the saved query used for line-item detail, and attachment limits.
///
/// # Examples
///
/// ```
/// use invoice_group_notify::Config;
///
/// let config = Config {
///     author_id: 4686,
///     max_concurrency: 8,
///     ..Default::default()
/// };
/// assert_eq!(config.page_size, 1000);
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Log level
    pub log_level: LogLevel,

    /// Log format
    pub log_format: LogFormat,

    /// Notification ledger path (SQLite file)
    pub db_path: PathBuf,

    /// Internal id of the employee that sends invoice group mail
    pub author_id: u64,

    /// Saved query producing the line-item detail CSV
    pub details_query: String,

    /// Rows per page when running the detail query
    pub page_size: usize,

    /// CSV field quoting
    pub quote_style: QuoteStyle,

    /// Maximum combined size of all attachments in bytes
    pub max_attachment_bytes: usize,

    /// Groups processed concurrently during a sweep
    pub max_concurrency: usize,

    /// Retries after a failed send
    pub send_retries: usize,

    /// Age in seconds after which a `sending` claim counts as abandoned
    pub claim_timeout_secs: u64,

    /// Closing lines of every message body (HTML allowed)
    pub signature: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_format: LogFormat::Plain,
            db_path: PathBuf::from(DB_PATH),
            author_id: 0,
            details_query: DEFAULT_DETAILS_QUERY.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            quote_style: QuoteStyle::Naive,
            max_attachment_bytes: MAX_ATTACHMENT_BYTES,
            max_concurrency: SWEEP_CONCURRENCY,
            send_retries: SEND_RETRIES,
            claim_timeout_secs: CLAIM_TIMEOUT_SECS,
            signature: "Billing Team".to_string(),
        }
    }
}

/// Command-line options.
///
/// # Examples
///
/// ```bash
/// # Notify every finalized group that has not been notified yet
/// invoice_group_notify --fixture data.json sweep
///
/// # Handle a single group after it was saved
/// invoice_group_notify --fixture data.json notify 812
///
/// # Write the detail CSV for a group without sending anything
/// invoice_group_notify --fixture data.json export 812 --output details.csv
/// ```
#[derive(Debug, Parser)]
#[command(
    name = "invoice_group_notify",
    about = "Emails finalized invoice groups with invoice PDFs and line-item detail."
)]
pub struct Opt {
    /// JSON file describing customers, invoice groups, invoices and detail rows
    #[arg(long, value_parser)]
    pub fixture: PathBuf,

    /// Log level: error|warn|info|debug|trace
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    /// Log format: plain|json
    #[arg(long, value_enum, default_value_t = LogFormat::Plain)]
    pub log_format: LogFormat,

    /// Notification ledger path (SQLite file)
    #[arg(long, value_parser, default_value = DB_PATH)]
    pub db_path: PathBuf,

    /// Directory that receives outgoing messages
    #[arg(long, value_parser, default_value = OUTBOX_DIR)]
    pub outbox: PathBuf,

    /// Internal id of the sending employee
    #[arg(long, default_value_t = 0)]
    pub author_id: u64,

    /// Saved query producing the line-item detail
    #[arg(long, default_value = DEFAULT_DETAILS_QUERY)]
    pub details_query: String,

    /// Rows per page when running the detail query
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,

    /// CSV quoting: naive|standard
    #[arg(long, value_enum, default_value_t = QuoteStyle::Naive)]
    pub quote_style: QuoteStyle,

    /// Maximum combined attachment size in bytes
    #[arg(long, default_value_t = MAX_ATTACHMENT_BYTES)]
    pub max_attachment_bytes: usize,

    /// Groups processed concurrently during a sweep
    #[arg(long, default_value_t = SWEEP_CONCURRENCY)]
    pub max_concurrency: usize,

    /// Retries after a failed send
    #[arg(long, default_value_t = SEND_RETRIES)]
    pub send_retries: usize,

    /// Seconds before a sweep requeues a claim left in the sending state
    #[arg(long, default_value_t = CLAIM_TIMEOUT_SECS)]
    pub claim_timeout_secs: u64,

    /// Closing lines of every message body
    #[arg(long, default_value = "Billing Team")]
    pub signature: String,

    #[command(subcommand)]
    pub command: Command,
}

/// What to run.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Notify every finalized group that has not been notified yet
    Sweep,
    /// Notify a single group, as after the group record is saved
    Notify {
        /// Invoice group id
        group_id: u64,
    },
    /// Write the line-item detail CSV for a group
    Export {
        /// Invoice group id
        group_id: u64,
        /// Output file (stdout if omitted)
        #[arg(long, value_parser)]
        output: Option<PathBuf>,
    },
}

impl From<&Opt> for Config {
    fn from(opt: &Opt) -> Self {
        Self {
            log_level: opt.log_level.clone(),
            log_format: opt.log_format.clone(),
            db_path: opt.db_path.clone(),
            author_id: opt.author_id,
            details_query: opt.details_query.clone(),
            page_size: opt.page_size,
            quote_style: opt.quote_style,
            max_attachment_bytes: opt.max_attachment_bytes,
            max_concurrency: opt.max_concurrency,
            send_retries: opt.send_retries,
            claim_timeout_secs: opt.claim_timeout_secs,
            signature: opt.signature.clone(),
        }
    }
}
