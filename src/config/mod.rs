//! Application configuration and constants.
//!
//! This module provides:
//! - Configuration constants (page sizes, attachment names, limits)
//! - The explicit `Config` passed into the notification pipeline
//! - CLI option types and parsing

mod constants;
mod types;

// Re-export all constants
pub use constants::*;
pub use types::{Command, Config, LogFormat, LogLevel, Opt, QuoteStyle};
