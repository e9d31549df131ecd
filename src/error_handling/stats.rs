//! Processing statistics tracking.
//!
//! Thread-safe counters for notification outcomes, stage failures and
//! recoverable warnings, shared across concurrent sweep tasks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use strum::IntoEnumIterator;

use super::types::{OutcomeType, Stage, WarningType};

/// Thread-safe processing statistics tracker.
///
/// All counters are created up front from the enum variants, so lookups
/// never miss for a properly constructed tracker. Share it with `Arc`.
pub struct ProcessingStats {
    outcomes: HashMap<OutcomeType, AtomicUsize>,
    failures: HashMap<Stage, AtomicUsize>,
    warnings: HashMap<WarningType, AtomicUsize>,
}

impl Default for ProcessingStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingStats {
    pub fn new() -> Self {
        ProcessingStats {
            outcomes: OutcomeType::iter()
                .map(|o| (o, AtomicUsize::new(0)))
                .collect(),
            failures: Stage::iter().map(|s| (s, AtomicUsize::new(0))).collect(),
            warnings: WarningType::iter()
                .map(|w| (w, AtomicUsize::new(0)))
                .collect(),
        }
    }

    pub fn increment_outcome(&self, outcome: OutcomeType) {
        if let Some(counter) = self.outcomes.get(&outcome) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn increment_failure(&self, stage: Stage) {
        if let Some(counter) = self.failures.get(&stage) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn add_warnings(&self, warning: WarningType, count: usize) {
        if let Some(counter) = self.warnings.get(&warning) {
            counter.fetch_add(count, Ordering::Relaxed);
        }
    }

    pub fn get_outcome_count(&self, outcome: OutcomeType) -> usize {
        self.outcomes
            .get(&outcome)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    pub fn get_failure_count(&self, stage: Stage) -> usize {
        self.failures
            .get(&stage)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    pub fn get_warning_count(&self, warning: WarningType) -> usize {
        self.warnings
            .get(&warning)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Total notification attempts across all outcomes.
    pub fn total_outcomes(&self) -> usize {
        OutcomeType::iter().map(|o| self.get_outcome_count(o)).sum()
    }

    /// Total warnings across all warning types.
    pub fn total_warnings(&self) -> usize {
        WarningType::iter().map(|w| self.get_warning_count(w)).sum()
    }

    /// Logs non-zero stage failures and warnings at info level.
    pub fn log_summary(&self) {
        for stage in Stage::iter() {
            let count = self.get_failure_count(stage);
            if count > 0 {
                log::info!("   {} stage failures: {}", stage, count);
            }
        }
        for warning in WarningType::iter() {
            let count = self.get_warning_count(warning);
            if count > 0 {
                log::info!("   {:?}: {}", warning, count);
            }
        }
    }
}
