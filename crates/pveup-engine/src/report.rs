use std::time::{SystemTime, UNIX_EPOCH};

use pveup_core::StepOutcome;
use tracing::{error, info, warn};

use crate::steps::StepKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub step: StepKind,
    pub outcome: StepOutcome,
    pub timestamp_unix: u64,
}

/// Append-only record of one run. Every entry is logged the moment it is appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    started_at_unix: u64,
    entries: Vec<ReportEntry>,
}

impl RunReport {
    pub fn new(started_at_unix: u64) -> Self {
        Self {
            started_at_unix,
            entries: Vec::new(),
        }
    }

    pub fn started_at_unix(&self) -> u64 {
        self.started_at_unix
    }

    pub fn push(&mut self, step: StepKind, outcome: StepOutcome) -> &ReportEntry {
        let entry = ReportEntry {
            step,
            outcome,
            timestamp_unix: current_unix_timestamp(),
        };
        log_entry(&entry);
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|entry| entry.step.as_str()).collect()
    }

    pub fn completed_steps(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| !entry.outcome.halts())
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.entries
            .iter()
            .map(|entry| entry.outcome.warnings().len())
            .sum()
    }
}

fn log_entry(entry: &ReportEntry) {
    let step = entry.step.as_str();
    match &entry.outcome {
        StepOutcome::Success => info!(step, "step succeeded"),
        StepOutcome::SuccessWithWarnings(warnings) => {
            for message in warnings {
                warn!(step, "{message}");
            }
            info!(step, warnings = warnings.len(), "step succeeded with warnings");
        }
        StepOutcome::Fatal { code, message } => error!(step, code, "step failed: {message}"),
        StepOutcome::Skipped(reason) => info!(step, "step skipped: {reason}"),
    }
}

/// Console-side view of the run. All methods default to no-ops.
pub trait ReportObserver {
    fn step_started(&mut self, _index: usize, _total: usize, _step: StepKind) {}
    fn step_finished(&mut self, _entry: &ReportEntry) {}
    fn notice(&mut self, _step: StepKind, _message: &str) {}
}

pub struct NoopObserver;

impl ReportObserver for NoopObserver {}

pub fn current_unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}
