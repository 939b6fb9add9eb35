//! Staged upgrade orchestration around a branch-selected step pipeline.

mod actions;
mod checker;
mod controller;
mod error;
mod gate;
mod pipeline;
mod recovery;
mod report;
mod steps;

pub use actions::{run_step, StepContext};
pub use checker::{check, evaluate_checks, sample_host, CheckResult};
pub use controller::{RunController, RunOptions, RunState, RunSummary};
pub use error::{FailureKind, GateError};
pub use gate::{AssumeYesGate, ConfirmationGate, TerminalGate};
pub use pipeline::{build_pipeline, select_branch, Branch, Pipeline};
pub use recovery::{recovery_for, recovery_for_check, FailureCategory, RecoveryGuidance};
pub use report::{current_unix_timestamp, NoopObserver, ReportEntry, ReportObserver, RunReport};
pub use steps::StepKind;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_CANCELLED: i32 = 2;
pub const EXIT_PRECONDITION: i32 = 3;
