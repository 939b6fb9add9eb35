use std::path::PathBuf;

use pveup_core::{CheckKind, CheckOutcome, HostState, StepOutcome, UpgradeConfig};
use pveup_host::Collaborators;
use tracing::{debug, error, info, warn};

use crate::actions::{run_step, StepContext};
use crate::checker::{check, evaluate_checks, sample_host, CheckResult};
use crate::error::FailureKind;
use crate::gate::ConfirmationGate;
use crate::pipeline::{build_pipeline, Branch, Pipeline};
use crate::recovery::{recovery_for, recovery_for_check, RecoveryGuidance};
use crate::report::{current_unix_timestamp, ReportObserver, RunReport};
use crate::steps::StepKind;
use crate::{EXIT_CANCELLED, EXIT_FAILURE, EXIT_PRECONDITION, EXIT_SUCCESS};

#[derive(Debug, Clone, PartialEq)]
pub enum RunState {
    Init,
    DetectingState,
    BranchSelected(Branch),
    Running(usize),
    Completed,
    /// Reserved for an operator declining a confirmation.
    Aborted(String),
    Failed { kind: FailureKind, reason: String },
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted(_) | Self::Failed { .. })
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Completed => EXIT_SUCCESS,
            Self::Aborted(_) => EXIT_CANCELLED,
            Self::Failed {
                kind: FailureKind::Precondition,
                ..
            } => EXIT_PRECONDITION,
            _ => EXIT_FAILURE,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::Init => "init".to_string(),
            Self::DetectingState => "detecting-state".to_string(),
            Self::BranchSelected(branch) => format!("branch:{}", branch.as_str()),
            Self::Running(index) => format!("running:{index}"),
            Self::Completed => "completed".to_string(),
            Self::Aborted(_) => "aborted".to_string(),
            Self::Failed { kind, .. } => format!("failed:{}", kind.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub dry_run: bool,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub state: RunState,
    pub branch: Option<Branch>,
    pub host: Option<HostState>,
    pub report: RunReport,
    pub recovery: Option<RecoveryGuidance>,
    pub backups: Vec<PathBuf>,
    pub transitions: Vec<RunState>,
    pub dry_run: bool,
}

impl RunSummary {
    pub fn exit_code(&self) -> i32 {
        self.state.exit_code()
    }
}

/// Drives one run against one host. Owns the run's state and report exclusively;
/// concurrent runs against the same host are the operator's responsibility.
pub struct RunController<'a> {
    config: &'a UpgradeConfig,
    host: &'a Collaborators,
    gate: &'a mut dyn ConfirmationGate,
    observer: &'a mut dyn ReportObserver,
    options: RunOptions,
    state: RunState,
    transitions: Vec<RunState>,
    branch: Option<Branch>,
    last_host: Option<HostState>,
    report: RunReport,
    recovery: Option<RecoveryGuidance>,
    backups: Vec<PathBuf>,
}

enum StepFlow {
    Continue,
    Halt,
}

impl<'a> RunController<'a> {
    pub fn new(
        config: &'a UpgradeConfig,
        host: &'a Collaborators,
        gate: &'a mut dyn ConfirmationGate,
        observer: &'a mut dyn ReportObserver,
        options: RunOptions,
    ) -> Self {
        Self {
            config,
            host,
            gate,
            observer,
            options,
            state: RunState::Init,
            transitions: vec![RunState::Init],
            branch: None,
            last_host: None,
            report: RunReport::new(current_unix_timestamp()),
            recovery: None,
            backups: Vec::new(),
        }
    }

    /// Detects the host, selects the branch and runs it to a terminal state.
    pub fn run(mut self) -> RunSummary {
        let Some(host) = self.detect() else {
            return self.finish();
        };
        match build_pipeline(&host, self.config) {
            Some(pipeline) => self.execute(pipeline),
            None => {
                let reason = format!("unsupported version {}", host.version.describe());
                self.fail(None, FailureKind::Precondition, reason);
                self.finish()
            }
        }
    }

    /// Runs an explicit pipeline after the usual version detection.
    pub fn run_pipeline(mut self, pipeline: Pipeline) -> RunSummary {
        if self.detect().is_none() {
            return self.finish();
        }
        self.execute(pipeline)
    }

    fn detect(&mut self) -> Option<HostState> {
        self.transition(RunState::DetectingState);
        let host = match sample_host(self.host.probe.as_ref(), self.config) {
            Ok(host) => host,
            Err(err) => {
                self.fail(
                    None,
                    FailureKind::Precondition,
                    format!("failed to sample host state: {err:#}"),
                );
                return None;
            }
        };
        info!("detected host: {}", host.summary_line());
        self.last_host = Some(host.clone());

        if let CheckOutcome::Fail(reason) = check(CheckKind::VersionInRange, &host, self.config) {
            self.fail(None, FailureKind::Precondition, reason);
            return None;
        }
        Some(host)
    }

    fn execute(mut self, pipeline: Pipeline) -> RunSummary {
        self.branch = Some(pipeline.branch());
        self.transition(RunState::BranchSelected(pipeline.branch()));
        info!(
            branch = pipeline.branch().as_str(),
            steps = pipeline.len(),
            dry_run = self.options.dry_run,
            "pipeline selected"
        );

        let total = pipeline.len();
        for (index, step) in pipeline.steps().iter().copied().enumerate() {
            self.transition(RunState::Running(index));
            let flow = if self.options.dry_run {
                self.dry_run_step(step)
            } else {
                self.run_one(index, total, step)
            };
            if let StepFlow::Halt = flow {
                return self.finish();
            }
        }

        self.transition(RunState::Completed);
        self.finish()
    }

    fn run_one(&mut self, index: usize, total: usize, step: StepKind) -> StepFlow {
        let Some((host, checks)) = self.evaluate_precondition(step) else {
            return StepFlow::Halt;
        };

        let mut gated = Vec::new();
        let mut warnings = Vec::new();
        for result in &checks {
            if let CheckOutcome::Warn(message) = &result.outcome {
                self.observer.notice(step, message);
                if result.kind.gates_on_warn() {
                    gated.push(message.clone());
                }
                warnings.push(message.clone());
            }
        }
        if !gated.is_empty() && !self.confirm(step, &gated) {
            return StepFlow::Halt;
        }

        self.observer.step_started(index, total, step);
        let action_outcome = {
            let mut ctx = StepContext {
                config: self.config,
                host: self.host,
                state: &host,
                backups: &mut self.backups,
            };
            match run_step(step, &mut ctx) {
                Ok(outcome) => outcome,
                Err(err) => StepOutcome::fatal(EXIT_FAILURE, format!("{err:#}")),
            }
        };
        let action_warnings = action_outcome.warnings().to_vec();
        let outcome = action_outcome.with_warnings(warnings);
        let halts = outcome.halts();
        let fatal_reason = outcome.detail();
        let exit_code = match &outcome {
            StepOutcome::Fatal { code, .. } => *code,
            _ => EXIT_SUCCESS,
        };

        let entry = self.report.push(step, outcome);
        self.observer.step_finished(entry);

        if halts {
            let reason = fatal_reason.unwrap_or_else(|| "step failed".to_string());
            let guidance = recovery_for(Some(step), exit_code);
            self.fail_with_recovery(Some(step), FailureKind::Action, reason, guidance);
            return StepFlow::Halt;
        }

        if step.requires_confirmation() && !action_warnings.is_empty() && !self.confirm(step, &action_warnings) {
            return StepFlow::Halt;
        }

        self.log_postcondition(step);
        StepFlow::Continue
    }

    fn dry_run_step(&mut self, step: StepKind) -> StepFlow {
        let Some((_, checks)) = self.evaluate_precondition(step) else {
            return StepFlow::Halt;
        };
        let warnings = checks
            .iter()
            .filter_map(|result| match &result.outcome {
                CheckOutcome::Warn(message) => Some(format!("{}: {message}", result.kind.as_str())),
                _ => None,
            })
            .collect::<Vec<_>>();
        for message in &warnings {
            self.observer.notice(step, message);
        }

        let reason = if warnings.is_empty() {
            "dry run: preconditions pass".to_string()
        } else {
            format!("dry run: {} precondition warning(s)", warnings.len())
        };
        let entry = self.report.push(step, StepOutcome::skipped(reason));
        self.observer.step_finished(entry);
        StepFlow::Continue
    }

    /// Samples the host fresh and evaluates the step's checks. A failing check is
    /// recorded against the step and moves the run to `Failed`.
    fn evaluate_precondition(&mut self, step: StepKind) -> Option<(HostState, Vec<CheckResult>)> {
        let host = match sample_host(self.host.probe.as_ref(), self.config) {
            Ok(host) => host,
            Err(err) => {
                let reason = format!("failed to sample host state: {err:#}");
                self.record_precondition_failure(step, None, reason);
                return None;
            }
        };
        self.last_host = Some(host.clone());

        let checks = evaluate_checks(step.precondition_checks(), &host, self.config);
        for result in &checks {
            debug!(
                step = step.as_str(),
                check = result.kind.as_str(),
                outcome = result.outcome.label(),
                "precondition evaluated"
            );
        }
        if let Some(failed) = checks.iter().find(|result| result.outcome.is_fail()) {
            let kind = failed.kind;
            let reason = match &failed.outcome {
                CheckOutcome::Fail(reason) => format!("{}: {reason}", kind.as_str()),
                other => format!("{}: {}", kind.as_str(), other.label()),
            };
            self.record_precondition_failure(step, Some(kind), reason);
            return None;
        }
        Some((host, checks))
    }

    /// Guidance follows the failing check when it names a category, else the step.
    fn record_precondition_failure(
        &mut self,
        step: StepKind,
        check: Option<CheckKind>,
        reason: String,
    ) {
        let entry = self
            .report
            .push(step, StepOutcome::fatal(EXIT_PRECONDITION, reason.clone()));
        self.observer.step_finished(entry);
        let guidance = match check {
            Some(check) => recovery_for_check(Some(step), check, EXIT_PRECONDITION),
            None => recovery_for(Some(step), EXIT_PRECONDITION),
        };
        self.fail_with_recovery(Some(step), FailureKind::Precondition, reason, guidance);
    }

    /// Returns `true` when the run may continue. A refusal ends the run as `Aborted`;
    /// a gate that cannot get an answer ends it as `Failed`.
    fn confirm(&mut self, step: StepKind, warnings: &[String]) -> bool {
        let mut prompt = format!("{} reported:", step.label());
        for message in warnings {
            prompt.push_str(&format!("\n  - {message}"));
        }
        prompt.push_str("\nContinue?");

        match self.gate.confirm(&prompt) {
            Ok(true) => true,
            Ok(false) => {
                warn!(step = step.as_str(), "operator declined confirmation");
                self.transition(RunState::Aborted(format!(
                    "cancelled by operator at {}",
                    step.as_str()
                )));
                false
            }
            Err(err) => {
                self.fail(
                    Some(step),
                    FailureKind::Confirmation,
                    format!("confirmation required at {} but {err}", step.as_str()),
                );
                false
            }
        }
    }

    fn log_postcondition(&mut self, step: StepKind) {
        match sample_host(self.host.probe.as_ref(), self.config) {
            Ok(host) => {
                if step.postcondition(&host, self.config) {
                    debug!(step = step.as_str(), "postcondition holds");
                } else {
                    info!(
                        step = step.as_str(),
                        "postcondition not yet satisfied (may need a reboot)"
                    );
                }
                self.last_host = Some(host);
            }
            Err(err) => debug!(step = step.as_str(), "postcondition not checked: {err:#}"),
        }
    }

    fn fail(&mut self, step: Option<StepKind>, kind: FailureKind, reason: String) {
        let exit_code = match kind {
            FailureKind::Precondition => EXIT_PRECONDITION,
            FailureKind::Action | FailureKind::Confirmation => EXIT_FAILURE,
        };
        self.fail_with_recovery(step, kind, reason, recovery_for(step, exit_code));
    }

    fn fail_with_recovery(
        &mut self,
        step: Option<StepKind>,
        kind: FailureKind,
        reason: String,
        guidance: RecoveryGuidance,
    ) {
        error!(
            step = step.map(StepKind::as_str).unwrap_or("detect"),
            kind = kind.as_str(),
            "{reason}"
        );
        self.recovery = Some(guidance);
        self.transition(RunState::Failed { kind, reason });
    }

    fn transition(&mut self, next: RunState) {
        debug!("run state {} -> {}", self.state.label(), next.label());
        self.state = next.clone();
        self.transitions.push(next);
    }

    fn finish(self) -> RunSummary {
        info!(
            state = %self.state.label(),
            steps = self.report.entries().len(),
            warnings = self.report.warning_count(),
            "run finished"
        );
        RunSummary {
            state: self.state,
            branch: self.branch,
            host: self.last_host,
            report: self.report,
            recovery: self.recovery,
            backups: self.backups,
            transitions: self.transitions,
            dry_run: self.options.dry_run,
        }
    }
}
