#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CheckKind {
    VersionInRange,
    Privileges,
    DiskSpaceFloor,
    NetworkReachability,
    ClusterMembership,
    RunningWorkloads,
    EntropyFloor,
    LoadFloor,
    BackupConfirmed,
}

impl CheckKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VersionInRange => "version-in-range",
            Self::Privileges => "privileges",
            Self::DiskSpaceFloor => "disk-space-floor",
            Self::NetworkReachability => "network-reachability",
            Self::ClusterMembership => "cluster-membership",
            Self::RunningWorkloads => "running-workloads",
            Self::EntropyFloor => "entropy-floor",
            Self::LoadFloor => "load-floor",
            Self::BackupConfirmed => "disk-backup-confirmed",
        }
    }

    /// Warnings of these kinds must be approved by the operator before the step proceeds.
    pub fn gates_on_warn(self) -> bool {
        matches!(
            self,
            Self::ClusterMembership | Self::RunningWorkloads | Self::BackupConfirmed
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Pass,
    Warn(String),
    Fail(String),
}

impl CheckOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Warn(_) => "warn",
            Self::Fail(_) => "fail",
        }
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, Self::Fail(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Success,
    SuccessWithWarnings(Vec<String>),
    Fatal { code: i32, message: String },
    Skipped(String),
}

impl StepOutcome {
    pub fn fatal(code: i32, message: impl Into<String>) -> Self {
        Self::Fatal {
            code,
            message: message.into(),
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped(reason.into())
    }

    pub fn from_warnings(warnings: Vec<String>) -> Self {
        if warnings.is_empty() {
            Self::Success
        } else {
            Self::SuccessWithWarnings(warnings)
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::SuccessWithWarnings(_) => "success-with-warnings",
            Self::Fatal { .. } => "fatal",
            Self::Skipped(_) => "skipped",
        }
    }

    pub fn halts(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }

    pub fn warnings(&self) -> &[String] {
        match self {
            Self::SuccessWithWarnings(warnings) => warnings,
            _ => &[],
        }
    }

    /// Folds extra warnings into a non-fatal outcome. Fatal and skipped outcomes keep their shape.
    pub fn with_warnings(self, mut extra: Vec<String>) -> Self {
        if extra.is_empty() {
            return self;
        }
        match self {
            Self::Success => Self::SuccessWithWarnings(extra),
            Self::SuccessWithWarnings(existing) => {
                let mut merged = existing;
                merged.append(&mut extra);
                Self::SuccessWithWarnings(merged)
            }
            other => other,
        }
    }

    pub fn detail(&self) -> Option<String> {
        match self {
            Self::Success => None,
            Self::SuccessWithWarnings(warnings) => Some(warnings.join("; ")),
            Self::Fatal { code, message } => Some(format!("code={code}: {message}")),
            Self::Skipped(reason) => Some(reason.clone()),
        }
    }
}
