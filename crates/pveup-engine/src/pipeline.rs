use pveup_core::{classify_version, HostState, UpgradeConfig, VersionSupport};
use tracing::debug;

use crate::steps::StepKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    /// Host already runs the target major: repair boot, clean up, verify.
    VerifyRepair,
    /// Host is one major below the target.
    FullUpgrade,
}

impl Branch {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VerifyRepair => "verify-repair",
            Self::FullUpgrade => "full-upgrade",
        }
    }

    pub fn steps(self) -> &'static [StepKind] {
        match self {
            Self::VerifyRepair => &[StepKind::FixBootConfig, StepKind::Cleanup, StepKind::Verify],
            Self::FullUpgrade => &[
                StepKind::Preflight,
                StepKind::Requirements,
                StepKind::BackupConfirmation,
                StepKind::UpgradeToLatestSourceRelease,
                StepKind::RunMigrationChecklist,
                StepKind::RewriteRepositories,
                StepKind::PerformMajorUpgrade,
                StepKind::InstallTargetKernel,
                StepKind::Cleanup,
                StepKind::Verify,
            ],
        }
    }
}

/// Ordered steps for one run; fixed once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    branch: Branch,
    steps: Vec<StepKind>,
}

impl Pipeline {
    pub fn for_branch(branch: Branch) -> Self {
        Self {
            branch,
            steps: branch.steps().to_vec(),
        }
    }

    pub fn branch(&self) -> Branch {
        self.branch
    }

    pub fn steps(&self) -> &[StepKind] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

pub fn select_branch(host: &HostState, config: &UpgradeConfig) -> Option<Branch> {
    let support = classify_version(&host.version, config.release.target_major);
    debug!(
        version = %host.version.describe(),
        support = support.as_str(),
        "classified host version"
    );
    match support {
        VersionSupport::AtTarget => Some(Branch::VerifyRepair),
        VersionSupport::OneMajorBelow => Some(Branch::FullUpgrade),
        VersionSupport::Unsupported => None,
    }
}

pub fn build_pipeline(host: &HostState, config: &UpgradeConfig) -> Option<Pipeline> {
    select_branch(host, config).map(Pipeline::for_branch)
}
