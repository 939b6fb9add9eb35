use pveup_core::{CheckKind, HostState, UpgradeConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    Preflight,
    Requirements,
    BackupConfirmation,
    UpgradeToLatestSourceRelease,
    RunMigrationChecklist,
    RewriteRepositories,
    PerformMajorUpgrade,
    InstallTargetKernel,
    FixBootConfig,
    Cleanup,
    Verify,
}

impl StepKind {
    pub const ALL: [StepKind; 11] = [
        Self::Preflight,
        Self::Requirements,
        Self::BackupConfirmation,
        Self::UpgradeToLatestSourceRelease,
        Self::RunMigrationChecklist,
        Self::RewriteRepositories,
        Self::PerformMajorUpgrade,
        Self::InstallTargetKernel,
        Self::FixBootConfig,
        Self::Cleanup,
        Self::Verify,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Preflight => "preflight",
            Self::Requirements => "requirements",
            Self::BackupConfirmation => "backup-confirmation",
            Self::UpgradeToLatestSourceRelease => "upgrade-to-latest-source-release",
            Self::RunMigrationChecklist => "run-migration-checklist",
            Self::RewriteRepositories => "rewrite-repositories",
            Self::PerformMajorUpgrade => "perform-major-upgrade",
            Self::InstallTargetKernel => "install-target-kernel",
            Self::FixBootConfig => "fix-boot-config",
            Self::Cleanup => "cleanup",
            Self::Verify => "verify",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        let normalized = input.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|step| step.as_str() == normalized)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Preflight => "Pre-flight checks",
            Self::Requirements => "Install required tools",
            Self::BackupConfirmation => "Confirm backups",
            Self::UpgradeToLatestSourceRelease => "Upgrade to latest source release",
            Self::RunMigrationChecklist => "Run migration checklist",
            Self::RewriteRepositories => "Rewrite package repositories",
            Self::PerformMajorUpgrade => "Perform major upgrade",
            Self::InstallTargetKernel => "Install target kernel",
            Self::FixBootConfig => "Fix boot configuration",
            Self::Cleanup => "Clean up packages",
            Self::Verify => "Verify upgraded host",
        }
    }

    pub fn precondition_checks(self) -> &'static [CheckKind] {
        match self {
            Self::Preflight => &[
                CheckKind::Privileges,
                CheckKind::DiskSpaceFloor,
                CheckKind::NetworkReachability,
                CheckKind::EntropyFloor,
                CheckKind::LoadFloor,
                CheckKind::ClusterMembership,
                CheckKind::RunningWorkloads,
            ],
            Self::BackupConfirmation => &[CheckKind::BackupConfirmed],
            Self::UpgradeToLatestSourceRelease => &[CheckKind::VersionInRange],
            Self::PerformMajorUpgrade => {
                &[CheckKind::VersionInRange, CheckKind::NetworkReachability]
            }
            Self::Requirements
            | Self::RunMigrationChecklist
            | Self::RewriteRepositories
            | Self::InstallTargetKernel
            | Self::FixBootConfig
            | Self::Cleanup
            | Self::Verify => &[],
        }
    }

    /// Action warnings of these steps must be approved before the run continues.
    pub fn requires_confirmation(self) -> bool {
        matches!(
            self,
            Self::Preflight | Self::BackupConfirmation | Self::RunMigrationChecklist
        )
    }

    /// Logged only; some postconditions need a reboot the pipeline cannot perform.
    pub fn postcondition(self, host: &HostState, config: &UpgradeConfig) -> bool {
        let release = &config.release;
        match self {
            Self::UpgradeToLatestSourceRelease => {
                host.is_at_major(release.source_major) || host.is_at_major(release.target_major)
            }
            Self::PerformMajorUpgrade | Self::Verify => host.is_at_major(release.target_major),
            Self::InstallTargetKernel => {
                host.runs_kernel_series(&config.packages.target_kernel_series)
            }
            Self::Preflight
            | Self::Requirements
            | Self::BackupConfirmation
            | Self::RunMigrationChecklist
            | Self::RewriteRepositories
            | Self::FixBootConfig
            | Self::Cleanup => true,
        }
    }
}
