use pveup_core::CheckKind;

use crate::steps::StepKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    Network,
    PackageManager,
    BootConfiguration,
    Unknown,
}

impl FailureCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::PackageManager => "package-manager",
            Self::BootConfiguration => "boot-configuration",
            Self::Unknown => "unknown",
        }
    }

    pub fn for_step(step: Option<StepKind>) -> Self {
        match step {
            Some(StepKind::RewriteRepositories) => Self::Network,
            Some(
                StepKind::Requirements
                | StepKind::UpgradeToLatestSourceRelease
                | StepKind::PerformMajorUpgrade
                | StepKind::Cleanup,
            ) => Self::PackageManager,
            Some(StepKind::InstallTargetKernel | StepKind::FixBootConfig) => {
                Self::BootConfiguration
            }
            Some(
                StepKind::Preflight
                | StepKind::BackupConfirmation
                | StepKind::RunMigrationChecklist
                | StepKind::Verify,
            )
            | None => Self::Unknown,
        }
    }

    /// Categories implied by a failing precondition, independent of the step it gated.
    pub fn for_check(check: CheckKind) -> Option<Self> {
        match check {
            CheckKind::NetworkReachability => Some(Self::Network),
            CheckKind::DiskSpaceFloor => Some(Self::PackageManager),
            CheckKind::VersionInRange
            | CheckKind::Privileges
            | CheckKind::ClusterMembership
            | CheckKind::RunningWorkloads
            | CheckKind::EntropyFloor
            | CheckKind::LoadFloor
            | CheckKind::BackupConfirmed => None,
        }
    }

    /// Ordered operator actions. Never executed automatically.
    pub fn actions(self) -> &'static [&'static str] {
        match self {
            Self::Network => &[
                "check connectivity: ping -c 3 download.proxmox.com && ping -c 3 deb.debian.org",
                "check name resolution in /etc/resolv.conf and any proxy in /etc/apt/apt.conf.d/",
                "inspect repository files under /etc/apt/sources.list.d/ (backups are listed below)",
                "re-run `pveup upgrade`; completed steps are detected and skipped",
            ],
            Self::PackageManager => &[
                "finish interrupted package operations: dpkg --configure -a",
                "repair broken dependencies: apt-get -f install",
                "retry the upgrade manually: apt-get update && apt-get dist-upgrade",
                "review /var/log/apt/term.log for the failing package",
                "do not reboot until `dpkg --audit` reports nothing",
            ],
            Self::BootConfiguration => &[
                "inspect boot setup: proxmox-boot-tool status",
                "regenerate boot entries: update-grub (or proxmox-boot-tool refresh)",
                "reinstall the bootloader package: apt-get install --reinstall grub-efi-amd64",
                "confirm a kernel is installed: ls /boot/vmlinuz-*",
                "keep a rescue medium at hand before rebooting",
            ],
            Self::Unknown => &[
                "read the run log for the failing step",
                "check free space with df -h / and host load with uptime",
                "restore rewritten files from the backups listed below if needed",
                "re-run `pveup upgrade`; all steps are safe to repeat",
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryGuidance {
    pub step: Option<StepKind>,
    pub exit_code: i32,
    pub category: FailureCategory,
    pub actions: Vec<&'static str>,
}

pub fn recovery_for(step: Option<StepKind>, exit_code: i32) -> RecoveryGuidance {
    let category = FailureCategory::for_step(step);
    RecoveryGuidance {
        step,
        exit_code,
        category,
        actions: category.actions().to_vec(),
    }
}

pub fn recovery_for_check(
    step: Option<StepKind>,
    check: CheckKind,
    exit_code: i32,
) -> RecoveryGuidance {
    let category =
        FailureCategory::for_check(check).unwrap_or_else(|| FailureCategory::for_step(step));
    RecoveryGuidance {
        step,
        exit_code,
        category,
        actions: category.actions().to_vec(),
    }
}
