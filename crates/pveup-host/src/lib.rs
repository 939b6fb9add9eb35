//! External collaborators the upgrade engine drives through narrow interfaces.
//!
//! Each trait has one system implementation that shells out to the host
//! tooling (`pveversion`, `apt-get`, `dpkg-query`, `systemctl`, ...). The
//! engine never embeds their logic and tests replace them with fakes.

use std::path::{Path, PathBuf};

use anyhow::Result;
use pveup_core::{ProbedVersion, UpgradeConfig};

mod apt;
mod boot;
mod checklist;
mod command;
mod fs_utils;
mod probe;
mod repos;
mod services;

pub use apt::AptPackageManager;
pub use boot::SystemBootloader;
pub use checklist::{parse_checklist_summary, ChecklistSummary, CommandChecklist};
pub use command::{run_command, run_command_status, CommandOutput};
pub use probe::{
    count_running_guests, parse_df_available_gb, parse_entropy, parse_loadavg, SystemProbe,
};
pub use repos::{backup_destination, install_verified_keyring, retire_suite_lines, FsRepositoryRewriter};
pub use services::SystemdServices;

pub trait VersionProbe {
    fn probe_version(&self) -> Result<ProbedVersion>;
    fn probe_kernel(&self) -> Result<String>;
    fn probe_disk_free_gb(&self, path: &Path) -> Result<u64>;
    fn probe_network_reachable(&self, host: &str) -> bool;
    fn probe_is_root(&self) -> bool;
    fn probe_cluster_member(&self) -> bool;
    fn probe_running_guests(&self) -> Result<u32>;
    fn probe_entropy(&self) -> Result<u64>;
    fn probe_load_average(&self) -> Result<f64>;
}

pub trait PackageManager {
    fn update_indexes(&self) -> Result<()>;
    /// Returns the raw exit code; callers decide which non-zero codes are tolerable.
    fn dist_upgrade(&self) -> Result<i32>;
    fn install_package(&self, name: &str) -> Result<()>;
    fn remove_package(&self, name: &str) -> Result<()>;
    fn is_package_installed(&self, name: &str) -> Result<bool>;
    fn autoremove(&self) -> Result<()>;
    fn clean(&self) -> Result<()>;
}

pub trait RepositoryRewriter {
    fn read_file(&self, path: &Path) -> Result<Option<String>>;
    /// Copies `path` into the backup tree. Returns `None` when there is nothing to back up.
    fn backup_file(&self, path: &Path) -> Result<Option<PathBuf>>;
    fn write_repository_config(&self, content: &str, path: &Path) -> Result<()>;
    fn fetch_and_verify_keyring(&self, url: &str, expected_sha256: &str, dest: &Path)
        -> Result<()>;
    fn keyring_matches(&self, dest: &Path, expected_sha256: &str) -> Result<bool>;
}

pub trait Bootloader {
    fn update_boot_config(&self) -> Result<()>;
    fn is_uefi(&self) -> bool;
    fn reinstall_boot_package(&self, name: &str) -> Result<()>;
}

pub trait ServiceController {
    fn restart_service(&self, name: &str) -> Result<()>;
    fn is_service_active(&self, name: &str) -> Result<bool>;
}

pub trait MigrationChecklist {
    fn run_checklist(&self) -> Result<ChecklistSummary>;
}

pub struct Collaborators {
    pub probe: Box<dyn VersionProbe>,
    pub packages: Box<dyn PackageManager>,
    pub repositories: Box<dyn RepositoryRewriter>,
    pub boot: Box<dyn Bootloader>,
    pub services: Box<dyn ServiceController>,
    pub checklist: Box<dyn MigrationChecklist>,
}

impl Collaborators {
    pub fn system(config: &UpgradeConfig, run_started_unix: u64) -> Self {
        Self {
            probe: Box::new(SystemProbe::new()),
            packages: Box::new(AptPackageManager::new()),
            repositories: Box::new(FsRepositoryRewriter::new(
                config.general.backup_dir.clone(),
                run_started_unix,
            )),
            boot: Box::new(SystemBootloader::new()),
            services: Box::new(SystemdServices),
            checklist: Box::new(CommandChecklist::new(
                config.checklist.program.clone(),
                config.checklist.args.clone(),
            )),
        }
    }
}

#[cfg(test)]
mod tests;
