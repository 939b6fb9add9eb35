//! Upgrade configuration loaded from TOML, with built-in defaults for the
//! Proxmox VE 8 to 9 (bookworm to trixie) profile.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/pveup/config.toml";

/// Every step name that may appear in `[steps.<name>]` override tables.
pub const STEP_NAMES: &[&str] = &[
    "preflight",
    "requirements",
    "backup-confirmation",
    "upgrade-to-latest-source-release",
    "run-migration-checklist",
    "rewrite-repositories",
    "perform-major-upgrade",
    "install-target-kernel",
    "fix-boot-config",
    "cleanup",
    "verify",
];

const SUITE_PLACEHOLDER: &str = "{suite}";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {reason}")]
    ReadFailed { path: String, reason: String },
    #[error("failed to parse config: {0}")]
    ParseFailed(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct UpgradeConfig {
    pub general: GeneralConfig,
    pub release: ReleaseConfig,
    pub floors: FloorsConfig,
    pub packages: PackagesConfig,
    pub boot: BootConfig,
    pub services: ServicesConfig,
    pub checklist: ChecklistConfig,
    pub repositories: RepositoriesConfig,
    pub keyring: Option<KeyringSource>,
    pub steps: BTreeMap<String, StepOverride>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_file: Option<PathBuf>,
    pub log_level: Option<String>,
    pub backup_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseConfig {
    pub source_major: u64,
    pub target_major: u64,
    pub source_suite: String,
    pub target_suite: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloorsConfig {
    pub min_free_disk_gb: u64,
    pub disk_path: PathBuf,
    pub network_host: String,
    pub min_entropy: u64,
    pub max_load_average: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackagesConfig {
    pub required: Vec<String>,
    pub target_kernel: String,
    pub target_kernel_series: String,
    pub conflicting: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootConfig {
    pub efi_package: String,
    pub bios_package: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    pub names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChecklistConfig {
    pub program: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoriesConfig {
    pub managed: Vec<ManagedRepository>,
    pub legacy: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedRepository {
    pub path: PathBuf,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyringSource {
    pub url: String,
    pub sha256: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StepOverride {
    pub tolerated_exit_codes: Vec<i32>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_file: None,
            log_level: None,
            backup_dir: PathBuf::from("/var/lib/pveup/backups"),
        }
    }
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            source_major: 8,
            target_major: 9,
            source_suite: "bookworm".to_string(),
            target_suite: "trixie".to_string(),
        }
    }
}

impl Default for FloorsConfig {
    fn default() -> Self {
        Self {
            min_free_disk_gb: 5,
            disk_path: PathBuf::from("/"),
            network_host: "download.proxmox.com".to_string(),
            min_entropy: 256,
            max_load_average: 4.0,
        }
    }
}

impl Default for PackagesConfig {
    fn default() -> Self {
        Self {
            required: vec![
                "curl".to_string(),
                "gnupg".to_string(),
                "ca-certificates".to_string(),
            ],
            target_kernel: "proxmox-kernel-6.14".to_string(),
            target_kernel_series: "6.14".to_string(),
            conflicting: vec!["systemd-boot".to_string()],
        }
    }
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            efi_package: "grub-efi-amd64".to_string(),
            bios_package: "grub-pc".to_string(),
        }
    }
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            names: ["pve-cluster", "pvedaemon", "pveproxy", "pvestatd"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

impl Default for ChecklistConfig {
    fn default() -> Self {
        Self {
            program: "pve8to9".to_string(),
            args: vec!["--full".to_string()],
        }
    }
}

impl Default for RepositoriesConfig {
    fn default() -> Self {
        Self {
            managed: vec![
                ManagedRepository {
                    path: PathBuf::from("/etc/apt/sources.list.d/debian.sources"),
                    content: DEBIAN_SOURCES_TEMPLATE.to_string(),
                },
                ManagedRepository {
                    path: PathBuf::from("/etc/apt/sources.list.d/proxmox.sources"),
                    content: PROXMOX_SOURCES_TEMPLATE.to_string(),
                },
            ],
            legacy: vec![
                PathBuf::from("/etc/apt/sources.list"),
                PathBuf::from("/etc/apt/sources.list.d/pve-enterprise.list"),
                PathBuf::from("/etc/apt/sources.list.d/pve-no-subscription.list"),
                PathBuf::from("/etc/apt/sources.list.d/ceph.list"),
            ],
        }
    }
}

const DEBIAN_SOURCES_TEMPLATE: &str = "Types: deb
URIs: http://deb.debian.org/debian/
Suites: {suite} {suite}-updates
Components: main contrib non-free-firmware
Signed-By: /usr/share/keyrings/debian-archive-keyring.gpg

Types: deb
URIs: http://security.debian.org/debian-security/
Suites: {suite}-security
Components: main contrib non-free-firmware
Signed-By: /usr/share/keyrings/debian-archive-keyring.gpg
";

const PROXMOX_SOURCES_TEMPLATE: &str = "Types: deb
URIs: http://download.proxmox.com/debian/pve
Suites: {suite}
Components: pve-no-subscription
Signed-By: /usr/share/keyrings/proxmox-archive-keyring.gpg
";

impl ManagedRepository {
    pub fn render(&self, suite: &str) -> String {
        self.content.replace(SUITE_PLACEHOLDER, suite)
    }
}

impl UpgradeConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(input).map_err(|err| ConfigError::ParseFailed(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|err| ConfigError::ReadFailed {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Loads `/etc/pveup/config.toml` when present, otherwise the built-in profile.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = Path::new(DEFAULT_CONFIG_PATH);
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from_path(path)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(|err| ConfigError::Invalid(err.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let release = &self.release;
        if release.target_major != release.source_major + 1 {
            return Err(ConfigError::Invalid(format!(
                "target_major ({}) must be exactly one above source_major ({})",
                release.target_major, release.source_major
            )));
        }
        if release.source_suite.trim().is_empty() || release.target_suite.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "source_suite and target_suite must not be empty".to_string(),
            ));
        }
        if release.source_suite == release.target_suite {
            return Err(ConfigError::Invalid(format!(
                "source_suite and target_suite must differ (both '{}')",
                release.source_suite
            )));
        }
        if self.packages.target_kernel.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "packages.target_kernel must not be empty".to_string(),
            ));
        }
        for repository in &self.repositories.managed {
            if !repository.path.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "managed repository path must be absolute: {}",
                    repository.path.display()
                )));
            }
        }
        if let Some(keyring) = &self.keyring {
            let valid_hex = keyring.sha256.len() == 64
                && keyring.sha256.chars().all(|ch| ch.is_ascii_hexdigit());
            if !valid_hex {
                return Err(ConfigError::Invalid(format!(
                    "keyring sha256 must be 64 hex characters: '{}'",
                    keyring.sha256
                )));
            }
            if keyring.url.trim().is_empty() {
                return Err(ConfigError::Invalid("keyring url must not be empty".to_string()));
            }
        }
        for name in self.steps.keys() {
            if !STEP_NAMES.contains(&name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "unknown step in [steps.{name}] override"
                )));
            }
        }
        Ok(())
    }

    pub fn tolerated_exit_codes(&self, step_name: &str) -> &[i32] {
        self.steps
            .get(step_name)
            .map(|value| value.tolerated_exit_codes.as_slice())
            .unwrap_or(&[])
    }
}
