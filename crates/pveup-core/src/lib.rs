mod config;
mod host;
mod outcome;
mod version;

pub use config::{
    BootConfig, ChecklistConfig, ConfigError, FloorsConfig, GeneralConfig, KeyringSource,
    ManagedRepository, PackagesConfig, ReleaseConfig, RepositoriesConfig, ServicesConfig,
    StepOverride, UpgradeConfig, DEFAULT_CONFIG_PATH, STEP_NAMES,
};
pub use host::HostState;
pub use outcome::{CheckKind, CheckOutcome, StepOutcome};
pub use version::{classify_version, parse_pveversion, parse_version_triplet, ProbedVersion, VersionSupport};
