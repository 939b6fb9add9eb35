use anyhow::{Context, Result};
use pveup_core::{classify_version, CheckKind, CheckOutcome, HostState, UpgradeConfig, VersionSupport};
use pveup_host::VersionProbe;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub kind: CheckKind,
    pub outcome: CheckOutcome,
}

/// Samples every host fact the checks look at. Called fresh before each step.
pub fn sample_host(probe: &dyn VersionProbe, config: &UpgradeConfig) -> Result<HostState> {
    Ok(HostState {
        version: probe.probe_version().context("failed to probe version")?,
        kernel: probe.probe_kernel().context("failed to probe kernel")?,
        is_root: probe.probe_is_root(),
        is_cluster: probe.probe_cluster_member(),
        free_disk_gb: probe
            .probe_disk_free_gb(&config.floors.disk_path)
            .context("failed to probe free disk space")?,
        entropy_available: probe.probe_entropy().context("failed to probe entropy")?,
        load_average: probe
            .probe_load_average()
            .context("failed to probe load average")?,
        network_reachable: probe.probe_network_reachable(&config.floors.network_host),
        running_guests: probe
            .probe_running_guests()
            .context("failed to probe running guests")?,
    })
}

pub fn check(kind: CheckKind, host: &HostState, config: &UpgradeConfig) -> CheckOutcome {
    let floors = &config.floors;
    match kind {
        CheckKind::VersionInRange => {
            let target = config.release.target_major;
            match classify_version(&host.version, target) {
                VersionSupport::AtTarget | VersionSupport::OneMajorBelow => CheckOutcome::Pass,
                VersionSupport::Unsupported => CheckOutcome::Fail(format!(
                    "unsupported version {}: expected {}.x or {}.x",
                    host.version.describe(),
                    config.release.source_major,
                    target
                )),
            }
        }
        CheckKind::Privileges => {
            if host.is_root {
                CheckOutcome::Pass
            } else {
                CheckOutcome::Fail("must run as root".to_string())
            }
        }
        CheckKind::DiskSpaceFloor => {
            if host.free_disk_gb >= floors.min_free_disk_gb {
                CheckOutcome::Pass
            } else {
                CheckOutcome::Fail(format!(
                    "only {} GB free on {}, at least {} GB required",
                    host.free_disk_gb,
                    floors.disk_path.display(),
                    floors.min_free_disk_gb
                ))
            }
        }
        CheckKind::NetworkReachability => {
            if host.network_reachable {
                CheckOutcome::Pass
            } else {
                CheckOutcome::Fail(format!("cannot reach {}", floors.network_host))
            }
        }
        CheckKind::ClusterMembership => {
            if host.is_cluster {
                CheckOutcome::Warn(
                    "host is a cluster member; upgrade one node at a time and keep quorum"
                        .to_string(),
                )
            } else {
                CheckOutcome::Pass
            }
        }
        CheckKind::RunningWorkloads => {
            if host.running_guests > 0 {
                CheckOutcome::Warn(format!(
                    "{} guest(s) running; migrate or shut them down before the upgrade",
                    host.running_guests
                ))
            } else {
                CheckOutcome::Pass
            }
        }
        CheckKind::EntropyFloor => {
            if host.entropy_available >= floors.min_entropy {
                CheckOutcome::Pass
            } else {
                CheckOutcome::Warn(format!(
                    "available entropy {} below {}",
                    host.entropy_available, floors.min_entropy
                ))
            }
        }
        CheckKind::LoadFloor => {
            if host.load_average <= floors.max_load_average {
                CheckOutcome::Pass
            } else {
                CheckOutcome::Warn(format!(
                    "load average {:.2} above {:.2}",
                    host.load_average, floors.max_load_average
                ))
            }
        }
        CheckKind::BackupConfirmed => CheckOutcome::Warn(
            "confirm that all guests and /etc/pve have a current, restorable backup".to_string(),
        ),
    }
}

pub fn evaluate_checks(kinds: &[CheckKind], host: &HostState, config: &UpgradeConfig) -> Vec<CheckResult> {
    kinds
        .iter()
        .map(|kind| CheckResult {
            kind: *kind,
            outcome: check(*kind, host, config),
        })
        .collect()
}
