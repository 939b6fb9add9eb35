use crate::version::ProbedVersion;

/// Point-in-time snapshot of the observable host facts.
///
/// Sampled fresh before every precondition evaluation; never cached across steps.
#[derive(Debug, Clone, PartialEq)]
pub struct HostState {
    pub version: ProbedVersion,
    pub kernel: String,
    pub is_root: bool,
    pub is_cluster: bool,
    pub free_disk_gb: u64,
    pub entropy_available: u64,
    pub load_average: f64,
    pub network_reachable: bool,
    pub running_guests: u32,
}

impl HostState {
    pub fn version_major(&self) -> Option<u64> {
        self.version.major()
    }

    pub fn is_at_major(&self, major: u64) -> bool {
        self.version_major() == Some(major)
    }

    pub fn runs_kernel_series(&self, series: &str) -> bool {
        let series = series.trim();
        if series.is_empty() {
            return false;
        }
        match self.kernel.strip_prefix(series) {
            Some(rest) => rest.is_empty() || rest.starts_with(['.', '-']),
            None => false,
        }
    }

    pub fn summary_line(&self) -> String {
        format!(
            "version={} kernel={} cluster={} free_disk_gb={} entropy={} load={:.2} network={} running_guests={}",
            self.version.describe(),
            if self.kernel.is_empty() { "<unknown>" } else { self.kernel.as_str() },
            self.is_cluster,
            self.free_disk_gb,
            self.entropy_available,
            self.load_average,
            if self.network_reachable { "ok" } else { "unreachable" },
            self.running_guests
        )
    }
}
