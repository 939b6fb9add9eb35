use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{anyhow, Context, Result};
use pveup_core::{parse_pveversion, ProbedVersion};
use tracing::debug;

use crate::command::{run_command, run_command_status};
use crate::VersionProbe;

const ENTROPY_PATH: &str = "/proc/sys/kernel/random/entropy_avail";
const LOADAVG_PATH: &str = "/proc/loadavg";
const COROSYNC_CONF_PATH: &str = "/etc/pve/corosync.conf";

pub struct SystemProbe {
    entropy_path: PathBuf,
    loadavg_path: PathBuf,
    corosync_conf_path: PathBuf,
}

impl SystemProbe {
    pub fn new() -> Self {
        Self {
            entropy_path: PathBuf::from(ENTROPY_PATH),
            loadavg_path: PathBuf::from(LOADAVG_PATH),
            corosync_conf_path: PathBuf::from(COROSYNC_CONF_PATH),
        }
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionProbe for SystemProbe {
    fn probe_version(&self) -> Result<ProbedVersion> {
        let output = match run_command_status(&mut Command::new("pveversion"), "pveversion") {
            Ok(output) => output,
            Err(err) => return Ok(ProbedVersion::Unparseable(format!("{err:#}"))),
        };
        if !output.success() {
            return Ok(ProbedVersion::Unparseable(output.stderr.trim().to_string()));
        }
        Ok(parse_pveversion(&output.stdout))
    }

    fn probe_kernel(&self) -> Result<String> {
        let output = run_command(Command::new("uname").arg("-r"), "uname -r")?;
        Ok(output.stdout.trim().to_string())
    }

    fn probe_disk_free_gb(&self, path: &Path) -> Result<u64> {
        let output = run_command(
            Command::new("df").arg("-P").arg("-k").arg(path),
            "df free space probe",
        )?;
        parse_df_available_gb(&output.stdout)
            .with_context(|| format!("failed to parse df output for {}", path.display()))
    }

    fn probe_network_reachable(&self, host: &str) -> bool {
        let status = Command::new("ping")
            .args(["-c", "1", "-W", "3", host])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match status {
            Ok(status) => status.success(),
            Err(err) => {
                debug!("ping {host} failed to start: {err}");
                false
            }
        }
    }

    fn probe_is_root(&self) -> bool {
        run_command(Command::new("id").arg("-u"), "id -u")
            .map(|output| output.stdout.trim() == "0")
            .unwrap_or(false)
    }

    fn probe_cluster_member(&self) -> bool {
        self.corosync_conf_path.is_file()
    }

    fn probe_running_guests(&self) -> Result<u32> {
        let mut running = 0;
        for program in ["qm", "pct"] {
            match run_command_status(Command::new(program).arg("list"), program) {
                Ok(output) if output.success() => running += count_running_guests(&output.stdout),
                Ok(output) => debug!("{program} list exited with {:?}", output.code),
                Err(err) => debug!("{program} list unavailable: {err:#}"),
            }
        }
        Ok(running)
    }

    fn probe_entropy(&self) -> Result<u64> {
        let raw = fs::read_to_string(&self.entropy_path)
            .with_context(|| format!("failed to read {}", self.entropy_path.display()))?;
        parse_entropy(&raw)
    }

    fn probe_load_average(&self) -> Result<f64> {
        let raw = fs::read_to_string(&self.loadavg_path)
            .with_context(|| format!("failed to read {}", self.loadavg_path.display()))?;
        parse_loadavg(&raw)
    }
}

/// Reads the `Available` column of `df -P -k` output and converts KiB to whole GiB.
pub fn parse_df_available_gb(output: &str) -> Result<u64> {
    let line = output
        .lines()
        .skip(1)
        .find(|line| !line.trim().is_empty())
        .ok_or_else(|| anyhow!("df output has no data line"))?;
    let available_kib = line
        .split_whitespace()
        .nth(3)
        .ok_or_else(|| anyhow!("df data line has no available column: '{line}'"))?
        .parse::<u64>()
        .with_context(|| format!("invalid df available value in '{line}'"))?;
    Ok(available_kib / (1024 * 1024))
}

pub fn parse_loadavg(raw: &str) -> Result<f64> {
    raw.split_whitespace()
        .next()
        .ok_or_else(|| anyhow!("loadavg is empty"))?
        .parse::<f64>()
        .with_context(|| format!("invalid loadavg: '{}'", raw.trim()))
}

pub fn parse_entropy(raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .with_context(|| format!("invalid entropy_avail: '{}'", raw.trim()))
}

/// Counts rows whose status column reads `running` in `qm list` / `pct list` output.
///
/// The status column is located by its header (`STATUS` for qm, `Status` for pct),
/// so a guest named `running` is not counted.
pub fn count_running_guests(output: &str) -> u32 {
    let mut lines = output.lines().filter(|line| !line.trim().is_empty());
    let Some(status_index) = lines.next().and_then(|header| {
        header
            .split_whitespace()
            .position(|column| column.eq_ignore_ascii_case("status"))
    }) else {
        return 0;
    };
    lines
        .filter(|line| {
            line.split_whitespace()
                .nth(status_index)
                .is_some_and(|status| status.eq_ignore_ascii_case("running"))
        })
        .count() as u32
}
