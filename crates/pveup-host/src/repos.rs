use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use pveup_security::{sha256_hex, verify_sha256, verify_sha256_file};
use tracing::info;

use crate::fs_utils::write_file_atomically;
use crate::RepositoryRewriter;

const KEYRING_FETCH_TIMEOUT: Duration = Duration::from_secs(60);
const RETIRED_LINE_PREFIX: &str = "# disabled by pveup: ";

/// Rewrites APT sources on the local filesystem, backing files up under
/// `<backup_root>/<run timestamp>/<absolute path>` before they change.
pub struct FsRepositoryRewriter {
    backup_root: PathBuf,
    run_started_unix: u64,
}

impl FsRepositoryRewriter {
    pub fn new(backup_root: PathBuf, run_started_unix: u64) -> Self {
        Self {
            backup_root,
            run_started_unix,
        }
    }

    pub fn backup_run_dir(&self) -> PathBuf {
        self.backup_root.join(self.run_started_unix.to_string())
    }
}

impl RepositoryRewriter for FsRepositoryRewriter {
    fn read_file(&self, path: &Path) -> Result<Option<String>> {
        match fs::read_to_string(path) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    fn backup_file(&self, path: &Path) -> Result<Option<PathBuf>> {
        if !path.is_file() {
            return Ok(None);
        }

        let destination = backup_destination(&self.backup_run_dir(), path);
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create backup dir {}", parent.display()))?;
        }
        fs::copy(path, &destination).with_context(|| {
            format!(
                "failed to back up {} to {}",
                path.display(),
                destination.display()
            )
        })?;
        info!(
            "backed up {} to {}",
            path.display(),
            destination.display()
        );
        Ok(Some(destination))
    }

    fn write_repository_config(&self, content: &str, path: &Path) -> Result<()> {
        write_file_atomically(path, content.as_bytes())
            .with_context(|| format!("failed to write repository config {}", path.display()))?;
        info!("wrote repository config {}", path.display());
        Ok(())
    }

    fn fetch_and_verify_keyring(
        &self,
        url: &str,
        expected_sha256: &str,
        dest: &Path,
    ) -> Result<()> {
        let client = reqwest::blocking::Client::builder()
            .timeout(KEYRING_FETCH_TIMEOUT)
            .build()
            .context("failed to build http client")?;
        let payload = client
            .get(url)
            .send()
            .with_context(|| format!("failed to fetch keyring {url}"))?
            .error_for_status()
            .with_context(|| format!("keyring download rejected: {url}"))?
            .bytes()
            .with_context(|| format!("failed to read keyring body from {url}"))?;

        install_verified_keyring(&payload, expected_sha256, dest)
            .with_context(|| format!("keyring from {url} was not installed"))?;
        info!("installed verified keyring {}", dest.display());
        Ok(())
    }

    fn keyring_matches(&self, dest: &Path, expected_sha256: &str) -> Result<bool> {
        if !dest.is_file() {
            return Ok(false);
        }
        verify_sha256_file(dest, expected_sha256)
    }
}

/// Picks a backup path that mirrors `path` under `run_dir` without clobbering an earlier copy.
pub fn backup_destination(run_dir: &Path, path: &Path) -> PathBuf {
    let relative = path
        .components()
        .filter(|component| matches!(component, Component::Normal(_)))
        .collect::<PathBuf>();
    let base = run_dir.join(relative);
    if !base.exists() {
        return base;
    }

    let file_name = base
        .file_name()
        .and_then(|value| value.to_str())
        .unwrap_or("backup")
        .to_string();
    let mut sequence = 1_u32;
    loop {
        let candidate = base.with_file_name(format!("{file_name}.{sequence}"));
        if !candidate.exists() {
            return candidate;
        }
        sequence += 1;
    }
}

/// Verifies `payload` against `expected_sha256` and only then writes it to `dest`.
pub fn install_verified_keyring(payload: &[u8], expected_sha256: &str, dest: &Path) -> Result<()> {
    if !verify_sha256(payload, expected_sha256)? {
        return Err(anyhow!(
            "keyring checksum mismatch: expected {}, got {}",
            expected_sha256.trim().to_ascii_lowercase(),
            sha256_hex(payload)
        ));
    }
    write_file_atomically(dest, payload)
}

/// Comments out active `deb`/`deb-src` lines that reference `suite`.
///
/// Returns `None` when nothing needs to change, so callers can skip the backup and write.
pub fn retire_suite_lines(content: &str, suite: &str) -> Option<String> {
    let mut changed = false;
    let mut lines = Vec::new();
    for line in content.lines() {
        if is_active_source_line_for_suite(line, suite) {
            changed = true;
            lines.push(format!("{RETIRED_LINE_PREFIX}{line}"));
        } else {
            lines.push(line.to_string());
        }
    }

    if !changed {
        return None;
    }
    let mut rewritten = lines.join("\n");
    if content.ends_with('\n') {
        rewritten.push('\n');
    }
    Some(rewritten)
}

fn is_active_source_line_for_suite(line: &str, suite: &str) -> bool {
    let trimmed = line.trim_start();
    if !(trimmed.starts_with("deb ") || trimmed.starts_with("deb-src ")) {
        return false;
    }
    let dashed = format!("{suite}-");
    let slashed = format!("{suite}/");
    trimmed.split_whitespace().skip(1).any(|token| {
        token == suite || token.starts_with(&dashed) || token.starts_with(&slashed)
    })
}
