//! Step actions. Every action checks whether its effect is already in place
//! before mutating the host, so a run restarted from the first step converges
//! on the same end state.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use pveup_core::{HostState, StepOutcome, UpgradeConfig};
use pveup_host::{retire_suite_lines, Collaborators};
use tracing::{info, warn};

use crate::steps::StepKind;
use crate::EXIT_FAILURE;

pub struct StepContext<'a> {
    pub config: &'a UpgradeConfig,
    pub host: &'a Collaborators,
    pub state: &'a HostState,
    pub backups: &'a mut Vec<PathBuf>,
}

pub fn run_step(step: StepKind, ctx: &mut StepContext) -> Result<StepOutcome> {
    match step {
        StepKind::Preflight => run_preflight(ctx),
        StepKind::Requirements => ensure_required_packages(ctx),
        StepKind::BackupConfirmation => Ok(StepOutcome::Success),
        StepKind::UpgradeToLatestSourceRelease => {
            upgrade_packages(ctx, step, "already on the target release")
        }
        StepKind::RunMigrationChecklist => run_migration_checklist(ctx),
        StepKind::RewriteRepositories => rewrite_repositories(ctx),
        StepKind::PerformMajorUpgrade => upgrade_packages(ctx, step, "major upgrade already applied"),
        StepKind::InstallTargetKernel => install_target_kernel(ctx),
        StepKind::FixBootConfig => fix_boot_config(ctx),
        StepKind::Cleanup => cleanup_packages(ctx),
        StepKind::Verify => verify_host(ctx),
    }
}

fn run_preflight(ctx: &mut StepContext) -> Result<StepOutcome> {
    info!("host: {}", ctx.state.summary_line());
    Ok(StepOutcome::Success)
}

fn ensure_required_packages(ctx: &mut StepContext) -> Result<StepOutcome> {
    let packages = ctx.host.packages.as_ref();
    let mut installed = Vec::new();
    let mut indexes_refreshed = false;

    for name in &ctx.config.packages.required {
        if packages.is_package_installed(name)? {
            continue;
        }
        if !indexes_refreshed {
            packages.update_indexes()?;
            indexes_refreshed = true;
        }
        // One install attempt, then re-check; a second failure is fatal.
        packages.install_package(name)?;
        if !packages.is_package_installed(name)? {
            return Ok(StepOutcome::fatal(
                EXIT_FAILURE,
                format!("required package '{name}' still missing after install"),
            ));
        }
        installed.push(name.as_str());
    }

    if installed.is_empty() {
        return Ok(StepOutcome::skipped("all required packages present"));
    }
    info!("installed required packages: {}", installed.join(", "));
    Ok(StepOutcome::Success)
}

fn upgrade_packages(ctx: &mut StepContext, step: StepKind, applied_reason: &str) -> Result<StepOutcome> {
    if ctx.state.is_at_major(ctx.config.release.target_major) {
        return Ok(StepOutcome::skipped(applied_reason));
    }
    // A dist-upgrade against target-suite sources would be the major upgrade itself.
    if step == StepKind::UpgradeToLatestSourceRelease {
        if let Some(path) = repository_already_on_target(ctx)? {
            return Ok(StepOutcome::skipped(format!(
                "{} already targets {}; the major upgrade runs in {}",
                path.display(),
                ctx.config.release.target_suite,
                StepKind::PerformMajorUpgrade.as_str()
            )));
        }
    }

    let packages = ctx.host.packages.as_ref();
    packages.update_indexes()?;
    let code = packages.dist_upgrade()?;
    Ok(exit_code_outcome(ctx.config, step, code))
}

fn repository_already_on_target<'c>(ctx: &'c StepContext) -> Result<Option<&'c Path>> {
    let target_suite = &ctx.config.release.target_suite;
    for managed in &ctx.config.repositories.managed {
        let current = ctx.host.repositories.read_file(&managed.path)?;
        if current.as_deref() == Some(managed.render(target_suite).as_str()) {
            return Ok(Some(&managed.path));
        }
    }
    Ok(None)
}

/// Non-zero package-manager codes are fatal unless the step lists them in
/// `[steps.<name>] tolerated_exit_codes`.
fn exit_code_outcome(config: &UpgradeConfig, step: StepKind, code: i32) -> StepOutcome {
    if code == 0 {
        return StepOutcome::Success;
    }
    if config.tolerated_exit_codes(step.as_str()).contains(&code) {
        warn!("dist-upgrade exited with tolerated code {code}");
        return StepOutcome::SuccessWithWarnings(vec![format!(
            "dist-upgrade exited with code {code} (tolerated by configuration)"
        )]);
    }
    StepOutcome::fatal(code, format!("dist-upgrade exited with code {code}"))
}

fn run_migration_checklist(ctx: &mut StepContext) -> Result<StepOutcome> {
    let summary = ctx
        .host
        .checklist
        .run_checklist()
        .context("migration checklist did not complete")?;

    if summary.failures > 0 {
        return Ok(StepOutcome::fatal(
            EXIT_FAILURE,
            format!(
                "migration checklist reported {} failure(s); resolve them and re-run",
                summary.failures
            ),
        ));
    }
    if summary.warnings > 0 {
        return Ok(StepOutcome::SuccessWithWarnings(vec![format!(
            "migration checklist reported {} warning(s); review its output before continuing",
            summary.warnings
        )]));
    }
    Ok(StepOutcome::Success)
}

fn rewrite_repositories(ctx: &mut StepContext) -> Result<StepOutcome> {
    let repositories = ctx.host.repositories.as_ref();
    let release = &ctx.config.release;
    let mut changed = 0_usize;

    for path in &ctx.config.repositories.legacy {
        let Some(content) = repositories.read_file(path)? else {
            continue;
        };
        let Some(rewritten) = retire_suite_lines(&content, &release.source_suite) else {
            continue;
        };
        if let Some(backup) = repositories.backup_file(path)? {
            ctx.backups.push(backup);
        }
        repositories.write_repository_config(&rewritten, path)?;
        changed += 1;
    }

    for managed in &ctx.config.repositories.managed {
        let desired = managed.render(&release.target_suite);
        let current = repositories.read_file(&managed.path)?;
        if current.as_deref() == Some(desired.as_str()) {
            continue;
        }
        if current.is_some() {
            if let Some(backup) = repositories.backup_file(&managed.path)? {
                ctx.backups.push(backup);
            }
        }
        repositories.write_repository_config(&desired, &managed.path)?;
        changed += 1;
    }

    if let Some(keyring) = &ctx.config.keyring {
        if !repositories.keyring_matches(&keyring.path, &keyring.sha256)? {
            if let Some(backup) = repositories.backup_file(&keyring.path)? {
                ctx.backups.push(backup);
            }
            repositories
                .fetch_and_verify_keyring(&keyring.url, &keyring.sha256, &keyring.path)
                .context("keyring verification failed")?;
            changed += 1;
        }
    }

    if changed == 0 {
        return Ok(StepOutcome::skipped(format!(
            "repositories already target {}",
            release.target_suite
        )));
    }
    info!("updated {changed} repository file(s) for {}", release.target_suite);
    Ok(StepOutcome::Success)
}

fn install_target_kernel(ctx: &mut StepContext) -> Result<StepOutcome> {
    let kernel = &ctx.config.packages.target_kernel;
    let packages = ctx.host.packages.as_ref();
    if packages.is_package_installed(kernel)? {
        return Ok(StepOutcome::skipped(format!("{kernel} already installed")));
    }

    packages.install_package(kernel)?;
    ctx.host
        .boot
        .update_boot_config()
        .context("boot config update after kernel install failed")?;
    Ok(StepOutcome::Success)
}

fn fix_boot_config(ctx: &mut StepContext) -> Result<StepOutcome> {
    let boot = ctx.host.boot.as_ref();
    let packages = ctx.host.packages.as_ref();
    let boot_package = if boot.is_uefi() {
        &ctx.config.boot.efi_package
    } else {
        &ctx.config.boot.bios_package
    };

    let mut warnings = Vec::new();
    if !packages.is_package_installed(boot_package)? {
        packages.install_package(boot_package)?;
        warnings.push(format!("installed missing boot package {boot_package}"));
    }

    if let Err(err) = boot.update_boot_config() {
        warn!("boot config update failed, reinstalling {boot_package}: {err:#}");
        boot.reinstall_boot_package(boot_package)?;
        boot.update_boot_config()
            .context("boot config update failed after reinstalling the boot package")?;
        warnings.push(format!(
            "boot config update needed a reinstall of {boot_package}"
        ));
    }

    Ok(StepOutcome::from_warnings(warnings))
}

fn cleanup_packages(ctx: &mut StepContext) -> Result<StepOutcome> {
    let packages = ctx.host.packages.as_ref();
    if ctx.host.boot.is_uefi() {
        // UEFI hosts may boot through these packages via proxmox-boot-tool.
        info!(
            "UEFI host, keeping boot-related packages: {}",
            ctx.config.packages.conflicting.join(", ")
        );
    } else {
        for name in &ctx.config.packages.conflicting {
            if packages.is_package_installed(name)? {
                packages.remove_package(name)?;
            }
        }
    }
    packages.autoremove()?;
    packages.clean()?;
    Ok(StepOutcome::Success)
}

fn verify_host(ctx: &mut StepContext) -> Result<StepOutcome> {
    let target = ctx.config.release.target_major;
    if !ctx.state.is_at_major(target) {
        return Ok(StepOutcome::fatal(
            EXIT_FAILURE,
            format!(
                "host reports version {} after the upgrade, expected {target}.x",
                ctx.state.version.describe()
            ),
        ));
    }

    let services = ctx.host.services.as_ref();
    let mut warnings = Vec::new();
    for name in &ctx.config.services.names {
        if services.is_service_active(name)? {
            continue;
        }
        services.restart_service(name)?;
        if !services.is_service_active(name)? {
            warnings.push(format!("service {name} is not active after a restart"));
        }
    }

    let series = &ctx.config.packages.target_kernel_series;
    if !ctx.state.runs_kernel_series(series) {
        warnings.push(format!(
            "running kernel {} is not from the {series} series; reboot to finish the upgrade",
            ctx.state.kernel
        ));
    }

    Ok(StepOutcome::from_warnings(warnings))
}
