use std::io::{self, Write};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use clap::CommandFactory;
use clap_complete::Shell;
use pveup_core::UpgradeConfig;
use pveup_engine::{
    current_unix_timestamp, recovery_for, AssumeYesGate, RunController, RunOptions, RunSummary,
    StepKind, TerminalGate, EXIT_SUCCESS,
};
use pveup_host::Collaborators;
use tracing::info;

use crate::logging::init_tracing;
use crate::render::{
    current_output_style, format_recovery_lines, format_run_summary_lines, ConsoleObserver,
    TerminalRenderer,
};
use crate::{Cli, Commands};

pub(crate) fn run_cli(cli: Cli) -> Result<i32> {
    let style = current_output_style(cli.plain);
    let renderer = TerminalRenderer::from_style(style);

    match cli.command {
        Commands::Upgrade {
            yes,
            dry_run,
            log_file,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let log_file = log_file.or_else(|| config.general.log_file.clone());
            init_tracing(&config, log_file.as_deref())?;

            let summary = run_upgrade(&config, renderer, yes, RunOptions { dry_run });
            renderer.print_lines(&format_run_summary_lines(&summary, renderer.style()));
            Ok(summary.exit_code())
        }
        Commands::Recovery { step, exit_code } => {
            let step = parse_recovery_step(&step)?;
            renderer.print_lines(&format_recovery_lines(&recovery_for(step, exit_code)));
            Ok(EXIT_SUCCESS)
        }
        Commands::ShowConfig => {
            let config = load_config(cli.config.as_deref())?;
            print!("{}", config.to_toml_string()?);
            Ok(EXIT_SUCCESS)
        }
        Commands::Completions { shell } => {
            let mut stdout = io::stdout().lock();
            write_completions_script(shell, &mut stdout)?;
            Ok(EXIT_SUCCESS)
        }
    }
}

pub(crate) fn load_config(path: Option<&Path>) -> Result<UpgradeConfig> {
    match path {
        Some(path) => UpgradeConfig::load_from_path(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => UpgradeConfig::load_default().context("failed to load default config"),
    }
}

fn run_upgrade(
    config: &UpgradeConfig,
    renderer: TerminalRenderer,
    assume_yes: bool,
    options: RunOptions,
) -> RunSummary {
    let release = &config.release;
    renderer.print_section(&format!(
        "Proxmox VE {} to {} ({} to {})",
        release.source_major, release.target_major, release.source_suite, release.target_suite
    ));
    info!(
        assume_yes,
        dry_run = options.dry_run,
        backup_dir = %config.general.backup_dir.display(),
        "starting upgrade run"
    );

    let collaborators = Collaborators::system(config, current_unix_timestamp());
    let mut observer = ConsoleObserver::new(renderer);
    if assume_yes {
        let mut gate = AssumeYesGate;
        RunController::new(config, &collaborators, &mut gate, &mut observer, options).run()
    } else {
        let mut gate = TerminalGate::stdio();
        RunController::new(config, &collaborators, &mut gate, &mut observer, options).run()
    }
}

/// `detect` names failures raised before the first step.
pub(crate) fn parse_recovery_step(input: &str) -> Result<Option<StepKind>> {
    if input.trim().eq_ignore_ascii_case("detect") {
        return Ok(None);
    }
    StepKind::parse(input).map(Some).ok_or_else(|| {
        let names = StepKind::ALL
            .iter()
            .map(|step| step.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        anyhow!("unknown step '{input}'; expected detect or one of: {names}")
    })
}

pub(crate) fn write_completions_script<W: Write>(shell: Shell, writer: &mut W) -> Result<()> {
    let mut command = Cli::command();
    let mut generated = Vec::new();
    clap_complete::generate(shell, &mut command, "pveup", &mut generated);
    writer
        .write_all(&generated)
        .with_context(|| "failed writing generated completion script")?;
    Ok(())
}
