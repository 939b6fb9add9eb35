use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use pveup_engine::EXIT_FAILURE;

mod dispatch;
mod logging;
mod render;

#[derive(Parser, Debug)]
#[command(name = "pveup")]
#[command(about = "Staged Proxmox VE major-version upgrade orchestrator", long_about = None)]
struct Cli {
    /// Configuration file; defaults to /etc/pveup/config.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Plain output without colors, badges or spinners.
    #[arg(long, global = true)]
    plain: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Detect the host state and run the matching upgrade pipeline.
    Upgrade {
        /// Approve every confirmation without prompting.
        #[arg(long)]
        yes: bool,
        /// Evaluate detection and step preconditions only.
        #[arg(long)]
        dry_run: bool,
        /// Append a debug-level run log to this file.
        #[arg(long)]
        log_file: Option<PathBuf>,
    },
    /// Print the recovery checklist for a failing step.
    Recovery {
        /// Step name, or `detect` for failures before the first step.
        step: String,
        #[arg(long, default_value_t = EXIT_FAILURE)]
        exit_code: i32,
    },
    /// Print the effective configuration as TOML.
    ShowConfig,
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match dispatch::run_cli(cli) {
        Ok(code) => process_exit_code(code),
        Err(err) => {
            eprintln!("error: {err:#}");
            process_exit_code(EXIT_FAILURE)
        }
    }
}

fn process_exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
