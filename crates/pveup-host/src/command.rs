use std::process::Command;

use anyhow::{anyhow, Context, Result};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs `command` to completion and captures its output without judging the exit status.
pub fn run_command_status(command: &mut Command, context_message: &str) -> Result<CommandOutput> {
    debug!(command = ?command, "running {context_message}");
    let output = command
        .output()
        .with_context(|| format!("{context_message}: command failed to start"))?;

    let captured = CommandOutput {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };
    for line in captured.stdout.lines().chain(captured.stderr.lines()) {
        debug!("{context_message}: {}", line.replace('\r', ""));
    }
    Ok(captured)
}

pub fn run_command(command: &mut Command, context_message: &str) -> Result<CommandOutput> {
    let output = run_command_status(command, context_message)?;
    if output.success() {
        return Ok(output);
    }

    Err(anyhow!(
        "{context_message}: status={} stdout='{}' stderr='{}'",
        output
            .code
            .map(|code| code.to_string())
            .unwrap_or_else(|| "signal".to_string()),
        last_lines(&output.stdout, 5),
        last_lines(&output.stderr, 5)
    ))
}

fn last_lines(text: &str, count: usize) -> String {
    let lines = text.trim().lines().collect::<Vec<_>>();
    let start = lines.len().saturating_sub(count);
    lines[start..].join(" | ")
}
