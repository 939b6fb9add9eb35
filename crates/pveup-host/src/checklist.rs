use std::process::Command;

use anyhow::{anyhow, Result};

use crate::command::run_command_status;
use crate::MigrationChecklist;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChecklistSummary {
    pub passed: u32,
    pub warnings: u32,
    pub failures: u32,
}

/// Runs the vendor upgrade checklist (`pve8to9 --full` by default) and reads its summary block.
pub struct CommandChecklist {
    program: String,
    args: Vec<String>,
}

impl CommandChecklist {
    pub fn new(program: String, args: Vec<String>) -> Self {
        Self { program, args }
    }
}

impl MigrationChecklist for CommandChecklist {
    fn run_checklist(&self) -> Result<ChecklistSummary> {
        let output = run_command_status(
            Command::new(&self.program).args(&self.args),
            &format!("{} checklist", self.program),
        )?;
        parse_checklist_summary(&output.stdout).ok_or_else(|| {
            anyhow!(
                "{} produced no summary (exit {:?})",
                self.program,
                output.code
            )
        })
    }
}

/// Parses the `PASSED:` / `WARNINGS:` / `FAILURES:` summary lines, ignoring ANSI colour codes.
///
/// Counters that are absent are zero (the checklist omits them when nothing was found);
/// output without any `TOTAL:` or `PASSED:` line is not a summary.
pub fn parse_checklist_summary(output: &str) -> Option<ChecklistSummary> {
    let plain = strip_ansi(output);
    let mut summary = ChecklistSummary::default();
    let mut seen_summary = false;

    for line in plain.lines() {
        let Some((key, value)) = line.trim().split_once(':') else {
            continue;
        };
        let Ok(count) = value.trim().parse::<u32>() else {
            continue;
        };
        match key.trim() {
            "TOTAL" => seen_summary = true,
            "PASSED" => {
                seen_summary = true;
                summary.passed = count;
            }
            "WARNINGS" => summary.warnings = count,
            "FAILURES" => summary.failures = count,
            _ => {}
        }
    }

    seen_summary.then_some(summary)
}

fn strip_ansi(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\u{1b}' {
            out.push(ch);
            continue;
        }
        if chars.peek() == Some(&'[') {
            chars.next();
            for next in chars.by_ref() {
                if next.is_ascii_alphabetic() {
                    break;
                }
            }
        }
    }
    out
}
