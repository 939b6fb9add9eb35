use std::io::{self, IsTerminal};
use std::time::{Duration, Instant};

use anstyle::{AnsiColor, Effects, Style};
use indicatif::{ProgressBar, ProgressStyle};
use pveup_core::StepOutcome;
use pveup_engine::{RecoveryGuidance, ReportEntry, ReportObserver, RunState, RunSummary, StepKind};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct TerminalRenderer {
    style: OutputStyle,
}

impl TerminalRenderer {
    pub(crate) fn from_style(style: OutputStyle) -> Self {
        Self { style }
    }

    pub(crate) fn style(self) -> OutputStyle {
        self.style
    }

    pub(crate) fn print_status(self, status: &str, message: &str) {
        let line = render_status_line(self.style, status, message);
        match self.style {
            OutputStyle::Plain => println!("{line}"),
            OutputStyle::Rich => println!("{}", colorize(status_style(status), &line)),
        }
    }

    pub(crate) fn print_section(self, title: &str) {
        if let Some(line) = render_section_header(self.style, title) {
            println!();
            println!("{}", colorize(section_style(), &line));
        }
    }

    pub(crate) fn print_lines(self, lines: &[String]) {
        for line in lines {
            println!("{line}");
        }
    }
}

/// Console side of a run: one status line per step, a spinner while an action runs.
pub(crate) struct ConsoleObserver {
    renderer: TerminalRenderer,
    spinner: Option<ProgressBar>,
    started_at: Option<Instant>,
}

impl ConsoleObserver {
    pub(crate) fn new(renderer: TerminalRenderer) -> Self {
        Self {
            renderer,
            spinner: None,
            started_at: None,
        }
    }

    fn clear_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }
}

impl ReportObserver for ConsoleObserver {
    fn step_started(&mut self, index: usize, total: usize, step: StepKind) {
        self.clear_spinner();
        self.started_at = Some(Instant::now());
        let message = format!("[{}/{}] {}", index + 1, total, step.label());
        match self.renderer.style() {
            OutputStyle::Plain => println!("{message}"),
            OutputStyle::Rich => {
                let spinner = ProgressBar::new_spinner();
                if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan.bold} {msg} {elapsed}") {
                    spinner.set_style(style.tick_chars("|/-\\ "));
                }
                spinner.set_message(message);
                spinner.enable_steady_tick(Duration::from_millis(80));
                self.spinner = Some(spinner);
            }
        }
    }

    fn step_finished(&mut self, entry: &ReportEntry) {
        self.clear_spinner();
        let elapsed = self.started_at.take().map(|started| started.elapsed());
        let (status, message) = describe_entry(entry, elapsed);
        self.renderer.print_status(status, &message);
    }

    fn notice(&mut self, step: StepKind, message: &str) {
        self.clear_spinner();
        self.renderer
            .print_status("warn", &format!("{}: {message}", step.as_str()));
    }
}

pub(crate) fn resolve_output_style(stdout_is_tty: bool, _stderr_is_tty: bool) -> OutputStyle {
    if stdout_is_tty {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

/// `--plain` and a non-empty `NO_COLOR` force plain output.
pub(crate) fn current_output_style(plain: bool) -> OutputStyle {
    let no_color = std::env::var_os("NO_COLOR").is_some_and(|value| !value.is_empty());
    if plain || no_color {
        return OutputStyle::Plain;
    }
    resolve_output_style(io::stdout().is_terminal(), io::stderr().is_terminal())
}

pub(crate) fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => message.to_string(),
        OutputStyle::Rich => format!("[{}] {message}", status_badge(status)),
    }
}

fn status_badge(status: &str) -> String {
    match status {
        "ok" => "OK".to_string(),
        "warn" => "WARN".to_string(),
        "fail" => "FAIL".to_string(),
        "skip" => "SKIP".to_string(),
        other => other.to_ascii_uppercase(),
    }
}

fn status_style(status: &str) -> Style {
    let color = match status {
        "ok" => AnsiColor::BrightGreen,
        "warn" => AnsiColor::BrightYellow,
        "fail" => AnsiColor::BrightRed,
        _ => AnsiColor::BrightBlack,
    };
    Style::new().fg_color(Some(color.into()))
}

fn section_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightBlue.into()))
        .effects(Effects::BOLD)
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

fn render_section_header(style: OutputStyle, title: &str) -> Option<String> {
    match style {
        OutputStyle::Plain => None,
        OutputStyle::Rich => Some(format!("== {title} ==")),
    }
}

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let millis = elapsed.subsec_millis();
    format!("{secs}.{millis:03}s")
}

fn outcome_status(outcome: &StepOutcome) -> &'static str {
    match outcome {
        StepOutcome::Success => "ok",
        StepOutcome::SuccessWithWarnings(_) => "warn",
        StepOutcome::Fatal { .. } => "fail",
        StepOutcome::Skipped(_) => "skip",
    }
}

fn describe_entry(entry: &ReportEntry, elapsed: Option<Duration>) -> (&'static str, String) {
    let mut message = entry.step.as_str().to_string();
    if let Some(detail) = entry.outcome.detail() {
        message.push_str(": ");
        message.push_str(&detail);
    }
    if let Some(elapsed) = elapsed {
        message.push_str(&format!(" ({})", format_elapsed(elapsed)));
    }
    (outcome_status(&entry.outcome), message)
}

pub(crate) fn format_state_line(state: &RunState) -> String {
    match state {
        RunState::Completed => "state: completed".to_string(),
        RunState::Aborted(reason) => format!("state: aborted ({reason})"),
        RunState::Failed { kind, reason } => format!("state: failed [{}] {reason}", kind.as_str()),
        other => format!("state: {}", other.label()),
    }
}

pub(crate) fn format_run_summary_lines(summary: &RunSummary, style: OutputStyle) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(header) = render_section_header(style, "Run summary") {
        lines.push(header);
    }
    lines.push(format_state_line(&summary.state));
    if summary.dry_run {
        lines.push("mode: dry run (no changes made)".to_string());
    }
    if let Some(branch) = summary.branch {
        lines.push(format!(
            "branch: {} ({} steps)",
            branch.as_str(),
            branch.steps().len()
        ));
    }
    if let Some(host) = &summary.host {
        lines.push(format!("host: {}", host.summary_line()));
    }
    lines.push(format!(
        "steps completed: {} warnings: {}",
        summary.report.completed_steps(),
        summary.report.warning_count()
    ));
    for entry in summary.report.entries() {
        let (status, message) = describe_entry(entry, None);
        lines.push(render_status_line(style, status, &message));
    }
    if !summary.backups.is_empty() {
        lines.push("backups taken this run:".to_string());
        for path in &summary.backups {
            lines.push(format!("  {}", path.display()));
        }
    }
    if let Some(recovery) = &summary.recovery {
        lines.extend(format_recovery_lines(recovery));
    }
    lines.push(format!(
        "started at: {} (unix seconds)",
        summary.report.started_at_unix()
    ));
    lines.push(format!("exit code: {}", summary.exit_code()));
    lines
}

pub(crate) fn format_recovery_lines(guidance: &RecoveryGuidance) -> Vec<String> {
    let step = guidance.step.map(StepKind::as_str).unwrap_or("detect");
    let mut lines = vec![format!(
        "recovery for {step} (exit code {}, category {}):",
        guidance.exit_code,
        guidance.category.as_str()
    )];
    lines.extend(
        guidance
            .actions
            .iter()
            .enumerate()
            .map(|(index, action)| format!("  {}. {action}", index + 1)),
    );
    lines
}
