use std::io::{self, BufRead, Stderr, StdinLock, Write};

use tracing::info;

use crate::error::GateError;

/// Blocking operator checkpoint. There is no timeout: an interactive gate
/// waits until the operator answers or input is closed.
pub trait ConfirmationGate {
    fn confirm(&mut self, prompt: &str) -> Result<bool, GateError>;
}

/// Non-interactive policy behind `--yes`.
pub struct AssumeYesGate;

impl ConfirmationGate for AssumeYesGate {
    fn confirm(&mut self, prompt: &str) -> Result<bool, GateError> {
        info!("auto-approved: {}", prompt.replace('\n', " "));
        Ok(true)
    }
}

pub struct TerminalGate<R, W> {
    input: R,
    output: W,
}

impl TerminalGate<StdinLock<'static>, Stderr> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> TerminalGate<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> ConfirmationGate for TerminalGate<R, W> {
    fn confirm(&mut self, prompt: &str) -> Result<bool, GateError> {
        loop {
            write!(self.output, "{prompt} [y/N]: ")?;
            self.output.flush()?;

            let mut answer = String::new();
            if self.input.read_line(&mut answer)? == 0 {
                return Err(GateError::Unavailable(
                    "input closed before an answer was given".to_string(),
                ));
            }
            match answer.trim().to_ascii_lowercase().as_str() {
                "y" | "yes" => {
                    info!("operator approved: {}", prompt.replace('\n', " "));
                    return Ok(true);
                }
                "" | "n" | "no" => {
                    info!("operator declined: {}", prompt.replace('\n', " "));
                    return Ok(false);
                }
                _ => writeln!(self.output, "please answer 'yes' or 'no'")?,
            }
        }
    }
}
