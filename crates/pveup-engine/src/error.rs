use std::io;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Environment not eligible; nothing has been mutated by the failing step.
    Precondition,
    /// An external collaborator reported failure.
    Action,
    /// A confirmation was required but no operator answer could be obtained.
    Confirmation,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Precondition => "precondition-failure",
            Self::Action => "action-failure",
            Self::Confirmation => "confirmation-unavailable",
        }
    }
}

#[derive(Debug, Error)]
pub enum GateError {
    #[error("operator input unavailable: {0}")]
    Unavailable(String),
    #[error("failed to talk to the operator: {0}")]
    Io(#[from] io::Error),
}
