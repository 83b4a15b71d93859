//! Error types for the terminal backend.

use tabdeck_core::SnapshotError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KittyError {
    #[error("{program} failed: {detail}")]
    CommandFailed { program: String, detail: String },

    #[error("failed to parse kitty @ ls output: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unexpected output from {command}: {output:?}")]
    UnexpectedOutput { command: String, output: String },

    #[error("terminal io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<KittyError> for SnapshotError {
    fn from(e: KittyError) -> Self {
        match e {
            KittyError::Parse(_) | KittyError::UnexpectedOutput { .. } => {
                SnapshotError::Malformed(e.to_string())
            }
            KittyError::CommandFailed { .. } | KittyError::Io(_) => {
                SnapshotError::Unavailable(e.to_string())
            }
        }
    }
}
