//! Error types for the reconciliation core.

use thiserror::Error;

/// Failure to obtain a window snapshot from the terminal.
///
/// Never fatal: the reconciler downgrades it to "zero windows open".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("terminal control channel unavailable: {0}")]
    Unavailable(String),

    #[error("malformed window listing: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown session status: {0}")]
pub struct UnknownStatus(pub String);
