//! Error taxonomy for the DA client.

use std::time::Duration;
use thiserror::Error;

/// Result type used across the DA client crates.
pub type Result<T> = std::result::Result<T, DasError>;

/// Errors surfaced by DA clients, aggregators and decorators.
#[derive(Error, Debug)]
pub enum DasError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("data not found")]
    NotFound,
    #[error("no DAS readers responded successfully")]
    NoReadersResponded(#[source] Box<DasError>),
    #[error("returned data does not hash to {expected}")]
    InvalidHash { expected: String },
    #[error("quorum not met: {signed} of {required} required signers ({failed} failed)")]
    QuorumNotMet {
        signed: usize,
        required: usize,
        failed: usize,
    },
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("crypto error: {0}")]
    Crypto(String),
    #[error("encoding error: {0}")]
    Encoding(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("storage error: {0}")]
    Storage(String),
    /// A capability was used in a way the node setup should have made
    /// impossible. Never retried.
    #[error("logic error: {0}")]
    Logic(&'static str),
}

/// Coarse classification of a [`DasError`], for retry/failover/alert decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    NotFound,
    Validation,
    Quorum,
    Timeout,
    Config,
    Storage,
    Logic,
}

impl DasError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DasError::Transport(_) | DasError::NoReadersResponded(_) => ErrorKind::Transport,
            DasError::NotFound => ErrorKind::NotFound,
            DasError::InvalidHash { .. } | DasError::Crypto(_) | DasError::Encoding(_) => {
                ErrorKind::Validation
            }
            DasError::QuorumNotMet { .. } => ErrorKind::Quorum,
            DasError::Timeout(_) => ErrorKind::Timeout,
            DasError::Config(_) => ErrorKind::Config,
            DasError::Storage(_) => ErrorKind::Storage,
            DasError::Logic(_) => ErrorKind::Logic,
        }
    }

    /// Programming errors; the caller should abort rather than retry.
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Logic
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DasError::NotFound)
    }
}
