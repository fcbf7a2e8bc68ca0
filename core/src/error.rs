//! Error types for hobbit-bench-core

use std::fmt;

use thiserror::Error;

/// Broad classification of a [`BenchError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid or missing configuration
    Config,
    /// Dataset could not be read or is empty
    Dataset,
    /// The message transport failed to deliver or accept a message
    Transport,
    /// A payload or command violated the wire format
    Protocol,
    /// A phase wait was interrupted before its gate opened
    Interrupted,
    /// A phase wait exceeded its deadline
    Timeout,
    /// An answer was received before its task was sent
    ClockSkew,
    /// Orchestration-level failure (task panic, invalid lifecycle use)
    Orchestration,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Config => "configuration error",
            ErrorKind::Dataset => "dataset error",
            ErrorKind::Transport => "transport error",
            ErrorKind::Protocol => "protocol error",
            ErrorKind::Interrupted => "interrupted",
            ErrorKind::Timeout => "timed out",
            ErrorKind::ClockSkew => "clock skew",
            ErrorKind::Orchestration => "orchestration error",
        };
        f.write_str(name)
    }
}

/// Core error type
///
/// Every error that escapes the orchestration engine is fatal for the run;
/// recoverable conditions (malformed rows, unparsable answers) are logged and
/// never surface as a `BenchError`.
#[derive(Error, Debug)]
#[error("{kind}: {message}")]
pub struct BenchError {
    /// Error classification
    pub kind: ErrorKind,

    /// Human readable cause
    pub message: String,
}

impl BenchError {
    /// Create an error of the given kind
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    /// A required builder field was never set
    pub fn missing_config(field: &str) -> Self {
        Self::config(format!("missing required field `{}`", field))
    }

    /// Dataset error
    pub fn dataset(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Dataset, message)
    }

    /// Transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    /// Protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Protocol, message)
    }

    /// Gate wait interrupted
    pub fn interrupted(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Interrupted, message)
    }

    /// Gate wait deadline exceeded
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    /// Negative latency observed
    pub fn clock_skew(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ClockSkew, message)
    }

    /// Orchestration failure
    pub fn orchestration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Orchestration, message)
    }

    /// Check the error classification
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}

/// Result type alias
pub type BenchResult<T> = std::result::Result<T, BenchError>;
