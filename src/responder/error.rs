//! Responder error types

use thiserror::Error;

/// Responder failure with classification.
///
/// The chat controller treats every kind the same way (fallback reply); the
/// kind only feeds logging.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ResponderError {
    pub kind: ResponderErrorKind,
    pub message: String,
}

impl ResponderError {
    pub fn new(kind: ResponderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ResponderErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ResponderErrorKind::Timeout, message)
    }

    pub fn status(code: u16, message: impl Into<String>) -> Self {
        Self::new(ResponderErrorKind::Status(code), message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ResponderErrorKind::Malformed, message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponderErrorKind {
    /// Connection refused, reset, DNS failure
    Network,
    /// Configured request timeout elapsed
    Timeout,
    /// Non-success HTTP status
    Status(u16),
    /// Body missing or not in the expected shape
    Malformed,
}

impl ResponderErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Status(_) => "status",
            Self::Malformed => "malformed",
        }
    }
}
