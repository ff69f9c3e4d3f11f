//! Error types for the decision provider boundary.

use thiserror::Error;

/// Errors a decision provider can report instead of a response.
///
/// The orchestrator never lets these reach game logic: a failed call is
/// replaced by an empty turn and counted towards the abort threshold.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Transport to the decision source failed (connection reset, HTTP 5xx, etc.)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The decision source answered, but the answer could not be parsed
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// The provider gave up waiting for an answer
    #[error("Timeout after {0}ms")]
    Timeout(u64),

    /// The provider is permanently unable to answer (script exhausted, shut down)
    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

impl ProviderError {
    /// Creates a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Creates a malformed-response error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }

    /// Creates an unavailable error.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}
