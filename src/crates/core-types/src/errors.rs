//! Shared error taxonomy.

use thiserror::Error;

/// Result alias used across Parlor crates.
pub type ParlorResult<T> = Result<T, ParlorError>;

/// Failure classes for store and backend operations.
///
/// `Transport` covers network failures, non-2xx statuses and streams that
/// abort mid-reply; these are recovered locally (mock reply, synthesized
/// identifier, local-only deletion) everywhere except an explicit
/// conversation switch. `InvalidResponse` marks a reachable backend that
/// answered with a body we could not interpret. `NotFound` is reserved for
/// entities the caller referenced explicitly.
#[derive(Debug, Error)]
pub enum ParlorError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl ParlorError {
    /// Wrap any displayable error as a transport failure.
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    /// Wrap any displayable error as a malformed-response failure.
    pub fn invalid_response(err: impl std::fmt::Display) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}
