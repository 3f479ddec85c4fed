//! Error types for the users API client.
//!
//! # Design
//! The first four variants are the service-facing taxonomy callers match on:
//! `InvalidParam` never reaches the network, `Validation` and `AuthFailed`
//! are selected per operation from the response status, and every status an
//! operation does not map lands in `GenericError` with the raw status code
//! and body. The remaining variants cover the collaborators around that
//! pipeline (transport, JSON decoding, configuration loading).

use thiserror::Error;

/// Errors returned by `UsersClient` operations.
#[derive(Debug, Error)]
pub enum UsersError {
    /// A parameter had the wrong shape or was missing; raised before any
    /// request is sent.
    #[error("invalid param: {0}")]
    InvalidParam(String),

    /// The service rejected the input.
    #[error("validation error: {0}")]
    Validation(String),

    /// The service rejected the credentials or the application secret.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The service answered with a status the operation does not map.
    #[error("HTTP {status}: {body}")]
    GenericError { status: u16, body: String },

    /// The transport could not complete the round trip.
    #[error("transport error: {0}")]
    Transport(String),

    /// A success response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// A configuration document could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Coarse classification of a `UsersError`, for callers that branch on the
/// kind rather than the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidParam,
    Validation,
    AuthFailed,
    GenericError,
    Transport,
    Decode,
    Config,
}

impl UsersError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            UsersError::InvalidParam(_) => ErrorKind::InvalidParam,
            UsersError::Validation(_) => ErrorKind::Validation,
            UsersError::AuthFailed(_) => ErrorKind::AuthFailed,
            UsersError::GenericError { .. } => ErrorKind::GenericError,
            UsersError::Transport(_) => ErrorKind::Transport,
            UsersError::Decode(_) => ErrorKind::Decode,
            UsersError::Config(_) => ErrorKind::Config,
        }
    }
}

pub type UsersResult<T> = Result<T, UsersError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_error_displays_status_and_body() {
        let err = UsersError::GenericError {
            status: 502,
            body: "bad gateway".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 502: bad gateway");
        assert_eq!(err.kind(), ErrorKind::GenericError);
    }
}
