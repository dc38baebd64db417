//! Error types for the parley client.
//!
//! This module provides a unified error type with explicit variants for
//! transport, authentication, protocol, stream and input validation errors.
//! Malformed stream lines are deliberately absent: the frame decoder drops
//! them instead of failing the session.

use std::fmt;
use thiserror::Error;

/// The unified error type for parley operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Network transport errors (connection, timeout, interrupted body).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Authentication errors (missing session, refresh failure).
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Non-success HTTP responses.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A terminal error frame sent by the assistant service.
    #[error("server error: {message}")]
    Server { message: String },

    /// Stream lifecycle errors.
    #[error("stream error: {0}")]
    Stream(#[from] StreamError),

    /// Input validation errors (invalid URL, empty message).
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInputError),
}

impl Error {
    /// Returns true if this error means the access token is no longer accepted.
    ///
    /// This is the signal the auth continuity manager reacts to; it is never
    /// surfaced to callers as such.
    pub fn is_auth_expired(&self) -> bool {
        match self {
            Error::Protocol(e) => e.is_auth_error(),
            _ => false,
        }
    }

    /// Returns true if the user has to log in again before retrying.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            Error::Auth(
                AuthError::NotAuthenticated
                    | AuthError::RefreshFailed { .. }
                    | AuthError::SessionExpired
            )
        )
    }
}

/// Transport-level errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network connection failed.
    #[error("connection failed: {message}")]
    Connection { message: String },

    /// Request timed out.
    #[error("request timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// The response body was interrupted mid-stream.
    #[error("stream interrupted: {message}")]
    Interrupted { message: String },

    /// No fragment arrived within the configured idle window.
    #[error("no data received for {duration_ms}ms")]
    IdleTimeout { duration_ms: u64 },

    /// Generic HTTP error.
    #[error("HTTP error: {message}")]
    Http { message: String },
}

/// Authentication-related errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// No credential is stored; the user has to log in.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Login was rejected.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The access token was rejected again after a refresh.
    #[error("session expired")]
    SessionExpired,

    /// The refresh exchange failed; the stored credential has been cleared.
    #[error("session refresh failed: {reason}")]
    RefreshFailed { reason: String },
}

/// Protocol-level errors from HTTP responses.
#[derive(Debug)]
pub struct ProtocolError {
    /// HTTP status code.
    pub status: u16,
    /// Machine-readable error code (if present).
    pub error: Option<String>,
    /// Error message from the server.
    pub message: Option<String>,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}", self.status)?;
        if let Some(ref error) = self.error {
            write!(f, " [{}]", error)?;
        }
        if let Some(ref message) = self.message {
            write!(f, ": {}", message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ProtocolError {}

impl ProtocolError {
    /// Create a new protocol error.
    pub fn new(status: u16, error: Option<String>, message: Option<String>) -> Self {
        Self {
            status,
            error,
            message,
        }
    }

    /// Check if this is an authentication error.
    pub fn is_auth_error(&self) -> bool {
        self.status == 401
            || self.error.as_deref() == Some("ExpiredToken")
            || self.error.as_deref() == Some("InvalidToken")
            || self.error.as_deref() == Some("token_expired")
    }
}

/// Stream lifecycle errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StreamError {
    /// The channel closed before a terminal frame was seen.
    #[error("stream closed before a terminal frame was received")]
    Truncated,
}

/// Input validation errors.
#[derive(Debug, Error)]
pub enum InvalidInputError {
    /// Invalid API base URL.
    #[error("invalid API URL '{value}': {reason}")]
    ApiUrl { value: String, reason: String },

    /// Invalid chat request.
    #[error("invalid chat request: {reason}")]
    ChatRequest { reason: String },

    /// Generic invalid input.
    #[error("invalid input: {message}")]
    Other { message: String },
}
