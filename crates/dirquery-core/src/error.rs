//! Error types for directory query operations.
//!
//! This module provides the error taxonomy for directory-level failures,
//! keeping the partial-success conditions (referral, size limit) apart from
//! hard protocol errors.

use thiserror::Error;

/// Main error type for directory query operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// No usable connection to the directory server
    #[error("Not connected: {0}")]
    NotConnected(String),

    /// The bind operation was rejected by the server
    #[error("Bind failed: {0}")]
    BindFailed(String),

    /// Operation timed out
    #[error("Timeout waiting for directory: {0}")]
    Timeout(String),

    /// The server stopped the search after the configured size limit
    #[error("Size limit exceeded")]
    SizeLimitExceeded,

    /// Directory-level protocol error carrying the server result code
    #[error("Protocol error (code {code}): {message}")]
    Protocol {
        /// LDAP result code returned by the server
        code: u32,
        /// Diagnostic message from the server, possibly empty
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid distinguished name
    #[error("Invalid distinguished name: {0}")]
    InvalidDn(String),
}

/// Specialized result type for directory query operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotConnected(_) => "NOT_CONNECTED",
            Self::BindFailed(_) => "BIND_FAILED",
            Self::Timeout(_) => "TIMEOUT",
            Self::SizeLimitExceeded => "SIZE_LIMIT_EXCEEDED",
            Self::Protocol { .. } => "PROTOCOL_ERROR",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::InvalidDn(_) => "INVALID_DN",
        }
    }

    /// Returns true if this error terminates a search without invalidating
    /// the entries collected before it.
    #[must_use]
    pub const fn is_partial_success(&self) -> bool {
        matches!(self, Self::SizeLimitExceeded)
    }
}

// Conversions from external error types
impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::ConfigError(err.to_string())
    }
}
