//! Error types for role session operations
//!
//! This module defines the errors raised by the session layer's
//! collaborators: the local cache, the remote role authority and the
//! navigator. The role store itself never surfaces these to its callers;
//! it logs them and falls back to known-good state.

use thiserror::Error;

/// Local cache errors.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Underlying storage failed
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Key cannot be mapped to storage
    #[error("Invalid cache key: {0}")]
    InvalidKey(String),

    /// Cache is unavailable (e.g. storage disabled)
    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}

/// Remote role authority errors.
#[derive(Debug, Error)]
pub enum AuthorityError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// API returned an error response
    #[error("API error ({status}): {message}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Error message from the API.
        message: String,
    },

    /// Response body could not be decoded
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// Credentials were rejected
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// Authority not reachable or not configured
    #[error("Role authority unavailable: {0}")]
    Unavailable(String),
}

impl AuthorityError {
    /// Check if the failure is transient and the request may be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            AuthorityError::RequestFailed(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            AuthorityError::ApiError { status, .. } => *status >= 500 || *status == 429,
            AuthorityError::Unavailable(_) => true,
            AuthorityError::InvalidResponse(_) | AuthorityError::AuthenticationFailed => false,
        }
    }
}

/// Navigation errors.
#[derive(Debug, Error)]
pub enum NavigationError {
    /// Client-side navigation was rejected
    #[error("Navigation to {path} failed: {reason}")]
    Failed {
        /// Target path.
        path: String,
        /// Failure reason.
        reason: String,
    },

    /// No navigation surface is attached
    #[error("Navigator unavailable")]
    Unavailable,
}

/// Session error types.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Local cache failure
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Remote authority failure
    #[error(transparent)]
    Authority(#[from] AuthorityError),

    /// Navigation failure
    #[error(transparent)]
    Navigation(#[from] NavigationError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Role data failed validation
    #[error("Invalid role data: {0}")]
    InvalidRoleData(String),

    /// Requested role is not assigned to the principal
    #[error("Role not available: {0}")]
    RoleNotAvailable(String),

    /// A transition is already running
    #[error("Role transition already in progress")]
    TransitionInProgress,

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

impl SessionError {
    /// Check if this is a server-side error.
    pub fn is_server_error(&self) -> bool {
        match self {
            SessionError::Authority(AuthorityError::ApiError { status, .. }) => *status >= 500,
            SessionError::Authority(AuthorityError::Unavailable(_))
            | SessionError::Authority(AuthorityError::RequestFailed(_))
            | SessionError::ConfigError(_) => true,
            _ => false,
        }
    }

    /// Get error code for diagnostics.
    pub fn error_code(&self) -> &'static str {
        match self {
            SessionError::Cache(_) => "CACHE_ERROR",
            SessionError::Authority(AuthorityError::AuthenticationFailed) => "AUTHENTICATION_FAILED",
            SessionError::Authority(AuthorityError::InvalidResponse(_)) => "INVALID_RESPONSE",
            SessionError::Authority(_) => "AUTHORITY_ERROR",
            SessionError::Navigation(_) => "NAVIGATION_ERROR",
            SessionError::Serialization(_) => "SERIALIZATION_ERROR",
            SessionError::InvalidRoleData(_) => "INVALID_ROLE_DATA",
            SessionError::RoleNotAvailable(_) => "ROLE_NOT_AVAILABLE",
            SessionError::TransitionInProgress => "TRANSITION_IN_PROGRESS",
            SessionError::ConfigError(_) => "CONFIG_ERROR",
        }
    }
}
