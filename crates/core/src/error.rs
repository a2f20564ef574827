//! Administrative error model.

use thiserror::Error;

/// Result type used on the administrative path.
pub type AdminResult<T> = Result<T, AdminError>;

/// Error surfaced directly to an administrative caller.
///
/// These carry no security sensitivity: the message is meant to tell the
/// administrator how to correct the request. Authorization-path failures never
/// use this type; they are folded into a decision instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdminError {
    /// A value failed validation (e.g. malformed policy input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The addressed record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The record already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Credentials supplied to the administrative surface were rejected.
    #[error("unauthorized")]
    Unauthorized,

    /// Backing storage failed or timed out.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl AdminError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Stable machine-readable code used in JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::InvalidId(_) => "invalid_id",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Unauthorized => "unauthorized",
            Self::Unavailable(_) => "store_unavailable",
        }
    }
}
