// src/error.rs

use axum::http::StatusCode;
use thiserror::Error;

use crate::store::StoreError;

pub type EngineResult<T> = Result<T, EngineError>;

/// Outcomes the engine reports to its callers. None of them is retried and
/// every variant is returned before (or instead of) any state change.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    InvalidTransition(String),

    #[error("assignment {0} not found")]
    AssignmentNotFound(i64),

    #[error("assignment {0} is already resolved")]
    AlreadyResolved(i64),

    #[error("OTP does not match")]
    OtpMismatch,

    #[error("OTP expired")]
    OtpExpired,

    #[error("invalid login id or password")]
    InvalidCredentials,

    #[error("{0} is not supported")]
    Unsupported(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound { entity, id: id.to_string() }
    }

    /// Stable machine-readable code, prefixed to HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Unavailable(_) => "UNAVAILABLE",
            Self::InvalidTransition(_) => "INVALID_TRANSITION",
            Self::AssignmentNotFound(_) => "ASSIGNMENT_NOT_FOUND",
            Self::AlreadyResolved(_) => "ALREADY_RESOLVED",
            Self::OtpMismatch => "OTP_MISMATCH",
            Self::OtpExpired => "OTP_EXPIRED",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::Unsupported(_) => "UNSUPPORTED",
            Self::Store(_) => "STORAGE",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } | Self::AssignmentNotFound(_) => StatusCode::NOT_FOUND,
            Self::Unavailable(_) | Self::InvalidTransition(_) | Self::AlreadyResolved(_) => {
                StatusCode::CONFLICT
            }
            Self::OtpMismatch | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::OtpExpired => StatusCode::GONE,
            Self::Unsupported(_) => StatusCode::NOT_IMPLEMENTED,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
