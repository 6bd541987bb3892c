//! Engine-level error taxonomy.

use crate::repository::RepoError;

/// Configuration rejected at save time
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field}: {reason}")]
    Invalid { field: String, reason: String },

    #[error("Unknown reward referenced: {0}")]
    UnknownReward(String),
}

impl ValidationError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Error returned by engine operations
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already claimed: {0}")]
    AlreadyClaimed(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Insufficient resource: {0}")]
    InsufficientResource(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Internal error: {0}")]
    Internal(#[from] RepoError),
}

impl EngineError {
    /// Eligibility failures are decisions; retrying them never helps
    pub fn is_eligibility(&self) -> bool {
        matches!(
            self,
            Self::AlreadyClaimed(_) | Self::Forbidden(_) | Self::InsufficientResource(_)
        )
    }

    /// Message safe to show to an end user
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound(what) => format!("{} could not be found.", what),
            Self::AlreadyClaimed(what) => format!("You have already {}.", what),
            Self::Forbidden(what) => format!("This {}.", what),
            Self::InsufficientResource(what) => format!("Not enough {}.", what),
            Self::Validation(err) => format!("Invalid configuration: {}", err),
            Self::Internal(_) => "Something went wrong on our side, please try again later.".to_string(),
        }
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
