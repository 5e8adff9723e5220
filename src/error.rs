use thiserror::Error;

use crate::db::StoreError;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("validation error: {0}")]
    Validation(String),
    #[error("update conflicted {attempts} times")]
    ConflictOnUpdate { attempts: u32 },
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("tutor model error: {0}")]
    Upstream(String),
    /// A stored record could not be encoded or decoded; retrying will not help.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Errors the caller may resubmit unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConflictOnUpdate { .. } | Self::StoreUnavailable(_))
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match &err {
            // A bare conflict outside the ledger's retry loop still counts as one attempt.
            StoreError::Conflict => Self::ConflictOnUpdate { attempts: 1 },
            StoreError::Encode(_) | StoreError::Corrupt(_) => Self::Internal(err.to_string()),
            StoreError::Timeout | StoreError::Sqlx(_) => Self::StoreUnavailable(err.to_string()),
        }
    }
}
