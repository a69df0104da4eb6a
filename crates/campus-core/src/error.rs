//! Error types for the Campus system.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CampusError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Forbidden: {reason}")]
    Forbidden { reason: String },

    #[error("Entity already exists: {entity}")]
    Conflict { entity: String },

    #[error("Invalid lifecycle transition: {reason}")]
    InvalidTransition { reason: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Storage error: {0}")]
    StorageFailure(String),

    #[error("Document committed but a dependent blob operation failed: {0}")]
    PartialFailure(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CampusError {
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        CampusError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        CampusError::Forbidden {
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CampusError::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, CampusError::Conflict { .. })
    }

    /// Re-shape a `Forbidden` into a `NotFound` for read paths that must
    /// not reveal whether the document exists.
    pub fn disguise_as_not_found(self, entity: impl Into<String>, id: impl ToString) -> Self {
        match self {
            CampusError::Forbidden { .. } => CampusError::not_found(entity, id),
            other => other,
        }
    }
}

pub type CampusResult<T> = Result<T, CampusError>;
