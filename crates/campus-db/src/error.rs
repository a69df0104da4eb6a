//! Database-specific error types and conversions.

use campus_core::error::CampusError;

/// Marker prefix for `THROW` statements inside transactions, so aborted
/// transactions can be told apart from backend faults.
pub(crate) const THROW_NOT_FOUND: &str = "campus:not_found";
pub(crate) const THROW_CONFLICT: &str = "campus:conflict";

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Stored document could not be decoded: {0}")]
    Decode(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Record already exists: {entity}")]
    Conflict { entity: String },
}

impl DbError {
    /// Classify a statement error: unique-index violations and duplicate
    /// record creations become conflicts, our transaction `THROW` markers
    /// become their signalled variants, everything else stays a query
    /// error.
    pub(crate) fn from_statement(err: impl ToString, entity: &str, id: &str) -> Self {
        let message = err.to_string();
        if message.contains(THROW_NOT_FOUND) {
            return DbError::NotFound {
                entity: entity.into(),
                id: id.into(),
            };
        }
        if message.contains(THROW_CONFLICT)
            || message.contains("already contains")
            || message.contains("already exists")
        {
            return DbError::Conflict {
                entity: entity.into(),
            };
        }
        DbError::Query(message)
    }
}

impl From<DbError> for CampusError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => CampusError::NotFound { entity, id },
            DbError::Conflict { entity } => CampusError::Conflict { entity },
            DbError::Decode(msg) => CampusError::Internal(msg),
            other => CampusError::StorageFailure(other.to_string()),
        }
    }
}
