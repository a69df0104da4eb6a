//! Policy error types.

use campus_core::error::CampusError;
use campus_core::models::role::Resource;
use campus_core::predicate::FilterOp;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
    /// The caller's role has no permission covering the resource/action.
    /// This is never an empty predicate: the caller must refuse, not
    /// fall through to an unrestricted query.
    #[error("no permission for resource {resource:?}")]
    NoPermission { resource: Resource },

    /// A write guard rejected one of the proposed fields.
    #[error("write guard rejected field `{field}`")]
    GuardRejected { field: String },

    /// A dynamic filter's field path did not resolve against the current
    /// user's document. A rule authoring defect, not a caller error.
    #[error("dynamic filter path `{path}` did not resolve")]
    DynamicResolution { path: String },

    /// A guard filter uses an operator the write guard cannot evaluate.
    #[error("unsupported guard operator {op:?} on field `{field}`")]
    UnsupportedGuardOp { field: String, op: FilterOp },
}

impl From<PolicyError> for CampusError {
    fn from(err: PolicyError) -> Self {
        match err {
            PolicyError::NoPermission { .. } | PolicyError::GuardRejected { .. } => {
                CampusError::Forbidden {
                    reason: err.to_string(),
                }
            }
            PolicyError::DynamicResolution { .. } | PolicyError::UnsupportedGuardOp { .. } => {
                CampusError::Internal(err.to_string())
            }
        }
    }
}
