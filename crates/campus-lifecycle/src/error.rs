//! Lifecycle error types.

use campus_core::error::CampusError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LifecycleError {
    /// A draft failed its publish preconditions.
    #[error("draft is not ready to publish: {reason}")]
    IncompleteDraft { reason: String },

    /// An edit-session operation on a lesson that is not mid-edit.
    #[error("lesson is not in edit mode")]
    NotMidEdit,

    /// A mid-edit mutation from someone other than the current editor.
    #[error("caller is not the current editor")]
    NotCurrentEditor,

    /// An attempt to seize an edit session without outranking the
    /// initial editor.
    #[error("caller may not take over this edit session")]
    SeizureDenied,

    #[error("part {part_id} not found")]
    PartNotFound { part_id: String },

    /// A screen operation on a panoramic part, or a panoramic operation
    /// on a normal part.
    #[error("part {part_id} does not support this operation")]
    WrongPartKind { part_id: String },

    /// A caller-supplied media path outside the lesson's folder.
    #[error("media path is not scoped to this lesson: {path}")]
    InvalidMediaPath { path: String },

    #[error("invalid order for part {part_id}")]
    InvalidOrder { part_id: String },

    #[error("screen index {index} out of range")]
    ScreenOutOfRange { index: usize },
}

impl From<LifecycleError> for CampusError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::IncompleteDraft { .. }
            | LifecycleError::NotMidEdit
            | LifecycleError::NotCurrentEditor => CampusError::InvalidTransition {
                reason: err.to_string(),
            },
            LifecycleError::SeizureDenied => CampusError::Forbidden {
                reason: err.to_string(),
            },
            LifecycleError::PartNotFound { part_id } => CampusError::not_found("part", part_id),
            LifecycleError::WrongPartKind { .. }
            | LifecycleError::InvalidMediaPath { .. }
            | LifecycleError::InvalidOrder { .. }
            | LifecycleError::ScreenOutOfRange { .. } => CampusError::Validation {
                message: err.to_string(),
            },
        }
    }
}
