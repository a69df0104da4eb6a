//! Lesson review domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub lesson: Uuid,
    pub reviewer: Uuid,
    /// 1..=5.
    pub rating: i64,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReview {
    pub lesson: Uuid,
    pub reviewer: Uuid,
    pub rating: i64,
    pub comment: Option<String>,
}
