//! User domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::models::account::Account;
use crate::models::role::Role;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// Stored lowercase; unique across the system.
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Derived from first + last name on every write.
    pub full_name: String,
    pub phone_number: Option<String>,
    pub role: Uuid,
    /// Some users (admin, guest archetypes) have no account.
    pub account: Option<Uuid>,
    /// Per-user grant lists, independent of role and account grants.
    pub allowed_lessons: Vec<Uuid>,
    pub allowed_categories: Vec<Uuid>,
    /// Opaque hash; hashing itself is an external collaborator.
    pub password_hash: String,
    pub registration_token: Option<String>,
    pub registration_completed: bool,
    pub reset_password_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub role: Uuid,
    pub account: Option<Uuid>,
    pub password_hash: String,
    /// SHA-256 of the raw registration token mailed to the user.
    pub registration_token: Option<String>,
}

/// Partial update for a user document. `Some(None)` clears an optional
/// field, `None` leaves it untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<Option<String>>,
    pub role: Option<Uuid>,
    pub account: Option<Option<Uuid>>,
    pub allowed_lessons: Option<Vec<Uuid>>,
    pub allowed_categories: Option<Vec<Uuid>>,
    pub password_hash: Option<String>,
    pub registration_token: Option<Option<String>>,
    pub registration_completed: Option<bool>,
    pub reset_password_token: Option<Option<String>>,
}

/// A request's resolved caller: the user document with its role and
/// (when present) account populated. This is what the policy compiler
/// evaluates dynamic filters against.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub role: Role,
    pub account: Option<Account>,
}

impl CurrentUser {
    pub fn id(&self) -> Uuid {
        self.user.id
    }

    pub fn rank(&self) -> i64 {
        self.role.rank
    }

    /// The caller as a JSON document with `role` and `account` embedded,
    /// for dynamic field-path resolution.
    pub fn document(&self) -> Value {
        let mut doc = serde_json::to_value(&self.user).unwrap_or_else(|_| json!({}));
        if let Value::Object(map) = &mut doc {
            map.insert(
                "role".into(),
                serde_json::to_value(&self.role).unwrap_or(Value::Null),
            );
            map.insert(
                "account".into(),
                serde_json::to_value(&self.account).unwrap_or(Value::Null),
            );
        }
        doc
    }
}
