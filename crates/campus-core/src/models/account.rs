//! Institution account domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    /// Unique together with `city`.
    pub institution_name: String,
    pub city: String,
    pub contact_name: String,
    /// Stored lowercase.
    pub email: String,
    pub phone: String,
    pub logo: Option<String>,
    /// Seat capacity: how many users may exist under this account.
    pub allowed_users: i64,
    /// Current seat usage, maintained on user create/delete.
    pub current_users: i64,
    /// Grant lists shared by every user of the account.
    pub allowed_lessons: Vec<Uuid>,
    pub allowed_categories: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn has_free_seat(&self) -> bool {
        self.current_users < self.allowed_users
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAccount {
    pub institution_name: String,
    pub city: String,
    pub contact_name: String,
    pub email: String,
    pub phone: String,
    pub allowed_users: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountPatch {
    pub institution_name: Option<String>,
    pub city: Option<String>,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub logo: Option<Option<String>>,
    pub allowed_users: Option<i64>,
    pub allowed_lessons: Option<Vec<Uuid>>,
    pub allowed_categories: Option<Vec<Uuid>>,
}
