//! DB-side row structs and conversions into domain types.
//!
//! Rows mirror stored documents field for field; deeply nested structures
//! (permission filters, lesson parts, edit shadows) travel as JSON values
//! and decode through the domain types' serde implementations. UUIDs are
//! stored as strings and parsed on the way out.

use campus_core::models::account::Account;
use campus_core::models::category::Category;
use campus_core::models::lesson::{
    ArchivedLesson, DraftLesson, EditData, LessonContent, Part, PublishedLesson,
};
use campus_core::models::review::Review;
use campus_core::models::role::{ManagedRoles, Permission, Role, RoleArchetype};
use campus_core::models::user::User;
use chrono::{DateTime, Utc};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

pub(crate) fn parse_uuid(s: &str, what: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(s).map_err(|e| DbError::Decode(format!("invalid {what} UUID: {e}")))
}

pub(crate) fn parse_uuid_list(items: Vec<String>, what: &str) -> Result<Vec<Uuid>, DbError> {
    items.iter().map(|s| parse_uuid(s, what)).collect()
}

pub(crate) fn uuid_strings(ids: &[Uuid]) -> Vec<String> {
    ids.iter().map(Uuid::to_string).collect()
}

/// Serialize a domain value for storage inside a document. Our models
/// serialize infallibly; a failure would be a programming error and
/// surfaces as NULL rather than a panic.
pub(crate) fn to_json<T: serde::Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

fn from_json<T: serde::de::DeserializeOwned>(
    value: serde_json::Value,
    what: &str,
) -> Result<T, DbError> {
    serde_json::from_value(value).map_err(|e| DbError::Decode(format!("invalid {what}: {e}")))
}

pub(crate) fn parse_archetype(s: &str) -> Result<RoleArchetype, DbError> {
    match s {
        "admin" => Ok(RoleArchetype::Admin),
        "institution_manager" => Ok(RoleArchetype::InstitutionManager),
        "editor" => Ok(RoleArchetype::Editor),
        "viewer" => Ok(RoleArchetype::Viewer),
        "guest" => Ok(RoleArchetype::Guest),
        other => Err(DbError::Decode(format!("unknown role archetype: {other}"))),
    }
}

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
pub(crate) struct CountRow {
    pub total: u64,
}

/// Row struct for id-only projections (`SELECT meta::id(id) AS record_id`).
#[derive(Debug, SurrealValue)]
pub(crate) struct IdRow {
    pub record_id: String,
}

impl IdRow {
    pub fn into_uuid(self, what: &str) -> Result<Uuid, DbError> {
        parse_uuid(&self.record_id, what)
    }
}

// -----------------------------------------------------------------------
// Roles
// -----------------------------------------------------------------------

#[derive(Debug, SurrealValue)]
pub(crate) struct RoleRow {
    pub record_id: String,
    pub name: String,
    pub internal_name: String,
    pub rank: i64,
    pub managed_roles: serde_json::Value,
    pub require_account: bool,
    pub permissions: serde_json::Value,
    pub lessons: Vec<String>,
    pub categories: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RoleRow {
    pub fn try_into_role(self) -> Result<Role, DbError> {
        Ok(Role {
            id: parse_uuid(&self.record_id, "role")?,
            name: self.name,
            internal_name: parse_archetype(&self.internal_name)?,
            rank: self.rank,
            managed_roles: from_json::<ManagedRoles>(self.managed_roles, "managed_roles")?,
            require_account: self.require_account,
            permissions: from_json::<Vec<Permission>>(self.permissions, "permissions")?,
            lessons: parse_uuid_list(self.lessons, "role lesson")?,
            categories: parse_uuid_list(self.categories, "role category")?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

// -----------------------------------------------------------------------
// Users
// -----------------------------------------------------------------------

#[derive(Debug, SurrealValue)]
pub(crate) struct UserRow {
    pub record_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub phone_number: Option<String>,
    pub role: String,
    pub account: Option<String>,
    pub allowed_lessons: Vec<String>,
    pub allowed_categories: Vec<String>,
    pub password_hash: String,
    pub registration_token: Option<String>,
    pub registration_completed: bool,
    pub reset_password_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRow {
    pub fn try_into_user(self) -> Result<User, DbError> {
        Ok(User {
            id: parse_uuid(&self.record_id, "user")?,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            full_name: self.full_name,
            phone_number: self.phone_number,
            role: parse_uuid(&self.role, "user role")?,
            account: self
                .account
                .as_deref()
                .map(|a| parse_uuid(a, "user account"))
                .transpose()?,
            allowed_lessons: parse_uuid_list(self.allowed_lessons, "allowed lesson")?,
            allowed_categories: parse_uuid_list(self.allowed_categories, "allowed category")?,
            password_hash: self.password_hash,
            registration_token: self.registration_token,
            registration_completed: self.registration_completed,
            reset_password_token: self.reset_password_token,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

// -----------------------------------------------------------------------
// Accounts
// -----------------------------------------------------------------------

#[derive(Debug, SurrealValue)]
pub(crate) struct AccountRow {
    pub record_id: String,
    pub institution_name: String,
    pub city: String,
    pub contact_name: String,
    pub email: String,
    pub phone: String,
    pub logo: Option<String>,
    pub allowed_users: i64,
    pub current_users: i64,
    pub allowed_lessons: Vec<String>,
    pub allowed_categories: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AccountRow {
    pub fn try_into_account(self) -> Result<Account, DbError> {
        Ok(Account {
            id: parse_uuid(&self.record_id, "account")?,
            institution_name: self.institution_name,
            city: self.city,
            contact_name: self.contact_name,
            email: self.email,
            phone: self.phone,
            logo: self.logo,
            allowed_users: self.allowed_users,
            current_users: self.current_users,
            allowed_lessons: parse_uuid_list(self.allowed_lessons, "allowed lesson")?,
            allowed_categories: parse_uuid_list(self.allowed_categories, "allowed category")?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

// -----------------------------------------------------------------------
// Categories & Reviews
// -----------------------------------------------------------------------

#[derive(Debug, SurrealValue)]
pub(crate) struct CategoryRow {
    pub record_id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CategoryRow {
    pub fn try_into_category(self) -> Result<Category, DbError> {
        Ok(Category {
            id: parse_uuid(&self.record_id, "category")?,
            name: self.name,
            description: self.description,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
pub(crate) struct ReviewRow {
    pub record_id: String,
    pub lesson: String,
    pub reviewer: String,
    pub rating: i64,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReviewRow {
    pub fn try_into_review(self) -> Result<Review, DbError> {
        Ok(Review {
            id: parse_uuid(&self.record_id, "review")?,
            lesson: parse_uuid(&self.lesson, "review lesson")?,
            reviewer: parse_uuid(&self.reviewer, "reviewer")?,
            rating: self.rating,
            comment: self.comment,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

// -----------------------------------------------------------------------
// Lessons
// -----------------------------------------------------------------------

#[derive(Debug, SurrealValue)]
pub(crate) struct LessonRow {
    pub record_id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub creator: String,
    pub description_file: Option<String>,
    pub parts: Option<serde_json::Value>,
    pub viewed: i64,
    pub categories: Vec<String>,
    pub thumbnail: Option<String>,
    pub public: bool,
    pub credit: Option<String>,
    pub mid_edit: bool,
    pub edit_data: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LessonRow {
    fn try_into_content(self) -> Result<(Uuid, LessonContent, DateTime<Utc>, DateTime<Utc>), DbError> {
        let id = parse_uuid(&self.record_id, "lesson")?;
        let parts = match self.parts {
            Some(value) => from_json::<Vec<Part>>(value, "lesson parts")?,
            None => Vec::new(),
        };
        let edit_data = match self.edit_data {
            Some(value) => from_json::<Option<EditData>>(value, "edit data")?,
            None => None,
        };
        let content = LessonContent {
            title: self.title,
            description: self.description,
            creator: parse_uuid(&self.creator, "lesson creator")?,
            description_file: self.description_file,
            parts,
            viewed: self.viewed,
            categories: parse_uuid_list(self.categories, "lesson category")?,
            thumbnail: self.thumbnail,
            public: self.public,
            credit: self.credit,
            mid_edit: self.mid_edit,
            edit_data,
        };
        Ok((id, content, self.created_at, self.updated_at))
    }

    pub fn try_into_draft(self) -> Result<DraftLesson, DbError> {
        let (id, content, created_at, updated_at) = self.try_into_content()?;
        Ok(DraftLesson {
            id,
            content,
            created_at,
            updated_at,
        })
    }

    pub fn try_into_published(self) -> Result<PublishedLesson, DbError> {
        let (id, content, created_at, updated_at) = self.try_into_content()?;
        Ok(PublishedLesson {
            id,
            content,
            created_at,
            updated_at,
        })
    }
}

#[derive(Debug, SurrealValue)]
pub(crate) struct ArchivedLessonRow {
    pub record_id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub creator: String,
    pub description_file: Option<String>,
    pub parts: Option<serde_json::Value>,
    pub viewed: i64,
    pub categories: Vec<String>,
    pub thumbnail: Option<String>,
    pub public: bool,
    pub credit: Option<String>,
    pub mid_edit: bool,
    pub edit_data: Option<serde_json::Value>,
    pub archive_at: DateTime<Utc>,
    pub archive_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ArchivedLessonRow {
    pub fn try_into_archived(self) -> Result<ArchivedLesson, DbError> {
        let archive_at = self.archive_at;
        let archive_by = parse_uuid(&self.archive_by, "archive_by")?;
        let row = LessonRow {
            record_id: self.record_id,
            title: self.title,
            description: self.description,
            creator: self.creator,
            description_file: self.description_file,
            parts: self.parts,
            viewed: self.viewed,
            categories: self.categories,
            thumbnail: self.thumbnail,
            public: self.public,
            credit: self.credit,
            mid_edit: self.mid_edit,
            edit_data: self.edit_data,
            created_at: self.created_at,
            updated_at: self.updated_at,
        };
        let (id, content, created_at, updated_at) = row.try_into_content()?;
        Ok(ArchivedLesson {
            id,
            content,
            archive_at,
            archive_by,
            created_at,
            updated_at,
        })
    }
}
