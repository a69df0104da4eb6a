//! Role, permission and resource-filter domain model.
//!
//! A role carries an ordered rank (lower = more privileged) and one
//! permission per resource it may touch. Each permission binds the allowed
//! actions plus an ordered list of declarative filters that the policy
//! compiler turns into query predicates and write guards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::predicate::FilterOp;

/// Stable internal archetypes. Exactly one role per archetype exists at
/// any time, enforced by a unique index on `internal_name`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleArchetype {
    Admin,
    InstitutionManager,
    Editor,
    Viewer,
    Guest,
}

impl RoleArchetype {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleArchetype::Admin => "admin",
            RoleArchetype::InstitutionManager => "institution_manager",
            RoleArchetype::Editor => "editor",
            RoleArchetype::Viewer => "viewer",
            RoleArchetype::Guest => "guest",
        }
    }
}

/// Entity types subject to access control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Roles,
    Users,
    Accounts,
    DraftLessons,
    PublishedLessons,
    ArchivedLessons,
    Categories,
    Reviews,
}

/// Operation categories on a resource. The `*Limits` variants are
/// write-guard actions: their filters constrain which fields a role may
/// set and to which values, rather than which documents it may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Read,
    ReadMany,
    Update,
    Delete,
    Duplicate,
    UpdateLimits,
    CreateLimits,
    ReadUpdateLimits,
}

/// Where a dynamic filter resolves its comparison value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DynamicSource {
    CurrentUser,
}

/// The comparison value of a resource filter: either a literal fixed at
/// rule-authoring time, or a path resolved at evaluation time from the
/// requesting user's own document (one populated relation deep, e.g.
/// `["account", "allowed_lessons"]`).
///
/// A dynamic filter without a source is unrepresentable; a stored rule
/// document claiming to be dynamic while missing one fails at
/// deserialization, before any request evaluates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterSource {
    Literal {
        value: Value,
    },
    Dynamic {
        source: DynamicSource,
        field_path: Vec<String>,
    },
}

/// How a filter combines into the compiled predicate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombineMode {
    /// Plain top-level AND (the default).
    #[default]
    And,
    /// Members combine with logical OR, the group ANDs with the rest.
    OrGroup,
    /// Members combine with logical AND, the group ANDs with the rest.
    AndGroup,
}

/// One declarative filter inside a permission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceFilter {
    /// Dot-notation path into the target document.
    pub field: String,
    pub op: FilterOp,
    pub source: FilterSource,
    #[serde(default)]
    pub mode: CombineMode,
    /// Actions this filter applies to. Empty means every action.
    #[serde(default)]
    pub apply_to: Vec<Action>,
    #[serde(default)]
    pub description: Option<String>,
}

impl ResourceFilter {
    pub fn literal(field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            source: FilterSource::Literal {
                value: value.into(),
            },
            mode: CombineMode::And,
            apply_to: Vec::new(),
            description: None,
        }
    }

    pub fn dynamic<I, S>(field: impl Into<String>, op: FilterOp, field_path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            field: field.into(),
            op,
            source: FilterSource::Dynamic {
                source: DynamicSource::CurrentUser,
                field_path: field_path.into_iter().map(Into::into).collect(),
            },
            mode: CombineMode::And,
            apply_to: Vec::new(),
            description: None,
        }
    }

    pub fn or_grouped(mut self) -> Self {
        self.mode = CombineMode::OrGroup;
        self
    }

    pub fn and_grouped(mut self) -> Self {
        self.mode = CombineMode::AndGroup;
        self
    }

    pub fn applying_to(mut self, actions: impl IntoIterator<Item = Action>) -> Self {
        self.apply_to = actions.into_iter().collect();
        self
    }

    pub fn applies_to(&self, action: Action) -> bool {
        self.apply_to.is_empty() || self.apply_to.contains(&action)
    }

    /// Whether the literal is the `"*"` wildcard, which on a limits action
    /// marks the field as immutable for this role.
    pub fn is_wildcard(&self) -> bool {
        matches!(&self.source, FilterSource::Literal { value } if value == "*")
    }
}

/// A role's access grant for one resource. One permission exists per
/// (role, resource) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Permission {
    pub resource: Resource,
    pub actions: Vec<Action>,
    #[serde(default)]
    pub filters: Vec<ResourceFilter>,
}

impl Permission {
    pub fn new(resource: Resource, actions: impl IntoIterator<Item = Action>) -> Self {
        Self {
            resource,
            actions: actions.into_iter().collect(),
            filters: Vec::new(),
        }
    }

    pub fn with_filters(mut self, filters: impl IntoIterator<Item = ResourceFilter>) -> Self {
        self.filters = filters.into_iter().collect();
        self
    }

    pub fn allows(&self, action: Action) -> bool {
        self.actions.contains(&action)
    }
}

/// The set of roles a role may administer (assign, edit).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "roles", rename_all = "snake_case")]
pub enum ManagedRoles {
    /// Wildcard: may administer every role.
    All,
    Ids(Vec<Uuid>),
}

impl ManagedRoles {
    pub fn manages(&self, role_id: Uuid) -> bool {
        match self {
            ManagedRoles::All => true,
            ManagedRoles::Ids(ids) => ids.contains(&role_id),
        }
    }
}

impl Default for ManagedRoles {
    fn default() -> Self {
        ManagedRoles::Ids(Vec::new())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub internal_name: RoleArchetype,
    /// Lower rank = more privileged. Rank 0 is the top rank.
    pub rank: i64,
    pub managed_roles: ManagedRoles,
    /// Whether users holding this role must belong to an account.
    pub require_account: bool,
    pub permissions: Vec<Permission>,
    /// Role-level grant lists, shared by every holder of the role.
    pub lessons: Vec<Uuid>,
    pub categories: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Role {
    /// The permission covering `resource`, if the role has one.
    pub fn permission_for(&self, resource: Resource) -> Option<&Permission> {
        self.permissions.iter().find(|p| p.resource == resource)
    }
}

/// Input for inserting a role (seeding and role administration).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRole {
    pub name: String,
    pub internal_name: RoleArchetype,
    pub rank: i64,
    pub managed_roles: ManagedRoles,
    pub require_account: bool,
    pub permissions: Vec<Permission>,
}
