//! The authorization filter compiler.
//!
//! Turns the declarative filters of a role's permission into a
//! [`Predicate`] for one (user, resource, action) triple. Dynamic filters
//! are resolved once per call against the caller's own populated
//! document, before predicate construction, so no user lookups leak into
//! call sites.

use campus_core::error::CampusResult;
use campus_core::models::role::{
    Action, CombineMode, DynamicSource, FilterSource, Resource, RoleArchetype,
};
use campus_core::models::user::CurrentUser;
use campus_core::predicate::{Comparison, Predicate, lookup_path};
use campus_core::store::RoleStore;
use serde_json::Value;
use std::sync::Arc;

use crate::cache::RoleCache;
use crate::error::PolicyError;
use crate::guard;

/// Compile the caller's permission filters for `resource`/`action` into a
/// query predicate.
///
/// Absence of a matching permission is an error, never an unrestricted
/// predicate — an unrestricted predicate means "this role may see
/// everything", which only a permission with no filters can express.
pub fn compile(
    user: &CurrentUser,
    resource: Resource,
    action: Action,
) -> Result<Predicate, PolicyError> {
    let permission = user
        .role
        .permission_for(resource)
        .filter(|p| p.allows(action))
        .ok_or(PolicyError::NoPermission { resource })?;

    let doc = user.document();
    let mut predicate = Predicate::default();

    for filter in &permission.filters {
        if !filter.applies_to(action) {
            continue;
        }

        let value = resolve_value(&filter.source, &doc)?;
        let cmp = Comparison::new(filter.field.clone(), filter.op, value);

        match filter.mode {
            CombineMode::And => predicate.all.push(cmp),
            CombineMode::OrGroup => predicate.any_of.push(cmp),
            CombineMode::AndGroup => predicate.all_of.push(cmp),
        }
    }

    Ok(predicate)
}

/// Resolve a filter's comparison value: literals pass through, dynamic
/// paths walk the caller's document (role/account relations included).
pub(crate) fn resolve_value(
    source: &FilterSource,
    user_doc: &Value,
) -> Result<Value, PolicyError> {
    match source {
        FilterSource::Literal { value } => Ok(value.clone()),
        FilterSource::Dynamic {
            source: DynamicSource::CurrentUser,
            field_path,
        } => {
            let path = field_path.join(".");
            let value = lookup_path(user_doc, &path)
                .filter(|v| !v.is_null())
                .ok_or_else(|| PolicyError::DynamicResolution { path: path.clone() })?;
            Ok(value.clone())
        }
    }
}

/// The filter compiler with its role cache.
///
/// Compilation itself is pure; the engine exists so the role cache has an
/// owner that tests can construct fresh rather than ambient module state.
pub struct PolicyEngine<R: RoleStore> {
    roles: RoleCache<R>,
}

impl<R: RoleStore> PolicyEngine<R> {
    pub fn new(role_store: R) -> Self {
        Self {
            roles: RoleCache::new(role_store),
        }
    }

    pub fn compile(
        &self,
        user: &CurrentUser,
        resource: Resource,
        action: Action,
    ) -> Result<Predicate, PolicyError> {
        compile(user, resource, action)
    }

    pub fn verify_write_guard(
        &self,
        user: &CurrentUser,
        resource: Resource,
        proposed: &serde_json::Map<String, Value>,
        guard_action: Action,
    ) -> Result<(), PolicyError> {
        guard::verify_write_guard(user, resource, proposed, guard_action)
    }

    pub fn check_access(
        &self,
        user: &CurrentUser,
        needed: &[(Resource, &[Action])],
    ) -> Result<(), PolicyError> {
        guard::check_access(user, needed)
    }

    /// Cached role lookup by internal name.
    pub async fn role(&self, name: RoleArchetype) -> CampusResult<Arc<campus_core::models::role::Role>> {
        self.roles.get(name).await
    }

    pub fn invalidate_role(&self, name: RoleArchetype) {
        self.roles.invalidate(name);
    }

    pub fn invalidate_all_roles(&self) {
        self.roles.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_core::models::role::{ManagedRoles, Permission, ResourceFilter, Role};
    use campus_core::models::user::User;
    use campus_core::predicate::FilterOp;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn role_with(permissions: Vec<Permission>) -> Role {
        Role {
            id: Uuid::new_v4(),
            name: "Viewer".into(),
            internal_name: RoleArchetype::Viewer,
            rank: 3,
            managed_roles: ManagedRoles::default(),
            require_account: true,
            permissions,
            lessons: Vec::new(),
            categories: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn user_with(role: Role, allowed_lessons: Vec<Uuid>) -> CurrentUser {
        let now = Utc::now();
        CurrentUser {
            user: User {
                id: Uuid::new_v4(),
                email: "viewer@example.com".into(),
                first_name: "Vera".into(),
                last_name: "Viewer".into(),
                full_name: "Vera Viewer".into(),
                phone_number: None,
                role: role.id,
                account: None,
                allowed_lessons,
                allowed_categories: Vec::new(),
                password_hash: "x".into(),
                registration_token: None,
                registration_completed: true,
                reset_password_token: None,
                created_at: now,
                updated_at: now,
            },
            role,
            account: None,
        }
    }

    #[test]
    fn missing_permission_is_forbidden_not_match_all() {
        let user = user_with(role_with(vec![]), vec![]);
        let err = compile(&user, Resource::PublishedLessons, Action::Read).unwrap_err();
        assert!(matches!(err, PolicyError::NoPermission { .. }));
    }

    #[test]
    fn action_outside_permission_is_forbidden() {
        let perm = Permission::new(Resource::PublishedLessons, [Action::Read]);
        let user = user_with(role_with(vec![perm]), vec![]);
        let err = compile(&user, Resource::PublishedLessons, Action::Delete).unwrap_err();
        assert!(matches!(err, PolicyError::NoPermission { .. }));
    }

    #[test]
    fn filters_route_into_their_buckets() {
        let perm = Permission::new(Resource::PublishedLessons, [Action::Read]).with_filters([
            ResourceFilter::literal("public", FilterOp::Equal, true).or_grouped(),
            ResourceFilter::dynamic("id", FilterOp::In, ["allowed_lessons"]).or_grouped(),
            ResourceFilter::literal("mid_edit", FilterOp::Equal, false),
            ResourceFilter::dynamic("creator", FilterOp::Equal, ["id"]).and_grouped(),
        ]);
        let lesson = Uuid::new_v4();
        let user = user_with(role_with(vec![perm]), vec![lesson]);

        let predicate = compile(&user, Resource::PublishedLessons, Action::Read).unwrap();
        assert_eq!(predicate.all.len(), 1);
        assert_eq!(predicate.any_of.len(), 2);
        assert_eq!(predicate.all_of.len(), 1);
        assert_eq!(
            predicate.any_of[1].value,
            json!([lesson.to_string()]),
            "dynamic allow-list resolves from the user document"
        );
    }

    #[test]
    fn apply_to_excludes_filters_from_other_actions() {
        let perm = Permission::new(Resource::PublishedLessons, [Action::Read, Action::Update])
            .with_filters([
                ResourceFilter::literal("public", FilterOp::Equal, true)
                    .applying_to([Action::Read]),
                ResourceFilter::dynamic("creator", FilterOp::Equal, ["id"])
                    .applying_to([Action::Update]),
            ]);
        let user = user_with(role_with(vec![perm]), vec![]);

        let read = compile(&user, Resource::PublishedLessons, Action::Read).unwrap();
        assert_eq!(read.all.len(), 1);
        assert_eq!(read.all[0].field, "public");

        let update = compile(&user, Resource::PublishedLessons, Action::Update).unwrap();
        assert_eq!(update.all.len(), 1);
        assert_eq!(update.all[0].field, "creator");
    }

    #[test]
    fn unresolvable_dynamic_path_is_a_defect() {
        let perm = Permission::new(Resource::PublishedLessons, [Action::Read]).with_filters([
            ResourceFilter::dynamic("id", FilterOp::In, ["account", "allowed_lessons"]),
        ]);
        // User has no account, so the relation is unresolvable.
        let user = user_with(role_with(vec![perm]), vec![]);

        let err = compile(&user, Resource::PublishedLessons, Action::Read).unwrap_err();
        assert!(matches!(err, PolicyError::DynamicResolution { .. }));
    }

    /// The end-to-end viewer scenario: public OR allow-listed.
    #[test]
    fn viewer_predicate_matches_allow_listed_private_lesson() {
        let l1 = Uuid::new_v4();
        let l2 = Uuid::new_v4();
        let perm = Permission::new(Resource::PublishedLessons, [Action::Read]).with_filters([
            ResourceFilter::literal("public", FilterOp::Equal, true).or_grouped(),
            ResourceFilter::dynamic("id", FilterOp::In, ["allowed_lessons"]).or_grouped(),
        ]);
        let user = user_with(role_with(vec![perm]), vec![l2]);
        let predicate = compile(&user, Resource::PublishedLessons, Action::Read).unwrap();

        let private_l1 = json!({"id": l1.to_string(), "public": false});
        let private_l2 = json!({"id": l2.to_string(), "public": false});
        let public_l1 = json!({"id": l1.to_string(), "public": true});

        assert!(!predicate.matches(&private_l1));
        assert!(predicate.matches(&private_l2));
        assert!(predicate.matches(&public_l1));
    }
}
