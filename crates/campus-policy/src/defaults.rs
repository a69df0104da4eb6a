//! The built-in role set.
//!
//! One role per internal archetype. These are seeded at bootstrap and
//! define the whole permission surface declaratively; nothing else in
//! the system hard-codes per-role behaviour.

use campus_core::models::role::{
    Action, ManagedRoles, NewRole, Permission, Resource, ResourceFilter, RoleArchetype,
};
use campus_core::predicate::FilterOp;
use serde_json::json;

const VISIBILITY_ACTIONS: [Action; 4] = [
    Action::Read,
    Action::ReadMany,
    Action::Duplicate,
    Action::Update,
];

/// Visible if public, own work, granted to the user directly, or granted
/// to the user's account. One OR-group serves reads, duplication and
/// updates.
fn lesson_visibility_filters() -> Vec<ResourceFilter> {
    vec![
        ResourceFilter::literal("public", FilterOp::Equal, true)
            .or_grouped()
            .applying_to(VISIBILITY_ACTIONS),
        ResourceFilter::dynamic("creator", FilterOp::Equal, ["id"])
            .or_grouped()
            .applying_to(VISIBILITY_ACTIONS),
        ResourceFilter::dynamic("id", FilterOp::In, ["allowed_lessons"])
            .or_grouped()
            .applying_to(VISIBILITY_ACTIONS),
        ResourceFilter::dynamic("id", FilterOp::In, ["account", "allowed_lessons"])
            .or_grouped()
            .applying_to(VISIBILITY_ACTIONS),
    ]
}

fn category_visibility_filters() -> Vec<ResourceFilter> {
    vec![
        ResourceFilter::dynamic("id", FilterOp::In, ["allowed_categories"])
            .or_grouped()
            .applying_to([Action::Read, Action::ReadMany]),
        ResourceFilter::dynamic("id", FilterOp::In, ["account", "allowed_categories"])
            .or_grouped()
            .applying_to([Action::Read, Action::ReadMany]),
    ]
}

fn admin() -> NewRole {
    let every_action = [
        Action::Create,
        Action::Read,
        Action::ReadMany,
        Action::Update,
        Action::Delete,
        Action::Duplicate,
    ];
    NewRole {
        name: "Administrator".into(),
        internal_name: RoleArchetype::Admin,
        rank: 0,
        managed_roles: ManagedRoles::All,
        require_account: false,
        permissions: vec![
            Permission::new(Resource::Roles, every_action),
            Permission::new(Resource::Users, every_action),
            Permission::new(Resource::Accounts, every_action),
            Permission::new(Resource::DraftLessons, every_action),
            Permission::new(Resource::PublishedLessons, every_action),
            Permission::new(Resource::ArchivedLessons, every_action),
            Permission::new(Resource::Categories, every_action),
            Permission::new(Resource::Reviews, every_action),
        ],
    }
}

fn institution_manager() -> NewRole {
    NewRole {
        name: "Institution manager".into(),
        internal_name: RoleArchetype::InstitutionManager,
        rank: 1,
        managed_roles: ManagedRoles::Ids(Vec::new()),
        require_account: true,
        permissions: vec![
            // Sees and manages only the users of their own institution;
            // may only hand out roles from their managed set.
            Permission::new(
                Resource::Users,
                [
                    Action::Create,
                    Action::Read,
                    Action::ReadMany,
                    Action::Update,
                    Action::Delete,
                ],
            )
            .with_filters([
                ResourceFilter::dynamic("account", FilterOp::Equal, ["account", "id"])
                    .applying_to([
                        Action::Read,
                        Action::ReadMany,
                        Action::Update,
                        Action::Delete,
                    ]),
                ResourceFilter::dynamic(
                    "role",
                    FilterOp::In,
                    ["role", "managed_roles", "roles"],
                )
                .applying_to([Action::UpdateLimits, Action::CreateLimits]),
                ResourceFilter::dynamic("account", FilterOp::Equal, ["account", "id"])
                    .applying_to([Action::UpdateLimits, Action::CreateLimits]),
            ]),
            // Their own account only; capacity counters are off limits.
            Permission::new(Resource::Accounts, [Action::Read, Action::Update]).with_filters([
                ResourceFilter::dynamic("id", FilterOp::Equal, ["account", "id"]).applying_to([
                    Action::Read,
                    Action::Update,
                ]),
                ResourceFilter::literal("allowed_users", FilterOp::Equal, json!("*"))
                    .applying_to([Action::UpdateLimits]),
                ResourceFilter::literal("current_users", FilterOp::Equal, json!("*"))
                    .applying_to([Action::UpdateLimits]),
                ResourceFilter::literal("allowed_lessons", FilterOp::Equal, json!("*"))
                    .applying_to([Action::UpdateLimits]),
            ]),
            Permission::new(
                Resource::PublishedLessons,
                [Action::Read, Action::ReadMany, Action::Duplicate],
            )
            .with_filters(lesson_visibility_filters()),
            Permission::new(Resource::Categories, [Action::Read, Action::ReadMany])
                .with_filters(category_visibility_filters()),
            Permission::new(Resource::Reviews, [Action::Read, Action::ReadMany]),
        ],
    }
}

fn editor() -> NewRole {
    NewRole {
        name: "Editor".into(),
        internal_name: RoleArchetype::Editor,
        rank: 2,
        managed_roles: ManagedRoles::Ids(Vec::new()),
        require_account: true,
        permissions: vec![
            // Drafts are strictly their own.
            Permission::new(
                Resource::DraftLessons,
                [
                    Action::Create,
                    Action::Read,
                    Action::Update,
                    Action::Delete,
                ],
            )
            .with_filters([ResourceFilter::dynamic("creator", FilterOp::Equal, ["id"])
                .and_grouped()]),
            Permission::new(
                Resource::PublishedLessons,
                [
                    Action::Create,
                    Action::Read,
                    Action::ReadMany,
                    Action::Update,
                    Action::Duplicate,
                ],
            )
            .with_filters(lesson_visibility_filters()),
            Permission::new(Resource::Categories, [Action::Read, Action::ReadMany])
                .with_filters(category_visibility_filters()),
            Permission::new(
                Resource::Reviews,
                [Action::Create, Action::Read, Action::ReadMany],
            ),
        ],
    }
}

fn viewer() -> NewRole {
    NewRole {
        name: "Viewer".into(),
        internal_name: RoleArchetype::Viewer,
        rank: 3,
        managed_roles: ManagedRoles::Ids(Vec::new()),
        require_account: true,
        permissions: vec![
            Permission::new(Resource::PublishedLessons, [Action::Read, Action::ReadMany])
                .with_filters(vec![
                    ResourceFilter::literal("public", FilterOp::Equal, true).or_grouped(),
                    ResourceFilter::dynamic("id", FilterOp::In, ["allowed_lessons"]).or_grouped(),
                    ResourceFilter::dynamic("id", FilterOp::In, ["account", "allowed_lessons"])
                        .or_grouped(),
                ]),
            Permission::new(Resource::Categories, [Action::Read, Action::ReadMany])
                .with_filters(category_visibility_filters()),
            Permission::new(
                Resource::Reviews,
                [Action::Create, Action::Read, Action::ReadMany],
            ),
        ],
    }
}

fn guest() -> NewRole {
    NewRole {
        name: "Guest".into(),
        internal_name: RoleArchetype::Guest,
        rank: 4,
        managed_roles: ManagedRoles::Ids(Vec::new()),
        require_account: false,
        permissions: vec![
            Permission::new(Resource::PublishedLessons, [Action::Read, Action::ReadMany])
                .with_filters([ResourceFilter::literal("public", FilterOp::Equal, true)]),
        ],
    }
}

/// The five archetype roles, most privileged first.
pub fn default_roles() -> Vec<NewRole> {
    vec![admin(), institution_manager(), editor(), viewer(), guest()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_role_per_archetype() {
        let roles = default_roles();
        assert_eq!(roles.len(), 5);
        let mut names: Vec<_> = roles.iter().map(|r| r.internal_name).collect();
        names.dedup();
        assert_eq!(names.len(), 5);
    }

    #[test]
    fn ranks_order_privilege() {
        let roles = default_roles();
        for pair in roles.windows(2) {
            assert!(pair[0].rank < pair[1].rank);
        }
    }

    #[test]
    fn guests_only_see_public_lessons() {
        let guest = guest();
        let perm = &guest.permissions[0];
        assert_eq!(perm.resource, Resource::PublishedLessons);
        assert!(!perm.allows(Action::Update));
        assert_eq!(perm.filters.len(), 1);
    }
}
