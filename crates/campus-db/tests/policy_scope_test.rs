//! Integration tests for compiled policy predicates executed against
//! in-memory SurrealDB: visibility scoping, action routing and the
//! end-to-end viewer scenario.

use campus_core::models::role::{Action, Resource, RoleArchetype};
use campus_core::models::user::{CurrentUser, NewUser, UserPatch};
use campus_core::predicate::Predicate;
use campus_core::store::{
    AccountStore, Pagination, PublishedLessonStore, RoleStore, UserStore,
};
use campus_core::models::account::NewAccount;
use campus_db::repository::{
    SurrealAccountStore, SurrealLessonStore, SurrealRoleStore, SurrealUserStore,
};
use campus_policy::compiler::compile;
use campus_policy::error::PolicyError;
use campus_policy::guard::verify_write_guard;
use serde_json::json;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

async fn setup() -> (Surreal<Db>, SurrealUserStore<Db>, SurrealRoleStore<Db>) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    campus_db::run_migrations(&db).await.unwrap();

    let roles = SurrealRoleStore::new(db.clone());
    for role in campus_policy::defaults::default_roles() {
        roles.insert(role).await.unwrap();
    }

    (db.clone(), SurrealUserStore::new(db.clone()), roles)
}

async fn make_user(
    users: &SurrealUserStore<Db>,
    roles: &SurrealRoleStore<Db>,
    email: &str,
    archetype: RoleArchetype,
    account: Option<Uuid>,
) -> CurrentUser {
    let role = roles.get_by_internal_name(archetype).await.unwrap();
    let user = users
        .insert(NewUser {
            email: email.into(),
            first_name: "Test".into(),
            last_name: "User".into(),
            phone_number: None,
            role: role.id,
            account,
            password_hash: "$argon2id$stub".into(),
            registration_token: None,
        })
        .await
        .unwrap();
    users.resolve_current(user.id).await.unwrap()
}

/// Insert a published lesson directly, bypassing the draft flow.
async fn seed_published(db: &Surreal<Db>, creator: Uuid, public: bool) -> Uuid {
    let id = Uuid::new_v4();
    db.query(
        "CREATE type::record('published_lesson', $id) SET \
         title = $title, description = 'seeded', creator = $creator, \
         description_file = NONE, parts = [], viewed = 0, categories = [], \
         thumbnail = NONE, public = $public, credit = NONE, \
         mid_edit = false, edit_data = NONE, \
         created_at = time::now(), updated_at = time::now()",
    )
    .bind(("id", id.to_string()))
    .bind(("title", format!("Lesson {id}")))
    .bind(("creator", creator.to_string()))
    .bind(("public", public))
    .await
    .unwrap()
    .check()
    .unwrap();
    id
}

#[tokio::test]
async fn viewer_reaches_public_or_allow_listed_lessons_only() {
    let (db, users, roles) = setup().await;

    let editor = make_user(&users, &roles, "creator@example.com", RoleArchetype::Editor, None).await;
    let l1 = seed_published(&db, editor.id(), false).await;
    let l2 = seed_published(&db, editor.id(), false).await;
    let l3 = seed_published(&db, editor.id(), true).await;

    // Viewers must belong to an account; their account branch resolves
    // against its (empty) allow-list.
    let accounts = SurrealAccountStore::new(db.clone());
    let account = accounts
        .insert(NewAccount {
            institution_name: "Aurora".into(),
            city: "Utrecht".into(),
            contact_name: "A".into(),
            email: "a@example.com".into(),
            phone: "1".into(),
            allowed_users: 5,
        })
        .await
        .unwrap();

    let viewer = make_user(
        &users,
        &roles,
        "viewer@example.com",
        RoleArchetype::Viewer,
        Some(account.id),
    )
    .await;
    users
        .update(
            viewer.id(),
            &Predicate::unrestricted(),
            UserPatch {
                allowed_lessons: Some(vec![l2]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let viewer = users.resolve_current(viewer.id()).await.unwrap();

    let scope = compile(&viewer, Resource::PublishedLessons, Action::Read).unwrap();
    let lessons = SurrealLessonStore::new(db.clone());

    // L1: private and not granted → indistinguishable from absent.
    let err = lessons.get_published(l1, &scope).await.unwrap_err();
    assert!(err.is_not_found());

    // L2: private but allow-listed → the dynamic OR branch admits it.
    let lesson = lessons.get_published(l2, &scope).await.unwrap();
    assert_eq!(lesson.id, l2);

    // L3: public → the literal OR branch admits it.
    let lesson = lessons.get_published(l3, &scope).await.unwrap();
    assert_eq!(lesson.id, l3);

    // The list view agrees with the point reads.
    let scope = compile(&viewer, Resource::PublishedLessons, Action::ReadMany).unwrap();
    let page = lessons
        .list_published(&scope, Pagination::default())
        .await
        .unwrap();
    let mut ids: Vec<Uuid> = page.items.iter().map(|l| l.id).collect();
    ids.sort();
    let mut expected = vec![l2, l3];
    expected.sort();
    assert_eq!(ids, expected);
    assert_eq!(page.total, 2);
}

#[tokio::test]
async fn guests_see_only_public_lessons() {
    let (db, users, roles) = setup().await;

    let editor = make_user(&users, &roles, "creator@example.com", RoleArchetype::Editor, None).await;
    seed_published(&db, editor.id(), false).await;
    let public = seed_published(&db, editor.id(), true).await;

    let guest = make_user(&users, &roles, "guest@example.com", RoleArchetype::Guest, None).await;
    let scope = compile(&guest, Resource::PublishedLessons, Action::ReadMany).unwrap();

    let lessons = SurrealLessonStore::new(db.clone());
    let page = lessons
        .list_published(&scope, Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].id, public);
}

#[tokio::test]
async fn guests_hold_no_write_permission_at_all() {
    let (_db, users, roles) = setup().await;
    let guest = make_user(&users, &roles, "guest@example.com", RoleArchetype::Guest, None).await;

    let err = compile(&guest, Resource::PublishedLessons, Action::Update).unwrap_err();
    assert!(matches!(err, PolicyError::NoPermission { .. }));
    let err = compile(&guest, Resource::DraftLessons, Action::Read).unwrap_err();
    assert!(matches!(err, PolicyError::NoPermission { .. }));
}

#[tokio::test]
async fn managers_are_scoped_to_their_own_institution() {
    let (db, users, roles) = setup().await;

    let accounts = SurrealAccountStore::new(db.clone());
    let ours = accounts
        .insert(NewAccount {
            institution_name: "Aurora".into(),
            city: "Utrecht".into(),
            contact_name: "A".into(),
            email: "a@example.com".into(),
            phone: "1".into(),
            allowed_users: 5,
        })
        .await
        .unwrap();
    let theirs = accounts
        .insert(NewAccount {
            institution_name: "Borealis".into(),
            city: "Leiden".into(),
            contact_name: "B".into(),
            email: "b@example.com".into(),
            phone: "2".into(),
            allowed_users: 5,
        })
        .await
        .unwrap();

    let manager = make_user(
        &users,
        &roles,
        "manager@aurora.example",
        RoleArchetype::InstitutionManager,
        Some(ours.id),
    )
    .await;
    make_user(
        &users,
        &roles,
        "insider@aurora.example",
        RoleArchetype::Viewer,
        Some(ours.id),
    )
    .await;
    make_user(
        &users,
        &roles,
        "outsider@borealis.example",
        RoleArchetype::Viewer,
        Some(theirs.id),
    )
    .await;

    let scope = compile(&manager, Resource::Users, Action::ReadMany).unwrap();
    let page = users.list(&scope, Pagination::default()).await.unwrap();

    assert_eq!(page.total, 2, "manager plus their one member");
    assert!(
        page.items
            .iter()
            .all(|u| u.account == Some(ours.id)),
        "no foreign-institution users may appear"
    );
}

#[tokio::test]
async fn manager_write_guard_blocks_capacity_and_foreign_roles() {
    let (_db, users, roles) = setup().await;

    let manager = make_user(
        &users,
        &roles,
        "manager@example.com",
        RoleArchetype::InstitutionManager,
        None,
    )
    .await;

    // Capacity fields are wildcard-guarded: immutable whatever the value.
    let proposed = json!({"allowed_users": 500});
    let err = verify_write_guard(
        &manager,
        Resource::Accounts,
        proposed.as_object().unwrap(),
        Action::UpdateLimits,
    )
    .unwrap_err();
    assert!(matches!(err, PolicyError::GuardRejected { field } if field == "allowed_users"));

    // The default manager manages no roles, so any role assignment fails.
    let viewer_role = roles
        .get_by_internal_name(RoleArchetype::Viewer)
        .await
        .unwrap();
    let proposed = json!({"role": viewer_role.id.to_string()});
    let err = verify_write_guard(
        &manager,
        Resource::Users,
        proposed.as_object().unwrap(),
        Action::UpdateLimits,
    )
    .unwrap_err();
    assert!(matches!(err, PolicyError::GuardRejected { field } if field == "role"));

    // Fields nobody guards pass through.
    let proposed = json!({"first_name": "Renamed"});
    verify_write_guard(
        &manager,
        Resource::Users,
        proposed.as_object().unwrap(),
        Action::UpdateLimits,
    )
    .unwrap();
}

#[tokio::test]
async fn duplicate_emails_conflict() {
    let (_db, users, roles) = setup().await;

    make_user(&users, &roles, "same@example.com", RoleArchetype::Viewer, None).await;

    let role = roles.get_by_internal_name(RoleArchetype::Viewer).await.unwrap();
    let err = users
        .insert(NewUser {
            email: "SAME@example.com".into(),
            first_name: "Dup".into(),
            last_name: "User".into(),
            phone_number: None,
            role: role.id,
            account: None,
            password_hash: "$argon2id$stub".into(),
            registration_token: None,
        })
        .await
        .unwrap_err();
    assert!(err.is_conflict(), "emails are unique case-insensitively");
}
