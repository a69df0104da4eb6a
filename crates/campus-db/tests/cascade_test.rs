//! Integration tests for the cascade orchestrator: multi-document
//! deletions commit atomically and reassign what they orphan.

use campus_core::models::account::NewAccount;
use campus_core::models::category::NewCategory;
use campus_core::models::role::RoleArchetype;
use campus_core::models::user::NewUser;
use campus_core::predicate::Predicate;
use campus_core::store::{
    AccountStore, CategoryStore, DraftLessonStore, LessonTransactions, PublishedLessonStore,
    RoleStore, UserStore,
};
use campus_db::repository::{
    SurrealAccountStore, SurrealCategoryStore, SurrealLessonStore, SurrealRoleStore,
    SurrealUserStore,
};
use campus_db::transactions::{
    delete_account_cascade, delete_category_cascade, delete_user_cascade,
};
use chrono::Utc;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

struct Harness {
    db: Surreal<Db>,
    users: SurrealUserStore<Db>,
    accounts: SurrealAccountStore<Db>,
    lessons: SurrealLessonStore<Db>,
    admin_id: Uuid,
    account_id: Uuid,
    member_id: Uuid,
}

async fn setup() -> Harness {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    campus_db::run_migrations(&db).await.unwrap();

    let roles = SurrealRoleStore::new(db.clone());
    for role in campus_policy::defaults::default_roles() {
        roles.insert(role).await.unwrap();
    }

    let users = SurrealUserStore::new(db.clone());
    let admin_role = roles.get_by_internal_name(RoleArchetype::Admin).await.unwrap();
    let admin = users
        .insert(NewUser {
            email: "root@campus.example".into(),
            first_name: "Root".into(),
            last_name: "Admin".into(),
            phone_number: None,
            role: admin_role.id,
            account: None,
            password_hash: "$argon2id$stub".into(),
            registration_token: None,
        })
        .await
        .unwrap();

    let accounts = SurrealAccountStore::new(db.clone());
    let account = accounts
        .insert(NewAccount {
            institution_name: "Aurora".into(),
            city: "Utrecht".into(),
            contact_name: "N".into(),
            email: "office@aurora.example".into(),
            phone: "1".into(),
            allowed_users: 10,
        })
        .await
        .unwrap();

    let editor_role = roles.get_by_internal_name(RoleArchetype::Editor).await.unwrap();
    let member = users
        .insert(NewUser {
            email: "member@aurora.example".into(),
            first_name: "Member".into(),
            last_name: "Editor".into(),
            phone_number: None,
            role: editor_role.id,
            account: Some(account.id),
            password_hash: "$argon2id$stub".into(),
            registration_token: None,
        })
        .await
        .unwrap();
    accounts.adjust_current_users(account.id, 1).await.unwrap();

    Harness {
        db: db.clone(),
        users,
        accounts,
        lessons: SurrealLessonStore::new(db),
        admin_id: admin.id,
        account_id: account.id,
        member_id: member.id,
    }
}

/// Publish a lesson for `creator` by moving a minimal draft through the
/// store transaction.
async fn seed_published_for(h: &Harness, creator: Uuid) -> Uuid {
    let draft = h.lessons.create_draft(creator).await.unwrap();
    let lesson = campus_core::models::lesson::PublishedLesson::from_draft(draft.clone(), Utc::now());
    h.lessons
        .publish(draft.id, lesson.clone(), None)
        .await
        .unwrap();
    lesson.id
}

#[tokio::test]
async fn account_cascade_removes_members_and_reassigns_lessons() {
    let h = setup().await;

    let lesson_id = seed_published_for(&h, h.member_id).await;
    // The member also has a fresh draft at deletion time.
    let draft = h.lessons.create_draft(h.member_id).await.unwrap();

    let outcome = delete_account_cascade(&h.db, h.account_id).await.unwrap();
    assert_eq!(outcome.deleted_users, vec![h.member_id]);
    assert_eq!(outcome.deleted_drafts, vec![draft.id]);

    // Account and member are gone.
    let err = h
        .accounts
        .get(h.account_id, &Predicate::unrestricted())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    let err = h
        .users
        .get(h.member_id, &Predicate::unrestricted())
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    // The draft went with its creator.
    let err = h.lessons.get_draft_by_creator(h.member_id).await.unwrap_err();
    assert!(err.is_not_found());

    // Published work survives under the system admin.
    let lesson = h
        .lessons
        .get_published(lesson_id, &Predicate::unrestricted())
        .await
        .unwrap();
    assert_eq!(lesson.content.creator, h.admin_id);
}

#[tokio::test]
async fn account_cascade_requires_a_surviving_admin() {
    let h = setup().await;

    // Remove the only admin: nobody is left to inherit lessons.
    h.users
        .delete(h.admin_id, &Predicate::unrestricted())
        .await
        .unwrap();

    let err = delete_account_cascade(&h.db, h.account_id).await.unwrap_err();
    assert!(matches!(
        err,
        campus_core::error::CampusError::Internal(_)
    ));

    // And nothing was half-deleted.
    h.accounts
        .get(h.account_id, &Predicate::unrestricted())
        .await
        .unwrap();
    h.users
        .get(h.member_id, &Predicate::unrestricted())
        .await
        .unwrap();
}

#[tokio::test]
async fn category_cascade_prunes_every_lesson_collection() {
    let h = setup().await;

    let categories = SurrealCategoryStore::new(h.db.clone());
    let keep = categories
        .insert(NewCategory {
            name: "Keep".into(),
            description: None,
        })
        .await
        .unwrap();
    let doomed = categories
        .insert(NewCategory {
            name: "Doomed".into(),
            description: None,
        })
        .await
        .unwrap();

    let draft = h.lessons.create_draft(h.member_id).await.unwrap();
    h.lessons
        .update_draft_basics(
            draft.id,
            &Predicate::unrestricted(),
            campus_core::models::lesson::LessonBasicsPatch {
                categories: Some(vec![keep.id, doomed.id]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    delete_category_cascade(&h.db, doomed.id).await.unwrap();

    let err = categories.get(doomed.id).await.unwrap_err();
    assert!(err.is_not_found());

    let draft = h
        .lessons
        .get_draft(draft.id, &Predicate::unrestricted())
        .await
        .unwrap();
    assert_eq!(draft.content.categories, vec![keep.id]);
}

#[tokio::test]
async fn user_cascade_releases_the_seat_and_reassigns_work() {
    let h = setup().await;

    let lesson_id = seed_published_for(&h, h.member_id).await;
    let draft = h.lessons.create_draft(h.member_id).await.unwrap();

    let before = h
        .accounts
        .get(h.account_id, &Predicate::unrestricted())
        .await
        .unwrap();

    let outcome = delete_user_cascade(&h.db, h.member_id).await.unwrap();
    assert_eq!(outcome.deleted_draft, Some(draft.id));

    let after = h
        .accounts
        .get(h.account_id, &Predicate::unrestricted())
        .await
        .unwrap();
    assert_eq!(after.current_users, before.current_users - 1);

    let lesson = h
        .lessons
        .get_published(lesson_id, &Predicate::unrestricted())
        .await
        .unwrap();
    assert_eq!(lesson.content.creator, h.admin_id);
}
