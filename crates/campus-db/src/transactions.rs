//! Cascade orchestration — multi-entity deletions as single atomic
//! transactions.
//!
//! Every cascade runs as one multi-statement transaction: either all
//! sub-steps commit or the whole cascade aborts on the first failure. No
//! blob-store side effect happens here; callers receive the ids of
//! removed documents and clean their files up afterwards.

use campus_core::error::{CampusError, CampusResult};
use surrealdb::{Connection, Surreal};
use uuid::Uuid;

use crate::error::DbError;
use crate::repository::rows::IdRow;

/// Documents removed by an account deletion, for blob cleanup.
#[derive(Debug, Clone, Default)]
pub struct AccountCascade {
    pub deleted_users: Vec<Uuid>,
    pub deleted_drafts: Vec<Uuid>,
}

/// Documents removed by a user deletion, for blob cleanup.
#[derive(Debug, Clone, Default)]
pub struct UserCascade {
    pub deleted_draft: Option<Uuid>,
}

/// The user holding the admin archetype; lessons orphaned by a cascade
/// are reassigned to them. Without one, destructive cascades refuse to
/// run.
async fn system_admin_id<C: Connection>(db: &Surreal<C>) -> CampusResult<Uuid> {
    let mut result = db
        .query(
            "SELECT meta::id(id) AS record_id FROM user WHERE role IN \
             (SELECT VALUE meta::id(id) FROM role \
              WHERE internal_name = 'admin') \
             LIMIT 1",
        )
        .await
        .map_err(DbError::from)?;

    let ids: Vec<IdRow> = result.take(0).map_err(DbError::from)?;
    let row = ids.into_iter().next().ok_or_else(|| {
        CampusError::Internal("no admin user exists to inherit orphaned lessons".into())
    })?;
    Ok(row.into_uuid("user")?)
}

/// Delete an account with everything it owns: its users and their
/// drafts go, their published and archived lessons (and any editor or
/// archive stamps pointing at them) are reassigned to the system admin.
pub async fn delete_account_cascade<C: Connection>(
    db: &Surreal<C>,
    account_id: Uuid,
) -> CampusResult<AccountCascade> {
    let admin = system_admin_id(db).await?;
    let account_key = account_id.to_string();

    // Collect the doomed documents first; the transaction below re-checks
    // the account still exists.
    let mut result = db
        .query(
            "SELECT meta::id(id) AS record_id FROM user WHERE account = $account; \
             SELECT meta::id(id) AS record_id FROM draft_lesson WHERE creator IN \
             (SELECT VALUE meta::id(id) FROM user WHERE account = $account)",
        )
        .bind(("account", account_key.clone()))
        .await
        .map_err(DbError::from)?;

    let user_rows: Vec<IdRow> = result.take(0).map_err(DbError::from)?;
    let draft_rows: Vec<IdRow> = result.take(1).map_err(DbError::from)?;

    let deleted_users = user_rows
        .into_iter()
        .map(|r| r.into_uuid("user"))
        .collect::<Result<Vec<_>, DbError>>()?;
    let deleted_drafts = draft_rows
        .into_iter()
        .map(|r| r.into_uuid("draft_lesson"))
        .collect::<Result<Vec<_>, DbError>>()?;

    let user_keys: Vec<String> = deleted_users.iter().map(Uuid::to_string).collect();

    let result = db
        .query(
            "BEGIN TRANSACTION; \
             LET $deleted = (DELETE type::record('account', $account) RETURN BEFORE); \
             IF array::len($deleted) == 0 { THROW 'campus:not_found:account' }; \
             DELETE user WHERE account = $account_key; \
             DELETE draft_lesson WHERE creator INSIDE $user_keys; \
             UPDATE published_lesson SET creator = $admin \
             WHERE creator INSIDE $user_keys; \
             UPDATE archived_lesson SET creator = $admin \
             WHERE creator INSIDE $user_keys; \
             UPDATE published_lesson SET edit_data.current_editor = $admin \
             WHERE mid_edit = true AND edit_data.current_editor INSIDE $user_keys; \
             UPDATE published_lesson SET edit_data.initial_editor = $admin \
             WHERE mid_edit = true AND edit_data.initial_editor INSIDE $user_keys; \
             UPDATE archived_lesson SET edit_data.current_editor = $admin \
             WHERE mid_edit = true AND edit_data.current_editor INSIDE $user_keys; \
             UPDATE archived_lesson SET edit_data.initial_editor = $admin \
             WHERE mid_edit = true AND edit_data.initial_editor INSIDE $user_keys; \
             UPDATE archived_lesson SET archive_by = $admin \
             WHERE archive_by INSIDE $user_keys; \
             COMMIT TRANSACTION;",
        )
        .bind(("account", account_key.clone()))
        .bind(("account_key", account_key.clone()))
        .bind(("admin", admin.to_string()))
        .bind(("user_keys", user_keys))
        .await
        .map_err(DbError::from)?;

    result
        .check()
        .map_err(|e| DbError::from_statement(e, "account", &account_key))?;

    Ok(AccountCascade {
        deleted_users,
        deleted_drafts,
    })
}

/// Delete a category and prune its references from every lesson
/// collection.
pub async fn delete_category_cascade<C: Connection>(
    db: &Surreal<C>,
    category_id: Uuid,
) -> CampusResult<()> {
    let key = category_id.to_string();

    let result = db
        .query(
            "BEGIN TRANSACTION; \
             LET $deleted = (DELETE type::record('category', $id) RETURN BEFORE); \
             IF array::len($deleted) == 0 { THROW 'campus:not_found:category' }; \
             UPDATE published_lesson SET categories -= $key \
             WHERE categories CONTAINS $key; \
             UPDATE draft_lesson SET categories -= $key \
             WHERE categories CONTAINS $key; \
             UPDATE archived_lesson SET categories -= $key \
             WHERE categories CONTAINS $key; \
             COMMIT TRANSACTION;",
        )
        .bind(("id", key.clone()))
        .bind(("key", key.clone()))
        .await
        .map_err(DbError::from)?;

    result
        .check()
        .map_err(|e| DbError::from_statement(e, "category", &key))?;
    Ok(())
}

/// Delete a single user: their draft goes with them, their published and
/// archived lessons move to the system admin, and their account's seat
/// counter is released.
pub async fn delete_user_cascade<C: Connection>(
    db: &Surreal<C>,
    user_id: Uuid,
) -> CampusResult<UserCascade> {
    let admin = system_admin_id(db).await?;
    let user_key = user_id.to_string();

    let mut result = db
        .query(
            "SELECT meta::id(id) AS record_id FROM draft_lesson \
             WHERE creator = $user; \
             SELECT VALUE account FROM type::record('user', $user)",
        )
        .bind(("user", user_key.clone()))
        .await
        .map_err(DbError::from)?;

    let draft_rows: Vec<IdRow> = result.take(0).map_err(DbError::from)?;
    let accounts: Vec<Option<String>> = result.take(1).map_err(DbError::from)?;

    let deleted_draft = draft_rows
        .into_iter()
        .next()
        .map(|r| r.into_uuid("draft_lesson"))
        .transpose()?;
    let account = accounts.into_iter().flatten().next();

    let seat_step = if account.is_some() {
        "UPDATE type::record('account', $account) SET \
         current_users -= 1, updated_at = time::now();"
    } else {
        ""
    };

    let query_str = format!(
        "BEGIN TRANSACTION; \
         LET $deleted = (DELETE type::record('user', $user) RETURN BEFORE); \
         IF array::len($deleted) == 0 {{ THROW 'campus:not_found:user' }}; \
         DELETE draft_lesson WHERE creator = $user_key; \
         UPDATE published_lesson SET creator = $admin WHERE creator = $user_key; \
         UPDATE archived_lesson SET creator = $admin WHERE creator = $user_key; \
         UPDATE published_lesson SET edit_data.current_editor = $admin \
         WHERE mid_edit = true AND edit_data.current_editor = $user_key; \
         UPDATE published_lesson SET edit_data.initial_editor = $admin \
         WHERE mid_edit = true AND edit_data.initial_editor = $user_key; \
         UPDATE archived_lesson SET archive_by = $admin WHERE archive_by = $user_key; \
         {seat_step} \
         COMMIT TRANSACTION;"
    );

    let mut query = db
        .query(&query_str)
        .bind(("user", user_key.clone()))
        .bind(("user_key", user_key.clone()))
        .bind(("admin", admin.to_string()));
    if let Some(account) = account {
        query = query.bind(("account", account));
    }
    let result = query.await.map_err(DbError::from)?;

    result
        .check()
        .map_err(|e| DbError::from_statement(e, "user", &user_key))?;

    Ok(UserCascade { deleted_draft })
}
