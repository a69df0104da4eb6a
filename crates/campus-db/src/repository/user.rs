//! SurrealDB implementation of [`UserStore`].

use campus_core::error::{CampusError, CampusResult};
use campus_core::models::user::{CurrentUser, NewUser, User, UserPatch};
use campus_core::predicate::Predicate;
use campus_core::store::{PaginatedResult, Pagination, UserStore};
use surrealdb::{Connection, Surreal};
use uuid::Uuid;

use crate::error::DbError;
use crate::predicate::render;
use crate::repository::account::SurrealAccountStore;
use crate::repository::role::SurrealRoleStore;
use crate::repository::rows::{CountRow, UserRow};

const USER_PROJECTION: &str = "SELECT meta::id(id) AS record_id, *";

/// SurrealDB implementation of the user store.
#[derive(Clone)]
pub struct SurrealUserStore<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealUserStore<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> UserStore for SurrealUserStore<C> {
    async fn insert(&self, input: NewUser) -> CampusResult<User> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();
        let email = input.email.to_lowercase();
        let full_name = format!("{} {}", input.first_name, input.last_name);

        let result = self
            .db
            .query(format!(
                "CREATE type::record('user', $id) SET \
                 email = $email, first_name = $first_name, \
                 last_name = $last_name, full_name = $full_name, \
                 phone_number = $phone_number, role = $role, \
                 account = $account, \
                 allowed_lessons = [], allowed_categories = [], \
                 password_hash = $password_hash, \
                 registration_token = $registration_token, \
                 registration_completed = false, \
                 reset_password_token = NONE; \
                 {USER_PROJECTION} FROM type::record('user', $id)"
            ))
            .bind(("id", id_str.clone()))
            .bind(("email", email))
            .bind(("first_name", input.first_name))
            .bind(("last_name", input.last_name))
            .bind(("full_name", full_name))
            .bind(("phone_number", input.phone_number))
            .bind(("role", input.role.to_string()))
            .bind(("account", input.account.map(|a| a.to_string())))
            .bind(("password_hash", input.password_hash))
            .bind(("registration_token", input.registration_token))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(e, "user", &id_str))?;

        let rows: Vec<UserRow> = result.take(1).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;

        Ok(row.try_into_user()?)
    }

    async fn get(&self, id: Uuid, scope: &Predicate) -> CampusResult<User> {
        let id_str = id.to_string();
        let rendered = render(scope, "w");

        let mut query = self
            .db
            .query(format!(
                "{USER_PROJECTION} FROM type::record('user', $id){}",
                rendered.where_clause()
            ))
            .bind(("id", id_str.clone()));
        for (name, value) in rendered.binds {
            query = query.bind((name, value));
        }
        let mut result = query.await.map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;

        Ok(row.try_into_user()?)
    }

    async fn get_by_email(&self, email: &str) -> CampusResult<User> {
        let email = email.to_lowercase();

        let mut result = self
            .db
            .query(format!("{USER_PROJECTION} FROM user WHERE email = $email"))
            .bind(("email", email.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: email,
        })?;

        Ok(row.try_into_user()?)
    }

    async fn resolve_current(&self, id: Uuid) -> CampusResult<CurrentUser> {
        use campus_core::store::{AccountStore, RoleStore};

        let user = self.get(id, &Predicate::unrestricted()).await?;

        let roles = SurrealRoleStore::new(self.db.clone());
        let role = roles.get_by_id(user.role).await.map_err(|e| {
            // A user pointing at a missing role is a data defect, not a
            // caller-visible 404.
            match e {
                CampusError::NotFound { .. } => {
                    CampusError::Internal(format!("user {id} references a missing role"))
                }
                other => other,
            }
        })?;

        let account = match user.account {
            Some(account_id) => {
                let accounts = SurrealAccountStore::new(self.db.clone());
                Some(
                    accounts
                        .get(account_id, &Predicate::unrestricted())
                        .await
                        .map_err(|e| match e {
                            CampusError::NotFound { .. } => CampusError::Internal(format!(
                                "user {id} references a missing account"
                            )),
                            other => other,
                        })?,
                )
            }
            None => None,
        };

        Ok(CurrentUser {
            user,
            role,
            account,
        })
    }

    async fn list(
        &self,
        scope: &Predicate,
        pagination: Pagination,
    ) -> CampusResult<PaginatedResult<User>> {
        let rendered = render(scope, "w");

        let mut count_query = self
            .db
            .query(format!(
                "SELECT count() AS total FROM user{} GROUP ALL",
                rendered.where_clause()
            ));
        for (name, value) in rendered.binds.clone() {
            count_query = count_query.bind((name, value));
        }
        let mut count_result = count_query.await.map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut query = self
            .db
            .query(format!(
                "{USER_PROJECTION} FROM user{} \
                 ORDER BY created_at ASC LIMIT $limit START $offset",
                rendered.where_clause()
            ))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));
        for (name, value) in rendered.binds {
            query = query.bind((name, value));
        }
        let mut result = query.await.map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let items = rows
            .into_iter()
            .map(|row| row.try_into_user())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn update(&self, id: Uuid, scope: &Predicate, patch: UserPatch) -> CampusResult<User> {
        let id_str = id.to_string();
        let rendered = render(scope, "w");

        let mut sets = Vec::new();
        if patch.first_name.is_some() {
            sets.push("first_name = $first_name");
        }
        if patch.last_name.is_some() {
            sets.push("last_name = $last_name");
        }
        if patch.first_name.is_some() || patch.last_name.is_some() {
            sets.push("full_name = string::concat(first_name, ' ', last_name)");
        }
        if patch.phone_number.is_some() {
            sets.push("phone_number = $phone_number");
        }
        if patch.role.is_some() {
            sets.push("role = $role");
        }
        if patch.account.is_some() {
            sets.push("account = $account");
        }
        if patch.allowed_lessons.is_some() {
            sets.push("allowed_lessons = $allowed_lessons");
        }
        if patch.allowed_categories.is_some() {
            sets.push("allowed_categories = $allowed_categories");
        }
        if patch.password_hash.is_some() {
            sets.push("password_hash = $password_hash");
        }
        if patch.registration_token.is_some() {
            sets.push("registration_token = $registration_token");
        }
        if patch.registration_completed.is_some() {
            sets.push("registration_completed = $registration_completed");
        }
        if patch.reset_password_token.is_some() {
            sets.push("reset_password_token = $reset_password_token");
        }
        sets.push("updated_at = time::now()");

        let query_str = format!(
            "UPDATE type::record('user', $id) SET {}{} \
             RETURN VALUE meta::id(id)",
            sets.join(", "),
            rendered.where_clause(),
        );

        let mut query = self.db.query(&query_str).bind(("id", id_str.clone()));
        if let Some(first_name) = patch.first_name {
            query = query.bind(("first_name", first_name));
        }
        if let Some(last_name) = patch.last_name {
            query = query.bind(("last_name", last_name));
        }
        if let Some(phone_number) = patch.phone_number {
            query = query.bind(("phone_number", phone_number));
        }
        if let Some(role) = patch.role {
            query = query.bind(("role", role.to_string()));
        }
        if let Some(account) = patch.account {
            query = query.bind(("account", account.map(|a| a.to_string())));
        }
        if let Some(allowed_lessons) = patch.allowed_lessons {
            query = query.bind((
                "allowed_lessons",
                super::rows::uuid_strings(&allowed_lessons),
            ));
        }
        if let Some(allowed_categories) = patch.allowed_categories {
            query = query.bind((
                "allowed_categories",
                super::rows::uuid_strings(&allowed_categories),
            ));
        }
        if let Some(password_hash) = patch.password_hash {
            query = query.bind(("password_hash", password_hash));
        }
        if let Some(registration_token) = patch.registration_token {
            query = query.bind(("registration_token", registration_token));
        }
        if let Some(registration_completed) = patch.registration_completed {
            query = query.bind(("registration_completed", registration_completed));
        }
        if let Some(reset_password_token) = patch.reset_password_token {
            query = query.bind(("reset_password_token", reset_password_token));
        }
        for (name, value) in rendered.binds {
            query = query.bind((name, value));
        }

        let result = query.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(e, "user", &id_str))?;

        let updated: Vec<String> = result.take(0).map_err(DbError::from)?;
        if updated.is_empty() {
            return Err(DbError::NotFound {
                entity: "user".into(),
                id: id_str,
            }
            .into());
        }

        self.get(id, &Predicate::unrestricted()).await
    }

    async fn delete(&self, id: Uuid, scope: &Predicate) -> CampusResult<()> {
        let id_str = id.to_string();
        let rendered = render(scope, "w");

        let mut query = self
            .db
            .query(format!(
                "DELETE type::record('user', $id){} RETURN BEFORE",
                rendered.where_clause()
            ))
            .bind(("id", id_str.clone()));
        for (name, value) in rendered.binds {
            query = query.bind((name, value));
        }
        let mut result = query.await.map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        if rows.is_empty() {
            return Err(DbError::NotFound {
                entity: "user".into(),
                id: id_str,
            }
            .into());
        }
        Ok(())
    }
}
