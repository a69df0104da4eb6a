//! SurrealDB implementation of [`AccountStore`].

use campus_core::error::CampusResult;
use campus_core::models::account::{Account, AccountPatch, NewAccount};
use campus_core::predicate::Predicate;
use campus_core::store::{AccountStore, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use uuid::Uuid;

use crate::error::DbError;
use crate::predicate::render;
use crate::repository::rows::{self, AccountRow, CountRow};

const ACCOUNT_PROJECTION: &str = "SELECT meta::id(id) AS record_id, *";

/// SurrealDB implementation of the account store.
#[derive(Clone)]
pub struct SurrealAccountStore<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealAccountStore<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> AccountStore for SurrealAccountStore<C> {
    async fn insert(&self, input: NewAccount) -> CampusResult<Account> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(format!(
                "CREATE type::record('account', $id) SET \
                 institution_name = $institution_name, city = $city, \
                 contact_name = $contact_name, email = $email, \
                 phone = $phone, logo = NONE, \
                 allowed_users = $allowed_users, current_users = 0, \
                 allowed_lessons = [], allowed_categories = []; \
                 {ACCOUNT_PROJECTION} FROM type::record('account', $id)"
            ))
            .bind(("id", id_str.clone()))
            .bind(("institution_name", input.institution_name))
            .bind(("city", input.city))
            .bind(("contact_name", input.contact_name))
            .bind(("email", input.email.to_lowercase()))
            .bind(("phone", input.phone))
            .bind(("allowed_users", input.allowed_users))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(e, "account", &id_str))?;

        let accounts: Vec<AccountRow> = result.take(1).map_err(DbError::from)?;
        let row = accounts
            .into_iter()
            .next()
            .ok_or_else(|| DbError::NotFound {
                entity: "account".into(),
                id: id_str,
            })?;

        Ok(row.try_into_account()?)
    }

    async fn get(&self, id: Uuid, scope: &Predicate) -> CampusResult<Account> {
        let id_str = id.to_string();
        let rendered = render(scope, "w");

        let mut query = self
            .db
            .query(format!(
                "{ACCOUNT_PROJECTION} FROM type::record('account', $id){}",
                rendered.where_clause()
            ))
            .bind(("id", id_str.clone()));
        for (name, value) in rendered.binds {
            query = query.bind((name, value));
        }
        let mut result = query.await.map_err(DbError::from)?;

        let accounts: Vec<AccountRow> = result.take(0).map_err(DbError::from)?;
        let row = accounts
            .into_iter()
            .next()
            .ok_or_else(|| DbError::NotFound {
                entity: "account".into(),
                id: id_str,
            })?;

        Ok(row.try_into_account()?)
    }

    async fn list(
        &self,
        scope: &Predicate,
        pagination: Pagination,
    ) -> CampusResult<PaginatedResult<Account>> {
        let rendered = render(scope, "w");

        let mut count_query = self.db.query(format!(
            "SELECT count() AS total FROM account{} GROUP ALL",
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
                "{ACCOUNT_PROJECTION} FROM account{} \
                 ORDER BY institution_name ASC LIMIT $limit START $offset",
                rendered.where_clause()
            ))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));
        for (name, value) in rendered.binds {
            query = query.bind((name, value));
        }
        let mut result = query.await.map_err(DbError::from)?;

        let accounts: Vec<AccountRow> = result.take(0).map_err(DbError::from)?;
        let items = accounts
            .into_iter()
            .map(|row| row.try_into_account())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn update(
        &self,
        id: Uuid,
        scope: &Predicate,
        patch: AccountPatch,
    ) -> CampusResult<Account> {
        let id_str = id.to_string();
        let rendered = render(scope, "w");

        let mut sets = Vec::new();
        if patch.institution_name.is_some() {
            sets.push("institution_name = $institution_name");
        }
        if patch.city.is_some() {
            sets.push("city = $city");
        }
        if patch.contact_name.is_some() {
            sets.push("contact_name = $contact_name");
        }
        if patch.email.is_some() {
            sets.push("email = $email");
        }
        if patch.phone.is_some() {
            sets.push("phone = $phone");
        }
        if patch.logo.is_some() {
            sets.push("logo = $logo");
        }
        if patch.allowed_users.is_some() {
            sets.push("allowed_users = $allowed_users");
        }
        if patch.allowed_lessons.is_some() {
            sets.push("allowed_lessons = $allowed_lessons");
        }
        if patch.allowed_categories.is_some() {
            sets.push("allowed_categories = $allowed_categories");
        }
        sets.push("updated_at = time::now()");

        let query_str = format!(
            "UPDATE type::record('account', $id) SET {}{} \
             RETURN VALUE meta::id(id)",
            sets.join(", "),
            rendered.where_clause(),
        );

        let mut query = self.db.query(&query_str).bind(("id", id_str.clone()));
        if let Some(institution_name) = patch.institution_name {
            query = query.bind(("institution_name", institution_name));
        }
        if let Some(city) = patch.city {
            query = query.bind(("city", city));
        }
        if let Some(contact_name) = patch.contact_name {
            query = query.bind(("contact_name", contact_name));
        }
        if let Some(email) = patch.email {
            query = query.bind(("email", email.to_lowercase()));
        }
        if let Some(phone) = patch.phone {
            query = query.bind(("phone", phone));
        }
        if let Some(logo) = patch.logo {
            query = query.bind(("logo", logo));
        }
        if let Some(allowed_users) = patch.allowed_users {
            query = query.bind(("allowed_users", allowed_users));
        }
        if let Some(allowed_lessons) = patch.allowed_lessons {
            query = query.bind(("allowed_lessons", rows::uuid_strings(&allowed_lessons)));
        }
        if let Some(allowed_categories) = patch.allowed_categories {
            query = query.bind((
                "allowed_categories",
                rows::uuid_strings(&allowed_categories),
            ));
        }
        for (name, value) in rendered.binds {
            query = query.bind((name, value));
        }

        let result = query.await.map_err(DbError::from)?;
        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(e, "account", &id_str))?;

        let updated: Vec<String> = result.take(0).map_err(DbError::from)?;
        if updated.is_empty() {
            return Err(DbError::NotFound {
                entity: "account".into(),
                id: id_str,
            }
            .into());
        }

        self.get(id, &Predicate::unrestricted()).await
    }

    async fn adjust_current_users(&self, id: Uuid, delta: i64) -> CampusResult<Account> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(format!(
                "UPDATE type::record('account', $id) SET \
                 current_users += $delta, updated_at = time::now(); \
                 {ACCOUNT_PROJECTION} FROM type::record('account', $id)"
            ))
            .bind(("id", id_str.clone()))
            .bind(("delta", delta))
            .await
            .map_err(DbError::from)?;

        let accounts: Vec<AccountRow> = result.take(1).map_err(DbError::from)?;
        let row = accounts
            .into_iter()
            .next()
            .ok_or_else(|| DbError::NotFound {
                entity: "account".into(),
                id: id_str,
            })?;

        Ok(row.try_into_account()?)
    }
}
