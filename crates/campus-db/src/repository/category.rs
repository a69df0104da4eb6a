//! SurrealDB implementation of [`CategoryStore`].

use campus_core::error::CampusResult;
use campus_core::models::category::{Category, CategoryPatch, NewCategory};
use campus_core::predicate::Predicate;
use campus_core::store::{CategoryStore, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use uuid::Uuid;

use crate::error::DbError;
use crate::predicate::render;
use crate::repository::rows::{self, CategoryRow, CountRow};

const CATEGORY_PROJECTION: &str = "SELECT meta::id(id) AS record_id, *";

/// SurrealDB implementation of the category store.
#[derive(Clone)]
pub struct SurrealCategoryStore<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealCategoryStore<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> CategoryStore for SurrealCategoryStore<C> {
    async fn insert(&self, input: NewCategory) -> CampusResult<Category> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(format!(
                "CREATE type::record('category', $id) SET \
                 name = $name, description = $description; \
                 {CATEGORY_PROJECTION} FROM type::record('category', $id)"
            ))
            .bind(("id", id_str.clone()))
            .bind(("name", input.name))
            .bind(("description", input.description))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(e, "category", &id_str))?;

        let categories: Vec<CategoryRow> = result.take(1).map_err(DbError::from)?;
        let row = categories
            .into_iter()
            .next()
            .ok_or_else(|| DbError::NotFound {
                entity: "category".into(),
                id: id_str,
            })?;

        Ok(row.try_into_category()?)
    }

    async fn get(&self, id: Uuid) -> CampusResult<Category> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(format!(
                "{CATEGORY_PROJECTION} FROM type::record('category', $id)"
            ))
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let categories: Vec<CategoryRow> = result.take(0).map_err(DbError::from)?;
        let row = categories
            .into_iter()
            .next()
            .ok_or_else(|| DbError::NotFound {
                entity: "category".into(),
                id: id_str,
            })?;

        Ok(row.try_into_category()?)
    }

    async fn list(
        &self,
        scope: &Predicate,
        pagination: Pagination,
    ) -> CampusResult<PaginatedResult<Category>> {
        let rendered = render(scope, "w");

        let mut count_query = self.db.query(format!(
            "SELECT count() AS total FROM category{} GROUP ALL",
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
                "{CATEGORY_PROJECTION} FROM category{} \
                 ORDER BY name ASC LIMIT $limit START $offset",
                rendered.where_clause()
            ))
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset));
        for (name, value) in rendered.binds {
            query = query.bind((name, value));
        }
        let mut result = query.await.map_err(DbError::from)?;

        let categories: Vec<CategoryRow> = result.take(0).map_err(DbError::from)?;
        let items = categories
            .into_iter()
            .map(|row| row.try_into_category())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn update(&self, id: Uuid, patch: CategoryPatch) -> CampusResult<Category> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if patch.name.is_some() {
            sets.push("name = $name");
        }
        if patch.description.is_some() {
            sets.push("description = $description");
        }
        sets.push("updated_at = time::now()");

        let query_str = format!(
            "UPDATE type::record('category', $id) SET {}",
            sets.join(", ")
        );

        let mut query = self.db.query(&query_str).bind(("id", id_str.clone()));
        if let Some(name) = patch.name {
            query = query.bind(("name", name));
        }
        if let Some(description) = patch.description {
            query = query.bind(("description", description));
        }

        let result = query.await.map_err(DbError::from)?;
        result
            .check()
            .map_err(|e| DbError::from_statement(e, "category", &id_str))?;

        self.get(id).await
    }

    async fn all_exist(&self, ids: &[Uuid]) -> CampusResult<bool> {
        if ids.is_empty() {
            return Ok(true);
        }

        let keys = rows::uuid_strings(ids);
        let expected = keys.len() as u64;

        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM category \
                 WHERE meta::id(id) INSIDE $ids GROUP ALL",
            )
            .bind(("ids", keys))
            .await
            .map_err(DbError::from)?;

        let count_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);
        Ok(total == expected)
    }
}
