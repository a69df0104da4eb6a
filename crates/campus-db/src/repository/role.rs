//! SurrealDB implementation of [`RoleStore`].

use campus_core::error::CampusResult;
use campus_core::models::role::{NewRole, Role, RoleArchetype};
use campus_core::store::RoleStore;
use surrealdb::{Connection, Surreal};
use uuid::Uuid;

use crate::error::DbError;
use crate::repository::rows::{self, RoleRow};

/// SurrealDB implementation of the role store.
#[derive(Clone)]
pub struct SurrealRoleStore<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealRoleStore<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }
}

impl<C: Connection> RoleStore for SurrealRoleStore<C> {
    async fn insert(&self, input: NewRole) -> CampusResult<Role> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        let result = self
            .db
            .query(
                "CREATE type::record('role', $id) SET \
                 name = $name, internal_name = $internal_name, \
                 rank = $rank, managed_roles = $managed_roles, \
                 require_account = $require_account, \
                 permissions = $permissions, \
                 lessons = [], categories = [], \
                 created_at = time::now(), updated_at = time::now(); \
                 SELECT meta::id(id) AS record_id, * \
                 FROM type::record('role', $id)",
            )
            .bind(("id", id_str.clone()))
            .bind(("name", input.name))
            .bind(("internal_name", input.internal_name.as_str()))
            .bind(("rank", input.rank))
            .bind(("managed_roles", rows::to_json(&input.managed_roles)))
            .bind(("require_account", input.require_account))
            .bind(("permissions", rows::to_json(&input.permissions)))
            .await
            .map_err(DbError::from)?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement(e, "role", &id_str))?;

        let roles: Vec<RoleRow> = result.take(1).map_err(DbError::from)?;
        let row = roles.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "role".into(),
            id: id_str,
        })?;

        Ok(row.try_into_role()?)
    }

    async fn get_by_id(&self, id: Uuid) -> CampusResult<Role> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * \
                 FROM type::record('role', $id)",
            )
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "role".into(),
            id: id_str,
        })?;

        Ok(row.try_into_role()?)
    }

    async fn get_by_internal_name(&self, name: RoleArchetype) -> CampusResult<Role> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM role \
                 WHERE internal_name = $internal_name",
            )
            .bind(("internal_name", name.as_str()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "role".into(),
            id: name.as_str().to_string(),
        })?;

        Ok(row.try_into_role()?)
    }

    async fn list(&self) -> CampusResult<Vec<Role>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM role \
                 ORDER BY rank ASC",
            )
            .await
            .map_err(DbError::from)?;

        let rows: Vec<RoleRow> = result.take(0).map_err(DbError::from)?;
        let roles = rows
            .into_iter()
            .map(|row| row.try_into_role())
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(roles)
    }
}
