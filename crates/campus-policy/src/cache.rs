//! Read-through cache of role documents.
//!
//! Roles change rarely and staleness of seconds is tolerable, so cached
//! entries live until explicitly invalidated. The cache is owned by the
//! policy engine's construction rather than ambient module state, so
//! every test can inject a fresh instance.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use campus_core::error::CampusResult;
use campus_core::models::role::{Role, RoleArchetype};
use campus_core::store::RoleStore;

pub struct RoleCache<R: RoleStore> {
    store: R,
    cached: RwLock<HashMap<RoleArchetype, Arc<Role>>>,
}

impl<R: RoleStore> RoleCache<R> {
    pub fn new(store: R) -> Self {
        Self {
            store,
            cached: RwLock::new(HashMap::new()),
        }
    }

    /// The role for an internal archetype, fetching on first use.
    pub async fn get(&self, name: RoleArchetype) -> CampusResult<Arc<Role>> {
        if let Some(role) = self.cached.read().expect("role cache poisoned").get(&name) {
            return Ok(Arc::clone(role));
        }

        tracing::debug!(role = name.as_str(), "role cache miss");
        let role = Arc::new(self.store.get_by_internal_name(name).await?);
        self.cached
            .write()
            .expect("role cache poisoned")
            .insert(name, Arc::clone(&role));
        Ok(role)
    }

    /// Drop one cached role; the next `get` re-reads the store.
    pub fn invalidate(&self, name: RoleArchetype) {
        self.cached
            .write()
            .expect("role cache poisoned")
            .remove(&name);
    }

    pub fn invalidate_all(&self) {
        self.cached.write().expect("role cache poisoned").clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_core::error::CampusError;
    use campus_core::models::role::{ManagedRoles, NewRole};
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    /// Counts store hits so tests can observe read-through behaviour.
    struct CountingRoleStore {
        hits: AtomicUsize,
    }

    impl CountingRoleStore {
        fn new() -> Self {
            Self {
                hits: AtomicUsize::new(0),
            }
        }

        fn role(&self, name: RoleArchetype) -> Role {
            let now = Utc::now();
            Role {
                id: Uuid::new_v4(),
                name: name.as_str().to_string(),
                internal_name: name,
                rank: 0,
                managed_roles: ManagedRoles::All,
                require_account: false,
                permissions: Vec::new(),
                lessons: Vec::new(),
                categories: Vec::new(),
                created_at: now,
                updated_at: now,
            }
        }
    }

    impl RoleStore for CountingRoleStore {
        async fn insert(&self, _input: NewRole) -> CampusResult<Role> {
            Err(CampusError::Internal("not used".into()))
        }

        async fn get_by_id(&self, id: Uuid) -> CampusResult<Role> {
            Err(CampusError::not_found("role", id))
        }

        async fn get_by_internal_name(&self, name: RoleArchetype) -> CampusResult<Role> {
            self.hits.fetch_add(1, Ordering::SeqCst);
            Ok(self.role(name))
        }

        async fn list(&self) -> CampusResult<Vec<Role>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn second_get_is_served_from_cache() {
        let cache = RoleCache::new(CountingRoleStore::new());

        let a = cache.get(RoleArchetype::Admin).await.unwrap();
        let b = cache.get(RoleArchetype::Admin).await.unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(cache.store.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidate_forces_a_fresh_read() {
        let cache = RoleCache::new(CountingRoleStore::new());

        cache.get(RoleArchetype::Viewer).await.unwrap();
        cache.invalidate(RoleArchetype::Viewer);
        cache.get(RoleArchetype::Viewer).await.unwrap();
        assert_eq!(cache.store.hits.load(Ordering::SeqCst), 2);
    }
}
