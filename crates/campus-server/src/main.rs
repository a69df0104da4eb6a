//! Campus Server — application entry point.
//!
//! Connects to the document store, applies migrations and seeds the
//! archetype roles. The HTTP layer mounts on top of the library crates
//! and is deployed separately.

use campus_core::error::{CampusError, CampusResult};
use campus_core::store::RoleStore;
use campus_db::repository::SurrealRoleStore;
use campus_db::{DbConfig, DbManager, run_migrations};
use tracing_subscriber::EnvFilter;

/// Insert any archetype role that does not exist yet. Existing roles are
/// left untouched so locally-edited permission sets survive restarts.
async fn seed_roles<R: RoleStore>(roles: &R) -> CampusResult<()> {
    for role in campus_policy::defaults::default_roles() {
        match roles.get_by_internal_name(role.internal_name).await {
            Ok(_) => {}
            Err(CampusError::NotFound { .. }) => {
                let name = role.internal_name;
                roles.insert(role).await?;
                tracing::info!(role = name.as_str(), "Seeded archetype role");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

async fn bootstrap(config: &DbConfig) -> CampusResult<()> {
    let manager = DbManager::connect(config)
        .await
        .map_err(|e| CampusError::StorageFailure(e.to_string()))?;
    let db = manager.client();

    run_migrations(&db)
        .await
        .map_err(|e| CampusError::StorageFailure(e.to_string()))?;

    seed_roles(&SurrealRoleStore::new(db)).await
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("campus=info".parse().unwrap()),
        )
        .json()
        .init();

    tracing::info!("Starting Campus bootstrap...");

    let config = DbConfig::from_env();
    if let Err(e) = bootstrap(&config).await {
        tracing::error!(error = %e, "Bootstrap failed");
        std::process::exit(1);
    }

    tracing::info!("Campus store ready.");
}
