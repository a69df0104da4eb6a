//! Schema definitions and migration runner for SurrealDB.
//!
//! Flat identity tables use SCHEMAFULL mode. Role and lesson documents
//! carry deeply nested editable structures (permission filters, parts,
//! shadow copies) and stay SCHEMALESS; their integrity is enforced by the
//! domain layer. UUIDs are stored as strings.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

// -----------------------------------------------------------------------
// Migration tracking
// -----------------------------------------------------------------------

const MIGRATION_TABLE_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _migration SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _migration TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _migration TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _migration TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_migration_version ON TABLE _migration \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct MigrationRecord {
    version: u32,
    #[allow(dead_code)]
    name: String,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1 — initial table definitions
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Roles (one document per archetype, permissions embedded)
-- =======================================================================
DEFINE TABLE role SCHEMALESS;
DEFINE INDEX idx_role_internal_name ON TABLE role \
    COLUMNS internal_name UNIQUE;
DEFINE INDEX idx_role_name ON TABLE role COLUMNS name UNIQUE;

-- =======================================================================
-- Users
-- =======================================================================
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD email ON TABLE user TYPE string;
DEFINE FIELD first_name ON TABLE user TYPE string;
DEFINE FIELD last_name ON TABLE user TYPE string;
DEFINE FIELD full_name ON TABLE user TYPE string;
DEFINE FIELD phone_number ON TABLE user TYPE option<string>;
DEFINE FIELD role ON TABLE user TYPE string;
DEFINE FIELD account ON TABLE user TYPE option<string>;
DEFINE FIELD allowed_lessons ON TABLE user TYPE array DEFAULT [];
DEFINE FIELD allowed_lessons.* ON TABLE user TYPE string;
DEFINE FIELD allowed_categories ON TABLE user TYPE array DEFAULT [];
DEFINE FIELD allowed_categories.* ON TABLE user TYPE string;
DEFINE FIELD password_hash ON TABLE user TYPE string;
DEFINE FIELD registration_token ON TABLE user TYPE option<string>;
DEFINE FIELD registration_completed ON TABLE user TYPE bool DEFAULT false;
DEFINE FIELD reset_password_token ON TABLE user TYPE option<string>;
DEFINE FIELD created_at ON TABLE user TYPE datetime DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE user TYPE datetime DEFAULT time::now();
DEFINE INDEX idx_user_email ON TABLE user COLUMNS email UNIQUE;
DEFINE INDEX idx_user_account ON TABLE user COLUMNS account;

-- =======================================================================
-- Institution accounts
-- =======================================================================
DEFINE TABLE account SCHEMAFULL;
DEFINE FIELD institution_name ON TABLE account TYPE string;
DEFINE FIELD city ON TABLE account TYPE string;
DEFINE FIELD contact_name ON TABLE account TYPE string;
DEFINE FIELD email ON TABLE account TYPE string;
DEFINE FIELD phone ON TABLE account TYPE string;
DEFINE FIELD logo ON TABLE account TYPE option<string>;
DEFINE FIELD allowed_users ON TABLE account TYPE int DEFAULT 0;
DEFINE FIELD current_users ON TABLE account TYPE int DEFAULT 0;
DEFINE FIELD allowed_lessons ON TABLE account TYPE array DEFAULT [];
DEFINE FIELD allowed_lessons.* ON TABLE account TYPE string;
DEFINE FIELD allowed_categories ON TABLE account TYPE array DEFAULT [];
DEFINE FIELD allowed_categories.* ON TABLE account TYPE string;
DEFINE FIELD created_at ON TABLE account TYPE datetime DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE account TYPE datetime DEFAULT time::now();
DEFINE INDEX idx_account_institution_city ON TABLE account \
    COLUMNS institution_name, city UNIQUE;

-- =======================================================================
-- Categories
-- =======================================================================
DEFINE TABLE category SCHEMAFULL;
DEFINE FIELD name ON TABLE category TYPE string;
DEFINE FIELD description ON TABLE category TYPE option<string>;
DEFINE FIELD created_at ON TABLE category TYPE datetime DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE category TYPE datetime DEFAULT time::now();
DEFINE INDEX idx_category_name ON TABLE category COLUMNS name UNIQUE;

-- =======================================================================
-- Reviews
-- =======================================================================
DEFINE TABLE review SCHEMAFULL;
DEFINE FIELD lesson ON TABLE review TYPE string;
DEFINE FIELD reviewer ON TABLE review TYPE string;
DEFINE FIELD rating ON TABLE review TYPE int \
    ASSERT $value >= 1 AND $value <= 5;
DEFINE FIELD comment ON TABLE review TYPE option<string>;
DEFINE FIELD created_at ON TABLE review TYPE datetime DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE review TYPE datetime DEFAULT time::now();
DEFINE INDEX idx_review_lesson ON TABLE review COLUMNS lesson;

-- =======================================================================
-- Lessons: three physical collections of one content shape
-- =======================================================================
DEFINE TABLE draft_lesson SCHEMALESS;
-- Each creator owns at most one draft.
DEFINE INDEX idx_draft_creator ON TABLE draft_lesson \
    COLUMNS creator UNIQUE;

DEFINE TABLE published_lesson SCHEMALESS;
DEFINE INDEX idx_published_creator ON TABLE published_lesson \
    COLUMNS creator;

DEFINE TABLE archived_lesson SCHEMALESS;
DEFINE INDEX idx_archived_archive_at ON TABLE archived_lesson \
    COLUMNS archive_at;

-- =======================================================================
-- Text search over catalog titles and descriptions
-- =======================================================================
DEFINE ANALYZER catalog TOKENIZERS class FILTERS lowercase, ascii;
DEFINE INDEX idx_published_lesson_search ON TABLE published_lesson \
    COLUMNS title, description SEARCH ANALYZER catalog BM25;
DEFINE INDEX idx_category_search ON TABLE category \
    COLUMNS name SEARCH ANALYZER catalog BM25;
";

// -----------------------------------------------------------------------
// Public API
// -----------------------------------------------------------------------

/// Run all pending migrations against the given SurrealDB client.
///
/// Creates a `_migration` tracking table on first run, then applies each
/// migration whose version exceeds the current maximum. All DEFINE
/// statements are idempotent so re-running is safe.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    // Ensure migration tracking table exists (idempotent).
    db.query(MIGRATION_TABLE_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(e.to_string()))?;

    // Determine current schema version.
    let mut result = db
        .query("SELECT * FROM _migration ORDER BY version DESC LIMIT 1")
        .await?;
    let records: Vec<MigrationRecord> = result.take(0)?;
    let current_version = records.first().map(|m| m.version).unwrap_or(0);

    for migration in MIGRATIONS {
        if migration.version > current_version {
            info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            db.query(migration.sql).await?.check().map_err(|e| {
                DbError::Migration(format!(
                    "Migration v{} '{}' failed: {}",
                    migration.version, migration.name, e,
                ))
            })?;

            // Record the applied migration.
            db.query(
                "CREATE _migration SET version = $version, \
                 name = $name",
            )
            .bind(("version", migration.version))
            .bind(("name", migration.name))
            .await?
            .check()
            .map_err(|e| {
                DbError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e,
                ))
            })?;

            info!(
                version = migration.version,
                "Migration applied successfully"
            );
        }
    }

    Ok(())
}

/// Returns the raw schema DDL for version 1.
///
/// Exposed for testing with in-memory SurrealDB instances that bypass
/// the migration runner.
pub fn schema_v1() -> &'static str {
    SCHEMA_V1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_v1_is_nonempty() {
        assert!(!SCHEMA_V1.is_empty());
    }

    #[test]
    fn migrations_are_ordered() {
        for window in MIGRATIONS.windows(2) {
            assert!(
                window[0].version < window[1].version,
                "Migrations must be in ascending version order"
            );
        }
    }

    #[test]
    fn every_collection_is_defined() {
        for table in [
            "role",
            "user",
            "account",
            "category",
            "review",
            "draft_lesson",
            "published_lesson",
            "archived_lesson",
        ] {
            assert!(
                SCHEMA_V1.contains(&format!("DEFINE TABLE {table} ")),
                "missing table definition for {table}"
            );
        }
    }
}
