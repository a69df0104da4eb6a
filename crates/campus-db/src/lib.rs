//! Campus Database — SurrealDB connection management, store gateway
//! implementations and cascade orchestration.
//!
//! This crate provides:
//! - Connection management ([`DbManager`], [`DbConfig`])
//! - Schema initialization and migrations ([`run_migrations`])
//! - Predicate rendering into SurrealQL (internal to this crate)
//! - Store implementations for every collection ([`repository`])
//! - Atomic multi-entity cascades ([`transactions`])
//! - Error types ([`DbError`])

mod connection;
mod error;
mod predicate;
pub mod repository;
mod schema;
pub mod transactions;

pub use connection::{DbConfig, DbManager};
pub use error::DbError;
pub use schema::{run_migrations, schema_v1};
