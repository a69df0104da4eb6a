//! Campus Policy — the declarative authorization layer.
//!
//! Per-role permission rules compile into storage predicates
//! ([`compiler`]), guard field writes ([`guard`]), and gate whole routes
//! ([`guard::check_access`]). Role documents are served through an
//! explicitly-invalidated read-through cache ([`cache`]). Opaque
//! registration and password-reset tokens live in [`tokens`].

pub mod cache;
pub mod compiler;
pub mod defaults;
pub mod error;
pub mod guard;
pub mod tokens;

pub use cache::RoleCache;
pub use compiler::PolicyEngine;
pub use error::PolicyError;
