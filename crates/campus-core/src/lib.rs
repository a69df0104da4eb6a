//! Campus Core — domain models, error taxonomy, the storage-neutral
//! predicate AST, and the Content Store Gateway trait definitions.

pub mod error;
pub mod models;
pub mod predicate;
pub mod store;

pub use error::{CampusError, CampusResult};
