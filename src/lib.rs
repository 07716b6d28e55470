/// repo-cmdb library
///
/// Repository catalog with technology detection and a natural-language
/// query engine on top.

pub mod backend;
pub mod config;
pub mod core;
pub mod db;
pub mod error;
pub mod query;

// Re-exports for convenience
pub use config::Config;
pub use db::Database;
pub use error::{CatalogError, Result};
pub use query::QueryEngine;
