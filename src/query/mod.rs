/// Natural-language query engine
///
/// This module turns free-text questions about the catalog into answers:
/// - Intent classification over Spanish and English templates
/// - Translation of intents into read-only catalog queries
/// - Deterministic Spanish answer templates
/// - A normalized-question answer cache

pub mod cache;
pub mod classifier;
pub mod engine;
pub mod formatter;
pub mod store;
pub mod translator;
pub mod types;

pub use cache::{normalize_question, CachedQuery, QueryCache};
pub use classifier::IntentClassifier;
pub use engine::QueryEngine;
pub use store::CatalogStore;
pub use translator::{QueryTranslator, Translation};
pub use types::{DataQuery, Intent, QueryResult, RepositoryPage};
