//! Types shared by the query pipeline.
//!
//! A question is classified into an [`Intent`], translated into a
//! [`DataQuery`], executed into a [`QueryResult`] and rendered as text.

use crate::db::RepositoryRecord;

/// How many repositories `ListRecent` shows when the question names no number
pub const DEFAULT_RECENT_LIMIT: usize = 10;

/// Upper bound for an explicit `ListRecent` limit
pub const MAX_RECENT_LIMIT: usize = 100;

/// How many rows the owner/technology listings render before truncating
pub const DEFAULT_LIST_LIMIT: usize = 50;

// ============================================================================
// Intent
// ============================================================================

/// Classified purpose of a question, with the entities it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// "¿Cuántos repositorios hay?"
    CountAll,
    /// "¿Qué repositorios tiene facebook?"
    ListByOwner { owner: String },
    /// "¿Quién es el dueño del repositorio react?"
    OwnerOfRepo { repo_name: String },
    /// "¿Qué tecnologías usa el repositorio react?"
    TechnologiesOfRepo { repo_name: String },
    /// "repositorios que usan Python"
    ListByTechnology { technology: String },
    /// "¿Cuántos repositorios usan Docker?"
    CountByTechnology { technology: String },
    /// "repositorios no identificados"
    ListUnidentified,
    /// "últimos 5 repositorios analizados"
    ListRecent { limit: usize },
    /// "estadísticas"
    Statistics,
    /// Nothing matched; answered through the fallback path
    Unknown,
}

impl Intent {
    /// Stable tag stored alongside cached answers
    pub fn tag(&self) -> &'static str {
        match self {
            Intent::CountAll => "count_all",
            Intent::ListByOwner { .. } => "list_by_owner",
            Intent::OwnerOfRepo { .. } => "owner_of_repo",
            Intent::TechnologiesOfRepo { .. } => "technologies_of_repo",
            Intent::ListByTechnology { .. } => "list_by_technology",
            Intent::CountByTechnology { .. } => "count_by_technology",
            Intent::ListUnidentified => "list_unidentified",
            Intent::ListRecent { .. } => "list_recent",
            Intent::Statistics => "statistics",
            Intent::Unknown => "unknown",
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Intent::Unknown)
    }
}

// ============================================================================
// Data queries and their results
// ============================================================================

/// A parameterized, read-only query against the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataQuery {
    CountAll,
    FilterByOwner { owner: String },
    FindByRepoName { repo_name: String },
    FilterByTechnology { technology: String },
    CountByTechnology { technology: String },
    ListUnidentified,
    /// Fetches one row past `limit` so the formatter can tell there is more
    ListRecentAnalyzed { limit: usize },
    Statistics,
}

/// A slice of repositories plus what is needed to render an overflow hint.
#[derive(Debug, Clone)]
pub struct RepositoryPage {
    pub items: Vec<RepositoryRecord>,
    /// Rows to render at most
    pub limit: usize,
    /// Exact number of matches, when known
    pub total: Option<usize>,
}

impl RepositoryPage {
    /// A page holding every match
    pub fn complete(items: Vec<RepositoryRecord>, limit: usize) -> Self {
        let total = items.len();
        Self {
            items,
            limit,
            total: Some(total),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn visible(&self) -> &[RepositoryRecord] {
        let end = self.items.len().min(self.limit);
        &self.items[..end]
    }

    pub fn has_more(&self) -> bool {
        self.items.len() > self.limit || self.total.is_some_and(|t| t > self.limit)
    }
}

/// Aggregate numbers for the statistics intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogStatistics {
    pub total: i64,
    pub identified: i64,
    /// Most used technologies with their repository counts
    pub top_technologies: Vec<(String, i64)>,
    /// Owners with the most repositories
    pub top_owners: Vec<(String, i64)>,
}

impl CatalogStatistics {
    pub fn unidentified(&self) -> i64 {
        self.total - self.identified
    }

    pub fn identification_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.identified as f64 * 100.0 / self.total as f64
        }
    }
}

/// Outcome of executing a [`DataQuery`].
#[derive(Debug, Clone)]
pub enum QueryResult {
    Count(i64),
    Repositories(RepositoryPage),
    Statistics(CatalogStatistics),
}
