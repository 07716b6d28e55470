/// Read access to the catalog for the query engine
///
/// The engine never sees SQL. It works against `CatalogStore`, which the
/// SQLite `Database` implements and tests can replace.

use crate::db::{Database, RepositoryRecord};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeSet;

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn count_all(&self) -> Result<i64>;

    async fn count_identified(&self) -> Result<i64>;

    /// Case-insensitive exact owner match
    async fn filter_by_owner(&self, owner: &str) -> Result<Vec<RepositoryRecord>>;

    /// Case-insensitive exact repository-name match, possibly several owners
    async fn filter_by_repo_name(&self, repo_name: &str) -> Result<Vec<RepositoryRecord>>;

    async fn find_by_repo_name(&self, repo_name: &str) -> Result<Option<RepositoryRecord>> {
        Ok(self.filter_by_repo_name(repo_name).await?.into_iter().next())
    }

    /// Repositories whose technology set contains `technology` (case-insensitive)
    async fn filter_by_technology(&self, technology: &str) -> Result<Vec<RepositoryRecord>>;

    async fn count_by_technology(&self, technology: &str) -> Result<i64>;

    async fn list_unidentified(&self) -> Result<Vec<RepositoryRecord>>;

    /// Analyzed repositories, most recently updated first
    async fn list_recent_analyzed(&self, limit: usize) -> Result<Vec<RepositoryRecord>>;

    async fn distinct_technologies(&self) -> Result<BTreeSet<String>>;

    async fn distinct_owners(&self) -> Result<BTreeSet<String>>;

    /// (technology, repositories) most used first
    async fn technology_counts(&self) -> Result<Vec<(String, i64)>>;

    /// (owner, repositories) most active first
    async fn owner_counts(&self) -> Result<Vec<(String, i64)>>;

    /// Keep a record of an answer produced by the completion backend
    async fn record_ai_query(&self, _question: &str, _answer: &str, _kind: &str) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for Database {
    async fn count_all(&self) -> Result<i64> {
        self.count_repositories().await
    }

    async fn count_identified(&self) -> Result<i64> {
        self.count_identified_repositories().await
    }

    async fn filter_by_owner(&self, owner: &str) -> Result<Vec<RepositoryRecord>> {
        self.get_repositories_by_owner(owner).await
    }

    async fn filter_by_repo_name(&self, repo_name: &str) -> Result<Vec<RepositoryRecord>> {
        self.get_repositories_by_name(repo_name).await
    }

    async fn filter_by_technology(&self, technology: &str) -> Result<Vec<RepositoryRecord>> {
        self.get_repositories_by_technology(technology).await
    }

    async fn count_by_technology(&self, technology: &str) -> Result<i64> {
        self.count_repositories_by_technology(technology).await
    }

    async fn list_unidentified(&self) -> Result<Vec<RepositoryRecord>> {
        self.get_unidentified_repositories().await
    }

    async fn list_recent_analyzed(&self, limit: usize) -> Result<Vec<RepositoryRecord>> {
        self.get_recent_analyzed(i64::try_from(limit).unwrap_or(i64::MAX))
            .await
    }

    async fn distinct_technologies(&self) -> Result<BTreeSet<String>> {
        self.get_distinct_technologies().await
    }

    async fn distinct_owners(&self) -> Result<BTreeSet<String>> {
        self.get_distinct_owners().await
    }

    async fn technology_counts(&self) -> Result<Vec<(String, i64)>> {
        self.get_technology_counts().await
    }

    async fn owner_counts(&self) -> Result<Vec<(String, i64)>> {
        self.get_owner_counts().await
    }

    async fn record_ai_query(&self, question: &str, answer: &str, kind: &str) -> Result<()> {
        self.save_ai_query(question, answer, kind).await?;
        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    //! Stores for exercising the engine's failure paths

    use super::*;
    use crate::error::CatalogError;

    /// Every read fails as if the database had gone away
    pub struct FailingStore;

    fn down<T>() -> Result<T> {
        Err(CatalogError::Generic("catalog offline".to_string()))
    }

    #[async_trait]
    impl CatalogStore for FailingStore {
        async fn count_all(&self) -> Result<i64> {
            down()
        }
        async fn count_identified(&self) -> Result<i64> {
            down()
        }
        async fn filter_by_owner(&self, _owner: &str) -> Result<Vec<RepositoryRecord>> {
            down()
        }
        async fn filter_by_repo_name(&self, _repo_name: &str) -> Result<Vec<RepositoryRecord>> {
            down()
        }
        async fn filter_by_technology(&self, _technology: &str) -> Result<Vec<RepositoryRecord>> {
            down()
        }
        async fn count_by_technology(&self, _technology: &str) -> Result<i64> {
            down()
        }
        async fn list_unidentified(&self) -> Result<Vec<RepositoryRecord>> {
            down()
        }
        async fn list_recent_analyzed(&self, _limit: usize) -> Result<Vec<RepositoryRecord>> {
            down()
        }
        async fn distinct_technologies(&self) -> Result<BTreeSet<String>> {
            down()
        }
        async fn distinct_owners(&self) -> Result<BTreeSet<String>> {
            down()
        }
        async fn technology_counts(&self) -> Result<Vec<(String, i64)>> {
            down()
        }
        async fn owner_counts(&self) -> Result<Vec<(String, i64)>> {
            down()
        }
    }
}
