/// SQL query functions for catalog operations
///
/// Name and owner comparisons are case-insensitive (`COLLATE NOCASE`).
/// Technologies live in a JSON array column and are matched through `json_each`.

use crate::db::models::*;
use crate::db::Database;
use crate::error::Result;
use sqlx::Row;
use std::collections::BTreeSet;

impl Database {
    /// Insert a repository or update the existing row with the same URL
    ///
    /// `created_at` is kept from the first insert and `updated_at` is refreshed.
    /// A `pending` input never moves an analyzed/errored row back to pending.
    ///
    /// # Returns
    /// * `Ok(i64)` - The repository ID
    /// * `Err(CatalogError)` - If database operation fails
    pub async fn upsert_repository(&self, input: RepositoryInput) -> Result<i64> {
        let technologies = input.technologies_json()?;
        let is_identified = input.is_identified();
        // Explanations only make sense for repositories we couldn't identify
        let ai_explanation = if is_identified {
            None
        } else {
            input.ai_explanation
        };
        let now = now_timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO repositories
                (url, owner_name, repo_name, technologies, is_identified, status, ai_explanation, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(url) DO UPDATE SET
                owner_name = excluded.owner_name,
                repo_name = excluded.repo_name,
                technologies = CASE WHEN excluded.status = 'pending' THEN repositories.technologies ELSE excluded.technologies END,
                is_identified = CASE WHEN excluded.status = 'pending' THEN repositories.is_identified ELSE excluded.is_identified END,
                status = CASE WHEN excluded.status = 'pending' THEN repositories.status ELSE excluded.status END,
                ai_explanation = CASE WHEN excluded.status = 'pending' THEN repositories.ai_explanation ELSE excluded.ai_explanation END,
                updated_at = MAX(excluded.updated_at, repositories.created_at)
            RETURNING id
            "#,
        )
        .bind(&input.url)
        .bind(&input.owner_name)
        .bind(&input.repo_name)
        .bind(technologies)
        .bind(is_identified)
        .bind(input.status.as_str())
        .bind(ai_explanation)
        .bind(&now)
        .bind(&now)
        .fetch_one(self.pool())
        .await?;

        Ok(result.get(0))
    }

    /// Get a repository by its URL
    pub async fn get_repository_by_url(&self, url: &str) -> Result<Option<RepositoryRecord>> {
        let repo = sqlx::query_as::<_, RepositoryRecord>("SELECT * FROM repositories WHERE url = ?")
            .bind(url)
            .fetch_optional(self.pool())
            .await?;

        Ok(repo)
    }

    /// Get all repositories, newest first
    ///
    /// # Arguments
    /// * `limit` - Optional cap on the number of rows
    pub async fn all_repositories(&self, limit: Option<i64>) -> Result<Vec<RepositoryRecord>> {
        // LIMIT -1 means no limit in SQLite
        let repos = sqlx::query_as::<_, RepositoryRecord>(
            "SELECT * FROM repositories ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(limit.unwrap_or(-1))
        .fetch_all(self.pool())
        .await?;

        Ok(repos)
    }

    /// Total number of repositories
    pub async fn count_repositories(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM repositories")
            .fetch_one(self.pool())
            .await?;

        Ok(count.0)
    }

    /// Number of repositories with at least one detected technology
    pub async fn count_identified_repositories(&self) -> Result<i64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM repositories WHERE is_identified = 1")
                .fetch_one(self.pool())
                .await?;

        Ok(count.0)
    }

    /// Repositories belonging to an owner
    pub async fn get_repositories_by_owner(&self, owner: &str) -> Result<Vec<RepositoryRecord>> {
        let repos = sqlx::query_as::<_, RepositoryRecord>(
            "SELECT * FROM repositories WHERE owner_name = ? COLLATE NOCASE ORDER BY repo_name COLLATE NOCASE",
        )
        .bind(owner)
        .fetch_all(self.pool())
        .await?;

        Ok(repos)
    }

    /// Repositories with a given name, across all owners
    pub async fn get_repositories_by_name(&self, name: &str) -> Result<Vec<RepositoryRecord>> {
        let repos = sqlx::query_as::<_, RepositoryRecord>(
            "SELECT * FROM repositories WHERE repo_name = ? COLLATE NOCASE ORDER BY owner_name COLLATE NOCASE",
        )
        .bind(name)
        .fetch_all(self.pool())
        .await?;

        Ok(repos)
    }

    /// Repositories using a technology
    pub async fn get_repositories_by_technology(
        &self,
        technology: &str,
    ) -> Result<Vec<RepositoryRecord>> {
        let repos = sqlx::query_as::<_, RepositoryRecord>(
            r#"
            SELECT * FROM repositories
            WHERE EXISTS (
                SELECT 1 FROM json_each(repositories.technologies) AS tech
                WHERE LOWER(tech.value) = LOWER(?)
            )
            ORDER BY owner_name COLLATE NOCASE, repo_name COLLATE NOCASE
            "#,
        )
        .bind(technology)
        .fetch_all(self.pool())
        .await?;

        Ok(repos)
    }

    /// Number of repositories using a technology
    pub async fn count_repositories_by_technology(&self, technology: &str) -> Result<i64> {
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM repositories
            WHERE EXISTS (
                SELECT 1 FROM json_each(repositories.technologies) AS tech
                WHERE LOWER(tech.value) = LOWER(?)
            )
            "#,
        )
        .bind(technology)
        .fetch_one(self.pool())
        .await?;

        Ok(count.0)
    }

    /// Repositories where no technology was detected
    pub async fn get_unidentified_repositories(&self) -> Result<Vec<RepositoryRecord>> {
        let repos = sqlx::query_as::<_, RepositoryRecord>(
            "SELECT * FROM repositories WHERE is_identified = 0 ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(repos)
    }

    /// Most recently analyzed repositories
    pub async fn get_recent_analyzed(&self, limit: i64) -> Result<Vec<RepositoryRecord>> {
        let repos = sqlx::query_as::<_, RepositoryRecord>(
            "SELECT * FROM repositories WHERE status = 'analyzed' ORDER BY updated_at DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        Ok(repos)
    }

    /// Every technology that appears on at least one repository
    pub async fn get_distinct_technologies(&self) -> Result<BTreeSet<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT tech.value FROM repositories, json_each(repositories.technologies) AS tech",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(|(tech,)| tech).collect())
    }

    /// Every owner in the catalog
    pub async fn get_distinct_owners(&self) -> Result<BTreeSet<String>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT DISTINCT owner_name FROM repositories")
            .fetch_all(self.pool())
            .await?;

        Ok(rows.into_iter().map(|(owner,)| owner).collect())
    }

    /// Repository count per technology, most used first
    pub async fn get_technology_counts(&self) -> Result<Vec<(String, i64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT tech.value AS technology, COUNT(*) AS uses
            FROM repositories, json_each(repositories.technologies) AS tech
            GROUP BY tech.value
            ORDER BY uses DESC, technology ASC
            "#,
        )
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }

    /// (owner, repositories) with the most active owners first
    pub async fn get_owner_counts(&self) -> Result<Vec<(String, i64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT owner_name, COUNT(*) AS repos
            FROM repositories
            GROUP BY owner_name
            ORDER BY repos DESC, owner_name ASC
            "#,
        )
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }

    /// Replace the technology reference table
    pub async fn replace_technology_patterns(&self, patterns: &[TechnologyPattern]) -> Result<()> {
        let mut tx = self.pool().begin().await?;

        sqlx::query("DELETE FROM technology_patterns")
            .execute(&mut *tx)
            .await?;

        for pattern in patterns {
            sqlx::query(
                "INSERT INTO technology_patterns (technology_name, file_pattern, description) VALUES (?, ?, ?)",
            )
            .bind(&pattern.technology_name)
            .bind(&pattern.file_pattern)
            .bind(&pattern.description)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(())
    }

    /// Get the stored technology reference table
    pub async fn get_technology_patterns(&self) -> Result<Vec<TechnologyPatternRow>> {
        let rows = sqlx::query_as::<_, TechnologyPatternRow>(
            "SELECT * FROM technology_patterns ORDER BY id",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }

    /// Log a completion-backend exchange
    pub async fn save_ai_query(
        &self,
        query_text: &str,
        response_text: &str,
        query_type: &str,
    ) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO ai_queries (query_text, response_text, query_type, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(query_text)
        .bind(response_text)
        .bind(query_type)
        .bind(now_timestamp())
        .fetch_one(self.pool())
        .await?;

        Ok(result.get(0))
    }

    /// Most recent logged completion-backend exchanges
    pub async fn get_ai_queries(&self, limit: i64) -> Result<Vec<AiQuery>> {
        let rows = sqlx::query_as::<_, AiQuery>(
            "SELECT * FROM ai_queries ORDER BY id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }
}
