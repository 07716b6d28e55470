/// Database connection management with connection pooling
///
/// Provides a thread-safe connection pool to the SQLite catalog.

use crate::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Maximum number of database connections in the pool
const MAX_CONNECTIONS: u32 = 5;

/// Database wrapper with connection pool
#[derive(Clone)]
pub struct Database {
    pool: Arc<SqlitePool>,
    db_path: PathBuf,
}

impl Database {
    /// Open (or create) the catalog database
    ///
    /// # Arguments
    /// * `db_path` - Path to the SQLite database file
    ///
    /// # Returns
    /// * `Ok(Database)` - Successfully created database instance
    /// * `Err(CatalogError)` - If connection fails
    ///
    /// # Examples
    /// ```no_run
    /// use repo_cmdb_lib::db::Database;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let db = Database::new("/tmp/repo-cmdb/catalog.db").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();

        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
            .create_if_missing(true)
            .foreign_keys(true)
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await?;

        let db = Self {
            pool: Arc::new(pool),
            db_path,
        };

        db.initialize_schema().await?;

        Ok(db)
    }

    /// Create a test database in memory
    ///
    /// Every connection to `sqlite::memory:` is its own database, so the pool
    /// is pinned to a single connection that never expires.
    #[cfg(test)]
    pub async fn new_test() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self {
            pool: Arc::new(pool),
            db_path: PathBuf::from(":memory:"),
        };

        db.initialize_schema().await?;

        Ok(db)
    }

    /// Initialize database schema
    ///
    /// Creates all required tables and indexes if they don't exist.
    async fn initialize_schema(&self) -> Result<()> {
        let schema = include_str!("../../database/schema.sql");

        // SQLite won't run several statements in one execute call
        for statement in schema.split(';') {
            let trimmed = strip_sql_comments(statement);
            if !trimmed.is_empty() {
                sqlx::query(&trimmed).execute(self.pool.as_ref()).await?;
            }
        }

        Ok(())
    }

    /// Get reference to the connection pool
    ///
    /// Used internally by query modules.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Get the database file path
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Close all connections in the pool
    ///
    /// Should be called on application shutdown.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Get database statistics
    pub async fn stats(&self) -> Result<DatabaseStats> {
        let repository_count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM repositories")
            .fetch_one(self.pool.as_ref())
            .await?;

        let identified_count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM repositories WHERE is_identified = 1")
                .fetch_one(self.pool.as_ref())
                .await?;

        let pattern_count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM technology_patterns")
            .fetch_one(self.pool.as_ref())
            .await?;

        let ai_query_count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM ai_queries")
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(DatabaseStats {
            total_repositories: repository_count.0,
            identified_repositories: identified_count.0,
            total_patterns: pattern_count.0,
            total_ai_queries: ai_query_count.0,
            pool_size: self.pool.size(),
            idle_connections: self.pool.num_idle(),
        })
    }
}

/// Drop `--` comment lines from a schema statement
fn strip_sql_comments(statement: &str) -> String {
    statement
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    pub total_repositories: i64,
    pub identified_repositories: i64,
    pub total_patterns: i64,
    pub total_ai_queries: i64,
    pub pool_size: u32,
    pub idle_connections: usize,
}

impl DatabaseStats {
    /// Share of repositories with at least one detected technology, in percent
    pub fn identification_rate(&self) -> f64 {
        if self.total_repositories == 0 {
            0.0
        } else {
            self.identified_repositories as f64 * 100.0 / self.total_repositories as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_database_creation() {
        let db = Database::new_test().await;
        assert!(db.is_ok());
    }

    #[tokio::test]
    async fn test_database_stats() {
        let db = Database::new_test().await.unwrap();
        let stats = db.stats().await.unwrap();

        assert_eq!(stats.total_repositories, 0);
        assert_eq!(stats.identified_repositories, 0);
        assert_eq!(stats.total_patterns, 0);
        assert_eq!(stats.total_ai_queries, 0);
        assert_eq!(stats.identification_rate(), 0.0);
    }

    #[tokio::test]
    async fn test_database_pool() {
        let db = Database::new_test().await.unwrap();
        assert_eq!(db.pool().size(), 1);
    }

    #[tokio::test]
    async fn test_schema_initialization() {
        let db = Database::new_test().await.unwrap();

        for table in ["repositories", "technology_patterns", "ai_queries"] {
            let result: std::result::Result<(i64,), sqlx::Error> =
                sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", table))
                    .fetch_one(db.pool())
                    .await;
            assert!(result.is_ok(), "missing table {}", table);
        }
    }

    #[tokio::test]
    async fn test_file_database_creates_parent_dir() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("nested").join("catalog.db");

        let db = Database::new(&path).await.unwrap();
        assert!(path.exists());
        assert_eq!(db.path(), path.as_path());
        db.close().await;
    }

    #[test]
    fn test_strip_sql_comments() {
        let stmt = "-- header\nCREATE TABLE x (id INTEGER)\n  -- trailing";
        assert_eq!(strip_sql_comments(stmt), "CREATE TABLE x (id INTEGER)");
        assert!(strip_sql_comments("\n-- only a comment\n").is_empty());
    }
}
