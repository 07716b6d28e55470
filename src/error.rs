/// Error types for repo-cmdb
///
/// This module defines all possible errors that can occur in the application.
/// Uses thiserror for ergonomic error handling.

use crate::backend::BackendError;
use thiserror::Error;

/// Main error type for catalog operations
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Database-related errors (the catalog store is unavailable or a query failed)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O errors (file operations, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Git-related errors
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    /// HTTP transport errors talking to the completion backend
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Completion backend failed or is not configured
    #[error("Completion backend error: {0}")]
    Backend(#[from] BackendError),

    /// Repository not present in the catalog
    #[error("Repository not found: {0}")]
    RepositoryNotFound(String),

    /// URL or path that cannot name a repository
    #[error("Invalid repository URL: {0}")]
    InvalidUrl(String),

    /// Cloning the repository failed
    #[error("Could not clone {url}: {reason}")]
    CloneFailed { url: String, reason: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Generic(String),
}

/// Result type alias for catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Convert CatalogError to a user-friendly error message
impl CatalogError {
    pub fn user_message(&self) -> String {
        match self {
            CatalogError::Database(e) => {
                format!("Database error occurred. Please try again. Details: {}", e)
            }
            CatalogError::Io(e) => {
                format!("File system error. Check permissions. Details: {}", e)
            }
            CatalogError::Git(e) => {
                format!("Git operation failed. Details: {}", e)
            }
            CatalogError::Http(e) => {
                format!("Network error reaching the completion service. Details: {}", e)
            }
            CatalogError::Backend(e) => {
                format!("Completion service unavailable: {}", e)
            }
            CatalogError::RepositoryNotFound(url) => {
                format!("Repository '{}' is not in the catalog", url)
            }
            CatalogError::InvalidUrl(url) => {
                format!("'{}' does not look like a repository URL or path", url)
            }
            CatalogError::CloneFailed { url, reason } => {
                format!(
                    "Could not clone {}. Check that the URL is correct and the repository is reachable. Details: {}",
                    url, reason
                )
            }
            CatalogError::Config(msg) => {
                format!("Configuration issue: {}", msg)
            }
            CatalogError::Serialization(e) => {
                format!("Data format error: {}", e)
            }
            CatalogError::Generic(msg) => msg.clone(),
        }
    }
}
