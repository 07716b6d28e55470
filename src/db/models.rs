/// Data models for catalog entities
///
/// All models map to database tables and use sqlx for type-safe queries.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeSet;

/// Current time as a fixed-width RFC 3339 string
///
/// Fixed microsecond precision keeps lexical order equal to time order,
/// which the `ORDER BY updated_at` queries rely on.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// A cataloged repository
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RepositoryRecord {
    pub id: i64,
    pub url: String,
    pub owner_name: String,
    pub repo_name: String,
    pub technologies: String, // JSON array
    pub is_identified: bool,
    pub status: String, // 'pending', 'analyzed', 'error'
    pub ai_explanation: Option<String>,
    pub created_at: String, // RFC 3339
    pub updated_at: String, // RFC 3339
}

impl RepositoryRecord {
    /// Parse technologies from JSON
    pub fn technologies(&self) -> BTreeSet<String> {
        serde_json::from_str::<Vec<String>>(&self.technologies)
            .map(|techs| techs.into_iter().collect())
            .unwrap_or_default()
    }

    pub fn status(&self) -> RepoStatus {
        RepoStatus::parse(&self.status).unwrap_or(RepoStatus::Error)
    }

    /// `owner/repo`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner_name, self.repo_name)
    }
}

/// Analysis status of a repository
///
/// Only ever moves forward: pending -> analyzed | error.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RepoStatus {
    Pending,
    Analyzed,
    Error,
}

impl RepoStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RepoStatus::Pending),
            "analyzed" => Some(RepoStatus::Analyzed),
            "error" => Some(RepoStatus::Error),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RepoStatus::Pending => "pending",
            RepoStatus::Analyzed => "analyzed",
            RepoStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for RepoStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Input for storing a scanned repository
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryInput {
    pub url: String,
    pub owner_name: String,
    pub repo_name: String,
    pub technologies: Vec<String>,
    pub status: RepoStatus,
    pub ai_explanation: Option<String>,
}

impl RepositoryInput {
    pub fn is_identified(&self) -> bool {
        !self.technologies.is_empty()
    }

    /// Technologies as a sorted, de-duplicated JSON array
    pub fn technologies_json(&self) -> Result<String, serde_json::Error> {
        let set: BTreeSet<&String> = self.technologies.iter().collect();
        serde_json::to_string(&set)
    }
}

/// One row of the technology reference table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TechnologyPattern {
    pub technology_name: String,
    pub file_pattern: String,
    pub description: Option<String>,
}

/// Stored technology pattern row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TechnologyPatternRow {
    pub id: i64,
    pub technology_name: String,
    pub file_pattern: String,
    pub description: Option<String>,
    pub created_at: String,
}

/// Logged completion-backend exchange
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AiQuery {
    pub id: i64,
    pub query_text: String,
    pub response_text: String,
    pub query_type: String,
    pub created_at: String,
}
