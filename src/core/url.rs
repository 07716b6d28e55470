/// Repository location parsing
///
/// Splits a repository URL (https or scp-style ssh) or a local directory
/// into the owner and repository names stored in the catalog.

use crate::error::{CatalogError, Result};
use regex::Regex;
use std::path::Path;

/// Owner used for local directories without a usable parent name
const LOCAL_OWNER: &str = "local";

/// Where a repository comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoLocation {
    /// Cloned from a remote URL
    Remote(String),
    /// Read in place from a directory on disk
    Local(String),
}

impl RepoLocation {
    /// Classify a user-supplied location. Existing directories are local.
    pub fn from_input(input: &str) -> Self {
        let trimmed = input.trim();
        if Path::new(trimmed).is_dir() {
            RepoLocation::Local(trimmed.to_string())
        } else {
            RepoLocation::Remote(trimmed.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RepoLocation::Remote(url) | RepoLocation::Local(url) => url,
        }
    }
}

/// Parses repository URLs into (owner, repo)
pub struct UrlParser {
    patterns: Vec<Regex>,
}

impl UrlParser {
    pub fn new() -> Self {
        let patterns = [
            // https://github.com/owner/repo(.git)
            r"^https?://(?:www\.)?[^/\s]+/(?P<owner>[^/\s]+)/(?P<repo>[^/\s]+?)(?:\.git)?/?$",
            // git@github.com:owner/repo(.git)
            r"^[\w.-]+@[^:\s]+:(?P<owner>[^/\s]+)/(?P<repo>[^/\s]+?)(?:\.git)?/?$",
            // ssh://git@host/owner/repo(.git)
            r"^ssh://[^/\s]+/(?P<owner>[^/\s]+)/(?P<repo>[^/\s]+?)(?:\.git)?/?$",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect();

        Self { patterns }
    }

    /// Owner and repository name for a URL or local path
    pub fn parse(&self, location: &RepoLocation) -> Result<(String, String)> {
        match location {
            RepoLocation::Remote(url) => self.parse_url(url),
            RepoLocation::Local(path) => parse_local(Path::new(path)),
        }
    }

    pub fn parse_url(&self, url: &str) -> Result<(String, String)> {
        let url = url.trim().trim_end_matches('/');
        if url.is_empty() {
            return Err(CatalogError::InvalidUrl(url.to_string()));
        }

        for pattern in &self.patterns {
            if let Some(caps) = pattern.captures(url) {
                let owner = caps["owner"].to_string();
                let repo = caps["repo"].to_string();
                if !repo.is_empty() {
                    return Ok((owner, repo));
                }
            }
        }

        // Deeper paths (gitlab subgroups, etc.): the last two segments
        let path = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        if segments.len() >= 3 {
            let repo = segments[segments.len() - 1].trim_end_matches(".git");
            let owner = segments[segments.len() - 2];
            if !repo.is_empty() {
                return Ok((owner.to_string(), repo.to_string()));
            }
        }

        Err(CatalogError::InvalidUrl(url.to_string()))
    }
}

impl Default for UrlParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Owner and repository name for a URL or an existing local directory
pub fn parse_repo_url(input: &str) -> Result<(String, String)> {
    UrlParser::new().parse(&RepoLocation::from_input(input))
}

fn parse_local(path: &Path) -> Result<(String, String)> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let name = |p: &Path| {
        p.file_name()
            .and_then(|name| name.to_str())
            .map(|s| s.to_string())
    };

    let repo = name(&absolute)
        .ok_or_else(|| CatalogError::InvalidUrl(path.display().to_string()))?;
    let owner = absolute
        .parent()
        .and_then(name)
        .unwrap_or_else(|| LOCAL_OWNER.to_string());

    Ok((owner, repo))
}
