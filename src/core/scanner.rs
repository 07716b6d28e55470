// Scans repositories into the catalog
//
// A repository is recorded as pending first, so a scan that dies halfway
// still leaves a trace. Then it's cloned (or read in place), its technologies
// are detected, and the row moves to analyzed or error.

use super::explainer::{explain_unidentified, RepositoryProfile};
use super::technology::{RepositoryListing, TechnologyTable};
use super::url::{RepoLocation, UrlParser};
use crate::backend::CompletionBackend;
use crate::config::Config;
use crate::db::{Database, RepoStatus, RepositoryInput, RepositoryRecord};
use crate::error::{CatalogError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const DEFAULT_CLONE_TIMEOUT: Duration = Duration::from_secs(300);
const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(15);

/// A checked-out repository. Cloned ones are deleted on drop.
enum Workspace {
    Local(PathBuf),
    Cloned(TempDir),
}

impl Workspace {
    fn path(&self) -> &Path {
        match self {
            Workspace::Local(path) => path,
            Workspace::Cloned(dir) => dir.path(),
        }
    }
}

/// Per-URL result of a batch scan
#[derive(Debug)]
pub struct BatchItem {
    pub url: String,
    pub outcome: std::result::Result<RepositoryRecord, String>,
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub items: Vec<BatchItem>,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.items.len()
    }

    /// Scans that ended analyzed
    pub fn analyzed(&self) -> usize {
        self.items
            .iter()
            .filter(|item| {
                matches!(&item.outcome, Ok(repo) if repo.status() == RepoStatus::Analyzed)
            })
            .count()
    }

    pub fn identified(&self) -> usize {
        self.items
            .iter()
            .filter(|item| matches!(&item.outcome, Ok(repo) if repo.is_identified))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.analyzed()
    }
}

pub struct Scanner {
    db: Arc<Database>,
    table: Arc<TechnologyTable>,
    backend: Arc<dyn CompletionBackend>,
    parser: UrlParser,
    backend_timeout: Duration,
    clone_timeout: Duration,
}

impl Scanner {
    pub fn new(
        db: Arc<Database>,
        table: Arc<TechnologyTable>,
        backend: Arc<dyn CompletionBackend>,
    ) -> Self {
        Self {
            db,
            table,
            backend,
            parser: UrlParser::new(),
            backend_timeout: DEFAULT_BACKEND_TIMEOUT,
            clone_timeout: DEFAULT_CLONE_TIMEOUT,
        }
    }

    pub fn from_config(
        config: &Config,
        db: Arc<Database>,
        table: Arc<TechnologyTable>,
        backend: Arc<dyn CompletionBackend>,
    ) -> Self {
        Self::new(db, table, backend).with_timeouts(config.backend_timeout, config.clone_timeout)
    }

    pub fn with_timeouts(mut self, backend_timeout: Duration, clone_timeout: Duration) -> Self {
        self.backend_timeout = backend_timeout;
        self.clone_timeout = clone_timeout;
        self
    }

    /// Scan one repository and store the result
    ///
    /// Clone and detection failures are stored as `error` rows, not returned.
    /// Only an unparseable URL or a database failure is an `Err`.
    pub async fn scan(&self, input: &str) -> Result<RepositoryRecord> {
        let location = RepoLocation::from_input(input);
        let url = location.as_str().to_string();
        let (owner, repo) = self.parser.parse(&location)?;

        log::info!("Scanning {} ({}/{})", url, owner, repo);

        self.db
            .upsert_repository(RepositoryInput {
                url: url.clone(),
                owner_name: owner.clone(),
                repo_name: repo.clone(),
                technologies: Vec::new(),
                status: RepoStatus::Pending,
                ai_explanation: None,
            })
            .await?;

        let (technologies, status, ai_explanation) = self.analyze(&location).await;

        self.db
            .upsert_repository(RepositoryInput {
                url: url.clone(),
                owner_name: owner,
                repo_name: repo,
                technologies,
                status,
                ai_explanation,
            })
            .await?;

        self.db
            .get_repository_by_url(&url)
            .await?
            .ok_or_else(|| CatalogError::RepositoryNotFound(url.clone()))
    }

    /// Scan several repositories one after another
    ///
    /// One failure doesn't stop the batch.
    pub async fn scan_batch(&self, urls: &[String]) -> BatchSummary {
        let mut summary = BatchSummary::default();

        for (i, url) in urls.iter().enumerate() {
            log::info!("Batch scan {}/{}: {}", i + 1, urls.len(), url);
            let outcome = self.scan(url).await.map_err(|e| {
                log::warn!("Scan of {} failed: {}", url, e);
                e.user_message()
            });
            summary.items.push(BatchItem {
                url: url.clone(),
                outcome,
            });
        }

        log::info!(
            "Batch done: {} analyzed, {} failed",
            summary.analyzed(),
            summary.failed()
        );
        summary
    }

    /// Detect technologies. Returns what should be stored.
    async fn analyze(
        &self,
        location: &RepoLocation,
    ) -> (Vec<String>, RepoStatus, Option<String>) {
        let url = location.as_str();

        let workspace = match self.acquire(location).await {
            Ok(workspace) => workspace,
            Err(e) => {
                log::warn!("Could not acquire {}: {}", url, e);
                return (Vec::new(), RepoStatus::Error, Some(e.user_message()));
            }
        };

        let table = self.table.clone();
        let root = workspace.path().to_path_buf();
        let detection = tokio::task::spawn_blocking(move || -> Result<(Vec<String>, RepositoryListing)> {
            let listing = RepositoryListing::scan(&root)?;
            let technologies = table.detect_in_listing(&root, &listing);
            Ok((technologies, listing))
        })
        .await;

        let (technologies, listing) = match detection {
            Ok(Ok(found)) => found,
            Ok(Err(e)) => {
                log::warn!("Detection failed for {}: {}", url, e);
                return (Vec::new(), RepoStatus::Error, Some(e.user_message()));
            }
            Err(e) => {
                log::error!("Detection task for {} panicked: {}", url, e);
                return (
                    Vec::new(),
                    RepoStatus::Error,
                    Some(format!("Error durante el análisis del repositorio: {}", e)),
                );
            }
        };

        if !technologies.is_empty() {
            return (technologies, RepoStatus::Analyzed, None);
        }

        let profile = RepositoryProfile::from_listing(&listing);
        let explanation =
            explain_unidentified(url, &profile, self.backend.as_ref(), self.backend_timeout).await;

        (technologies, RepoStatus::Analyzed, Some(explanation))
    }

    async fn acquire(&self, location: &RepoLocation) -> Result<Workspace> {
        let url = match location {
            RepoLocation::Local(path) => return Ok(Workspace::Local(PathBuf::from(path))),
            RepoLocation::Remote(url) => url.clone(),
        };

        let task = {
            let url = url.clone();
            tokio::task::spawn_blocking(move || clone_shallow(&url))
        };

        // On timeout the clone keeps running in the background and cleans
        // up its own temp dir when it finishes
        match tokio::time::timeout(self.clone_timeout, task).await {
            Ok(Ok(result)) => result.map(Workspace::Cloned),
            Ok(Err(e)) => Err(CatalogError::CloneFailed {
                url,
                reason: e.to_string(),
            }),
            Err(_) => Err(CatalogError::CloneFailed {
                url,
                reason: format!("timed out after {}s", self.clone_timeout.as_secs()),
            }),
        }
    }
}

/// Shallow clone into a fresh temp dir
fn clone_shallow(url: &str) -> Result<TempDir> {
    let dir = tempfile::Builder::new().prefix("cmdb_repo_").tempdir()?;

    let mut fetch = git2::FetchOptions::new();
    fetch.depth(1);

    git2::build::RepoBuilder::new()
        .fetch_options(fetch)
        .clone(url, dir.path())
        .map_err(|e| CatalogError::CloneFailed {
            url: url.to_string(),
            reason: e.message().to_string(),
        })?;

    log::debug!("Cloned {} into {}", url, dir.path().display());
    Ok(dir)
}

/// Read repository URLs from a file, one per line
///
/// Blank lines and `#` comments are skipped.
pub fn read_url_list<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}
