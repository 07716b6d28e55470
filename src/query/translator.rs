/// Translation of intents into catalog queries
///
/// Recognized intents become a `DataQuery` with their entities bound as
/// parameters. `Intent::Unknown` is answered by the completion backend from
/// a bounded snapshot of the catalog, when one is configured.

use super::formatter;
use super::store::CatalogStore;
use super::types::{
    CatalogStatistics, DataQuery, Intent, QueryResult, RepositoryPage, DEFAULT_LIST_LIMIT,
};
use crate::backend::{complete_with_timeout, CompletionBackend};
use crate::core::technology::TechnologyTable;
use crate::db::RepositoryRecord;
use crate::error::Result;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

/// How many technologies and owners the statistics answer lists
const TOP_TECHNOLOGIES: usize = 5;
const TOP_OWNERS: usize = 5;

/// Bound on the catalog context sent to the completion backend
const MAX_CONTEXT_CHARS: usize = 2000;
const MAX_CONTEXT_ITEMS: usize = 30;
const SNAPSHOT_SAMPLES: usize = 3;

/// Audit-log tag for answers produced by the fallback
pub const FALLBACK_QUERY_TYPE: &str = "natural_language";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Translation {
    Query(DataQuery),
    Fallback,
}

/// Result of the fallback path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackOutcome {
    /// The backend answered
    Answered(String),
    /// Deterministic explanation of why there is no answer. Not cacheable.
    Unanswered(String),
}

pub struct QueryTranslator {
    technologies: Arc<TechnologyTable>,
}

impl QueryTranslator {
    pub fn new(technologies: Arc<TechnologyTable>) -> Self {
        Self { technologies }
    }

    /// Replace technology entities with their canonical spelling
    ///
    /// "python" becomes "Python" when the reference table knows it. Unknown
    /// names pass through unchanged; store lookups are case-insensitive anyway.
    pub fn resolve_entities(&self, intent: Intent) -> Intent {
        match intent {
            Intent::ListByTechnology { technology } => Intent::ListByTechnology {
                technology: self.canonical(technology),
            },
            Intent::CountByTechnology { technology } => Intent::CountByTechnology {
                technology: self.canonical(technology),
            },
            other => other,
        }
    }

    fn canonical(&self, technology: String) -> String {
        match self.technologies.canonical_name(&technology) {
            Some(name) => name.to_string(),
            None => technology,
        }
    }

    pub fn translate(&self, intent: &Intent) -> Translation {
        let query = match intent {
            Intent::CountAll => DataQuery::CountAll,
            Intent::ListByOwner { owner } => DataQuery::FilterByOwner {
                owner: owner.clone(),
            },
            Intent::OwnerOfRepo { repo_name } | Intent::TechnologiesOfRepo { repo_name } => {
                DataQuery::FindByRepoName {
                    repo_name: repo_name.clone(),
                }
            }
            Intent::ListByTechnology { technology } => DataQuery::FilterByTechnology {
                technology: technology.clone(),
            },
            Intent::CountByTechnology { technology } => DataQuery::CountByTechnology {
                technology: technology.clone(),
            },
            Intent::ListUnidentified => DataQuery::ListUnidentified,
            Intent::ListRecent { limit } => DataQuery::ListRecentAnalyzed { limit: *limit },
            Intent::Statistics => DataQuery::Statistics,
            Intent::Unknown => return Translation::Fallback,
        };

        Translation::Query(query)
    }

    /// Answer an unrecognized question through the completion backend
    pub async fn fallback(
        &self,
        question: &str,
        store: &dyn CatalogStore,
        backend: &dyn CompletionBackend,
        timeout: Duration,
    ) -> FallbackOutcome {
        if !backend.is_available() {
            log::debug!("No completion backend, cannot answer '{}'", question);
            return FallbackOutcome::Unanswered(formatter::cannot_answer(question));
        }

        let snapshot = match CatalogSnapshot::capture(store).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::warn!("Could not read catalog for fallback: {}", e);
                return FallbackOutcome::Unanswered(formatter::data_unavailable());
            }
        };

        let prompt = fallback_prompt(question, &snapshot);
        match complete_with_timeout(backend, &prompt, timeout).await {
            Ok(answer) => {
                if let Err(e) = store
                    .record_ai_query(question, &answer, FALLBACK_QUERY_TYPE)
                    .await
                {
                    log::warn!("Failed to record fallback answer: {}", e);
                }
                FallbackOutcome::Answered(answer)
            }
            Err(e) => {
                log::warn!("Completion backend '{}' failed: {}", backend.name(), e);
                FallbackOutcome::Unanswered(formatter::cannot_answer(question))
            }
        }
    }
}

impl DataQuery {
    /// Run the query. Store failures propagate to the caller.
    pub async fn execute(&self, store: &dyn CatalogStore) -> Result<QueryResult> {
        let result = match self {
            DataQuery::CountAll => QueryResult::Count(store.count_all().await?),
            DataQuery::FilterByOwner { owner } => QueryResult::Repositories(
                RepositoryPage::complete(store.filter_by_owner(owner).await?, DEFAULT_LIST_LIMIT),
            ),
            DataQuery::FindByRepoName { repo_name } => {
                QueryResult::Repositories(RepositoryPage::complete(
                    store.filter_by_repo_name(repo_name).await?,
                    DEFAULT_LIST_LIMIT,
                ))
            }
            DataQuery::FilterByTechnology { technology } => {
                QueryResult::Repositories(RepositoryPage::complete(
                    store.filter_by_technology(technology).await?,
                    DEFAULT_LIST_LIMIT,
                ))
            }
            DataQuery::CountByTechnology { technology } => {
                QueryResult::Count(store.count_by_technology(technology).await?)
            }
            DataQuery::ListUnidentified => QueryResult::Repositories(RepositoryPage::complete(
                store.list_unidentified().await?,
                DEFAULT_LIST_LIMIT,
            )),
            DataQuery::ListRecentAnalyzed { limit } => {
                // One extra row tells the formatter whether more exist
                let items = store.list_recent_analyzed(limit.saturating_add(1)).await?;
                QueryResult::Repositories(RepositoryPage {
                    items,
                    limit: *limit,
                    total: None,
                })
            }
            DataQuery::Statistics => {
                let mut top_technologies = store.technology_counts().await?;
                top_technologies.truncate(TOP_TECHNOLOGIES);
                let mut top_owners = store.owner_counts().await?;
                top_owners.truncate(TOP_OWNERS);
                QueryResult::Statistics(CatalogStatistics {
                    total: store.count_all().await?,
                    identified: store.count_identified().await?,
                    top_technologies,
                    top_owners,
                })
            }
        };

        Ok(result)
    }
}

// ============================================================================
// Fallback context
// ============================================================================

/// Summary of the catalog handed to the completion backend
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    pub total: i64,
    pub technologies: BTreeSet<String>,
    pub owners: BTreeSet<String>,
    pub samples: Vec<RepositoryRecord>,
}

impl CatalogSnapshot {
    pub async fn capture(store: &dyn CatalogStore) -> Result<Self> {
        Ok(Self {
            total: store.count_all().await?,
            technologies: store.distinct_technologies().await?,
            owners: store.distinct_owners().await?,
            samples: store.list_recent_analyzed(SNAPSHOT_SAMPLES).await?,
        })
    }

    /// Render as prompt context, never longer than the context bound
    pub fn render(&self) -> String {
        let mut text = format!("Total de repositorios: {}\n", self.total);
        text.push_str(&format!(
            "Tecnologías detectadas: {}\n",
            bounded_list(&self.technologies)
        ));
        text.push_str(&format!("Propietarios: {}\n", bounded_list(&self.owners)));

        if !self.samples.is_empty() {
            text.push_str("Ejemplos:\n");
            for repo in &self.samples {
                let techs: Vec<String> = repo.technologies().into_iter().collect();
                let techs = if techs.is_empty() {
                    "sin tecnologías identificadas".to_string()
                } else {
                    techs.join(", ")
                };
                text.push_str(&format!("- {} ({})\n", repo.full_name(), techs));
            }
        }

        truncate_chars(&text, MAX_CONTEXT_CHARS)
    }
}

fn bounded_list(items: &BTreeSet<String>) -> String {
    if items.is_empty() {
        return "ninguno".to_string();
    }

    let shown: Vec<&str> = items.iter().take(MAX_CONTEXT_ITEMS).map(String::as_str).collect();
    let mut text = shown.join(", ");
    if items.len() > MAX_CONTEXT_ITEMS {
        text.push_str(&format!(" (y {} más)", items.len() - MAX_CONTEXT_ITEMS));
    }
    text
}

pub(super) fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Prompt for an unrecognized question
pub fn fallback_prompt(question: &str, snapshot: &CatalogSnapshot) -> String {
    format!(
        "Eres un asistente de un catálogo de repositorios de software (CMDB). \
         Responde en español, de forma breve y usando solo estos datos. \
         Si los datos no alcanzan para responder, dilo.\n\n\
         DATOS DEL CATÁLOGO:\n{}\n\
         PREGUNTA: {}",
        snapshot.render(),
        question.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::ScriptedBackend;
    use crate::backend::{BackendError, NullBackend};
    use crate::db::{Database, RepoStatus, RepositoryInput};
    use crate::query::store::testing::FailingStore;

    fn translator() -> QueryTranslator {
        QueryTranslator::new(Arc::new(TechnologyTable::embedded().unwrap()))
    }

    async fn seeded() -> Database {
        let db = Database::new_test().await.unwrap();
        for (owner, repo, techs) in [
            ("facebook", "react", vec!["React", "Node.js"]),
            ("facebook", "jest", vec!["Node.js"]),
            ("torvalds", "linux", vec![]),
        ] {
            db.upsert_repository(RepositoryInput {
                url: format!("https://github.com/{}/{}", owner, repo),
                owner_name: owner.to_string(),
                repo_name: repo.to_string(),
                technologies: techs.into_iter().map(String::from).collect(),
                status: RepoStatus::Analyzed,
                ai_explanation: None,
            })
            .await
            .unwrap();
        }
        db
    }

    #[test]
    fn test_technology_entities_are_canonicalized() {
        let t = translator();
        assert_eq!(
            t.resolve_entities(Intent::ListByTechnology {
                technology: "node.js".to_string()
            }),
            Intent::ListByTechnology {
                technology: "Node.js".to_string()
            }
        );
        // Unknown technologies pass through
        assert_eq!(
            t.resolve_entities(Intent::CountByTechnology {
                technology: "cobol".to_string()
            }),
            Intent::CountByTechnology {
                technology: "cobol".to_string()
            }
        );
    }

    #[test]
    fn test_translate() {
        let t = translator();
        assert_eq!(t.translate(&Intent::Unknown), Translation::Fallback);
        assert_eq!(
            t.translate(&Intent::OwnerOfRepo {
                repo_name: "react".to_string()
            }),
            Translation::Query(DataQuery::FindByRepoName {
                repo_name: "react".to_string()
            })
        );
        assert_eq!(
            t.translate(&Intent::ListRecent { limit: 3 }),
            Translation::Query(DataQuery::ListRecentAnalyzed { limit: 3 })
        );
    }

    #[tokio::test]
    async fn test_execute_against_database() {
        let db = seeded().await;

        let count = DataQuery::CountByTechnology {
            technology: "node.js".to_string(),
        };
        match count.execute(&db).await.unwrap() {
            QueryResult::Count(n) => assert_eq!(n, 2),
            other => panic!("unexpected result {:?}", other),
        }

        let recent = DataQuery::ListRecentAnalyzed { limit: 2 };
        match recent.execute(&db).await.unwrap() {
            QueryResult::Repositories(page) => {
                assert_eq!(page.items.len(), 3);
                assert_eq!(page.visible().len(), 2);
                assert!(page.has_more());
            }
            other => panic!("unexpected result {:?}", other),
        }

        match DataQuery::Statistics.execute(&db).await.unwrap() {
            QueryResult::Statistics(stats) => {
                assert_eq!(stats.total, 3);
                assert_eq!(stats.identified, 2);
                assert_eq!(stats.top_technologies[0], ("Node.js".to_string(), 2));
                assert_eq!(
                    stats.top_owners,
                    vec![("facebook".to_string(), 2), ("torvalds".to_string(), 1)]
                );
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_execute_propagates_store_failure() {
        let result = DataQuery::CountAll.execute(&FailingStore).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_snapshot_render_is_bounded() {
        let mut snapshot = CatalogSnapshot::capture(&seeded().await).await.unwrap();
        assert!(snapshot.render().contains("Total de repositorios: 3"));

        snapshot.owners = (0..500).map(|i| format!("owner-{:03}", i)).collect();
        let rendered = snapshot.render();
        assert!(rendered.chars().count() <= MAX_CONTEXT_CHARS);
        assert!(rendered.contains("(y 470 más)"));
    }

    #[tokio::test]
    async fn test_fallback_without_backend() {
        let db = seeded().await;
        let outcome = translator()
            .fallback("¿Cuál es el mejor?", &db, &NullBackend, Duration::from_secs(1))
            .await;
        assert_eq!(
            outcome,
            FallbackOutcome::Unanswered(formatter::cannot_answer("¿Cuál es el mejor?"))
        );
    }

    #[tokio::test]
    async fn test_fallback_records_answer() {
        let db = seeded().await;
        let backend = ScriptedBackend::replying("Predomina Node.js.");
        let outcome = translator()
            .fallback("¿Qué predomina?", &db, &backend, Duration::from_secs(1))
            .await;

        assert_eq!(outcome, FallbackOutcome::Answered("Predomina Node.js.".to_string()));
        let prompt = backend.prompts.lock()[0].clone();
        assert!(prompt.contains("¿Qué predomina?"));
        assert!(prompt.contains("facebook"));

        let logged = db.get_ai_queries(10).await.unwrap();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].query_type, FALLBACK_QUERY_TYPE);
    }

    #[tokio::test]
    async fn test_fallback_backend_failure() {
        let db = seeded().await;
        let backend = ScriptedBackend::failing(BackendError::Unavailable("503".to_string()));
        let outcome = translator()
            .fallback("algo", &db, &backend, Duration::from_secs(1))
            .await;
        assert!(matches!(outcome, FallbackOutcome::Unanswered(_)));
        assert!(db.get_ai_queries(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fallback_store_failure() {
        let backend = ScriptedBackend::replying("x");
        let outcome = translator()
            .fallback("algo", &FailingStore, &backend, Duration::from_secs(1))
            .await;
        assert_eq!(outcome, FallbackOutcome::Unanswered(formatter::data_unavailable()));
        assert_eq!(backend.calls(), 0);
    }
}
