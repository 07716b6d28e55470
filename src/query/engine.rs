/// Natural-language query engine
///
/// `answer` is total: every question gets a string back. Store and backend
/// failures turn into deterministic text and are never cached, so a repeated
/// question retries the failed dependency.

use super::cache::{normalize_question, QueryCache};
use super::classifier::IntentClassifier;
use super::formatter;
use super::store::CatalogStore;
use super::translator::{truncate_chars, FallbackOutcome, QueryTranslator, Translation};
use crate::backend::{complete_with_timeout, CompletionBackend};
use crate::config::Config;
use crate::core::technology::TechnologyTable;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(15);

/// Audit-log tags
const OPEN_QUESTION_TYPE: &str = "open_question";
const RESULTS_SUMMARY_TYPE: &str = "results_summary";

/// Bound on the results sent along for summarizing
const MAX_RESULTS_CHARS: usize = 8000;

/// Outcome of one pass through the pipeline
enum Answer {
    /// Built from data; safe to cache
    Fresh(String),
    /// Failure text; returned but not cached
    Degraded(String),
}

pub struct QueryEngine {
    store: Arc<dyn CatalogStore>,
    backend: Arc<dyn CompletionBackend>,
    classifier: IntentClassifier,
    translator: QueryTranslator,
    cache: QueryCache,
    backend_timeout: Duration,
}

impl QueryEngine {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        backend: Arc<dyn CompletionBackend>,
        technologies: Arc<TechnologyTable>,
    ) -> Self {
        Self {
            store,
            backend,
            classifier: IntentClassifier::new(),
            translator: QueryTranslator::new(technologies),
            cache: QueryCache::unbounded(),
            backend_timeout: DEFAULT_BACKEND_TIMEOUT,
        }
    }

    /// Engine with cache capacity and backend timeout taken from `config`
    pub fn from_config(
        config: &Config,
        store: Arc<dyn CatalogStore>,
        backend: Arc<dyn CompletionBackend>,
        technologies: Arc<TechnologyTable>,
    ) -> Self {
        Self::new(store, backend, technologies)
            .with_cache_capacity(config.cache_capacity)
            .with_backend_timeout(config.backend_timeout)
    }

    pub fn with_cache_capacity(mut self, capacity: Option<usize>) -> Self {
        self.cache = QueryCache::with_capacity(capacity);
        self
    }

    pub fn with_backend_timeout(mut self, timeout: Duration) -> Self {
        self.backend_timeout = timeout;
        self
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn suggested_questions(&self) -> &'static [&'static str] {
        formatter::SUGGESTED_QUESTIONS
    }

    /// Answer a question about the catalog
    pub async fn answer(&self, question: &str) -> String {
        if normalize_question(question).is_empty() {
            return formatter::empty_question();
        }

        if let Some(cached) = self.cache.get(question) {
            log::debug!("Cache hit for '{}'", question.trim());
            return cached;
        }

        let intent = self
            .translator
            .resolve_entities(self.classifier.classify(question));
        let answer = match self.translator.translate(&intent) {
            Translation::Query(query) => match query.execute(self.store.as_ref()).await {
                Ok(result) => Answer::Fresh(formatter::format_answer(&intent, &result)),
                Err(e) => {
                    log::warn!("Catalog store unavailable for {:?}: {}", query, e);
                    Answer::Degraded(formatter::data_unavailable())
                }
            },
            Translation::Fallback => {
                match self
                    .translator
                    .fallback(
                        question,
                        self.store.as_ref(),
                        self.backend.as_ref(),
                        self.backend_timeout,
                    )
                    .await
                {
                    FallbackOutcome::Answered(text) => Answer::Fresh(text),
                    FallbackOutcome::Unanswered(text) => Answer::Degraded(text),
                }
            }
        };

        match answer {
            Answer::Fresh(text) => {
                self.cache.put(question, &text, intent.tag());
                text
            }
            Answer::Degraded(text) => text,
        }
    }

    /// Free-form question to the completion backend, with optional context
    ///
    /// Bypasses classification and the cache.
    pub async fn ask_open_question(&self, question: &str, context: Option<&str>) -> String {
        let mut prompt = format!(
            "Eres un asistente experto en gestión de bases de datos de configuración (CMDB). \
             Responde la siguiente pregunta en español, de forma clara y precisa.\n\
             Pregunta: {}\n",
            question.trim()
        );
        if let Some(context) = context.map(str::trim).filter(|c| !c.is_empty()) {
            prompt.push_str(&format!("\nContexto: {}\n", context));
        }

        match complete_with_timeout(self.backend.as_ref(), &prompt, self.backend_timeout).await {
            Ok(answer) => {
                if let Err(e) = self
                    .store
                    .record_ai_query(question, &answer, OPEN_QUESTION_TYPE)
                    .await
                {
                    log::warn!("Failed to record open question: {}", e);
                }
                answer
            }
            Err(e) => {
                log::warn!("Open question not answered: {}", e);
                formatter::open_question_unavailable()
            }
        }
    }

    /// Key points of query results given as JSON, optionally for a question
    ///
    /// Like open questions, summaries bypass the cache.
    pub async fn summarize_results(&self, results_json: &str, question: Option<&str>) -> String {
        let results: serde_json::Value = match serde_json::from_str(results_json) {
            Ok(value) => value,
            Err(e) => {
                log::debug!("Results are not JSON: {}", e);
                return formatter::invalid_results();
            }
        };
        let results =
            serde_json::to_string_pretty(&results).unwrap_or_else(|_| results.to_string());

        let question = question.map(str::trim).filter(|q| !q.is_empty());
        let mut prompt = String::from(
            "Estos son los resultados de una consulta a la CMDB. \
             Resume en español los puntos clave, de forma clara y breve.",
        );
        if let Some(question) = question {
            prompt.push_str(&format!("\nPregunta original: {}", question));
        }
        prompt.push_str(&format!(
            "\nResultados: {}",
            truncate_chars(&results, MAX_RESULTS_CHARS)
        ));

        match complete_with_timeout(self.backend.as_ref(), &prompt, self.backend_timeout).await {
            Ok(summary) => {
                let asked = question.unwrap_or("Resumen de resultados");
                if let Err(e) = self
                    .store
                    .record_ai_query(asked, &summary, RESULTS_SUMMARY_TYPE)
                    .await
                {
                    log::warn!("Failed to record results summary: {}", e);
                }
                summary
            }
            Err(e) => {
                log::warn!("Results not summarized: {}", e);
                formatter::results_summary_unavailable()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::ScriptedBackend;
    use crate::backend::{BackendError, NullBackend};
    use crate::db::{Database, RepoStatus, RepositoryInput};
    use crate::query::store::testing::FailingStore;

    fn table() -> Arc<TechnologyTable> {
        Arc::new(TechnologyTable::embedded().unwrap())
    }

    async fn scenario_db() -> Arc<Database> {
        let db = Database::new_test().await.unwrap();
        for (owner, repo, techs) in [
            ("facebook", "react", vec!["Node.js", "React"]),
            ("microsoft", "vscode", vec!["TypeScript"]),
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
        Arc::new(db)
    }

    async fn engine() -> (QueryEngine, Arc<Database>) {
        let db = scenario_db().await;
        let engine = QueryEngine::new(db.clone(), Arc::new(NullBackend), table());
        (engine, db)
    }

    #[tokio::test]
    async fn test_scenario() {
        let (engine, _db) = engine().await;

        let count = engine.answer("¿Cuántos repositorios hay en total?").await;
        assert_eq!(count, "Hay 2 repositorios en el catálogo.");

        let owner = engine.answer("¿Qué repositorios tiene facebook?").await;
        assert!(owner.contains("react"));
        assert!(!owner.contains("vscode"));

        let python = engine.answer("repositorios que usan Python").await;
        assert_eq!(python, "No se encontraron repositorios que usen Python.");
    }

    #[tokio::test]
    async fn test_technology_is_case_insensitive() {
        let (engine, _db) = engine().await;
        let answer = engine.answer("repositories using typescript").await;
        assert!(answer.starts_with("1 repositorio usa TypeScript:"));
        assert!(answer.contains("microsoft/vscode"));
    }

    #[tokio::test]
    async fn test_symbol_suffixed_technology() {
        let (engine, db) = engine().await;
        db.upsert_repository(RepositoryInput {
            url: "https://github.com/dotnet/runtime".to_string(),
            owner_name: "dotnet".to_string(),
            repo_name: "runtime".to_string(),
            technologies: vec!["C#".to_string()],
            status: RepoStatus::Analyzed,
            ai_explanation: None,
        })
        .await
        .unwrap();

        let listed = engine.answer("repositorios que usan C#").await;
        assert!(listed.starts_with("1 repositorio usa C#:"));
        assert!(listed.contains("dotnet/runtime"));
        assert_eq!(
            engine.answer("¿Cuántos repositorios usan C#?").await,
            "1 repositorio usa C#."
        );

        // Plain "C" is a different question with its own cache entry
        assert_eq!(
            engine.answer("repositorios que usan C").await,
            "No se encontraron repositorios que usen c."
        );
        assert_eq!(engine.cache().len(), 3);
    }

    #[tokio::test]
    async fn test_technologies_used_in_repository() {
        let (engine, _db) = engine().await;
        assert_eq!(
            engine.answer("¿Qué tecnologías se usan en react?").await,
            "El repositorio 'facebook/react' usa: Node.js, React."
        );
    }

    #[tokio::test]
    async fn test_absent_owner_has_explicit_answer() {
        let (engine, _db) = engine().await;
        assert_eq!(
            engine.answer("repositories owned by nobody").await,
            "No se encontraron repositorios para el propietario 'nobody'."
        );
    }

    #[tokio::test]
    async fn test_count_matches_store() {
        let (engine, db) = engine().await;
        let total = db.count_repositories().await.unwrap();
        let answer = engine.answer("how many repositories").await;
        assert!(answer.contains(&total.to_string()));
    }

    #[tokio::test]
    async fn test_equivalent_questions_share_cached_answer() {
        let (engine, db) = engine().await;
        let first = engine.answer("¿Cuántos repositorios hay?").await;

        // A new row is invisible until the cache entry goes away
        db.upsert_repository(RepositoryInput {
            url: "https://github.com/rust-lang/rust".to_string(),
            owner_name: "rust-lang".to_string(),
            repo_name: "rust".to_string(),
            technologies: vec!["Rust".to_string()],
            status: RepoStatus::Analyzed,
            ai_explanation: None,
        })
        .await
        .unwrap();

        let second = engine.answer("  cuántos   REPOSITORIOS hay").await;
        assert_eq!(first, second);
        assert_eq!(
            engine.cache().entry("cuántos repositorios hay").unwrap().intent_tag,
            "count_all"
        );

        engine.cache().clear();
        assert_eq!(
            engine.answer("¿Cuántos repositorios hay?").await,
            "Hay 3 repositorios en el catálogo."
        );
    }

    #[tokio::test]
    async fn test_repeat_without_mutation_is_identical() {
        let (engine, _db) = engine().await;
        let a = engine.answer("últimos 5 repositorios analizados").await;
        let b = engine.answer("últimos 5 repositorios analizados").await;
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_unknown_without_backend() {
        let (engine, _db) = engine().await;
        let answer = engine.answer("¿Cuál es el sentido de la vida?").await;
        assert!(answer.starts_with("No puedo responder"));
        // Failure answers are not cached
        assert!(engine.cache().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_with_backend_is_cached() {
        let db = scenario_db().await;
        let backend = Arc::new(ScriptedBackend::replying("La mayoría usa Node.js."));
        let engine = QueryEngine::new(db.clone(), backend.clone(), table());

        let question = "¿Cuál es la tecnología favorita?";
        assert_eq!(engine.answer(question).await, "La mayoría usa Node.js.");
        assert_eq!(engine.answer(question).await, "La mayoría usa Node.js.");
        assert_eq!(backend.calls(), 1);
        assert_eq!(db.get_ai_queries(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_backend_timeout_degrades() {
        let db = scenario_db().await;
        let backend = Arc::new(ScriptedBackend::slow("tarde", Duration::from_secs(5)));
        let engine = QueryEngine::new(db, backend.clone(), table())
            .with_backend_timeout(Duration::from_millis(20));

        let question = "¿Cuál es la tecnología favorita?";
        let answer = engine.answer(question).await;
        assert_eq!(answer, formatter::cannot_answer(question));

        // Not cached: the next ask retries the backend
        engine.answer(question).await;
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn test_store_failure_is_an_answer() {
        let engine = QueryEngine::new(Arc::new(FailingStore), Arc::new(NullBackend), table());

        let answer = engine.answer("¿Cuántos repositorios hay?").await;
        assert_eq!(answer, formatter::data_unavailable());
        assert!(engine.cache().is_empty());

        // Unknown questions with no backend never reach the store
        let answer = engine.answer("algo completamente distinto").await;
        assert!(answer.starts_with("No puedo responder"));
    }

    #[tokio::test]
    async fn test_cache_hit_answers_before_the_pipeline() {
        let engine = QueryEngine::new(Arc::new(FailingStore), Arc::new(NullBackend), table());
        engine
            .cache()
            .put("¿Cuántos repositorios hay?", "Hay 9 repositorios en el catálogo.", "count_all");

        assert_eq!(
            engine.answer("cuántos repositorios hay").await,
            "Hay 9 repositorios en el catálogo."
        );
    }

    #[tokio::test]
    async fn test_empty_question() {
        let (engine, _db) = engine().await;
        assert_eq!(engine.answer("  ¿? ").await, formatter::empty_question());
    }

    #[tokio::test]
    async fn test_concurrent_answers() {
        let (engine, _db) = engine().await;
        let engine = Arc::new(engine);

        let questions = [
            "¿Cuántos repositorios hay?",
            "¿Qué repositorios tiene facebook?",
            "repositorios que usan TypeScript",
            "estadísticas",
        ];

        let mut handles = Vec::new();
        for round in 0..4 {
            for question in questions {
                let engine = engine.clone();
                handles.push(tokio::spawn(async move {
                    (round, question, engine.answer(question).await)
                }));
            }
        }

        let mut answers = std::collections::HashMap::new();
        for handle in handles {
            let (_, question, answer) = handle.await.unwrap();
            let first = answers.entry(question).or_insert_with(|| answer.clone());
            assert_eq!(*first, answer);
        }
        assert_eq!(engine.cache().len(), questions.len());
    }

    #[tokio::test]
    async fn test_statistics_list_active_owners() {
        let (engine, _db) = engine().await;
        let answer = engine.answer("estadísticas").await;
        assert!(answer.contains("Propietarios más activos: facebook (1), microsoft (1)"));
    }

    #[tokio::test]
    async fn test_summarize_results() {
        let db = scenario_db().await;
        let backend = Arc::new(ScriptedBackend::replying("Dos repositorios, ambos de JavaScript."));
        let engine = QueryEngine::new(db.clone(), backend.clone(), table());

        let results = r#"[{"repo": "react", "technologies": ["React"]}, {"repo": "vscode"}]"#;
        let summary = engine
            .summarize_results(results, Some("¿Qué repositorios hay?"))
            .await;
        assert_eq!(summary, "Dos repositorios, ambos de JavaScript.");

        let prompt = backend.prompts.lock()[0].clone();
        assert!(prompt.contains("Pregunta original: ¿Qué repositorios hay?"));
        assert!(prompt.contains("\"vscode\""));

        let logged = db.get_ai_queries(10).await.unwrap();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].query_type, RESULTS_SUMMARY_TYPE);
        // Summaries bypass the cache
        assert!(engine.cache().is_empty());
    }

    #[tokio::test]
    async fn test_summarize_invalid_results() {
        let db = scenario_db().await;
        let backend = Arc::new(ScriptedBackend::replying("nunca"));
        let engine = QueryEngine::new(db, backend.clone(), table());

        assert_eq!(
            engine.summarize_results("{no es json", None).await,
            "Formato de resultados inválido. Debe ser JSON."
        );
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_summarize_results_without_backend() {
        let (engine, db) = engine().await;
        assert_eq!(
            engine.summarize_results("[]", None).await,
            formatter::results_summary_unavailable()
        );
        assert!(db.get_ai_queries(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_question() {
        let db = scenario_db().await;
        let backend = Arc::new(ScriptedBackend::replying("Una CMDB registra activos."));
        let engine = QueryEngine::new(db.clone(), backend.clone(), table());

        let answer = engine
            .ask_open_question("¿Qué es una CMDB?", Some("catálogo interno"))
            .await;
        assert_eq!(answer, "Una CMDB registra activos.");
        assert!(backend.prompts.lock()[0].contains("Contexto: catálogo interno"));

        let failing = QueryEngine::new(
            db,
            Arc::new(ScriptedBackend::failing(BackendError::Timeout(10))),
            table(),
        );
        assert_eq!(
            failing.ask_open_question("¿Qué es una CMDB?", None).await,
            formatter::open_question_unavailable()
        );
    }
}
