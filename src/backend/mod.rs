/// Completion backend capability
///
/// The generative text backend is optional. Everything that talks to it goes
/// through the `CompletionBackend` trait, and `NullBackend` stands in when no
/// backend is configured.

pub mod gemini;
pub mod null;

pub use gemini::GeminiBackend;
pub use null::NullBackend;

use crate::config::Config;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Why a completion could not be produced
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Not configured, unreachable, or it answered with an error
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// No answer within the allowed time (milliseconds)
    #[error("backend timed out after {0} ms")]
    Timeout(u64),
}

/// Text completion, e.g. a hosted LLM
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Whether calling `complete` can succeed at all
    fn is_available(&self) -> bool {
        true
    }

    /// Complete a prompt. Implementations must give up after `timeout`.
    async fn complete(&self, prompt: &str, timeout: Duration) -> Result<String, BackendError>;
}

/// Run a completion with a hard deadline on top of the backend's own
///
/// A backend that hangs past `timeout` is reported as `Timeout`.
pub async fn complete_with_timeout(
    backend: &dyn CompletionBackend,
    prompt: &str,
    timeout: Duration,
) -> Result<String, BackendError> {
    if !backend.is_available() {
        return Err(BackendError::Unavailable(format!(
            "{} is not configured",
            backend.name()
        )));
    }

    match tokio::time::timeout(timeout, backend.complete(prompt, timeout)).await {
        Ok(result) => result,
        Err(_) => Err(BackendError::Timeout(timeout.as_millis() as u64)),
    }
}

/// Pick the backend for a configuration
///
/// Gemini when an API key is set, the null backend otherwise.
pub fn from_config(config: &Config) -> Arc<dyn CompletionBackend> {
    match &config.api_key {
        Some(key) => {
            log::info!("Using Gemini completion backend (model {})", config.model);
            Arc::new(GeminiBackend::new(
                key.clone(),
                config.model.clone(),
                config.base_url.clone(),
            ))
        }
        None => {
            log::info!("No GEMINI_API_KEY set, completion backend disabled");
            Arc::new(NullBackend)
        }
    }
}

#[cfg(test)]
pub mod testing {
    //! Scripted backends for tests

    use super::*;
    use parking_lot::Mutex;

    /// Returns a fixed reply and records every prompt it was given
    pub struct ScriptedBackend {
        reply: Result<String, BackendError>,
        delay: Option<Duration>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        pub fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                delay: None,
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(error: BackendError) -> Self {
            Self {
                reply: Err(error),
                delay: None,
                prompts: Mutex::new(Vec::new()),
            }
        }

        /// Sleeps before replying, to exercise timeouts
        pub fn slow(text: &str, delay: Duration) -> Self {
            Self {
                reply: Ok(text.to_string()),
                delay: Some(delay),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> usize {
            self.prompts.lock().len()
        }
    }

    #[async_trait]
    impl CompletionBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, prompt: &str, _timeout: Duration) -> Result<String, BackendError> {
            self.prompts.lock().push(prompt.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.reply.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedBackend;
    use super::*;

    #[tokio::test]
    async fn test_null_backend_is_unavailable() {
        let result = complete_with_timeout(&NullBackend, "hola", Duration::from_secs(1)).await;
        assert!(matches!(result, Err(BackendError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_reply_passes_through() {
        let backend = ScriptedBackend::replying("respuesta");
        let result = complete_with_timeout(&backend, "hola", Duration::from_secs(1)).await;
        assert_eq!(result, Ok("respuesta".to_string()));
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_slow_backend_times_out() {
        let backend = ScriptedBackend::slow("tarde", Duration::from_secs(5));
        let result = complete_with_timeout(&backend, "hola", Duration::from_millis(20)).await;
        assert_eq!(result, Err(BackendError::Timeout(20)));
    }

    #[test]
    fn test_from_config_without_key() {
        let config = Config::from_lookup(|key| match key {
            "CMDB_DB_PATH" => Some("/tmp/x.db".to_string()),
            _ => None,
        })
        .unwrap();

        let backend = from_config(&config);
        assert!(!backend.is_available());
    }

    #[test]
    fn test_from_config_with_key() {
        let config = Config::from_lookup(|key| match key {
            "CMDB_DB_PATH" => Some("/tmp/x.db".to_string()),
            "GEMINI_API_KEY" => Some("k".to_string()),
            _ => None,
        })
        .unwrap();

        let backend = from_config(&config);
        assert!(backend.is_available());
        assert_eq!(backend.name(), "gemini");
    }
}
