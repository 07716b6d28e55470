// Backend used when no completion service is configured. Never answers.

use super::{BackendError, CompletionBackend};
use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, Default, Clone, Copy)]
pub struct NullBackend;

#[async_trait]
impl CompletionBackend for NullBackend {
    fn name(&self) -> &str {
        "none"
    }

    fn is_available(&self) -> bool {
        false
    }

    async fn complete(&self, _prompt: &str, _timeout: Duration) -> Result<String, BackendError> {
        Err(BackendError::Unavailable(
            "no completion backend configured".to_string(),
        ))
    }
}
