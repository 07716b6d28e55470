// Google Gemini completion backend
//
// Talks to the generateContent REST endpoint with a single user turn.
// Any transport or API failure is reported as Unavailable, never a panic.

use super::{BackendError, CompletionBackend};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct GeminiBackend {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiBackend {
    pub fn new(api_key: String, model: String, base_url: Option<String>) -> Self {
        let base_url = base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        GeminiBackend {
            client: Client::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .build()
                .unwrap_or_default(),
            base_url,
            api_key,
            model,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn request_body(prompt: &str) -> Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [{"text": prompt}]
            }]
        })
    }

    /// Pull the answer text out of a generateContent response
    ///
    /// Text parts of the first candidate are concatenated. Thought parts are skipped.
    fn extract_text(body: &Value) -> Result<String, BackendError> {
        if let Some(message) = body["error"]["message"].as_str() {
            return Err(BackendError::Unavailable(message.to_string()));
        }

        let parts = body["candidates"][0]["content"]["parts"]
            .as_array()
            .ok_or_else(|| BackendError::Unavailable("response has no candidates".to_string()))?;

        let text: String = parts
            .iter()
            .filter(|part| !part["thought"].as_bool().unwrap_or(false))
            .filter_map(|part| part["text"].as_str())
            .collect::<Vec<_>>()
            .join("");

        let text = text.trim();
        if text.is_empty() {
            return Err(BackendError::Unavailable("empty response".to_string()));
        }

        Ok(text.to_string())
    }
}

#[async_trait]
impl CompletionBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, prompt: &str, timeout: Duration) -> Result<String, BackendError> {
        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .timeout(timeout)
            .json(&Self::request_body(prompt))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::Timeout(timeout.as_millis() as u64)
                } else {
                    log::warn!("Gemini request failed: {}", e);
                    BackendError::Unavailable(e.without_url().to_string())
                }
            })?;

        let status = response.status();
        let body: Value = response.json().await.map_err(|e| {
            BackendError::Unavailable(format!("unreadable response ({}): {}", status, e))
        })?;

        if !status.is_success() {
            let message = body["error"]["message"]
                .as_str()
                .unwrap_or("request rejected")
                .to_string();
            log::warn!("Gemini returned {}: {}", status, message);
            return Err(BackendError::Unavailable(format!("{}: {}", status, message)));
        }

        Self::extract_text(&body)
    }
}
