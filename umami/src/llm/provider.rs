use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::LlmConfig;
use crate::error::{Result, UmamiError};
use crate::llm::api::LlmApiClient;

/// Availability-gated facade over the chat-completion client.
///
/// Built once at startup; when no usable configuration exists the
/// provider still constructs, and every call reports why it cannot run
/// instead of panicking at wiring time.
#[derive(Debug, Clone)]
pub struct LlmProvider {
    config: Option<Arc<LlmConfig>>,
    unavailable_reason: Option<String>,
}

impl LlmProvider {
    pub fn new(config: Option<&LlmConfig>) -> Self {
        let Some(config) = config else {
            return Self::unavailable("No LLM configuration provided");
        };

        if config.api_key.is_none() && config.base_url.is_none() {
            return Self::unavailable("LLM_API_KEY (or a custom LLM_BASE_URL) is required");
        }

        Self {
            config: Some(Arc::new(config.clone())),
            unavailable_reason: None,
        }
    }

    pub fn unavailable(reason: &str) -> Self {
        Self {
            config: None,
            unavailable_reason: Some(reason.to_string()),
        }
    }

    pub fn is_available(&self) -> bool {
        self.config.is_some()
    }

    pub fn model(&self) -> Option<&str> {
        self.config.as_deref().map(|c| c.model.as_str())
    }

    /// Run a prompt that must come back as a single JSON value.
    pub async fn complete_json(&self, prompt: &str) -> Result<Value> {
        let config = self.config.as_deref().ok_or_else(|| {
            UmamiError::LlmUnavailable(
                self.unavailable_reason
                    .clone()
                    .unwrap_or_else(|| "LLM not configured".to_string()),
            )
        })?;

        let client = LlmApiClient::new(config)?;
        client.complete_json(prompt).await
    }

    /// JSON completion deserialized into a typed response.
    pub async fn complete_structured<T: DeserializeOwned>(&self, prompt: &str) -> Result<T> {
        let value = self.complete_json(prompt).await?;

        serde_json::from_value(value)
            .map_err(|e| UmamiError::Llm(format!("Failed to deserialize response: {e}")))
    }
}
