use std::time::Duration;

use serde_json::Value;

use async_openai::{
    config::OpenAIConfig,
    error::{ApiError, OpenAIError},
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
        CreateChatCompletionResponse, ResponseFormat,
    },
    Client,
};

use crate::{
    config::LlmConfig,
    error::{Result, UmamiError},
};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// System prompt pinning the model to JSON-only output, matching the
/// strict-JSON prompts in [`crate::llm::prompts`].
const JSON_SYSTEM_PROMPT: &str = "必ず JSON のみ返してください。";

#[derive(Clone)]
pub struct LlmApiClient {
    client: Client<OpenAIConfig>,
    model: String,
    max_retries: u32,
}

impl LlmApiClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| OPENAI_BASE_URL.to_string());

        let openai_config = OpenAIConfig::new()
            .with_api_base(base_url)
            .with_api_key(config.api_key.clone().unwrap_or_default());

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| {
                UmamiError::Llm(format!("Failed to create LLM HTTP client: {error}"))
            })?;

        // Cap async-openai's internal backoff at our timeout. Its
        // default max_elapsed_time keeps retrying 500s for 15 minutes,
        // independent of the bounded retry loop below.
        let backoff = backoff::ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(config.timeout_secs)),
            ..Default::default()
        };

        let client = Client::with_config(openai_config)
            .with_http_client(http_client)
            .with_backoff(backoff);

        Ok(Self {
            client,
            model: config.model.clone(),
            max_retries: config.max_retries,
        })
    }

    /// Send a prompt with `response_format: json_object` and parse the
    /// reply as a single JSON value. Retries transient failures with
    /// exponential delay; rate-limit and auth errors fail fast.
    pub async fn complete_json(&self, prompt: &str) -> Result<Value> {
        if prompt.trim().is_empty() {
            return Err(UmamiError::Validation("Prompt cannot be empty".to_string()));
        }

        let mut last_error: Option<UmamiError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay_ms = 100 * 2_u64.pow(attempt - 1);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }

            let request = self.build_json_request(prompt)?;

            match self.client.chat().create(request).await {
                Ok(response) => {
                    let content = Self::extract_content(response)?;
                    tracing::debug!(response_len = content.len(), "LLM JSON response received");
                    return serde_json::from_str(&content).map_err(|e| {
                        tracing::error!(
                            response_len = content.len(),
                            error = %e,
                            "Failed to parse JSON response"
                        );
                        UmamiError::Llm(format!("Failed to parse JSON response: {e}"))
                    });
                }
                Err(error) => {
                    if let Some(rate_limit_error) = Self::rate_limit_error(&error) {
                        return Err(rate_limit_error);
                    }

                    if let Some(auth_error) = Self::auth_error(&error) {
                        return Err(auth_error);
                    }

                    let retryable = Self::is_retryable(&error);
                    let mapped_error = Self::map_openai_error(error);

                    if retryable && attempt < self.max_retries {
                        last_error = Some(mapped_error);
                        continue;
                    }

                    return Err(mapped_error);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            UmamiError::Llm("LLM JSON completion failed after retries".to_string())
        }))
    }

    fn build_json_request(&self, prompt: &str) -> Result<CreateChatCompletionRequest> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(JSON_SYSTEM_PROMPT)
                .build()
                .map_err(|error| {
                    UmamiError::Validation(format!("Invalid system prompt: {error}"))
                })?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|error| UmamiError::Validation(format!("Invalid user prompt: {error}")))?
                .into(),
        ];

        CreateChatCompletionRequestArgs::default()
            .model(self.model.clone())
            .messages(messages)
            .response_format(ResponseFormat::JsonObject)
            .build()
            .map_err(|error| UmamiError::Validation(format!("Invalid LLM JSON request: {error}")))
    }

    fn extract_content(response: CreateChatCompletionResponse) -> Result<String> {
        let message = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| UmamiError::Llm("LLM response contained no choices".to_string()))?
            .message
            .content
            .unwrap_or_default();

        if message.trim().is_empty() {
            return Err(UmamiError::Llm(
                "LLM response contained empty content".to_string(),
            ));
        }

        Ok(message)
    }

    fn is_retryable(error: &OpenAIError) -> bool {
        match error {
            OpenAIError::ApiError(api_error) => {
                api_error.r#type.is_none() && api_error.code.is_none()
            }
            OpenAIError::Reqwest(reqwest_error) => reqwest_error
                .status()
                .map(|status| status.is_server_error())
                .unwrap_or(true),
            _ => false,
        }
    }

    fn rate_limit_error(error: &OpenAIError) -> Option<UmamiError> {
        match error {
            OpenAIError::Reqwest(reqwest_error)
                if reqwest_error.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS) =>
            {
                Some(UmamiError::LlmRateLimit { retry_after: None })
            }
            OpenAIError::ApiError(api_error) if Self::is_rate_limit_api_error(api_error) => {
                Some(UmamiError::LlmRateLimit { retry_after: None })
            }
            _ => None,
        }
    }

    fn auth_error(error: &OpenAIError) -> Option<UmamiError> {
        match error {
            OpenAIError::Reqwest(reqwest_error)
                if reqwest_error.status() == Some(reqwest::StatusCode::UNAUTHORIZED)
                    || reqwest_error.status() == Some(reqwest::StatusCode::FORBIDDEN) =>
            {
                Some(UmamiError::Llm(format!(
                    "LLM authentication failed: {reqwest_error}"
                )))
            }
            OpenAIError::ApiError(api_error) if Self::is_auth_api_error(api_error) => Some(
                UmamiError::Llm(format!("LLM authentication failed: {api_error}")),
            ),
            _ => None,
        }
    }

    fn is_rate_limit_api_error(api_error: &ApiError) -> bool {
        let message = api_error.message.to_lowercase();
        let error_type = api_error.r#type.clone().unwrap_or_default().to_lowercase();
        let code = api_error.code.clone().unwrap_or_default().to_lowercase();

        message.contains("rate limit")
            || message.contains("too many requests")
            || error_type.contains("rate_limit")
            || code.contains("rate_limit")
            || code == "insufficient_quota"
    }

    fn is_auth_api_error(api_error: &ApiError) -> bool {
        let message = api_error.message.to_lowercase();
        let error_type = api_error.r#type.clone().unwrap_or_default().to_lowercase();
        let code = api_error.code.clone().unwrap_or_default().to_lowercase();

        message.contains("unauthorized")
            || message.contains("forbidden")
            || message.contains("authentication")
            || message.contains("invalid api key")
            || code.contains("invalid_api_key")
            || code.contains("authentication")
            || error_type.contains("authentication")
    }

    fn map_openai_error(error: OpenAIError) -> UmamiError {
        match error {
            OpenAIError::Reqwest(reqwest_error) => {
                UmamiError::Llm(format!("LLM request failed: {reqwest_error}"))
            }
            OpenAIError::ApiError(api_error) => {
                UmamiError::Llm(format!("LLM API error: {api_error}"))
            }
            OpenAIError::JSONDeserialize(err) => {
                UmamiError::Llm(format!("Failed to parse LLM response: {err}"))
            }
            OpenAIError::InvalidArgument(message) => UmamiError::Validation(message),
            other => UmamiError::Llm(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_llm_config() -> LlmConfig {
        LlmConfig {
            model: "gpt-4o-mini".to_string(),
            api_key: Some("test-key".to_string()),
            base_url: None,
            timeout_secs: 30,
            max_retries: 0,
        }
    }

    #[test]
    fn test_build_json_request_forces_json_object() {
        let client = LlmApiClient::new(&test_llm_config()).expect("client should be created");
        let request = client
            .build_json_request("test prompt")
            .expect("request should build");

        let format = request.response_format.expect("response_format must be set");
        assert!(matches!(format, ResponseFormat::JsonObject));
        // System message pins the model to JSON output.
        assert_eq!(request.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_prompt_rejected() {
        let client = LlmApiClient::new(&test_llm_config()).unwrap();
        let err = client.complete_json("   ").await.unwrap_err();
        assert!(matches!(err, UmamiError::Validation(_)));
    }

    #[test]
    fn test_structured_response_parses() {
        let response = r#"{"type": "cafe", "subtype": "コーヒーとスイーツ"}"#;
        let value: Value = serde_json::from_str(response).unwrap();
        assert_eq!(value["type"].as_str().unwrap(), "cafe");
    }
}
