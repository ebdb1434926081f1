//! LLM provider abstraction.
//!
//! A provider turns one system prompt plus one user prompt into one completion.
//! Requests are blocking (`ureq`) and carry their own timeout; callers issue
//! one request at a time. Nothing is retried here: a failed call surfaces as
//! a [`ProviderError`] and the caller decides what to do with it.
//!
//! Response bodies are decoded by pure functions (`anthropic_response`,
//! `openai_response`) so the wire formats can be tested without a network.

use roadmap_core::config::LlmConfig;
use serde_json::{Value, json};
use std::time::Duration;

/// Errors from LLM provider calls.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(String),
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("response parse error: {0}")]
    Parse(String),
    #[error("empty response from LLM")]
    EmptyResponse,
    #[error("no API key found: set {0}")]
    MissingApiKey(String),
    #[error("unknown provider: '{name}'. Available: {available}")]
    UnknownProvider { name: String, available: String },
}

/// A completed LLM response.
#[derive(Debug, Clone, Default)]
pub struct LlmResponse {
    pub text: String,
    /// Prompt tokens, when the API reports them
    pub input_tokens: Option<u64>,
    /// Completion tokens, when the API reports them
    pub output_tokens: Option<u64>,
}

impl LlmResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// The text-generation collaborator used by the auto-fixer.
pub trait LlmProvider: Send {
    /// One blocking completion for a system prompt and a user prompt.
    fn complete(&self, system: &str, user: &str) -> Result<LlmResponse, ProviderError>;

    /// Model identifier, for logs and CLI output.
    fn model_name(&self) -> &str;
}

/// Blocking JSON-over-HTTP transport shared by the providers.
struct JsonClient {
    agent: ureq::Agent,
}

impl JsonClient {
    fn new(timeout_secs: u64) -> Self {
        let config = ureq::config::Config::builder()
            .timeout_global(Some(Duration::from_secs(timeout_secs)))
            .http_status_as_error(false)
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
        }
    }

    /// POST a JSON body and decode the JSON reply. Non-2xx statuses become
    /// `ProviderError::Api` with the server's error message when it sent one.
    fn post(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &Value,
    ) -> Result<Value, ProviderError> {
        let mut request = self
            .agent
            .post(url)
            .header("content-type", "application/json");
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let mut response = request
            .send_json(body)
            .map_err(|e| ProviderError::Http(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .body_mut()
            .read_to_string()
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        if !(200..300).contains(&status) {
            tracing::debug!(status, url, "LLM request rejected");
            return Err(ProviderError::Api {
                status,
                message: error_message(&text),
            });
        }
        serde_json::from_str(&text).map_err(|e| ProviderError::Parse(e.to_string()))
    }
}

/// Best-effort message from an error body: `{"error": {"message": ...}}`,
/// `{"error": "..."}`, or the raw text.
fn error_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let message = parsed.as_ref().and_then(|json| {
        let error = json.get("error")?;
        error
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| error.as_str())
            .map(str::to_string)
    });
    message.unwrap_or_else(|| {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            "no error body".to_string()
        } else {
            trimmed.chars().take(200).collect()
        }
    })
}

fn token_count(json: &Value, field: &str) -> Option<u64> {
    json.pointer(&format!("/usage/{field}")).and_then(Value::as_u64)
}

/// Decode a Messages API reply: the first text content block.
fn anthropic_response(json: &Value) -> Result<LlmResponse, ProviderError> {
    let text = json
        .get("content")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter(|block| block.get("type").and_then(Value::as_str) != Some("thinking"))
        .find_map(|block| block.get("text").and_then(Value::as_str))
        .filter(|text| !text.trim().is_empty())
        .ok_or(ProviderError::EmptyResponse)?;

    Ok(LlmResponse {
        text: text.to_string(),
        input_tokens: token_count(json, "input_tokens"),
        output_tokens: token_count(json, "output_tokens"),
    })
}

/// Decode a chat completions reply: the first choice's message content.
fn openai_response(json: &Value) -> Result<LlmResponse, ProviderError> {
    let text = json
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
        .ok_or(ProviderError::EmptyResponse)?;

    Ok(LlmResponse {
        text: text.to_string(),
        input_tokens: token_count(json, "prompt_tokens"),
        output_tokens: token_count(json, "completion_tokens"),
    })
}

/// Anthropic Messages API.
#[cfg(feature = "anthropic")]
pub struct AnthropicProvider {
    api_key: String,
    model: String,
    max_tokens: u32,
    client: JsonClient,
}

#[cfg(feature = "anthropic")]
impl AnthropicProvider {
    pub const DEFAULT_MODEL: &str = "claude-haiku-4-5-20251001";
    const ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
    const API_VERSION: &str = "2023-06-01";

    pub fn new(api_key: String, model: Option<String>, max_tokens: u32, timeout_secs: u64) -> Self {
        Self {
            api_key,
            model: model.unwrap_or_else(|| Self::DEFAULT_MODEL.to_string()),
            max_tokens,
            client: JsonClient::new(timeout_secs),
        }
    }
}

#[cfg(feature = "anthropic")]
impl LlmProvider for AnthropicProvider {
    fn complete(&self, system: &str, user: &str) -> Result<LlmResponse, ProviderError> {
        let body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "system": system,
            "messages": [{"role": "user", "content": user}],
        });
        let headers = [
            ("x-api-key", self.api_key.as_str()),
            ("anthropic-version", Self::API_VERSION),
        ];
        let reply = self.client.post(Self::ENDPOINT, &headers, &body)?;
        anthropic_response(&reply)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// OpenAI chat completions, or any server that speaks the same protocol.
#[cfg(feature = "openai")]
pub struct OpenAiProvider {
    bearer: String,
    model: String,
    endpoint: String,
    max_tokens: u32,
    client: JsonClient,
}

#[cfg(feature = "openai")]
impl OpenAiProvider {
    pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
    const DEFAULT_BASE_URL: &str = "https://api.openai.com";

    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
        max_tokens: u32,
        timeout_secs: u64,
    ) -> Self {
        let base = base_url.unwrap_or_else(|| Self::DEFAULT_BASE_URL.to_string());
        Self {
            bearer: format!("Bearer {api_key}"),
            model: model.unwrap_or_else(|| Self::DEFAULT_MODEL.to_string()),
            endpoint: format!("{}/v1/chat/completions", base.trim_end_matches('/')),
            max_tokens,
            client: JsonClient::new(timeout_secs),
        }
    }
}

#[cfg(feature = "openai")]
impl LlmProvider for OpenAiProvider {
    fn complete(&self, system: &str, user: &str) -> Result<LlmResponse, ProviderError> {
        let body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        });
        let headers = [("Authorization", self.bearer.as_str())];
        let reply = self.client.post(&self.endpoint, &headers, &body)?;
        openai_response(&reply)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Provider names compiled into this build.
pub fn available_providers() -> Vec<&'static str> {
    vec![
        #[cfg(feature = "anthropic")]
        "anthropic",
        #[cfg(feature = "openai")]
        "openai",
    ]
}

fn unknown_provider(name: &str) -> ProviderError {
    ProviderError::UnknownProvider {
        name: name.to_string(),
        available: available_providers().join(", "),
    }
}

/// Build a named provider. Model, base URL, token limit and timeout come from `config`.
pub fn create_provider(
    name: &str,
    api_key: &str,
    config: &LlmConfig,
) -> Result<Box<dyn LlmProvider>, ProviderError> {
    match name {
        #[cfg(feature = "anthropic")]
        "anthropic" => Ok(Box::new(AnthropicProvider::new(
            api_key.to_string(),
            config.model.clone(),
            config.max_tokens,
            config.timeout_secs,
        ))),
        #[cfg(feature = "openai")]
        "openai" => Ok(Box::new(OpenAiProvider::new(
            api_key.to_string(),
            config.model.clone(),
            config.base_url.clone(),
            config.max_tokens,
            config.timeout_secs,
        ))),
        other => Err(unknown_provider(other)),
    }
}

fn api_key_var(name: &str) -> &'static str {
    if name == "openai" {
        "OPENAI_API_KEY"
    } else {
        "ANTHROPIC_API_KEY"
    }
}

/// Pick a provider from config and the environment.
///
/// A provider forced in config (or `ROADMAP_LLM_PROVIDER`) wins and must have
/// its key set. Otherwise the first compiled-in provider whose key is present
/// is used, Anthropic before OpenAI.
pub fn provider_from_env(config: &LlmConfig) -> Result<Box<dyn LlmProvider>, ProviderError> {
    if let Some(forced) = config.provider.as_deref() {
        let name = forced.trim().to_lowercase();
        if !available_providers().contains(&name.as_str()) {
            return Err(unknown_provider(&name));
        }
        let var = api_key_var(&name);
        let key = std::env::var(var).map_err(|_| ProviderError::MissingApiKey(var.to_string()))?;
        return create_provider(&name, &key, config);
    }

    let found = available_providers()
        .into_iter()
        .find_map(|name| Some((name, std::env::var(api_key_var(name)).ok()?)));
    match found {
        Some((name, key)) => {
            tracing::debug!(provider = name, "selected LLM provider from environment");
            create_provider(name, &key, config)
        }
        None => Err(ProviderError::MissingApiKey(
            "ANTHROPIC_API_KEY or OPENAI_API_KEY".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_build_has_both_providers() {
        assert_eq!(available_providers(), vec!["anthropic", "openai"]);
    }

    #[test]
    fn test_unknown_provider_lists_alternatives() {
        let err = create_provider("gemini", "key", &LlmConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, ProviderError::UnknownProvider { .. }));
        assert!(err.to_string().contains("anthropic, openai"));
    }

    #[test]
    fn test_configured_model_wins() {
        let config = LlmConfig {
            model: Some("gpt-4.1".to_string()),
            ..LlmConfig::default()
        };
        let provider = create_provider("openai", "key", &config).unwrap();
        assert_eq!(provider.model_name(), "gpt-4.1");

        let provider = create_provider("anthropic", "key", &LlmConfig::default()).unwrap();
        assert_eq!(provider.model_name(), AnthropicProvider::DEFAULT_MODEL);
    }

    #[test]
    fn test_openai_endpoint_from_base_url() {
        let provider = OpenAiProvider::new(
            "key".to_string(),
            None,
            Some("http://localhost:11434/".to_string()),
            256,
            5,
        );
        assert_eq!(provider.endpoint, "http://localhost:11434/v1/chat/completions");
        assert_eq!(provider.bearer, "Bearer key");
    }

    #[test]
    fn test_forced_provider_is_normalized_before_lookup() {
        let config = LlmConfig {
            provider: Some(" Cohere ".to_string()),
            ..LlmConfig::default()
        };
        let err = provider_from_env(&config).err().unwrap();
        assert!(matches!(err, ProviderError::UnknownProvider { ref name, .. } if name == "cohere"));
    }

    #[test]
    fn test_anthropic_response_skips_thinking_blocks() {
        let reply = json!({
            "content": [
                {"type": "thinking", "thinking": "hmm"},
                {"type": "text", "text": "###TASK_START### 1.1.1"}
            ],
            "usage": {"input_tokens": 812, "output_tokens": 64}
        });
        let response = anthropic_response(&reply).unwrap();
        assert_eq!(response.text, "###TASK_START### 1.1.1");
        assert_eq!(response.input_tokens, Some(812));
        assert_eq!(response.output_tokens, Some(64));
    }

    #[test]
    fn test_openai_response_and_missing_usage() {
        let reply = json!({"choices": [{"message": {"role": "assistant", "content": "ok"}}]});
        let response = openai_response(&reply).unwrap();
        assert_eq!(response.text, "ok");
        assert_eq!(response.input_tokens, None);
    }

    #[test]
    fn test_blank_completion_is_empty_response() {
        let reply = json!({"choices": [{"message": {"content": "   "}}]});
        assert!(matches!(
            openai_response(&reply),
            Err(ProviderError::EmptyResponse)
        ));
        assert!(matches!(
            anthropic_response(&json!({"content": []})),
            Err(ProviderError::EmptyResponse)
        ));
    }

    #[test]
    fn test_error_message_shapes() {
        assert_eq!(
            error_message(r#"{"error": {"type": "rate_limit", "message": "slow down"}}"#),
            "slow down"
        );
        assert_eq!(error_message(r#"{"error": "bad key"}"#), "bad key");
        assert_eq!(error_message("Bad Gateway\n"), "Bad Gateway");
        assert_eq!(error_message(""), "no error body");
    }
}
