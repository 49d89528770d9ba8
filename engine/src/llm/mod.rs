//! Model Provider Abstraction Layer
//!
//! This module provides a common interface for the language-model backends a
//! pilot talks to (OpenAI, Ollama). The `ModelProvider` trait defines the
//! contract every backend implements; `ModelClient` wraps one provider with the
//! resolved model parameters and the timeout/retry policy.

use async_trait::async_trait;
use sdk::AbilitySchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::config::{ModelConfig, ProvidersConfig};

pub mod client;
pub mod ollama;
pub mod openai;

pub use client::{CompletionError, LanguageModelResponse, ModelClient, RetryPolicy};

/// Structured content parsed out of a model reply
pub type ParsedContent = Map<String, Value>;

/// Providers available to a pilot, keyed by provider name
pub type ProviderSet = BTreeMap<String, Arc<dyn ModelProvider>>;

/// Errors that can occur while talking to a model provider
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProviderError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

impl ProviderError {
    /// Map a non-success HTTP status to an error
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => Self::Authentication(body),
            429 => Self::RateLimited(body),
            500..=599 => Self::Server {
                status,
                message: body,
            },
            _ => Self::InvalidRequest(format!("HTTP {}: {}", status, body)),
        }
    }

    /// Map a transport failure to an error
    pub fn from_transport(error: &reqwest::Error, base_url: &str) -> Self {
        if error.is_timeout() {
            Self::Timeout(error.to_string())
        } else if error.is_connect() {
            Self::Unavailable(format!("Cannot connect to {}", base_url))
        } else {
            Self::Network(error.to_string())
        }
    }

    /// Whether a retry may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited(_)
                | Self::Server { .. }
                | Self::MalformedPayload(_)
                | Self::Timeout(_)
                | Self::Network(_)
                | Self::Unavailable(_)
        )
    }
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// Role-tagged message in a prompt
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Machine-readable function the model may (or must) call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionSchema {
    pub name: String,
    pub description: String,
    /// JSON schema object for the arguments
    pub parameters: Value,
}

impl From<&AbilitySchema> for FunctionSchema {
    fn from(schema: &AbilitySchema) -> Self {
        Self {
            name: schema.name.clone(),
            description: schema.description.clone(),
            parameters: schema.parameters(),
        }
    }
}

/// How the model is steered towards the offered functions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionCallHint {
    /// The model decides whether and which function to call
    Auto,
    /// The model must reply with plain content
    None,
    /// The model must call this function
    Named(String),
}

/// Function call emitted by the model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    /// Arguments as the raw JSON text the model produced
    pub arguments: String,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Decode the arguments into a JSON object
    pub fn parse_arguments(&self) -> Option<ParsedContent> {
        if self.arguments.trim().is_empty() {
            return Some(ParsedContent::new());
        }
        extract_json_object(&self.arguments)
    }
}

/// Token usage reported by a provider
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Raw reply from a provider
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ModelResponse {
    pub content: Option<String>,
    pub function_call: Option<FunctionCall>,
    #[serde(default)]
    pub usage: Usage,
}

impl ModelResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn function_call(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            function_call: Some(FunctionCall::new(name, arguments)),
            ..Default::default()
        }
    }
}

/// Model parameters sent with every call; provider identity is resolved
/// once when the client is built
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelParams {
    pub model_name: String,
    pub temperature: f32,
}

impl From<&ModelConfig> for ModelParams {
    fn from(config: &ModelConfig) -> Self {
        Self {
            model_name: config.model_name.clone(),
            temperature: config.temperature,
        }
    }
}

/// One completion request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub functions: Vec<FunctionSchema>,
    pub function_call: FunctionCallHint,
    pub params: ModelParams,
}

/// Model provider trait that all backends must implement
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Returns the name of the provider (e.g., "openai", "ollama")
    fn name(&self) -> &str;

    /// Send one completion request
    ///
    /// # Returns
    /// * `Ok(ModelResponse)` - Content and/or a function call
    /// * `Err(ProviderError)` - If the request fails
    async fn complete(&self, request: &CompletionRequest) -> Result<ModelResponse, ProviderError>;

    /// Advisory remaining spend; unlimited providers return infinity
    fn remaining_budget(&self) -> f64 {
        f64::INFINITY
    }
}

/// Build the providers configured under `[providers]`
///
/// OpenAI reads its key from the configured environment variable; a missing
/// key is reported when the provider is first called, not here.
pub fn providers_from_settings(config: &ProvidersConfig) -> ProviderSet {
    let mut providers = ProviderSet::new();

    if let Some(openai) = &config.openai {
        let provider = openai::OpenAIProvider::from_env(openai.clone());
        providers.insert("openai".to_string(), Arc::new(provider));
    }

    if let Some(ollama) = &config.ollama {
        let provider = ollama::OllamaProvider::new(ollama.base_url.clone());
        providers.insert("ollama".to_string(), Arc::new(provider));
    }

    providers
}

/// Extract the first JSON object from model output.
///
/// Handles:
/// 1. Raw JSON (the entire content is an object)
/// 2. Fenced JSON, with or without trailing prose
/// 3. An object embedded in prose, found by scanning for a balanced `{...}`
pub fn extract_json_object(content: &str) -> Option<ParsedContent> {
    let trimmed = content.trim();

    if let Ok(Value::Object(map)) = serde_json::from_str(trimmed) {
        return Some(map);
    }

    if let Some(inner) = extract_fenced_json(trimmed) {
        if let Ok(Value::Object(map)) = serde_json::from_str(inner.trim()) {
            return Some(map);
        }
    }

    let mut search_from = 0;
    while let Some(rel) = trimmed[search_from..].find('{') {
        let start = search_from + rel;
        if let Some(candidate) = extract_balanced_json(&trimmed[start..]) {
            if let Ok(Value::Object(map)) = serde_json::from_str(candidate) {
                return Some(map);
            }
        }
        search_from = start + 1;
    }

    None
}

/// Extract the body of the first markdown code fence in the text.
///
/// Works even when there is trailing prose after the closing ```.
fn extract_fenced_json(content: &str) -> Option<&str> {
    let fence_start = content.find("```")?;
    let after_opening = &content[fence_start + 3..];

    // Skip the language tag line (e.g. "json\n")
    let body_start_rel = after_opening.find('\n')? + 1;
    let body_start = fence_start + 3 + body_start_rel;

    let closing = content[body_start..].find("```")?;
    let body_end = body_start + closing;

    if body_start >= body_end {
        return None;
    }

    Some(&content[body_start..body_end])
}

/// Extract a balanced JSON object starting at position 0 of `s`.
///
/// Counts `{` / `}` depth, respecting string literals, to find the
/// matching close brace.
fn extract_balanced_json(s: &str) -> Option<&str> {
    if !s.starts_with('{') {
        return None;
    }
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use sdk::ArgumentSpec;
    use serde_json::json;

    #[test]
    fn test_message_creation() {
        let msg = Message::system("You are a pilot");
        assert_eq!(msg.role, MessageRole::System);
        assert_eq!(Message::user("hi").role.to_string(), "user");
        assert_eq!(Message::assistant("ok").role, MessageRole::Assistant);
    }

    #[test]
    fn test_function_schema_from_ability() {
        let mut args = BTreeMap::new();
        args.insert("query".to_string(), ArgumentSpec::string("Search query"));
        let schema = AbilitySchema::new("web_search", "Search the web", args);

        let function = FunctionSchema::from(&schema);
        assert_eq!(function.name, "web_search");
        assert_eq!(function.parameters["required"], json!(["query"]));
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            ProviderError::from_status(401, String::new()),
            ProviderError::Authentication(_)
        ));
        assert!(matches!(
            ProviderError::from_status(429, String::new()),
            ProviderError::RateLimited(_)
        ));
        assert!(matches!(
            ProviderError::from_status(503, String::new()),
            ProviderError::Server { status: 503, .. }
        ));
        assert!(matches!(
            ProviderError::from_status(404, String::new()),
            ProviderError::InvalidRequest(_)
        ));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ProviderError::RateLimited(String::new()).is_retryable());
        assert!(ProviderError::Timeout("30s".into()).is_retryable());
        assert!(!ProviderError::Authentication(String::new()).is_retryable());
        assert!(!ProviderError::InvalidRequest(String::new()).is_retryable());
    }

    #[test]
    fn test_extract_raw_json() {
        let map = extract_json_object(r#"{"next_ability": "web_search"}"#).unwrap();
        assert_eq!(map["next_ability"], "web_search");
    }

    #[test]
    fn test_extract_fenced_json_with_trailing_text() {
        let content = "```json\n{\"a\": 1}\n```\nLet me know if you need more.";
        let map = extract_json_object(content).unwrap();
        assert_eq!(map["a"], 1);
    }

    #[test]
    fn test_extract_json_in_prose() {
        let content = r#"Sure {not json} here you go: {"q": "a } in a string"} done"#;
        let map = extract_json_object(content).unwrap();
        assert_eq!(map["q"], "a } in a string");
    }

    #[test]
    fn test_extract_rejects_non_objects() {
        assert!(extract_json_object("[1, 2, 3]").is_none());
        assert!(extract_json_object("no json here").is_none());
        assert!(extract_json_object("{\"unterminated\": ").is_none());
    }

    #[test]
    fn test_function_call_arguments() {
        let call = FunctionCall::new("web_search", r#"{"query": "capital of France"}"#);
        assert_eq!(call.parse_arguments().unwrap()["query"], "capital of France");

        assert!(FunctionCall::new("noop", "").parse_arguments().unwrap().is_empty());
        assert!(FunctionCall::new("bad", "{oops").parse_arguments().is_none());
    }
}
