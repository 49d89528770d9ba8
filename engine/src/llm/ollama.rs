//! Ollama Provider
//!
//! This module implements the ModelProvider trait for Ollama, a local model
//! runner, typically at http://localhost:11434.
//!
//! Key features:
//! - Local execution (no API keys required)
//! - Unlimited budget
//! - Tool calling through `/api/chat`
//! - Fallback for models that write the call as JSON text instead of `tool_calls`

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    extract_json_object, CompletionRequest, FunctionCall, FunctionCallHint, ModelProvider,
    ModelResponse, ProviderError, Usage,
};

/// Ollama provider
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    /// Base URL for Ollama API (typically http://localhost:11434)
    base_url: String,

    /// HTTP client for API requests
    client: Client,
}

impl OllamaProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: Client::new(),
        }
    }

    fn build_request(request: &CompletionRequest) -> OllamaRequest {
        let messages = request
            .messages
            .iter()
            .map(|msg| OllamaMessage {
                role: msg.role.to_string(),
                content: msg.content.clone(),
                tool_calls: Vec::new(),
            })
            .collect();

        // Ollama has no tool_choice; a forced call only offers that one tool
        let tools = match &request.function_call {
            FunctionCallHint::None => Vec::new(),
            FunctionCallHint::Auto => request.functions.iter().map(OllamaTool::from).collect(),
            FunctionCallHint::Named(name) => request
                .functions
                .iter()
                .filter(|f| &f.name == name)
                .map(OllamaTool::from)
                .collect(),
        };

        OllamaRequest {
            model: request.params.model_name.clone(),
            messages,
            tools,
            stream: false,
            options: OllamaOptions {
                temperature: request.params.temperature,
            },
        }
    }

    fn into_model_response(response: OllamaResponse, hint: &FunctionCallHint) -> ModelResponse {
        let usage = Usage {
            prompt_tokens: response.prompt_eval_count.unwrap_or(0),
            completion_tokens: response.eval_count.unwrap_or(0),
        };

        let content = response.message.content;
        let mut function_call = response
            .message
            .tool_calls
            .into_iter()
            .next()
            .map(|call| FunctionCall::new(call.function.name, call.function.arguments.to_string()));

        // Some models answer with {"name": ..., "arguments": {...}} as text
        if function_call.is_none() && *hint != FunctionCallHint::None {
            if let Some(map) = extract_json_object(&content) {
                if let (Some(Value::String(name)), Some(arguments)) =
                    (map.get("name"), map.get("arguments"))
                {
                    function_call = Some(FunctionCall::new(name.clone(), arguments.to_string()));
                }
            }
        }

        ModelResponse {
            content: if content.is_empty() { None } else { Some(content) },
            function_call,
            usage,
        }
    }
}

#[async_trait]
impl ModelProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<ModelResponse, ProviderError> {
        let body = Self::build_request(request);

        tracing::debug!(
            "Ollama request: model={}, messages={}, tools={}",
            body.model,
            body.messages.len(),
            body.tools.len()
        );

        let url = format!("{}/api/chat", self.base_url.trim_end_matches('/'));
        let start = std::time::Instant::now();
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(&e, &self.base_url))?;

        tracing::debug!(
            "Ollama response received in {:.1}s",
            start.elapsed().as_secs_f64()
        );

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, error_text));
        }

        let ollama_response: OllamaResponse = response.json().await.map_err(|e| {
            ProviderError::MalformedPayload(format!("Failed to parse Ollama response: {}", e))
        })?;

        Ok(Self::into_model_response(ollama_response, &request.function_call))
    }
}

/// Ollama API request format
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OllamaTool>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct OllamaTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: OllamaFunction,
}

#[derive(Debug, Serialize)]
struct OllamaFunction {
    name: String,
    description: String,
    parameters: Value,
}

impl From<&super::FunctionSchema> for OllamaTool {
    fn from(schema: &super::FunctionSchema) -> Self {
        Self {
            kind: "function",
            function: OllamaFunction {
                name: schema.name.clone(),
                description: schema.description.clone(),
                parameters: schema.parameters.clone(),
            },
        }
    }
}

/// Ollama message format
#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<OllamaToolCall>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaToolCall {
    function: OllamaCalledFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaCalledFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Ollama API response format
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
}
