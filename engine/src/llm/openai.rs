//! OpenAI Provider
//!
//! Chat completions with function calling through `tools`/`tool_choice`.
//! The API key is read from the environment variable named in the settings.
//! Token usage of every reply is priced and added to a spend tracker so that
//! `remaining_budget()` reflects `budget - spent`.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Mutex;

use super::{
    CompletionRequest, FunctionCall, FunctionCallHint, ModelProvider, ModelResponse,
    ProviderError, Usage,
};
use crate::config::OpenAIConfig;

pub struct OpenAIProvider {
    config: OpenAIConfig,
    api_key: Option<String>,
    client: reqwest::Client,
    spent: Mutex<f64>,
}

impl OpenAIProvider {
    pub fn new(config: OpenAIConfig, api_key: Option<String>) -> Self {
        Self {
            config,
            api_key,
            client: reqwest::Client::new(),
            spent: Mutex::new(0.0),
        }
    }

    /// Create a provider reading the key from `config.api_key_env`
    pub fn from_env(config: OpenAIConfig) -> Self {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());
        Self::new(config, api_key)
    }

    /// Total spend so far in USD
    pub fn spent(&self) -> f64 {
        *self.spent.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn build_payload(request: &CompletionRequest) -> Value {
        let messages: Vec<Value> = request
            .messages
            .iter()
            .map(|msg| {
                json!({
                    "role": msg.role.to_string(),
                    "content": msg.content
                })
            })
            .collect();

        let mut payload = json!({
            "model": request.params.model_name,
            "temperature": request.params.temperature,
            "messages": messages,
        });

        if !request.functions.is_empty() {
            let tools: Vec<Value> = request
                .functions
                .iter()
                .map(|f| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": f.name,
                            "description": f.description,
                            "parameters": f.parameters,
                        }
                    })
                })
                .collect();

            let tool_choice = match &request.function_call {
                FunctionCallHint::Auto => json!("auto"),
                FunctionCallHint::None => json!("none"),
                FunctionCallHint::Named(name) => json!({
                    "type": "function",
                    "function": { "name": name }
                }),
            };

            payload["tools"] = Value::Array(tools);
            payload["tool_choice"] = tool_choice;
        }

        payload
    }

    fn parse_response(data: &Value) -> Result<ModelResponse, ProviderError> {
        let message = data
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|c| c.get("message"))
            .ok_or_else(|| ProviderError::MalformedPayload("No message in response".to_string()))?;

        let content = message
            .get("content")
            .and_then(|c| c.as_str())
            .map(str::to_string);

        // Prefer tool_calls; fall back to the legacy function_call field
        let function = message
            .get("tool_calls")
            .and_then(|t| t.as_array())
            .and_then(|t| t.first())
            .and_then(|t| t.get("function"))
            .or_else(|| message.get("function_call"));

        let function_call = match function {
            Some(f) => {
                let name = f.get("name").and_then(|n| n.as_str()).ok_or_else(|| {
                    ProviderError::MalformedPayload("Function call without a name".to_string())
                })?;
                let arguments = match f.get("arguments") {
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => String::new(),
                };
                Some(FunctionCall::new(name, arguments))
            }
            None => None,
        };

        if content.is_none() && function_call.is_none() {
            return Err(ProviderError::MalformedPayload(
                "Reply has neither content nor a function call".to_string(),
            ));
        }

        let usage = data
            .get("usage")
            .map(|u| Usage {
                prompt_tokens: u.get("prompt_tokens").and_then(Value::as_u64).unwrap_or(0),
                completion_tokens: u
                    .get("completion_tokens")
                    .and_then(Value::as_u64)
                    .unwrap_or(0),
            })
            .unwrap_or_default();

        Ok(ModelResponse {
            content,
            function_call,
            usage,
        })
    }

    fn record_usage(&self, model: &str, usage: Usage) {
        let (prompt_rate, completion_rate) = price_per_1k(model);
        let cost = (usage.prompt_tokens as f64 / 1000.0) * prompt_rate
            + (usage.completion_tokens as f64 / 1000.0) * completion_rate;

        let mut spent = self.spent.lock().unwrap_or_else(|e| e.into_inner());
        *spent += cost;
        tracing::debug!(model, cost, total = *spent, "Recorded OpenAI usage");
    }
}

/// Approximate USD per 1K (prompt, completion) tokens
fn price_per_1k(model: &str) -> (f64, f64) {
    if model.starts_with("gpt-3.5") {
        (0.0005, 0.0015)
    } else if model.starts_with("gpt-4o-mini") {
        (0.00015, 0.0006)
    } else if model.starts_with("gpt-4o") {
        (0.005, 0.015)
    } else if model.starts_with("gpt-4-turbo") {
        (0.01, 0.03)
    } else if model.starts_with("gpt-4") {
        (0.03, 0.06)
    } else {
        (0.002, 0.002)
    }
}

#[async_trait]
impl ModelProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn remaining_budget(&self) -> f64 {
        match self.config.budget {
            Some(budget) => (budget - self.spent()).max(0.0),
            None => f64::INFINITY,
        }
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<ModelResponse, ProviderError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ProviderError::Authentication(format!(
                "environment variable {} is not set",
                self.config.api_key_env
            ))
        })?;

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let payload = Self::build_payload(request);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(&e, &self.config.base_url))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, text));
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedPayload(e.to_string()))?;

        let parsed = Self::parse_response(&data)?;
        self.record_usage(&request.params.model_name, parsed.usage);
        Ok(parsed)
    }
}
