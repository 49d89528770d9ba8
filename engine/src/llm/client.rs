//! Model Client
//!
//! Wraps one provider together with the model parameters resolved from a
//! model configuration. Every call is bounded by a wall-clock timeout;
//! retryable provider errors are retried with exponential backoff before the
//! failure is surfaced. The caller-supplied parser runs once on the reply that
//! finally succeeded; parse failures are returned as-is so the engine can
//! decide whether to re-prompt.

use sdk::errors::PilotError;
use std::sync::Arc;
use std::time::Duration;

use super::{
    CompletionRequest, FunctionCallHint, FunctionSchema, Message, ModelParams, ModelProvider,
    ModelResponse, ParsedContent, ProviderError, ProviderSet,
};
use crate::config::{ModelConfig, ProviderPolicyConfig};

/// Reply with its parsed content
#[derive(Debug, Clone, PartialEq)]
pub struct LanguageModelResponse {
    pub raw: ModelResponse,
    pub content: ParsedContent,
}

/// Failure of a completion
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompletionError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Parse(PilotError),
}

impl From<CompletionError> for PilotError {
    fn from(error: CompletionError) -> Self {
        match error {
            CompletionError::Provider(e) => PilotError::Provider(e.to_string()),
            CompletionError::Parse(e) => e,
        }
    }
}

/// Timeout and retry policy for provider calls
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl From<&ProviderPolicyConfig> for RetryPolicy {
    fn from(config: &ProviderPolicyConfig) -> Self {
        Self {
            timeout: config.timeout(),
            max_retries: config.max_retries,
            backoff: config.backoff(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&ProviderPolicyConfig::default())
    }
}

/// Provider bound to one model configuration
#[derive(Clone)]
pub struct ModelClient {
    provider: Arc<dyn ModelProvider>,
    params: ModelParams,
    policy: RetryPolicy,
}

impl ModelClient {
    pub fn new(provider: Arc<dyn ModelProvider>, params: ModelParams, policy: RetryPolicy) -> Self {
        Self {
            provider,
            params,
            policy,
        }
    }

    /// Resolve the model's provider from `providers` and strip the provider
    /// name from the parameters sent per call
    pub fn from_config(
        providers: &ProviderSet,
        model: &ModelConfig,
        policy: RetryPolicy,
    ) -> Result<Self, PilotError> {
        let provider = providers.get(&model.provider_name).ok_or_else(|| {
            PilotError::Configuration(format!(
                "Model '{}' requires provider '{}', which is not available",
                model.model_name, model.provider_name
            ))
        })?;

        Ok(Self::new(provider.clone(), ModelParams::from(model), policy))
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    /// Advisory remaining spend of the underlying provider
    pub fn remaining_budget(&self) -> f64 {
        self.provider.remaining_budget()
    }

    /// Send a prompt and parse the reply
    ///
    /// # Arguments
    /// * `messages` - Role-tagged prompt messages
    /// * `functions` - Functions offered to the model
    /// * `function_call` - How the model is steered towards the functions
    /// * `parser` - Turns the raw reply into structured content
    pub async fn complete<F>(
        &self,
        messages: Vec<Message>,
        functions: Vec<FunctionSchema>,
        function_call: FunctionCallHint,
        parser: F,
    ) -> Result<LanguageModelResponse, CompletionError>
    where
        F: Fn(&ModelResponse) -> Result<ParsedContent, PilotError> + Sync,
    {
        let request = CompletionRequest {
            messages,
            functions,
            function_call,
            params: self.params.clone(),
        };

        let raw = self.send_with_retry(&request).await?;
        let content = parser(&raw).map_err(CompletionError::Parse)?;

        Ok(LanguageModelResponse { raw, content })
    }

    async fn send_with_retry(
        &self,
        request: &CompletionRequest,
    ) -> Result<ModelResponse, ProviderError> {
        let mut attempt = 0;

        loop {
            tracing::debug!(
                provider = self.provider.name(),
                model = %self.params.model_name,
                attempt,
                "Sending completion request"
            );

            let result = tokio::time::timeout(self.policy.timeout, self.provider.complete(request))
                .await
                .unwrap_or_else(|_| {
                    Err(ProviderError::Timeout(format!(
                        "no response within {}s",
                        self.policy.timeout.as_secs_f64()
                    )))
                });

            match result {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < self.policy.max_retries => {
                    let delay = self.policy.delay_for(attempt);
                    tracing::warn!(
                        provider = self.provider.name(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Provider call failed, retrying: {}",
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(provider = self.provider.name(), "Provider call failed: {}", e);
                    return Err(e);
                }
            }
        }
    }
}
