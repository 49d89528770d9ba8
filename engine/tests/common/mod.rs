//! Shared fixtures for engine integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use pilot_engine::config::{
    ExecutionNature, ModelClassification, PromptStrategyConfig, Settings,
};
use pilot_engine::llm::{
    CompletionRequest, ModelProvider, ModelResponse, ProviderError, ProviderSet,
};
use sdk::{Ability, AbilityArguments, AbilityError, AbilityOutput, ArgumentSpec};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Barrier;

/// Provider replaying a script; the last entry repeats forever
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<ModelResponse, ProviderError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    hang: bool,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<ModelResponse, ProviderError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
            hang: false,
        })
    }

    pub fn replying(replies: Vec<ModelResponse>) -> Arc<Self> {
        Self::new(replies.into_iter().map(Ok).collect())
    }

    /// Provider whose calls never finish
    pub fn hanging() -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            hang: true,
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn into_set(self: &Arc<Self>) -> ProviderSet {
        let mut providers = ProviderSet::new();
        providers.insert("openai".to_string(), self.clone() as Arc<dyn ModelProvider>);
        providers
    }

    fn next(&self) -> Result<ModelResponse, ProviderError> {
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script
                .front()
                .cloned()
                .unwrap_or_else(|| Ok(ModelResponse::default()))
        }
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<ModelResponse, ProviderError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.hang {
            std::future::pending::<()>().await;
        }
        self.next()
    }
}

/// Ability that records every invocation into a shared log
pub struct RecordingAbility {
    name: String,
    log: Arc<Mutex<Vec<String>>>,
    fail: bool,
    barrier: Option<Arc<Barrier>>,
}

impl RecordingAbility {
    pub fn new(name: &str, log: &Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name: name.to_string(),
            log: log.clone(),
            fail: false,
            barrier: None,
        }
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Wait for the other holders of `barrier` before returning
    pub fn meeting_at(mut self, barrier: &Arc<Barrier>) -> Self {
        self.barrier = Some(barrier.clone());
        self
    }
}

#[async_trait]
impl Ability for RecordingAbility {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Look up information about a query"
    }

    fn arguments(&self) -> BTreeMap<String, ArgumentSpec> {
        let mut args = BTreeMap::new();
        args.insert("query".to_string(), ArgumentSpec::string("Question to be asked"));
        args
    }

    async fn invoke(&self, arguments: AbilityArguments) -> Result<AbilityOutput, AbilityError> {
        self.log.lock().unwrap().push(self.name.clone());

        if let Some(barrier) = &self.barrier {
            tokio::time::timeout(Duration::from_secs(5), barrier.wait())
                .await
                .map_err(|_| AbilityError::Failed("siblings never arrived".into()))?;
        }

        if self.fail {
            return Err(AbilityError::Failed("backend unavailable".into()));
        }

        let query = sdk::ability::require_str(&arguments, "query")?;
        Ok(AbilityOutput::text(format!("{} result for {}", self.name, query))
            .with_memory(self.name.clone(), query.to_string()))
    }
}

pub fn abilities(list: Vec<RecordingAbility>) -> Vec<Arc<dyn Ability>> {
    list.into_iter()
        .map(|ability| Arc::new(ability) as Arc<dyn Ability>)
        .collect()
}

/// Default settings with the strategy matching `nature` and fast retries
pub fn settings(nature: ExecutionNature) -> Settings {
    let kind = match nature {
        ExecutionNature::Auto => "next_ability",
        ExecutionNature::Simple => "simple",
        ExecutionNature::Sequential | ExecutionNature::Parallel => "execute_ability",
    };
    let mut settings = Settings::default()
        .with_execution_nature(nature)
        .with_prompt_strategy(PromptStrategyConfig::new(kind, ModelClassification::Smart));
    settings.provider.backoff_ms = 1;
    settings
}

pub fn call(name: &str, arguments: &str) -> ModelResponse {
    ModelResponse::function_call(name, arguments)
}
