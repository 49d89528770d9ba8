//! Simple Task Pilot
//!
//! One prompt, one reply, no abilities. The parsed reply becomes the task's
//! final response.

use async_trait::async_trait;
use sdk::errors::PilotError;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::task::{Task, TaskContext};
use super::{dump_config, one_shot, TaskPilot};
use crate::config::{ExecutionNature, PilotConfig, Settings};
use crate::llm::{ModelClient, ProviderSet, RetryPolicy};
use crate::strategy::{ensure_supports, PromptStrategy, StrategyRegistry, TemplateVars};

pub struct SimpleTaskPilot {
    config: PilotConfig,
    strategy: Arc<dyn PromptStrategy>,
    client: ModelClient,
    cancel: CancellationToken,
    template_vars: TemplateVars,
}

impl SimpleTaskPilot {
    /// Create a one-shot pilot.
    ///
    /// The execution nature in `settings` is ignored; this pilot always runs
    /// in `simple` mode, so the prompt strategy must be one that does not
    /// name abilities.
    pub fn new(settings: Settings, providers: &ProviderSet) -> Result<Self, PilotError> {
        Self::with_strategies(settings, providers, &StrategyRegistry::builtin())
    }

    pub fn with_strategies(
        settings: Settings,
        providers: &ProviderSet,
        strategies: &StrategyRegistry,
    ) -> Result<Self, PilotError> {
        let settings = settings.with_execution_nature(ExecutionNature::Simple);
        settings.validate()?;

        let strategy = strategies.build(&settings.prompt_strategy)?;
        ensure_supports(strategy.as_ref(), ExecutionNature::Simple)?;
        let model = settings.model_for(strategy.model_classification())?;
        let client =
            ModelClient::from_config(providers, model, RetryPolicy::from(&settings.provider))?;

        Ok(Self {
            config: settings.pilot,
            strategy,
            client,
            cancel: CancellationToken::new(),
            template_vars: TemplateVars::new(),
        })
    }

    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_template_vars(mut self, vars: TemplateVars) -> Self {
        self.template_vars = vars;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

#[async_trait]
impl TaskPilot for SimpleTaskPilot {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn dump(&self) -> String {
        dump_config(&self.config)
    }

    async fn execute(&mut self, mut task: Task) -> TaskContext {
        if task.context().is_terminal() {
            warn!(task_id = %task.id(), "Task already finished, not running it again");
            return task.into_context();
        }

        info!(task_id = %task.id(), pilot = %self.config.name, "Starting task: {}", task.objective());
        task.context_mut().start();

        let result = one_shot(
            &task,
            self.strategy.as_ref(),
            &self.client,
            &self.template_vars,
            self.config.max_retries,
            &self.cancel,
        )
        .await;

        match result {
            Ok(content) => {
                info!(task_id = %task.id(), "Task finished");
                task.context_mut().complete(Some(Value::Object(content)));
            }
            Err(e) => {
                error!(task_id = %task.id(), kind = e.kind(), "Task failed: {}", e);
                task.context_mut().fail(e);
            }
        }

        task.into_context()
    }
}
