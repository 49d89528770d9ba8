//! Super Task Pilot
//!
//! Drives a task through repeated cycles until it reaches a terminal state:
//!
//! 1. Pick the abilities for this cycle according to the execution nature
//! 2. For each, build a prompt and ask the model for a decision
//! 3. Invoke the ability through the registry
//! 4. Fold the resulting action into the task context
//! 5. Ask the completion policy whether the task is done
//!
//! # Execution natures
//!
//! - `auto`: the model picks one ability per cycle from the whole catalogue
//! - `sequential`: every ability in registration order, each told by name
//! - `parallel`: every ability at once against the same task snapshot
//! - `simple`: one prompt/response round trip, no abilities
//!
//! # Limits
//!
//! - `cycle_count` never exceeds `max_task_cycle_count`; running out of
//!   budget fails the task with `CycleBudgetExceeded`
//! - Malformed replies and failed abilities are retried `max_retries` times
//!   in `auto` mode; unknown ability names are re-prompted
//!   `unknown_ability_retries` times
//! - Provider errors are retried inside the model client; once surfaced they
//!   fail the task

use async_trait::async_trait;
use futures::future::join_all;
use sdk::errors::PilotError;
use sdk::AbilityAction;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::completion::{AnyActionCompletes, CompletionPolicy};
use super::task::{Task, TaskContext, TaskStatus};
use super::{cancellable, dump_config, failed_ability, is_local_to_ability, one_shot, TaskPilot};
use crate::ability::AbilityRegistry;
use crate::config::{ExecutionNature, PilotConfig, Settings};
use crate::llm::{ModelClient, ProviderSet, RetryPolicy};
use crate::strategy::{
    ensure_supports, AbilityDecision, AbilityDirective, PromptInputs, PromptStrategy,
    RuntimeContext, StrategyRegistry, TemplateVars,
};

/// Ability-driven task engine
pub struct SuperTaskPilot {
    settings: Settings,
    registry: Arc<AbilityRegistry>,
    strategy: Arc<dyn PromptStrategy>,
    client: ModelClient,
    completion: Arc<dyn CompletionPolicy>,
    cancel: CancellationToken,
    template_vars: TemplateVars,
    task_queue: VecDeque<Task>,
    completed_tasks: Vec<Task>,
}

impl SuperTaskPilot {
    /// Create a pilot with the built-in prompt strategies
    ///
    /// # Errors
    /// `Configuration` when the settings are invalid, the strategy is
    /// unknown or cannot drive the execution nature, its model or provider
    /// is missing, or an ability-driven mode has no abilities to drive
    pub fn new(
        settings: Settings,
        registry: Arc<AbilityRegistry>,
        providers: &ProviderSet,
    ) -> Result<Self, PilotError> {
        Self::with_strategies(settings, registry, providers, &StrategyRegistry::builtin())
    }

    /// Create a pilot resolving the prompt strategy from `strategies`
    pub fn with_strategies(
        settings: Settings,
        registry: Arc<AbilityRegistry>,
        providers: &ProviderSet,
        strategies: &StrategyRegistry,
    ) -> Result<Self, PilotError> {
        settings.validate()?;

        let nature = settings.pilot.execution_nature;
        if nature != ExecutionNature::Simple && registry.is_empty() {
            return Err(PilotError::Configuration(format!(
                "Execution nature '{}' needs at least one registered ability",
                nature
            )));
        }

        let strategy = strategies.build(&settings.prompt_strategy)?;
        ensure_supports(strategy.as_ref(), nature)?;
        let model = settings.model_for(strategy.model_classification())?;
        let client =
            ModelClient::from_config(providers, model, RetryPolicy::from(&settings.provider))?;

        debug!(
            pilot = %settings.pilot.name,
            strategy = strategy.name(),
            model = %model.model_name,
            provider = %model.provider_name,
            temperature = model.temperature,
            "Pilot configured"
        );

        Ok(Self {
            settings,
            registry,
            strategy,
            client,
            completion: Arc::new(AnyActionCompletes),
            cancel: CancellationToken::new(),
            template_vars: TemplateVars::new(),
            task_queue: VecDeque::new(),
            completed_tasks: Vec::new(),
        })
    }

    /// Replace the policy that decides when a task is done
    pub fn with_completion_policy(mut self, policy: Arc<dyn CompletionPolicy>) -> Self {
        self.completion = policy;
        self
    }

    /// Use an externally owned cancellation token
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Extra variables rendered into every prompt
    pub fn with_template_vars(mut self, vars: TemplateVars) -> Self {
        self.template_vars = vars;
        self
    }

    /// Token that cancels in-flight work when fired
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &AbilityRegistry {
        &self.registry
    }

    /// Tasks that reached a terminal state, oldest first
    pub fn completed_tasks(&self) -> &[Task] {
        &self.completed_tasks
    }

    fn config(&self) -> &PilotConfig {
        &self.settings.pilot
    }

    /// Run one cycle of the configured execution nature
    async fn exec_abilities(&self, task: &mut Task) {
        if self.cancel.is_cancelled() {
            task.context_mut().fail(PilotError::Cancelled);
            return;
        }

        let limit = self.config().max_task_cycle_count;
        let nature = self.config().execution_nature;
        if nature != ExecutionNature::Simple && task.context().cycle_count() >= limit {
            task.context_mut()
                .fail(PilotError::CycleBudgetExceeded { limit });
            return;
        }

        let result = match nature {
            ExecutionNature::Auto => self.exec_auto(task).await,
            ExecutionNature::Sequential => self.exec_sequential(task).await,
            ExecutionNature::Parallel => self.exec_parallel(task).await,
            ExecutionNature::Simple => self.exec_simple(task).await,
        };

        if let Err(e) = result {
            task.context_mut().fail(e);
            return;
        }

        self.evaluate_completion(task);
    }

    fn evaluate_completion(&self, task: &mut Task) {
        if task.context().is_terminal() {
            return;
        }

        let limit = self.config().max_task_cycle_count;
        if self.completion.is_complete(task.context()) {
            let final_response = task
                .context()
                .last_action()
                .map(|action| action.result().clone());
            task.context_mut().complete(final_response);
        } else if task.context().cycle_count() >= limit {
            task.context_mut()
                .fail(PilotError::CycleBudgetExceeded { limit });
        }
    }

    /// One ability chosen by the model, with bounded retries
    async fn exec_auto(&self, task: &mut Task) -> Result<(), PilotError> {
        let max_retries = self.config().max_retries;
        let unknown_retries = self.config().unknown_ability_retries;
        let mut retries = 0;
        let mut unknown = 0;

        loop {
            let result = cancellable(
                &self.cancel,
                self.perform_ability(task, &AbilityDirective::Choose),
            )
            .await;

            let e = match result {
                Ok(action) => {
                    self.update_task_and_memory(task, action);
                    return Ok(());
                }
                Err(e) => e,
            };

            let retry = match &e {
                PilotError::UnknownAbility(_) if unknown < unknown_retries => {
                    unknown += 1;
                    true
                }
                PilotError::ResponseParse(_) | PilotError::AbilityExecution { .. }
                    if retries < max_retries =>
                {
                    retries += 1;
                    true
                }
                _ => false,
            };

            if is_local_to_ability(&e) {
                task.context_mut().record_failure(failed_ability(&e), e.clone());
            }

            if !retry {
                return Err(e);
            }

            warn!(
                task_id = %task.id(),
                kind = e.kind(),
                retries,
                unknown,
                "Retrying ability selection: {}",
                e
            );
        }
    }

    /// Every ability in registration order, one model call each
    async fn exec_sequential(&self, task: &mut Task) -> Result<(), PilotError> {
        let limit = self.config().max_task_cycle_count;
        let mut succeeded = 0;
        let mut first_error = None;

        for ability in self.registry.abilities() {
            if task.context().cycle_count() >= limit {
                break;
            }

            let directive = AbilityDirective::Execute(ability.name().to_string());
            match cancellable(&self.cancel, self.perform_ability(task, &directive)).await {
                Ok(action) => {
                    self.update_task_and_memory(task, action);
                    succeeded += 1;
                }
                Err(e) if is_local_to_ability(&e) => {
                    warn!(task_id = %task.id(), ability = ability.name(), "Ability skipped: {}", e);
                    task.context_mut()
                        .record_failure(Some(ability.name()), e.clone());
                    first_error.get_or_insert(e);
                }
                Err(e) => return Err(e),
            }
        }

        match (succeeded, first_error) {
            (0, Some(e)) => Err(e),
            _ => Ok(()),
        }
    }

    /// Every ability concurrently against the same task snapshot
    async fn exec_parallel(&self, task: &mut Task) -> Result<(), PilotError> {
        let limit = self.config().max_task_cycle_count;
        let remaining = limit.saturating_sub(task.context().cycle_count()) as usize;
        let abilities: Vec<_> = self.registry.abilities().iter().take(remaining).collect();

        let results = {
            let snapshot: &Task = task;
            let calls = abilities.iter().map(|ability| {
                let directive = AbilityDirective::Execute(ability.name().to_string());
                async move { self.perform_ability(snapshot, &directive).await }
            });
            cancellable(&self.cancel, async { Ok::<_, PilotError>(join_all(calls).await) }).await?
        };

        let mut succeeded = 0;
        let mut first_error = None;
        for (ability, result) in abilities.iter().zip(results) {
            match result {
                Ok(action) => {
                    self.update_task_and_memory(task, action);
                    succeeded += 1;
                }
                Err(e) if is_local_to_ability(&e) => {
                    warn!(task_id = %task.id(), ability = ability.name(), "Ability skipped: {}", e);
                    task.context_mut()
                        .record_failure(Some(ability.name()), e.clone());
                    first_error.get_or_insert(e);
                }
                Err(e) => return Err(e),
            }
        }

        match (succeeded, first_error) {
            (0, Some(e)) => Err(e),
            _ => Ok(()),
        }
    }

    /// A single round trip; the parsed reply becomes the final response
    async fn exec_simple(&self, task: &mut Task) -> Result<(), PilotError> {
        let content = one_shot(
            task,
            self.strategy.as_ref(),
            &self.client,
            &self.template_vars,
            self.config().max_retries,
            &self.cancel,
        )
        .await?;

        task.context_mut().complete(Some(Value::Object(content)));
        Ok(())
    }

    /// Ask the model for a decision and invoke the ability it names.
    ///
    /// With an `Execute` directive the ability is fixed and the model only
    /// supplies the arguments.
    async fn perform_ability(
        &self,
        task: &Task,
        directive: &AbilityDirective,
    ) -> Result<AbilityAction, PilotError> {
        let abilities = self.registry.dump_abilities();
        let runtime = RuntimeContext::capture(self.client.remaining_budget());
        let inputs = PromptInputs {
            task,
            abilities: &abilities,
            directive,
            runtime: &runtime,
            template_vars: &self.template_vars,
        };

        let prompt = self.strategy.build_prompt(&inputs)?;
        debug!(task_id = %task.id(), strategy = self.strategy.name(), "Prompt:\n{}", prompt);

        let strategy = self.strategy.as_ref();
        let response = self
            .client
            .complete(
                prompt.messages,
                prompt.functions,
                prompt.function_call,
                |raw| strategy.parse_response(raw),
            )
            .await?;

        let decision = AbilityDecision::from_content(&response.content)?;
        let name = match directive {
            AbilityDirective::Execute(name) => name.clone(),
            AbilityDirective::Choose => decision.next_ability,
        };

        debug!(task_id = %task.id(), ability = %name, "Invoking ability");
        self.registry.perform(&name, decision.ability_arguments).await
    }

    fn update_task_and_memory(&self, task: &mut Task, action: AbilityAction) {
        info!(
            task_id = %task.id(),
            ability = action.ability_name(),
            cycle = task.context().cycle_count() + 1,
            "Ability completed"
        );
        task.context_mut().record_action(action);
    }
}

#[async_trait]
impl TaskPilot for SuperTaskPilot {
    fn name(&self) -> &str {
        &self.config().name
    }

    fn dump(&self) -> String {
        dump_config(self.config())
    }

    async fn execute(&mut self, mut task: Task) -> TaskContext {
        let task_id = task.id();

        // Finished tasks are recorded as they are
        if task.context().is_terminal() {
            warn!(
                task_id = %task_id,
                status = task.context().status().as_str(),
                "Task already finished, not running it again"
            );
            let context = task.context().clone();
            self.completed_tasks.push(task);
            return context;
        }

        info!(
            task_id = %task_id,
            pilot = %self.config().name,
            mode = %self.config().execution_nature,
            "Starting task: {}",
            task.objective()
        );

        task.context_mut().start();
        self.task_queue.push_back(task);

        while let Some(mut task) = self.task_queue.pop_front() {
            self.exec_abilities(&mut task).await;

            if task.context().is_terminal() {
                self.completed_tasks.push(task);
            } else {
                self.task_queue.push_back(task);
            }
        }

        let context = self
            .completed_tasks
            .iter()
            .rev()
            .find(|t| t.id() == task_id)
            .map(|t| t.context().clone())
            .unwrap_or_default();

        match (context.status(), context.failure()) {
            (TaskStatus::Failed, Some(reason)) => error!(
                task_id = %task_id,
                cycles = context.cycle_count(),
                kind = reason.kind(),
                "Task failed: {}",
                reason
            ),
            (status, _) => info!(
                task_id = %task_id,
                cycles = context.cycle_count(),
                status = status.as_str(),
                "Task finished"
            ),
        }

        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ModelClassification, PromptStrategyConfig};
    use crate::llm::{CompletionRequest, ModelProvider, ModelResponse, ProviderError};
    use crate::pilot::completion::{NeverComplete, Predicate};
    use sdk::{Ability, AbilityArguments, AbilityError, AbilityOutput, ArgumentSpec};
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    // Replies with a scripted sequence, then repeats the last entry
    struct Scripted {
        replies: Mutex<VecDeque<ModelResponse>>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl Scripted {
        fn new(replies: Vec<ModelResponse>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ModelProvider for Scripted {
        fn name(&self) -> &str {
            "openai"
        }

        async fn complete(&self, request: &CompletionRequest) -> Result<ModelResponse, ProviderError> {
            self.requests.lock().unwrap().push(request.clone());
            let mut replies = self.replies.lock().unwrap();
            if replies.len() > 1 {
                Ok(replies.pop_front().unwrap())
            } else {
                Ok(replies.front().cloned().unwrap_or_default())
            }
        }
    }

    struct Lookup {
        name: &'static str,
        fail: bool,
    }

    #[async_trait]
    impl Ability for Lookup {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "Look something up"
        }

        fn arguments(&self) -> BTreeMap<String, ArgumentSpec> {
            let mut args = BTreeMap::new();
            args.insert("query".to_string(), ArgumentSpec::string("What to look up"));
            args
        }

        async fn invoke(&self, arguments: AbilityArguments) -> Result<AbilityOutput, AbilityError> {
            if self.fail {
                return Err(AbilityError::Failed("backend unavailable".into()));
            }
            let query = sdk::ability::require_str(&arguments, "query")?;
            Ok(AbilityOutput::text(format!("{}: {}", self.name, query))
                .with_memory(self.name, query.to_string()))
        }
    }

    fn registry(abilities: Vec<(&'static str, bool)>) -> Arc<AbilityRegistry> {
        let abilities = abilities
            .into_iter()
            .map(|(name, fail)| Arc::new(Lookup { name, fail }) as Arc<dyn Ability>)
            .collect();
        Arc::new(AbilityRegistry::new(abilities).unwrap())
    }

    fn providers(provider: Arc<Scripted>) -> ProviderSet {
        let mut set = ProviderSet::new();
        set.insert("openai".to_string(), provider as Arc<dyn ModelProvider>);
        set
    }

    fn settings(nature: ExecutionNature) -> Settings {
        let kind = match nature {
            ExecutionNature::Auto => "next_ability",
            ExecutionNature::Simple => "simple",
            _ => "execute_ability",
        };
        Settings::default()
            .with_execution_nature(nature)
            .with_prompt_strategy(PromptStrategyConfig::new(kind, ModelClassification::Smart))
    }

    fn call(name: &str, query: &str) -> ModelResponse {
        ModelResponse::function_call(name, format!(r#"{{"query": "{query}"}}"#))
    }

    #[tokio::test]
    async fn test_auto_runs_chosen_ability() {
        let provider = Scripted::new(vec![call("b", "capital of France")]);
        let mut pilot = SuperTaskPilot::new(
            settings(ExecutionNature::Auto),
            registry(vec![("a", false), ("b", false)]),
            &providers(provider.clone()),
        )
        .unwrap();

        let ctx = pilot.execute(Task::new("find the capital of France")).await;

        assert_eq!(ctx.status(), TaskStatus::Done);
        assert!(ctx.enough_info());
        assert_eq!(ctx.cycle_count(), 1);
        assert_eq!(ctx.prior_actions()[0].ability_name(), "b");
        assert_eq!(ctx.memories()["b"], "capital of France");
        assert_eq!(provider.calls(), 1);
        assert_eq!(pilot.completed_tasks().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_registry_is_a_configuration_error() {
        let provider = Scripted::new(vec![]);
        let result = SuperTaskPilot::new(
            settings(ExecutionNature::Auto),
            Arc::new(AbilityRegistry::empty()),
            &providers(provider),
        );
        assert!(matches!(result, Err(PilotError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_unknown_strategy_is_a_configuration_error() {
        let settings = Settings::default()
            .with_prompt_strategy(PromptStrategyConfig::new("tree_of_thought", ModelClassification::Smart));
        let result = SuperTaskPilot::new(
            settings,
            registry(vec![("a", false)]),
            &providers(Scripted::new(vec![])),
        );
        assert!(matches!(result, Err(PilotError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_unknown_ability_is_reprompted_once() {
        let provider = Scripted::new(vec![call("missing", "q"), call("a", "q")]);
        let mut pilot = SuperTaskPilot::new(
            settings(ExecutionNature::Auto),
            registry(vec![("a", false)]),
            &providers(provider.clone()),
        )
        .unwrap();

        let ctx = pilot.execute(Task::new("t")).await;
        assert_eq!(ctx.status(), TaskStatus::Done);
        assert_eq!(ctx.failed_abilities().len(), 1);
        assert_eq!(ctx.failed_abilities()[0].ability_name.as_deref(), Some("missing"));
        assert_eq!(provider.calls(), 2);

        let provider = Scripted::new(vec![call("missing", "q")]);
        let mut pilot = SuperTaskPilot::new(
            settings(ExecutionNature::Auto),
            registry(vec![("a", false)]),
            &providers(provider.clone()),
        )
        .unwrap();
        let ctx = pilot.execute(Task::new("t")).await;
        assert_eq!(ctx.status(), TaskStatus::Failed);
        assert_eq!(ctx.failure(), Some(&PilotError::UnknownAbility("missing".into())));
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_auto_failing_ability_exhausts_retries() {
        let provider = Scripted::new(vec![call("a", "q")]);
        let mut pilot = SuperTaskPilot::new(
            settings(ExecutionNature::Auto),
            registry(vec![("a", true)]),
            &providers(provider.clone()),
        )
        .unwrap();

        let ctx = pilot.execute(Task::new("t")).await;
        assert_eq!(ctx.status(), TaskStatus::Failed);
        assert!(matches!(ctx.failure(), Some(PilotError::AbilityExecution { .. })));
        assert_eq!(ctx.failed_abilities().len(), 3);
        assert_eq!(ctx.cycle_count(), 0);
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_sequential_runs_in_registration_order() {
        let provider = Scripted::new(vec![call("x", "q")]);
        let mut pilot = SuperTaskPilot::new(
            settings(ExecutionNature::Sequential),
            registry(vec![("first", false), ("second", false)]),
            &providers(provider.clone()),
        )
        .unwrap();

        let ctx = pilot.execute(Task::new("t")).await;
        let names: Vec<&str> = ctx.prior_actions().iter().map(|a| a.ability_name()).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert_eq!(ctx.cycle_count(), 2);
        assert_eq!(ctx.status(), TaskStatus::Done);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_sequential_respects_cycle_budget() {
        let provider = Scripted::new(vec![call("x", "q")]);
        let mut pilot = SuperTaskPilot::new(
            settings(ExecutionNature::Sequential).with_max_task_cycle_count(2),
            registry(vec![("a", false), ("b", false), ("c", false)]),
            &providers(provider),
        )
        .unwrap()
        .with_completion_policy(Arc::new(NeverComplete));

        let ctx = pilot.execute(Task::new("t")).await;
        assert_eq!(ctx.cycle_count(), 2);
        assert_eq!(ctx.failure(), Some(&PilotError::CycleBudgetExceeded { limit: 2 }));
    }

    #[tokio::test]
    async fn test_parallel_sibling_failure_is_absorbed() {
        let provider = Scripted::new(vec![call("x", "q")]);
        let mut pilot = SuperTaskPilot::new(
            settings(ExecutionNature::Parallel),
            registry(vec![("ok", false), ("broken", true)]),
            &providers(provider),
        )
        .unwrap();

        let ctx = pilot.execute(Task::new("t")).await;
        assert_eq!(ctx.status(), TaskStatus::Done);
        assert_eq!(ctx.prior_actions().len(), 1);
        assert_eq!(ctx.failed_abilities()[0].ability_name.as_deref(), Some("broken"));
    }

    #[tokio::test]
    async fn test_predicate_policy_keeps_cycling() {
        let provider = Scripted::new(vec![call("a", "q")]);
        let mut pilot = SuperTaskPilot::new(
            settings(ExecutionNature::Auto),
            registry(vec![("a", false)]),
            &providers(provider.clone()),
        )
        .unwrap()
        .with_completion_policy(Arc::new(Predicate(|ctx: &TaskContext| ctx.cycle_count() >= 2)));

        let ctx = pilot.execute(Task::new("t")).await;
        assert_eq!(ctx.status(), TaskStatus::Done);
        assert_eq!(ctx.cycle_count(), 2);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_simple_mode_returns_parsed_reply() {
        let provider = Scripted::new(vec![ModelResponse::text("Paris")]);
        let mut pilot = SuperTaskPilot::new(
            settings(ExecutionNature::Simple),
            Arc::new(AbilityRegistry::empty()),
            &providers(provider),
        )
        .unwrap();

        let ctx = pilot.execute(Task::new("capital of France?")).await;
        assert_eq!(ctx.status(), TaskStatus::Done);
        assert_eq!(ctx.cycle_count(), 0);
        assert_eq!(ctx.final_response().unwrap()["content"], "Paris");
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let provider = Scripted::new(vec![call("a", "q")]);
        let mut pilot = SuperTaskPilot::new(
            settings(ExecutionNature::Auto),
            registry(vec![("a", false)]),
            &providers(provider.clone()),
        )
        .unwrap();
        pilot.cancellation_token().cancel();

        let ctx = pilot.execute(Task::new("t")).await;
        assert_eq!(ctx.status(), TaskStatus::Failed);
        assert_eq!(ctx.failure(), Some(&PilotError::Cancelled));
        assert_eq!(provider.calls(), 0);
    }

    #[test]
    fn test_dump() {
        let pilot = SuperTaskPilot::new(
            settings(ExecutionNature::Auto),
            registry(vec![("a", false)]),
            &providers(Scripted::new(vec![])),
        )
        .unwrap();
        assert_eq!(pilot.name(), "super_task_pilot");
        assert!(pilot.dump().starts_with("PilotName: super_task_pilot"));
    }

    #[tokio::test]
    async fn test_strategy_must_fit_execution_nature() {
        let provider = Scripted::new(vec![ModelResponse::text("Paris")]);

        // default `next_ability` strategy cannot answer in simple mode
        let result = SuperTaskPilot::new(
            Settings::default().with_execution_nature(ExecutionNature::Simple),
            Arc::new(AbilityRegistry::empty()),
            &providers(provider.clone()),
        );
        assert!(matches!(result, Err(PilotError::Configuration(_))));

        for (nature, kind) in [
            (ExecutionNature::Auto, "simple"),
            (ExecutionNature::Sequential, "latex_question"),
            (ExecutionNature::Parallel, "simple"),
        ] {
            let settings = Settings::default()
                .with_execution_nature(nature)
                .with_prompt_strategy(PromptStrategyConfig::new(kind, ModelClassification::Smart));
            let result = SuperTaskPilot::new(
                settings,
                registry(vec![("a", false)]),
                &providers(provider.clone()),
            );
            match result {
                Err(PilotError::Configuration(msg)) => assert!(msg.contains(kind)),
                _ => panic!("{kind} should be rejected for {nature}"),
            }
        }

        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_finished_task_is_left_untouched() {
        let provider = Scripted::new(vec![call("a", "q")]);
        let mut pilot = SuperTaskPilot::new(
            settings(ExecutionNature::Auto),
            registry(vec![("a", false)]),
            &providers(provider.clone()),
        )
        .unwrap();

        let mut failed = Task::new("t");
        failed.context_mut().fail(PilotError::Cancelled);
        let ctx = pilot.execute(failed).await;
        assert_eq!(ctx.status(), TaskStatus::Failed);
        assert_eq!(ctx.failure(), Some(&PilotError::Cancelled));
        assert_eq!(ctx.cycle_count(), 0);
        assert!(ctx.prior_actions().is_empty());

        let mut done = Task::new("t");
        done.context_mut().complete(None);
        let ctx = pilot.execute(done).await;
        assert_eq!(ctx.status(), TaskStatus::Done);
        assert!(ctx.prior_actions().is_empty());

        assert_eq!(provider.calls(), 0);
        assert_eq!(pilot.completed_tasks().len(), 2);
    }
}
