//! Task pilots
//!
//! A pilot drives a [`Task`] from `PENDING` to `DONE` or `FAILED` by asking a
//! model what to do and invoking abilities on its behalf.
//!
//! - [`SuperTaskPilot`]: the ability-driven engine, in any execution mode
//! - [`SimpleTaskPilot`]: a single prompt/response round trip

pub mod completion;
pub mod simple;
pub mod super_pilot;
pub mod task;

pub use completion::{AnyActionCompletes, CompletionPolicy, NeverComplete, Predicate};
pub use simple::SimpleTaskPilot;
pub use super_pilot::SuperTaskPilot;
pub use task::{AbilityFailure, Task, TaskContext, TaskStatus};

use async_trait::async_trait;
use sdk::errors::PilotError;
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::PilotConfig;
use crate::llm::{ModelClient, ParsedContent};
use crate::strategy::{AbilityDirective, PromptInputs, PromptStrategy, RuntimeContext, TemplateVars};

/// Common surface of every pilot
#[async_trait]
pub trait TaskPilot: Send {
    fn name(&self) -> &str;

    /// Name, role and goals, one per line
    fn dump(&self) -> String;

    /// Drive `task` to a terminal state and return its final context.
    ///
    /// Operational failures never escape; they are reported through the
    /// returned context's status and failure reason.
    async fn execute(&mut self, task: Task) -> TaskContext;
}

pub(crate) fn dump_config(config: &PilotConfig) -> String {
    format!(
        "PilotName: {}\nPilotRole: {}\nPilotGoals: {}",
        config.name,
        config.role,
        config.goals.join(", ")
    )
}

/// Run `fut` unless `token` fires first
pub(crate) async fn cancellable<T, F>(token: &CancellationToken, fut: F) -> Result<T, PilotError>
where
    F: Future<Output = Result<T, PilotError>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(PilotError::Cancelled),
        result = fut => result,
    }
}

/// Errors that only spoil one ability's contribution to a cycle
pub(crate) fn is_local_to_ability(error: &PilotError) -> bool {
    matches!(
        error,
        PilotError::ResponseParse(_)
            | PilotError::AbilityExecution { .. }
            | PilotError::UnknownAbility(_)
    )
}

/// Ability named by an error, if any
pub(crate) fn failed_ability(error: &PilotError) -> Option<&str> {
    match error {
        PilotError::AbilityExecution { ability, .. } => Some(ability),
        PilotError::UnknownAbility(name) => Some(name),
        _ => None,
    }
}

/// Single prompt/response round trip without abilities.
///
/// Parse failures are re-prompted up to `max_retries` times; anything else
/// is returned immediately.
pub(crate) async fn one_shot(
    task: &Task,
    strategy: &dyn PromptStrategy,
    client: &ModelClient,
    template_vars: &TemplateVars,
    max_retries: u32,
    token: &CancellationToken,
) -> Result<ParsedContent, PilotError> {
    let mut attempt = 0;

    loop {
        let result = cancellable(token, async {
            let runtime = RuntimeContext::capture(client.remaining_budget());
            let inputs = PromptInputs {
                task,
                abilities: &[],
                directive: &AbilityDirective::Choose,
                runtime: &runtime,
                template_vars,
            };
            let prompt = strategy.build_prompt(&inputs)?;
            debug!(task_id = %task.id(), strategy = strategy.name(), "Prompt:\n{}", prompt);

            let response = client
                .complete(
                    prompt.messages,
                    prompt.functions,
                    prompt.function_call,
                    |raw| strategy.parse_response(raw),
                )
                .await?;
            Ok::<_, PilotError>(response.content)
        })
        .await;

        match result {
            Err(PilotError::ResponseParse(reason)) if attempt < max_retries => {
                attempt += 1;
                warn!(
                    task_id = %task.id(),
                    attempt,
                    "Could not parse model reply, re-prompting: {}",
                    reason
                );
            }
            other => return other,
        }
    }
}
