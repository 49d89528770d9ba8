//! Task and execution context
//!
//! A task owns its context exclusively. The pilot mutates the context once per
//! completed ability invocation; callers only read it. Once the status is
//! terminal the pilot stops touching the task.

use sdk::errors::PilotError;
use sdk::{AbilityAction, Memories};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Task status enum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Done,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Failed)
    }
}

/// Ability invocation that did not produce an action
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AbilityFailure {
    /// Cycle the failure happened in (1-based)
    pub cycle: u32,
    /// Ability the failure is recorded against, when known
    pub ability_name: Option<String>,
    pub error: PilotError,
}

/// Mutable execution context of a task
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskContext {
    cycle_count: u32,
    prior_actions: Vec<AbilityAction>,
    memories: Memories,
    status: TaskStatus,
    enough_info: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    failed_abilities: Vec<AbilityFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    failure: Option<PilotError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    final_response: Option<Value>,
}

impl Default for TaskContext {
    fn default() -> Self {
        Self {
            cycle_count: 0,
            prior_actions: Vec::new(),
            memories: Memories::new(),
            status: TaskStatus::Pending,
            enough_info: false,
            failed_abilities: Vec::new(),
            failure: None,
            final_response: None,
        }
    }
}

impl TaskContext {
    /// Completed ability invocations so far
    pub fn cycle_count(&self) -> u32 {
        self.cycle_count
    }

    /// Past actions, oldest first
    pub fn prior_actions(&self) -> &[AbilityAction] {
        &self.prior_actions
    }

    /// Knowledge extracted from the latest action
    pub fn memories(&self) -> &Memories {
        &self.memories
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn enough_info(&self) -> bool {
        self.enough_info
    }

    /// Invocations that faulted without aborting the task
    pub fn failed_abilities(&self) -> &[AbilityFailure] {
        &self.failed_abilities
    }

    /// Reason the task failed, when it did
    pub fn failure(&self) -> Option<&PilotError> {
        self.failure.as_ref()
    }

    /// Parsed model reply of a one-shot task
    pub fn final_response(&self) -> Option<&Value> {
        self.final_response.as_ref()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Latest action, if any
    pub fn last_action(&self) -> Option<&AbilityAction> {
        self.prior_actions.last()
    }

    pub(crate) fn start(&mut self) {
        if self.status == TaskStatus::Pending {
            self.status = TaskStatus::InProgress;
        }
    }

    /// Fold a completed action into the context
    pub(crate) fn record_action(&mut self, action: AbilityAction) {
        self.cycle_count += 1;
        self.memories = action.memories().clone();
        self.prior_actions.push(action);
    }

    pub(crate) fn record_failure(&mut self, ability_name: Option<&str>, error: PilotError) {
        self.failed_abilities.push(AbilityFailure {
            cycle: self.cycle_count + 1,
            ability_name: ability_name.map(str::to_string),
            error,
        });
    }

    pub(crate) fn complete(&mut self, final_response: Option<Value>) {
        self.status = TaskStatus::Done;
        self.enough_info = true;
        if final_response.is_some() {
            self.final_response = final_response;
        }
    }

    pub(crate) fn fail(&mut self, error: PilotError) {
        self.status = TaskStatus::Failed;
        self.failure = Some(error);
    }
}

/// Unit of work driven by a pilot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    id: Uuid,
    objective: String,
    #[serde(default)]
    acceptance_criteria: Vec<String>,
    #[serde(default)]
    additional_info: String,
    #[serde(default)]
    user_input: String,
    #[serde(default)]
    context: TaskContext,
}

impl Task {
    /// Create a pending task from an objective
    pub fn new(objective: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            objective: objective.into(),
            acceptance_criteria: Vec::new(),
            additional_info: String::new(),
            user_input: String::new(),
            context: TaskContext::default(),
        }
    }

    pub fn with_acceptance_criteria(mut self, criteria: Vec<String>) -> Self {
        self.acceptance_criteria = criteria;
        self
    }

    pub fn with_additional_info(mut self, info: impl Into<String>) -> Self {
        self.additional_info = info.into();
        self
    }

    pub fn with_user_input(mut self, input: impl Into<String>) -> Self {
        self.user_input = input.into();
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn objective(&self) -> &str {
        &self.objective
    }

    pub fn acceptance_criteria(&self) -> &[String] {
        &self.acceptance_criteria
    }

    pub fn additional_info(&self) -> &str {
        &self.additional_info
    }

    pub fn user_input(&self) -> &str {
        &self.user_input
    }

    pub fn context(&self) -> &TaskContext {
        &self.context
    }

    pub fn status(&self) -> TaskStatus {
        self.context.status
    }

    pub(crate) fn context_mut(&mut self) -> &mut TaskContext {
        &mut self.context
    }

    pub fn into_context(self) -> TaskContext {
        self.context
    }
}

impl From<&str> for Task {
    fn from(objective: &str) -> Self {
        Task::new(objective)
    }
}

impl From<String> for Task {
    fn from(objective: String) -> Self {
        Task::new(objective)
    }
}
