//! Prompt strategies
//!
//! A prompt strategy turns task state and ability schemas into a model-ready
//! prompt, and turns the raw reply back into structured content. Strategies
//! are pure: `build_prompt` depends only on its inputs, including the runtime
//! context captured by the caller.
//!
//! Strategies are resolved from the `kind` tag in the settings through an
//! explicit [`StrategyRegistry`].

pub mod execute_ability;
pub mod latex_question;
pub mod next_ability;
pub mod simple;

pub use latex_question::LatexQuestion;
pub use simple::SimplePrompt;

use minijinja::Environment;
use sdk::errors::PilotError;
use sdk::{AbilityArguments, AbilitySchema};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::{ExecutionNature, ModelClassification, PromptStrategyConfig};
use crate::llm::{
    extract_json_object, FunctionCallHint, FunctionSchema, Message, ModelResponse, ParsedContent,
};
use crate::pilot::task::Task;

/// Template variables supplied by the caller
pub type TemplateVars = BTreeMap<String, Value>;

/// Prompt ready to be sent to a model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prompt {
    pub messages: Vec<Message>,
    pub functions: Vec<FunctionSchema>,
    pub function_call: FunctionCallHint,
}

impl std::fmt::Display for Prompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for message in &self.messages {
            writeln!(f, "{}: {}", message.role.to_string().to_uppercase(), message.content)?;
        }
        if !self.functions.is_empty() {
            let names: Vec<&str> = self.functions.iter().map(|f| f.name.as_str()).collect();
            writeln!(f, "FUNCTIONS: {}", names.join(", "))?;
        }
        Ok(())
    }
}

/// Whether the model chooses the ability or is told which one to use
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbilityDirective {
    Choose,
    Execute(String),
}

/// Runtime values every prompt gets
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeContext {
    pub os_info: String,
    pub current_time: String,
    pub api_budget: f64,
}

impl RuntimeContext {
    /// Capture the current OS and wall-clock time
    pub fn capture(api_budget: f64) -> Self {
        Self {
            os_info: os_info(),
            current_time: chrono::Local::now().format("%c").to_string(),
            api_budget,
        }
    }

    fn budget_display(&self) -> String {
        if self.api_budget.is_finite() {
            format!("${:.2}", self.api_budget)
        } else {
            "unlimited".to_string()
        }
    }
}

fn os_info() -> String {
    format!("{} ({})", std::env::consts::OS, std::env::consts::ARCH)
}

/// Everything a strategy may look at when building a prompt
#[derive(Debug, Clone)]
pub struct PromptInputs<'a> {
    pub task: &'a Task,
    pub abilities: &'a [AbilitySchema],
    pub directive: &'a AbilityDirective,
    pub runtime: &'a RuntimeContext,
    pub template_vars: &'a TemplateVars,
}

impl PromptInputs<'_> {
    /// Merge runtime, task-derived and caller variables.
    ///
    /// Caller variables win on key collision.
    pub fn template_context(&self) -> TemplateVars {
        let ctx = self.task.context();
        let mut vars = TemplateVars::new();

        vars.insert("os_info".into(), Value::String(self.runtime.os_info.clone()));
        vars.insert(
            "current_time".into(),
            Value::String(self.runtime.current_time.clone()),
        );
        vars.insert("api_budget".into(), Value::String(self.runtime.budget_display()));

        vars.insert(
            "task_objective".into(),
            Value::String(self.task.objective().to_string()),
        );
        vars.insert("cycle_count".into(), Value::from(ctx.cycle_count()));
        vars.insert("action_history".into(), Value::String(action_history(self.task)));
        vars.insert("memories".into(), Value::String(render_memories(self.task)));
        vars.insert(
            "acceptance_criteria".into(),
            Value::String(
                self.task
                    .acceptance_criteria()
                    .iter()
                    .map(|c| format!("- {c}"))
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
        );
        vars.insert(
            "additional_info".into(),
            Value::String(self.task.additional_info().to_string()),
        );
        vars.insert(
            "user_input".into(),
            Value::String(self.task.user_input().to_string()),
        );
        if let AbilityDirective::Execute(name) = self.directive {
            vars.insert("ability_name".into(), Value::String(name.clone()));
        }

        for (key, value) in self.template_vars {
            vars.insert(key.clone(), value.clone());
        }

        vars
    }
}

const ACTION_RESULT_CHARS: usize = 500;

fn action_history(task: &Task) -> String {
    task.context()
        .prior_actions()
        .iter()
        .enumerate()
        .map(|(i, action)| format!("{}. {}", i + 1, action.summary(ACTION_RESULT_CHARS)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_memories(task: &Task) -> String {
    task.context()
        .memories()
        .iter()
        .map(|(key, value)| match value {
            Value::String(s) => format!("{key}: {s}"),
            other => format!("{key}: {other}"),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render a minijinja template against the merged variables
pub fn render_template(template: &str, vars: &TemplateVars) -> Result<String, PilotError> {
    let env = Environment::new();
    env.render_str(template, vars)
        .map(|s| s.trim().to_string())
        .map_err(|e| PilotError::Configuration(format!("Failed to render prompt template: {}", e)))
}

/// Prompt strategy trait
pub trait PromptStrategy: Send + Sync {
    /// Registered tag of this strategy
    fn name(&self) -> &str;

    /// Model tier this strategy requires
    fn model_classification(&self) -> ModelClassification;

    /// Build the prompt. Deterministic given its inputs.
    fn build_prompt(&self, inputs: &PromptInputs<'_>) -> Result<Prompt, PilotError>;

    /// Extract structured content from a reply
    ///
    /// # Errors
    /// `ResponseParse` when the reply is not well-formed
    fn parse_response(&self, response: &ModelResponse) -> Result<ParsedContent, PilotError>;

    /// Whether replies name an ability to invoke.
    ///
    /// Ability-driven execution natures need `true`; `simple` needs `false`.
    fn drives_abilities(&self) -> bool;
}

/// Reject a strategy that cannot drive `nature`
///
/// # Errors
/// `Configuration` naming both the strategy and the execution nature
pub fn ensure_supports(
    strategy: &dyn PromptStrategy,
    nature: ExecutionNature,
) -> Result<(), PilotError> {
    let needs_abilities = nature != ExecutionNature::Simple;
    if strategy.drives_abilities() == needs_abilities {
        return Ok(());
    }

    let hint = if needs_abilities {
        "it does not choose abilities"
    } else {
        "its replies name abilities but simple mode runs none"
    };
    Err(PilotError::Configuration(format!(
        "Prompt strategy '{}' cannot drive execution nature '{}': {}",
        strategy.name(),
        nature,
        hint
    )))
}

/// Tag of the built-in strategy suited to `nature`
pub fn default_kind_for(nature: ExecutionNature) -> &'static str {
    match nature {
        ExecutionNature::Auto => next_ability::TAG,
        ExecutionNature::Sequential | ExecutionNature::Parallel => execute_ability::TAG,
        ExecutionNature::Simple => simple::TAG,
    }
}

/// Strategy whose replies name an ability and its arguments.
///
/// The selection and execution strategies differ only in their tag and
/// default templates; both honour either directive.
pub struct AbilityPrompt {
    tag: &'static str,
    model_classification: ModelClassification,
    system_prompt_template: String,
    user_prompt_template: String,
}

impl AbilityPrompt {
    pub fn new(
        tag: &'static str,
        config: &PromptStrategyConfig,
        default_system: &str,
        default_user: &str,
    ) -> Self {
        Self {
            tag,
            model_classification: config.model_classification,
            system_prompt_template: config
                .system_prompt_template
                .clone()
                .unwrap_or_else(|| default_system.to_string()),
            user_prompt_template: config
                .user_prompt_template
                .clone()
                .unwrap_or_else(|| default_user.to_string()),
        }
    }
}

impl PromptStrategy for AbilityPrompt {
    fn name(&self) -> &str {
        self.tag
    }

    fn model_classification(&self) -> ModelClassification {
        self.model_classification
    }

    fn build_prompt(&self, inputs: &PromptInputs<'_>) -> Result<Prompt, PilotError> {
        let vars = inputs.template_context();
        let (functions, function_call) = ability_functions(inputs)?;

        Ok(Prompt {
            messages: vec![
                Message::system(render_template(&self.system_prompt_template, &vars)?),
                Message::user(render_template(&self.user_prompt_template, &vars)?),
            ],
            functions,
            function_call,
        })
    }

    fn parse_response(&self, response: &ModelResponse) -> Result<ParsedContent, PilotError> {
        parse_ability_call(response)
    }

    fn drives_abilities(&self) -> bool {
        true
    }
}

/// Decision carried by the reply of an ability strategy
#[derive(Debug, Clone, PartialEq)]
pub struct AbilityDecision {
    pub next_ability: String,
    pub ability_arguments: AbilityArguments,
}

impl AbilityDecision {
    /// Read `next_ability` and `ability_arguments` from parsed content
    pub fn from_content(content: &ParsedContent) -> Result<Self, PilotError> {
        let next_ability = content
            .get("next_ability")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                PilotError::ResponseParse("reply is missing 'next_ability'".to_string())
            })?;

        let ability_arguments = match content.get("ability_arguments") {
            None | Some(Value::Null) => AbilityArguments::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(other) => {
                return Err(PilotError::ResponseParse(format!(
                    "'ability_arguments' must be an object, got {other}"
                )))
            }
        };

        Ok(Self {
            next_ability: next_ability.to_string(),
            ability_arguments,
        })
    }

    fn into_content(self) -> ParsedContent {
        let mut content = ParsedContent::new();
        content.insert("next_ability".into(), Value::String(self.next_ability));
        content.insert(
            "ability_arguments".into(),
            Value::Object(self.ability_arguments),
        );
        content
    }
}

/// Functions and hint honouring the directive
pub(crate) fn ability_functions(
    inputs: &PromptInputs<'_>,
) -> Result<(Vec<FunctionSchema>, FunctionCallHint), PilotError> {
    match inputs.directive {
        AbilityDirective::Choose => Ok((
            inputs.abilities.iter().map(FunctionSchema::from).collect(),
            FunctionCallHint::Auto,
        )),
        AbilityDirective::Execute(name) => {
            let schema = inputs
                .abilities
                .iter()
                .find(|s| &s.name == name)
                .ok_or_else(|| PilotError::UnknownAbility(name.clone()))?;
            Ok((
                vec![FunctionSchema::from(schema)],
                FunctionCallHint::Named(name.clone()),
            ))
        }
    }
}

/// Read the ability call out of a reply.
///
/// Accepts a function call, or JSON content carrying `next_ability`.
pub(crate) fn parse_ability_call(response: &ModelResponse) -> Result<ParsedContent, PilotError> {
    if let Some(call) = &response.function_call {
        let ability_arguments = call.parse_arguments().ok_or_else(|| {
            PilotError::ResponseParse(format!(
                "arguments for '{}' are not a JSON object: {}",
                call.name, call.arguments
            ))
        })?;
        return Ok(AbilityDecision {
            next_ability: call.name.clone(),
            ability_arguments,
        }
        .into_content());
    }

    let content = response
        .content
        .as_deref()
        .ok_or_else(|| PilotError::ResponseParse("reply is empty".to_string()))?;
    let parsed = extract_json_object(content).ok_or_else(|| {
        PilotError::ResponseParse(format!("reply is not valid JSON: {}", truncate(content)))
    })?;

    AbilityDecision::from_content(&parsed).map(AbilityDecision::into_content)
}

pub(crate) fn truncate(text: &str) -> String {
    const MAX: usize = 200;
    if text.chars().count() > MAX {
        format!("{}...", text.chars().take(MAX).collect::<String>())
    } else {
        text.to_string()
    }
}

/// Builds a strategy from its configuration
pub type StrategyConstructor = fn(&PromptStrategyConfig) -> Arc<dyn PromptStrategy>;

/// Maps a configuration tag to a strategy constructor
#[derive(Clone)]
pub struct StrategyRegistry {
    constructors: BTreeMap<String, StrategyConstructor>,
}

impl StrategyRegistry {
    /// Registry with no strategies
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// Registry with the built-in strategies
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(next_ability::TAG, next_ability::construct);
        registry.register(execute_ability::TAG, execute_ability::construct);
        registry.register(simple::TAG, simple::construct);
        registry.register(latex_question::TAG, latex_question::construct);
        registry
    }

    pub fn register(&mut self, tag: impl Into<String>, constructor: StrategyConstructor) {
        self.constructors.insert(tag.into(), constructor);
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.constructors.contains_key(tag)
    }

    pub fn tags(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    /// Build the strategy selected by `config.kind`
    pub fn build(&self, config: &PromptStrategyConfig) -> Result<Arc<dyn PromptStrategy>, PilotError> {
        let constructor = self.constructors.get(&config.kind).ok_or_else(|| {
            PilotError::Configuration(format!(
                "Unknown prompt strategy '{}'. Registered strategies: {}",
                config.kind,
                self.tags().join(", ")
            ))
        })?;
        Ok(constructor(config))
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
