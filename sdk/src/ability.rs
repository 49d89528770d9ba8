//! Ability trait and invocation types
//!
//! An ability is a named, independently invocable capability with a declared
//! argument schema and an async body. The engine never inspects an ability's
//! result; it wraps whatever the body returns into an immutable
//! [`AbilityAction`] and folds that into the task context.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Arguments supplied to an ability, as decoded from the model's function call
pub type AbilityArguments = serde_json::Map<String, Value>;

/// Knowledge extracted from an ability invocation, keyed by topic or source
pub type Memories = BTreeMap<String, Value>;

/// Errors raised by an ability body
#[derive(Debug, Error)]
pub enum AbilityError {
    #[error("Missing argument: {0}")]
    MissingArgument(String),

    #[error("Invalid argument '{name}': {reason}")]
    InvalidArgument { name: String, reason: String },

    #[error("Ability unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Failed(String),
}

/// Declared type and description of a single ability argument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgumentSpec {
    /// JSON schema type (`string`, `integer`, `number`, `boolean`, `array`, `object`)
    #[serde(rename = "type")]
    pub kind: String,

    /// Natural-language description shown to the model
    pub description: String,

    /// Whether the model must supply this argument
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

impl ArgumentSpec {
    pub fn new(kind: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            description: description.into(),
            required: true,
        }
    }

    pub fn string(description: impl Into<String>) -> Self {
        Self::new("string", description)
    }

    pub fn integer(description: impl Into<String>) -> Self {
        Self::new("integer", description)
    }

    pub fn boolean(description: impl Into<String>) -> Self {
        Self::new("boolean", description)
    }

    /// Mark the argument as optional
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// Structured description of an ability, suitable for a prompt or a
/// function-calling interface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilitySchema {
    pub name: String,
    pub description: String,
    pub arguments: BTreeMap<String, ArgumentSpec>,
}

impl AbilitySchema {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        arguments: BTreeMap<String, ArgumentSpec>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            arguments,
        }
    }

    /// Names of the arguments the model must supply, in sorted order
    pub fn required_arguments(&self) -> Vec<&str> {
        self.arguments
            .iter()
            .filter(|(_, spec)| spec.required)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// JSON schema object describing the arguments
    pub fn parameters(&self) -> Value {
        let properties: Map<String, Value> = self
            .arguments
            .iter()
            .map(|(name, spec)| {
                let property = json!({ "type": spec.kind, "description": spec.description });
                (name.clone(), property)
            })
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": self.required_arguments(),
        })
    }

    /// One-line rendering used in plain-text prompts
    pub fn describe(&self) -> String {
        let args = self
            .arguments
            .iter()
            .map(|(name, spec)| {
                let marker = if spec.required { "" } else { "?" };
                format!("{name}{marker}: {} ({})", spec.kind, spec.description)
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}: {}. Arguments: {}", self.name, self.description, args)
    }
}

/// Raw output of an ability body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AbilityOutput {
    pub result: Value,
    #[serde(default)]
    pub memories: Memories,
}

impl AbilityOutput {
    pub fn new(result: Value) -> Self {
        Self {
            result,
            memories: Memories::new(),
        }
    }

    /// Create an output carrying plain text
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(Value::String(text.into()))
    }

    pub fn with_memory(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.memories.insert(key.into(), value.into());
        self
    }
}

/// Immutable record of one ability invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityAction {
    ability_name: String,
    arguments: AbilityArguments,
    result: Value,
    memories: Memories,
}

impl AbilityAction {
    pub fn new(
        ability_name: impl Into<String>,
        arguments: AbilityArguments,
        output: AbilityOutput,
    ) -> Self {
        Self {
            ability_name: ability_name.into(),
            arguments,
            result: output.result,
            memories: output.memories,
        }
    }

    pub fn ability_name(&self) -> &str {
        &self.ability_name
    }

    pub fn arguments(&self) -> &AbilityArguments {
        &self.arguments
    }

    pub fn result(&self) -> &Value {
        &self.result
    }

    pub fn memories(&self) -> &Memories {
        &self.memories
    }

    /// Compact rendering replayed into later prompts
    pub fn summary(&self, max_result_chars: usize) -> String {
        let args = Value::Object(self.arguments.clone()).to_string();
        let result = match &self.result {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let result = if result.chars().count() > max_result_chars {
            let truncated: String = result.chars().take(max_result_chars).collect();
            format!("{truncated}...")
        } else {
            result
        };
        format!("{}({}) -> {}", self.ability_name, args, result)
    }
}

/// Trait that all abilities must implement
///
/// Implementations must be safe for concurrent use: the engine may invoke the
/// same ability from several tasks, and from several futures of one parallel
/// cycle, at the same time.
#[async_trait]
pub trait Ability: Send + Sync {
    /// Unique name the model uses to select this ability
    fn name(&self) -> &str;

    /// Natural-language description shown to the model
    fn description(&self) -> &str;

    /// Declared argument schema
    fn arguments(&self) -> BTreeMap<String, ArgumentSpec>;

    /// Run the ability body
    async fn invoke(&self, arguments: AbilityArguments) -> Result<AbilityOutput, AbilityError>;

    /// Structured description of this ability
    fn dump(&self) -> AbilitySchema {
        AbilitySchema::new(self.name(), self.description(), self.arguments())
    }
}

/// Get a required string argument
pub fn require_str<'a>(arguments: &'a AbilityArguments, key: &str) -> Result<&'a str, AbilityError> {
    match arguments.get(key) {
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(other) => Err(AbilityError::InvalidArgument {
            name: key.to_string(),
            reason: format!("expected string, got {other}"),
        }),
        None => Err(AbilityError::MissingArgument(key.to_string())),
    }
}

/// Get an optional unsigned integer argument
pub fn optional_u64(arguments: &AbilityArguments, key: &str) -> Option<u64> {
    arguments.get(key).and_then(|v| v.as_u64())
}
