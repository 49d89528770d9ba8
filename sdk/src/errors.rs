//! Error types and handling
//!
//! This module provides the error taxonomy used by the pilot engine. Every
//! variant carries plain strings so a failure can be cloned onto a task
//! context and serialized alongside it; callers inspect the recorded failure
//! instead of catching an error escaping the engine.
//!
//! All errors implement the `PilotErrorExt` trait which provides user-friendly
//! hints and indicates whether errors are recoverable.
//!
//! # Security
//!
//! Error messages never include API keys. Provider errors are reduced to the
//! status class and the provider's own message.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Trait for pilot error extensions
///
/// This trait provides additional context for errors, including user-friendly
/// hints and recoverability information.
pub trait PilotErrorExt {
    /// Returns a user-friendly hint for the error
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors may succeed when the cycle is retried. Non-recoverable
    /// errors need a configuration change before the pilot can make progress.
    fn is_recoverable(&self) -> bool;
}

/// Main pilot error type
///
/// # Error Categories
///
/// - **Configuration**: missing model mapping, empty registry, bad settings.
///   Raised synchronously when a pilot is constructed.
/// - **Ability**: the model named an ability that does not exist, or an
///   ability body faulted.
/// - **Model**: the reply could not be parsed, or the provider failed.
/// - **Budget**: the task ran out of cycles.
/// - **Cancelled**: the driver cancelled the task.
///
/// # Examples
///
/// ```
/// use sdk::errors::{PilotError, PilotErrorExt};
///
/// let error = PilotError::UnknownAbility("web_surf".to_string());
/// println!("Hint: {}", error.user_hint());
/// assert!(error.is_recoverable());
///
/// let fatal = PilotError::CycleBudgetExceeded { limit: 3 };
/// assert!(!fatal.is_recoverable());
/// ```
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum PilotError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unknown ability: {0}")]
    UnknownAbility(String),

    #[error("Ability '{ability}' failed: {message}")]
    AbilityExecution { ability: String, message: String },

    #[error("Response parse error: {0}")]
    ResponseParse(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Cycle budget exceeded: limit of {limit} cycles reached")]
    CycleBudgetExceeded { limit: u32 },

    #[error("Task cancelled")]
    Cancelled,
}

impl PilotError {
    /// Shorthand for an ability execution failure
    pub fn ability_execution(ability: impl Into<String>, message: impl ToString) -> Self {
        Self::AbilityExecution {
            ability: ability.into(),
            message: message.to_string(),
        }
    }

    /// Stable identifier for the error category, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::UnknownAbility(_) => "unknown_ability",
            Self::AbilityExecution { .. } => "ability_execution",
            Self::ResponseParse(_) => "response_parse",
            Self::Provider(_) => "provider",
            Self::CycleBudgetExceeded { .. } => "cycle_budget_exceeded",
            Self::Cancelled => "cancelled",
        }
    }
}

impl PilotErrorExt for PilotError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Configuration(_) => "Check your settings.toml file for errors",
            Self::UnknownAbility(_) => "The model asked for an ability that is not registered",
            Self::AbilityExecution { .. } => "An ability failed. Check the ability's logs",
            Self::ResponseParse(_) => "The model reply was malformed. Try a stronger model",
            Self::Provider(_) => "Model provider unavailable. Check your API keys and network",
            Self::CycleBudgetExceeded { .. } => {
                "Task took too many cycles. Raise max_task_cycle_count or simplify the objective"
            }
            Self::Cancelled => "The task was cancelled before it finished",
        }
    }

    fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::Configuration(_) | Self::CycleBudgetExceeded { .. }
        )
    }
}
