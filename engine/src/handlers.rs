//! Command handlers for CLI operations
//!
//! This module implements the handlers for all CLI commands:
//! - run: Drive an objective to completion with a `SuperTaskPilot`
//! - make-settings: Write the default settings file
//! - abilities: List the abilities enabled by the settings

use anyhow::{Context, Result};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::ability::AbilityRegistry;
use crate::config::{ExecutionNature, Settings};
use crate::llm::providers_from_settings;
use crate::pilot::{SuperTaskPilot, Task, TaskContext, TaskPilot, TaskStatus};
use crate::strategy::{default_kind_for, ensure_supports, StrategyRegistry};

/// Output format for command results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// Load settings from `path`, or from the default location
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    match path {
        Some(path) => Settings::load_from_path(path)
            .with_context(|| format!("Failed to load settings from {}", path.display())),
        None => Settings::load_or_create().context("Failed to load settings"),
    }
}

/// Apply the command-line overrides to the loaded settings
///
/// A `mode` given without a `strategy` also switches to the built-in
/// strategy for that mode when the configured one cannot drive it.
pub fn apply_overrides(
    settings: Settings,
    mode: Option<ExecutionNature>,
    strategy: Option<String>,
) -> Settings {
    let settings = match mode {
        Some(mode) => settings.with_execution_nature(mode),
        None => settings,
    };

    let kind = match (strategy, mode) {
        (Some(kind), _) => kind,
        (None, Some(mode)) if !strategy_fits(&settings, mode) => {
            let kind = default_kind_for(mode).to_string();
            info!(
                "Prompt strategy '{}' cannot drive {} mode, using '{}'",
                settings.prompt_strategy.kind, mode, kind
            );
            kind
        }
        (None, _) => return settings,
    };

    let mut prompt_strategy = settings.prompt_strategy.clone();
    prompt_strategy.kind = kind;
    settings.with_prompt_strategy(prompt_strategy)
}

// Unknown kinds are left for pilot construction to report
fn strategy_fits(settings: &Settings, mode: ExecutionNature) -> bool {
    StrategyRegistry::builtin()
        .build(&settings.prompt_strategy)
        .map(|strategy| ensure_supports(strategy.as_ref(), mode).is_ok())
        .unwrap_or(true)
}

/// Run an objective to completion
///
/// Configuration problems are returned as errors. A task that fails while
/// running is reported but is not an error.
pub async fn handle_run(objective: String, settings: Settings, format: OutputFormat) -> Result<()> {
    let providers = providers_from_settings(&settings.providers);
    let registry = AbilityRegistry::from_settings(&settings.abilities)
        .context("Failed to build the ability registry")?;

    let mut pilot = SuperTaskPilot::new(settings, Arc::new(registry), &providers)
        .context("Failed to configure the pilot")?;

    // Ctrl-C fails the task instead of leaving it in progress
    let token = pilot.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    if format == OutputFormat::Text {
        println!("{}", pilot.dump());
        println!();
        println!("Executing objective: {}", objective);
        println!();
    }

    let task = Task::new(objective);
    let task_id = task.id();
    let context = pilot.execute(task).await;

    match format {
        OutputFormat::Text => print_context(&context),
        OutputFormat::Json => {
            let output = json!({
                "task_id": task_id.to_string(),
                "context": context,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

fn print_context(context: &TaskContext) {
    for (i, action) in context.prior_actions().iter().enumerate() {
        println!("{}. {}", i + 1, action.summary(200));
    }
    if !context.prior_actions().is_empty() {
        println!();
    }

    for failure in context.failed_abilities() {
        println!(
            "  ! cycle {} {}: {}",
            failure.cycle,
            failure.ability_name.as_deref().unwrap_or("-"),
            failure.error
        );
    }

    match context.status() {
        TaskStatus::Done => {
            if let Some(response) = context.final_response() {
                match response {
                    serde_json::Value::String(text) => println!("{}", text),
                    other => println!("{}", other),
                }
                println!();
            }
            println!("✓ Task completed in {} cycles", context.cycle_count());
        }
        status => {
            let reason = context
                .failure()
                .map(|e| e.to_string())
                .unwrap_or_else(|| status.as_str().to_string());
            println!("✗ Task failed after {} cycles: {}", context.cycle_count(), reason);
        }
    }
}

/// Write the default settings file
pub fn handle_make_settings(path: Option<&Path>, force: bool, format: OutputFormat) -> Result<()> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => Settings::default_settings_path()?,
    };

    if path.exists() && !force {
        anyhow::bail!(
            "Settings file {} already exists, pass --force to overwrite it",
            path.display()
        );
    }

    Settings::create_default(&path)
        .with_context(|| format!("Failed to write settings to {}", path.display()))?;

    match format {
        OutputFormat::Text => println!("Wrote default settings to {}", path.display()),
        OutputFormat::Json => {
            let output = json!({ "settings_file": path.display().to_string() });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// List the abilities the settings enable
pub fn handle_abilities(settings: &Settings, format: OutputFormat) -> Result<()> {
    let registry = AbilityRegistry::from_settings(&settings.abilities)
        .context("Failed to build the ability registry")?;
    let schemas = registry.dump_abilities();

    match format {
        OutputFormat::Text => {
            if schemas.is_empty() {
                println!("No abilities enabled.");
            }
            for schema in &schemas {
                println!("{}", schema.describe());
            }
        }
        OutputFormat::Json => {
            let output: Vec<_> = schemas
                .iter()
                .map(|schema| {
                    json!({
                        "name": schema.name,
                        "description": schema.description,
                        "parameters": schema.parameters(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
