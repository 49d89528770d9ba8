//! Example driving a task with a custom ability
//!
//! This example shows how to:
//! - Implement an ability
//! - Point the pilot at a local model
//! - Execute a task and inspect its context
//!
//! Prerequisites:
//! - Ollama must be installed and running
//! - A tool-capable model must be available (e.g., llama3.1:8b)

use async_trait::async_trait;
use pilot_engine::ability::AbilityRegistry;
use pilot_engine::config::{ModelClassification, ModelConfig, OllamaConfig, Settings};
use pilot_engine::llm::providers_from_settings;
use pilot_engine::pilot::{SuperTaskPilot, Task, TaskPilot};
use pilot_engine::telemetry::init_telemetry_with_level;
use sdk::{Ability, AbilityArguments, AbilityError, AbilityOutput, ArgumentSpec};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Reports the current time in a named UTC offset
struct WorldClock;

#[async_trait]
impl Ability for WorldClock {
    fn name(&self) -> &str {
        "world_clock"
    }

    fn description(&self) -> &str {
        "Get the current time at a UTC offset in hours"
    }

    fn arguments(&self) -> BTreeMap<String, ArgumentSpec> {
        let mut args = BTreeMap::new();
        args.insert(
            "utc_offset".to_string(),
            ArgumentSpec::integer("Offset from UTC in hours, e.g. 1 for Paris in winter"),
        );
        args
    }

    async fn invoke(&self, arguments: AbilityArguments) -> Result<AbilityOutput, AbilityError> {
        let offset = arguments
            .get("utc_offset")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| AbilityError::MissingArgument("utc_offset".into()))?;
        let zone = chrono::FixedOffset::east_opt((offset * 3600) as i32).ok_or_else(|| {
            AbilityError::InvalidArgument {
                name: "utc_offset".into(),
                reason: format!("{offset} is not a valid offset"),
            }
        })?;

        let now = chrono::Utc::now().with_timezone(&zone).format("%H:%M").to_string();
        Ok(AbilityOutput::text(now.clone()).with_memory(format!("time at UTC{offset:+}"), now))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_telemetry_with_level("info");
    println!("=== Simple Task Execution Example ===\n");

    // Route both model tiers to a local Ollama
    let mut settings = Settings::default();
    settings.providers.ollama = Some(OllamaConfig::default());
    for class in [ModelClassification::Fast, ModelClassification::Smart] {
        settings
            .models
            .insert(class, ModelConfig::new("llama3.1:8b", "ollama", 0.2));
    }

    let providers = providers_from_settings(&settings.providers);
    let registry = Arc::new(AbilityRegistry::new(vec![Arc::new(WorldClock) as Arc<dyn Ability>])?);
    let mut pilot = SuperTaskPilot::new(settings, registry, &providers)?;

    println!("{}\n", pilot.dump());

    let context = pilot
        .execute(Task::new("What time is it in Paris right now?"))
        .await;

    println!("Status: {}", context.status().as_str());
    for action in context.prior_actions() {
        println!("  {}", action.summary(200));
    }
    if let Some(reason) = context.failure() {
        println!("Failure: {}", reason);
    }

    Ok(())
}
