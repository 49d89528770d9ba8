//! Integration tests for settings management
//!
//! These tests verify that settings files can be written, loaded and
//! validated through the public API.

use pilot_engine::config::{ExecutionNature, ModelClassification, Settings};
use sdk::PilotError;
use std::fs;

#[test]
fn test_settings_toml_parsing() {
    let toml_content = r#"
[core]
log_level = "debug"

[pilot]
name = "research_pilot"
role = "An AI Pilot that researches questions"
goals = ["Answer questions", "Cite sources"]
execution_nature = "sequential"
max_task_cycle_count = 5

[provider]
timeout_secs = 30

[models.fast]
model_name = "llama3.1:8b"
provider_name = "ollama"
temperature = 0.2

[models.smart_model]
model_name = "gpt-4-turbo"
provider_name = "openai"

[prompt_strategy]
kind = "execute_ability"
model_classification = "fast"

[providers.openai]
budget = 2.5

[providers.ollama]
base_url = "http://localhost:11434"

[abilities.web_search]
enabled = true
max_results = 3
"#;

    let settings = Settings::from_toml(toml_content).expect("settings should parse");

    assert_eq!(settings.core.log_level, "debug");
    assert_eq!(settings.pilot.name, "research_pilot");
    assert_eq!(settings.pilot.goals.len(), 2);
    assert_eq!(settings.pilot.execution_nature, ExecutionNature::Sequential);
    assert_eq!(settings.pilot.max_task_cycle_count, 5);
    assert_eq!(settings.pilot.max_retries, 2);
    assert_eq!(settings.provider.timeout_secs, 30);
    assert_eq!(settings.provider.max_retries, 2);

    let fast = settings.model_for(ModelClassification::Fast).unwrap();
    assert_eq!(fast.provider_name, "ollama");
    assert!((fast.temperature - 0.2).abs() < f32::EPSILON);
    let smart = settings.model_for(ModelClassification::Smart).unwrap();
    assert!((smart.temperature - 0.9).abs() < f32::EPSILON);

    assert_eq!(settings.prompt_strategy.kind, "execute_ability");
    assert_eq!(settings.providers.openai.as_ref().unwrap().budget, Some(2.5));
    assert!(settings.abilities.web_search.enabled);
    assert_eq!(settings.abilities.web_search.max_results, 3);
}

#[test]
fn test_minimal_settings_use_defaults() {
    let settings = Settings::from_toml("").expect("empty settings should parse");
    assert_eq!(settings, Settings::default());
}

#[test]
fn test_missing_model_for_strategy_is_rejected() {
    let toml_content = r#"
[models.fast]
model_name = "gpt-3.5-turbo"
provider_name = "openai"

[prompt_strategy]
model_classification = "smart"
"#;

    // an explicit models table replaces the defaults
    let err = Settings::from_toml(toml_content).unwrap_err();
    assert!(matches!(err, PilotError::Configuration(_)));
    assert!(err.to_string().contains("smart"));
}

#[test]
fn test_unconfigured_provider_is_rejected() {
    let toml_content = r#"
[models.smart]
model_name = "mistral"
provider_name = "ollama"

[models.fast]
model_name = "mistral"
provider_name = "ollama"
"#;

    let err = Settings::from_toml(toml_content).unwrap_err();
    assert!(err.to_string().contains("ollama"));
}

#[test]
fn test_invalid_values_are_rejected() {
    let cases = [
        "[core]\nlog_level = \"loud\"",
        "[pilot]\nmax_task_cycle_count = 0",
        "[pilot]\nexecution_nature = \"eventually\"",
        "[models.smart]\nmodel_name = \"gpt-4-turbo\"\nprovider_name = \"openai\"\ntemperature = 3.5\n[models.fast]\nmodel_name = \"gpt-3.5-turbo\"\nprovider_name = \"openai\"",
        "[prompt_strategy]\nmodel_classification = \"medium\"",
    ];

    for case in cases {
        assert!(
            matches!(Settings::from_toml(case), Err(PilotError::Configuration(_))),
            "expected a configuration error for:\n{case}"
        );
    }
}

#[test]
fn test_create_default_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("settings.toml");

    let written = Settings::create_default(&path).unwrap();
    assert!(path.exists());

    let contents = fs::read_to_string(&path).unwrap();
    assert!(contents.contains("[pilot]"));
    assert!(contents.contains("execution_nature = \"auto\""));

    let loaded = Settings::load_from_path(&path).unwrap();
    assert_eq!(loaded, written);
}

#[test]
fn test_load_from_missing_path() {
    let dir = tempfile::tempdir().unwrap();
    let err = Settings::load_from_path(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, PilotError::Configuration(_)));
}

#[test]
fn test_overrides_produce_new_values() {
    let base = Settings::default();
    let sequential = base.clone().with_execution_nature(ExecutionNature::Sequential);

    assert_eq!(base.pilot.execution_nature, ExecutionNature::Auto);
    assert_eq!(sequential.pilot.execution_nature, ExecutionNature::Sequential);
    assert_eq!(Settings::default(), base);
}
