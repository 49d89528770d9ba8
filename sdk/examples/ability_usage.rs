//! Example demonstrating the ability contract types

use sdk::{AbilityAction, AbilityArguments, AbilityOutput, AbilitySchema, ArgumentSpec};
use serde_json::json;
use std::collections::BTreeMap;

fn main() {
    // Example 1: Declaring an argument schema
    let mut arguments = BTreeMap::new();
    arguments.insert("query".to_string(), ArgumentSpec::string("Question to be asked"));
    arguments.insert(
        "max_results".to_string(),
        ArgumentSpec::integer("Maximum number of results").optional(),
    );
    let schema = AbilitySchema::new("web_search", "Search the web", arguments);

    println!("Prompt line: {}", schema.describe());
    println!("Required: {:?}", schema.required_arguments());

    // Example 2: The JSON schema offered to function-calling models
    println!("Parameters: {}", schema.parameters());

    // Example 3: Building an output with extracted knowledge
    let output = AbilityOutput::new(json!([{"title": "Paris", "link": "https://example.org/paris"}]))
        .with_memory("https://example.org/paris", "Paris is the capital of France");

    // Example 4: The immutable record replayed into later prompts
    let mut args = AbilityArguments::new();
    args.insert("query".into(), json!("capital of France"));
    let action = AbilityAction::new("web_search", args, output);

    println!("\nAction summary: {}", action.summary(80));
    println!("Memories: {:?}", action.memories());
}
