//! One-shot prompt
//!
//! A single system + user message pair with no abilities. A JSON reply is
//! returned as-is; plain text is wrapped as `{"content": ...}`. When a parser
//! schema is configured the model is forced to call it and the call arguments
//! become the content.

use sdk::errors::PilotError;
use serde_json::Value;
use std::sync::Arc;

use super::{render_template, truncate, Prompt, PromptInputs, PromptStrategy};
use crate::config::{ModelClassification, PromptStrategyConfig};
use crate::llm::{
    extract_json_object, FunctionCallHint, FunctionSchema, Message, ModelResponse, ParsedContent,
};

pub const TAG: &str = "simple";

pub const DEFAULT_SYSTEM_PROMPT: &str = r#"
System Info:
{{ os_info }}
The current time and date is {{ current_time }}

You are a helpful assistant. Answer the task directly and concisely.
"#;

pub const DEFAULT_USER_PROMPT_TEMPLATE: &str = r#"
{{ task_objective }}
{% if additional_info %}
{{ additional_info }}
{% endif %}
{% if user_input %}
{{ user_input }}
{% endif %}
"#;

pub struct SimplePrompt {
    model_classification: ModelClassification,
    system_prompt_template: String,
    user_prompt_template: String,
    parser_function: Option<FunctionSchema>,
}

impl SimplePrompt {
    pub fn new(config: &PromptStrategyConfig) -> Self {
        Self {
            model_classification: config.model_classification,
            system_prompt_template: config
                .system_prompt_template
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            user_prompt_template: config
                .user_prompt_template
                .clone()
                .unwrap_or_else(|| DEFAULT_USER_PROMPT_TEMPLATE.to_string()),
            parser_function: config.parser_schema.as_ref().map(function_from_schema),
        }
    }
}

/// Read a function schema from configuration
///
/// Accepts `{name, description, parameters}`; a bare JSON schema object is
/// wrapped as a function named `respond`.
pub(crate) fn function_from_schema(schema: &Value) -> FunctionSchema {
    match serde_json::from_value::<FunctionSchema>(schema.clone()) {
        Ok(function) => function,
        Err(_) => FunctionSchema {
            name: "respond".to_string(),
            description: "Respond with structured output".to_string(),
            parameters: schema.clone(),
        },
    }
}

pub fn construct(config: &PromptStrategyConfig) -> Arc<dyn PromptStrategy> {
    Arc::new(SimplePrompt::new(config))
}

impl PromptStrategy for SimplePrompt {
    fn name(&self) -> &str {
        TAG
    }

    fn model_classification(&self) -> ModelClassification {
        self.model_classification
    }

    fn build_prompt(&self, inputs: &PromptInputs<'_>) -> Result<Prompt, PilotError> {
        let vars = inputs.template_context();

        let (functions, function_call) = match &self.parser_function {
            Some(function) => (
                vec![function.clone()],
                FunctionCallHint::Named(function.name.clone()),
            ),
            None => (Vec::new(), FunctionCallHint::None),
        };

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
        if let Some(call) = &response.function_call {
            return call.parse_arguments().ok_or_else(|| {
                PilotError::ResponseParse(format!(
                    "arguments for '{}' are not a JSON object: {}",
                    call.name,
                    truncate(&call.arguments)
                ))
            });
        }

        if self.parser_function.is_some() {
            return Err(PilotError::ResponseParse(
                "expected a function call in the reply".to_string(),
            ));
        }

        let text = response
            .content
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| PilotError::ResponseParse("reply is empty".to_string()))?;

        if let Some(map) = extract_json_object(text) {
            return Ok(map);
        }

        let mut content = ParsedContent::new();
        content.insert("content".into(), Value::String(text.to_string()));
        Ok(content)
    }

    fn drives_abilities(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pilot::task::Task;
    use crate::strategy::tests::runtime;
    use crate::strategy::{AbilityDirective, TemplateVars};
    use serde_json::json;

    fn strategy() -> SimplePrompt {
        SimplePrompt::new(&PromptStrategyConfig::new(TAG, ModelClassification::Fast))
    }

    #[test]
    fn test_build_prompt_has_no_functions() {
        let task = Task::new("What is 2 + 2?");
        let vars = TemplateVars::new();
        let rt = runtime();
        let inputs = PromptInputs {
            task: &task,
            abilities: &[],
            directive: &AbilityDirective::Choose,
            runtime: &rt,
            template_vars: &vars,
        };

        let prompt = strategy().build_prompt(&inputs).unwrap();
        assert!(prompt.functions.is_empty());
        assert_eq!(prompt.function_call, FunctionCallHint::None);
        assert_eq!(prompt.messages[1].content, "What is 2 + 2?");
    }

    #[test]
    fn test_parse_text_and_json() {
        let text = strategy().parse_response(&ModelResponse::text("  4  ")).unwrap();
        assert_eq!(text["content"], "4");

        let json = strategy()
            .parse_response(&ModelResponse::text(r#"{"answer": 4}"#))
            .unwrap();
        assert_eq!(json["answer"], 4);

        assert!(strategy().parse_response(&ModelResponse::text("   ")).is_err());
    }

    #[test]
    fn test_parser_schema_forces_function() {
        let mut config = PromptStrategyConfig::new(TAG, ModelClassification::Fast);
        config.parser_schema = Some(json!({
            "type": "object",
            "properties": {"answer": {"type": "integer"}},
            "required": ["answer"]
        }));
        let strategy = SimplePrompt::new(&config);

        let task = Task::new("What is 2 + 2?");
        let vars = TemplateVars::new();
        let rt = runtime();
        let inputs = PromptInputs {
            task: &task,
            abilities: &[],
            directive: &AbilityDirective::Choose,
            runtime: &rt,
            template_vars: &vars,
        };
        let prompt = strategy.build_prompt(&inputs).unwrap();
        assert_eq!(prompt.function_call, FunctionCallHint::Named("respond".into()));

        let parsed = strategy
            .parse_response(&ModelResponse::function_call("respond", r#"{"answer": 4}"#))
            .unwrap();
        assert_eq!(parsed["answer"], 4);
        assert!(strategy.parse_response(&ModelResponse::text("4")).is_err());
    }
}
