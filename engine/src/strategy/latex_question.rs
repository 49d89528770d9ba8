//! Question formatting strategy
//!
//! Takes raw question text (often OCR output) and asks the model to repair it
//! and return it as LaTeX, MathML and rich text through a forced `question`
//! function call.

use sdk::errors::PilotError;
use serde_json::{json, Value};
use std::sync::Arc;

use super::simple::function_from_schema;
use super::{render_template, truncate, Prompt, PromptInputs, PromptStrategy};
use crate::config::{ModelClassification, PromptStrategyConfig};
use crate::llm::{FunctionCallHint, FunctionSchema, Message, ModelResponse, ParsedContent};

pub const TAG: &str = "latex_question";

pub const FUNCTION_NAME: &str = "question";

pub const QUESTION_STATUSES: &[&str] = &["complete", "incomplete", "spam", "cannot_be_fixed"];

pub const SUBJECTS: &[&str] = &[
    "not_sure",
    "business",
    "english",
    "mathematics",
    "social_studies",
    "health",
    "geography",
    "biology",
    "physics",
    "chemistry",
    "computers_and_technology",
    "arts",
    "world_languages",
    "spanish",
    "french",
    "german",
    "medicine",
    "law",
    "engineering",
    "economics",
];

pub const QUESTION_TYPES: &[&str] = &[
    "mcq",
    "true_false",
    "fill_in_blank",
    "fill_in_the_blanks_with_options",
    "match_the_column",
    "short_answer",
    "not_sure",
];

pub const DEFAULT_SYSTEM_PROMPT: &str = r#"
You are a question formatter. The content you receive is a question that may
have been extracted by OCR and can contain spelling, spacing or symbol errors.

1. Fix the errors in the question without changing its meaning.
2. Keep the original wording wherever it is already correct.
3. Write every mathematical expression as LaTeX, and as MathML.
4. Give a rich text version that renders without LaTeX support.
5. List the options separately when the question offers choices.
6. Mark the question as spam when it is not a question at all, and as
   cannot_be_fixed when too much of it is missing.
7. Explain what you changed in the comment.

Always answer by calling the question function.
"#;

pub const DEFAULT_USER_PROMPT_TEMPLATE: &str = r#"
Content: {{ task_objective }}
-----
Please use the above input as the content.
"#;

pub struct LatexQuestion {
    model_classification: ModelClassification,
    system_prompt_template: String,
    user_prompt_template: String,
    function: FunctionSchema,
}

impl LatexQuestion {
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
            function: config
                .parser_schema
                .as_ref()
                .map(function_from_schema)
                .unwrap_or_else(question_function),
        }
    }
}

pub fn construct(config: &PromptStrategyConfig) -> Arc<dyn PromptStrategy> {
    Arc::new(LatexQuestion::new(config))
}

fn question_function() -> FunctionSchema {
    let text = |description: &str| json!({"type": "string", "description": description});

    FunctionSchema {
        name: FUNCTION_NAME.to_string(),
        description: "Return the corrected question".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "question": text("The corrected question in plain text"),
                "latex_code": text("The question written in LaTeX"),
                "math_ml": text("The question written in MathML"),
                "rich_text_format": text("The question as rich text"),
                "comment": text("What was changed and why"),
                "question_status": {
                    "type": "string",
                    "enum": QUESTION_STATUSES,
                    "default": "incomplete",
                    "description": "Whether the question could be repaired"
                },
                "subject": {
                    "type": "string",
                    "enum": SUBJECTS,
                    "description": "Subject of the question"
                },
                "question_type": {
                    "type": "string",
                    "enum": QUESTION_TYPES,
                    "description": "Kind of question"
                },
                "options": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Answer options, empty when there are none"
                }
            },
            "required": [
                "question",
                "latex_code",
                "math_ml",
                "rich_text_format",
                "comment",
                "question_status",
                "subject",
                "question_type",
                "options"
            ]
        }),
    }
}

impl PromptStrategy for LatexQuestion {
    fn name(&self) -> &str {
        TAG
    }

    fn model_classification(&self) -> ModelClassification {
        self.model_classification
    }

    fn build_prompt(&self, inputs: &PromptInputs<'_>) -> Result<Prompt, PilotError> {
        let vars = inputs.template_context();

        Ok(Prompt {
            messages: vec![
                Message::system(render_template(&self.system_prompt_template, &vars)?),
                Message::user(render_template(&self.user_prompt_template, &vars)?),
            ],
            functions: vec![self.function.clone()],
            function_call: FunctionCallHint::Named(self.function.name.clone()),
        })
    }

    fn parse_response(&self, response: &ModelResponse) -> Result<ParsedContent, PilotError> {
        let call = response.function_call.as_ref().ok_or_else(|| {
            PilotError::ResponseParse(format!(
                "expected a call to '{}', got text: {}",
                self.function.name,
                truncate(response.content.as_deref().unwrap_or_default())
            ))
        })?;

        let content = call.parse_arguments().ok_or_else(|| {
            PilotError::ResponseParse(format!(
                "arguments for '{}' are not a JSON object: {}",
                call.name,
                truncate(&call.arguments)
            ))
        })?;

        // the corrected text is the one field callers cannot do without
        let has_question = content
            .get("question")
            .and_then(Value::as_str)
            .is_some_and(|q| !q.trim().is_empty());
        if self.function.name == FUNCTION_NAME && !has_question {
            return Err(PilotError::ResponseParse(
                "reply is missing 'question'".to_string(),
            ));
        }

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

    fn strategy() -> LatexQuestion {
        LatexQuestion::new(&PromptStrategyConfig::new(TAG, ModelClassification::Fast))
    }

    #[test]
    fn test_forces_question_function() {
        let task = Task::new("Solve x^2 - 4 = O");
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
        assert_eq!(prompt.function_call, FunctionCallHint::Named("question".into()));
        assert_eq!(prompt.functions.len(), 1);
        let required = prompt.functions[0].parameters["required"].as_array().unwrap();
        assert_eq!(required.len(), 9);
        assert!(prompt.messages[1]
            .content
            .starts_with("Content: Solve x^2 - 4 = O"));
    }

    #[test]
    fn test_parses_question_arguments() {
        let args = json!({
            "question": "Solve x^2 - 4 = 0",
            "latex_code": "x^2 - 4 = 0",
            "math_ml": "<math></math>",
            "rich_text_format": "x² - 4 = 0",
            "comment": "Replaced O with 0",
            "question_status": "complete",
            "subject": "mathematics",
            "question_type": "short_answer",
            "options": []
        });
        let content = strategy()
            .parse_response(&ModelResponse::function_call("question", args.to_string()))
            .unwrap();
        assert_eq!(content["subject"], "mathematics");
    }

    #[test]
    fn test_rejects_text_and_missing_question() {
        assert!(matches!(
            strategy().parse_response(&ModelResponse::text("x = 2")),
            Err(PilotError::ResponseParse(_))
        ));
        assert!(matches!(
            strategy().parse_response(&ModelResponse::function_call(
                "question",
                r#"{"comment": "none"}"#
            )),
            Err(PilotError::ResponseParse(_))
        ));
    }
}
