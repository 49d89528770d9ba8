//! Ability execution strategy
//!
//! The ability is already chosen; the model is forced to call it and only
//! supplies the arguments. Used in SEQUENTIAL and PARALLEL modes.

use std::sync::Arc;

use super::{AbilityPrompt, PromptStrategy};
use crate::config::PromptStrategyConfig;

pub const TAG: &str = "execute_ability";

pub const DEFAULT_SYSTEM_PROMPT: &str = r#"
System Info:
{{ os_info }}
The current time and date is {{ current_time }}
Your remaining API budget is {{ api_budget }}

You are an autonomous pilot. You will be told which ability to use.
Call it with the arguments that best serve the task; do not answer the
task yourself.
"#;

pub const DEFAULT_USER_PROMPT_TEMPLATE: &str = r#"
Task: {{ task_objective }}
{% if acceptance_criteria %}
The task is done when:
{{ acceptance_criteria }}
{% endif %}
{% if action_history %}
Actions taken so far:
{{ action_history }}
{% endif %}
{% if memories %}
Known facts:
{{ memories }}
{% endif %}
{% if additional_info %}
Additional info: {{ additional_info }}
{% endif %}
{% if user_input %}
User input: {{ user_input }}
{% endif %}
{% if ability_name %}
Use the {{ ability_name }} ability now and supply its arguments.
{% else %}
Use the most suitable ability and supply its arguments.
{% endif %}
"#;

pub fn new(config: &PromptStrategyConfig) -> AbilityPrompt {
    AbilityPrompt::new(TAG, config, DEFAULT_SYSTEM_PROMPT, DEFAULT_USER_PROMPT_TEMPLATE)
}

pub fn construct(config: &PromptStrategyConfig) -> Arc<dyn PromptStrategy> {
    Arc::new(new(config))
}
