//! Ability selection strategy
//!
//! Offers every ability as a function and lets the model pick the one that
//! makes the most progress. Used in AUTO mode.

use std::sync::Arc;

use super::{AbilityPrompt, PromptStrategy};
use crate::config::PromptStrategyConfig;

pub const TAG: &str = "next_ability";

pub const DEFAULT_SYSTEM_PROMPT: &str = r#"
System Info:
{{ os_info }}
The current time and date is {{ current_time }}
Your remaining API budget is {{ api_budget }}

You are an autonomous pilot working through a task one ability at a time.
Pick the single ability that makes the most progress on the task and call it
with the arguments it needs. Only use abilities from the list you were given.
If you cannot call functions, reply with only a JSON object of the form
{"next_ability": "<ability name>", "ability_arguments": {...}}.
"#;

pub const DEFAULT_USER_PROMPT_TEMPLATE: &str = r#"
Your current task is: {{ task_objective }}
{% if acceptance_criteria %}
The task is done when:
{{ acceptance_criteria }}
{% endif %}
You have taken {{ cycle_count }} actions on this task already.
{% if action_history %}
Here are the actions you have taken and their results:
{{ action_history }}
{% endif %}
{% if memories %}
Here is what you know so far:
{{ memories }}
{% endif %}
{% if additional_info %}
Additional info: {{ additional_info }}
{% endif %}
{% if user_input %}
User input: {{ user_input }}
{% endif %}
{% if ability_name %}
You must use the {{ ability_name }} ability.
{% else %}
Choose the next ability to use.
{% endif %}
"#;

pub fn new(config: &PromptStrategyConfig) -> AbilityPrompt {
    AbilityPrompt::new(TAG, config, DEFAULT_SYSTEM_PROMPT, DEFAULT_USER_PROMPT_TEMPLATE)
}

pub fn construct(config: &PromptStrategyConfig) -> Arc<dyn PromptStrategy> {
    Arc::new(new(config))
}
