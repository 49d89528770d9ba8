//! Ability registry
//!
//! Holds the abilities available to a pilot in registration order. The set is
//! fixed at construction; the registry is shared read-only between the
//! futures of a parallel cycle and between pilots.

pub mod web_search;

pub use web_search::WebSearch;

use sdk::errors::PilotError;
use sdk::{Ability, AbilityAction, AbilityArguments, AbilitySchema};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::AbilitiesConfig;

/// Registry of abilities that can be performed by a pilot.
pub struct AbilityRegistry {
    abilities: Vec<Arc<dyn Ability>>,
    index: HashMap<String, usize>,
}

impl AbilityRegistry {
    /// Build a registry, keeping the given order.
    ///
    /// Fails with a configuration error when two abilities share a name.
    pub fn new(abilities: Vec<Arc<dyn Ability>>) -> Result<Self, PilotError> {
        let mut index = HashMap::with_capacity(abilities.len());
        for (position, ability) in abilities.iter().enumerate() {
            if index.insert(ability.name().to_string(), position).is_some() {
                return Err(PilotError::Configuration(format!(
                    "Ability '{}' is registered more than once",
                    ability.name()
                )));
            }
        }

        Ok(Self { abilities, index })
    }

    /// Create an empty registry with no abilities.
    pub fn empty() -> Self {
        Self {
            abilities: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Build the registry of built-in abilities enabled in the settings.
    pub fn from_settings(config: &AbilitiesConfig) -> Result<Self, PilotError> {
        let mut abilities: Vec<Arc<dyn Ability>> = Vec::new();

        if config.web_search.enabled {
            match WebSearch::from_env(&config.web_search) {
                Some(search) => abilities.push(Arc::new(search)),
                None => warn!(
                    "web_search is enabled but {} or {} is not set, skipping it",
                    config.web_search.api_key_env, config.web_search.engine_id_env
                ),
            }
        }

        Self::new(abilities)
    }

    /// Configured abilities in registration order.
    pub fn abilities(&self) -> &[Arc<dyn Ability>] {
        &self.abilities
    }

    pub fn len(&self) -> usize {
        self.abilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.abilities.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Ability>> {
        self.index.get(name).map(|&i| &self.abilities[i])
    }

    /// Ability names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.abilities.iter().map(|a| a.name()).collect()
    }

    /// Describe every ability. Computed on each call.
    pub fn dump_abilities(&self) -> Vec<AbilitySchema> {
        self.abilities.iter().map(|a| a.dump()).collect()
    }

    /// Look up an ability by name and invoke it.
    ///
    /// # Errors
    /// - `UnknownAbility` when no ability has this name
    /// - `AbilityExecution` when a required argument is missing or the body fails
    pub async fn perform(
        &self,
        name: &str,
        arguments: AbilityArguments,
    ) -> Result<AbilityAction, PilotError> {
        let ability = self
            .get(name)
            .ok_or_else(|| PilotError::UnknownAbility(name.to_string()))?;

        let schema = ability.dump();
        let missing: Vec<&str> = schema
            .required_arguments()
            .into_iter()
            .filter(|arg| !arguments.contains_key(*arg))
            .collect();
        if !missing.is_empty() {
            return Err(PilotError::ability_execution(
                name,
                format!("missing required arguments: {}", missing.join(", ")),
            ));
        }

        debug!(ability = name, "Performing ability");

        match ability.invoke(arguments.clone()).await {
            Ok(output) => Ok(AbilityAction::new(name, arguments, output)),
            Err(e) => {
                warn!(ability = name, "Ability failed: {}", e);
                Err(PilotError::ability_execution(name, e))
            }
        }
    }
}

impl std::fmt::Debug for AbilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbilityRegistry")
            .field("abilities", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sdk::{AbilityError, AbilityOutput, ArgumentSpec};
    use serde_json::json;
    use std::collections::BTreeMap;

    struct Echo(&'static str);

    #[async_trait]
    impl Ability for Echo {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "Echo the text back"
        }

        fn arguments(&self) -> BTreeMap<String, ArgumentSpec> {
            let mut args = BTreeMap::new();
            args.insert("text".to_string(), ArgumentSpec::string("Text to echo"));
            args
        }

        async fn invoke(&self, arguments: AbilityArguments) -> Result<AbilityOutput, AbilityError> {
            let text = sdk::ability::require_str(&arguments, "text")?;
            if text == "boom" {
                return Err(AbilityError::Failed("exploded".into()));
            }
            Ok(AbilityOutput::text(text).with_memory("last", text))
        }
    }

    fn args(text: &str) -> AbilityArguments {
        let mut map = AbilityArguments::new();
        map.insert("text".into(), json!(text));
        map
    }

    fn registry() -> AbilityRegistry {
        AbilityRegistry::new(vec![Arc::new(Echo("b_echo")), Arc::new(Echo("a_echo"))]).unwrap()
    }

    #[test]
    fn test_registration_order_is_kept() {
        let registry = registry();
        assert_eq!(registry.names(), vec!["b_echo", "a_echo"]);
        let dumped: Vec<String> = registry.dump_abilities().into_iter().map(|s| s.name).collect();
        assert_eq!(dumped, vec!["b_echo", "a_echo"]);
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let err = AbilityRegistry::new(vec![Arc::new(Echo("echo")), Arc::new(Echo("echo"))])
            .unwrap_err();
        assert!(matches!(err, PilotError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_perform_wraps_result() {
        let action = registry().perform("a_echo", args("hello")).await.unwrap();
        assert_eq!(action.ability_name(), "a_echo");
        assert_eq!(action.result(), &json!("hello"));
        assert_eq!(action.arguments()["text"], "hello");
        assert_eq!(action.memories()["last"], "hello");
    }

    #[tokio::test]
    async fn test_perform_unknown_ability() {
        let err = registry().perform("web_surf", args("x")).await.unwrap_err();
        assert_eq!(err, PilotError::UnknownAbility("web_surf".into()));
    }

    #[tokio::test]
    async fn test_perform_missing_argument() {
        let err = registry()
            .perform("a_echo", AbilityArguments::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PilotError::AbilityExecution { ref ability, ref message }
            if ability == "a_echo" && message.contains("text")));
    }

    #[tokio::test]
    async fn test_perform_body_failure() {
        let err = registry().perform("b_echo", args("boom")).await.unwrap_err();
        assert_eq!(err, PilotError::ability_execution("b_echo", "exploded"));
    }

    #[test]
    fn test_disabled_web_search_is_not_registered() {
        let registry = AbilityRegistry::from_settings(&AbilitiesConfig::default()).unwrap();
        assert!(registry.is_empty());
    }
}
