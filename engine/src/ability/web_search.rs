//! Web search ability
//!
//! Queries a Google Custom Search style JSON endpoint. The result list is the
//! action result; each hit's snippet is kept as a memory keyed by its link.

use async_trait::async_trait;
use reqwest::Client;
use sdk::ability::require_str;
use sdk::{Ability, AbilityArguments, AbilityError, AbilityOutput, ArgumentSpec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::WebSearchConfig;

/// One search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub snippet: Option<String>,
}

pub struct WebSearch {
    client: Client,
    base_url: String,
    api_key: String,
    engine_id: String,
    max_results: u32,
}

impl WebSearch {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        engine_id: impl Into<String>,
        max_results: u32,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            engine_id: engine_id.into(),
            max_results,
        }
    }

    /// Create from settings, reading credentials from the environment.
    ///
    /// Returns `None` when either credential is missing.
    pub fn from_env(config: &WebSearchConfig) -> Option<Self> {
        let api_key = std::env::var(&config.api_key_env).ok()?;
        let engine_id = std::env::var(&config.engine_id_env).ok()?;
        if api_key.trim().is_empty() || engine_id.trim().is_empty() {
            return None;
        }
        Some(Self::new(
            config.base_url.clone(),
            api_key,
            engine_id,
            config.max_results,
        ))
    }

    async fn search(&self, query: &str, limit: u32) -> Result<Vec<SearchResult>, AbilityError> {
        // The endpoint caps `num` at 10
        let num = limit.clamp(1, 10).to_string();

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.engine_id.as_str()),
                ("q", query),
                ("num", num.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AbilityError::Unavailable(format!("search request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AbilityError::Failed(format!(
                "search endpoint returned {}",
                response.status()
            )));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| AbilityError::Failed(format!("failed to parse search results: {}", e)))?;

        Ok(body.items.into_iter().take(limit as usize).collect())
    }
}

#[async_trait]
impl Ability for WebSearch {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web and return the top results with their snippets"
    }

    fn arguments(&self) -> BTreeMap<String, ArgumentSpec> {
        let mut args = BTreeMap::new();
        args.insert("query".to_string(), ArgumentSpec::string("Question to be asked"));
        args.insert(
            "max_results".to_string(),
            ArgumentSpec::integer("Maximum number of results").optional(),
        );
        args
    }

    async fn invoke(&self, arguments: AbilityArguments) -> Result<AbilityOutput, AbilityError> {
        let query = require_str(&arguments, "query")?;
        let limit = sdk::ability::optional_u64(&arguments, "max_results")
            .map(|n| n.min(u64::from(self.max_results)) as u32)
            .unwrap_or(self.max_results);

        tracing::debug!(query, limit, "Running web search");
        let results = self.search(query, limit).await?;

        if results.is_empty() {
            tracing::warn!(query, "Web search returned no results");
        }

        let mut output = AbilityOutput::new(
            serde_json::to_value(&results).map_err(|e| AbilityError::Failed(e.to_string()))?,
        );
        for result in &results {
            if let Some(snippet) = &result.snippet {
                output = output.with_memory(result.link.clone(), snippet.clone());
            }
        }

        Ok(output)
    }
}

/// Custom Search JSON response structure
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchResult>,
}
