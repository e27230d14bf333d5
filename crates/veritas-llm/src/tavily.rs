//! Tavily web search client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use veritas_core::config::SearchConfig;
use veritas_rag::WebSearch;

use crate::error::{LlmError, Result};
use crate::http::{build_client, check_status};

const SERVICE: &str = "Tavily";

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Value>,
}

/// Web search through the Tavily API.
///
/// Hits are returned untouched; each normally carries `url`, `title`, and
/// `content`.
#[derive(Clone)]
pub struct TavilySearch {
    client: Client,
    url: String,
    api_key: String,
    max_results: usize,
}

impl TavilySearch {
    pub fn new(config: &SearchConfig, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            url: config.tavily_url.clone(),
            api_key: config.tavily_api_key.clone(),
            max_results: config.max_results.max(1),
        })
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn query(&self, query: &str) -> Result<Vec<Value>> {
        if !self.is_configured() {
            return Err(LlmError::NotConfigured("Tavily API key"));
        }
        let body = SearchRequest {
            api_key: &self.api_key,
            query,
            max_results: self.max_results,
        };
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let parsed: SearchResponse = check_status(SERVICE, response)
            .await?
            .json()
            .await
            .map_err(|e| LlmError::decode(SERVICE, e))?;
        let mut results = parsed.results;
        results.truncate(self.max_results);
        Ok(results)
    }
}

#[async_trait]
impl WebSearch for TavilySearch {
    async fn search(&self, query: &str) -> veritas_rag::error::Result<Vec<Value>> {
        let results = self.query(query).await.map_err(LlmError::into_web_search)?;
        debug!(hits = results.len(), "Web search finished");
        Ok(results)
    }
}
