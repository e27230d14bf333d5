//! Retriever backed by an HTTP search endpoint over the document index.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use veritas_core::config::SearchConfig;
use veritas_core::Document;
use veritas_rag::Retriever;

use crate::error::{LlmError, Result};
use crate::http::{build_client, check_status};

const SERVICE: &str = "retriever";

#[derive(Debug, Serialize)]
struct RetrieveRequest<'a> {
    query: &'a str,
    top_k: usize,
}

/// Accepts `{"documents": [...]}` or a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RetrieveResponse {
    Wrapped { documents: Vec<Document> },
    Bare(Vec<Document>),
}

impl RetrieveResponse {
    fn into_documents(self) -> Vec<Document> {
        match self {
            Self::Wrapped { documents } | Self::Bare(documents) => documents,
        }
    }
}

/// POSTs `{query, top_k}` to a retrieval service.
#[derive(Clone)]
pub struct HttpRetriever {
    client: Client,
    url: String,
    top_k: usize,
}

impl HttpRetriever {
    pub fn new(config: &SearchConfig, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            url: config.retriever_url.clone(),
            top_k: config.retriever_top_k.max(1),
        })
    }

    async fn query(&self, query: &str) -> Result<Vec<Document>> {
        let response = self
            .client
            .post(&self.url)
            .json(&RetrieveRequest {
                query,
                top_k: self.top_k,
            })
            .send()
            .await?;
        let parsed: RetrieveResponse = check_status(SERVICE, response)
            .await?
            .json()
            .await
            .map_err(|e| LlmError::decode(SERVICE, e))?;
        Ok(parsed.into_documents())
    }
}

#[async_trait]
impl Retriever for HttpRetriever {
    async fn search(&self, query: &str) -> veritas_rag::error::Result<Vec<Document>> {
        let documents = self.query(query).await.map_err(LlmError::into_retrieval)?;
        debug!(count = documents.len(), "Retrieval finished");
        Ok(documents)
    }
}
