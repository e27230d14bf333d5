//! External capabilities the engine depends on.
//!
//! Each collaborator is an object-safe async trait so that HTTP adapters,
//! local backends, and scripted test doubles plug in the same way.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use serde_json::Value;
use veritas_core::Document;

use crate::error::Result;

/// Finite, non-restartable sequence of generated text fragments.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A chat prompt: optional system instructions plus the user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: Option<String>,
    pub user: String,
}

impl Prompt {
    pub fn user(user: impl Into<String>) -> Self {
        Self {
            system: None,
            user: user.into(),
        }
    }

    pub fn with_system(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: Some(system.into()),
            user: user.into(),
        }
    }

    /// Total prompt length in characters.
    pub fn char_len(&self) -> usize {
        self.system.as_deref().map_or(0, |s| s.chars().count()) + self.user.chars().count()
    }
}

/// JSON schema the model's structured answer must follow.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSchema {
    pub name: String,
    pub description: String,
    pub schema: Value,
}

/// Chat model capable of plain, structured, and streamed completion.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Complete the prompt and return the full text.
    async fn invoke(&self, prompt: &Prompt) -> Result<String>;

    /// Complete the prompt into a JSON object following `schema`.
    async fn invoke_structured(&self, prompt: &Prompt, schema: &OutputSchema) -> Result<Value>;

    /// Complete the prompt as a stream of text fragments.
    async fn stream(&self, prompt: &Prompt) -> Result<TokenStream>;
}

/// Search over the indexed document corpus.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<Document>>;
}

/// Web search returning raw result objects.
///
/// Hits normally carry a `content` string; anything else is kept and
/// stringified by the web search node.
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<Value>>;
}

/// The set of collaborators injected into the orchestrator at startup.
#[derive(Clone)]
pub struct Collaborators {
    pub chat_model: Arc<dyn ChatModel>,
    pub retriever: Arc<dyn Retriever>,
    pub web_search: Arc<dyn WebSearch>,
}

impl Collaborators {
    pub fn new(
        chat_model: Arc<dyn ChatModel>,
        retriever: Arc<dyn Retriever>,
        web_search: Arc<dyn WebSearch>,
    ) -> Self {
        Self {
            chat_model,
            retriever,
            web_search,
        }
    }
}
