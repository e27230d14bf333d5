//! Scripted collaborators for tests and offline runs.
//!
//! Each double replays queued responses in order. When a queue is down to
//! its last entry, that entry repeats forever, so a script like "hallucination
//! gate says no" holds for every remaining attempt. Every call is recorded.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::{json, Value};
use veritas_core::{Datasource, Document, Verdict};

use crate::collaborators::{ChatModel, OutputSchema, Prompt, Retriever, TokenStream, WebSearch};
use crate::error::{RagError, Result};
use crate::gates::{ANSWER_SCHEMA, HALLUCINATION_SCHEMA, RELEVANCE_SCHEMA};
use crate::router::ROUTE_SCHEMA;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn next_sticky<T: Clone>(queue: &mut VecDeque<T>) -> Option<T> {
    if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    }
}

/// What a recorded model call was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallKind {
    Invoke,
    Structured(String),
    Stream,
}

#[derive(Debug, Clone)]
pub struct ModelCall {
    pub kind: CallKind,
    pub prompt: Prompt,
}

#[derive(Default)]
struct Script {
    structured: HashMap<String, VecDeque<Value>>,
    texts: VecDeque<String>,
    streams: VecDeque<Vec<String>>,
}

/// Chat model that answers from a script.
///
/// Structured calls are keyed by schema name, so route, relevance,
/// hallucination, and adequacy answers are scripted independently.
#[derive(Default)]
pub struct ScriptedChatModel {
    script: Mutex<Script>,
    calls: Mutex<Vec<ModelCall>>,
    failure: Option<String>,
}

impl ScriptedChatModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A model whose every call fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    fn script_mut(&mut self) -> &mut Script {
        self.script.get_mut().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a raw structured answer for the schema called `name`.
    pub fn structured(mut self, name: &str, value: Value) -> Self {
        self.script_mut()
            .structured
            .entry(name.to_string())
            .or_default()
            .push_back(value);
        self
    }

    pub fn route(self, datasource: Datasource) -> Self {
        self.structured(ROUTE_SCHEMA, json!({ "datasource": datasource.as_str() }))
    }

    /// Queue a route answer that need not be a valid datasource.
    pub fn route_raw(self, raw: &str) -> Self {
        self.structured(ROUTE_SCHEMA, json!({ "datasource": raw }))
    }

    pub fn relevance(self, verdict: Verdict) -> Self {
        self.structured(RELEVANCE_SCHEMA, json!({ "binary_score": verdict.as_str() }))
    }

    pub fn hallucination(self, verdict: Verdict) -> Self {
        self.structured(
            HALLUCINATION_SCHEMA,
            json!({ "binary_score": verdict.as_str() }),
        )
    }

    pub fn adequacy(self, verdict: Verdict) -> Self {
        self.structured(ANSWER_SCHEMA, json!({ "binary_score": verdict.as_str() }))
    }

    /// Queue a plain completion (used by the question rewriter).
    pub fn rewrite(mut self, text: &str) -> Self {
        self.script_mut().texts.push_back(text.to_string());
        self
    }

    /// Queue a streamed answer split into the given tokens.
    pub fn answer_tokens(mut self, tokens: &[&str]) -> Self {
        self.script_mut()
            .streams
            .push_back(tokens.iter().map(|t| t.to_string()).collect());
        self
    }

    /// Queue a streamed answer, one token per word.
    pub fn answer(self, text: &str) -> Self {
        let tokens: Vec<&str> = text.split_inclusive(' ').collect();
        self.answer_tokens(&tokens)
    }

    pub fn calls(&self) -> Vec<ModelCall> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Number of recorded calls of `kind`.
    pub fn count(&self, kind: &CallKind) -> usize {
        lock(&self.calls).iter().filter(|c| &c.kind == kind).count()
    }

    /// Number of structured calls against schema `name`.
    pub fn structured_count(&self, name: &str) -> usize {
        self.count(&CallKind::Structured(name.to_string()))
    }

    pub fn last_prompt(&self) -> Option<Prompt> {
        lock(&self.calls).last().map(|c| c.prompt.clone())
    }

    fn record(&self, kind: CallKind, prompt: &Prompt) -> Result<()> {
        lock(&self.calls).push(ModelCall {
            kind,
            prompt: prompt.clone(),
        });
        match &self.failure {
            Some(message) => Err(RagError::Model(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ChatModel for ScriptedChatModel {
    async fn invoke(&self, prompt: &Prompt) -> Result<String> {
        self.record(CallKind::Invoke, prompt)?;
        next_sticky(&mut lock(&self.script).texts)
            .ok_or_else(|| RagError::Model("no scripted completion".to_string()))
    }

    async fn invoke_structured(&self, prompt: &Prompt, schema: &OutputSchema) -> Result<Value> {
        self.record(CallKind::Structured(schema.name.clone()), prompt)?;
        let mut script = lock(&self.script);
        script
            .structured
            .get_mut(&schema.name)
            .and_then(next_sticky)
            .ok_or_else(|| RagError::Model(format!("no scripted answer for {}", schema.name)))
    }

    async fn stream(&self, prompt: &Prompt) -> Result<TokenStream> {
        self.record(CallKind::Stream, prompt)?;
        let tokens = next_sticky(&mut lock(&self.script).streams)
            .ok_or_else(|| RagError::Model("no scripted answer stream".to_string()))?;
        Ok(Box::pin(futures::stream::iter(
            tokens.into_iter().map(Ok::<String, RagError>),
        )))
    }
}

/// Retriever returning scripted result lists.
#[derive(Default)]
pub struct StaticRetriever {
    results: Mutex<VecDeque<Vec<Document>>>,
    queries: Mutex<Vec<String>>,
    failure: Option<String>,
}

impl StaticRetriever {
    pub fn new(documents: Vec<Document>) -> Self {
        Self::empty().then(documents)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// Queue another result list.
    pub fn then(mut self, documents: Vec<Document>) -> Self {
        self.results
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(documents);
        self
    }

    pub fn queries(&self) -> Vec<String> {
        lock(&self.queries).clone()
    }
}

#[async_trait]
impl Retriever for StaticRetriever {
    async fn search(&self, query: &str) -> Result<Vec<Document>> {
        lock(&self.queries).push(query.to_string());
        if let Some(message) = &self.failure {
            return Err(RagError::Retrieval(message.clone()));
        }
        let mut results = lock(&self.results);
        Ok(next_sticky(&mut *results).unwrap_or_default())
    }
}

/// Web search returning scripted raw hits.
#[derive(Default)]
pub struct StaticWebSearch {
    results: Mutex<VecDeque<Vec<Value>>>,
    queries: Mutex<Vec<String>>,
    failure: Option<String>,
}

impl StaticWebSearch {
    pub fn new(hits: Vec<Value>) -> Self {
        Self::empty().then(hits)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn then(mut self, hits: Vec<Value>) -> Self {
        self.results
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(hits);
        self
    }

    pub fn queries(&self) -> Vec<String> {
        lock(&self.queries).clone()
    }
}

#[async_trait]
impl WebSearch for StaticWebSearch {
    async fn search(&self, query: &str) -> Result<Vec<Value>> {
        lock(&self.queries).push(query.to_string());
        if let Some(message) = &self.failure {
            return Err(RagError::WebSearch(message.clone()));
        }
        let mut results = lock(&self.results);
        Ok(next_sticky(&mut *results).unwrap_or_default())
    }
}
