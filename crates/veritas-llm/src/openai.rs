//! OpenAI-compatible chat completions client.
//!
//! Works against any server exposing `/chat/completions` with bearer auth,
//! JSON-schema response formats, and SSE streaming.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;
use veritas_core::config::ModelConfig;
use veritas_rag::{ChatModel, OutputSchema, Prompt, TokenStream};

use crate::error::{LlmError, Result};
use crate::http::{build_client, check_status};
use crate::sse::token_stream;

const SERVICE: &str = "chat model";

#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

pub(crate) fn build_messages(prompt: &Prompt) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = &prompt.system {
        messages.push(ChatMessage {
            role: "system",
            content: system.clone(),
        });
    }
    messages.push(ChatMessage {
        role: "user",
        content: prompt.user.clone(),
    });
    messages
}

/// `response_format` payload asking for output matching `schema`.
pub(crate) fn response_format(schema: &OutputSchema) -> Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": schema.name,
            "description": schema.description,
            "schema": schema.schema,
            "strict": true,
        }
    })
}

fn extract_content(response: ChatCompletionResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or(LlmError::EmptyResponse(SERVICE))
}

/// Parse a structured answer. Models sometimes wrap JSON in a code fence.
pub(crate) fn parse_structured(content: &str) -> Result<Value> {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();
    serde_json::from_str(unfenced).map_err(|e| LlmError::decode(SERVICE, e))
}

/// Chat model backed by an OpenAI-compatible HTTP API.
#[derive(Clone)]
pub struct OpenAiChatModel {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenAiChatModel {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.request_timeout_secs)?,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.chat_model.clone(),
            temperature: config.temperature,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request<'a>(
        &'a self,
        prompt: &Prompt,
        response_format: Option<Value>,
        stream: bool,
    ) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &self.model,
            messages: build_messages(prompt),
            temperature: self.temperature,
            response_format,
            stream,
        }
    }

    async fn send(&self, body: &ChatCompletionRequest<'_>) -> Result<reqwest::Response> {
        let mut request = self.client.post(&self.endpoint).json(body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }
        let response = request.send().await?;
        check_status(SERVICE, response).await
    }

    async fn complete(&self, body: &ChatCompletionRequest<'_>) -> Result<String> {
        let parsed: ChatCompletionResponse = self
            .send(body)
            .await?
            .json()
            .await
            .map_err(|e| LlmError::decode(SERVICE, e))?;
        extract_content(parsed)
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn invoke(&self, prompt: &Prompt) -> veritas_rag::error::Result<String> {
        debug!(model = %self.model, chars = prompt.char_len(), "Chat completion");
        self.complete(&self.request(prompt, None, false))
            .await
            .map_err(LlmError::into_model)
    }

    async fn invoke_structured(
        &self,
        prompt: &Prompt,
        schema: &OutputSchema,
    ) -> veritas_rag::error::Result<Value> {
        debug!(model = %self.model, schema = %schema.name, "Structured completion");
        let body = self.request(prompt, Some(response_format(schema)), false);
        let content = self.complete(&body).await.map_err(LlmError::into_model)?;
        parse_structured(&content).map_err(LlmError::into_model)
    }

    async fn stream(&self, prompt: &Prompt) -> veritas_rag::error::Result<TokenStream> {
        debug!(model = %self.model, chars = prompt.char_len(), "Streaming completion");
        let response = self
            .send(&self.request(prompt, None, true))
            .await
            .map_err(LlmError::into_model)?;
        Ok(token_stream(response.bytes_stream()))
    }
}
