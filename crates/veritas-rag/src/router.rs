//! Route classification and question rewriting.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::debug;
use veritas_core::Datasource;

use crate::collaborators::{ChatModel, OutputSchema, Prompt};
use crate::error::{RagError, Result};
use crate::prompts::{fill, REWRITE_SYSTEM, REWRITE_USER, ROUTE_PROMPT};

pub const ROUTE_SCHEMA: &str = "route_query";

pub fn route_schema() -> OutputSchema {
    OutputSchema {
        name: ROUTE_SCHEMA.to_string(),
        description: "Route a user query to the most relevant datasource.".to_string(),
        schema: json!({
            "type": "object",
            "properties": {
                "datasource": {
                    "type": "string",
                    "enum": ["vectorstore", "web_search", "generate_directly"],
                    "description": "Given a user question choose to route it to web search, a vectorstore, or direct generation.",
                }
            },
            "required": ["datasource"],
            "additionalProperties": false,
        }),
    }
}

/// Read the `datasource` field of a structured route answer.
pub fn parse_datasource(value: &Value) -> Result<Datasource> {
    let raw = value
        .get("datasource")
        .and_then(Value::as_str)
        .ok_or_else(|| RagError::ContractViolation {
            component: "route_classifier",
            value: value.to_string(),
        })?;
    raw.parse::<Datasource>()
        .map_err(|_| RagError::ContractViolation {
            component: "route_classifier",
            value: raw.to_string(),
        })
}

/// Picks the evidence strategy for a question.
#[derive(Clone)]
pub struct RouteClassifier {
    model: Arc<dyn ChatModel>,
}

impl RouteClassifier {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Classify `question` given the rendered conversation history.
    ///
    /// The model's category is trusted as-is; a value outside the three
    /// known routes fails the turn.
    pub async fn classify(&self, question: &str, history_text: &str) -> Result<Datasource> {
        let system = fill(
            ROUTE_PROMPT,
            &[("history", history_text), ("question", question)],
        );
        let prompt = Prompt::with_system(system, question);
        let value = self
            .model
            .invoke_structured(&prompt, &route_schema())
            .await?;
        let datasource = parse_datasource(&value)?;
        debug!(%datasource, "Question routed");
        Ok(datasource)
    }
}

/// Rewrites a question into a form better suited for retrieval.
#[derive(Clone)]
pub struct QueryRewriter {
    model: Arc<dyn ChatModel>,
}

impl QueryRewriter {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Returns the rewritten question, or `question` itself when the model
    /// comes back empty.
    pub async fn rewrite(&self, question: &str) -> Result<String> {
        let prompt = Prompt::with_system(
            REWRITE_SYSTEM,
            fill(REWRITE_USER, &[("question", question)]),
        );
        let rewritten = self.model.invoke(&prompt).await?;
        let rewritten = rewritten.trim();
        if rewritten.is_empty() {
            debug!("Empty rewrite, keeping previous question");
            return Ok(question.to_string());
        }
        Ok(rewritten.to_string())
    }
}
