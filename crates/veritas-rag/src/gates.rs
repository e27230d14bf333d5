//! Quality gates: binary classifiers over evidence and generations.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::debug;
use veritas_core::{Document, Verdict};

use crate::collaborators::{ChatModel, OutputSchema, Prompt};
use crate::error::{RagError, Result};
use crate::nodes::format_documents;
use crate::prompts::{
    fill, ANSWER_SYSTEM, ANSWER_USER, HALLUCINATION_SYSTEM, HALLUCINATION_USER, RELEVANCE_SYSTEM,
    RELEVANCE_USER,
};

pub const RELEVANCE_SCHEMA: &str = "grade_documents";
pub const HALLUCINATION_SCHEMA: &str = "grade_hallucinations";
pub const ANSWER_SCHEMA: &str = "grade_answer";

/// Structured-output schema with a single `binary_score` field.
pub fn binary_score_schema(name: &str, description: &str) -> OutputSchema {
    OutputSchema {
        name: name.to_string(),
        description: description.to_string(),
        schema: json!({
            "type": "object",
            "properties": {
                "binary_score": {
                    "type": "string",
                    "enum": ["yes", "no"],
                    "description": description,
                }
            },
            "required": ["binary_score"],
            "additionalProperties": false,
        }),
    }
}

/// Read the `binary_score` field of a structured answer.
///
/// Anything but `yes`/`no` is a contract violation of `component`.
pub fn parse_binary_score(component: &'static str, value: &Value) -> Result<Verdict> {
    let raw = value
        .get("binary_score")
        .and_then(Value::as_str)
        .ok_or_else(|| RagError::ContractViolation {
            component,
            value: value.to_string(),
        })?;
    raw.parse::<Verdict>()
        .map_err(|_| RagError::ContractViolation {
            component,
            value: raw.to_string(),
        })
}

/// The three gates of the answering loop, sharing one chat model.
#[derive(Clone)]
pub struct QualityGates {
    model: Arc<dyn ChatModel>,
}

impl QualityGates {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Is `document` relevant to `question`?
    ///
    /// A document without text is graded `no` without asking the model.
    pub async fn grade_relevance(&self, question: &str, document: &Document) -> Result<Verdict> {
        let Some(text) = document.text() else {
            debug!("Document without content graded not relevant");
            return Ok(Verdict::No);
        };
        let prompt = Prompt::with_system(
            RELEVANCE_SYSTEM,
            fill(RELEVANCE_USER, &[("document", text), ("question", question)]),
        );
        let schema = binary_score_schema(
            RELEVANCE_SCHEMA,
            "Documents are relevant to the question, 'yes' or 'no'",
        );
        let value = self.model.invoke_structured(&prompt, &schema).await?;
        parse_binary_score("relevance_gate", &value)
    }

    /// Is `generation` supported by `documents`?
    pub async fn grade_hallucination(
        &self,
        documents: &[Document],
        generation: &str,
    ) -> Result<Verdict> {
        let facts = format_documents(documents);
        let prompt = Prompt::with_system(
            HALLUCINATION_SYSTEM,
            fill(
                HALLUCINATION_USER,
                &[("documents", &facts), ("generation", generation)],
            ),
        );
        let schema = binary_score_schema(
            HALLUCINATION_SCHEMA,
            "Answer is grounded in the facts, 'yes' or 'no'",
        );
        let value = self.model.invoke_structured(&prompt, &schema).await?;
        parse_binary_score("hallucination_gate", &value)
    }

    /// Does `generation` answer `question`?
    pub async fn grade_answer(&self, question: &str, generation: &str) -> Result<Verdict> {
        let prompt = Prompt::with_system(
            ANSWER_SYSTEM,
            fill(
                ANSWER_USER,
                &[("question", question), ("generation", generation)],
            ),
        );
        let schema =
            binary_score_schema(ANSWER_SCHEMA, "Answer addresses the question, 'yes' or 'no'");
        let value = self.model.invoke_structured(&prompt, &schema).await?;
        parse_binary_score("answer_gate", &value)
    }
}
