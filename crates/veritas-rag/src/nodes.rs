//! Graph nodes other than generation.
//!
//! Each node reads the session state, talks to its collaborator, and
//! returns a [`StatePatch`]. Events are emitted through the turn's sink.

use serde_json::Value;
use tracing::{debug, info};
use veritas_core::{Datasource, Document, EventKind};

use crate::collaborators::Collaborators;
use crate::error::Result;
use crate::gates::QualityGates;
use crate::graph::GenerationGrade;
use crate::history::render_history;
use crate::orchestrator::RagConfig;
use crate::prompts::{template_len, ROUTE_PROMPT};
use crate::router::{QueryRewriter, RouteClassifier};
use crate::sink::EventSink;
use crate::state::{SessionState, StatePatch};

/// Everything a node may use while executing.
pub struct NodeContext<'a> {
    pub collaborators: &'a Collaborators,
    pub gates: &'a QualityGates,
    pub router: &'a RouteClassifier,
    pub rewriter: &'a QueryRewriter,
    pub config: &'a RagConfig,
    pub sink: &'a EventSink,
}

/// Join the text of all documents that have any, separated by blank lines.
pub fn format_documents(documents: &[Document]) -> String {
    documents
        .iter()
        .filter_map(Document::text)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Turn a raw web hit into a document.
///
/// Hits without a string `content` field are kept as their JSON text.
pub fn web_hit_to_document(hit: &Value) -> Document {
    let content = match hit.get("content") {
        Some(Value::String(text)) => text.clone(),
        _ => hit.to_string(),
    };
    let source = hit.get("url").and_then(Value::as_str).map(str::to_string);
    Document {
        content: Some(content),
        source,
    }
}

/// Classify the question and record the chosen datasource.
pub async fn route(state: &SessionState, ctx: &NodeContext<'_>) -> Result<StatePatch> {
    ctx.sink.mark(EventKind::Init, 0).await;
    let history_text = render_history(
        &state.conversation_history,
        ctx.config.max_input_length,
        state.question.chars().count(),
        template_len(ROUTE_PROMPT),
        0,
    );
    let datasource = ctx.router.classify(&state.question, &history_text).await?;
    info!(%datasource, "Route chosen");
    Ok(StatePatch::new().datasource(datasource))
}

pub async fn retrieve(state: &SessionState, ctx: &NodeContext<'_>) -> Result<StatePatch> {
    ctx.sink
        .mark(EventKind::Retrieve, state.generate_count)
        .await;
    let documents = ctx
        .collaborators
        .retriever
        .search(&state.question)
        .await?;
    debug!(count = documents.len(), "Documents retrieved");
    Ok(StatePatch::new()
        .documents(documents)
        .datasource(Datasource::Vectorstore))
}

/// Keep only the documents the relevance gate accepts.
pub async fn grade_documents(state: &SessionState, ctx: &NodeContext<'_>) -> Result<StatePatch> {
    let mut relevant = Vec::with_capacity(state.documents.len());
    for document in &state.documents {
        if ctx
            .gates
            .grade_relevance(&state.question, document)
            .await?
            .is_yes()
        {
            relevant.push(document.clone());
        }
    }
    debug!(
        kept = relevant.len(),
        total = state.documents.len(),
        "Documents graded"
    );
    Ok(StatePatch::new().documents(relevant))
}

pub async fn transform_query(state: &SessionState, ctx: &NodeContext<'_>) -> Result<StatePatch> {
    let better = ctx.rewriter.rewrite(&state.question).await?;
    debug!(question = %better, "Question rewritten");
    Ok(StatePatch::new().question(better))
}

pub async fn web_search(state: &SessionState, ctx: &NodeContext<'_>) -> Result<StatePatch> {
    ctx.sink.mark(EventKind::Search, state.generate_count).await;
    let hits = ctx
        .collaborators
        .web_search
        .search(&state.question)
        .await?;
    let documents: Vec<Document> = hits.iter().map(web_hit_to_document).collect();
    debug!(count = documents.len(), "Web results collected");
    Ok(StatePatch::new()
        .documents(documents)
        .datasource(Datasource::WebSearch))
}

/// Check the latest generation for groundedness, then adequacy.
///
/// Emits `end` when another attempt follows and `final` when the answer is
/// accepted. The attempt ceiling is checked by the caller beforehand.
pub async fn grade_generation(
    state: &SessionState,
    ctx: &NodeContext<'_>,
) -> Result<GenerationGrade> {
    let attempt = state.generate_count;
    let grounded = if state.datasource.has_evidence() {
        ctx.gates
            .grade_hallucination(&state.documents, &state.generation)
            .await?
            .is_yes()
    } else {
        true
    };

    if !grounded {
        info!(attempt, "Generation not grounded in documents, retrying");
        ctx.sink.mark(EventKind::End, attempt).await;
        return Ok(GenerationGrade::NotSupported);
    }

    if ctx
        .gates
        .grade_answer(&state.question, &state.generation)
        .await?
        .is_yes()
    {
        info!(attempt, "Generation addresses question");
        ctx.sink.mark(EventKind::Final, attempt).await;
        Ok(GenerationGrade::Useful)
    } else {
        info!(attempt, "Generation does not address question, rewriting");
        ctx.sink.mark(EventKind::End, attempt).await;
        Ok(GenerationGrade::NotUseful)
    }
}
