//! Streaming answer generation.

use futures::StreamExt;
use tracing::{debug, info};
use veritas_core::{EventKind, StreamEvent};

use crate::collaborators::Prompt;
use crate::error::Result;
use crate::history::render_history;
use crate::nodes::{format_documents, NodeContext};
use crate::prompts::{fill, template_len, GENERATE_PROMPT};
use crate::state::{SessionState, StatePatch};

/// Build the generation prompt for the current state.
///
/// History is windowed against whatever the question, template, and
/// evidence leave of the input budget.
pub fn build_prompt(state: &SessionState, max_input_length: usize) -> Prompt {
    let context = format_documents(&state.documents);
    let history = render_history(
        &state.conversation_history,
        max_input_length,
        state.question.chars().count(),
        template_len(GENERATE_PROMPT),
        context.chars().count(),
    );
    Prompt::user(fill(
        GENERATE_PROMPT,
        &[
            ("question", &state.question),
            ("context", &context),
            ("history", &history),
        ],
    ))
}

/// Stream a new answer attempt.
///
/// Emits `start` before the first token and one `chunk` per token, tagged
/// with the new attempt number. The full text becomes `generation`.
pub async fn generate(state: &SessionState, ctx: &NodeContext<'_>) -> Result<StatePatch> {
    let attempt = state.generate_count + 1;
    let prompt = build_prompt(state, ctx.config.max_input_length);

    ctx.sink.mark(EventKind::Start, attempt).await;
    let mut tokens = ctx.collaborators.chat_model.stream(&prompt).await?;
    let mut generation = String::new();
    let mut chunks = 0usize;
    while let Some(token) = tokens.next().await {
        let token = token?;
        generation.push_str(&token);
        chunks += 1;
        ctx.sink.emit(StreamEvent::chunk(attempt, token)).await;
    }
    debug!(attempt, chunks, "Generation stream finished");
    info!(attempt, datasource = %state.datasource, "Answer generated");

    Ok(StatePatch::new()
        .generation(generation)
        .generate_count(attempt)
        .max_generate_count(ctx.config.max_generate_count))
}
