//! Orchestrator: runs the answering state machine for one turn at a time.
//!
//! A turn loads the user's history, walks the graph from `Start` until
//! `End`, streams typed events to the caller, and hands the updated history
//! to the background writers once an answer is accepted.

use std::sync::Arc;

use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;
use veritas_core::{EventKind, Turn, VeritasConfig};
use veritas_storage::ConversationStore;

use crate::collaborators::Collaborators;
use crate::error::{RagError, Result};
use crate::gates::QualityGates;
use crate::generation;
use crate::graph::{
    ceiling_reached, decide_to_generate, grade_target, reroute, route_target, validate_transition,
    GenerationGrade, Node,
};
use crate::history::{append_turn, normalize_pairs};
use crate::nodes::{self, NodeContext};
use crate::persistence::HistoryWriter;
use crate::router::{QueryRewriter, RouteClassifier};
use crate::sink::{EventItem, EventSink};
use crate::state::SessionState;

/// Engine settings derived from [`VeritasConfig`].
#[derive(Debug, Clone)]
pub struct RagConfig {
    /// Total prompt budget in characters.
    pub max_input_length: usize,
    /// Answer attempts per turn before the last one is accepted as is.
    pub max_generate_count: u32,
    /// Node executions per turn before the turn is aborted.
    pub max_steps: u32,
    /// Capacity of the streaming event channel.
    pub event_buffer: usize,
    pub max_question_chars: usize,
    pub default_user_id: String,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            max_input_length: 40_960,
            max_generate_count: 15,
            max_steps: 100,
            event_buffer: 256,
            max_question_chars: 4000,
            default_user_id: "default".to_string(),
        }
    }
}

impl RagConfig {
    pub fn from_config(config: &VeritasConfig) -> Self {
        Self {
            max_input_length: config.model.max_input_length,
            max_generate_count: config.graph.max_generate_count,
            max_steps: config.graph.max_steps,
            event_buffer: config.graph.event_buffer,
            max_question_chars: config.api.max_question_chars,
            default_user_id: config.general.default_user_id.clone(),
        }
    }
}

/// Result of a finished turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// The accepted answer.
    pub generation: String,
    /// Attempts made.
    pub generate_count: u32,
    /// The attempt ceiling ended the turn; the answer was not verified.
    pub exhausted: bool,
}

/// Runs the answering state machine.
pub struct Orchestrator {
    collaborators: Collaborators,
    gates: QualityGates,
    router: RouteClassifier,
    rewriter: QueryRewriter,
    store: Arc<dyn ConversationStore>,
    writer: Arc<HistoryWriter>,
    config: RagConfig,
}

impl Orchestrator {
    pub fn new(
        collaborators: Collaborators,
        store: Arc<dyn ConversationStore>,
        writer: Arc<HistoryWriter>,
        config: RagConfig,
    ) -> Self {
        let model = Arc::clone(&collaborators.chat_model);
        Self {
            gates: QualityGates::new(Arc::clone(&model)),
            router: RouteClassifier::new(Arc::clone(&model)),
            rewriter: QueryRewriter::new(model),
            collaborators,
            store,
            writer,
            config,
        }
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn writer(&self) -> &Arc<HistoryWriter> {
        &self.writer
    }

    fn resolve_user<'a>(&'a self, user_id: Option<&'a str>) -> &'a str {
        match user_id.map(str::trim) {
            Some(id) if !id.is_empty() => id,
            _ => &self.config.default_user_id,
        }
    }

    /// Reject empty or oversized questions before any work is done.
    pub fn validate_question(&self, question: &str) -> Result<()> {
        if question.trim().is_empty() {
            return Err(RagError::EmptyQuestion);
        }
        if question.chars().count() > self.config.max_question_chars {
            return Err(RagError::QuestionTooLong(self.config.max_question_chars));
        }
        Ok(())
    }

    /// Stored history for a user, trimmed to whole pairs.
    pub async fn history(&self, user_id: Option<&str>) -> Result<Vec<Turn>> {
        let user_id = self.resolve_user(user_id);
        let turns = self.store.load(user_id).await?;
        Ok(normalize_pairs(turns))
    }

    /// History used to seed a turn. An unreadable log starts the turn fresh.
    async fn load_history(&self, user_id: &str) -> Vec<Turn> {
        match self.store.load(user_id).await {
            Ok(turns) => normalize_pairs(turns),
            Err(e) => {
                warn!(user_id, error = %e, "Failed to load conversation history, starting empty");
                Vec::new()
            }
        }
    }

    /// Answer without streaming.
    pub async fn answer(&self, question: &str, user_id: Option<&str>) -> Result<TurnOutcome> {
        self.run_turn(question, user_id, EventSink::disabled()).await
    }

    /// Answer while streaming events.
    ///
    /// The turn runs on its own task. Events arrive in causal order; if the
    /// turn fails, the error is the last item. Dropping the stream does not
    /// cancel the turn.
    pub fn stream(
        self: Arc<Self>,
        question: String,
        user_id: Option<String>,
    ) -> ReceiverStream<EventItem> {
        let (sink, rx) = EventSink::channel(self.config.event_buffer);
        tokio::spawn(async move {
            let result = self
                .run_turn(&question, user_id.as_deref(), sink.clone())
                .await;
            if let Err(e) = result {
                sink.fail(e).await;
            }
        });
        ReceiverStream::new(rx)
    }

    /// Run one turn to completion, emitting events into `sink`.
    pub async fn run_turn(
        &self,
        question: &str,
        user_id: Option<&str>,
        sink: EventSink,
    ) -> Result<TurnOutcome> {
        self.validate_question(question)?;
        let user_id = self.resolve_user(user_id).to_string();
        let span = info_span!("turn", turn_id = %Uuid::new_v4(), user_id = %user_id);

        async {
            let history = self.load_history(&user_id).await;
            debug!(entries = history.len(), "History loaded");
            let state = SessionState::new(
                question,
                user_id.clone(),
                history,
                self.config.max_generate_count,
            );
            self.drive(state, &sink).await
        }
        .instrument(span)
        .await
    }

    async fn drive(&self, mut state: SessionState, sink: &EventSink) -> Result<TurnOutcome> {
        let ctx = NodeContext {
            collaborators: &self.collaborators,
            gates: &self.gates,
            router: &self.router,
            rewriter: &self.rewriter,
            config: &self.config,
            sink,
        };

        let mut node = Node::Start;
        let mut steps = 0u32;
        let mut exhausted = false;

        while node != Node::End {
            steps += 1;
            if steps > self.config.max_steps {
                warn!(steps = self.config.max_steps, "Step limit exceeded");
                return Err(RagError::StepLimitExceeded(self.config.max_steps));
            }
            debug!(node = %node, step = steps, "Entering node");

            let next = match node {
                Node::Start => {
                    let patch = nodes::route(&state, &ctx).await?;
                    state = state.apply(patch);
                    route_target(state.datasource)
                }
                Node::Retrieve => {
                    let patch = nodes::retrieve(&state, &ctx).await?;
                    state = state.apply(patch);
                    Node::GradeDocuments
                }
                Node::GradeDocuments => {
                    let patch = nodes::grade_documents(&state, &ctx).await?;
                    state = state.apply(patch);
                    decide_to_generate(&state)
                }
                Node::TransformQuery => {
                    let patch = nodes::transform_query(&state, &ctx).await?;
                    state = state.apply(patch);
                    reroute(&state)
                }
                Node::WebSearch => {
                    let patch = nodes::web_search(&state, &ctx).await?;
                    state = state.apply(patch);
                    Node::Generate
                }
                Node::Generate => {
                    let patch = generation::generate(&state, &ctx).await?;
                    state = state.apply(patch);
                    let grade = if ceiling_reached(&state) {
                        info!(
                            attempts = state.generate_count,
                            "Attempt ceiling reached, accepting last answer"
                        );
                        sink.mark(EventKind::Final, state.generate_count).await;
                        exhausted = true;
                        GenerationGrade::Useful
                    } else {
                        nodes::grade_generation(&state, &ctx).await?
                    };
                    if grade == GenerationGrade::Useful {
                        self.persist(&state);
                    }
                    grade_target(grade)
                }
                Node::End => break,
            };

            validate_transition(node, next)?;
            node = next;
        }

        Ok(TurnOutcome {
            generation: state.generation,
            generate_count: state.generate_count,
            exhausted,
        })
    }

    fn persist(&self, state: &SessionState) {
        let turns = append_turn(
            &state.conversation_history,
            &state.original_question,
            &state.generation,
            self.config.max_input_length,
        );
        self.writer.submit(state.user_id.clone(), turns);
    }
}
