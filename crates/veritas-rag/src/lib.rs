//! Adaptive retrieval-augmented answering for Veritas.
//!
//! Routes each question to the knowledge base, the web, or straight to the
//! model, grades what comes back, and retries until an answer is grounded
//! and on topic or the attempt ceiling is hit.

pub mod collaborators;
pub mod error;
pub mod gates;
pub mod generation;
pub mod graph;
pub mod history;
pub mod mock;
pub mod nodes;
pub mod orchestrator;
pub mod persistence;
pub mod prompts;
pub mod router;
pub mod sink;
pub mod state;

pub use collaborators::{
    ChatModel, Collaborators, OutputSchema, Prompt, Retriever, TokenStream, WebSearch,
};
pub use error::RagError;
pub use gates::QualityGates;
pub use graph::{GenerationGrade, Node};
pub use orchestrator::{Orchestrator, RagConfig, TurnOutcome};
pub use persistence::HistoryWriter;
pub use router::{QueryRewriter, RouteClassifier};
pub use sink::{EventItem, EventSink};
pub use state::{SessionState, StatePatch};
