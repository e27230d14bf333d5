//! Error types for the answering engine.

use veritas_core::VeritasError;
use veritas_storage::StorageError;

use crate::graph::Node;

/// Errors that end a turn.
///
/// Quality-gate "no" verdicts are not errors; they steer the state machine.
/// Only contract violations and collaborator failures surface here.
#[derive(Debug, thiserror::Error)]
pub enum RagError {
    #[error("{component} returned an unexpected value: {value}")]
    ContractViolation {
        component: &'static str,
        value: String,
    },
    #[error("model error: {0}")]
    Model(String),
    #[error("retrieval error: {0}")]
    Retrieval(String),
    #[error("web search error: {0}")]
    WebSearch(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("turn exceeded {0} steps without finishing")]
    StepLimitExceeded(u32),
    #[error("invalid transition: {0} -> {1}")]
    InvalidTransition(Node, Node),
    #[error("question cannot be empty")]
    EmptyQuestion,
    #[error("question exceeds maximum length of {0} characters")]
    QuestionTooLong(usize),
}

impl RagError {
    /// Whether the failure is the caller's fault rather than the system's.
    pub fn is_client_error(&self) -> bool {
        matches!(self, RagError::EmptyQuestion | RagError::QuestionTooLong(_))
    }
}

impl From<StorageError> for RagError {
    fn from(err: StorageError) -> Self {
        RagError::Storage(err.to_string())
    }
}

impl From<RagError> for VeritasError {
    fn from(err: RagError) -> Self {
        match err {
            RagError::Model(msg) => VeritasError::Model(msg),
            RagError::Retrieval(msg) => VeritasError::Retrieval(msg),
            RagError::WebSearch(msg) => VeritasError::WebSearch(msg),
            RagError::Storage(msg) => VeritasError::Storage(msg),
            other => VeritasError::Orchestration(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, RagError>;
