//! The answering state machine: named nodes and pure transition functions.
//!
//! Edges:
//! - Start -> Retrieve | WebSearch | Generate (by route)
//! - Retrieve -> GradeDocuments
//! - GradeDocuments -> TransformQuery | Generate
//! - TransformQuery -> Retrieve | WebSearch | Generate (by current datasource)
//! - WebSearch -> Generate
//! - Generate -> Generate | TransformQuery | End (by grade)

use std::fmt;

use veritas_core::Datasource;

use crate::error::{RagError, Result};
use crate::state::SessionState;

/// A state of the answering machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Node {
    Start,
    Retrieve,
    GradeDocuments,
    TransformQuery,
    WebSearch,
    Generate,
    End,
}

impl Node {
    pub fn as_str(&self) -> &'static str {
        match self {
            Node::Start => "start",
            Node::Retrieve => "retrieve",
            Node::GradeDocuments => "grade_documents",
            Node::TransformQuery => "transform_query",
            Node::WebSearch => "web_search",
            Node::Generate => "generate",
            Node::End => "end",
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of checking a generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenerationGrade {
    /// Grounded and answers the question, or the attempt ceiling was hit.
    Useful,
    /// Not supported by the evidence; regenerate with the same evidence.
    NotSupported,
    /// Grounded but does not answer; rewrite the question and re-route.
    NotUseful,
}

pub fn route_target(datasource: Datasource) -> Node {
    match datasource {
        Datasource::Vectorstore => Node::Retrieve,
        Datasource::WebSearch => Node::WebSearch,
        Datasource::GenerateDirectly => Node::Generate,
    }
}

/// After relevance filtering: rewrite when nothing survived.
pub fn decide_to_generate(state: &SessionState) -> Node {
    if state.documents.is_empty() {
        Node::TransformQuery
    } else {
        Node::Generate
    }
}

/// After a rewrite, go back to the source chosen earlier in the turn.
pub fn reroute(state: &SessionState) -> Node {
    route_target(state.datasource)
}

pub fn grade_target(grade: GenerationGrade) -> Node {
    match grade {
        GenerationGrade::Useful => Node::End,
        GenerationGrade::NotSupported => Node::Generate,
        GenerationGrade::NotUseful => Node::TransformQuery,
    }
}

/// Whether no further attempts may be made.
pub fn ceiling_reached(state: &SessionState) -> bool {
    state.generate_count >= state.max_generate_count
}

/// Check `from -> to` against the edge table.
pub fn validate_transition(from: Node, to: Node) -> Result<()> {
    let valid = matches!(
        (from, to),
        (Node::Start, Node::Retrieve)
            | (Node::Start, Node::WebSearch)
            | (Node::Start, Node::Generate)
            | (Node::Retrieve, Node::GradeDocuments)
            | (Node::GradeDocuments, Node::TransformQuery)
            | (Node::GradeDocuments, Node::Generate)
            | (Node::TransformQuery, Node::Retrieve)
            | (Node::TransformQuery, Node::WebSearch)
            | (Node::TransformQuery, Node::Generate)
            | (Node::WebSearch, Node::Generate)
            | (Node::Generate, Node::Generate)
            | (Node::Generate, Node::TransformQuery)
            | (Node::Generate, Node::End)
    );

    if valid {
        Ok(())
    } else {
        Err(RagError::InvalidTransition(from, to))
    }
}
