//! Per-turn session state and the patches nodes return.

use veritas_core::{Datasource, Document, Turn};

/// Working state of one turn.
///
/// Created fresh for each question and passed by value between steps; nodes
/// never mutate it directly but return a [`StatePatch`].
#[derive(Clone, Debug, PartialEq)]
pub struct SessionState {
    /// Working question; replaced by rewrites.
    pub question: String,
    /// The question as the user asked it. Logged to history.
    pub original_question: String,
    /// Last routing decision.
    pub datasource: Datasource,
    /// Evidence for the current attempt.
    pub documents: Vec<Document>,
    /// Latest full answer.
    pub generation: String,
    pub generate_count: u32,
    pub max_generate_count: u32,
    /// History loaded at turn start; always even length.
    pub conversation_history: Vec<Turn>,
    pub user_id: String,
}

impl SessionState {
    pub fn new(
        question: impl Into<String>,
        user_id: impl Into<String>,
        conversation_history: Vec<Turn>,
        max_generate_count: u32,
    ) -> Self {
        let question = question.into();
        Self {
            original_question: question.clone(),
            question,
            datasource: Datasource::GenerateDirectly,
            documents: Vec::new(),
            generation: String::new(),
            generate_count: 0,
            max_generate_count,
            conversation_history,
            user_id: user_id.into(),
        }
    }

    /// Merge `patch` into the state. Fields the patch leaves unset are kept.
    pub fn apply(self, patch: StatePatch) -> Self {
        Self {
            question: patch.question.unwrap_or(self.question),
            datasource: patch.datasource.unwrap_or(self.datasource),
            documents: patch.documents.unwrap_or(self.documents),
            generation: patch.generation.unwrap_or(self.generation),
            generate_count: patch.generate_count.unwrap_or(self.generate_count),
            max_generate_count: patch.max_generate_count.unwrap_or(self.max_generate_count),
            ..self
        }
    }
}

/// Partial update produced by a node.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StatePatch {
    pub question: Option<String>,
    pub datasource: Option<Datasource>,
    pub documents: Option<Vec<Document>>,
    pub generation: Option<String>,
    pub generate_count: Option<u32>,
    pub max_generate_count: Option<u32>,
}

impl StatePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn question(mut self, question: impl Into<String>) -> Self {
        self.question = Some(question.into());
        self
    }

    pub fn datasource(mut self, datasource: Datasource) -> Self {
        self.datasource = Some(datasource);
        self
    }

    pub fn documents(mut self, documents: Vec<Document>) -> Self {
        self.documents = Some(documents);
        self
    }

    pub fn generation(mut self, generation: impl Into<String>) -> Self {
        self.generation = Some(generation.into());
        self
    }

    pub fn generate_count(mut self, count: u32) -> Self {
        self.generate_count = Some(count);
        self
    }

    pub fn max_generate_count(mut self, max: u32) -> Self {
        self.max_generate_count = Some(max);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> SessionState {
        SessionState::new(
            "what is agent memory?",
            "default",
            vec![Turn::user("hi"), Turn::assistant("hello")],
            15,
        )
    }

    #[test]
    fn test_new_state() {
        let s = state();
        assert_eq!(s.question, s.original_question);
        assert_eq!(s.generate_count, 0);
        assert_eq!(s.max_generate_count, 15);
        assert!(s.documents.is_empty());
        assert_eq!(s.conversation_history.len(), 2);
    }

    #[test]
    fn test_empty_patch_is_identity() {
        let s = state();
        assert_eq!(s.clone().apply(StatePatch::new()), s);
    }

    #[test]
    fn test_patch_replaces_set_fields_only() {
        let s = state().apply(
            StatePatch::new()
                .question("rewritten")
                .datasource(Datasource::Vectorstore)
                .documents(vec![Document::new("d")]),
        );
        assert_eq!(s.question, "rewritten");
        assert_eq!(s.original_question, "what is agent memory?");
        assert_eq!(s.datasource, Datasource::Vectorstore);
        assert_eq!(s.documents.len(), 1);
        assert_eq!(s.generation, "");
    }

    #[test]
    fn test_documents_are_replaced_not_appended() {
        let s = state()
            .apply(StatePatch::new().documents(vec![Document::new("a"), Document::new("b")]))
            .apply(StatePatch::new().documents(vec![Document::new("c")]));
        assert_eq!(s.documents, vec![Document::new("c")]);
    }

    #[test]
    fn test_generation_patch() {
        let s = state().apply(
            StatePatch::new()
                .generation("answer")
                .generate_count(1)
                .max_generate_count(3),
        );
        assert_eq!(s.generation, "answer");
        assert_eq!(s.generate_count, 1);
        assert_eq!(s.max_generate_count, 3);
    }
}
