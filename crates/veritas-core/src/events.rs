use serde::{Deserialize, Serialize};

/// Kind of an event surfaced while a turn is being answered.
///
/// Events of one turn arrive in causal order:
/// `init` -> (`retrieve` | `search`)? -> `start` -> `chunk`* -> (`end` and a
/// new attempt | `final`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// The question was received and is being routed.
    Init,
    /// The knowledge base is being searched.
    Retrieve,
    /// The web is being searched.
    Search,
    /// A new answer attempt begins.
    Start,
    /// One streamed fragment of the current attempt.
    Chunk,
    /// The current attempt was rejected; another one follows.
    End,
    /// No more attempts will be made.
    Final,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Init => "init",
            EventKind::Retrieve => "retrieve",
            EventKind::Search => "search",
            EventKind::Start => "start",
            EventKind::Chunk => "chunk",
            EventKind::End => "end",
            EventKind::Final => "final",
        }
    }
}

/// A typed event on the answer stream.
///
/// `generate_id` is the attempt counter within the turn: `0` before the
/// first generation, then 1-based.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub generate_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl StreamEvent {
    pub fn new(kind: EventKind, generate_id: u32) -> Self {
        Self {
            kind,
            generate_id,
            content: None,
        }
    }

    pub fn chunk(generate_id: u32, content: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Chunk,
            generate_id,
            content: Some(content.into()),
        }
    }

    /// Whether this event closes the turn's stream.
    pub fn is_terminal(&self) -> bool {
        self.kind == EventKind::Final
    }

    /// Human-readable rendering used by text front ends.
    pub fn narration(&self) -> &str {
        match self.kind {
            EventKind::Init => "[Thinking...]\n",
            EventKind::Search => "[Searching on web...]\n",
            EventKind::Retrieve => "[Referencing on knowledge base...]\n",
            EventKind::Start => "[Answer]\n",
            EventKind::End => "\n[Re-thinking to find a better answer...]\n",
            EventKind::Final => "",
            EventKind::Chunk => self.content.as_deref().unwrap_or(""),
        }
    }
}
