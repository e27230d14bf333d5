use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::VeritasError;

// =============================================================================
// Conversation
// =============================================================================

/// Speaker of a conversation entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a user's conversation log.
///
/// Entries are stored in chronological order as user/assistant pairs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A question with the answer that was given to it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}

// =============================================================================
// Evidence
// =============================================================================

/// A piece of evidence returned by the retriever or the web search.
///
/// `content` is optional: backends occasionally return hits without text.
/// Such documents are skipped when evidence is formatted for a prompt.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Document {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Text of the document, if it has any.
    pub fn text(&self) -> Option<&str> {
        self.content.as_deref()
    }
}

// =============================================================================
// Routing and grading
// =============================================================================

/// Evidence-acquisition strategy chosen for a question.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Datasource {
    /// Search the indexed document corpus.
    Vectorstore,
    /// Search the web.
    WebSearch,
    /// Answer from history or general knowledge, without evidence.
    GenerateDirectly,
}

impl Datasource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Datasource::Vectorstore => "vectorstore",
            Datasource::WebSearch => "web_search",
            Datasource::GenerateDirectly => "generate_directly",
        }
    }

    /// Whether answers on this route are checked against an evidence set.
    pub fn has_evidence(&self) -> bool {
        !matches!(self, Datasource::GenerateDirectly)
    }
}

impl fmt::Display for Datasource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Datasource {
    type Err = VeritasError;

    /// Strict parse: only the three canonical names are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vectorstore" => Ok(Datasource::Vectorstore),
            "web_search" => Ok(Datasource::WebSearch),
            "generate_directly" => Ok(Datasource::GenerateDirectly),
            other => Err(VeritasError::InvalidValue {
                field: "datasource".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Binary verdict of a quality gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Yes,
    No,
}

impl Verdict {
    pub fn is_yes(&self) -> bool {
        matches!(self, Verdict::Yes)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Yes => "yes",
            Verdict::No => "no",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verdict {
    type Err = VeritasError;

    /// Accepts `yes` / `no` in any letter case, surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim();
        if normalized.eq_ignore_ascii_case("yes") {
            Ok(Verdict::Yes)
        } else if normalized.eq_ignore_ascii_case("no") {
            Ok(Verdict::No)
        } else {
            Err(VeritasError::InvalidValue {
                field: "binary_score".to_string(),
                value: s.to_string(),
            })
        }
    }
}
