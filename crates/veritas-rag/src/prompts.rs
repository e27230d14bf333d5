//! Prompt templates.
//!
//! Templates use `{name}` placeholders filled by [`fill`]. The generate and
//! route templates also feed the history budget, so their raw lengths matter.

/// Answer generation. Sent as a single user message.
pub const GENERATE_PROMPT: &str = "You are an assistant for question-answering tasks.
Use the following pieces of retrieved context or conversation history to answer the question.
If you don't know the answer, just say that you don't know. Use three sentences maximum and keep the answer concise.

Question: {question}
Context: {context}
Conversation History:
{history}
Answer:
";

/// Route classification. Sent as the system message; the question follows
/// as the user message.
pub const ROUTE_PROMPT: &str = "You are an expert at routing a user question to the most appropriate datasource.

The vectorstore contains documents related to agents, prompt engineering, and adversarial attacks.
Use the vectorstore ONLY for questions specifically about these topics.

For all other questions, follow this decision process:
1. If the question can be answered using general knowledge or the Conversation History, generate the answer directly
2. If the question requires up-to-date information or external facts not available in general knowledge or conversation history, use web-search

Special cases:
- Questions about previous interactions, conversation history, or meta-questions about the chat itself should be generated directly
- Questions that reference specific content from the conversation history should be generated directly

Conversation History:
{history}

Question: {question}
";

pub const RELEVANCE_SYSTEM: &str = "You are a grader assessing relevance of a retrieved document to a user question.
If the document contains keyword(s) or semantic meaning related to the user question, grade it as relevant.
It does not need to be a stringent test. The goal is to filter out erroneous retrievals.
Give a binary score 'yes' or 'no' score to indicate whether the document is relevant to the question.";

pub const RELEVANCE_USER: &str = "Retrieved document: \n\n {document} \n\n User question: {question}";

pub const HALLUCINATION_SYSTEM: &str = "You are a grader assessing whether an LLM generation is grounded in / supported by a set of retrieved facts.
Give a binary score 'yes' or 'no'. 'Yes' means that the answer is grounded in / supported by the set of facts.";

pub const HALLUCINATION_USER: &str = "Set of facts: \n\n {documents} \n\n LLM generation: {generation}";

pub const ANSWER_SYSTEM: &str = "You are a grader assessing whether an answer addresses / resolves a question.
Give a binary score 'yes' or 'no'. 'Yes' means that the answer resolves the question.";

pub const ANSWER_USER: &str = "User question: \n\n {question} \n\n LLM generation: {generation}";

pub const REWRITE_SYSTEM: &str = "You are a question re-writer that converts an input question to a better version that is optimized
for vectorstore retrieval. Look at the input and try to reason about the underlying semantic intent / meaning.";

pub const REWRITE_USER: &str =
    "Here is the initial question: \n\n {question} \n Formulate an improved question.";

/// Substitute `{name}` placeholders in a single pass.
///
/// Values are inserted verbatim; braces inside a value are never expanded,
/// so user text cannot inject further placeholders.
pub fn fill(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replaced = after.find('}').and_then(|close| {
            let key = &after[..close];
            vars.iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (close, *value))
        });
        match replaced {
            Some((close, value)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Character length of a template, as used by the history budget.
pub fn template_len(template: &str) -> usize {
    template.chars().count()
}
