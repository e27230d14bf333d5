//! Conversation history windowing.
//!
//! Budgets are measured in characters (Unicode scalar values), not tokens.
//! For common encodings a token spans one or more characters, so a
//! character budget over-estimates usage and errs on the safe side.
//!
//! History is always handled as user/assistant pairs: entries are evicted
//! two at a time, oldest first, so an even-length history stays even.

use veritas_core::{QaPair, Role, Turn};

/// Sum of content lengths over all entries.
pub fn context_length(history: &[Turn]) -> usize {
    history.iter().map(|t| t.content.chars().count()).sum()
}

fn line_prefix(index: usize, role: Role) -> String {
    format!("Turn {} [{}]: ", index / 2 + 1, role)
}

/// Length of `render_turns(history)` without building the string.
fn rendered_len(history: &[Turn]) -> usize {
    let separators = history.len().saturating_sub(1);
    history
        .iter()
        .enumerate()
        .map(|(i, t)| line_prefix(i, t.role).chars().count() + t.content.chars().count())
        .sum::<usize>()
        + separators
}

/// Render entries as `Turn {n} [{role}]: {content}` lines, numbered per pair.
pub fn render_turns(history: &[Turn]) -> String {
    history
        .iter()
        .enumerate()
        .map(|(i, t)| format!("{}{}", line_prefix(i, t.role), t.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render the newest slice of `history` that fits what is left of
/// `max_input` after the question, prompt template, and evidence text.
///
/// Returns an empty string when the history is empty, when nothing is left
/// of the budget, or when even the newest pair does not fit. The returned
/// text is never longer than the remaining budget.
pub fn render_history(
    history: &[Turn],
    max_input: usize,
    question_len: usize,
    prompt_len: usize,
    context_len: usize,
) -> String {
    let budget = max_input
        .saturating_sub(question_len)
        .saturating_sub(prompt_len)
        .saturating_sub(context_len);
    let used = question_len
        .saturating_add(prompt_len)
        .saturating_add(context_len);
    if history.is_empty() || used >= max_input {
        return String::new();
    }

    let mut window = history;
    while rendered_len(window) > budget {
        if window.len() > 2 {
            window = &window[2..];
        } else {
            return String::new();
        }
    }
    render_turns(window)
}

/// Append a question/answer pair and evict the oldest pairs while the total
/// content length exceeds `max_input`.
///
/// The newest pair is always kept, even when it alone is over the limit.
pub fn append_turn(history: &[Turn], question: &str, answer: &str, max_input: usize) -> Vec<Turn> {
    let mut updated = Vec::with_capacity(history.len() + 2);
    updated.extend_from_slice(history);
    updated.push(Turn::user(question));
    updated.push(Turn::assistant(answer));

    let mut total = context_length(&updated);
    let mut start = 0;
    while total > max_input && updated.len() - start > 2 {
        total -= context_length(&updated[start..start + 2]);
        start += 2;
    }
    updated.drain(..start);
    updated
}

/// Drop a trailing unpaired entry so the history has even length.
pub fn normalize_pairs(mut history: Vec<Turn>) -> Vec<Turn> {
    if history.len() % 2 == 1 {
        history.pop();
    }
    history
}

/// Group a history into question/answer pairs, oldest first.
pub fn pair_up(history: &[Turn]) -> Vec<QaPair> {
    history
        .chunks_exact(2)
        .map(|pair| QaPair {
            question: pair[0].content.clone(),
            answer: pair[1].content.clone(),
        })
        .collect()
}
