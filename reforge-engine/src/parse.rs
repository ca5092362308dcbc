//! # Response Parser
//!
//! Splits a raw model response into one of three outcomes: a terminal
//! sentinel, a single extracted code block, or plain conversational text.

/// Terminal sentinel: its presence anywhere in the response ends the session,
/// regardless of whether a code block is also present.
pub const SENTINEL_TOKEN: &str = "FINAL_ANSWER";

/// What a model response turned out to be
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedResponse {
    /// The sentinel token was present; no extraction, no execution
    Final,
    /// The first fenced code block, language tag and whitespace stripped
    Code(String),
    /// No fence found; a conversational turn with no execution
    Chat,
}

/// Parse a complete model response (streamed deltas must already be joined)
pub fn parse_response(text: &str) -> ParsedResponse {
    if text.contains(SENTINEL_TOKEN) {
        return ParsedResponse::Final;
    }

    match extract_code_block(text) {
        Some(snippet) => ParsedResponse::Code(snippet),
        None => ParsedResponse::Chat,
    }
}

/// Extract the first triple-backtick fenced block, if the fence is closed
fn extract_code_block(text: &str) -> Option<String> {
    let mut parts = text.split("```");
    parts.next()?;
    let inside = parts.next()?;
    // No closing fence means no block
    parts.next()?;

    let body = strip_language_tag(inside);
    let trimmed = body.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Drop an optional language tag sitting between the opening fence and the
/// first newline (e.g. ```python)
fn strip_language_tag(block: &str) -> &str {
    if let Some((first_line, rest)) = block.split_once('\n') {
        let tag = first_line.trim();
        let is_tag = !tag.is_empty()
            && tag.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '-' | '.'));
        if is_tag {
            return rest;
        }
    }
    block
}
