//! Transcript boundary adapter.
//!
//! The host chat application hands over messages in loosely-typed JSON with
//! two accepted spellings for the content field (`mes` else `content`) and
//! two accepted role shapes (`is_user: bool` else `role == "user"`). This
//! adapter maps either shape into one internal [`ChatMessage`] record before
//! the engine sees anything, so the two-shape ambiguity never leaks into
//! scanning or parsing logic.

use serde_json::Value;

/// One chat message, in the single internal shape the engine operates on.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub text: String,
    pub is_user: bool,
    pub speaker: String,
}

impl ChatMessage {
    pub fn new(text: impl Into<String>, is_user: bool, speaker: impl Into<String>) -> Self {
        ChatMessage { text: text.into(), is_user, speaker: speaker.into() }
    }

    /// Adapt one duck-typed host message. Returns `None` when no content
    /// field is present in either accepted spelling.
    pub fn from_value(value: &Value) -> Option<ChatMessage> {
        let text = value
            .get("mes")
            .and_then(Value::as_str)
            .or_else(|| value.get("content").and_then(Value::as_str))?
            .to_string();

        let is_user = value
            .get("is_user")
            .and_then(Value::as_bool)
            .or_else(|| value.get("role").and_then(Value::as_str).map(|r| r == "user"))
            .unwrap_or(false);

        let speaker = value.get("name").and_then(Value::as_str).unwrap_or_default().to_string();

        Some(ChatMessage { text, is_user, speaker })
    }
}

/// Adapt a whole host transcript. Returns `None` when the collection is
/// absent or not an array; individual malformed entries are skipped.
pub fn adapt_messages(value: &Value) -> Option<Vec<ChatMessage>> {
    let entries = value.as_array()?;
    Some(entries.iter().filter_map(ChatMessage::from_value).collect())
}

/// An auxiliary lore entry scanned alongside the transcript.
///
/// Lore entries carry no message-index provenance; modules extracted from
/// them always get index -1 and the `worldbook` source tag.
#[derive(Debug, Clone)]
pub struct LoreEntry {
    pub content: String,
    pub comment: String,
}

impl LoreEntry {
    pub fn new(content: impl Into<String>, comment: impl Into<String>) -> Self {
        LoreEntry { content: content.into(), comment: comment.into() }
    }
}
