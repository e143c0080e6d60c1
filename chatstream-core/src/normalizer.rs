use serde_json::Value;

use crate::model::{ChatMessage, HistoryMessage, MessageContent, Role};
use crate::sanitize::sanitize_content;

fn normalize_one(msg: &HistoryMessage) -> Option<ChatMessage> {
    let role = Role::parse(&msg.role)?;
    let content = sanitize_content(&msg.content)?;
    // Blank turns break some backends; never send them.
    if let MessageContent::Text(text) = &content
        && text.trim().is_empty()
    {
        return None;
    }
    Some(ChatMessage { role, content })
}

/// Filters a history down to the messages that are safe to send.
/// Rejected entries are omitted; the rest keep their relative order.
pub fn normalize_messages(history: &[HistoryMessage]) -> Vec<ChatMessage> {
    history.iter().filter_map(normalize_one).collect()
}

/// Same as [`normalize_messages`] over a raw JSON array. `null` and
/// malformed entries count as absent; anything but an array yields nothing.
pub fn normalize_history_value(history: &Value) -> Vec<ChatMessage> {
    let Some(entries) = history.as_array() else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(HistoryMessage::from_value)
        .filter_map(|m| normalize_one(&m))
        .collect()
}
