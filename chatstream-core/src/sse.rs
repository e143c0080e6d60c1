//! Per-line parser for the chat-completions event stream.
//!
//! Only `data:` lines carry information. Each payload is either the `[DONE]`
//! sentinel or a JSON record shaped like
//! `{"choices":[{"delta"|"message":{"content","reasoning_content"},"finish_reason"}]}`.
//! Anything else is framing noise and parses to `None`.

use serde::Deserialize;
use serde_json::Value;

use crate::model::StreamChunk;

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";
static NULL: Value = Value::Null;

// ---- Wire structs ----
// Choices are kept as raw values so a badly shaped sibling choice cannot
// poison the first one.
#[derive(Deserialize)]
struct Frame {
    #[serde(default)]
    choices: Option<Vec<Value>>,
}

#[derive(Deserialize)]
struct FrameChoice {
    #[serde(default)]
    delta: Value,
    #[serde(default)]
    message: Value,
    #[serde(default)]
    finish_reason: Value,
}

impl FrameChoice {
    /// `delta` when present, else `message`. Non-object bodies read as empty.
    fn body(&self) -> &Value {
        if self.delta.is_null() { &self.message } else { &self.delta }
    }

    fn field(&self, name: &str) -> &Value {
        self.body().get(name).unwrap_or(&NULL)
    }
}

/// Flattens a content field to text. Strings are kept; arrays contribute their
/// string elements and the string `text` field of object elements, in order.
pub fn normalize_delta_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| match part {
                Value::String(s) => Some(s.as_str()),
                Value::Object(obj) => obj.get("text").and_then(Value::as_str),
                _ => None,
            })
            .collect(),
        _ => String::new(),
    }
}

/// Parses one line of the response body.
pub fn parse_line(line: &str) -> Option<StreamChunk> {
    let payload = line.trim().strip_prefix(DATA_PREFIX)?.trim();
    if payload.is_empty() {
        return None;
    }
    if payload == DONE_SENTINEL {
        return Some(StreamChunk::done());
    }

    let frame: Frame = match serde_json::from_str(payload) {
        Ok(f) => f,
        Err(e) => {
            tracing::trace!(error = %e, "dropping malformed frame");
            return None;
        }
    };

    let first = frame.choices.and_then(|c| c.into_iter().next())?;
    // a non-object first choice has nothing to read
    let choice: FrameChoice = serde_json::from_value(first).ok()?;
    let finish_reason = choice.finish_reason.as_str().map(str::trim).unwrap_or_default();

    let content = normalize_delta_text(choice.field("content"));
    let reasoning = normalize_delta_text(choice.field("reasoning_content"));
    if !content.is_empty() || !reasoning.is_empty() {
        return Some(StreamChunk {
            content,
            reasoning_content: (!reasoning.is_empty()).then_some(reasoning),
            done: false,
        });
    }
    if !finish_reason.is_empty() {
        return Some(StreamChunk::done());
    }
    None
}
