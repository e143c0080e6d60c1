use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Accepts exactly the lowercase wire names.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "system" => Some(Self::System),
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ImageUrl {
    pub url: String,
}

/// One element of multimodal message content.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image_url(url: impl Into<String>) -> Self {
        Self::ImageUrl {
            image_url: ImageUrl { url: url.into() },
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl From<&str> for MessageContent {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for MessageContent {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// A history entry as the caller holds it.
///
/// Role and content are loosely typed on purpose: the normalizer decides what
/// is forwarded, so a bad entry is dropped instead of failing the whole history.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HistoryMessage {
    pub role: String,
    #[serde(default)]
    pub content: Value,
}

impl HistoryMessage {
    pub fn new(role: impl Into<String>, content: impl Into<Value>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    /// Reads an entry out of a raw JSON value. Returns `None` for `null`,
    /// non-objects and entries without a string `role`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let role = obj.get("role")?.as_str()?;
        Some(Self {
            role: role.to_string(),
            content: obj.get("content").cloned().unwrap_or(Value::Null),
        })
    }
}

/// A message that survived normalization and goes on the wire.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChatOptions {
    pub temperature: Option<f32>,
}

/// Outbound request body for the chat-completions endpoint.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl ChatRequest {
    /// Builds a streaming request. `stream` is always `true`.
    pub fn streaming(model: impl Into<String>, messages: Vec<ChatMessage>, options: ChatOptions) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: true,
            temperature: options.temperature,
        }
    }
}

/// One unit of incremental output.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct StreamChunk {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
    pub done: bool,
}

impl StreamChunk {
    /// Terminal marker with no content.
    pub fn done() -> Self {
        Self {
            content: String::new(),
            reasoning_content: None,
            done: true,
        }
    }

    pub fn delta(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            reasoning_content: None,
            done: false,
        }
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning_content = Some(reasoning.into());
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.done
    }
}
