use thiserror::Error;

/// Core error type for chatstream.
///
/// Only request/response level faults show up here. Malformed frames, bad
/// content parts and unknown roles are dropped silently by the parser and the
/// normalizer and never become an error.
#[derive(Debug, Error)]
pub enum ChatStreamError {
    #[error("validation failed: {0}")]
    Validation(String),

    /// The endpoint answered with a non-success status.
    #[error("chat API error: {status} - {body}")]
    Transport { status: u16, body: String },

    #[error("protocol error: {0}")]
    Protocol(String),

    /// The caller-supplied cancel signal fired.
    #[error("request cancelled")]
    Cancelled,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ChatStreamError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Short stable label, used as the `outcome` of a stream span.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Transport { .. } => "transport",
            Self::Protocol(_) => "protocol",
            Self::Cancelled => "cancelled",
            Self::Connection(_) => "connection",
            Self::Io(_) => "io",
            Self::Other(_) => "other",
        }
    }
}

pub type CoreResult<T> = std::result::Result<T, ChatStreamError>;
