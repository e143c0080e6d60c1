use std::sync::Arc;

use crate::cancel::CancelSignal;
use crate::config::Config;
use crate::error::CoreResult;
use crate::http_client::HttpClient;
use crate::model::{ChatOptions, ChatRequest, HistoryMessage};
use crate::normalizer::normalize_messages;
use crate::stream::{ChunkStream, stream_chat};
use crate::transport::Transport;

/// Entry point for callers: normalizes history, builds the request and
/// streams the reply.
#[derive(Clone)]
pub struct ChatClient {
    transport: Arc<dyn Transport>,
    defaults: ChatOptions,
}

impl ChatClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            defaults: ChatOptions::default(),
        }
    }

    /// Builds an HTTP-backed client from a validated config.
    pub fn from_config(cfg: &Config) -> CoreResult<Self> {
        cfg.validate()?;
        let http = HttpClient::new(&cfg.endpoint, &cfg.http)?;
        Ok(Self::new(Arc::new(http)).with_defaults(ChatOptions {
            temperature: cfg.defaults.temperature,
        }))
    }

    /// Options used when a call leaves them unset.
    pub fn with_defaults(mut self, defaults: ChatOptions) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn build_request(&self, model: &str, history: &[HistoryMessage], options: ChatOptions) -> ChatRequest {
        let options = ChatOptions {
            temperature: options.temperature.or(self.defaults.temperature),
        };
        ChatRequest::streaming(model, normalize_messages(history), options)
    }

    /// Streams a chat completion for `history`. See [`stream_chat`] for the
    /// sequence contract.
    pub fn stream(
        &self,
        model: &str,
        history: &[HistoryMessage],
        cancel: Option<CancelSignal>,
        options: ChatOptions,
    ) -> ChunkStream {
        let req = self.build_request(model, history, options);
        tracing::debug!(model, kept = req.messages.len(), given = history.len(), "normalized history");
        stream_chat(self.transport.clone(), req, cancel)
    }
}
