use async_trait::async_trait;
use futures_util::TryStreamExt;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};

use crate::config::{EndpointCfg, HttpCfg};
use crate::error::{ChatStreamError, CoreResult};
use crate::model::ChatRequest;
use crate::transport::{Transport, TransportResponse};

/// reqwest-backed transport for one chat-completions endpoint.
///
/// No total request timeout is configured: a stream may legitimately run for
/// minutes, and callers bound it through the cancel signal instead.
#[derive(Debug)]
pub struct HttpClient {
    inner: Client,
    url: String,
    api_key: Option<SecretString>,
    user_agent: String,
}

impl HttpClient {
    pub fn new(endpoint: &EndpointCfg, http: &HttpCfg) -> CoreResult<Self> {
        let mut builder = Client::builder()
            .connect_timeout(std::time::Duration::from_millis(http.connect_timeout_ms));
        if let Some(n) = http.pool_max_idle_per_host {
            builder = builder.pool_max_idle_per_host(n);
        }
        let inner = builder
            .build()
            .map_err(|e| ChatStreamError::Other(anyhow::anyhow!("http client build failed: {e}")))?;

        let api_key = match &endpoint.api_key_env {
            Some(var) => Some(SecretString::from(std::env::var(var).map_err(|_| {
                ChatStreamError::Validation(format!("environment variable {var} is not set"))
            })?)),
            None => None,
        };

        Ok(Self {
            inner,
            url: endpoint.url(),
            api_key,
            user_agent: concat!("chatstream/", env!("CARGO_PKG_VERSION")).to_string(),
        })
    }

    pub fn with_api_key(mut self, key: SecretString) -> Self {
        self.api_key = Some(key);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for HttpClient {
    fn name(&self) -> &str {
        "http"
    }

    async fn send(&self, req: &ChatRequest) -> CoreResult<TransportResponse> {
        // .json() also sets Content-Type: application/json
        let mut builder = self
            .inner
            .post(&self.url)
            .json(req)
            .header("User-Agent", &self.user_agent)
            .header("Accept", "text/event-stream");
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| ChatStreamError::Connection(e.to_string()))?;

        let status = resp.status();
        tracing::debug!(%status, url = %self.url, "chat response head received");
        let body = resp
            .bytes_stream()
            .map_err(|e| ChatStreamError::Connection(e.to_string()));
        Ok(TransportResponse::new(status, Some(Box::pin(body))))
    }
}
