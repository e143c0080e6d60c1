use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use http::StatusCode;

use crate::error::CoreResult;
use crate::model::ChatRequest;

/// Raw response body, one item per network read.
pub type ByteStream = BoxStream<'static, CoreResult<Bytes>>;

/// What a transport hands back once the response head has arrived.
pub struct TransportResponse {
    pub status: StatusCode,
    /// `None` when the response carries no readable body.
    pub body: Option<ByteStream>,
}

impl TransportResponse {
    pub fn new(status: StatusCode, body: Option<ByteStream>) -> Self {
        Self { status, body }
    }
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("body", &self.body.as_ref().map(|_| "<stream>"))
            .finish()
    }
}

/// Sends one chat request and returns the response as a byte stream.
///
/// Implementations must not retry and must not apply a total request timeout;
/// dropping the returned body aborts the underlying connection.
#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &str;
    async fn send(&self, req: &ChatRequest) -> CoreResult<TransportResponse>;
}
