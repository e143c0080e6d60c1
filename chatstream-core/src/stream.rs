//! Streaming driver.
//!
//! Contract:
//! - The returned stream is lazy: nothing is sent until it is first polled.
//! - It yields 0..n delta chunks followed by exactly one chunk with `done: true`,
//!   or ends early with exactly one `Err` item. Nothing follows either.
//! - It never reads ahead of the consumer; the next network read starts only
//!   when the next item is requested.
//! - The response body is released on every exit path, before an error is
//!   surfaced and before the terminal chunk is handed out. Dropping the stream
//!   releases it as well.

use std::sync::Arc;

use futures::StreamExt;
use futures::stream::BoxStream;
use tracing::{Span, field};

use crate::cancel::{CancelSignal, wait_cancelled};
use crate::decode::{LineBuffer, Utf8StreamDecoder};
use crate::error::{ChatStreamError, CoreResult};
use crate::model::{ChatRequest, StreamChunk};
use crate::sse::parse_line;
use crate::transport::{ByteStream, Transport};

/// Boxed stream of chunks returned by [`stream_chat`].
pub type ChunkStream = BoxStream<'static, CoreResult<StreamChunk>>;

/// Exclusive hold on a response body. Dropping it releases the connection.
struct ReadHandle {
    body: ByteStream,
}

impl ReadHandle {
    async fn read(&mut self) -> Option<CoreResult<bytes::Bytes>> {
        self.body.next().await
    }
}

impl Drop for ReadHandle {
    fn drop(&mut self) {
        tracing::trace!("response body released");
    }
}

enum Ended {
    Terminal(StreamChunk),
    Eof,
    Failed(ChatStreamError),
}

fn finish(span: &Span, outcome: &'static str, chunks: u64) {
    span.record("outcome", outcome);
    span.record("chunks", chunks);
    tracing::debug!(parent: span, outcome, chunks, "chat stream finished");
}

fn fail(span: &Span, err: ChatStreamError, chunks: u64) -> ChatStreamError {
    span.record("outcome", err.kind());
    span.record("chunks", chunks);
    if err.is_cancelled() {
        tracing::debug!(parent: span, chunks, "chat stream cancelled");
    } else {
        tracing::warn!(parent: span, error = %err, chunks, "chat stream failed");
    }
    err
}

async fn read_error_body(mut reader: ReadHandle, cancel: &mut Option<CancelSignal>) -> CoreResult<String> {
    let mut raw = Vec::new();
    loop {
        let next = tokio::select! {
            biased;
            _ = wait_cancelled(cancel) => return Err(ChatStreamError::Cancelled),
            next = reader.read() => next,
        };
        match next {
            Some(Ok(bytes)) => raw.extend_from_slice(&bytes),
            // keep whatever arrived; the status is the real error
            Some(Err(_)) | None => break,
        }
    }
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

/// Sends `req` through `transport` and streams the parsed chunks back.
///
/// `cancel` aborts the request at any point; the stream then ends with
/// [`ChatStreamError::Cancelled`].
pub fn stream_chat(
    transport: Arc<dyn Transport>,
    req: ChatRequest,
    cancel: Option<CancelSignal>,
) -> ChunkStream {
    let span = tracing::debug_span!(
        "chat_stream",
        transport = transport.name(),
        model = %req.model,
        messages = req.messages.len(),
        chunks = field::Empty,
        outcome = field::Empty,
    );

    Box::pin(async_stream::stream! {
        let mut cancel = cancel;
        let mut produced: u64 = 0;

        if cancel.as_ref().is_some_and(CancelSignal::is_cancelled) {
            yield Err(fail(&span, ChatStreamError::Cancelled, produced));
            return;
        }

        let sent = tokio::select! {
            biased;
            _ = wait_cancelled(&mut cancel) => Err(ChatStreamError::Cancelled),
            sent = transport.send(&req) => sent,
        };
        let response = match sent {
            Ok(r) => r,
            Err(e) => {
                yield Err(fail(&span, e, produced));
                return;
            }
        };

        if !response.status.is_success() {
            let status = response.status.as_u16();
            let body = match response.body {
                Some(body) => read_error_body(ReadHandle { body }, &mut cancel).await,
                None => Ok(String::new()),
            };
            let err = match body {
                Ok(body) => ChatStreamError::Transport { status, body },
                Err(e) => e,
            };
            yield Err(fail(&span, err, produced));
            return;
        }

        let Some(body) = response.body else {
            let err = ChatStreamError::Protocol("stream not readable".into());
            yield Err(fail(&span, err, produced));
            return;
        };
        let mut reader = ReadHandle { body };
        let mut decoder = Utf8StreamDecoder::new();
        let mut lines = LineBuffer::new();

        let ended = 'read: loop {
            let next = tokio::select! {
                biased;
                _ = wait_cancelled(&mut cancel) => Some(Err(ChatStreamError::Cancelled)),
                next = reader.read() => next,
            };
            let bytes = match next {
                Some(Ok(bytes)) => bytes,
                Some(Err(e)) => break 'read Ended::Failed(e),
                None => break 'read Ended::Eof,
            };
            for line in lines.push(&decoder.decode(&bytes)) {
                // the consumer may have cancelled while holding the previous chunk
                if cancel.as_ref().is_some_and(CancelSignal::is_cancelled) {
                    break 'read Ended::Failed(ChatStreamError::Cancelled);
                }
                match parse_line(&line) {
                    Some(chunk) if chunk.done => break 'read Ended::Terminal(chunk),
                    Some(chunk) => {
                        produced += 1;
                        yield Ok(chunk);
                    }
                    None => {}
                }
            }
        };
        drop(reader);

        match ended {
            Ended::Terminal(chunk) => {
                finish(&span, "done", produced + 1);
                yield Ok(chunk);
            }
            Ended::Failed(e) => {
                yield Err(fail(&span, e, produced));
            }
            Ended::Eof => {
                let mut rest = lines.take_remainder();
                rest.push_str(&decoder.finish());
                if let Some(chunk) = parse_line(&rest).filter(|c| !c.done) {
                    produced += 1;
                    yield Ok(chunk);
                    if cancel.as_ref().is_some_and(CancelSignal::is_cancelled) {
                        yield Err(fail(&span, ChatStreamError::Cancelled, produced));
                        return;
                    }
                }
                finish(&span, "eof", produced + 1);
                yield Ok(StreamChunk::done());
            }
        }
    })
}
