//! Test doubles: a scripted in-memory transport and a span capture layer.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use futures::channel::mpsc;
use futures::stream::{self, Stream};
use http::StatusCode;
use tracing::{span, Subscriber};
use tracing_core::field::{Field, Visit};
use tracing_subscriber::registry;
use tracing_subscriber::{layer::Context as LayerContext, registry::LookupSpan, Layer};

use crate::error::CoreResult;
use crate::model::ChatRequest;
use crate::transport::{ByteStream, Transport, TransportResponse};

/// Counts reads and releases of a body stream.
#[derive(Debug, Default)]
pub struct BodyProbe {
    pub reads: AtomicUsize,
    pub releases: AtomicUsize,
}

struct ProbedBody {
    inner: ByteStream,
    probe: Arc<BodyProbe>,
}

impl Stream for ProbedBody {
    type Item = CoreResult<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let polled = self.inner.as_mut().poll_next(cx);
        if let Poll::Ready(Some(_)) = &polled {
            self.probe.reads.fetch_add(1, Ordering::SeqCst);
        }
        polled
    }
}

impl Drop for ProbedBody {
    fn drop(&mut self) {
        self.probe.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Transport that answers every request with a canned status and body.
pub struct ScriptedTransport {
    status: StatusCode,
    body: Mutex<Option<ByteStream>>,
    pub probe: Arc<BodyProbe>,
    pub sent: Mutex<Vec<ChatRequest>>,
}

impl ScriptedTransport {
    fn with_body(status: StatusCode, body: Option<ByteStream>) -> Arc<Self> {
        let probe = Arc::new(BodyProbe::default());
        let body = body.map(|inner| {
            Box::pin(ProbedBody {
                inner,
                probe: probe.clone(),
            }) as ByteStream
        });
        Arc::new(Self {
            status,
            body: Mutex::new(body),
            probe,
            sent: Mutex::new(Vec::new()),
        })
    }

    /// 200 response delivering `reads` as separate network reads.
    pub fn ok<I, B>(reads: I) -> Arc<Self>
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        let items: Vec<CoreResult<Bytes>> = reads.into_iter().map(|b| Ok(b.into())).collect();
        Self::with_body(StatusCode::OK, Some(Box::pin(stream::iter(items))))
    }

    /// 200 response whose body is fed by the returned sender.
    pub fn channel() -> (Arc<Self>, mpsc::UnboundedSender<CoreResult<Bytes>>) {
        Self::channel_with_status(200)
    }

    /// Like [`ScriptedTransport::channel`] with an arbitrary status.
    pub fn channel_with_status(status: u16) -> (Arc<Self>, mpsc::UnboundedSender<CoreResult<Bytes>>) {
        let status = StatusCode::from_u16(status).expect("valid status");
        let (tx, rx) = mpsc::unbounded();
        (Self::with_body(status, Some(Box::pin(rx))), tx)
    }

    /// 200 response delivering the given read results, errors included.
    pub fn results(reads: Vec<CoreResult<Bytes>>) -> Arc<Self> {
        Self::with_body(StatusCode::OK, Some(Box::pin(stream::iter(reads))))
    }

    pub fn status(status: u16, body: &str) -> Arc<Self> {
        let status = StatusCode::from_u16(status).expect("valid status");
        let items: Vec<CoreResult<Bytes>> = vec![Ok(Bytes::from(body.to_string()))];
        Self::with_body(status, Some(Box::pin(stream::iter(items))))
    }

    pub fn no_body() -> Arc<Self> {
        Self::with_body(StatusCode::OK, None)
    }

    pub fn reads(&self) -> usize {
        self.probe.reads.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.probe.releases.load(Ordering::SeqCst)
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn send(&self, req: &ChatRequest) -> CoreResult<TransportResponse> {
        self.sent.lock().unwrap().push(req.clone());
        let body = self.body.lock().unwrap().take();
        Ok(TransportResponse::new(self.status, body))
    }
}

// ---- span capture ----

#[derive(Default, Debug)]
pub struct SpanData {
    pub name: String,
    pub fields: Mutex<HashMap<String, String>>, // stringified values
}

#[derive(Default, Debug)]
pub struct SpanStore {
    pub spans: Mutex<HashMap<span::Id, Arc<SpanData>>>,
}

impl SpanStore {
    /// Fields of the first captured span called `name`.
    pub fn fields_of(&self, name: &str) -> Option<HashMap<String, String>> {
        let spans = self.spans.lock().unwrap();
        spans
            .values()
            .find(|s| s.name == name)
            .map(|s| s.fields.lock().unwrap().clone())
    }
}

struct MapVisitor<'a> {
    map: &'a mut HashMap<String, String>,
}

impl Visit for MapVisitor<'_> {
    fn record_debug(&mut self, field: &Field, value: &dyn core::fmt::Debug) {
        self.map.insert(field.name().to_string(), format!("{value:?}"));
    }
    fn record_u64(&mut self, field: &Field, value: u64) {
        self.map.insert(field.name().to_string(), value.to_string());
    }
    fn record_str(&mut self, field: &Field, value: &str) {
        self.map.insert(field.name().to_string(), value.to_string());
    }
}

#[derive(Clone)]
pub struct CaptureLayer {
    pub store: Arc<SpanStore>,
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, _ctx: LayerContext<'_, S>) {
        let data = Arc::new(SpanData {
            name: attrs.metadata().name().to_string(),
            ..Default::default()
        });
        attrs.record(&mut MapVisitor {
            map: &mut data.fields.lock().unwrap(),
        });
        self.store.spans.lock().unwrap().insert(id.clone(), data);
    }

    fn on_record(&self, id: &span::Id, values: &span::Record<'_>, _ctx: LayerContext<'_, S>) {
        if let Some(data) = self.store.spans.lock().unwrap().get(id) {
            values.record(&mut MapVisitor {
                map: &mut data.fields.lock().unwrap(),
            });
        }
    }
}

/// Installs a capturing subscriber for the current thread until the guard drops.
pub fn install_capture() -> (Arc<SpanStore>, tracing::subscriber::DefaultGuard) {
    use tracing_subscriber::prelude::*;
    let store = Arc::new(SpanStore::default());
    let layer = CaptureLayer { store: store.clone() };
    let subscriber = registry::Registry::default().with(layer);
    let guard = tracing::subscriber::set_default(subscriber);
    (store, guard)
}
