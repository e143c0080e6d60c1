pub mod cancel;
pub mod client;
pub mod config;
pub mod decode;
pub mod error;
pub mod http_client;
pub mod model;
pub mod normalizer;
pub mod sanitize;
pub mod sse;
pub mod stream;
pub mod transport;
#[cfg(test)]
pub mod test_util;

pub use cancel::{CancelHandle, CancelSignal};
pub use client::ChatClient;
pub use error::{ChatStreamError, CoreResult};
pub use model::{ChatOptions, HistoryMessage, StreamChunk};
pub use stream::{ChunkStream, stream_chat};
