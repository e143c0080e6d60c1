//! Cooperative cancellation.
//!
//! A [`CancelHandle`] owns the trigger; any number of [`CancelSignal`]s observe
//! it. Both sit on a `tokio::sync::watch` channel, so an existing
//! `watch::Receiver<bool>` can be used as a signal directly.

use tokio::sync::watch;

#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Trigger cancellation. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is triggered. Never resolves if the handle is
    /// dropped without cancelling.
    pub async fn cancelled(&mut self) {
        if self.rx.wait_for(|c| *c).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

impl From<watch::Receiver<bool>> for CancelSignal {
    fn from(rx: watch::Receiver<bool>) -> Self {
        Self { rx }
    }
}

/// Waits on an optional signal; `None` never fires.
pub(crate) async fn wait_cancelled(signal: &mut Option<CancelSignal>) {
    match signal {
        Some(s) => s.cancelled().await,
        None => std::future::pending::<()>().await,
    }
}
