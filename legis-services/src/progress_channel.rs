//! Ordered, single-writer progress channel
//!
//! Every event of a run goes through one queue drained by one writer task,
//! so the sink observes events in the order they were queued. Stage-boundary
//! events are awaited until the sink has handled them, up to the delivery
//! timeout; section progress and synthesis chunks are queued without waiting.
//! A sink that misses the timeout is treated as stalled and is no longer
//! waited on. Sink failures are logged by the writer and never stop it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use legis_core::{ProgressEvent, ProgressSink, ResearchError, ResearchResult};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Default bound on waiting for the sink to handle a stage-boundary event
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

struct Envelope {
    event: ProgressEvent,
    ack: Option<oneshot::Sender<ResearchResult<()>>>,
}

/// Progress channel for one research run
pub struct ProgressChannel {
    tx: Option<mpsc::UnboundedSender<Envelope>>,
    writer: Option<JoinHandle<()>>,
    delivery_timeout: Duration,
    stalled: AtomicBool,
}

impl ProgressChannel {
    /// Create a channel delivering to `sink`. Without a sink every event is dropped.
    ///
    /// Must be called within a Tokio runtime when a sink is given.
    pub fn new(sink: Option<Arc<dyn ProgressSink>>) -> Self {
        match sink {
            Some(sink) => {
                let (tx, rx) = mpsc::unbounded_channel();
                let writer = tokio::spawn(run_writer(sink, rx));
                Self {
                    tx: Some(tx),
                    writer: Some(writer),
                    delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
                    stalled: AtomicBool::new(false),
                }
            }
            None => Self::disabled(),
        }
    }

    /// A channel with no sink
    pub fn disabled() -> Self {
        Self {
            tx: None,
            writer: None,
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
            stalled: AtomicBool::new(false),
        }
    }

    pub fn with_delivery_timeout(mut self, delivery_timeout: Duration) -> Self {
        self.delivery_timeout = delivery_timeout;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Whether the sink missed a delivery deadline
    pub fn is_stalled(&self) -> bool {
        self.stalled.load(Ordering::Acquire)
    }

    /// Queue an event without waiting for delivery
    pub fn send(&self, event: ProgressEvent) {
        if let Some(tx) = &self.tx {
            if tx.send(Envelope { event, ack: None }).is_err() {
                warn!("Progress writer stopped; dropping event");
            }
        }
    }

    /// Queue an event and wait until the sink has handled it.
    ///
    /// Once the sink is stalled the event is only queued.
    pub async fn emit(&self, event: ProgressEvent) -> ResearchResult<()> {
        let Some(tx) = &self.tx else {
            return Ok(());
        };

        if self.is_stalled() {
            self.send(event);
            return Ok(());
        }

        let (ack_tx, ack_rx) = oneshot::channel();
        tx.send(Envelope {
            event,
            ack: Some(ack_tx),
        })
        .map_err(|_| ResearchError::emission("progress writer stopped"))?;

        match timeout(self.delivery_timeout, ack_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(ResearchError::emission("progress writer stopped")),
            Err(_) => {
                self.stalled.store(true, Ordering::Release);
                warn!(
                    "Progress sink did not handle an event within {:?}; no longer waiting on it",
                    self.delivery_timeout
                );
                Err(ResearchError::emission("progress delivery timed out"))
            }
        }
    }

    /// Flush every queued event and stop the writer.
    ///
    /// A stalled sink gets one more delivery timeout to drain before the
    /// remaining events are dropped.
    pub async fn close(mut self) {
        self.tx.take();
        let Some(mut writer) = self.writer.take() else {
            return;
        };

        let joined = if self.is_stalled() {
            match timeout(self.delivery_timeout, &mut writer).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!("Progress sink still stalled; dropping undelivered events");
                    writer.abort();
                    return;
                }
            }
        } else {
            writer.await
        };

        if let Err(e) = joined {
            warn!("Progress writer terminated abnormally: {}", e);
        }
    }
}

async fn run_writer(sink: Arc<dyn ProgressSink>, mut rx: mpsc::UnboundedReceiver<Envelope>) {
    while let Some(Envelope { event, ack }) = rx.recv().await {
        let kind = event.kind();
        let result = sink.emit(event).await;
        if let Err(e) = &result {
            warn!("Failed to deliver {} event: {}", kind, e);
        }
        if let Some(ack) = ack {
            let _ = ack.send(result);
        }
    }
    debug!("Progress writer finished");
}
