//! Progress sinks
//!
//! A sink receives the events of one research run. Delivery failures are
//! reported back to the caller, which logs them and carries on.

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

use crate::error::{ResearchError, ResearchResult};
use crate::event::ProgressEvent;

#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn emit(&self, event: ProgressEvent) -> ResearchResult<()>;
}

#[async_trait]
impl ProgressSink for mpsc::Sender<ProgressEvent> {
    async fn emit(&self, event: ProgressEvent) -> ResearchResult<()> {
        self.send(event)
            .await
            .map_err(|_| ResearchError::emission("progress receiver dropped"))
    }
}

#[async_trait]
impl ProgressSink for mpsc::UnboundedSender<ProgressEvent> {
    async fn emit(&self, event: ProgressEvent) -> ResearchResult<()> {
        self.send(event)
            .map_err(|_| ResearchError::emission("progress receiver dropped"))
    }
}

#[async_trait]
impl ProgressSink for broadcast::Sender<ProgressEvent> {
    async fn emit(&self, event: ProgressEvent) -> ResearchResult<()> {
        self.send(event)
            .map(|_| ())
            .map_err(|_| ResearchError::emission("no progress subscribers"))
    }
}
