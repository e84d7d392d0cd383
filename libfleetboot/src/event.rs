//! Progress events emitted while a batch runs, and the sinks that carry
//! them to whoever renders them.

use async_trait::async_trait;
use color_eyre::eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::log::*;
use crate::report::Report;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BatchEvent {
    Started { total: usize },
    AttemptingHost { host: String },
    HostSucceeded { host: String },
    HostFailed { host: String, reason: Option<String> },
    CancellationRequested,
    Finished(Report),
}

impl BatchEvent {
    pub fn host(&self) -> Option<&str> {
        match self {
            BatchEvent::AttemptingHost { host }
            | BatchEvent::HostSucceeded { host }
            | BatchEvent::HostFailed { host, .. } => Some(host),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchEvent::Finished(_))
    }
}

#[async_trait]
pub trait EventSink: std::fmt::Debug + Send + Sync {
    async fn sink(&self, event: BatchEvent) -> Result<()>;
}

pub type EventTx = mpsc::Sender<BatchEvent>;
pub type EventRx = mpsc::Receiver<BatchEvent>;

/// Forwards events over a tokio channel. Pair with [`ChannelEventSource`].
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    tx: EventTx,
}

impl ChannelEventSink {
    pub fn new(tx: EventTx) -> Self {
        Self { tx }
    }

    /// Create a connected sink/source pair.
    pub fn channel(capacity: usize) -> (Self, ChannelEventSource) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), ChannelEventSource::new(rx))
    }
}

#[async_trait]
impl EventSink for ChannelEventSink {
    #[tracing::instrument(skip(self))]
    async fn sink(&self, event: BatchEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .wrap_err("Failed sending batch event")
    }
}

/// The receiving half of a [`ChannelEventSink`].
#[derive(Debug)]
pub struct ChannelEventSource {
    rx: EventRx,
    ended: bool,
}

impl ChannelEventSource {
    pub fn new(rx: EventRx) -> Self {
        Self { rx, ended: false }
    }

    /// Wait for the next event. Returns `None` once the batch report has been
    /// delivered or every sender is gone.
    pub async fn source(&mut self) -> Option<BatchEvent> {
        if self.ended {
            return None;
        }
        let event = self.rx.recv().await;
        match &event {
            Some(event) if event.is_terminal() => self.ended = true,
            None => self.ended = true,
            _ => {}
        }
        event
    }
}

/// Writes every event to the tracing subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn sink(&self, event: BatchEvent) -> Result<()> {
        match &event {
            BatchEvent::Started { total } => info!(total, "starting batch"),
            BatchEvent::AttemptingHost { host } => info!(%host, "attempting host"),
            BatchEvent::HostSucceeded { host } => info!(%host, "host succeeded"),
            BatchEvent::HostFailed { host, reason } => {
                warn!(%host, reason = reason.as_deref().unwrap_or(""), "host failed")
            }
            BatchEvent::CancellationRequested => warn!("cancellation requested"),
            BatchEvent::Finished(report) => info!(
                total = report.total(),
                success = report.success(),
                failure = report.failure(),
                failed_hosts = ?report.failed_hosts(),
                elapsed = ?report.elapsed(),
                cancelled = report.cancelled(),
                "batch finished"
            ),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use color_eyre::eyre::Result;

    use super::*;

    #[tokio::test]
    async fn test_that_the_source_ends_after_the_report() -> Result<()> {
        let (sink, mut source) = ChannelEventSink::channel(8);
        sink.sink(BatchEvent::Started { total: 0 }).await?;
        let report: Report = serde_json::from_str(
            r#"{"total":0,"success":0,"failure":0,"failed_hosts":[],"elapsed":{"secs":0,"nanos":0},"cancelled":false}"#,
        )?;
        sink.sink(BatchEvent::Finished(report)).await?;
        sink.sink(BatchEvent::CancellationRequested).await?;

        assert_eq!(Some(BatchEvent::Started { total: 0 }), source.source().await);
        assert!(matches!(source.source().await, Some(BatchEvent::Finished(_))));
        assert_eq!(None, source.source().await);
        Ok(())
    }

    #[tokio::test]
    async fn test_that_sinking_into_a_dropped_source_fails() {
        let (sink, source) = ChannelEventSink::channel(1);
        drop(source);
        assert!(sink.sink(BatchEvent::CancellationRequested).await.is_err());
    }

    #[tokio::test]
    async fn test_that_the_tracing_sink_accepts_every_event() -> Result<()> {
        let sink = TracingEventSink;
        sink.sink(BatchEvent::Started { total: 1 }).await?;
        sink.sink(BatchEvent::HostFailed {
            host: "10.0.0.1".into(),
            reason: Some("connection refused".into()),
        })
        .await?;
        sink.sink(BatchEvent::CancellationRequested).await?;
        Ok(())
    }

    #[test]
    fn test_that_events_serialize_with_a_type_tag() -> Result<()> {
        let event = BatchEvent::HostFailed {
            host: "10.0.0.1".into(),
            reason: None,
        };
        assert_eq!(
            r#"{"type":"HostFailed","host":"10.0.0.1","reason":null}"#,
            serde_json::to_string(&event)?
        );
        Ok(())
    }
}
