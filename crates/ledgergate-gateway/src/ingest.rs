//! Reading ingestion: subscribe to the message streams and fan each
//! reading out to realtime peers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{mpsc, Mutex};

use ledgergate_core::error::{LedgerGateError, Result};

use crate::config::RealtimeSection;
use crate::obs::GatewayMetrics;
use crate::realtime::RealtimeGateway;
use crate::supervise::{retry_forever, Shutdown};

/// One message taken off a stream.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub queue: String,
    pub body: Bytes,
}

/// A broker connection yielding deliveries from every subscribed queue.
#[async_trait]
pub trait ReadingSource: Send + Sync {
    /// Open a subscription. The receiver closing means the connection was lost.
    async fn connect(&self) -> Result<mpsc::Receiver<Delivery>>;
}

/// In-process broker. Publishers push readings; the latest subscriber
/// receives them.
pub struct ChannelSource {
    capacity: usize,
    subscriber: Mutex<Option<mpsc::Sender<Delivery>>>,
}

impl ChannelSource {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            subscriber: Mutex::new(None),
        }
    }

    pub async fn publish(&self, queue: &str, body: Bytes) -> Result<()> {
        let tx = self
            .subscriber
            .lock()
            .await
            .clone()
            .ok_or_else(|| LedgerGateError::UpstreamUnavailable("no reading subscriber".into()))?;
        tx.send(Delivery {
            queue: queue.to_string(),
            body,
        })
        .await
        .map_err(|_| LedgerGateError::UpstreamUnavailable("reading subscriber went away".into()))
    }

    /// Drop the current subscription, as a broker disconnect would.
    pub async fn disconnect(&self) {
        self.subscriber.lock().await.take();
    }
}

#[async_trait]
impl ReadingSource for ChannelSource {
    async fn connect(&self) -> Result<mpsc::Receiver<Delivery>> {
        let (tx, rx) = mpsc::channel(self.capacity);
        *self.subscriber.lock().await = Some(tx);
        Ok(rx)
    }
}

/// Consume `source` until shutdown, reconnecting whenever it drops.
///
/// Deliveries are enqueued to peers in arrival order; verification happens
/// on each peer's own delivery task, so this loop never waits on upstreams.
pub async fn run_ingestion(
    source: Arc<dyn ReadingSource>,
    gateway: Arc<RealtimeGateway>,
    streams: RealtimeSection,
    metrics: Arc<GatewayMetrics>,
    mut shutdown: Shutdown,
) {
    let delay: Duration = streams.reconnect_delay();

    'connect: loop {
        let Some(mut rx) =
            retry_forever("reading source", delay, &mut shutdown, || source.connect()).await
        else {
            break;
        };
        tracing::info!(queues = streams.streams.len(), "subscribed to reading streams");

        loop {
            let delivery = tokio::select! {
                _ = shutdown.wait() => break 'connect,
                d = rx.recv() => d,
            };
            let Some(delivery) = delivery else {
                tracing::warn!("reading source closed; reconnecting");
                continue 'connect;
            };

            let Some(resource) = streams.resource_for(&delivery.queue) else {
                tracing::warn!(queue = %delivery.queue, "dropping reading from unrouted queue");
                metrics
                    .ingested
                    .inc(&[("queue", delivery.queue.as_str()), ("outcome", "unrouted")]);
                continue;
            };
            metrics
                .ingested
                .inc(&[("queue", delivery.queue.as_str()), ("outcome", "routed")]);

            let report = gateway.fan_out(resource, &delivery.body);
            tracing::debug!(
                queue = %delivery.queue,
                resource,
                queued = report.queued,
                dropped = report.dropped,
                "reading fanned out"
            );
        }
    }

    tracing::info!("ingestion stopped");
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[tokio::test]
    async fn publish_needs_a_subscriber() {
        let source = ChannelSource::new(4);
        assert!(matches!(
            source.publish("temperatureRT", Bytes::from_static(b"{}")).await,
            Err(LedgerGateError::UpstreamUnavailable(_))
        ));

        let mut rx = source.connect().await.unwrap();
        source.publish("temperatureRT", Bytes::from_static(b"{}")).await.unwrap();
        let d = rx.recv().await.unwrap();
        assert_eq!(d.queue, "temperatureRT");

        source.disconnect().await;
        assert!(rx.recv().await.is_none());
    }
}
