//! Admission and per-reading fan-out.
//!
//! Every admitted peer owns a delivery task fed by a bounded queue. Fan-out
//! only enqueues, so a verification stuck on one peer's upstream never holds
//! back another peer or the next reading; within a peer, readings are
//! verified and sent in arrival order.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::Message;
use tokio::sync::mpsc;
use tokio::time::Instant;

use ledgergate_core::error::Result;
use ledgergate_core::protocol::realtime::{ConnectRequest, Reading};

use super::registry::{PeerReading, PeerRegistry, RealtimePeer};
use super::types::{error_frame, QoS};
use crate::auth::TokenVerifier;
use crate::obs::GatewayMetrics;
use crate::policy::{PolicyResolver, PolicyRule, StringCondition};

/// What happened to one peer for one reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Sent,
    Skipped,
    Error,
    SendFailed,
}

impl Outcome {
    fn as_str(self) -> &'static str {
        match self {
            Outcome::Sent => "sent",
            Outcome::Skipped => "skipped",
            Outcome::Error => "error",
            Outcome::SendFailed => "send_failed",
        }
    }
}

/// Per-reading enqueue tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutReport {
    /// Peers the reading was queued for.
    pub queued: usize,
    /// Peers whose delivery queue was full or gone.
    pub dropped: usize,
}

/// Shared by every peer's delivery task.
struct Deliverer {
    resolver: Arc<PolicyResolver>,
    metrics: Arc<GatewayMetrics>,
    qos: QoS,
    device_param: String,
}

impl Deliverer {
    async fn run_peer(
        self: Arc<Self>,
        addr: SocketAddr,
        contract: String,
        resource: String,
        mut readings: mpsc::Receiver<Arc<PeerReading>>,
        tx: mpsc::Sender<Message>,
    ) {
        while let Some(reading) = readings.recv().await {
            let started = Instant::now();
            let outcome = self.deliver(addr, &contract, &resource, &reading, &tx).await;
            self.metrics.deliveries.inc(&[("outcome", outcome.as_str())]);
            self.metrics
                .delivery_duration
                .observe(&[("resource", resource.as_str())], started.elapsed());

            if outcome == Outcome::SendFailed && tx.is_closed() {
                break;
            }
        }
        tracing::debug!(peer = %addr, resource = %resource, "delivery task finished");
    }

    async fn deliver(
        &self,
        addr: SocketAddr,
        contract: &str,
        resource: &str,
        reading: &PeerReading,
        tx: &mpsc::Sender<Message>,
    ) -> Outcome {
        let rules = [PolicyRule::string(
            self.device_param.as_str(),
            StringCondition::ContainsItem(reading.device.clone()),
        )];
        let (msg, outcome) = match self.resolver.verify_policy(contract, resource, &rules).await {
            Ok(()) => (Message::Text(reading.text.clone()), Outcome::Sent),
            Err(e) if e.is_rule_violation() => return Outcome::Skipped,
            Err(e) => {
                tracing::debug!(peer = %addr, contract, resource, error = %e, "policy check failed");
                (error_frame(&e), Outcome::Error)
            }
        };

        match self.qos.send(tx, msg).await {
            Ok(()) => outcome,
            Err(e) => {
                tracing::warn!(peer = %addr, resource, error = %e, "send to peer failed");
                Outcome::SendFailed
            }
        }
    }
}

pub struct RealtimeGateway {
    registry: PeerRegistry,
    verifier: Arc<TokenVerifier>,
    deliverer: Arc<Deliverer>,
    peer_queue: usize,
}

impl RealtimeGateway {
    pub fn new(
        verifier: Arc<TokenVerifier>,
        resolver: Arc<PolicyResolver>,
        metrics: Arc<GatewayMetrics>,
        qos: QoS,
        device_param: impl Into<String>,
        peer_queue: usize,
    ) -> Self {
        Self {
            registry: PeerRegistry::new(),
            verifier,
            deliverer: Arc::new(Deliverer {
                resolver,
                metrics,
                qos,
                device_param: device_param.into(),
            }),
            peer_queue: peer_queue.max(1),
        }
    }

    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    fn metrics(&self) -> &GatewayMetrics {
        &self.deliverer.metrics
    }

    /// Verify the connect token and, on success, register the peer and start
    /// its delivery task.
    pub async fn admit(
        &self,
        addr: SocketAddr,
        request: ConnectRequest,
        tx: mpsc::Sender<Message>,
    ) -> Result<String> {
        let contract = match self.verifier.verify_token(&request.token).await {
            Ok(contract) => contract,
            Err(e) => {
                tracing::info!(peer = %addr, resource = %request.resource, error = %e, "admission rejected");
                self.metrics()
                    .admissions
                    .inc(&[("outcome", "rejected"), ("code", e.client_code().as_str())]);
                return Err(e);
            }
        };

        let (readings, readings_rx) = mpsc::channel(self.peer_queue);
        let worker = tokio::spawn(Arc::clone(&self.deliverer).run_peer(
            addr,
            contract.clone(),
            request.resource.clone(),
            readings_rx,
            tx,
        ));
        let peer = RealtimePeer {
            addr,
            contract: contract.clone(),
            resource: request.resource,
            readings,
            worker: worker.abort_handle(),
        };
        tracing::info!(peer = %addr, contract = %peer.contract, resource = %peer.resource, "peer admitted");

        match self.registry.insert(peer) {
            Some(replaced) => replaced.worker.abort(),
            None => self.metrics().peers_connected.inc(&[]),
        }
        self.metrics().admissions.inc(&[("outcome", "accepted")]);
        Ok(contract)
    }

    pub fn disconnect(&self, addr: &SocketAddr) {
        if let Some(peer) = self.registry.remove(addr) {
            peer.worker.abort();
            self.metrics().peers_connected.dec(&[]);
            tracing::info!(peer = %addr, resource = %peer.resource, "peer disconnected");
        }
    }

    /// Drop every peer and stop its delivery task; outbound queues close
    /// with them.
    pub fn disconnect_all(&self) {
        let peers = self.registry.drain();
        for peer in &peers {
            peer.worker.abort();
        }
        self.metrics().peers_connected.add(&[], -(peers.len() as i64));
    }

    /// Queue one reading of `resource` for every subscribed peer.
    ///
    /// Never waits on verification. A peer whose queue is full loses this
    /// reading.
    pub fn fan_out(&self, resource: &str, body: &[u8]) -> FanOutReport {
        let mut report = FanOutReport::default();

        let reading = match Reading::decode(body) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(resource, error = %e, "dropping unparsable reading");
                return report;
            }
        };
        // Decodable readings are valid UTF-8.
        let Ok(text) = std::str::from_utf8(body) else {
            return report;
        };
        let pending = Arc::new(PeerReading {
            device: reading.device,
            text: text.to_owned(),
        });

        for peer in self.registry.subscribers(resource) {
            match peer.readings.try_send(Arc::clone(&pending)) {
                Ok(()) => report.queued += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(peer = %peer.addr, resource, "peer delivery queue full; reading dropped");
                    self.metrics().deliveries.inc(&[("outcome", "dropped")]);
                    report.dropped += 1;
                }
                Err(mpsc::error::TrySendError::Closed(_)) => report.dropped += 1,
            }
        }
        report
    }
}
