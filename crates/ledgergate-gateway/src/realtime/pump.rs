//! Connection event pump.
//!
//! Transport handlers never touch the registry directly: they queue
//! [`PumpEvent`]s, and a single loop drains the queue every poll interval.
//! Admissions run as their own tasks so a slow ledger never stalls the pump.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;

use ledgergate_core::error::{LedgerGateError, Result};
use ledgergate_core::protocol::realtime::ConnectRequest;

use super::gateway::RealtimeGateway;
use crate::supervise::Shutdown;

const EVENT_QUEUE: usize = 1024;

pub enum PumpEvent {
    Connect {
        addr: SocketAddr,
        request: ConnectRequest,
        tx: mpsc::Sender<Message>,
        reply: oneshot::Sender<Result<String>>,
    },
    Disconnect {
        addr: SocketAddr,
    },
}

/// Sending side used by transport handlers.
#[derive(Clone)]
pub struct PumpHandle {
    events: mpsc::Sender<PumpEvent>,
}

impl PumpHandle {
    /// Ask for admission and wait for the decision (the verified contract).
    pub async fn connect(
        &self,
        addr: SocketAddr,
        request: ConnectRequest,
        tx: mpsc::Sender<Message>,
    ) -> Result<String> {
        let (reply, decision) = oneshot::channel();
        self.events
            .send(PumpEvent::Connect {
                addr,
                request,
                tx,
                reply,
            })
            .await
            .map_err(|_| stopped())?;
        decision.await.map_err(|_| stopped())?
    }

    pub async fn disconnect(&self, addr: SocketAddr) {
        let _ = self.events.send(PumpEvent::Disconnect { addr }).await;
    }
}

fn stopped() -> LedgerGateError {
    LedgerGateError::Internal("realtime pump stopped".into())
}

pub struct Pump {
    gateway: Arc<RealtimeGateway>,
    events: mpsc::Receiver<PumpEvent>,
    poll_interval: Duration,
}

impl Pump {
    pub fn new(gateway: Arc<RealtimeGateway>, poll_interval: Duration) -> (Self, PumpHandle) {
        let (tx, rx) = mpsc::channel(EVENT_QUEUE);
        let pump = Self {
            gateway,
            events: rx,
            poll_interval,
        };
        (pump, PumpHandle { events: tx })
    }

    /// Drain events every poll interval until shutdown, then drop all peers.
    pub async fn run(mut self, mut shutdown: Shutdown) {
        let mut tick = tokio::time::interval(self.poll_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.wait() => break,
                _ = tick.tick() => {}
            }
            match self.poll_events() {
                Ok(_) => {}
                Err(PollError::Closed) => {
                    tracing::info!("realtime event queue closed; pump exiting");
                    break;
                }
                Err(PollError::Cycle(e)) => {
                    tracing::warn!(error = %e, "realtime poll cycle failed");
                }
            }
        }

        self.gateway.disconnect_all();
        tracing::info!("realtime pump stopped");
    }

    /// Handle every queued event. Returns how many were handled.
    fn poll_events(&mut self) -> std::result::Result<usize, PollError> {
        let mut handled = 0;
        let mut failure = None;
        loop {
            let event = match self.events.try_recv() {
                Ok(ev) => ev,
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => return Err(PollError::Closed),
            };
            handled += 1;
            if let Err(e) = self.handle(event) {
                failure.get_or_insert(e);
            }
        }
        match failure {
            Some(e) => Err(PollError::Cycle(e)),
            None => Ok(handled),
        }
    }

    fn handle(&self, event: PumpEvent) -> Result<()> {
        match event {
            PumpEvent::Connect {
                addr,
                request,
                tx,
                reply,
            } => {
                if tx.is_closed() {
                    return Err(LedgerGateError::BadRequest(format!(
                        "{addr} went away before admission"
                    )));
                }
                let gateway = Arc::clone(&self.gateway);
                tokio::spawn(async move {
                    let decision = gateway.admit(addr, request, tx).await;
                    let admitted = decision.is_ok();
                    if reply.send(decision).is_err() && admitted {
                        // The handler is gone; nobody will ever send Disconnect.
                        gateway.disconnect(&addr);
                    }
                });
                Ok(())
            }
            PumpEvent::Disconnect { addr } => {
                self.gateway.disconnect(&addr);
                Ok(())
            }
        }
    }
}

enum PollError {
    Closed,
    Cycle(LedgerGateError),
}
