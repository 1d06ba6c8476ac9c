use std::net::SocketAddr;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

/// One reading queued for delivery, shared by every peer it was fanned to.
#[derive(Debug)]
pub struct PeerReading {
    pub device: String,
    /// Raw reading, forwarded untouched as a text frame.
    pub text: String,
}

/// An admitted realtime connection.
#[derive(Debug, Clone)]
pub struct RealtimePeer {
    pub addr: SocketAddr,
    /// Contract the peer's token was verified against; fixed for the
    /// lifetime of the connection.
    pub contract: String,
    pub resource: String,
    /// Readings awaiting verification, in arrival order.
    pub readings: mpsc::Sender<Arc<PeerReading>>,
    /// The peer's delivery task; aborted when the peer is removed.
    pub worker: AbortHandle,
}

/// Peers keyed by remote address.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: DashMap<SocketAddr, RealtimePeer>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `peer`, returning the one it replaced at the same address.
    pub fn insert(&self, peer: RealtimePeer) -> Option<RealtimePeer> {
        self.peers.insert(peer.addr, peer)
    }

    pub fn remove(&self, addr: &SocketAddr) -> Option<RealtimePeer> {
        self.peers.remove(addr).map(|(_, p)| p)
    }

    pub fn get(&self, addr: &SocketAddr) -> Option<RealtimePeer> {
        self.peers.get(addr).map(|p| p.value().clone())
    }

    /// Snapshot of the peers subscribed to `resource`.
    pub fn subscribers(&self, resource: &str) -> Vec<RealtimePeer> {
        self.peers
            .iter()
            .filter(|p| p.resource == resource)
            .map(|p| p.value().clone())
            .collect()
    }

    /// Remove and return every peer.
    pub fn drain(&self) -> Vec<RealtimePeer> {
        let addrs: Vec<SocketAddr> = self.peers.iter().map(|p| *p.key()).collect();
        addrs.iter().filter_map(|a| self.remove(a)).collect()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
