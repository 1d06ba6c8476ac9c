use axum::extract::ws::Message;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};

use ledgergate_core::error::LedgerGateError;

use crate::config::{DeliveryMode, RealtimeSection};

/// How a frame is handed to a peer's outbound queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QoS {
    /// Never wait: drop the frame if the queue is full.
    Lossy,
    /// Wait for queue space, up to `timeout`.
    Reliable { timeout: Duration },
}

impl QoS {
    pub fn from_config(cfg: &RealtimeSection) -> Self {
        match cfg.delivery {
            DeliveryMode::Lossy => QoS::Lossy,
            DeliveryMode::Reliable => QoS::Reliable {
                timeout: cfg.send_timeout(),
            },
        }
    }

    pub async fn send(&self, tx: &mpsc::Sender<Message>, msg: Message) -> Result<(), SendFailure> {
        match *self {
            QoS::Lossy => tx.try_send(msg).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => SendFailure::QueueFull,
                mpsc::error::TrySendError::Closed(_) => SendFailure::Closed,
            }),
            QoS::Reliable { timeout: limit } => match timeout(limit, tx.send(msg)).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(_)) => Err(SendFailure::Closed),
                Err(_) => Err(SendFailure::TimedOut),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendFailure {
    #[error("peer queue full")]
    QueueFull,
    #[error("peer connection closed")]
    Closed,
    #[error("send timed out")]
    TimedOut,
}

/// Error frame sent to a peer in place of data or on rejection.
pub fn error_frame(err: &LedgerGateError) -> Message {
    Message::Text(
        json!({
            "type": "error",
            "code": err.client_code().as_str(),
            "msg": err.to_string(),
        })
        .to_string(),
    )
}
