//! Background task lifecycle: shutdown signalling and fixed-delay retries.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;

use ledgergate_core::error::Result;

/// Fires [`Shutdown`] for every clone observing it.
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

/// Cloneable shutdown observer.
#[derive(Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

pub fn shutdown_channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }

    pub fn subscribe(&self) -> Shutdown {
        Shutdown {
            rx: self.tx.subscribe(),
        }
    }
}

impl Shutdown {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown is triggered. Never resolves if the trigger was
    /// dropped without firing.
    pub async fn wait(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Run `op` until it succeeds, sleeping `delay` between attempts.
///
/// Returns `None` if shutdown fires first.
pub async fn retry_forever<T, F, Fut>(
    what: &str,
    delay: Duration,
    shutdown: &mut Shutdown,
    mut op: F,
) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u64 = 0;
    loop {
        if shutdown.is_triggered() {
            return None;
        }
        attempt += 1;
        match op().await {
            Ok(v) => {
                if attempt > 1 {
                    tracing::info!(what, attempt, "upstream available");
                }
                return Some(v);
            }
            Err(e) => {
                tracing::warn!(
                    what,
                    attempt,
                    error = %e,
                    retry_in_ms = delay.as_millis() as u64,
                    "upstream unavailable; retrying"
                );
            }
        }
        tokio::select! {
            _ = shutdown.wait() => return None,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
