//! ledgergate gateway binary.
//!
//! Loads the YAML config named by `LEDGERGATE_CONFIG`, connects to the
//! ledger over JSON-RPC, and serves HTTP + realtime on one listener until
//! Ctrl-C.

use std::net::SocketAddr;
use std::sync::Arc;

use ledgergate_core::error::{LedgerGateError, Result};
use ledgergate_gateway::app_state::{AppState, Backends};
use ledgergate_gateway::cache::MemoryCache;
use ledgergate_gateway::documents::HttpPolicyStore;
use ledgergate_gateway::ledger::RpcLedger;
use ledgergate_gateway::supervise::shutdown_channel;
use ledgergate_gateway::{config, obs, router};

#[tokio::main]
async fn main() {
    obs::init_tracing();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "ledgergate-gateway failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let path = config::config_path();
    let cfg = config::load_from_file(&path)?;
    let listen: SocketAddr = cfg
        .gateway
        .listen
        .parse()
        .map_err(|e| LedgerGateError::BadRequest(format!("gateway.listen: {e}")))?;

    let backends = Backends {
        ledger: Arc::new(RpcLedger::new(cfg.ledger.rpc_url.clone())),
        store: Arc::new(HttpPolicyStore::new()),
        cache: Arc::new(MemoryCache::new()),
    };
    let (state, pump) = AppState::new(cfg, backends);

    let (trigger, shutdown) = shutdown_channel();
    let workers = state.spawn_workers(pump, &shutdown);
    let app = router::build_router(state.clone());

    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| LedgerGateError::Internal(format!("bind {listen}: {e}")))?;
    tracing::info!(%listen, config = %path, "ledgergate-gateway starting");

    let drain_state = state.clone();
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested; draining");
            drain_state.metrics().set_draining();
            trigger.trigger();
        })
        .await
        .map_err(|e| LedgerGateError::Internal(format!("server failed: {e}")))?;

    for worker in workers {
        let _ = worker.await;
    }
    tracing::info!("ledgergate-gateway stopped");
    Ok(())
}
