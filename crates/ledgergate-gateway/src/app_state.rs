//! Shared application state.
//!
//! Built once at startup from the config plus the three upstream backends,
//! then cloned into every handler.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::auth::TokenVerifier;
use crate::cache::{run_purge, Cache, MeteredCache};
use crate::config::GatewayConfig;
use crate::documents::PolicyStore;
use crate::ingest::{run_ingestion, ChannelSource, ReadingSource};
use crate::ledger::Ledger;
use crate::obs::GatewayMetrics;
use crate::policy::PolicyResolver;
use crate::realtime::{Pump, PumpHandle, QoS, RealtimeGateway};
use crate::supervise::{retry_forever, Shutdown};

const INGEST_QUEUE: usize = 1024;

/// Upstream collaborators the gateway reads from.
pub struct Backends {
    pub ledger: Arc<dyn Ledger>,
    pub store: Arc<dyn PolicyStore>,
    pub cache: Arc<dyn Cache>,
}

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: GatewayConfig,
    ledger: Arc<dyn Ledger>,
    cache: Arc<dyn Cache>,
    verifier: Arc<TokenVerifier>,
    resolver: Arc<PolicyResolver>,
    gateway: Arc<RealtimeGateway>,
    pump: PumpHandle,
    source: Arc<ChannelSource>,
    metrics: Arc<GatewayMetrics>,
    ledger_ready: AtomicBool,
}

impl AppState {
    /// Build the state and the (not yet running) realtime pump.
    pub fn new(cfg: GatewayConfig, backends: Backends) -> (Self, Pump) {
        let metrics = Arc::new(GatewayMetrics::default());
        let cache: Arc<dyn Cache> = Arc::new(MeteredCache::new(backends.cache, metrics.clone()));

        let verifier = Arc::new(TokenVerifier::new(
            cache.clone(),
            backends.ledger.clone(),
            cfg.security.token_validity(),
            cfg.security.authorized_owners.clone(),
        ));
        let resolver = Arc::new(PolicyResolver::new(
            cache.clone(),
            backends.ledger.clone(),
            backends.store,
            cfg.caching.policy_ttl(),
        ));
        let gateway = Arc::new(RealtimeGateway::new(
            verifier.clone(),
            resolver.clone(),
            metrics.clone(),
            QoS::from_config(&cfg.realtime),
            cfg.realtime.device_param.clone(),
            cfg.realtime.outbound_queue,
        ));
        let (pump, handle) = Pump::new(gateway.clone(), cfg.gateway.poll_interval());

        let state = Self {
            inner: Arc::new(AppStateInner {
                cfg,
                ledger: backends.ledger,
                cache,
                verifier,
                resolver,
                gateway,
                pump: handle,
                source: Arc::new(ChannelSource::new(INGEST_QUEUE)),
                metrics,
                ledger_ready: AtomicBool::new(false),
            }),
        };
        (state, pump)
    }

    /// Start the pump, the ingestion loop, the cache sweeper and the ledger
    /// probe.
    pub fn spawn_workers(&self, pump: Pump, shutdown: &Shutdown) -> Vec<JoinHandle<()>> {
        let pump_task = tokio::spawn(pump.run(shutdown.clone()));

        let source: Arc<dyn ReadingSource> = self.inner.source.clone();
        let ingest_task = tokio::spawn(run_ingestion(
            source,
            self.inner.gateway.clone(),
            self.inner.cfg.realtime.clone(),
            self.inner.metrics.clone(),
            shutdown.clone(),
        ));

        let purge_task = tokio::spawn(run_purge(
            self.inner.cache.clone(),
            self.inner.cfg.caching.purge_interval(),
            shutdown.clone(),
        ));

        let state = self.clone();
        let mut probe_shutdown = shutdown.clone();
        let probe_task = tokio::spawn(async move {
            let ledger = state.inner.ledger.clone();
            let delay = state.inner.cfg.ledger.retry_delay();
            if retry_forever("ledger", delay, &mut probe_shutdown, || ledger.probe())
                .await
                .is_some()
            {
                state.inner.ledger_ready.store(true, Ordering::Relaxed);
                tracing::info!(rpc_url = %state.inner.cfg.ledger.rpc_url, "ledger reachable");
            }
        });

        vec![pump_task, ingest_task, purge_task, probe_task]
    }

    pub fn cfg(&self) -> &GatewayConfig {
        &self.inner.cfg
    }

    pub fn verifier(&self) -> &TokenVerifier {
        &self.inner.verifier
    }

    pub fn resolver(&self) -> &PolicyResolver {
        &self.inner.resolver
    }

    pub fn gateway(&self) -> Arc<RealtimeGateway> {
        Arc::clone(&self.inner.gateway)
    }

    pub fn pump(&self) -> &PumpHandle {
        &self.inner.pump
    }

    pub fn source(&self) -> Arc<ChannelSource> {
        Arc::clone(&self.inner.source)
    }

    pub fn metrics(&self) -> &GatewayMetrics {
        &self.inner.metrics
    }

    pub fn is_ledger_ready(&self) -> bool {
        self.inner.ledger_ready.load(Ordering::Relaxed)
    }

    pub fn is_draining(&self) -> bool {
        self.inner.metrics.is_draining()
    }
}
