//! In-process metrics registry rendered as Prometheus text.
//!
//! Counters, gauges and a microsecond histogram keyed by sorted label sets,
//! all stored in `DashMap`s of atomics so the hot paths never lock.

use std::fmt::Write;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;

type LabelKey = Vec<(String, String)>;

fn label_key(labels: &[(&str, &str)]) -> LabelKey {
    let mut key: LabelKey = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    key.sort();
    key
}

fn render_labels(key: &LabelKey) -> String {
    key.iter()
        .map(|(k, v)| {
            let v = v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n");
            format!("{k}=\"{v}\"")
        })
        .collect::<Vec<_>>()
        .join(",")
}

#[derive(Default)]
pub struct CounterVec {
    map: DashMap<LabelKey, AtomicU64>,
}

impl CounterVec {
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(labels, 1);
    }

    pub fn add(&self, labels: &[(&str, &str)], v: u64) {
        self.map
            .entry(label_key(labels))
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(v, Ordering::Relaxed);
    }

    /// Current value for an exact label set (0 if never touched).
    pub fn get(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {name} counter");
        for r in self.map.iter() {
            let _ = writeln!(
                out,
                "{name}{{{}}} {}",
                render_labels(r.key()),
                r.value().load(Ordering::Relaxed)
            );
        }
    }
}

#[derive(Default)]
pub struct GaugeVec {
    map: DashMap<LabelKey, AtomicI64>,
}

impl GaugeVec {
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(labels, 1);
    }

    pub fn dec(&self, labels: &[(&str, &str)]) {
        self.add(labels, -1);
    }

    pub fn add(&self, labels: &[(&str, &str)], v: i64) {
        self.map
            .entry(label_key(labels))
            .or_insert_with(|| AtomicI64::new(0))
            .fetch_add(v, Ordering::Relaxed);
    }

    pub fn get(&self, labels: &[(&str, &str)]) -> i64 {
        self.map
            .get(&label_key(labels))
            .map(|g| g.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {name} gauge");
        for r in self.map.iter() {
            let _ = writeln!(
                out,
                "{name}{{{}}} {}",
                render_labels(r.key()),
                r.value().load(Ordering::Relaxed)
            );
        }
    }
}

// 1ms .. 5s; fan-out time is dominated by ledger and document round-trips.
const BUCKETS_MICROS: [u64; 8] = [
    1_000, 5_000, 10_000, 50_000, 100_000, 500_000, 1_000_000, 5_000_000,
];

#[derive(Default)]
struct Histogram {
    count: AtomicU64,
    sum: AtomicU64,
    buckets: [AtomicU64; BUCKETS_MICROS.len()],
}

#[derive(Default)]
pub struct HistogramVec {
    map: DashMap<LabelKey, Histogram>,
}

impl HistogramVec {
    pub fn observe(&self, labels: &[(&str, &str)], elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        let hist = self.map.entry(label_key(labels)).or_default();
        hist.count.fetch_add(1, Ordering::Relaxed);
        hist.sum.fetch_add(micros, Ordering::Relaxed);
        for (bucket, le) in hist.buckets.iter().zip(BUCKETS_MICROS) {
            if micros <= le {
                bucket.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {name} histogram");
        for r in self.map.iter() {
            let labels = render_labels(r.key());
            let prefix = if labels.is_empty() { String::new() } else { format!("{labels},") };
            let hist = r.value();
            for (bucket, le) in hist.buckets.iter().zip(BUCKETS_MICROS) {
                let _ = writeln!(
                    out,
                    "{name}_bucket{{{prefix}le=\"{le}\"}} {}",
                    bucket.load(Ordering::Relaxed)
                );
            }
            let count = hist.count.load(Ordering::Relaxed);
            let _ = writeln!(out, "{name}_bucket{{{prefix}le=\"+Inf\"}} {count}");
            let _ = writeln!(out, "{name}_sum{{{labels}}} {}", hist.sum.load(Ordering::Relaxed));
            let _ = writeln!(out, "{name}_count{{{labels}}} {count}");
        }
    }
}

#[derive(Default)]
pub struct GatewayMetrics {
    /// `outcome` = accepted | rejected, plus `code` on rejection.
    pub admissions: CounterVec,
    pub peers_connected: GaugeVec,
    /// `outcome` = sent | skipped | error | send_failed | dropped.
    pub deliveries: CounterVec,
    /// Per peer and reading, from dequeue to send.
    pub delivery_duration: HistogramVec,
    /// `queue`, `outcome` = routed | unrouted.
    pub ingested: CounterVec,
    /// `outcome` = hit | miss.
    pub cache_lookups: CounterVec,
    /// `route`, `status`.
    pub http_decisions: CounterVec,
    draining: AtomicBool,
}

impl GatewayMetrics {
    pub fn set_draining(&self) {
        self.draining.store(true, Ordering::Relaxed);
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Relaxed)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        self.admissions.render("ledgergate_admissions_total", &mut out);
        self.peers_connected.render("ledgergate_peers_connected", &mut out);
        self.deliveries.render("ledgergate_deliveries_total", &mut out);
        self.delivery_duration.render("ledgergate_delivery_duration_micros", &mut out);
        self.ingested.render("ledgergate_ingested_readings_total", &mut out);
        self.cache_lookups.render("ledgergate_cache_lookups_total", &mut out);
        self.http_decisions.render("ledgergate_http_decisions_total", &mut out);
        let _ = writeln!(
            out,
            "# TYPE ledgergate_draining gauge\nledgergate_draining {}",
            u8::from(self.is_draining())
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_order_independent() {
        let m = GatewayMetrics::default();
        m.admissions.inc(&[("outcome", "rejected"), ("code", "UNAUTHORIZED")]);
        m.admissions.inc(&[("code", "UNAUTHORIZED"), ("outcome", "rejected")]);
        assert_eq!(m.admissions.get(&[("outcome", "rejected"), ("code", "UNAUTHORIZED")]), 2);
    }

    #[test]
    fn renders_prometheus_text() {
        let m = GatewayMetrics::default();
        m.deliveries.inc(&[("outcome", "sent")]);
        m.peers_connected.inc(&[]);
        m.delivery_duration.observe(&[("resource", "temperature")], Duration::from_millis(2));
        m.set_draining();

        let text = m.render();
        assert!(text.contains("ledgergate_deliveries_total{outcome=\"sent\"} 1"));
        assert!(text.contains("ledgergate_peers_connected{} 1"));
        assert!(text.contains(
            "ledgergate_delivery_duration_micros_bucket{resource=\"temperature\",le=\"1000\"} 0"
        ));
        assert!(text.contains(
            "ledgergate_delivery_duration_micros_bucket{resource=\"temperature\",le=\"5000\"} 1"
        ));
        assert!(text.contains("ledgergate_draining 1"));
    }
}
