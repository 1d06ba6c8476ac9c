#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::time::Duration;

use ledgergate_gateway::config::{self, DeliveryMode};

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
ledger:
  rpc_url: "http://127.0.0.1:8545"
  retry_delay: 10   # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.client_code().as_str(), "BAD_REQUEST");
}

#[test]
fn ok_minimal_config() {
    let ok = r#"
version: 1
ledger:
  rpc_url: "http://127.0.0.1:8545"
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.gateway.poll_interval(), Duration::from_millis(15));
    assert_eq!(cfg.security.token_validity(), Duration::from_secs(3600));
    assert_eq!(cfg.caching.policy_ttl(), Duration::from_secs(3600));
    assert_eq!(cfg.caching.purge_interval(), Duration::from_secs(60));
    assert_eq!(cfg.ledger.retry_delay(), Duration::from_secs(5));
    assert_eq!(cfg.realtime.delivery, DeliveryMode::Reliable);
    assert_eq!(cfg.realtime.resource_for("temperatureRT"), Some("temperature"));
    assert_eq!(cfg.realtime.resource_for("humidityRT"), Some("humidity"));
    assert!(cfg.resources.is_empty());
}

#[test]
fn ledger_section_is_required() {
    let err = config::load_from_str("version: 1\n").expect_err("must fail");
    assert_eq!(err.client_code().as_str(), "BAD_REQUEST");
}

#[test]
fn version_must_be_one() {
    let err = config::load_from_str(
        "version: 2\nledger:\n  rpc_url: \"http://127.0.0.1:8545\"\n",
    )
    .expect_err("must fail");
    assert_eq!(err.client_code().as_str(), "INTERNAL");
}

#[test]
fn checks_need_exactly_one_condition() {
    let bad = r#"
version: 1
ledger:
  rpc_url: "http://127.0.0.1:8545"
resources:
  - name: temperature
    checks:
      - { query: count, int: less_than, bool: equal }
"#;
    assert!(config::load_from_str(bad).is_err());

    let unknown_kind = r#"
version: 1
ledger:
  rpc_url: "http://127.0.0.1:8545"
resources:
  - name: temperature
    checks:
      - { query: count, int: at_most }
"#;
    assert!(config::load_from_str(unknown_kind).is_err());
}

#[test]
fn duplicate_stream_queues_are_rejected() {
    let bad = r#"
version: 1
ledger:
  rpc_url: "http://127.0.0.1:8545"
realtime:
  streams:
    - { queue: temperatureRT, resource: temperature }
    - { queue: temperatureRT, resource: humidity }
"#;
    assert!(config::load_from_str(bad).is_err());
}

#[test]
fn full_sample_parses() {
    let sample = r#"
version: 1
gateway:
  listen: "127.0.0.1:9000"
  poll_interval_ms: 15
  handshake_timeout_ms: 5000
security:
  token_validity_secs: 600
  authorized_owners: ["0x00000000000000000000000000000000000000ee"]
caching:
  policy_ttl_secs: 120
  purge_interval_secs: 30
ledger:
  rpc_url: "https://rpc.example"
  retry_delay_ms: 5000
realtime:
  delivery: lossy
  send_timeout_ms: 1500
  outbound_queue: 64
  device_param: devices
  reconnect_delay_ms: 2000
  streams:
    - { queue: temperatureRT, resource: temperature }
resources:
  - name: temperature
    checks:
      - { query: count, policy: max_items, int: less_or_equal }
      - { query: deviceNames, policy: devices, list: all_contained_in }
      - { query: raw, bool: equal }
      - { query: site, string: is_contained_in }
"#;
    let cfg = config::load_from_str(sample).unwrap();
    assert_eq!(cfg.realtime.delivery, DeliveryMode::Lossy);
    assert_eq!(cfg.resource("TEMPERATURE").unwrap().checks.len(), 4);
    assert_eq!(cfg.resources[0].checks[0].policy_param(), "max_items");
    assert_eq!(cfg.resources[0].checks[2].policy_param(), "raw");
}

#[test]
fn durations_are_bounded() {
    let with = |section: &str| {
        format!("version: 1\nledger:\n  rpc_url: \"http://127.0.0.1:8545\"\n{section}")
    };

    for bad in [
        "caching:\n  policy_ttl_secs: 18446744073709551615\n",
        "caching:\n  policy_ttl_secs: 2592001\n",
        "caching:\n  purge_interval_secs: 0\n",
        "security:\n  token_validity_secs: 18446744073709551615\n",
        "realtime:\n  send_timeout_ms: 18446744073709551615\n",
        "realtime:\n  reconnect_delay_ms: 0\n",
    ] {
        let err = config::load_from_str(&with(bad)).expect_err(bad);
        assert_eq!(err.client_code().as_str(), "BAD_REQUEST", "{bad}");
    }

    let ok = config::load_from_str(&with("caching:\n  policy_ttl_secs: 2592000\n")).unwrap();
    assert_eq!(ok.caching.policy_ttl(), Duration::from_secs(2_592_000));
}
