#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use chrono::Utc;

use common::{policy_body, Fixture, CONTRACT_A, HOUR};
use ledgergate_core::error::LedgerGateError;
use ledgergate_core::hash::keccak256;
use ledgergate_gateway::cache::{self, Cache};
use ledgergate_gateway::ledger::LedgerParam;
use ledgergate_gateway::policy::{IntCondition, PolicyRule, StringCondition};

fn devices(items: &[&str]) -> PolicyRule {
    PolicyRule::string(
        "devices",
        StringCondition::AllContainedIn(items.iter().map(|s| s.to_string()).collect()),
    )
}

#[tokio::test]
async fn off_chain_policy_with_matching_hash_is_used() {
    let fx = Fixture::new();
    fx.deploy(CONTRACT_A, &common::key(1));
    fx.publish_policy(CONTRACT_A, "temperature", &policy_body(r#""devices":"dev1,dev2","max_items":10"#));

    let resolver = fx.resolver();
    resolver
        .verify_policy(CONTRACT_A, "Temperature", &[devices(&["dev1"])])
        .await
        .unwrap();
    assert_eq!(
        resolver
            .verify_policy(CONTRACT_A, "temperature", &[devices(&["dev1", "dev3"])])
            .await,
        Err(LedgerGateError::PolicyRuleViolation {
            resource: "temperature".into(),
            parameter: "devices".into(),
        })
    );
}

#[tokio::test]
async fn any_single_byte_mutation_is_a_hash_mismatch() {
    let body = policy_body(r#""devices":"dev1""#);
    let pinned = keccak256(body.as_bytes());

    for i in [0, body.len() / 2, body.len() - 1] {
        let fx = Fixture::new();
        fx.deploy(CONTRACT_A, &common::key(1));
        let location = fx.publish_policy(CONTRACT_A, "temperature", &body);

        let mut tampered = body.clone().into_bytes();
        tampered[i] ^= 0x01;
        assert_ne!(keccak256(&tampered), pinned);
        fx.store.put(&location, tampered);

        assert_eq!(
            fx.resolver().verify_policy(CONTRACT_A, "temperature", &[]).await,
            Err(LedgerGateError::PolicyHashMismatch("temperature".into())),
            "mutation at byte {i}"
        );
    }
}

#[tokio::test]
async fn off_chain_window_is_enforced() {
    let fx = Fixture::new();
    fx.deploy(CONTRACT_A, &common::key(1));
    fx.publish_policy(
        CONTRACT_A,
        "temperature",
        r#"{"start_time":"2020-01-01T00:00:00","expiration":"2020-12-31T00:00:00"}"#,
    );

    assert!(matches!(
        fx.resolver().verify_policy(CONTRACT_A, "temperature", &[]).await,
        Err(LedgerGateError::PolicyWindowExpired { .. })
    ));
}

#[tokio::test]
async fn ocp_window_boundaries() {
    let now = Utc::now();
    let hour = chrono::Duration::hours(1);
    let cases = [
        (now - hour, now + hour, None),
        (now + hour, now + hour * 2, Some("not started")),
        (now - hour * 2, now - hour, Some("expired")),
    ];

    for (start, expiration, expected) in cases {
        let fx = Fixture::new();
        fx.deploy(CONTRACT_A, &common::key(1));
        fx.create_ocp(CONTRACT_A, "humidity", start, expiration, &[]);

        let out = fx.resolver().verify_policy_at(CONTRACT_A, "humidity", &[], now).await;
        match expected {
            None => out.unwrap(),
            Some("not started") => assert!(matches!(out, Err(LedgerGateError::PolicyWindowNotStarted { .. }))),
            Some(_) => assert!(matches!(out, Err(LedgerGateError::PolicyWindowExpired { .. }))),
        }
    }
}

#[tokio::test]
async fn ocp_int_rule_on_max_items() {
    let fx = Fixture::new();
    fx.deploy(CONTRACT_A, &common::key(1));
    let now = Utc::now();
    let hour = chrono::Duration::hours(1);
    fx.create_ocp(
        CONTRACT_A,
        "temperature",
        now - hour,
        now + hour,
        &[("max_items", LedgerParam::Int(10))],
    );
    let resolver = fx.resolver();

    resolver
        .verify_policy(CONTRACT_A, "temperature", &[PolicyRule::int("max_items", IntCondition::LessOrEqual(5))])
        .await
        .unwrap();
    assert_eq!(
        resolver
            .verify_policy(CONTRACT_A, "temperature", &[PolicyRule::int("max_items", IntCondition::LessOrEqual(11))])
            .await,
        Err(LedgerGateError::PolicyRuleViolation {
            resource: "temperature".into(),
            parameter: "max_items".into(),
        })
    );
}

#[tokio::test]
async fn unreadable_ocp_parameter_fails_closed() {
    let fx = Fixture::new();
    fx.deploy(CONTRACT_A, &common::key(1));
    let now = Utc::now();
    let hour = chrono::Duration::hours(1);
    fx.create_ocp(
        CONTRACT_A,
        "temperature",
        now - hour,
        now + hour,
        &[("devices", LedgerParam::Int(3))],
    );

    let out = fx
        .resolver()
        .verify_policy(CONTRACT_A, "temperature", &[devices(&["dev1"])])
        .await;
    assert!(matches!(out, Err(LedgerGateError::PolicyRuleViolation { .. })));
}

#[tokio::test]
async fn missing_contract_and_missing_policy() {
    let fx = Fixture::new();
    assert_eq!(
        fx.resolver().verify_policy(CONTRACT_A, "temperature", &[]).await,
        Err(LedgerGateError::ContractNotFound(CONTRACT_A.into()))
    );

    fx.deploy(CONTRACT_A, &common::key(1));
    assert_eq!(
        fx.resolver().verify_policy(CONTRACT_A, "temperature", &[]).await,
        Err(LedgerGateError::PolicyNotFound("temperature".into()))
    );
}

#[tokio::test(start_paused = true)]
async fn off_chain_lookups_are_cached_for_the_ttl() {
    let fx = Fixture::new();
    fx.deploy(CONTRACT_A, &common::key(1));
    fx.publish_policy(CONTRACT_A, "temperature", &policy_body(r#""devices":"dev1""#));
    let resolver = fx.resolver();
    let rules = [devices(&["dev1"])];

    resolver.verify_policy(CONTRACT_A, "temperature", &rules).await.unwrap();
    assert_eq!((fx.ledger.reads(), fx.store.fetches()), (1, 1));

    resolver.verify_policy(CONTRACT_A, "temperature", &rules).await.unwrap();
    assert_eq!((fx.ledger.reads(), fx.store.fetches()), (1, 1));

    tokio::time::advance(HOUR + std::time::Duration::from_secs(1)).await;
    resolver.verify_policy(CONTRACT_A, "temperature", &rules).await.unwrap();
    assert_eq!((fx.ledger.reads(), fx.store.fetches()), (2, 2));
}

#[tokio::test(start_paused = true)]
async fn on_chain_lookups_are_cached_for_the_ttl() {
    let fx = Fixture::new();
    fx.deploy(CONTRACT_A, &common::key(1));
    let now = Utc::now();
    let hour = chrono::Duration::hours(1);
    fx.create_ocp(
        CONTRACT_A,
        "temperature",
        now - hour,
        now + hour,
        &[("devices", LedgerParam::Str("dev1,dev2".into()))],
    );
    let resolver = fx.resolver();
    let rules = [devices(&["dev2"])];

    resolver.verify_policy(CONTRACT_A, "temperature", &rules).await.unwrap();
    let first = fx.ledger.reads();
    assert_eq!(first, 3, "policy list, OCP list, one parameter");

    resolver.verify_policy(CONTRACT_A, "temperature", &rules).await.unwrap();
    assert_eq!(fx.ledger.reads(), first);
    assert_eq!(fx.store.fetches(), 0);

    tokio::time::advance(HOUR + std::time::Duration::from_secs(1)).await;
    resolver.verify_policy(CONTRACT_A, "temperature", &rules).await.unwrap();
    assert_eq!(fx.ledger.reads(), first * 2);
}

#[tokio::test]
async fn a_resource_with_no_policy_is_not_remembered_as_on_chain() {
    let fx = Fixture::new();
    fx.deploy(CONTRACT_A, &common::key(1));
    let resolver = fx.resolver();
    let rules = [devices(&["dev1"])];

    assert_eq!(
        resolver.verify_policy(CONTRACT_A, "temperature", &rules).await,
        Err(LedgerGateError::PolicyNotFound("temperature".into()))
    );
    let marker = cache::policy_key(CONTRACT_A, "temperature");
    assert_eq!(fx.cache.get(&marker).await.unwrap(), None);

    // A policy published right after is used without waiting out a TTL.
    fx.publish_policy(CONTRACT_A, "temperature", &policy_body(r#""devices":"dev1""#));
    resolver.verify_policy(CONTRACT_A, "temperature", &rules).await.unwrap();
    assert_eq!(fx.store.fetches(), 1);
}
