//! Architectural Contract Test: Zone and Record Reconciliation
//!
//! This test verifies what the engine sends to the provider for a domain
//! that needs an update.
//!
//! Constraints verified:
//! - Zone TTL is only pushed when it differs from the configured one
//! - Records are updated in place, created when missing, left alone when
//!   current
//! - Hosts with duplicate records are never touched
//! - All queued records go out in ONE update call per domain
//!
//! If this test fails, someone has:
//! - Started sending one update per record
//! - Started "fixing" ambiguous hosts by picking one of the records

mod common;

use common::*;
use dyndns_core::config::DomainConfig;
use dyndns_core::traits::{IpFamily, RecordType};
use dyndns_core::{EngineEvent, ReconciliationEngine};

fn engine_for(
    provider: &ScriptedProvider,
    resolver: FixedResolver,
    domains: Vec<DomainConfig>,
) -> (
    ReconciliationEngine,
    tokio::sync::mpsc::Receiver<EngineEvent>,
) {
    ReconciliationEngine::new(
        config_with(domains, 0),
        None,
        Box::new(provider.clone()),
        Box::new(resolver),
    )
    .expect("engine construction succeeds")
}

#[tokio::test]
async fn differing_zone_ttl_is_updated_once() {
    let provider = ScriptedProvider::new()
        .with_zone("example.com", "300")
        .with_record("example.com", "www", "A", "203.0.113.7");

    let (mut engine, mut events) = engine_for(
        &provider,
        FixedResolver::new("203.0.113.7", ""),
        vec![DomainConfig::new("example.com", 600).with_host("www")],
    );

    let report = engine.run_pass().await.unwrap();

    let updates = provider.zone_updates();
    assert_eq!(updates.len(), 1, "Exactly one zone update");
    assert_eq!(updates[0].1.ttl, "600");
    assert_eq!(updates[0].1.serial, "2024010101", "Other zone fields are kept");
    assert!(report.domain("example.com").unwrap().zone_ttl_updated);
    assert!(
        drain_events(&mut events).contains(&EngineEvent::ZoneTtlUpdated {
            domain: "example.com".to_string(),
            from: 300,
            to: 600,
        })
    );
}

#[tokio::test]
async fn matching_zone_ttl_is_not_updated() {
    let provider = ScriptedProvider::new()
        .with_zone("example.com", "300")
        .with_record("example.com", "www", "A", "203.0.113.7");

    let (mut engine, _events) = engine_for(
        &provider,
        FixedResolver::new("203.0.113.7", ""),
        vec![DomainConfig::new("example.com", 300).with_host("www")],
    );

    let report = engine.run_pass().await.unwrap();

    assert_eq!(provider.call_count(Call::GetZone), 1);
    assert_eq!(provider.call_count(Call::UpdateZone), 0);
    assert!(!report.domain("example.com").unwrap().zone_ttl_updated);
}

#[tokio::test]
async fn missing_record_is_created() {
    let provider = ScriptedProvider::new()
        .with_zone("example.com", "300")
        .with_record("example.com", "mail", "MX", "mx.example.com");

    let (mut engine, _events) = engine_for(
        &provider,
        FixedResolver::new("203.0.113.7", ""),
        vec![DomainConfig::new("example.com", 300).with_host("www")],
    );

    engine.run_pass().await.unwrap();

    let updates = provider.record_updates();
    assert_eq!(updates.len(), 1);
    let created = &updates[0].1.records[0];
    assert!(created.id.is_empty(), "New records are sent without an id");
    assert_eq!(created.hostname, "www");
    assert_eq!(created.record_type, "A");
    assert_eq!(created.destination, "203.0.113.7");
}

#[tokio::test]
async fn stale_record_is_updated_in_place() {
    let provider = ScriptedProvider::new()
        .with_zone("example.com", "300")
        .with_record("example.com", "www", "A", "198.51.100.1");
    let existing_id = provider.records("example.com")[0].id.clone();

    let (mut engine, _events) = engine_for(
        &provider,
        FixedResolver::new("203.0.113.7", ""),
        vec![DomainConfig::new("example.com", 300).with_host("www")],
    );

    engine.run_pass().await.unwrap();

    let records = provider.records("example.com");
    assert_eq!(records.len(), 1, "No duplicate record was created");
    assert_eq!(records[0].id, existing_id);
    assert_eq!(records[0].destination, "203.0.113.7");
}

#[tokio::test]
async fn current_record_sends_no_update() {
    let provider = ScriptedProvider::new()
        .with_zone("example.com", "300")
        .with_record("example.com", "www", "A", "203.0.113.7");

    let (mut engine, _events) = engine_for(
        &provider,
        FixedResolver::new("203.0.113.7", ""),
        vec![DomainConfig::new("example.com", 300).with_host("www")],
    );

    let report = engine.run_pass().await.unwrap();

    assert_eq!(provider.call_count(Call::UpdateRecords), 0);
    assert_eq!(report.domain("example.com").unwrap().records_queued, 0);
}

#[tokio::test]
async fn ambiguous_host_is_left_alone() {
    let provider = ScriptedProvider::new()
        .with_zone("example.com", "300")
        .with_record("example.com", "www", "A", "198.51.100.1")
        .with_record("example.com", "www", "A", "198.51.100.2")
        .with_record("example.com", "home", "A", "198.51.100.3");

    let (mut engine, mut events) = engine_for(
        &provider,
        FixedResolver::new("203.0.113.7", ""),
        vec![
            DomainConfig::new("example.com", 300)
                .with_host("www")
                .with_host("home"),
        ],
    );

    let report = engine.run_pass().await.unwrap();

    let domain = report.domain("example.com").unwrap();
    assert_eq!(domain.ambiguous, vec![("www".to_string(), RecordType::A)]);

    let updates = provider.record_updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].1.len(), 1, "Only the unambiguous host is queued");
    assert_eq!(updates[0].1.records[0].hostname, "home");

    let www: Vec<_> = provider
        .records("example.com")
        .into_iter()
        .filter(|r| r.hostname == "www")
        .map(|r| r.destination)
        .collect();
    assert_eq!(www, vec!["198.51.100.1", "198.51.100.2"]);

    assert!(
        drain_events(&mut events).contains(&EngineEvent::AmbiguousRecords {
            domain: "example.com".to_string(),
            host: "www".to_string(),
            record_type: RecordType::A,
            count: 2,
        })
    );
}

#[tokio::test]
async fn all_queued_records_go_out_in_one_call() {
    let provider = ScriptedProvider::new()
        .with_zone("example.com", "300")
        .with_record("example.com", "www", "A", "198.51.100.1");

    let (mut engine, mut events) = engine_for(
        &provider,
        FixedResolver::new("203.0.113.7", "2001:db8::7"),
        vec![
            DomainConfig::new("example.com", 300)
                .with_host("www")
                .with_host("@")
                .with_ipv6(true),
        ],
    );

    let report = engine.run_pass().await.unwrap();

    assert_eq!(provider.call_count(Call::UpdateRecords), 1);
    let updates = provider.record_updates();
    let queued: Vec<_> = updates[0]
        .1
        .records
        .iter()
        .map(|r| (r.hostname.as_str(), r.record_type.as_str()))
        .collect();
    assert_eq!(
        queued,
        vec![("www", "A"), ("www", "AAAA"), ("@", "A"), ("@", "AAAA")],
        "Hosts in configured order, A before AAAA"
    );
    assert_eq!(report.domain("example.com").unwrap().records_queued, 4);
    assert!(
        drain_events(&mut events).contains(&EngineEvent::RecordsUpdated {
            domain: "example.com".to_string(),
            count: 4,
        })
    );
}

#[tokio::test]
async fn ipv6_is_only_resolved_when_a_domain_enables_it() {
    let provider = ScriptedProvider::new()
        .with_zone("example.com", "300")
        .with_zone("example.org", "300");
    let resolver = FixedResolver::new("203.0.113.7", "2001:db8::7");

    let (mut engine, _events) = engine_for(
        &provider,
        resolver.clone(),
        vec![
            DomainConfig::new("example.com", 300).with_host("www"),
            DomainConfig::new("example.org", 300).with_host("www"),
        ],
    );

    let report = engine.run_pass().await.unwrap();

    assert_eq!(resolver.call_count(IpFamily::V4), 1);
    assert_eq!(resolver.call_count(IpFamily::V6), 0);
    assert!(report.addresses.ipv6.is_empty());
    assert!(
        provider
            .records("example.org")
            .iter()
            .all(|r| r.record_type == "A")
    );
}

#[tokio::test]
async fn ipv6_only_domain_manages_only_aaaa_records() {
    let provider = ScriptedProvider::new()
        .with_zone("example.com", "300")
        .with_record("example.com", "www", "A", "198.51.100.1");
    let resolver = FixedResolver::new("203.0.113.7", "2001:db8::7");

    let (mut engine, _events) = engine_for(
        &provider,
        resolver.clone(),
        vec![
            DomainConfig::new("example.com", 300)
                .with_host("www")
                .with_ipv4(false)
                .with_ipv6(true),
        ],
    );

    engine.run_pass().await.unwrap();

    assert_eq!(resolver.call_count(IpFamily::V4), 0);
    let records = provider.records("example.com");
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].destination, "198.51.100.1", "A record untouched");
    assert_eq!(records[1].record_type, "AAAA");
    assert_eq!(records[1].destination, "2001:db8::7");
}
