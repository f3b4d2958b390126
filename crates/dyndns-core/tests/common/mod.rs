//! Test doubles and common utilities for reconciliation contract tests
//!
//! The provider double keeps an in-memory address book per domain, applies
//! updates to it like the real API would, and counts every call.

#![allow(dead_code)]

use dyndns_core::config::{Config, Credentials, DomainConfig};
use dyndns_core::error::{Error, Result};
use dyndns_core::traits::{DnsProvider, DnsRecord, IpFamily, IpResolver, RecordSet, Zone};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Provider calls that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    Authenticate,
    GetZone,
    UpdateZone,
    GetRecords,
    UpdateRecords,
}

#[derive(Default)]
struct ProviderState {
    authenticated: bool,
    zones: HashMap<String, Zone>,
    records: HashMap<String, Vec<DnsRecord>>,
    calls: Vec<(Call, String)>,
    zone_updates: Vec<(String, Zone)>,
    record_updates: Vec<(String, RecordSet)>,
    failures: HashMap<Call, Error>,
    next_id: usize,
}

/// A scripted in-memory DnsProvider
///
/// Clones share the same state, so a test can keep one handle and give the
/// engine another.
#[derive(Clone, Default)]
pub struct ScriptedProvider {
    state: Arc<Mutex<ProviderState>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a zone with the given TTL
    pub fn with_zone(self, domain: &str, ttl: &str) -> Self {
        self.state.lock().unwrap().zones.insert(
            domain.to_string(),
            Zone {
                domain_name: domain.to_string(),
                ttl: ttl.to_string(),
                serial: "2024010101".to_string(),
                refresh: "28800".to_string(),
                retry: "7200".to_string(),
                expire: "1209600".to_string(),
                dnssec_status: false,
            },
        );
        self
    }

    /// Add an existing record
    pub fn with_record(self, domain: &str, host: &str, record_type: &str, destination: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.next_id += 1;
            let id = state.next_id.to_string();
            state
                .records
                .entry(domain.to_string())
                .or_default()
                .push(DnsRecord {
                    id,
                    hostname: host.to_string(),
                    record_type: record_type.to_string(),
                    destination: destination.to_string(),
                    state: "yes".to_string(),
                    ..DnsRecord::default()
                });
        }
        self
    }

    /// Make `call` fail with a provider status error
    pub fn failing_on(self, call: Call) -> Self {
        self.state.lock().unwrap().failures.insert(
            call,
            Error::provider("scripted", "Request failed.", format!("{:?} is scripted to fail", call)),
        );
        self
    }

    /// Make `call` fail with `error`
    pub fn failing_with(self, call: Call, error: Error) -> Self {
        self.state.lock().unwrap().failures.insert(call, error);
        self
    }

    /// Number of calls of `call`
    pub fn call_count(&self, call: Call) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(c, _)| *c == call)
            .count()
    }

    /// Number of zone/record calls made for `domain`
    pub fn calls_for(&self, domain: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(_, d)| d == domain)
            .count()
    }

    /// Number of zone and record update calls
    pub fn update_call_count(&self) -> usize {
        self.call_count(Call::UpdateZone) + self.call_count(Call::UpdateRecords)
    }

    /// Zone updates, in call order
    pub fn zone_updates(&self) -> Vec<(String, Zone)> {
        self.state.lock().unwrap().zone_updates.clone()
    }

    /// Record updates, in call order
    pub fn record_updates(&self) -> Vec<(String, RecordSet)> {
        self.state.lock().unwrap().record_updates.clone()
    }

    /// Current records of `domain`
    pub fn records(&self, domain: &str) -> Vec<DnsRecord> {
        self.state
            .lock()
            .unwrap()
            .records
            .get(domain)
            .cloned()
            .unwrap_or_default()
    }

    /// Reset call counters and recorded updates, keeping the address book
    pub fn reset_calls(&self) {
        let mut state = self.state.lock().unwrap();
        state.calls.clear();
        state.zone_updates.clear();
        state.record_updates.clear();
    }

    fn begin(&self, call: Call, domain: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push((call, domain.to_string()));

        if call != Call::Authenticate && !state.authenticated {
            return Err(Error::not_authenticated("scripted"));
        }

        match state.failures.remove(&call) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl DnsProvider for ScriptedProvider {
    async fn authenticate(&self, _credentials: &Credentials) -> Result<()> {
        self.begin(Call::Authenticate, "")?;
        self.state.lock().unwrap().authenticated = true;
        Ok(())
    }

    async fn get_zone(&self, domain: &str) -> Result<Zone> {
        self.begin(Call::GetZone, domain)?;
        self.state
            .lock()
            .unwrap()
            .zones
            .get(domain)
            .cloned()
            .ok_or_else(|| Error::provider("scripted", "Zone not found.", domain.to_string()))
    }

    async fn update_zone(&self, domain: &str, zone: &Zone) -> Result<()> {
        self.begin(Call::UpdateZone, domain)?;
        let mut state = self.state.lock().unwrap();
        state.zones.insert(domain.to_string(), zone.clone());
        state.zone_updates.push((domain.to_string(), zone.clone()));
        Ok(())
    }

    async fn get_records(&self, domain: &str) -> Result<RecordSet> {
        self.begin(Call::GetRecords, domain)?;
        Ok(RecordSet::new(
            self.state
                .lock()
                .unwrap()
                .records
                .get(domain)
                .cloned()
                .unwrap_or_default(),
        ))
    }

    async fn update_records(&self, domain: &str, records: &RecordSet) -> Result<()> {
        self.begin(Call::UpdateRecords, domain)?;
        let mut state = self.state.lock().unwrap();
        state
            .record_updates
            .push((domain.to_string(), records.clone()));

        for record in &records.records {
            if record.id.is_empty() {
                state.next_id += 1;
                let mut created = record.clone();
                created.id = state.next_id.to_string();
                state
                    .records
                    .entry(domain.to_string())
                    .or_default()
                    .push(created);
            } else if let Some(existing) = state
                .records
                .entry(domain.to_string())
                .or_default()
                .iter_mut()
                .find(|r| r.id == record.id)
            {
                *existing = record.clone();
            }
        }

        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}

/// An IpResolver that answers with fixed addresses
#[derive(Clone)]
pub struct FixedResolver {
    ipv4: String,
    ipv6: String,
    fail: Option<IpFamily>,
    v4_calls: Arc<AtomicUsize>,
    v6_calls: Arc<AtomicUsize>,
}

impl FixedResolver {
    pub fn new(ipv4: &str, ipv6: &str) -> Self {
        Self {
            ipv4: ipv4.to_string(),
            ipv6: ipv6.to_string(),
            fail: None,
            v4_calls: Arc::new(AtomicUsize::new(0)),
            v6_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fail every lookup of `family`
    pub fn failing_for(mut self, family: IpFamily) -> Self {
        self.fail = Some(family);
        self
    }

    /// Number of lookups of `family`
    pub fn call_count(&self, family: IpFamily) -> usize {
        match family {
            IpFamily::V4 => self.v4_calls.load(Ordering::SeqCst),
            IpFamily::V6 => self.v6_calls.load(Ordering::SeqCst),
        }
    }
}

#[async_trait::async_trait]
impl IpResolver for FixedResolver {
    async fn resolve(&self, family: IpFamily) -> Result<String> {
        match family {
            IpFamily::V4 => self.v4_calls.fetch_add(1, Ordering::SeqCst),
            IpFamily::V6 => self.v6_calls.fetch_add(1, Ordering::SeqCst),
        };

        if self.fail == Some(family) {
            return Err(Error::resolution(format!("{} echo service unreachable", family)));
        }

        Ok(match family {
            IpFamily::V4 => self.ipv4.clone(),
            IpFamily::V6 => self.ipv6.clone(),
        })
    }
}

/// Helper to create a minimal Config for testing
pub fn config_with(domains: Vec<DomainConfig>, cache_timeout_secs: u64) -> Config {
    Config {
        customer_number: 12345,
        api_key: "test-key".to_string(),
        api_password: "test-password".to_string(),
        cache_location: None,
        cache_timeout_secs,
        ipv4_service_url: dyndns_core::config::DEFAULT_IPV4_SERVICE_URL.to_string(),
        ipv6_service_url: dyndns_core::config::DEFAULT_IPV6_SERVICE_URL.to_string(),
        domains,
    }
}

/// Drain all events currently in the channel
pub fn drain_events(
    rx: &mut tokio::sync::mpsc::Receiver<dyndns_core::EngineEvent>,
) -> Vec<dyndns_core::EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
