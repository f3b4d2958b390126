//! Reconciliation engine
//!
//! The ReconciliationEngine runs one pass over all configured domains:
//! - Authenticates against the DnsProvider
//! - Resolves the current public addresses via the IpResolver
//! - Consults the AddressCache to skip domains that are already up to date
//! - Corrects the zone TTL and the A/AAAA records of stale domains
//! - Persists the cache when anything changed
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐           ┌──────────────────────┐           ┌─────────────┐
//! │ IpResolver  │──address─▶│ ReconciliationEngine │◀─records──│ DnsProvider │
//! └─────────────┘           └──────────────────────┘──update──▶└─────────────┘
//!                                 │            │
//!                                 ▼            ▼
//!                         ┌──────────────┐ ┌─────────────┐
//!                         │ AddressCache │ │   Events    │
//!                         │ (skip/store) │ │  (notify)   │
//!                         └──────────────┘ └─────────────┘
//! ```
//!
//! ## Pass Flow
//!
//! 1. Authenticate (fatal on failure)
//! 2. Resolve IPv4/IPv6 for the families any domain enables (fatal on failure)
//! 3. Per domain: decide via cache, then zone TTL, then one batched record update
//! 4. Store the cache
//!
//! Any provider error ends the pass. The caller decides whether to run
//! another one later.

use crate::cache::AddressCache;
use crate::config::{Config, DomainConfig};
use crate::error::{Error, Result};
use crate::traits::{DnsProvider, DnsRecord, IpFamily, IpResolver, RecordSet, RecordType};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

/// Capacity of the engine event channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Events emitted by the ReconciliationEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A pass started
    PassStarted { domains_count: usize },

    /// Every host of the domain matched the cache; no provider calls made
    DomainSkipped { domain: String },

    /// Zone TTL was corrected
    ZoneTtlUpdated { domain: String, from: u32, to: u32 },

    /// More than one record of a type exists for a host; the host was left alone
    AmbiguousRecords {
        domain: String,
        host: String,
        record_type: RecordType,
        count: usize,
    },

    /// A batched record update was sent
    RecordsUpdated { domain: String, count: usize },

    /// A pass completed successfully
    PassCompleted { domains_updated: usize },
}

/// Public addresses resolved for one pass
///
/// A family no domain enables stays empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedAddresses {
    pub ipv4: String,
    pub ipv6: String,
}

impl ResolvedAddresses {
    /// Address of `family`
    pub fn get(&self, family: IpFamily) -> &str {
        match family {
            IpFamily::V4 => &self.ipv4,
            IpFamily::V6 => &self.ipv6,
        }
    }
}

/// What a pass did for one domain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainReport {
    pub domain: String,
    /// The cache showed no stale host, so the provider was not contacted
    pub skipped: bool,
    pub zone_ttl_updated: bool,
    /// Records sent in the batched update (0 means no update call)
    pub records_queued: usize,
    /// Host/type pairs left alone because of duplicate records
    pub ambiguous: Vec<(String, RecordType)>,
}

/// Summary of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub addresses: ResolvedAddresses,
    pub domains: Vec<DomainReport>,
}

impl PassReport {
    /// Number of zone or record update calls issued
    pub fn update_calls(&self) -> usize {
        self.domains
            .iter()
            .map(|d| usize::from(d.zone_ttl_updated) + usize::from(d.records_queued > 0))
            .sum()
    }

    /// Report for `domain`
    pub fn domain(&self, domain: &str) -> Option<&DomainReport> {
        self.domains.iter().find(|d| d.domain == domain)
    }
}

/// Decision for one host and record type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordAction {
    /// Several records match; nothing is touched
    Ambiguous(usize),
    /// The single matching record already points at the address
    Unchanged,
    /// The single matching record, with its destination corrected
    Update(DnsRecord),
    /// A new record to create
    Create(DnsRecord),
}

/// Decide what to do with the `record_type` record of `host`
pub fn plan_record(
    records: &RecordSet,
    host: &str,
    record_type: RecordType,
    address: &str,
) -> RecordAction {
    let count = records.count(host, record_type);
    if count > 1 {
        return RecordAction::Ambiguous(count);
    }

    match records.find(host, record_type) {
        Some(record) if record.destination == address => RecordAction::Unchanged,
        Some(record) => {
            let mut record = record.clone();
            record.destination = address.to_string();
            RecordAction::Update(record)
        }
        None => RecordAction::Create(DnsRecord::new(host, record_type, address)),
    }
}

/// One-pass reconciliation engine
///
/// ## Lifecycle
///
/// 1. Create with [`ReconciliationEngine::new()`], injecting the provider,
///    the resolver and an optional, already loaded cache
/// 2. Call [`ReconciliationEngine::run_pass()`]
/// 3. Drop, or run another pass; the cache stays in memory between passes
///
/// ## Threading
///
/// A pass is strictly sequential: domains, hosts and provider calls are
/// processed one after another, and the cache is owned by the engine.
pub struct ReconciliationEngine {
    /// Domains, credentials and cache settings
    config: Config,

    /// Address cache; `None` when caching is disabled
    cache: Option<AddressCache>,

    /// DNS provider for zone and record calls
    provider: Box<dyn DnsProvider>,

    /// Public address lookup
    resolver: Box<dyn IpResolver>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl ReconciliationEngine {
    /// Create a new engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        config: Config,
        cache: Option<AddressCache>,
        provider: Box<dyn DnsProvider>,
        resolver: Box<dyn IpResolver>,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let engine = Self {
            config,
            cache,
            provider,
            resolver,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// The address cache, if enabled
    pub fn cache(&self) -> Option<&AddressCache> {
        self.cache.as_ref()
    }

    /// Run one reconciliation pass
    ///
    /// # Returns
    ///
    /// - `Ok(PassReport)`: Every domain was reconciled or skipped
    /// - `Err(Error)`: The first fatal error; later domains were not processed
    ///   and the cache was not stored
    pub async fn run_pass(&mut self) -> Result<PassReport> {
        self.emit_event(EngineEvent::PassStarted {
            domains_count: self.config.domains.len(),
        });

        self.provider
            .authenticate(&self.config.credentials())
            .await?;
        debug!("Authenticated against {}", self.provider.provider_name());

        let addresses = self.resolve_addresses().await?;

        let mut report = PassReport {
            addresses: addresses.clone(),
            domains: Vec::with_capacity(self.config.domains.len()),
        };

        let domains = self.config.domains.clone();
        for domain in &domains {
            report
                .domains
                .push(self.reconcile_domain(domain, &addresses).await?);
        }

        if let Some(cache) = self.cache.as_mut() {
            cache.store().await?;
        }

        let domains_updated = report.domains.iter().filter(|d| !d.skipped).count();
        info!(
            "Pass completed: {} of {} domain(s) reconciled",
            domains_updated,
            report.domains.len()
        );
        self.emit_event(EngineEvent::PassCompleted { domains_updated });

        Ok(report)
    }

    /// Decide whether `domain` needs provider calls
    ///
    /// Without a cache every domain needs an update. Otherwise each host whose
    /// cached address is missing or differs from the resolved one is written to
    /// the cache right away, and the domain is flagged.
    pub fn needs_update(&mut self, domain: &DomainConfig, addresses: &ResolvedAddresses) -> bool {
        let Some(cache) = self.cache.as_mut() else {
            return true;
        };

        let mut update = false;

        for host in &domain.hosts {
            let mut host_stale = false;

            if domain.ipv4 {
                let cached = cache.get_ipv4(&domain.name, host);
                if cached.is_empty() || cached != addresses.ipv4 {
                    cache.set_ipv4(&domain.name, host, &addresses.ipv4);
                    host_stale = true;
                }
            }

            if domain.ipv6 {
                let cached = cache.get_ipv6(&domain.name, host);
                if cached.is_empty() || cached != addresses.ipv6 {
                    cache.set_ipv6(&domain.name, host, &addresses.ipv6);
                    host_stale = true;
                }
            }

            if host_stale {
                update = true;
            } else {
                info!("Host {} is in cache and needs no update", host);
            }
        }

        update
    }

    async fn resolve_addresses(&self) -> Result<ResolvedAddresses> {
        let mut addresses = ResolvedAddresses::default();

        if self.config.ipv4_enabled() {
            info!("Loading public IPv4 address");
            addresses.ipv4 = self.resolver.resolve(IpFamily::V4).await?;
            info!("Public IPv4 address is {}", addresses.ipv4);
        }

        if self.config.ipv6_enabled() {
            info!("Loading public IPv6 address");
            addresses.ipv6 = self.resolver.resolve(IpFamily::V6).await?;
            info!("Public IPv6 address is {}", addresses.ipv6);
        }

        Ok(addresses)
    }

    async fn reconcile_domain(
        &mut self,
        domain: &DomainConfig,
        addresses: &ResolvedAddresses,
    ) -> Result<DomainReport> {
        let mut report = DomainReport {
            domain: domain.name.clone(),
            ..DomainReport::default()
        };

        if !self.needs_update(domain, addresses) {
            debug!("Domain {} is up to date, skipping", domain.name);
            report.skipped = true;
            self.emit_event(EngineEvent::DomainSkipped {
                domain: domain.name.clone(),
            });
            return Ok(report);
        }

        report.zone_ttl_updated = self.reconcile_zone(domain).await?;
        self.reconcile_records(domain, addresses, &mut report).await?;

        Ok(report)
    }

    /// Push the configured TTL if the zone disagrees; returns whether it did
    async fn reconcile_zone(&self, domain: &DomainConfig) -> Result<bool> {
        info!("Loading DNS zone info for domain {}", domain.name);
        let mut zone = self.provider.get_zone(&domain.name).await?;

        let zone_ttl: u32 = zone.ttl.trim().parse().map_err(|_| Error::InvalidTtl {
            domain: domain.name.clone(),
            ttl: zone.ttl.clone(),
        })?;

        if zone_ttl == domain.ttl {
            debug!("TTL for {} is already {}", domain.name, zone_ttl);
            return Ok(false);
        }

        info!(
            "TTL for {} is {} but should be {}. Updating...",
            domain.name, zone_ttl, domain.ttl
        );
        zone.ttl = domain.ttl.to_string();
        self.provider.update_zone(&domain.name, &zone).await?;

        self.emit_event(EngineEvent::ZoneTtlUpdated {
            domain: domain.name.clone(),
            from: zone_ttl,
            to: domain.ttl,
        });
        Ok(true)
    }

    async fn reconcile_records(
        &self,
        domain: &DomainConfig,
        addresses: &ResolvedAddresses,
        report: &mut DomainReport,
    ) -> Result<()> {
        info!("Loading DNS records for domain {}", domain.name);
        let records = self.provider.get_records(&domain.name).await?;

        let families = [(domain.ipv4, IpFamily::V4), (domain.ipv6, IpFamily::V6)];

        let mut queue = Vec::new();
        for host in &domain.hosts {
            for family in families
                .iter()
                .filter(|(enabled, _)| *enabled)
                .map(|(_, family)| *family)
            {
                let record_type = RecordType::from(family);
                let address = addresses.get(family);

                match plan_record(&records, host, record_type, address) {
                    RecordAction::Ambiguous(count) => {
                        warn!(
                            "Too many {} records for host '{}' in {} ({}). \
                            Please specify only hosts with one corresponding {} record",
                            record_type, host, domain.name, count, record_type
                        );
                        report.ambiguous.push((host.clone(), record_type));
                        self.emit_event(EngineEvent::AmbiguousRecords {
                            domain: domain.name.clone(),
                            host: host.clone(),
                            record_type,
                            count,
                        });
                    }
                    RecordAction::Unchanged => {
                        info!(
                            "Destination of host '{}' is already public {} {}",
                            host, family, address
                        );
                    }
                    RecordAction::Update(record) => {
                        info!(
                            "{} record of host '{}' points to {} but should be {}. Queue for update...",
                            record_type,
                            host,
                            records
                                .find(host, record_type)
                                .map_or("", |r| r.destination.as_str()),
                            address
                        );
                        queue.push(record);
                    }
                    RecordAction::Create(record) => {
                        info!(
                            "There is no {} record for '{}'. Creating and queueing for update",
                            record_type, host
                        );
                        queue.push(record);
                    }
                }
            }
        }

        if queue.is_empty() {
            info!("No record updates queued for {}", domain.name);
            return Ok(());
        }

        info!(
            "Performing update on {} queued record(s) for {}",
            queue.len(),
            domain.name
        );
        report.records_queued = queue.len();
        self.provider
            .update_records(&domain.name, &RecordSet::new(queue))
            .await?;

        self.emit_event(EngineEvent::RecordsUpdated {
            domain: domain.name.clone(),
            count: report.records_queued,
        });
        Ok(())
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event");
            }
            // Nobody is listening
            Err(TrySendError::Closed(_)) => {}
        }
    }
}
