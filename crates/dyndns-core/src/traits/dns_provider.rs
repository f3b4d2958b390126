// # DNS Provider Trait
//
// Defines the interface to the hosting provider's DNS management API and the
// provider-side address book (zone metadata and record set).
//
// ## Implementations
//
// - netcup CCP: `dyndns-provider-netcup` crate
//
// ## Usage
//
// ```rust,ignore
// use dyndns_core::DnsProvider;
//
// provider.authenticate(&config.credentials()).await?;
// let zone = provider.get_zone("example.com").await?;
// let records = provider.get_records("example.com").await?;
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Credentials;
use crate::error::Result;
use crate::traits::ip_resolver::IpFamily;

/// DNS zone metadata as stored by the provider
///
/// Numeric SOA fields are kept as strings, exactly as the provider sends them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    /// Domain name of the zone
    #[serde(rename = "name")]
    pub domain_name: String,
    /// Zone TTL in seconds, as a numeric string
    pub ttl: String,
    /// SOA serial
    #[serde(default)]
    pub serial: String,
    /// SOA refresh
    #[serde(default)]
    pub refresh: String,
    /// SOA retry
    #[serde(default)]
    pub retry: String,
    /// SOA expire
    #[serde(default)]
    pub expire: String,
    /// Whether DNSSEC is enabled for the zone
    #[serde(rename = "dnssecstatus", default)]
    pub dnssec_status: bool,
}

/// Address record types managed by dyndns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    /// IPv4 address record
    A,
    /// IPv6 address record
    Aaaa,
}

impl RecordType {
    /// Wire name of the record type
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
        }
    }
}

impl From<IpFamily> for RecordType {
    fn from(family: IpFamily) -> Self {
        match family {
            IpFamily::V4 => RecordType::A,
            IpFamily::V6 => RecordType::Aaaa,
        }
    }
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single DNS resource record
///
/// `record_type` stays a string because the record set may hold any type
/// (MX, TXT, ...); only A and AAAA are ever touched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    /// Provider record id; empty for records that do not exist yet
    #[serde(default)]
    pub id: String,
    /// Host label, e.g. "www" or "@"
    pub hostname: String,
    /// Record type, e.g. "A"
    #[serde(rename = "type")]
    pub record_type: String,
    /// Priority (MX only)
    #[serde(default)]
    pub priority: String,
    /// Record value
    pub destination: String,
    /// Delete flag
    #[serde(rename = "deleterecord", default)]
    pub delete_record: bool,
    /// Provider-side record state
    #[serde(default)]
    pub state: String,
}

impl DnsRecord {
    /// Create a record that does not exist on the provider yet
    pub fn new(
        hostname: impl Into<String>,
        record_type: RecordType,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            record_type: record_type.as_str().to_string(),
            destination: destination.into(),
            ..Self::default()
        }
    }

    /// Whether this record is `record_type` for `hostname`
    pub fn matches(&self, hostname: &str, record_type: RecordType) -> bool {
        self.hostname == hostname && self.record_type == record_type.as_str()
    }
}

/// Ordered set of DNS records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSet {
    /// Records in provider order
    #[serde(rename = "dnsrecords", default)]
    pub records: Vec<DnsRecord>,
}

impl RecordSet {
    /// Create a record set from records
    pub fn new(records: Vec<DnsRecord>) -> Self {
        Self { records }
    }

    /// Number of `record_type` records for `hostname`
    pub fn count(&self, hostname: &str, record_type: RecordType) -> usize {
        self.records
            .iter()
            .filter(|r| r.matches(hostname, record_type))
            .count()
    }

    /// First `record_type` record for `hostname`
    pub fn find(&self, hostname: &str, record_type: RecordType) -> Option<&DnsRecord> {
        self.records.iter().find(|r| r.matches(hostname, record_type))
    }

    /// Number of records in the set
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Trait for DNS provider implementations
///
/// A provider holds its own session. [`DnsProvider::authenticate`] must be
/// called first; every other call fails with
/// [`Error::NotAuthenticated`](crate::Error::NotAuthenticated) until it
/// succeeds, without touching the network.
///
/// Providers are single-shot: one API round trip per call, no retries and no
/// caching. Whether an update is needed at all is decided by the engine.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Log in and keep the session for subsequent calls
    async fn authenticate(&self, credentials: &Credentials) -> Result<()>;

    /// Fetch the zone metadata for `domain`
    async fn get_zone(&self, domain: &str) -> Result<Zone>;

    /// Replace the zone metadata for `domain`
    async fn update_zone(&self, domain: &str, zone: &Zone) -> Result<()>;

    /// Fetch all records of `domain`
    async fn get_records(&self, domain: &str) -> Result<RecordSet>;

    /// Create or update the given records of `domain` in one call
    ///
    /// Records with an empty id are created; the others are updated in place.
    async fn update_records(&self, domain: &str, records: &RecordSet) -> Result<()>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}
