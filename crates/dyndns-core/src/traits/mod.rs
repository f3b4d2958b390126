//! Core traits for the dyndns system
//!
//! This module defines the abstract interfaces the engine is built against.
//!
//! - [`IpResolver`]: Discover the current public address
//! - [`DnsProvider`]: Query and update zones and records via the provider API

pub mod dns_provider;
pub mod ip_resolver;

pub use dns_provider::{DnsProvider, DnsRecord, RecordSet, RecordType, Zone};
pub use ip_resolver::{IpFamily, IpResolver};
