// # dyndns-core
//
// Core library of the dyndns client: keeps A/AAAA records at a hosting
// provider pointed at the machine's current public address.
//
// ## Architecture Overview
//
// - **IpResolver**: Trait for discovering the current public address
// - **DnsProvider**: Trait for querying and updating zones and records
// - **AddressCache**: Flat-file cache of the last addresses pushed per host
// - **ReconciliationEngine**: Runs one pass over all configured domains
//
// ## Design Principles
//
// 1. **Explicit wiring**: The engine owns its config, cache, provider and
//    resolver; there is no global state
// 2. **Minimal calls**: Fresh cache entries skip a domain entirely; at most one
//    zone update and one batched record update per domain
// 3. **Fail the pass**: Any provider or resolution error ends the pass; the
//    scheduler decides when to run the next one

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod traits;

// Re-export core types for convenience
pub use cache::AddressCache;
pub use config::{Config, Credentials, DomainConfig};
pub use engine::{EngineEvent, PassReport, ReconciliationEngine};
pub use error::{Error, Result};
pub use traits::{DnsProvider, DnsRecord, IpFamily, IpResolver, RecordSet, RecordType, Zone};
