// # IP Resolver Trait
//
// Defines the interface for discovering the machine's current public address.
//
// ## Implementations
//
// - HTTP echo services: `dyndns-ip-http` crate

use async_trait::async_trait;

/// IP address family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpFamily {
    V4,
    V6,
}

impl std::fmt::Display for IpFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IpFamily::V4 => f.write_str("IPv4"),
            IpFamily::V6 => f.write_str("IPv6"),
        }
    }
}

/// Trait for public IP resolvers
///
/// Resolvers are observers only: one lookup per call, no retries and no
/// caching between calls.
#[async_trait]
pub trait IpResolver: Send + Sync {
    /// Resolve the current public address of `family`
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: The address in canonical textual form
    /// - `Err(Error)`: If the address cannot be determined, or the service
    ///   answered with an address of the other family
    async fn resolve(&self, family: IpFamily) -> Result<String, crate::Error>;
}
