// # HTTP IP Resolver
//
// Resolves the public address by asking an echo service, one per address
// family, that answers a GET with the caller's address as plain text
// (e.g. `https://api.ipify.org?format=text`).
//
// The resolver is an observer only: one request per `resolve()` call, no
// caching and no retries.

use dyndns_core::config::Config;
use dyndns_core::traits::{IpFamily, IpResolver};
use dyndns_core::{Error, Result};

use std::net::IpAddr;
use std::time::Duration;

/// Default HTTP timeout for echo requests (10 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Public IP resolver backed by HTTP echo services
#[derive(Debug)]
pub struct HttpIpResolver {
    /// Echo service answering over IPv4
    ipv4_url: String,

    /// Echo service answering over IPv6
    ipv6_url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpIpResolver {
    /// Create a resolver for the given echo services
    pub fn new(ipv4_url: impl Into<String>, ipv6_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            ipv4_url: ipv4_url.into(),
            ipv6_url: ipv6_url.into(),
            client,
        })
    }

    /// Create a resolver for the echo services named in `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.ipv4_service_url, &config.ipv6_service_url)
    }

    /// Echo service URL for `family`
    pub fn url(&self, family: IpFamily) -> &str {
        match family {
            IpFamily::V4 => &self.ipv4_url,
            IpFamily::V6 => &self.ipv6_url,
        }
    }
}

/// Parse an echo service answer
///
/// Surrounding whitespace is ignored. The address must belong to `family` and
/// is returned in canonical form (`2001:0db8::0001` becomes `2001:db8::1`).
pub fn parse_address(body: &str, family: IpFamily) -> Result<String> {
    let text = body.trim();

    let ip: IpAddr = text
        .parse()
        .map_err(|_| Error::resolution(format!("Invalid IP address: {:?}", text)))?;

    match (family, ip) {
        (IpFamily::V4, IpAddr::V4(_)) | (IpFamily::V6, IpAddr::V6(_)) => Ok(ip.to_string()),
        _ => Err(Error::resolution(format!("Expected {}, got: {}", family, ip))),
    }
}

#[async_trait::async_trait]
impl IpResolver for HttpIpResolver {
    async fn resolve(&self, family: IpFamily) -> Result<String> {
        let url = self.url(family);
        tracing::debug!("Requesting public {} address from {}", family, url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::resolution(format!("Request to {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Error::resolution(format!(
                "{} answered with HTTP {}",
                url,
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::resolution(format!("Failed to read response from {}: {}", url, e)))?;

        parse_address(&body, family)
    }
}
