//! Configuration types for the dyndns system
//!
//! The configuration is a TOML file. Credentials may be overridden from the
//! environment: `CUSTOMERNR`, `APIKEY` and `APIPASSWORD`, or files named by
//! `CUSTOMERNR_FILE`, `APIKEY_FILE` and `APIPASSWORD_FILE`. A `_FILE` variable
//! takes precedence over the plain one, and both take precedence over the file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Default echo service for the public IPv4 address
pub const DEFAULT_IPV4_SERVICE_URL: &str = "https://api.ipify.org?format=text";

/// Default echo service for the public IPv6 address
pub const DEFAULT_IPV6_SERVICE_URL: &str = "https://api6.ipify.org?format=text";

const CUSTOMER_NUMBER_KEY: &str = "CUSTOMERNR";
const API_KEY_KEY: &str = "APIKEY";
const API_PASSWORD_KEY: &str = "APIPASSWORD";

/// Main dyndns configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Provider customer number
    pub customer_number: u64,

    /// Provider API key
    pub api_key: String,

    /// Provider API password
    pub api_password: String,

    /// Location of the address cache file (defaults to the user cache dir)
    #[serde(default)]
    pub cache_location: Option<PathBuf>,

    /// Maximum age of the cache file in seconds; 0 disables the cache
    #[serde(default)]
    pub cache_timeout_secs: u64,

    /// Echo service used to resolve the public IPv4 address
    #[serde(default = "default_ipv4_service_url")]
    pub ipv4_service_url: String,

    /// Echo service used to resolve the public IPv6 address
    #[serde(default = "default_ipv6_service_url")]
    pub ipv6_service_url: String,

    /// Domains to keep in sync
    #[serde(default)]
    pub domains: Vec<DomainConfig>,
}

// Custom Debug implementation that hides the credentials
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("customer_number", &self.customer_number)
            .field("api_key", &"<REDACTED>")
            .field("api_password", &"<REDACTED>")
            .field("cache_location", &self.cache_location)
            .field("cache_timeout_secs", &self.cache_timeout_secs)
            .field("ipv4_service_url", &self.ipv4_service_url)
            .field("ipv6_service_url", &self.ipv6_service_url)
            .field("domains", &self.domains)
            .finish()
    }
}

impl Config {
    /// Load, override and validate the configuration at `path`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let mut config = Self::from_toml_str(&content).map_err(|e| {
            Error::config(format!("Failed to parse config file {}: {}", path.display(), e))
        })?;

        config.apply_secret_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Parse a configuration from TOML without overrides or validation
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(e.to_string()))
    }

    /// Override credentials from the process environment
    pub fn apply_secret_overrides(&mut self) -> Result<()> {
        self.apply_secret_overrides_with(|key| std::env::var(key).ok())
    }

    /// Override credentials using `lookup` as the environment
    pub fn apply_secret_overrides_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = read_secret(CUSTOMER_NUMBER_KEY, &lookup)? {
            self.customer_number = value.parse().map_err(|_| {
                Error::config(format!(
                    "{} override is not a valid customer number",
                    CUSTOMER_NUMBER_KEY
                ))
            })?;
        }

        if let Some(value) = read_secret(API_KEY_KEY, &lookup)? {
            self.api_key = value;
        }

        if let Some(value) = read_secret(API_PASSWORD_KEY, &lookup)? {
            self.api_password = value;
        }

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.domains.is_empty() {
            return Err(Error::config("No domains configured"));
        }

        for domain in &self.domains {
            domain.validate()?;
        }

        Ok(())
    }

    /// Credentials used to authenticate against the provider
    pub fn credentials(&self) -> Credentials {
        Credentials {
            customer_number: self.customer_number,
            api_key: self.api_key.clone(),
            api_password: self.api_password.clone(),
        }
    }

    /// Whether the address cache is enabled
    pub fn cache_enabled(&self) -> bool {
        self.cache_timeout_secs > 0
    }

    /// Whether at least one domain needs A records
    pub fn ipv4_enabled(&self) -> bool {
        self.domains.iter().any(|d| d.ipv4)
    }

    /// Whether at least one domain needs AAAA records
    pub fn ipv6_enabled(&self) -> bool {
        self.domains.iter().any(|d| d.ipv6)
    }
}

/// Configuration of a single domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainConfig {
    /// Domain name, e.g. "example.com"
    pub name: String,

    /// Manage A records
    #[serde(default = "default_enabled")]
    pub ipv4: bool,

    /// Manage AAAA records
    #[serde(default)]
    pub ipv6: bool,

    /// Desired zone TTL in seconds
    pub ttl: u32,

    /// Host labels within the domain, e.g. "www" or "@"
    #[serde(default)]
    pub hosts: Vec<String>,
}

impl DomainConfig {
    /// Create a domain with IPv4 enabled and IPv6 disabled
    pub fn new(name: impl Into<String>, ttl: u32) -> Self {
        Self {
            name: name.into(),
            ipv4: true,
            ipv6: false,
            ttl,
            hosts: Vec::new(),
        }
    }

    /// Add a host label
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.hosts.push(host.into());
        self
    }

    /// Enable or disable A records
    pub fn with_ipv4(mut self, enabled: bool) -> Self {
        self.ipv4 = enabled;
        self
    }

    /// Enable or disable AAAA records
    pub fn with_ipv6(mut self, enabled: bool) -> Self {
        self.ipv6 = enabled;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::config("Domain name cannot be empty"));
        }

        if self.hosts.is_empty() {
            return Err(Error::config(format!(
                "Domain {} has no hosts configured",
                self.name
            )));
        }

        if !self.ipv4 && !self.ipv6 {
            return Err(Error::config(format!(
                "Domain {} enables neither IPv4 nor IPv6",
                self.name
            )));
        }

        Ok(())
    }
}

/// Provider credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Customer number
    pub customer_number: u64,
    /// API key
    pub api_key: String,
    /// API password
    pub api_password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("customer_number", &self.customer_number)
            .field("api_key", &"<REDACTED>")
            .field("api_password", &"<REDACTED>")
            .finish()
    }
}

/// Read a secret from `<key>_FILE` or `<key>`; empty values count as unset
fn read_secret<F>(key: &str, lookup: &F) -> Result<Option<String>>
where
    F: Fn(&str) -> Option<String>,
{
    let file_key = format!("{}_FILE", key);
    if let Some(location) = lookup(&file_key).filter(|l| !l.is_empty()) {
        let content = std::fs::read_to_string(&location).map_err(|e| {
            Error::config(format!(
                "Failed to read secret file {} ({}): {}",
                location, file_key, e
            ))
        })?;
        let secret = content.trim().to_string();
        return Ok((!secret.is_empty()).then_some(secret));
    }

    Ok(lookup(key).filter(|v| !v.is_empty()))
}

fn default_ipv4_service_url() -> String {
    DEFAULT_IPV4_SERVICE_URL.to_string()
}

fn default_ipv6_service_url() -> String {
    DEFAULT_IPV6_SERVICE_URL.to_string()
}

fn default_enabled() -> bool {
    true
}
