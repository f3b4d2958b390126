//! Error types for the dyndns system
//!
//! Every failure inside a reconciliation pass is fatal for that pass. The
//! variants below only classify what went wrong so the caller can report it.

use thiserror::Error;

/// Result type alias for dyndns operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the dyndns system
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (unreadable file, malformed TOML, bad overrides)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Address cache errors (malformed row, failed rewrite)
    #[error("Cache error: {0}")]
    Cache(String),

    /// Public IP resolution errors
    #[error("IP resolution error: {0}")]
    Resolution(String),

    /// Non-success status reported by the DNS provider
    #[error("{provider}: {short_message} Reason: {long_message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Short status message, verbatim from the provider
        short_message: String,
        /// Long status message, verbatim from the provider
        long_message: String,
    },

    /// A provider call was made before a session was established
    #[error("{0}: there is no API session id. Are you logged in?")]
    NotAuthenticated(String),

    /// Zone TTL on the provider side is not a number
    #[error("Invalid zone TTL {ttl:?} for {domain}")]
    InvalidTtl {
        /// Domain the zone belongs to
        domain: String,
        /// The TTL string as sent by the provider
        ttl: String,
    },

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a cache error
    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }

    /// Create a resolution error
    pub fn resolution(msg: impl Into<String>) -> Self {
        Self::Resolution(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create a provider status error
    pub fn provider(
        provider: impl Into<String>,
        short_message: impl Into<String>,
        long_message: impl Into<String>,
    ) -> Self {
        Self::Provider {
            provider: provider.into(),
            short_message: short_message.into(),
            long_message: long_message.into(),
        }
    }

    /// Create a "not authenticated" error for the named provider
    pub fn not_authenticated(provider: impl Into<String>) -> Self {
        Self::NotAuthenticated(provider.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_surfaces_messages_verbatim() {
        let err = Error::provider("netcup", "Login failed.", "The session id is not in a valid format.");
        assert_eq!(
            err.to_string(),
            "netcup: Login failed. Reason: The session id is not in a valid format."
        );
    }
}
