// # File Address Cache
//
// ## File Format
//
// One comma-delimited row per fully-qualified host, no header:
//
// ```text
// www.example.com,203.0.113.7,
// home.example.org,,2001:db8::7
// ```
//
// An empty field means the address of that family is not known.
//
// ## Expiry
//
// A file whose last modification is older than the timeout is ignored on load
// (soft expiry). It is not deleted; the next dirty store overwrites it.
//
// ## Writes
//
// `store()` only writes when something changed. The new content goes to a
// temporary sibling first and is renamed over the cache file, so a failed
// write never leaves a truncated cache behind.

use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{Error, Result};

/// Directory below the user cache dir used when no location is configured
const DEFAULT_CACHE_DIR: &str = "dyndns";

/// File name used when no location is configured
const DEFAULT_CACHE_FILE: &str = "ip.cache";

/// One cached host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Fully-qualified host, e.g. "www.example.com"
    pub host: String,
    /// Last known IPv4 address, or empty
    pub ipv4: String,
    /// Last known IPv6 address, or empty
    pub ipv6: String,
}

impl CacheEntry {
    fn to_row(&self) -> String {
        format!("{},{},{}", self.host, self.ipv4, self.ipv6)
    }

    fn from_row(row: &str) -> Option<Self> {
        let mut fields = row.split(',');
        let host = fields.next()?;
        let ipv4 = fields.next()?;
        let ipv6 = fields.next()?;
        if fields.next().is_some() || host.is_empty() {
            return None;
        }

        Some(Self {
            host: host.to_string(),
            ipv4: ipv4.to_string(),
            ipv6: ipv6.to_string(),
        })
    }
}

/// Address cache backed by a flat file
///
/// # Example
///
/// ```rust,no_run
/// use dyndns_core::cache::AddressCache;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut cache = AddressCache::new("/var/cache/dyndns/ip.cache", Duration::from_secs(3600));
///     cache.load().await?;
///
///     if cache.get_ipv4("example.com", "www") != "203.0.113.7" {
///         cache.set_ipv4("example.com", "www", "203.0.113.7");
///     }
///
///     cache.store().await?;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct AddressCache {
    path: PathBuf,
    timeout: Duration,
    entries: Vec<CacheEntry>,
    dirty: bool,
}

impl AddressCache {
    /// Create an empty cache backed by `path`
    pub fn new(path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            path: path.into(),
            timeout,
            entries: Vec::new(),
            dirty: false,
        }
    }

    /// Create and load a cache
    ///
    /// Without a `location` the cache lives in the user cache directory,
    /// which is created if needed.
    pub async fn open(location: Option<&Path>, timeout: Duration) -> Result<Self> {
        let path = match location {
            Some(path) => path.to_path_buf(),
            None => Self::default_location().await?,
        };

        let mut cache = Self::new(path, timeout);
        cache.load().await?;
        Ok(cache)
    }

    /// Resolve (and create) the default cache location
    pub async fn default_location() -> Result<PathBuf> {
        let dir = dirs::cache_dir()
            .ok_or_else(|| Error::cache("Unable to determine the user cache directory"))?
            .join(DEFAULT_CACHE_DIR);

        if !dir.exists() {
            let mut builder = fs::DirBuilder::new();
            builder.recursive(true);
            #[cfg(unix)]
            builder.mode(0o700);
            builder.create(&dir).await.map_err(|e| {
                Error::cache(format!(
                    "Failed to create cache directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        Ok(dir.join(DEFAULT_CACHE_FILE))
    }

    /// Load entries from the backing file
    ///
    /// A missing file or a file older than the timeout leaves the cache empty.
    pub async fn load(&mut self) -> Result<()> {
        let metadata = match fs::metadata(&self.path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("Cache file does not exist: {}", self.path.display());
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let modified: DateTime<Utc> = metadata.modified()?.into();
        if self.is_expired(modified) {
            tracing::info!(
                "Cache file {} last written at {} is older than {:?}, ignoring it",
                self.path.display(),
                modified,
                self.timeout
            );
            return Ok(());
        }

        let content = fs::read_to_string(&self.path).await?;
        for (number, line) in content.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }

            let entry = CacheEntry::from_row(line).ok_or_else(|| {
                Error::cache(format!(
                    "Malformed row {} in cache file {}",
                    number + 1,
                    self.path.display()
                ))
            })?;

            match self.entry_mut(&entry.host) {
                Some(existing) => *existing = entry,
                None => self.entries.push(entry),
            }
        }

        tracing::debug!(
            "Loaded {} cache entries from {}",
            self.entries.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Write all entries to the backing file if anything changed
    pub async fn store(&mut self) -> Result<()> {
        if !self.dirty {
            tracing::debug!("Cache unchanged, not writing {}", self.path.display());
            return Ok(());
        }

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::cache(format!(
                    "Failed to create cache directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let mut content = String::new();
        for entry in &self.entries {
            content.push_str(&entry.to_row());
            content.push('\n');
        }

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::cache(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(content.as_bytes()).await.map_err(|e| {
                Error::cache(format!(
                    "Failed to write temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.flush().await.map_err(|e| {
                Error::cache(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::cache(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        self.dirty = false;
        tracing::debug!(
            "Wrote {} cache entries to {}",
            self.entries.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Cached IPv4 address of `host` in `domain`, or empty
    pub fn get_ipv4(&self, domain: &str, host: &str) -> &str {
        self.entry(&qualify(domain, host))
            .map_or("", |e| e.ipv4.as_str())
    }

    /// Cached IPv6 address of `host` in `domain`, or empty
    pub fn get_ipv6(&self, domain: &str, host: &str) -> &str {
        self.entry(&qualify(domain, host))
            .map_or("", |e| e.ipv6.as_str())
    }

    /// Record the IPv4 address of `host` in `domain`
    pub fn set_ipv4(&mut self, domain: &str, host: &str, ipv4: &str) {
        self.upsert(domain, host).ipv4 = ipv4.to_string();
        self.dirty = true;
    }

    /// Record the IPv6 address of `host` in `domain`
    pub fn set_ipv6(&mut self, domain: &str, host: &str, ipv6: &str) {
        self.upsert(domain, host).ipv6 = ipv6.to_string();
        self.dirty = true;
    }

    /// Whether the cache changed since the last load or store
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// All entries, in insertion order
    pub fn entries(&self) -> &[CacheEntry] {
        &self.entries
    }

    /// Number of cached hosts
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no hosts
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_expired(&self, modified: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(self.timeout) {
            Ok(max_age) => Utc::now().signed_duration_since(modified) > max_age,
            Err(_) => false,
        }
    }

    fn entry(&self, host: &str) -> Option<&CacheEntry> {
        self.entries.iter().find(|e| e.host == host)
    }

    fn entry_mut(&mut self, host: &str) -> Option<&mut CacheEntry> {
        self.entries.iter_mut().find(|e| e.host == host)
    }

    fn upsert(&mut self, domain: &str, host: &str) -> &mut CacheEntry {
        let fqdn = qualify(domain, host);
        let index = match self.entries.iter().position(|e| e.host == fqdn) {
            Some(index) => index,
            None => {
                self.entries.push(CacheEntry {
                    host: fqdn,
                    ipv4: String::new(),
                    ipv6: String::new(),
                });
                self.entries.len() - 1
            }
        };
        &mut self.entries[index]
    }

    fn temp_path(&self) -> PathBuf {
        PathBuf::from(format!("{}.tmp", self.path.display()))
    }
}

/// Fully-qualified host used as the cache key
fn qualify(domain: &str, host: &str) -> String {
    format!("{}.{}", host, domain)
}
