use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use eyre::Result;
use thiserror::Error;

/// Error type for shared edge cache operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CacheStoreError {
    /// Error surfaced by the backing cache implementation
    #[error("Cache backend error: {0}")]
    Backend(String),
}

/// Result type for cache store operations
pub type CacheStoreResult<T> = Result<T, CacheStoreError>;

/// One cached origin response, keyed by normalized request URL.
///
/// Entries are overwritten wholesale on each successful origin fetch
/// (last-writer-wins, no partial updates) and read back as the fallback
/// source when the origin is unreachable or returns a server error.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub stored_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl CachedResponse {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: Bytes, ttl: Duration) -> Self {
        Self {
            status,
            headers,
            body,
            stored_at: Utc::now(),
            ttl,
        }
    }

    /// Whether the entry is still within its TTL at `now`.
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(self.ttl) {
            Ok(ttl) => now.signed_duration_since(self.stored_at) < ttl,
            Err(_) => false,
        }
    }

    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Utc::now())
    }

    /// Header lookup, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// CacheStore defines the port (interface) for the shared edge response cache.
///
/// Implementations are externally synchronized; concurrent writers follow
/// last-writer-wins semantics. Expired entries are reported as absent.
#[async_trait::async_trait]
pub trait CacheStore: Send + Sync + 'static {
    /// Look up a cached response by key. Returns `None` for missing or
    /// expired entries.
    async fn get(&self, key: &str) -> CacheStoreResult<Option<CachedResponse>>;

    /// Insert or overwrite the entry for `key`.
    async fn put(&self, key: &str, entry: CachedResponse) -> CacheStoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_freshness_window() {
        let entry = CachedResponse::new(200, vec![], Bytes::from_static(b"ok"), Duration::from_secs(60));
        assert!(entry.is_fresh());

        let stale = CachedResponse {
            stored_at: Utc::now() - chrono::Duration::seconds(61),
            ..entry.clone()
        };
        assert!(!stale.is_fresh());
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let entry = CachedResponse::new(
            200,
            vec![("Content-Type".to_string(), "text/html".to_string())],
            Bytes::new(),
            Duration::from_secs(1),
        );
        assert_eq!(entry.header("content-type"), Some("text/html"));
        assert_eq!(entry.header("x-missing"), None);
    }
}
