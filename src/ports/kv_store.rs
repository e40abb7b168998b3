use std::time::Duration;

use eyre::Result;
use thiserror::Error;

/// Error type for key-value store operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum KvStoreError {
    /// Error surfaced by the backing store implementation
    #[error("KV backend error: {0}")]
    Backend(String),
}

/// Result type for key-value store operations
pub type KvStoreResult<T> = Result<T, KvStoreError>;

/// KeyValueStore defines the port (interface) for the sitemap replica store.
///
/// All writes are idempotent full-value replacements, so a reader racing a
/// refresh cycle observes either the old or the new value, never a partial
/// one. The replica is a disposable cache, not a source of truth.
#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    /// Read the value stored under `key`. Expired entries report as absent.
    async fn get(&self, key: &str) -> KvStoreResult<Option<String>>;

    /// Write `value` under `key`, replacing any existing value. A `ttl` of
    /// `None` keeps the entry until overwritten.
    async fn put(&self, key: &str, value: String, ttl: Option<Duration>) -> KvStoreResult<()>;
}
