//! In-process implementation of the sitemap replica store.
//!
//! Same shape as [`super::memory_cache`]: `scc::HashMap` underneath, lazy
//! expiry on read, full-value replacement on write. A managed KV service
//! adapter would implement the same port.
use std::time::Duration;

use chrono::{DateTime, Utc};
use scc::HashMap;

use crate::ports::kv_store::{KeyValueStore, KvStoreResult};

#[derive(Clone)]
struct StoredValue {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub struct InMemoryKvStore {
    entries: HashMap<String, StoredValue>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait::async_trait]
impl KeyValueStore for InMemoryKvStore {
    async fn get(&self, key: &str) -> KvStoreResult<Option<String>> {
        let stored = match self.entries.get_async(key).await {
            Some(entry) => entry.get().clone(),
            None => return Ok(None),
        };

        match stored.expires_at {
            Some(expires_at) if Utc::now() >= expires_at => {
                let _ = self.entries.remove_async(key).await;
                Ok(None)
            }
            _ => Ok(Some(stored.value)),
        }
    }

    async fn put(&self, key: &str, value: String, ttl: Option<Duration>) -> KvStoreResult<()> {
        let expires_at = ttl
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .map(|ttl| Utc::now() + ttl);
        let stored = StoredValue { value, expires_at };

        match self.entries.entry_async(key.to_string()).await {
            scc::hash_map::Entry::Occupied(mut occupied) => {
                *occupied.get_mut() = stored;
            }
            scc::hash_map::Entry::Vacant(vacant) => {
                vacant.insert_entry(stored);
            }
        }
        Ok(())
    }
}
