//! In-process implementation of the shared edge cache.
//!
//! Uses `scc::HashMap` for lock-free concurrent access. Expiry is enforced
//! lazily on read: an expired entry reports as absent and is removed. This
//! adapter backs single-node deployments and doubles as the test fake; a
//! platform-provided shared cache would implement the same port.
use scc::HashMap;

use crate::ports::cache_store::{CacheStore, CacheStoreResult, CachedResponse};

#[derive(Default)]
pub struct InMemoryCacheStore {
    entries: HashMap<String, CachedResponse>,
}

impl InMemoryCacheStore {
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
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> CacheStoreResult<Option<CachedResponse>> {
        let cached = match self.entries.get_async(key).await {
            Some(entry) => entry.get().clone(),
            None => return Ok(None),
        };

        if cached.is_fresh() {
            return Ok(Some(cached));
        }

        // Lazy eviction; the guard from get_async is dropped above.
        let _ = self.entries.remove_async(key).await;
        Ok(None)
    }

    async fn put(&self, key: &str, entry: CachedResponse) -> CacheStoreResult<()> {
        match self.entries.entry_async(key.to_string()).await {
            scc::hash_map::Entry::Occupied(mut occupied) => {
                *occupied.get_mut() = entry;
            }
            scc::hash_map::Entry::Vacant(vacant) => {
                vacant.insert_entry(entry);
            }
        }
        Ok(())
    }
}
