//! Typed cache facade shared by the API and the workflow engine.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use trailtag_memory::MemoryManager;

use crate::provider::CacheProvider;

/// Uniform key-value interface over the memory manager's record pool.
///
/// Holds no state of its own; everything lives in the pool, so any number
/// of managers over the same [`MemoryManager`] observe the same data.
#[derive(Clone)]
pub struct CacheManager {
    memory: Arc<MemoryManager>,
}

impl CacheManager {
    pub fn new(memory: Arc<MemoryManager>) -> Self {
        Self { memory }
    }

    /// The memory manager backing this cache.
    pub fn memory(&self) -> &Arc<MemoryManager> {
        &self.memory
    }

    /// Raw value lookup.
    pub fn get(&self, key: &str) -> Option<Value> {
        CacheProvider::new(self.memory.storage()).get(key, None)
    }

    /// Store a raw value with an optional TTL in seconds.
    pub fn set(&self, key: &str, value: &Value, ttl: Option<u64>) -> bool {
        CacheProvider::new(self.memory.storage()).set(key, value, None, ttl)
    }

    /// Typed lookup; entries that fail to decode read as absent.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(key, "Cached value failed to decode: {}", e);
                None
            }
        }
    }

    /// Typed store.
    pub fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl: Option<u64>) -> bool {
        match serde_json::to_value(value) {
            Ok(json) => self.set(key, &json, ttl),
            Err(e) => {
                warn!(key, "Failed to serialize cache value: {}", e);
                false
            }
        }
    }

    pub fn exists(&self, key: &str) -> bool {
        CacheProvider::new(self.memory.storage()).exists(key, None)
    }

    /// Soft-delete the key.
    pub fn delete(&self, key: &str) -> bool {
        CacheProvider::new(self.memory.storage()).delete(key, None)
    }

    /// Batch clear is a contractual no-op; see [`CacheProvider::clear`].
    pub fn clear(&self) {
        CacheProvider::new(self.memory.storage()).clear()
    }

    /// Contract hook kept for compatibility; always false.
    pub fn is_degraded(&self) -> bool {
        false
    }
}
