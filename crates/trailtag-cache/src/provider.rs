//! Cache provider over the memory record pool.
//!
//! Entries are append-only: `set` always stores a fresh record and `delete`
//! stores a tombstone. The read path resolves a key to the most recent
//! matching record, so older versions stay in the pool but are masked.

use std::collections::BTreeMap;

use chrono::Utc;
use md5::{Digest, Md5};
use serde_json::Value;
use tracing::{debug, warn};

use trailtag_memory::MemoryStorage;

/// Default fingerprint prefix.
pub const KEY_PREFIX: &str = "trailtag:";

/// Key-value cache with soft-delete semantics.
pub struct CacheProvider<'a> {
    storage: &'a MemoryStorage,
    prefix: String,
}

impl<'a> CacheProvider<'a> {
    pub fn new(storage: &'a MemoryStorage) -> Self {
        Self {
            storage,
            prefix: KEY_PREFIX.to_string(),
        }
    }

    /// Fingerprint for a query/params pair: `{prefix}md5(query + params)`.
    pub fn fingerprint(&self, query: &str, params: Option<&Value>) -> String {
        let mut hash_input = query.to_string();
        if let Some(params) = params {
            // serde_json::Value maps iterate in insertion order for objects
            // built from sorted structs; canonicalize to keep fingerprints
            // stable across callers.
            hash_input.push_str(&canonical_json(params));
        }
        let digest = Md5::digest(hash_input.as_bytes());
        format!("{}{:x}", self.prefix, digest)
    }

    /// Fetch the cached value for `query`, or `None` when absent, deleted
    /// or expired.
    pub fn get(&self, query: &str, params: Option<&Value>) -> Option<Value> {
        let fingerprint = self.fingerprint(query, params);

        // Resolve the newest entry matching either the original query or
        // the fingerprint; a newer tombstone masks every older version.
        let newest = self.storage.with_entries(|entries| {
            entries
                .values()
                .filter(|e| e.metadata_str("type") == Some("cache"))
                .filter(|e| {
                    e.metadata_str("original_query") == Some(query)
                        || e.metadata_str("key") == Some(fingerprint.as_str())
                })
                .max_by_key(|e| e.created_at)
                .cloned()
        })?;

        if newest.metadata_flag("deleted") {
            return None;
        }
        if is_expired(&newest.metadata) {
            debug!(query, "Cache entry expired");
            return None;
        }

        let raw = newest.content.as_text();
        match serde_json::from_str::<Value>(&raw) {
            Ok(value) => Some(value),
            Err(_) => Some(Value::String(raw)),
        }
    }

    /// Store a value under `query`. Returns false only when serialization
    /// fails; storage faults are absorbed by the pool.
    pub fn set(&self, query: &str, value: &Value, params: Option<&Value>, ttl: Option<u64>) -> bool {
        let fingerprint = self.fingerprint(query, params);

        // Plain strings are stored raw so get() hands them back unquoted.
        let content = match value {
            Value::String(s) => s.clone(),
            other => match serde_json::to_string(other) {
                Ok(json) => json,
                Err(e) => {
                    warn!(query, "Failed to serialize cache value: {}", e);
                    return false;
                }
            },
        };

        let mut metadata = BTreeMap::new();
        metadata.insert("type".to_string(), Value::from("cache"));
        metadata.insert("key".to_string(), Value::from(fingerprint.clone()));
        metadata.insert("original_query".to_string(), Value::from(query));
        metadata.insert("deleted".to_string(), Value::from(false));
        metadata.insert(
            "stored_at".to_string(),
            Value::from(Utc::now().timestamp() as f64),
        );
        metadata.insert(
            "ttl".to_string(),
            ttl.map(Value::from).unwrap_or(Value::Null),
        );

        self.storage.save(content, metadata, None);
        debug!(key = %fingerprint, "Stored cache entry");
        true
    }

    /// Check whether a live entry exists for `query`.
    pub fn exists(&self, query: &str, params: Option<&Value>) -> bool {
        self.get(query, params).is_some()
    }

    /// Soft-delete: append a tombstone masking all prior versions.
    pub fn delete(&self, query: &str, params: Option<&Value>) -> bool {
        let fingerprint = self.fingerprint(query, params);

        let mut metadata = BTreeMap::new();
        metadata.insert("type".to_string(), Value::from("cache"));
        metadata.insert("key".to_string(), Value::from(fingerprint.clone()));
        metadata.insert("original_query".to_string(), Value::from(query));
        metadata.insert("deleted".to_string(), Value::from(true));
        metadata.insert(
            "deleted_at".to_string(),
            Value::from(Utc::now().timestamp() as f64),
        );

        self.storage.save("DELETED", metadata, None);
        debug!(key = %fingerprint, "Tombstoned cache entry");
        true
    }

    /// Batch clear is not supported by the append-only pool; compaction is
    /// an offline concern.
    pub fn clear(&self) {
        warn!("Cache clear requested; append-only store relies on offline compaction");
    }

    /// Legacy contract hook; this backend never degrades.
    pub fn is_degraded(&self) -> bool {
        false
    }

    /// Scan live cache keys containing `pattern`.
    pub fn scan_keys(&self, pattern: &str) -> Vec<String> {
        self.storage.with_entries(|entries| {
            entries
                .values()
                .filter(|e| e.metadata_str("type") == Some("cache"))
                .filter(|e| !e.metadata_flag("deleted"))
                .filter_map(|e| e.metadata_str("key").map(str::to_string))
                .filter(|key| key.contains(pattern))
                .collect()
        })
    }
}

/// Expiry check against `stored_at + ttl`.
fn is_expired(metadata: &BTreeMap<String, Value>) -> bool {
    let ttl = match metadata.get("ttl").and_then(Value::as_f64) {
        Some(ttl) => ttl,
        None => return false,
    };
    let stored_at = match metadata.get("stored_at").and_then(Value::as_f64) {
        Some(stored_at) => stored_at,
        None => return false,
    };
    (Utc::now().timestamp() as f64) > stored_at + ttl
}

/// JSON rendering with object keys sorted at every level.
fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut sorted: Vec<(&String, &Value)> = map.iter().collect();
            sorted.sort_by_key(|(k, _)| k.as_str());
            let inner: Vec<String> = sorted
                .into_iter()
                .map(|(k, v)| format!("{}:{}", serde_json::to_string(k).unwrap(), canonical_json(v)))
                .collect();
            format!("{{{}}}", inner.join(","))
        }
        Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", inner.join(","))
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(dir: &std::path::Path) -> MemoryStorage {
        MemoryStorage::open(dir)
    }

    #[test]
    fn test_set_get_roundtrip_json() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let cache = CacheProvider::new(&storage);

        let value = serde_json::json!({"status": "done", "progress": 100});
        assert!(cache.set("job:abc", &value, None, None));
        assert_eq!(cache.get("job:abc", None), Some(value));
    }

    #[test]
    fn test_set_get_roundtrip_string() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let cache = CacheProvider::new(&storage);

        cache.set("video_job:dQw4w9WgXcQ", &Value::from("job-id-1"), None, None);
        assert_eq!(
            cache.get("video_job:dQw4w9WgXcQ", None),
            Some(Value::from("job-id-1"))
        );
    }

    #[test]
    fn test_last_writer_wins() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let cache = CacheProvider::new(&storage);

        cache.set("k", &Value::from(1), None, None);
        cache.set("k", &Value::from(2), None, None);
        assert_eq!(cache.get("k", None), Some(Value::from(2)));
        // Both versions remain in the pool.
        assert_eq!(storage.len(), 2);
    }

    #[test]
    fn test_soft_delete_masks_until_next_set() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let cache = CacheProvider::new(&storage);

        cache.set("k", &Value::from("v"), None, None);
        assert!(cache.exists("k", None));

        cache.delete("k", None);
        assert_eq!(cache.get("k", None), None);
        assert!(!cache.exists("k", None));

        cache.set("k", &Value::from("v2"), None, None);
        assert_eq!(cache.get("k", None), Some(Value::from("v2")));
    }

    #[test]
    fn test_ttl_enforced_on_get() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let cache = CacheProvider::new(&storage);

        // A generous ttl keeps the entry live.
        cache.set("fresh", &Value::from("v"), None, Some(3600));
        assert!(cache.get("fresh", None).is_some());

        // Plant an already-expired entry: stored two minutes ago, ttl 60.
        let fingerprint = cache.fingerprint("stale", None);
        let mut metadata = BTreeMap::new();
        metadata.insert("type".to_string(), Value::from("cache"));
        metadata.insert("key".to_string(), Value::from(fingerprint));
        metadata.insert("original_query".to_string(), Value::from("stale"));
        metadata.insert("deleted".to_string(), Value::from(false));
        metadata.insert(
            "stored_at".to_string(),
            Value::from((Utc::now().timestamp() - 120) as f64),
        );
        metadata.insert("ttl".to_string(), Value::from(60));
        storage.save("\"v\"", metadata, None);

        assert_eq!(cache.get("stale", None), None);
    }

    #[test]
    fn test_params_change_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let cache = CacheProvider::new(&storage);

        let a = cache.fingerprint("q", Some(&serde_json::json!({"lang": "en"})));
        let b = cache.fingerprint("q", Some(&serde_json::json!({"lang": "zh"})));
        let c = cache.fingerprint("q", None);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with(KEY_PREFIX));
    }

    #[test]
    fn test_fingerprint_param_order_stable() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let cache = CacheProvider::new(&storage);

        let a = serde_json::from_str::<Value>(r#"{"a": 1, "b": 2}"#).unwrap();
        let b = serde_json::from_str::<Value>(r#"{"b": 2, "a": 1}"#).unwrap();
        assert_eq!(
            cache.fingerprint("q", Some(&a)),
            cache.fingerprint("q", Some(&b))
        );
    }

    #[test]
    fn test_scan_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let cache = CacheProvider::new(&storage);

        cache.set("job:1", &Value::from("a"), None, None);
        cache.set("job:2", &Value::from("b"), None, None);

        let all = cache.scan_keys(KEY_PREFIX);
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let cache = CacheProvider::new(&storage);
        assert_eq!(cache.get("never-set", None), None);
        assert!(!cache.is_degraded());
    }
}
