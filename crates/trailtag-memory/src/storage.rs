//! Record pool with a JSON snapshot.
//!
//! The pool is append-only: `save` never updates in place by key, and
//! duplicates are resolved at the cache layer via `metadata.key` plus
//! soft-delete markers. The snapshot is rewritten in full on every save,
//! which is fine for the expected volume (at most a few thousand records).

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use trailtag_models::{MemoryContent, MemoryEntry, MemoryType};

/// Snapshot file name under the storage directory.
const SNAPSHOT_FILE: &str = "memories.json";

/// A search hit from the record pool.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    pub content: MemoryContent,
    pub metadata: std::collections::BTreeMap<String, Value>,
    pub score: f64,
    pub agent_role: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// In-memory record store persisted to `{dir}/memories.json`.
///
/// Filesystem errors never propagate to callers; the in-memory map stays
/// authoritative until process restart.
pub struct MemoryStorage {
    dir: PathBuf,
    memories: RwLock<HashMap<String, MemoryEntry>>,
}

impl MemoryStorage {
    /// Open (or create) the store rooted at `dir`, loading any existing
    /// snapshot. A corrupt snapshot logs a warning and starts empty.
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        if let Err(e) = fs::create_dir_all(&dir) {
            warn!("Failed to create memory storage dir {:?}: {}", dir, e);
        }

        let memories = match Self::load_snapshot(&dir.join(SNAPSHOT_FILE)) {
            Ok(loaded) => {
                if !loaded.is_empty() {
                    debug!("Loaded {} memory entries from snapshot", loaded.len());
                }
                loaded
            }
            Err(e) => {
                warn!("Failed to load memory snapshot, starting empty: {}", e);
                HashMap::new()
            }
        };

        Self {
            dir,
            memories: RwLock::new(memories),
        }
    }

    fn load_snapshot(path: &Path) -> std::io::Result<HashMap<String, MemoryEntry>> {
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let raw = fs::read_to_string(path)?;
        let entries: Vec<MemoryEntry> = serde_json::from_str(&raw)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(entries.into_iter().map(|e| (e.id.clone(), e)).collect())
    }

    /// Store a new entry and return its ID.
    ///
    /// The snapshot rewrite is best-effort: write failures are logged and
    /// the entry remains available in memory.
    pub fn save(
        &self,
        value: impl Into<MemoryContent>,
        metadata: std::collections::BTreeMap<String, Value>,
        agent: Option<&str>,
    ) -> String {
        let now = Utc::now();
        let entry = MemoryEntry {
            id: Uuid::new_v4().to_string(),
            memory_type: metadata
                .get("type")
                .and_then(Value::as_str)
                .and_then(|t| serde_json::from_value(Value::from(t)).ok())
                .unwrap_or(MemoryType::ShortTerm),
            content: value.into(),
            metadata,
            agent_role: agent.map(str::to_string),
            created_at: now,
            updated_at: now,
            expires_at: None,
        };
        let id = entry.id.clone();

        {
            let mut memories = self.memories.write().expect("memory lock poisoned");
            memories.insert(id.clone(), entry);
            self.rewrite_snapshot(&memories);
        }

        debug!(entry_id = %id, "Stored memory entry");
        id
    }

    /// Substring search over all undeleted entries.
    ///
    /// The score is the query's whitespace-token count over the content's,
    /// capped at 1.0; hits below `score_threshold` are dropped and the rest
    /// are returned best-first, at most `limit`.
    pub fn search(&self, query: &str, limit: usize, score_threshold: f64) -> Vec<SearchHit> {
        let query_lower = query.to_lowercase();
        let query_tokens = (query_lower.matches(' ').count() + 1) as f64;

        let memories = match self.memories.read() {
            Ok(guard) => guard,
            Err(_) => return Vec::new(),
        };

        let mut results: Vec<SearchHit> = memories
            .values()
            .filter(|m| !m.metadata_flag("deleted"))
            .filter_map(|m| {
                let content_str = m.content.as_text().to_lowercase();
                if !content_str.contains(&query_lower) {
                    return None;
                }
                let content_gaps = content_str.matches(' ').count().max(1) as f64;
                let score = query_tokens.min(1.0) / content_gaps;
                if score < score_threshold {
                    return None;
                }
                Some(SearchHit {
                    id: m.id.clone(),
                    content: m.content.clone(),
                    metadata: m.metadata.clone(),
                    score,
                    agent_role: m.agent_role.clone(),
                    created_at: m.created_at,
                })
            })
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(limit);
        results
    }

    /// Run `f` against the full entry map. Used by the cache provider for
    /// its exact-match scan.
    pub fn with_entries<R>(&self, f: impl FnOnce(&HashMap<String, MemoryEntry>) -> R) -> R {
        let memories = self.memories.read().expect("memory lock poisoned");
        f(&memories)
    }

    /// Number of entries in the pool.
    pub fn len(&self) -> usize {
        self.memories.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Count entries of one type.
    pub fn count_by_type(&self, memory_type: MemoryType) -> usize {
        self.memories
            .read()
            .map(|m| m.values().filter(|e| e.memory_type == memory_type).count())
            .unwrap_or(0)
    }

    /// Clear the pool and delete the snapshot file.
    pub fn reset(&self) {
        let mut memories = self.memories.write().expect("memory lock poisoned");
        memories.clear();
        let path = self.dir.join(SNAPSHOT_FILE);
        if path.exists() {
            if let Err(e) = fs::remove_file(&path) {
                warn!("Failed to remove memory snapshot: {}", e);
            }
        }
    }

    /// Rewrite the snapshot atomically (temp file + rename).
    fn rewrite_snapshot(&self, memories: &HashMap<String, MemoryEntry>) {
        let entries: Vec<&MemoryEntry> = memories.values().collect();
        let json = match serde_json::to_string_pretty(&entries) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize memory snapshot: {}", e);
                return;
            }
        };

        let path = self.dir.join(SNAPSHOT_FILE);
        let tmp = self.dir.join(format!("{}.tmp", SNAPSHOT_FILE));
        if let Err(e) = fs::write(&tmp, json).and_then(|_| fs::rename(&tmp, &path)) {
            warn!("Failed to persist memory snapshot: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn cache_metadata(key: &str, deleted: bool) -> BTreeMap<String, Value> {
        let mut metadata = BTreeMap::new();
        metadata.insert("type".to_string(), Value::from("cache"));
        metadata.insert("key".to_string(), Value::from(key));
        metadata.insert("deleted".to_string(), Value::from(deleted));
        metadata
    }

    #[test]
    fn test_save_assigns_ids_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let storage = MemoryStorage::open(dir.path());

        let id = storage.save("hello world", BTreeMap::new(), Some("researcher"));
        assert!(!id.is_empty());
        assert_eq!(storage.len(), 1);
        assert!(dir.path().join("memories.json").exists());
    }

    #[test]
    fn test_snapshot_reload() {
        let dir = tempfile::tempdir().unwrap();
        {
            let storage = MemoryStorage::open(dir.path());
            storage.save("first entry", BTreeMap::new(), None);
            storage.save("second entry", BTreeMap::new(), None);
        }

        let reopened = MemoryStorage::open(dir.path());
        assert_eq!(reopened.len(), 2);
    }

    #[test]
    fn test_corrupt_snapshot_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("memories.json"), "not json {").unwrap();

        let storage = MemoryStorage::open(dir.path());
        assert!(storage.is_empty());
    }

    #[test]
    fn test_search_substring_and_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let storage = MemoryStorage::open(dir.path());
        storage.save("the quick brown fox", BTreeMap::new(), None);
        storage.save("completely unrelated", BTreeMap::new(), None);

        let hits = storage.search("quick", 10, 0.0);
        assert_eq!(hits.len(), 1);
        assert!(hits[0].score > 0.0);

        // A high threshold filters the long-content hit out.
        let hits = storage.search("quick", 10, 0.9);
        assert!(hits.is_empty());
    }

    #[test]
    fn test_search_skips_tombstones() {
        let dir = tempfile::tempdir().unwrap();
        let storage = MemoryStorage::open(dir.path());
        storage.save("live-value", cache_metadata("k1", false), None);
        storage.save("live-value", cache_metadata("k1", true), None);

        let hits = storage.search("live-value", 10, 0.0);
        assert_eq!(hits.len(), 1);
        assert!(!hits[0]
            .metadata
            .get("deleted")
            .and_then(Value::as_bool)
            .unwrap_or(false));
    }

    #[test]
    fn test_search_limit_ordering() {
        let dir = tempfile::tempdir().unwrap();
        let storage = MemoryStorage::open(dir.path());
        storage.save("tag", BTreeMap::new(), None);
        storage.save("tag plus more words here", BTreeMap::new(), None);

        let hits = storage.search("tag", 1, 0.0);
        assert_eq!(hits.len(), 1);
        // The shorter content scores higher.
        assert_eq!(hits[0].content.as_text(), "tag");
    }

    #[test]
    fn test_reset_clears_pool_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = MemoryStorage::open(dir.path());
        storage.save("entry", BTreeMap::new(), None);

        storage.reset();
        assert!(storage.is_empty());
        assert!(!dir.path().join("memories.json").exists());
    }

    #[test]
    fn test_cache_type_inferred_from_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let storage = MemoryStorage::open(dir.path());
        storage.save("v", cache_metadata("k", false), None);
        assert_eq!(storage.count_by_type(MemoryType::Cache), 1);
        assert_eq!(storage.count_by_type(MemoryType::ShortTerm), 0);
    }
}
