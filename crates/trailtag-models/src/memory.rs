//! Memory entry families persisted by the storage and memory layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::{JobPhase, JobStatus};

/// Classification of a stored memory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    /// Current task context
    ShortTerm,
    /// Cross-session persisted data
    LongTerm,
    /// Recognized entities and their relations
    Entity,
    /// Structured knowledge
    Knowledge,
    /// Key-value cache entry
    Cache,
}

/// Content of a memory entry: raw text or a structured document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MemoryContent {
    Text(String),
    Structured(Value),
}

impl MemoryContent {
    /// Textual rendering used by substring search.
    pub fn as_text(&self) -> String {
        match self {
            MemoryContent::Text(s) => s.clone(),
            MemoryContent::Structured(v) => v.to_string(),
        }
    }
}

impl From<String> for MemoryContent {
    fn from(s: String) -> Self {
        MemoryContent::Text(s)
    }
}

impl From<&str> for MemoryContent {
    fn from(s: &str) -> Self {
        MemoryContent::Text(s.to_string())
    }
}

/// A record in the storage backend pool.
///
/// Cache entries carry `{type: "cache", key, original_query, deleted,
/// stored_at, ttl}` in `metadata`; the pool itself is append-only and
/// duplicates are resolved by the cache layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: String,
    pub memory_type: MemoryType,
    pub content: MemoryContent,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_role: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl MemoryEntry {
    /// Typed accessor for a string metadata field.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    /// Typed accessor for a boolean metadata field (absent reads as false).
    pub fn metadata_flag(&self, key: &str) -> bool {
        self.metadata
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Typed projection of a job used for the `job_memories.json` snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobProgressEntry {
    pub job_id: String,
    pub video_id: String,
    pub status: JobStatus,
    pub phase: JobPhase,
    pub progress: u8,
    #[serde(default)]
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Persisted analysis outcome for a video, idempotent on `video_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResultEntry {
    pub video_id: String,
    pub metadata: Value,
    pub topic_summary: Value,
    pub map_visualization: Value,
    /// Wall-clock processing time in seconds
    pub processing_time: f64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub cached: bool,
}

/// Agent-scoped memory: context plus extracted structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMemoryEntry {
    pub agent_role: String,
    pub memory_type: MemoryType,
    pub context: String,
    #[serde(default)]
    pub entities: Vec<Value>,
    #[serde(default)]
    pub relationships: Vec<Value>,
    #[serde(default)]
    pub insights: Vec<String>,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_task_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Aggregate memory-system statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total_entries: usize,
    pub short_term_count: usize,
    pub long_term_count: usize,
    pub entity_count: usize,
    pub knowledge_count: usize,
    pub storage_size_mb: f64,
    pub avg_query_time_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_content_untagged() {
        let text: MemoryContent = serde_json::from_str("\"hello\"").unwrap();
        assert_eq!(text, MemoryContent::Text("hello".to_string()));

        let structured: MemoryContent = serde_json::from_str("{\"a\": 1}").unwrap();
        assert!(matches!(structured, MemoryContent::Structured(_)));
    }

    #[test]
    fn test_metadata_accessors() {
        let mut metadata = BTreeMap::new();
        metadata.insert("type".to_string(), Value::from("cache"));
        metadata.insert("deleted".to_string(), Value::from(true));

        let entry = MemoryEntry {
            id: "abc".to_string(),
            memory_type: MemoryType::Cache,
            content: "x".into(),
            metadata,
            agent_role: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            expires_at: None,
        };

        assert_eq!(entry.metadata_str("type"), Some("cache"));
        assert!(entry.metadata_flag("deleted"));
        assert!(!entry.metadata_flag("missing"));
    }

    #[test]
    fn test_memory_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&MemoryType::ShortTerm).unwrap(),
            "\"short_term\""
        );
        assert_eq!(
            serde_json::to_string(&MemoryType::Cache).unwrap(),
            "\"cache\""
        );
    }
}
