//! Memory system configuration.

use std::path::PathBuf;

/// Configuration for the memory storage layer.
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Root directory for all JSON snapshots
    pub storage_path: PathBuf,
    /// Soft cap on short-term entries
    pub max_short_term_entries: usize,
    /// Soft cap on long-term entries
    pub max_long_term_entries: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("./crewai_storage"),
            max_short_term_entries: 1000,
            max_long_term_entries: 10000,
        }
    }
}

impl MemoryConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            storage_path: std::env::var("CREWAI_STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./crewai_storage")),
            max_short_term_entries: std::env::var("MEMORY_MAX_SHORT_TERM")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1000),
            max_long_term_entries: std::env::var("MEMORY_MAX_LONG_TERM")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10000),
        }
    }

    /// Config rooted at an explicit path (used by tests).
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            storage_path: path.into(),
            ..Self::default()
        }
    }
}
