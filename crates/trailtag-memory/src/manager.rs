//! Typed facade over the record pool for the four memory families.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, RwLock};
use std::time::Instant;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use trailtag_models::{
    AgentMemoryEntry, AnalysisResultEntry, JobPhase, JobProgressEntry, JobStatus, MemoryStats,
    MemoryType,
};

use crate::config::MemoryConfig;
use crate::error::MemoryError;
use crate::storage::{MemoryStorage, SearchHit};

const JOB_MEMORIES_FILE: &str = "job_memories.json";
const ANALYSIS_RESULTS_FILE: &str = "analysis_results.json";
const AGENT_MEMORIES_FILE: &str = "agent_memories.json";
const CREW_MEMORY_DIR: &str = "crew_memory";

/// Memory family selector for [`MemoryManager::reset_memories`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryFamily {
    Job,
    Analysis,
    Agent,
    Crew,
}

impl std::str::FromStr for MemoryFamily {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "job" => Ok(MemoryFamily::Job),
            "analysis" => Ok(MemoryFamily::Analysis),
            "agent" => Ok(MemoryFamily::Agent),
            "crew" => Ok(MemoryFamily::Crew),
            other => Err(MemoryError::UnknownFamily(other.to_string())),
        }
    }
}

/// Coordinates the record pool and the three typed JSON files.
///
/// A single writer lock serializes snapshot writes; read paths go through
/// the per-family in-memory indexes.
pub struct MemoryManager {
    config: MemoryConfig,
    storage: MemoryStorage,
    job_memories: RwLock<HashMap<String, JobProgressEntry>>,
    analysis_results: RwLock<HashMap<String, AnalysisResultEntry>>,
    agent_memories: RwLock<HashMap<String, Vec<AgentMemoryEntry>>>,
    query_times_ms: Mutex<Vec<f64>>,
    write_lock: Mutex<()>,
}

impl MemoryManager {
    /// Open the manager, loading every family snapshot that parses. A file
    /// that fails to parse is skipped with a warning.
    pub fn open(config: MemoryConfig) -> Self {
        let root = config.storage_path.clone();
        if let Err(e) = fs::create_dir_all(&root) {
            warn!("Failed to create storage root {:?}: {}", root, e);
        }

        let storage = MemoryStorage::open(root.join(CREW_MEMORY_DIR));

        let job_memories: HashMap<String, JobProgressEntry> =
            load_array(&root.join(JOB_MEMORIES_FILE))
                .into_iter()
                .map(|e: JobProgressEntry| (e.job_id.clone(), e))
                .collect();
        let analysis_results: HashMap<String, AnalysisResultEntry> =
            load_array(&root.join(ANALYSIS_RESULTS_FILE))
                .into_iter()
                .map(|e: AnalysisResultEntry| (e.video_id.clone(), e))
                .collect();
        let agent_memories: HashMap<String, Vec<AgentMemoryEntry>> =
            load_map(&root.join(AGENT_MEMORIES_FILE));

        debug!(
            jobs = job_memories.len(),
            analyses = analysis_results.len(),
            agents = agent_memories.len(),
            "MemoryManager loaded existing data"
        );

        Self {
            config,
            storage,
            job_memories: RwLock::new(job_memories),
            analysis_results: RwLock::new(analysis_results),
            agent_memories: RwLock::new(agent_memories),
            query_times_ms: Mutex::new(Vec::new()),
            write_lock: Mutex::new(()),
        }
    }

    /// Open with config from the environment.
    pub fn from_env() -> Self {
        Self::open(MemoryConfig::from_env())
    }

    /// The underlying record pool (used by the cache provider).
    pub fn storage(&self) -> &MemoryStorage {
        &self.storage
    }

    // ========================================================================
    // Job progress family
    // ========================================================================

    /// Store or update the progress entry for a job and rewrite the
    /// `job_memories.json` snapshot.
    pub fn save_job_progress(
        &self,
        job_id: &str,
        video_id: &str,
        status: JobStatus,
        phase: JobPhase,
        progress: u8,
        cached: bool,
        result: Option<Value>,
        error_message: Option<String>,
    ) {
        let now = Utc::now();
        let mut jobs = self.job_memories.write().expect("job memories lock poisoned");
        let entry = jobs
            .entry(job_id.to_string())
            .and_modify(|e| {
                e.status = status;
                e.phase = phase;
                e.progress = progress;
                e.cached = cached;
                e.updated_at = now;
            })
            .or_insert_with(|| JobProgressEntry {
                job_id: job_id.to_string(),
                video_id: video_id.to_string(),
                status,
                phase,
                progress,
                cached,
                result: None,
                error_message: None,
                created_at: now,
                updated_at: now,
            });
        if result.is_some() {
            entry.result = result;
        }
        if error_message.is_some() {
            entry.error_message = error_message;
        }

        let snapshot: Vec<JobProgressEntry> = jobs.values().cloned().collect();
        drop(jobs);
        self.persist_array(JOB_MEMORIES_FILE, &snapshot);

        debug!(job_id, status = status.as_str(), progress, "Saved job progress");
    }

    pub fn get_job_progress(&self, job_id: &str) -> Option<JobProgressEntry> {
        self.job_memories
            .read()
            .ok()
            .and_then(|jobs| jobs.get(job_id).cloned())
    }

    // ========================================================================
    // Analysis result family
    // ========================================================================

    /// Store the final analysis for a video; idempotent on `video_id`.
    pub fn save_analysis_result(
        &self,
        video_id: &str,
        metadata: Value,
        topic_summary: Value,
        map_visualization: Value,
        processing_time: f64,
    ) {
        let entry = AnalysisResultEntry {
            video_id: video_id.to_string(),
            metadata,
            topic_summary,
            map_visualization,
            processing_time,
            created_at: Utc::now(),
            cached: false,
        };

        let mut results = self
            .analysis_results
            .write()
            .expect("analysis results lock poisoned");
        results.insert(video_id.to_string(), entry);
        let snapshot: Vec<AnalysisResultEntry> = results.values().cloned().collect();
        drop(results);
        self.persist_array(ANALYSIS_RESULTS_FILE, &snapshot);

        info!(video_id, "Saved analysis result");
    }

    pub fn get_analysis_result(&self, video_id: &str) -> Option<AnalysisResultEntry> {
        self.analysis_results
            .read()
            .ok()
            .and_then(|results| results.get(video_id).cloned())
    }

    // ========================================================================
    // Agent memory family
    // ========================================================================

    /// Append an agent memory and return its synthetic ID.
    pub fn save_agent_memory(
        &self,
        agent_role: &str,
        context: &str,
        entities: Vec<Value>,
        relationships: Vec<Value>,
        insights: Vec<String>,
        confidence: f64,
    ) -> String {
        let entry = AgentMemoryEntry {
            agent_role: agent_role.to_string(),
            memory_type: MemoryType::LongTerm,
            context: context.to_string(),
            entities,
            relationships,
            insights,
            confidence: confidence.clamp(0.0, 1.0),
            source_task_id: None,
            created_at: Utc::now(),
        };

        let mut agents = self
            .agent_memories
            .write()
            .expect("agent memories lock poisoned");
        let memories = agents.entry(agent_role.to_string()).or_default();
        memories.push(entry);
        let id = format!("{}_{}", agent_role, memories.len());
        let snapshot: HashMap<String, Vec<AgentMemoryEntry>> = agents.clone();
        drop(agents);
        self.persist_map(AGENT_MEMORIES_FILE, &snapshot);

        debug!(agent_role, "Saved agent memory");
        id
    }

    /// Substring filter on `context`, newest entries first.
    pub fn query_agent_memories(
        &self,
        agent_role: &str,
        query: &str,
        limit: usize,
    ) -> Vec<AgentMemoryEntry> {
        let query_lower = query.to_lowercase();
        let agents = match self.agent_memories.read() {
            Ok(guard) => guard,
            Err(_) => return Vec::new(),
        };
        let mut matches: Vec<AgentMemoryEntry> = agents
            .get(agent_role)
            .map(|memories| {
                memories
                    .iter()
                    .filter(|m| m.context.to_lowercase().contains(&query_lower))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matches.truncate(limit);
        matches
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Wipe one family, or everything (including the record pool) when
    /// `family` is `None`.
    pub fn reset_memories(&self, family: Option<MemoryFamily>) {
        match family {
            Some(MemoryFamily::Job) => {
                self.job_memories
                    .write()
                    .expect("job memories lock poisoned")
                    .clear();
                self.remove_file(JOB_MEMORIES_FILE);
            }
            Some(MemoryFamily::Analysis) => {
                self.analysis_results
                    .write()
                    .expect("analysis results lock poisoned")
                    .clear();
                self.remove_file(ANALYSIS_RESULTS_FILE);
            }
            Some(MemoryFamily::Agent) => {
                self.agent_memories
                    .write()
                    .expect("agent memories lock poisoned")
                    .clear();
                self.remove_file(AGENT_MEMORIES_FILE);
            }
            Some(MemoryFamily::Crew) => self.storage.reset(),
            None => {
                self.job_memories
                    .write()
                    .expect("job memories lock poisoned")
                    .clear();
                self.analysis_results
                    .write()
                    .expect("analysis results lock poisoned")
                    .clear();
                self.agent_memories
                    .write()
                    .expect("agent memories lock poisoned")
                    .clear();
                self.storage.reset();
                self.remove_file(JOB_MEMORIES_FILE);
                self.remove_file(ANALYSIS_RESULTS_FILE);
                self.remove_file(AGENT_MEMORIES_FILE);
            }
        }
        info!("Memory reset completed");
    }

    /// Aggregate statistics across all families.
    pub fn get_memory_stats(&self) -> MemoryStats {
        let total_entries = self.storage.len()
            + self.job_memories.read().map(|j| j.len()).unwrap_or(0)
            + self.analysis_results.read().map(|a| a.len()).unwrap_or(0);

        let query_times = self.query_times_ms.lock().expect("query times lock poisoned");
        let avg_query_time_ms = if query_times.is_empty() {
            0.0
        } else {
            query_times.iter().sum::<f64>() / query_times.len() as f64
        };

        MemoryStats {
            total_entries,
            short_term_count: self.storage.count_by_type(MemoryType::ShortTerm),
            long_term_count: self.storage.count_by_type(MemoryType::LongTerm),
            entity_count: self.storage.count_by_type(MemoryType::Entity),
            knowledge_count: self.storage.count_by_type(MemoryType::Knowledge),
            storage_size_mb: self.directory_size_bytes() as f64 / (1024.0 * 1024.0),
            avg_query_time_ms,
        }
    }

    /// Delegate a search to the record pool, tracking query latency.
    pub fn search(&self, query: &str, limit: usize, score_threshold: f64) -> Vec<SearchHit> {
        let start = Instant::now();
        let hits = self.storage.search(query, limit, score_threshold);
        if let Ok(mut times) = self.query_times_ms.lock() {
            times.push(start.elapsed().as_secs_f64() * 1000.0);
        }
        hits
    }

    // ========================================================================
    // Persistence helpers
    // ========================================================================

    fn persist_array<T: Serialize>(&self, file: &str, entries: &[T]) {
        let _guard = self.write_lock.lock().expect("write lock poisoned");
        self.write_json(file, entries);
    }

    fn persist_map<T: Serialize>(&self, file: &str, map: &HashMap<String, Vec<T>>) {
        let _guard = self.write_lock.lock().expect("write lock poisoned");
        self.write_json(file, map);
    }

    fn write_json<T: Serialize + ?Sized>(&self, file: &str, value: &T) {
        let path = self.config.storage_path.join(file);
        let json = match serde_json::to_string_pretty(value) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize {}: {}", file, e);
                return;
            }
        };
        let tmp = self.config.storage_path.join(format!("{}.tmp", file));
        if let Err(e) = fs::write(&tmp, json).and_then(|_| fs::rename(&tmp, &path)) {
            warn!("Failed to persist {}: {}", file, e);
        }
    }

    fn remove_file(&self, file: &str) {
        let path = self.config.storage_path.join(file);
        if path.exists() {
            if let Err(e) = fs::remove_file(&path) {
                warn!("Failed to remove {}: {}", file, e);
            }
        }
    }

    fn directory_size_bytes(&self) -> u64 {
        fn walk(dir: &Path) -> u64 {
            fs::read_dir(dir)
                .map(|entries| {
                    entries
                        .filter_map(Result::ok)
                        .map(|entry| {
                            let path = entry.path();
                            if path.is_dir() {
                                walk(&path)
                            } else {
                                entry.metadata().map(|m| m.len()).unwrap_or(0)
                            }
                        })
                        .sum()
                })
                .unwrap_or(0)
        }
        walk(&self.config.storage_path)
    }
}

/// Load a JSON array file into entries; parse failures yield an empty list.
fn load_array<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    if !path.exists() {
        return Vec::new();
    }
    match fs::read_to_string(path).map_err(MemoryError::from).and_then(|raw| {
        serde_json::from_str::<Vec<T>>(&raw).map_err(MemoryError::from)
    }) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Failed to load {:?}, skipping: {}", path, e);
            Vec::new()
        }
    }
}

/// Load a JSON object-of-arrays file; parse failures yield an empty map.
fn load_map<T: DeserializeOwned>(path: &Path) -> HashMap<String, Vec<T>> {
    if !path.exists() {
        return HashMap::new();
    }
    match fs::read_to_string(path).map_err(MemoryError::from).and_then(|raw| {
        serde_json::from_str::<HashMap<String, Vec<T>>>(&raw).map_err(MemoryError::from)
    }) {
        Ok(map) => map,
        Err(e) => {
            warn!("Failed to load {:?}, skipping: {}", path, e);
            HashMap::new()
        }
    }
}
