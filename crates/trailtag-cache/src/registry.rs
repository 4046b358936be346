//! Job registry and video-job mapping, realized as cache key spaces.
//!
//! Key layout:
//! - `job:{job_id}` — full job record
//! - `video_job:{video_id}` — id of the current job for a video
//! - `analysis:{video_id}` — final map visualization

use serde_json::Value;
use tracing::{debug, info, warn};

use trailtag_models::{Job, JobId, MapVisualization, VideoId, TERMINAL_JOB_TTL_SECS};

use crate::manager::CacheManager;

/// Bidirectional job/video bookkeeping over the cache.
#[derive(Clone)]
pub struct JobRegistry {
    cache: CacheManager,
}

impl JobRegistry {
    pub fn new(cache: CacheManager) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    pub fn job_key(job_id: &JobId) -> String {
        format!("job:{}", job_id)
    }

    pub fn video_job_key(video_id: &VideoId) -> String {
        format!("video_job:{}", video_id)
    }

    pub fn analysis_key(video_id: &VideoId) -> String {
        format!("analysis:{}", video_id)
    }

    /// Persist a job; terminal jobs get the short advisory TTL.
    pub fn store_job(&self, job: &Job) {
        let ttl = job.status.is_terminal().then_some(TERMINAL_JOB_TTL_SECS);
        if !self.cache.set_json(&Self::job_key(&job.job_id), job, ttl) {
            warn!(job_id = %job.job_id, "Failed to persist job record");
        }
    }

    pub fn get_job(&self, job_id: &JobId) -> Option<Job> {
        self.cache.get_json(&Self::job_key(job_id))
    }

    /// Map a video to its current job. Failures are logged, not fatal: the
    /// next submission simply overwrites the mapping.
    pub fn store_mapping(&self, video_id: &VideoId, job_id: &JobId, ttl: Option<u64>) {
        let ok = self.cache.set(
            &Self::video_job_key(video_id),
            &Value::from(job_id.to_string()),
            ttl,
        );
        if !ok {
            debug!(%video_id, %job_id, "Failed to store video-job mapping");
        }
    }

    /// Remove the mapping once its job reaches a terminal state.
    pub fn remove_mapping(&self, video_id: &VideoId) {
        if !self.cache.delete(&Self::video_job_key(video_id)) {
            debug!(%video_id, "Failed to delete video-job mapping");
        }
    }

    /// Resolve the current job for a video via the mapping. Either miss is
    /// a not-found; the job table is never scanned.
    pub fn job_for_video(&self, video_id: &VideoId) -> Option<Job> {
        let mapped = self.cache.get(&Self::video_job_key(video_id))?;
        let job_id = JobId::from_string(mapped.as_str()?);
        self.get_job(&job_id)
    }

    /// Persist the final analysis artifact for a video.
    pub fn store_analysis(&self, video_id: &VideoId, map: &MapVisualization) {
        if !self.cache.set_json(&Self::analysis_key(video_id), map, None) {
            warn!(%video_id, "Failed to persist analysis result");
        } else {
            info!(%video_id, routes = map.routes.len(), "Stored analysis result");
        }
    }

    pub fn get_analysis(&self, video_id: &VideoId) -> Option<MapVisualization> {
        self.cache.get_json(&Self::analysis_key(video_id))
    }

    pub fn has_analysis(&self, video_id: &VideoId) -> bool {
        self.cache.exists(&Self::analysis_key(video_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use trailtag_memory::{MemoryConfig, MemoryManager};
    use trailtag_models::{JobStatus, RouteItem, SubtitleStatus};

    fn registry(dir: &std::path::Path) -> JobRegistry {
        let memory = Arc::new(MemoryManager::open(MemoryConfig::at_path(dir)));
        JobRegistry::new(CacheManager::new(memory))
    }

    fn video() -> VideoId {
        VideoId::new("dQw4w9WgXcQ").unwrap()
    }

    fn map() -> MapVisualization {
        MapVisualization {
            video_id: "dQw4w9WgXcQ".to_string(),
            routes: vec![RouteItem {
                location: "Jiufen Old Street".to_string(),
                coordinates: Some([121.8443, 25.1097]),
                description: None,
                timecode: Some("00:01:30,000".to_string()),
                tags: None,
                marker: None,
            }],
        }
    }

    #[test]
    fn test_job_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());

        let job = Job::new_queued(video(), SubtitleStatus::unavailable());
        registry.store_job(&job);

        let loaded = registry.get_job(&job.job_id).unwrap();
        assert_eq!(loaded.job_id, job.job_id);
        assert_eq!(loaded.status, JobStatus::Queued);
    }

    #[test]
    fn test_mapping_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());

        let job = Job::new_queued(video(), SubtitleStatus::unavailable());
        registry.store_job(&job);
        registry.store_mapping(&video(), &job.job_id, None);

        let resolved = registry.job_for_video(&video()).unwrap();
        assert_eq!(resolved.job_id, job.job_id);

        registry.remove_mapping(&video());
        assert!(registry.job_for_video(&video()).is_none());
    }

    #[test]
    fn test_mapping_overwrite_keeps_one_active_job() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());

        let first = Job::new_queued(video(), SubtitleStatus::unavailable());
        let second = Job::new_queued(video(), SubtitleStatus::unavailable());
        registry.store_job(&first);
        registry.store_job(&second);

        registry.store_mapping(&video(), &first.job_id, None);
        registry.store_mapping(&video(), &second.job_id, None);

        let resolved = registry.job_for_video(&video()).unwrap();
        assert_eq!(resolved.job_id, second.job_id);
    }

    #[test]
    fn test_mapping_without_job_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());

        registry.store_mapping(&video(), &JobId::from_string("gone"), None);
        assert!(registry.job_for_video(&video()).is_none());
    }

    #[test]
    fn test_analysis_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());

        assert!(!registry.has_analysis(&video()));
        registry.store_analysis(&video(), &map());
        assert!(registry.has_analysis(&video()));

        let loaded = registry.get_analysis(&video()).unwrap();
        assert_eq!(loaded.routes[0].location, "Jiufen Old Street");
    }
}
