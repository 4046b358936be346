//! Application state.

use std::sync::Arc;

use trailtag_cache::{CacheManager, JobRegistry};
use trailtag_engine::{AnalysisExecutor, EngineConfig, ProgressSink, ToolPipeline, WorkflowDriver};
use trailtag_memory::{MemoryConfig, MemoryManager};
use trailtag_tools::{GeocodeClient, GeocodeConfig, HttpMetadataProvider, MetadataProvider};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub registry: JobRegistry,
    pub executor: Arc<AnalysisExecutor>,
    pub metadata: Arc<dyn MetadataProvider>,
}

impl AppState {
    /// Create state wired against the real tool clients.
    pub fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let metadata: Arc<dyn MetadataProvider> = Arc::new(HttpMetadataProvider::from_env()?);
        let geocoder = Arc::new(GeocodeClient::new(GeocodeConfig::from_env())?);
        Self::with_components(config, MemoryConfig::from_env(), metadata, geocoder)
    }

    /// Create state over explicit components (tests swap in static ones).
    pub fn with_components(
        config: ApiConfig,
        memory_config: MemoryConfig,
        metadata: Arc<dyn MetadataProvider>,
        geocoder: Arc<GeocodeClient>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let memory = Arc::new(MemoryManager::open(memory_config));
        let registry = JobRegistry::new(CacheManager::new(memory));

        let pipeline = Arc::new(ToolPipeline::new(Arc::clone(&metadata), geocoder));
        let driver = WorkflowDriver::new(pipeline);
        let sink = ProgressSink::new(registry.clone(), None);
        let executor = Arc::new(AnalysisExecutor::new(EngineConfig::from_env(), driver, sink));

        Ok(Self {
            config,
            registry,
            executor,
            metadata,
        })
    }
}
