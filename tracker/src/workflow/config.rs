use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use trackcore::prelude::PipelineConfig;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    #[serde(flatten)]
    pub pipeline: PipelineConfig,
    /// JSON-lines file receiving every ingested fix. In-memory when absent.
    pub persistence_path: Option<PathBuf>,
    /// Stop automatically after this long. Runs until Ctrl+C when absent.
    pub run_for_ms: Option<u64>,
    pub status_port: u16,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            persistence_path: None,
            run_for_ms: None,
            status_port: 9000,
        }
    }
}

impl TrackerConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading tracker config {}", path_ref.display()))?;
        let config: TrackerConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing tracker config {}", path_ref.display()))?;
        config
            .pipeline
            .validate()
            .with_context(|| format!("validating tracker config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(
        pipeline: PipelineConfig,
        persistence_path: Option<PathBuf>,
        run_for_ms: Option<u64>,
        status_port: u16,
    ) -> Self {
        Self {
            pipeline,
            persistence_path,
            run_for_ms,
            status_port,
        }
    }

    pub fn run_for(&self) -> Option<Duration> {
        self.run_for_ms.map(Duration::from_millis)
    }

    pub fn to_pipeline_config(&self) -> PipelineConfig {
        self.pipeline.clone()
    }
}
