use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::interface::channel::ChannelError;
use crate::interface::fix::Fix;

pub const DEFAULT_TOPIC: &str = "location-update";

/// Shared configuration for the producer, consumer and reporter loops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub topic: String,
    pub publish_interval_ms: u64,
    pub poll_timeout_ms: u64,
    pub report_interval_ms: u64,
    pub start_latitude: f64,
    pub start_longitude: f64,
    /// Upper bound of each random-walk step, in degrees per axis.
    pub step_degrees: f64,
    pub seed: Option<u64>,
    pub max_batch: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            topic: DEFAULT_TOPIC.to_string(),
            publish_interval_ms: 1_000,
            poll_timeout_ms: 100,
            report_interval_ms: 5_000,
            start_latitude: 0.0,
            start_longitude: 0.0,
            step_degrees: 0.01,
            seed: None,
            max_batch: 500,
        }
    }
}

impl PipelineConfig {
    pub fn publish_interval(&self) -> Duration {
        Duration::from_millis(self.publish_interval_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms)
    }

    pub fn start(&self) -> Fix {
        Fix::new(self.start_latitude, self.start_longitude)
    }

    /// Longest suspension any loop may sit in before re-checking the run flag.
    pub fn shutdown_ceiling(&self) -> Duration {
        self.publish_interval()
            .max(self.poll_timeout())
            .max(self.report_interval())
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if self.topic.trim().is_empty() {
            return Err(PipelineError::InvalidConfig("topic must not be empty".into()));
        }
        if self.publish_interval_ms == 0 || self.poll_timeout_ms == 0 || self.report_interval_ms == 0
        {
            return Err(PipelineError::InvalidConfig(
                "intervals must be greater than zero".into(),
            ));
        }
        if !self.start().in_range() {
            return Err(PipelineError::InvalidConfig(format!(
                "start point {} is out of range",
                self.start()
            )));
        }
        if !(self.step_degrees.is_finite() && self.step_degrees >= 0.0) {
            return Err(PipelineError::InvalidConfig(
                "step_degrees must be a non-negative number".into(),
            ));
        }
        if self.max_batch == 0 {
            return Err(PipelineError::InvalidConfig("max_batch must be positive".into()));
        }
        Ok(())
    }
}

/// Failures that end a pipeline run.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("startup failed: {0}")]
    Startup(String),
    #[error("{task} stopped on channel failure: {source}")]
    Channel {
        task: &'static str,
        #[source]
        source: ChannelError,
    },
    #[error("{0} task panicked")]
    TaskPanicked(&'static str),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
