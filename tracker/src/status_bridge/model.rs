use serde::Serialize;
use trackcore::interface::Fix;
use trackcore::processing::{FixStore, RunState};
use trackcore::telemetry::{MetricsRecorder, MetricsSnapshot};

/// Body of `GET /status`.
#[derive(Debug, Clone, Serialize, Default)]
pub struct StatusModel {
    pub running: bool,
    pub fixes: usize,
    pub last_fix: Option<Fix>,
    pub distance_km: Option<f64>,
    pub metrics: MetricsSnapshot,
}

impl StatusModel {
    pub fn capture(store: &FixStore, metrics: &MetricsRecorder, state: &RunState) -> Self {
        let metrics = metrics.snapshot();
        Self {
            running: state.is_running(),
            fixes: store.len(),
            last_fix: store.last(),
            distance_km: metrics.last_distance_km,
            metrics,
        }
    }
}
