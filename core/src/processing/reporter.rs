use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::math::path::PathHelper;
use crate::processing::run_state::RunState;
use crate::processing::store::FixStore;
use crate::telemetry::{LogManager, MetricsRecorder};

/// One emitted distance metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DistanceReport {
    pub total_km: f64,
    pub fixes: usize,
    pub anomalies: usize,
}

/// Periodically recomputes the cumulative distance from a fresh snapshot.
///
/// Each report starts from scratch, so a bad fix only zeroes the segments it
/// touches in that snapshot and never carries over into the next cycle.
pub struct DistanceReporter {
    store: Arc<FixStore>,
    interval: Duration,
    metrics: Arc<MetricsRecorder>,
    logger: LogManager,
}

impl DistanceReporter {
    pub fn new(store: Arc<FixStore>, interval: Duration, metrics: Arc<MetricsRecorder>) -> Self {
        Self {
            store,
            interval,
            metrics,
            logger: LogManager::new("trackcore::report"),
        }
    }

    /// Reduces the current history to a distance without emitting it.
    pub fn compute(&self) -> DistanceReport {
        let fixes = self.store.snapshot();
        let summary = PathHelper::cumulative(&fixes);
        for anomaly in &summary.anomalies {
            self.logger
                .anomaly(&format!("segment skipped in distance report: {}", anomaly));
        }
        DistanceReport {
            total_km: summary.total_km,
            fixes: fixes.len(),
            anomalies: summary.anomalies.len(),
        }
    }

    /// Computes, logs and records one report.
    pub fn report(&self) -> DistanceReport {
        let report = self.compute();
        self.metrics.record_report(report.total_km, report.anomalies);
        self.logger.distance(report.total_km, report.fixes);
        report
    }

    pub async fn run(self, state: RunState) {
        while state.sleep(self.interval).await {
            self.report();
        }
        self.logger.record("reporter stopped");
    }
}
