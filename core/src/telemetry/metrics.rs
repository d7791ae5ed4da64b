use serde::Serialize;
use std::sync::Mutex;

/// Thread-safe counters shared by the three pipeline loops.
pub struct MetricsRecorder {
    inner: Mutex<MetricsSnapshot>,
}

/// Point-in-time copy of the pipeline counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub published: usize,
    pub publish_failures: usize,
    pub received: usize,
    pub decode_failures: usize,
    pub persistence_failures: usize,
    /// Invalid segments seen by the most recent report.
    pub geometry_anomalies: usize,
    pub reports: usize,
    pub last_distance_km: Option<f64>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsSnapshot::default()),
        }
    }

    fn update(&self, apply: impl FnOnce(&mut MetricsSnapshot)) {
        if let Ok(mut metrics) = self.inner.lock() {
            apply(&mut metrics);
        }
    }

    pub fn record_published(&self) {
        self.update(|m| m.published += 1);
    }

    pub fn record_publish_failure(&self) {
        self.update(|m| m.publish_failures += 1);
    }

    pub fn record_received(&self) {
        self.update(|m| m.received += 1);
    }

    pub fn record_decode_failure(&self) {
        self.update(|m| m.decode_failures += 1);
    }

    pub fn record_persistence_failure(&self) {
        self.update(|m| m.persistence_failures += 1);
    }

    pub fn record_report(&self, total_km: f64, anomalies: usize) {
        self.update(|m| {
            m.reports += 1;
            m.geometry_anomalies = anomalies;
            m.last_distance_km = Some(total_km);
        });
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        if let Ok(metrics) = self.inner.lock() {
            *metrics
        } else {
            MetricsSnapshot::default()
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
