use log::{debug, error, info, warn};

use crate::interface::fix::Fix;

/// Central place for the pipeline's log lines, so every loop reports the
/// same events with the same wording.
#[derive(Clone)]
pub struct LogManager {
    target: &'static str,
}

impl LogManager {
    pub fn new(target: &'static str) -> Self {
        Self { target }
    }

    pub fn record(&self, message: &str) {
        info!(target: self.target, "{}", message);
    }

    pub fn fix_sent(&self, payload: &str) {
        info!(target: self.target, "Sent location: {}", payload);
    }

    pub fn fix_received(&self, fix: &Fix) {
        info!(
            target: self.target,
            "Received location: {} {}", fix.latitude, fix.longitude
        );
    }

    pub fn fix_persisted(&self, fix: &Fix) {
        debug!(
            target: self.target,
            "Inserted location: {}, {}", fix.latitude, fix.longitude
        );
    }

    pub fn distance(&self, total_km: f64, fixes: usize) {
        info!(
            target: self.target,
            "Total distance traveled: {:.6} km over {} fixes", total_km, fixes
        );
    }

    pub fn anomaly(&self, message: &str) {
        warn!(target: self.target, "{}", message);
    }

    pub fn failure(&self, message: &str) {
        error!(target: self.target, "{}", message);
    }
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new("trackcore")
    }
}
