use crate::interface::fix::Fix;
use crate::math::geo::{GeoHelper, GeometryInputError};

/// Result of reducing an ordered fix sequence to a travelled distance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathSummary {
    pub total_km: f64,
    pub segments: usize,
    pub anomalies: Vec<GeometryInputError>,
}

pub struct PathHelper;

impl PathHelper {
    /// Sums the great-circle length of each consecutive pair.
    ///
    /// A segment touching an invalid fix contributes zero and is recorded as
    /// an anomaly; the rest of the path is unaffected.
    pub fn cumulative(fixes: &[Fix]) -> PathSummary {
        let mut summary = PathSummary::default();
        for pair in fixes.windows(2) {
            summary.segments += 1;
            match GeoHelper::try_distance_km(&pair[0], &pair[1]) {
                Ok(km) => summary.total_km += km,
                Err(err) => summary.anomalies.push(err),
            }
        }
        summary
    }

    pub fn cumulative_km(fixes: &[Fix]) -> f64 {
        Self::cumulative(fixes).total_km
    }
}
