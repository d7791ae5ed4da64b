use crate::interface::fix::Fix;

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A coordinate that cannot contribute to a path length.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum GeometryInputError {
    #[error("coordinate is not finite: {0}")]
    NotFinite(Fix),
    #[error("coordinate out of range: {0}")]
    OutOfRange(Fix),
}

pub struct GeoHelper;

impl GeoHelper {
    /// Great-circle distance between two fixes in kilometers.
    ///
    /// No input checks; NaN propagates.
    pub fn distance_km(a: &Fix, b: &Fix) -> f64 {
        let dlat = (b.latitude - a.latitude).to_radians();
        let dlon = (b.longitude - a.longitude).to_radians();

        let h = (dlat / 2.0).sin().powi(2)
            + (dlon / 2.0).sin().powi(2)
                * a.latitude.to_radians().cos()
                * b.latitude.to_radians().cos();
        2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
    }

    /// Checked variant of [`GeoHelper::distance_km`].
    pub fn try_distance_km(a: &Fix, b: &Fix) -> Result<f64, GeometryInputError> {
        Self::validate(a)?;
        Self::validate(b)?;
        Ok(Self::distance_km(a, b))
    }

    pub fn validate(fix: &Fix) -> Result<(), GeometryInputError> {
        if !fix.latitude.is_finite() || !fix.longitude.is_finite() {
            return Err(GeometryInputError::NotFinite(*fix));
        }
        if !fix.in_range() {
            return Err(GeometryInputError::OutOfRange(*fix));
        }
        Ok(())
    }
}
