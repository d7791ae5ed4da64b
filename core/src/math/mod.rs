pub mod geo;
pub mod path;

pub use geo::{GeoHelper, GeometryInputError, EARTH_RADIUS_KM};
pub use path::{PathHelper, PathSummary};
