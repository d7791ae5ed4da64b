use serde::{Deserialize, Serialize};
use std::fmt;

pub const LATITUDE_RANGE: std::ops::RangeInclusive<f64> = -90.0..=90.0;
pub const LONGITUDE_RANGE: std::ops::RangeInclusive<f64> = -180.0..=180.0;

/// A single positional fix in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    pub latitude: f64,
    pub longitude: f64,
}

/// Reasons a wire payload could not be turned into a [`Fix`].
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("payload is not valid UTF-8")]
    Utf8,
    #[error("payload {0:?} has no comma separator")]
    MissingSeparator(String),
    #[error("field {field} is not a number: {value:?}")]
    InvalidNumber { field: &'static str, value: String },
    #[error("coordinate out of range: latitude {latitude}, longitude {longitude}")]
    OutOfRange { latitude: f64, longitude: f64 },
}

impl Fix {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn origin() -> Self {
        Self::new(0.0, 0.0)
    }

    /// True when both coordinates are finite and within their geographic bounds.
    pub fn in_range(&self) -> bool {
        LATITUDE_RANGE.contains(&self.latitude) && LONGITUDE_RANGE.contains(&self.longitude)
    }

    /// Wire form: `"<lat>,<lon>"`, six decimal places, no whitespace.
    pub fn encode(&self) -> String {
        format!("{:.6},{:.6}", self.latitude, self.longitude)
    }

    pub fn to_payload(&self) -> Vec<u8> {
        self.encode().into_bytes()
    }

    /// Parses the wire form. Splits on the first comma, so any extra field
    /// ends up in the longitude half and fails to parse.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let (lat, lon) = text
            .split_once(',')
            .ok_or_else(|| DecodeError::MissingSeparator(text.to_string()))?;
        let latitude = parse_field("latitude", lat)?;
        let longitude = parse_field("longitude", lon)?;

        let fix = Self::new(latitude, longitude);
        if !fix.in_range() {
            return Err(DecodeError::OutOfRange {
                latitude,
                longitude,
            });
        }
        Ok(fix)
    }

    pub fn from_payload(payload: &[u8]) -> Result<Self, DecodeError> {
        let text = std::str::from_utf8(payload).map_err(|_| DecodeError::Utf8)?;
        Self::decode(text)
    }
}

fn parse_field(field: &'static str, value: &str) -> Result<f64, DecodeError> {
    value.parse::<f64>().map_err(|_| DecodeError::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

impl fmt::Display for Fix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}
