use crate::features::error::ParseError;
use crate::features::reader::RawRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GpsInfo {
    pub latitude: f64,
    pub longitude: f64,
    /// `None` when the file carries no usable altitude. Zero is a real altitude.
    pub altitude: Option<f64>,
}

/// Reads a coordinate-like value. Numbers and numeric strings are accepted as long
/// as they are finite.
pub fn parse_coordinate(value: &Value) -> Result<f64, ParseError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|v| v.is_finite())
        .ok_or_else(|| ParseError::Coordinate(value.to_string()))
}

/// Extracts latitude, longitude and altitude from a record.
///
/// Returns `None` when either coordinate is missing or unusable. A broken altitude
/// only drops the altitude.
pub fn get_gps_info(raw: &RawRecord) -> Option<GpsInfo> {
    let (Some(latitude), Some(longitude)) = (raw.latitude.as_ref(), raw.longitude.as_ref()) else {
        return None;
    };
    let (latitude, longitude) = match (parse_coordinate(latitude), parse_coordinate(longitude)) {
        (Ok(lat), Ok(lon)) => (lat, lon),
        (Err(e), _) | (_, Err(e)) => {
            debug!("{}: {e}", raw.source);
            return None;
        }
    };

    let altitude = raw
        .altitude
        .as_ref()
        .and_then(|alt| match parse_coordinate(alt) {
            Ok(alt) => Some(alt),
            Err(e) => {
                debug!("{}: ignoring altitude, {e}", raw.source);
                None
            }
        });

    Some(GpsInfo {
        latitude,
        longitude,
        altitude,
    })
}
