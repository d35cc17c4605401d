//! Coordinate decoding and great-circle distance

use serde::{Deserialize, Serialize};

/// Mean Earth radius used for distances, kilometres
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Decode a `[d[d]]dmm.mmmmH` coordinate to signed degrees
///
/// The two digits before the decimal point and everything after it are
/// minutes; the leading digits are whole degrees, so the same form works for
/// latitude and longitude. `S` and `W` hemispheres are negative.
pub fn parse_ddmm(dm: &str) -> Option<f64> {
    let hemisphere = dm.chars().last()?;
    let sign = match hemisphere {
        'N' | 'E' => 1.0,
        'S' | 'W' => -1.0,
        _ => return None,
    };

    let body = &dm[..dm.len() - hemisphere.len_utf8()];
    if !body.is_ascii() {
        return None;
    }
    let point = body.find('.').unwrap_or(body.len());
    if point < 2 {
        return None;
    }

    let (degrees, minutes) = body.split_at(point - 2);
    let degrees: f64 = if degrees.is_empty() {
        0.0
    } else {
        degrees.parse().ok()?
    };
    let minutes: f64 = minutes.parse().ok()?;

    Some(sign * (degrees + minutes / 60.0))
}

/// Haversine distance between two `(latitude, longitude)` points, metres
pub fn haversine_distance(origin: (f64, f64), destination: (f64, f64)) -> f64 {
    let (lat1, lon1) = origin;
    let (lat2, lon2) = destination;

    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c * 1000.0
}

/// Latitude/longitude extent of a track
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Southernmost latitude
    pub min_lat: f64,
    /// Northernmost latitude
    pub max_lat: f64,
    /// Westernmost longitude
    pub min_lon: f64,
    /// Easternmost longitude
    pub max_lon: f64,
}

impl Default for BoundingBox {
    /// An inverted box that the first point collapses onto itself
    fn default() -> Self {
        Self {
            min_lat: 90.0,
            max_lat: -90.0,
            min_lon: 180.0,
            max_lon: -180.0,
        }
    }
}

impl BoundingBox {
    /// Grow the box to include a point
    pub fn extend(&mut self, lat: f64, lon: f64) {
        self.min_lat = self.min_lat.min(lat);
        self.max_lat = self.max_lat.max(lat);
        self.min_lon = self.min_lon.min(lon);
        self.max_lon = self.max_lon.max(lon);
    }

    /// Whether no point has been added
    pub fn is_empty(&self) -> bool {
        self.min_lat > self.max_lat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ddmm_hemispheres() {
        assert_eq!(parse_ddmm("4807.5000N"), Some(48.125));
        assert_eq!(parse_ddmm("4807.5000S"), Some(-48.125));
        assert_eq!(parse_ddmm("01130.0000E"), Some(11.5));
        assert_eq!(parse_ddmm("12130.0000W"), Some(-121.5));
        // degrees below ten, and no degrees at all
        assert_eq!(parse_ddmm("930.0000E"), Some(9.5));
        assert_eq!(parse_ddmm("30.0000N"), Some(0.5));
    }

    #[test]
    fn test_ddmm_rejects_garbage() {
        assert_eq!(parse_ddmm(""), None);
        assert_eq!(parse_ddmm("4807.5000X"), None);
        assert_eq!(parse_ddmm("7.5N"), None);
        assert_eq!(parse_ddmm("ab07.5N"), None);
        assert_eq!(parse_ddmm("é0.5N"), None);
        assert_eq!(parse_ddmm("12é0.5000W"), None);
    }

    #[test]
    fn test_identical_points_zero_distance() {
        assert_eq!(haversine_distance((37.5, -122.0), (37.5, -122.0)), 0.0);
    }

    #[test]
    fn test_one_degree_of_latitude() {
        // One degree along a meridian is about 111.19 km
        let d = haversine_distance((0.0, 0.0), (1.0, 0.0));
        assert!((d - 111_194.9).abs() < 1.0, "got {}", d);
    }

    #[test]
    fn test_bounding_box() {
        let mut bounds = BoundingBox::default();
        assert!(bounds.is_empty());
        bounds.extend(37.5, -122.0);
        bounds.extend(37.4, -121.9);
        assert!(!bounds.is_empty());
        assert_eq!(bounds.min_lat, 37.4);
        assert_eq!(bounds.max_lon, -121.9);
    }
}
