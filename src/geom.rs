//! Geodetic helpers for positions on the airport surface.

use cgmath::{Angle, Deg, Rad};

/// Mean earth radius in m.
const EARTH_RADIUS: f64 = 6_371_000.0;

/// A geodetic position.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Geod {
    /// Latitude in degrees, positive north.
    pub lat: f64,
    /// Longitude in degrees, positive east.
    pub lon: f64,
    /// Elevation in m.
    pub elevation: f64,
}

impl Geod {
    /// Creates a position from latitude, longitude and elevation.
    pub const fn new(lat: f64, lon: f64, elevation: f64) -> Self {
        Self { lat, lon, elevation }
    }

    /// Creates a position at zero elevation.
    pub const fn from_deg(lat: f64, lon: f64) -> Self {
        Self::new(lat, lon, 0.0)
    }
}

/// Great-circle distance between two positions in m.
pub fn distance_m(a: &Geod, b: &Geod) -> f64 {
    let (lat1, lat2) = (Deg(a.lat), Deg(b.lat));
    let dlat = Deg(b.lat - a.lat);
    let dlon = Deg(b.lon - a.lon);
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS * h.sqrt().asin()
}

/// Initial great-circle course from `a` to `b` in degrees, in `[0, 360)`.
pub fn course_deg(a: &Geod, b: &Geod) -> f64 {
    let (lat1, lat2) = (Deg(a.lat), Deg(b.lat));
    let dlon = Deg(b.lon - a.lon);
    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();
    Deg::from(Rad(y.atan2(x))).normalize().0
}

/// Smallest absolute difference between two courses in degrees, in `[0, 180]`.
pub fn course_offset_deg(a: f64, b: f64) -> f64 {
    let diff = (a - b).abs() % 360.0;
    if diff > 180.0 {
        360.0 - diff
    } else {
        diff
    }
}
