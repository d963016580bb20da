use crate::error::TzGridError;
use geo_types::Point;

/// Scale factor mapping degrees to fixed-point integers (10^7).
///
/// With this factor the full longitude range (±180°) stays inside the `i32`
/// domain while keeping the worst-case spatial error around 1 cm at the
/// equator.
pub const COORD_TO_INT_FACTOR: f64 = 10_000_000.0;

/// Inverse of [`COORD_TO_INT_FACTOR`].
pub const INT_TO_COORD_FACTOR: f64 = 1.0 / COORD_TO_INT_FACTOR;

/// Maximum valid longitude in degrees.
pub const MAX_LON: f64 = 180.0;

/// Maximum valid latitude in degrees.
pub const MAX_LAT: f64 = 90.0;

/// Converts a degree value to its fixed-point integer representation.
///
/// The result is `round(degrees * 10^7)`. Callers are expected to validate
/// the range first (see [`validate_coordinates`]); values within ±180° are
/// guaranteed to fit.
///
/// # Example
/// ```
/// use tzgrid::{to_fixed, to_degrees};
///
/// let fixed = to_fixed(13.358);
/// assert_eq!(fixed, 133_580_000);
/// assert!((to_degrees(fixed) - 13.358).abs() < 0.5e-7);
/// ```
pub fn to_fixed(degrees: f64) -> i32 {
    (degrees * COORD_TO_INT_FACTOR).round() as i32
}

/// Converts a fixed-point integer back to degrees.
pub fn to_degrees(fixed: i32) -> f64 {
    f64::from(fixed) * INT_TO_COORD_FACTOR
}

/// Returns true if the longitude is within [-180, 180] degrees.
pub fn is_valid_lon(lon: f64) -> bool {
    (-MAX_LON..=MAX_LON).contains(&lon)
}

/// Returns true if the latitude is within [-90, 90] degrees.
pub fn is_valid_lat(lat: f64) -> bool {
    (-MAX_LAT..=MAX_LAT).contains(&lat)
}

/// Validates a query coordinate and normalizes the antimeridian.
///
/// `+180°` and `-180°` describe the same meridian; the dataset is cropped at
/// `-180`, so a `+180` input is folded to `-180` before anything else looks
/// at the longitude. Out-of-range (or non-finite) values are rejected with
/// the offending value in the error.
pub fn validate_coordinates(lon: f64, lat: f64) -> Result<(f64, f64), TzGridError> {
    if !is_valid_lon(lon) {
        return Err(TzGridError::LongitudeOutOfBounds(lon));
    }
    if !is_valid_lat(lat) {
        return Err(TzGridError::LatitudeOutOfBounds(lat));
    }
    let lon = if lon == MAX_LON { -MAX_LON } else { lon };
    Ok((lon, lat))
}

/// Trait for types that can provide a lon/lat coordinate.
///
/// Implemented for `(f64, f64)` tuples and `geo_types::Point<f64>`.
/// This allows query functions to accept either type.
pub trait Coordinate {
    /// Returns the longitude in degrees.
    fn x(&self) -> f64;
    /// Returns the latitude in degrees.
    fn y(&self) -> f64;
}

impl Coordinate for (f64, f64) {
    fn x(&self) -> f64 {
        self.0
    }
    fn y(&self) -> f64 {
        self.1
    }
}

impl Coordinate for Point<f64> {
    fn x(&self) -> f64 {
        Point::x(*self)
    }
    fn y(&self) -> f64 {
        Point::y(*self)
    }
}
