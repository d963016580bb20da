//! Conversion of stored fixed-point rings into degree-space geometries.

use crate::coord::to_degrees;
use crate::store::PolygonView;
use geo_types::{Coord, LineString};

/// Parallel coordinate arrays of one ring: `(longitudes, latitudes)`.
pub type CoordLists = (Vec<f64>, Vec<f64>);

/// Converts a stored ring into a `geo_types` line string in degrees.
///
/// The stored rings leave the closing edge implicit; `geo_types::Polygon`
/// closes its rings on construction, so no vertex is repeated here either.
pub(crate) fn ring_line_string(ring: &PolygonView<'_>) -> LineString<f64> {
    let coords: Vec<Coord<f64>> = (0..ring.len())
        .map(|idx| {
            let (x, y) = ring.vertex(idx);
            Coord {
                x: to_degrees(x),
                y: to_degrees(y),
            }
        })
        .collect();
    LineString::from(coords)
}

/// Converts a stored ring into parallel `(longitudes, latitudes)` arrays.
pub(crate) fn ring_lists(ring: &PolygonView<'_>) -> CoordLists {
    let mut lons = Vec::with_capacity(ring.len());
    let mut lats = Vec::with_capacity(ring.len());
    for idx in 0..ring.len() {
        let (x, y) = ring.vertex(idx);
        lons.push(to_degrees(x));
        lats.push(to_degrees(y));
    }
    (lons, lats)
}
