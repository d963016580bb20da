//! # tzgrid
//!
//! Offline IANA timezone lookup for WGS84 coordinates.
//!
//! tzgrid answers "which timezone contains this `(lon, lat)` point?"
//! without network or database access, from a compiled dataset of timezone
//! boundary polygons indexed by an [H3](https://h3geo.org/) hexagon grid.
//! Coordinates are stored as fixed-point integers (degrees scaled by 10⁷)
//! and every geometric test runs in integer arithmetic.
//!
//! ## Querying
//!
//! ```no_run
//! use tzgrid::TimezoneEngine;
//!
//! # fn main() -> Result<(), tzgrid::TzGridError> {
//! let engine = TimezoneEngine::open("data")?;
//!
//! // coordinates are (longitude, latitude)
//! assert_eq!(engine.timezone_at(&(13.358, 52.5061))?, Some("Europe/Berlin"));
//!
//! // mid-ocean points resolve to the artificial Etc/GMT zones...
//! assert_eq!(engine.timezone_at(&(0.0, 0.0))?, Some("Etc/GMT"));
//! // ...which the land-only query filters out
//! assert_eq!(engine.timezone_at_land(&(0.0, 0.0))?, None);
//! # Ok(())
//! # }
//! ```
//!
//! `geo_types::Point<f64>` works anywhere a coordinate tuple does:
//!
//! ```no_run
//! use tzgrid::{geo_types::Point, TimezoneEngine};
//!
//! # fn main() -> Result<(), tzgrid::TzGridError> {
//! let engine = TimezoneEngine::open("data")?;
//! let tokyo = Point::new(139.6917, 35.6895);
//! assert_eq!(engine.timezone_at(&tokyo)?, Some("Asia/Tokyo"));
//! # Ok(())
//! # }
//! ```
//!
//! ## How a query runs
//!
//! 1. The coordinate is validated (`+180°` folds to `-180°`) and mapped to
//!    its H3 cell at resolution 3.
//! 2. The cell's shortcut entry either names the zone directly (~74% of
//!    cells) or lists candidate polygons ordered by decreasing zone
//!    frequency.
//! 3. Candidates are bbox-rejected and ray-cast tested one by one; the
//!    walk stops as soon as the remaining candidates all belong to one
//!    zone. A point inside a hole of a polygon falls through to the zone
//!    filling the hole.
//!
//! ## Loading modes
//!
//! [`TimezoneEngine::open`] memory-maps the dataset (small resident set,
//! possible page faults on first touch); [`TimezoneEngine::open_in_memory`]
//! pre-reads everything into owned buffers. The query path is identical.
//!
//! An engine is read-only after construction and can be shared freely
//! across threads.

mod coord;
mod engine;
mod error;
mod geom;
mod index;
pub mod io;
mod kernel;
mod store;
#[cfg(test)]
mod testutil;

pub use coord::{
    is_valid_lat, is_valid_lon, to_degrees, to_fixed, validate_coordinates, Coordinate,
    COORD_TO_INT_FACTOR, INT_TO_COORD_FACTOR, MAX_LAT, MAX_LON,
};
pub use engine::{is_ocean_timezone, TimezoneEngine, OCEAN_TIMEZONE_PREFIX};
pub use error::TzGridError;
pub use geom::CoordLists;
pub use index::{CandidateList, ShortcutIndex, ShortcutPayload, SHORTCUT_H3_RESOLUTION};
pub use io::LoadMode;
pub use store::{PolygonStore, PolygonView};

pub use geo_types;
pub use h3o;
