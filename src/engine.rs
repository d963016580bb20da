//! The query engine tying codec, shortcut index, polygon store and kernel
//! together.

use crate::coord::{to_fixed, validate_coordinates, Coordinate};
use crate::error::TzGridError;
use crate::geom::{self, CoordLists};
use crate::index::{shortcut_cell, ShortcutIndex, ShortcutPayload};
use crate::io::LoadMode;
use crate::store::PolygonStore;
use geo_types::{MultiPolygon, Polygon};
use rayon::prelude::*;
use std::path::Path;
use tracing::info;

/// Name prefix shared by the ocean zones (`Etc/GMT`, `Etc/GMT+1`, ...).
pub const OCEAN_TIMEZONE_PREFIX: &str = "Etc/GMT";

/// Returns true for the artificial ocean zones that tile the seas in
/// ocean-inclusive datasets.
pub fn is_ocean_timezone(name: &str) -> bool {
    name.starts_with(OCEAN_TIMEZONE_PREFIX)
}

/// Index of the first entry of the uniform tail of `zone_ids`: every entry
/// from this index on shares one zone. 0 means all entries agree.
fn last_zone_change_idx(zone_ids: &[u16]) -> usize {
    for idx in (1..zone_ids.len()).rev() {
        if zone_ids[idx] != zone_ids[idx - 1] {
            return idx;
        }
    }
    0
}

/// Offline timezone lookup engine over one compiled dataset directory.
///
/// Read-only after construction and safe to share across threads. Every
/// query is a pure function of its input and the loaded data.
///
/// # Example
///
/// ```no_run
/// use tzgrid::TimezoneEngine;
///
/// # fn main() -> Result<(), tzgrid::TzGridError> {
/// let engine = TimezoneEngine::open("data")?;
/// if let Some(name) = engine.timezone_at(&(13.358, 52.5061))? {
///     println!("{}", name);
/// }
/// # Ok(())
/// # }
/// ```
pub struct TimezoneEngine {
    store: PolygonStore,
    shortcuts: ShortcutIndex,
}

impl TimezoneEngine {
    /// Opens a dataset directory with memory-mapped files (the default).
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self, TzGridError> {
        Self::open_with(data_dir, LoadMode::Mmap)
    }

    /// Opens a dataset directory, pre-reading every file into memory.
    ///
    /// Trades startup latency and resident set size for the guarantee that
    /// queries never page-fault.
    pub fn open_in_memory(data_dir: impl AsRef<Path>) -> Result<Self, TzGridError> {
        Self::open_with(data_dir, LoadMode::InMemory)
    }

    /// Opens a dataset directory with an explicit load mode.
    pub fn open_with(data_dir: impl AsRef<Path>, mode: LoadMode) -> Result<Self, TzGridError> {
        let data_dir = data_dir.as_ref();
        let store = PolygonStore::load(data_dir, mode)?;
        let shortcuts = ShortcutIndex::load(data_dir, mode)?;
        info!(
            data_dir = %data_dir.display(),
            zones = store.num_zones(),
            polygons = store.len(),
            shortcut_cells = shortcuts.len(),
            mode = ?mode,
            "timezone engine ready"
        );
        Ok(Self { store, shortcuts })
    }

    /// Number of timezones in the dataset.
    pub fn num_zones(&self) -> usize {
        self.store.num_zones()
    }

    /// Number of outer boundary polygons in the dataset.
    pub fn num_polygons(&self) -> usize {
        self.store.len()
    }

    /// All timezone names, indexed by zone id.
    pub fn zone_names(&self) -> &[String] {
        self.store.zone_names()
    }

    /// The underlying polygon store.
    pub fn store(&self) -> &PolygonStore {
        &self.store
    }

    /// The underlying shortcut index.
    pub fn shortcuts(&self) -> &ShortcutIndex {
        &self.shortcuts
    }

    /// Name of the timezone containing the coordinate.
    ///
    /// Candidate polygons are only tested until the remaining candidates
    /// collapse to a single zone; with an ocean-inclusive dataset some zone
    /// therefore always matches. `None` is only possible for datasets
    /// without full coverage.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use tzgrid::TimezoneEngine;
    ///
    /// # fn main() -> Result<(), tzgrid::TzGridError> {
    /// let engine = TimezoneEngine::open("data")?;
    /// let name = engine.timezone_at(&(-74.006, 40.7128))?;
    /// assert_eq!(name, Some("America/New_York"));
    /// # Ok(())
    /// # }
    /// ```
    pub fn timezone_at(&self, coord: &impl Coordinate) -> Result<Option<&str>, TzGridError> {
        let (lon, lat) = validate_coordinates(coord.x(), coord.y())?;
        let Some(payload) = self.shortcuts.lookup(shortcut_cell(lon, lat)?) else {
            return Ok(None);
        };
        let candidates = match payload {
            ShortcutPayload::UniqueZone(zone_id) => {
                return Ok(Some(self.store.zone_name(zone_id)?));
            }
            ShortcutPayload::Candidates(candidates) => candidates,
        };

        let mut zone_ids = Vec::with_capacity(candidates.len());
        for poly_id in candidates.iter() {
            zone_ids.push(self.store.zone_of(poly_id)?);
        }
        let tail_start = last_zone_change_idx(&zone_ids);
        if tail_start == 0 {
            // all candidates belong to one zone
            return Ok(Some(self.store.zone_name(zone_ids[0])?));
        }

        let x = to_fixed(lon);
        let y = to_fixed(lat);
        for (idx, poly_id) in candidates.iter().enumerate().take(tail_start) {
            if self.store.contains(poly_id, x, y)? {
                return Ok(Some(self.store.zone_name(zone_ids[idx])?));
            }
        }
        // every remaining candidate shares the tail zone, no need to test it
        Ok(Some(self.store.zone_name(zone_ids[zone_ids.len() - 1])?))
    }

    /// Like [`timezone_at`](Self::timezone_at), but ocean matches
    /// (`Etc/GMT…`) are reported as `None`.
    pub fn timezone_at_land(&self, coord: &impl Coordinate) -> Result<Option<&str>, TzGridError> {
        Ok(self
            .timezone_at(coord)?
            .filter(|name| !is_ocean_timezone(name)))
    }

    /// Name of the zone if the coordinate's shortcut cell is covered by a
    /// single zone, `None` otherwise.
    ///
    /// Never tests a polygon, making it a cheap, deterministic early exit
    /// for callers that fall back to [`timezone_at`](Self::timezone_at)
    /// only when needed.
    pub fn unique_timezone_at(&self, coord: &impl Coordinate) -> Result<Option<&str>, TzGridError> {
        let (lon, lat) = validate_coordinates(coord.x(), coord.y())?;
        match self.shortcuts.lookup(shortcut_cell(lon, lat)?) {
            Some(ShortcutPayload::UniqueZone(zone_id)) => {
                Ok(Some(self.store.zone_name(zone_id)?))
            }
            _ => Ok(None),
        }
    }

    /// Name of the timezone whose polygon demonstrably contains the
    /// coordinate, testing every candidate.
    ///
    /// With an ocean-inclusive dataset this equals
    /// [`timezone_at`](Self::timezone_at) while doing strictly more work.
    #[deprecated(note = "equivalent to `timezone_at` for datasets with full ocean coverage")]
    pub fn certain_timezone_at(&self, coord: &impl Coordinate) -> Result<Option<&str>, TzGridError> {
        let (lon, lat) = validate_coordinates(coord.x(), coord.y())?;
        let Some(payload) = self.shortcuts.lookup(shortcut_cell(lon, lat)?) else {
            return Ok(None);
        };
        let candidates = match payload {
            ShortcutPayload::UniqueZone(zone_id) => {
                return Ok(Some(self.store.zone_name(zone_id)?));
            }
            ShortcutPayload::Candidates(candidates) => candidates,
        };
        let x = to_fixed(lon);
        let y = to_fixed(lat);
        for poly_id in candidates.iter() {
            if self.store.contains(poly_id, x, y)? {
                return Ok(Some(self.store.zone_name(self.store.zone_of(poly_id)?)?));
            }
        }
        Ok(None)
    }

    /// Shortcut-only best guess: the most common zone of the coordinate's
    /// cell, without any polygon test.
    ///
    /// For unique cells this is exact; for candidate cells it returns the
    /// zone of the first candidate, which the candidate ordering makes the
    /// most frequent zone of the cell.
    pub fn likely_timezone_at(&self, coord: &impl Coordinate) -> Result<Option<&str>, TzGridError> {
        let (lon, lat) = validate_coordinates(coord.x(), coord.y())?;
        match self.shortcuts.lookup(shortcut_cell(lon, lat)?) {
            None => Ok(None),
            Some(ShortcutPayload::UniqueZone(zone_id)) => {
                Ok(Some(self.store.zone_name(zone_id)?))
            }
            Some(ShortcutPayload::Candidates(candidates)) => {
                let zone_id = self.store.zone_of(candidates.get(0))?;
                Ok(Some(self.store.zone_name(zone_id)?))
            }
        }
    }

    fn resolve_zone_name(&self, name: &str) -> Result<u16, TzGridError> {
        self.store
            .zone_id_of_name(name)
            .ok_or_else(|| TzGridError::UnknownZone(name.to_string()))
    }

    fn check_zone_id(&self, zone_id: u16) -> Result<u16, TzGridError> {
        if usize::from(zone_id) < self.store.num_zones() {
            Ok(zone_id)
        } else {
            Err(TzGridError::UnknownZone(format!("zone id {}", zone_id)))
        }
    }

    /// Full geometry of a zone as a `geo_types` multipolygon in degrees.
    ///
    /// Outer rings follow storage order; holes become interior rings of
    /// their outer polygon.
    pub fn zone_geometry(&self, name: &str) -> Result<MultiPolygon<f64>, TzGridError> {
        let zone_id = self.resolve_zone_name(name)?;
        Ok(MultiPolygon::new(self.zone_polygons(zone_id)?))
    }

    /// [`zone_geometry`](Self::zone_geometry) addressed by zone id.
    pub fn zone_geometry_by_id(&self, zone_id: u16) -> Result<MultiPolygon<f64>, TzGridError> {
        let zone_id = self.check_zone_id(zone_id)?;
        Ok(MultiPolygon::new(self.zone_polygons(zone_id)?))
    }

    /// Full geometry of a zone as parallel `(longitudes, latitudes)`
    /// arrays: one `(outer, holes)` pair per stored polygon.
    pub fn zone_coordinate_lists(
        &self,
        name: &str,
    ) -> Result<Vec<(CoordLists, Vec<CoordLists>)>, TzGridError> {
        let zone_id = self.resolve_zone_name(name)?;
        self.zone_lists(zone_id)
    }

    /// [`zone_coordinate_lists`](Self::zone_coordinate_lists) addressed by
    /// zone id.
    pub fn zone_coordinate_lists_by_id(
        &self,
        zone_id: u16,
    ) -> Result<Vec<(CoordLists, Vec<CoordLists>)>, TzGridError> {
        let zone_id = self.check_zone_id(zone_id)?;
        self.zone_lists(zone_id)
    }

    fn zone_polygons(&self, zone_id: u16) -> Result<Vec<Polygon<f64>>, TzGridError> {
        let range = match self.store.polygons_of_zone(zone_id) {
            Some(range) => range,
            None => return Err(TzGridError::UnknownZone(format!("zone id {}", zone_id))),
        };
        range
            .into_par_iter()
            .map(|poly_id| {
                let exterior = geom::ring_line_string(&self.store.polygon(poly_id)?);
                let mut interiors = Vec::new();
                for hole in self.store.holes_of(poly_id)? {
                    interiors.push(geom::ring_line_string(&hole?));
                }
                Ok(Polygon::new(exterior, interiors))
            })
            .collect()
    }

    fn zone_lists(&self, zone_id: u16) -> Result<Vec<(CoordLists, Vec<CoordLists>)>, TzGridError> {
        let range = match self.store.polygons_of_zone(zone_id) {
            Some(range) => range,
            None => return Err(TzGridError::UnknownZone(format!("zone id {}", zone_id))),
        };
        let mut polygons = Vec::with_capacity(range.len());
        for poly_id in range {
            let outer = geom::ring_lists(&self.store.polygon(poly_id)?);
            let mut holes = Vec::new();
            for hole in self.store.holes_of(poly_id)? {
                holes.push(geom::ring_lists(&hole?));
            }
            polygons.push((outer, holes));
        }
        Ok(polygons)
    }
}

#[cfg(test)]
#[allow(deprecated)]
mod tests {
    use super::*;
    use crate::testutil;
    use geo_types::Point;
    use tempfile::tempdir;

    fn fixture_engine(mode: LoadMode) -> (tempfile::TempDir, TimezoneEngine) {
        let dir = tempdir().unwrap();
        testutil::write_standard_dataset(dir.path()).unwrap();
        let engine = TimezoneEngine::open_with(dir.path(), mode).unwrap();
        (dir, engine)
    }

    #[test]
    fn test_last_zone_change_idx() {
        assert_eq!(last_zone_change_idx(&[3]), 0);
        assert_eq!(last_zone_change_idx(&[3, 3, 3]), 0);
        assert_eq!(last_zone_change_idx(&[1, 2]), 1);
        assert_eq!(last_zone_change_idx(&[1, 2, 2, 2]), 1);
        assert_eq!(last_zone_change_idx(&[1, 1, 2, 3, 3]), 3);
    }

    #[test]
    fn test_unique_cell_short_circuit() -> Result<(), TzGridError> {
        let (_dir, engine) = fixture_engine(LoadMode::Mmap);
        // deep inside Johannesburg territory: the cell is unique
        assert_eq!(
            engine.timezone_at(&(28.0473, -26.2041))?,
            Some("Africa/Johannesburg")
        );
        assert_eq!(
            engine.unique_timezone_at(&(28.0473, -26.2041))?,
            Some("Africa/Johannesburg")
        );
        Ok(())
    }

    #[test]
    fn test_enclave_hole_resolves_to_inner_zone() -> Result<(), TzGridError> {
        let (_dir, engine) = fixture_engine(LoadMode::Mmap);
        // inside the enclave carved out of the surrounding zone
        assert_eq!(
            engine.timezone_at(&(27.8546, -29.3151))?,
            Some("Africa/Maseru")
        );
        // same cell, but outside the enclave
        assert_eq!(
            engine.timezone_at(&(26.5, -29.3))?,
            Some("Africa/Johannesburg")
        );
        // the cell holds two zones, so the unique query refuses
        assert_eq!(engine.unique_timezone_at(&(27.8546, -29.3151))?, None);
        Ok(())
    }

    #[test]
    fn test_single_zone_candidates_skip_polygon_tests() -> Result<(), TzGridError> {
        let (_dir, engine) = fixture_engine(LoadMode::Mmap);
        // both candidates of this cell belong to one zone; the engine
        // answers without a single containment test
        assert_eq!(engine.timezone_at(&(13.358, 52.5061))?, Some("Europe/Berlin"));
        assert_eq!(engine.unique_timezone_at(&(13.358, 52.5061))?, None);
        Ok(())
    }

    #[test]
    fn test_ocean_point() -> Result<(), TzGridError> {
        let (_dir, engine) = fixture_engine(LoadMode::Mmap);
        assert_eq!(engine.timezone_at(&(0.0, 0.0))?, Some("Etc/GMT"));
        assert_eq!(engine.timezone_at_land(&(0.0, 0.0))?, None);
        assert_eq!(
            engine.timezone_at_land(&(28.0473, -26.2041))?,
            Some("Africa/Johannesburg")
        );
        Ok(())
    }

    #[test]
    fn test_antimeridian_fold() -> Result<(), TzGridError> {
        let (_dir, engine) = fixture_engine(LoadMode::Mmap);
        let west = engine.timezone_at(&(-180.0, 10.0))?;
        let east = engine.timezone_at(&(180.0, 10.0))?;
        assert_eq!(west, Some("Etc/GMT"));
        assert_eq!(west, east);
        Ok(())
    }

    #[test]
    fn test_uncovered_cell_returns_none() -> Result<(), TzGridError> {
        let (_dir, engine) = fixture_engine(LoadMode::Mmap);
        assert_eq!(engine.timezone_at(&(100.0, 45.0))?, None);
        assert_eq!(engine.timezone_at_land(&(100.0, 45.0))?, None);
        assert_eq!(engine.unique_timezone_at(&(100.0, 45.0))?, None);
        assert_eq!(engine.likely_timezone_at(&(100.0, 45.0))?, None);
        Ok(())
    }

    #[test]
    fn test_poles_are_valid_queries() -> Result<(), TzGridError> {
        let (_dir, engine) = fixture_engine(LoadMode::Mmap);
        for lon in [-180.0, -74.006, 0.0, 137.5, 180.0] {
            // no polar cells are covered by the fixture; the point is that
            // the poles are valid inputs at every longitude
            assert_eq!(engine.timezone_at(&(lon, 90.0))?, None);
            assert_eq!(engine.timezone_at(&(lon, -90.0))?, None);
        }
        Ok(())
    }

    #[test]
    fn test_out_of_bounds_coordinates() {
        let (_dir, engine) = fixture_engine(LoadMode::Mmap);
        assert_eq!(
            engine.timezone_at(&(181.0, 0.0)),
            Err(TzGridError::LongitudeOutOfBounds(181.0))
        );
        assert_eq!(
            engine.timezone_at(&(0.0, 90.01)),
            Err(TzGridError::LatitudeOutOfBounds(90.01))
        );
    }

    #[test]
    fn test_queries_are_idempotent() -> Result<(), TzGridError> {
        let (_dir, engine) = fixture_engine(LoadMode::Mmap);
        let first = engine.timezone_at(&(27.8546, -29.3151))?.map(str::to_owned);
        for _ in 0..3 {
            assert_eq!(
                engine.timezone_at(&(27.8546, -29.3151))?.map(str::to_owned),
                first
            );
        }
        Ok(())
    }

    #[test]
    fn test_certain_matches_timezone_at_on_covered_points() -> Result<(), TzGridError> {
        let (_dir, engine) = fixture_engine(LoadMode::Mmap);
        for probe in [
            (28.0473, -26.2041),
            (27.8546, -29.3151),
            (26.5, -29.3),
            (13.358, 52.5061),
            (0.0, 0.0),
        ] {
            assert_eq!(
                engine.certain_timezone_at(&probe)?,
                engine.timezone_at(&probe)?,
                "probe {:?}",
                probe
            );
        }
        Ok(())
    }

    #[test]
    fn test_unique_result_implies_timezone_at_result() -> Result<(), TzGridError> {
        let (_dir, engine) = fixture_engine(LoadMode::Mmap);
        for probe in [(28.0473, -26.2041), (0.0, 0.0), (-180.0, 10.0)] {
            if let Some(unique) = engine.unique_timezone_at(&probe)? {
                assert_eq!(engine.timezone_at(&probe)?, Some(unique));
            }
        }
        Ok(())
    }

    #[test]
    fn test_likely_timezone_at_never_tests_polygons() -> Result<(), TzGridError> {
        let (_dir, engine) = fixture_engine(LoadMode::Mmap);
        // unique cell: exact
        assert_eq!(
            engine.likely_timezone_at(&(28.0473, -26.2041))?,
            Some("Africa/Johannesburg")
        );
        // candidate cell: zone of the first (most frequent) candidate, even
        // for a point that is really inside the enclave
        assert_eq!(
            engine.likely_timezone_at(&(27.8546, -29.3151))?,
            Some("Africa/Johannesburg")
        );
        Ok(())
    }

    #[test]
    fn test_point_coordinates_are_accepted() -> Result<(), TzGridError> {
        let (_dir, engine) = fixture_engine(LoadMode::Mmap);
        assert_eq!(
            engine.timezone_at(&Point::new(13.358, 52.5061))?,
            Some("Europe/Berlin")
        );
        Ok(())
    }

    #[test]
    fn test_in_memory_mode_gives_identical_answers() -> Result<(), TzGridError> {
        let (_dir, mapped) = fixture_engine(LoadMode::Mmap);
        let (_dir2, owned) = fixture_engine(LoadMode::InMemory);
        for probe in [
            (28.0473, -26.2041),
            (27.8546, -29.3151),
            (13.358, 52.5061),
            (0.0, 0.0),
            (180.0, 10.0),
            (100.0, 45.0),
        ] {
            assert_eq!(mapped.timezone_at(&probe)?, owned.timezone_at(&probe)?);
        }
        Ok(())
    }

    #[test]
    fn test_zone_geometry_with_hole() -> Result<(), TzGridError> {
        let (_dir, engine) = fixture_engine(LoadMode::Mmap);
        let geometry = engine.zone_geometry("Africa/Johannesburg")?;
        assert_eq!(geometry.0.len(), 1);
        let polygon = &geometry.0[0];
        // rings are closed by geo_types, so 4 stored vertices become 5
        assert_eq!(polygon.exterior().0.len(), 5);
        assert_eq!(polygon.interiors().len(), 1);
        assert_eq!(polygon.interiors()[0].0.len(), 5);

        let berlin = engine.zone_geometry("Europe/Berlin")?;
        assert_eq!(berlin.0.len(), 2);
        assert!(berlin.0.iter().all(|p| p.interiors().is_empty()));
        Ok(())
    }

    #[test]
    fn test_zone_geometry_by_id_matches_by_name() -> Result<(), TzGridError> {
        let (_dir, engine) = fixture_engine(LoadMode::Mmap);
        let by_name = engine.zone_geometry("Europe/Berlin")?;
        let id = engine
            .zone_names()
            .iter()
            .position(|n| n == "Europe/Berlin")
            .unwrap() as u16;
        let by_id = engine.zone_geometry_by_id(id)?;
        assert_eq!(by_name, by_id);
        Ok(())
    }

    #[test]
    fn test_zone_coordinate_lists() -> Result<(), TzGridError> {
        let (_dir, engine) = fixture_engine(LoadMode::Mmap);
        let polygons = engine.zone_coordinate_lists("Africa/Maseru")?;
        assert_eq!(polygons.len(), 1);
        let ((lons, lats), holes) = &polygons[0];
        assert_eq!(lons.len(), 4);
        assert_eq!(lats.len(), 4);
        assert!(holes.is_empty());
        assert!(lons.iter().all(|&lon| (27.0..=29.0).contains(&lon)));
        Ok(())
    }

    #[test]
    fn test_unknown_zone_errors() {
        let (_dir, engine) = fixture_engine(LoadMode::Mmap);
        assert_eq!(
            engine.zone_geometry("Mars/Olympus"),
            Err(TzGridError::UnknownZone("Mars/Olympus".to_string()))
        );
        assert!(matches!(
            engine.zone_geometry_by_id(99),
            Err(TzGridError::UnknownZone(_))
        ));
    }

    #[test]
    fn test_dangling_candidate_is_corrupt_data() {
        let (_dir, engine) = fixture_engine(LoadMode::Mmap);
        // the fixture wires one cell to a polygon id past the end of the store
        let result = engine.timezone_at(&testutil::DANGLING_PROBE);
        assert!(matches!(result, Err(TzGridError::CorruptData(_))));
    }

    #[test]
    fn test_engine_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TimezoneEngine>();
    }
}
