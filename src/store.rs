//! Read-only polygon store backing the query engine.
//!
//! Holds the outer boundary and hole collections (zero-copy views into the
//! FlatBuffers files), the per-polygon bounding boxes and zone ids, the
//! zone-name table, the zone-to-polygon-range prefix sums, and the dense
//! hole registry. Everything is immutable after [`PolygonStore::load`].

use crate::error::TzGridError;
use crate::io::flatbuf::PolygonCollection;
use crate::io::npy::{self, UintVector};
use crate::io::{self, DataBuffer, LoadMode};
use crate::kernel;
use flatbuffers::Vector;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::ops::Range;
use std::path::Path;
use tracing::debug;

/// Zero-copy columnar view of one polygon ring.
#[derive(Clone, Copy)]
pub struct PolygonView<'a> {
    x: Vector<'a, i32>,
    y: Vector<'a, i32>,
}

impl<'a> PolygonView<'a> {
    pub(crate) fn new(x: Vector<'a, i32>, y: Vector<'a, i32>) -> Self {
        Self { x, y }
    }

    /// Number of vertices (the closing edge is implicit).
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Vertex at `idx` in fixed-point coordinates.
    ///
    /// Panics if `idx >= len()`; views are only handed out with validated
    /// column lengths.
    pub fn vertex(&self, idx: usize) -> (i32, i32) {
        (self.x.get(idx), self.y.get(idx))
    }
}

/// `[first hole id, hole count]` pair from `hole_registry.json`.
#[derive(Debug, Deserialize)]
struct HoleRegistryEntry(u32, u32);

/// The immutable polygon dataset of one engine instance.
pub struct PolygonStore {
    names: Vec<String>,
    zone_ids: UintVector,
    zone_positions: Vec<u32>,
    xmin: Vec<i32>,
    xmax: Vec<i32>,
    ymin: Vec<i32>,
    ymax: Vec<i32>,
    /// `(first hole id, hole count)` per outer polygon; `count` is 0 for the
    /// vast majority of polygons.
    hole_registry: Vec<(u32, u32)>,
    boundaries: DataBuffer,
    holes: DataBuffer,
}

fn corrupt(msg: impl Into<String>) -> TzGridError {
    TzGridError::CorruptData(msg.into())
}

/// Verifies a polygon file once at load and returns its polygon count.
fn verified_polygon_count(buffer: &DataBuffer, path: &Path) -> Result<usize, TzGridError> {
    let collection =
        flatbuffers::root::<PolygonCollection>(buffer).map_err(|e| TzGridError::Load {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    Ok(collection.polygons().map_or(0, |polygons| polygons.len()))
}

fn read_zone_names(path: &Path) -> Result<Vec<String>, TzGridError> {
    let text = fs::read_to_string(path).map_err(|e| TzGridError::Load {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let names: Vec<String> = text.lines().map(str::to_owned).collect();
    if names.is_empty() || names.iter().any(String::is_empty) {
        return Err(TzGridError::Load {
            path: path.to_path_buf(),
            reason: "zone name table is empty or contains blank lines".to_string(),
        });
    }
    Ok(names)
}

fn read_hole_registry(
    path: &Path,
    num_polygons: usize,
    num_holes: usize,
) -> Result<Vec<(u32, u32)>, TzGridError> {
    let text = fs::read_to_string(path).map_err(|e| TzGridError::Load {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let raw: HashMap<String, HoleRegistryEntry> =
        serde_json::from_str(&text).map_err(|e| TzGridError::Load {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    let mut registry = vec![(0u32, 0u32); num_polygons];
    for (key, HoleRegistryEntry(first, count)) in raw {
        let poly_id: usize = key
            .parse()
            .map_err(|_| corrupt(format!("hole registry key '{}' is not a polygon id", key)))?;
        if poly_id >= num_polygons {
            return Err(corrupt(format!(
                "hole registry references outer polygon {} of {}",
                poly_id, num_polygons
            )));
        }
        let end = first
            .checked_add(count)
            .ok_or_else(|| corrupt("hole registry range overflows".to_string()))?;
        if end as usize > num_holes {
            return Err(corrupt(format!(
                "hole registry range {}..{} exceeds {} stored holes",
                first, end, num_holes
            )));
        }
        registry[poly_id] = (first, count);
    }
    Ok(registry)
}

impl PolygonStore {
    pub(crate) fn load(data_dir: &Path, mode: LoadMode) -> Result<Self, TzGridError> {
        let names = read_zone_names(&data_dir.join(io::TIMEZONE_NAMES_FILE))?;
        let zone_ids = npy::read_uint_vector(&data_dir.join(io::ZONE_IDS_FILE))?;
        let zone_positions = npy::read_u32(&data_dir.join(io::ZONE_POSITIONS_FILE))?;
        let xmin = npy::read_i32(&data_dir.join(io::XMIN_FILE))?;
        let xmax = npy::read_i32(&data_dir.join(io::XMAX_FILE))?;
        let ymin = npy::read_i32(&data_dir.join(io::YMIN_FILE))?;
        let ymax = npy::read_i32(&data_dir.join(io::YMAX_FILE))?;

        let boundaries_path = data_dir.join(io::BOUNDARIES_DIR).join(io::COORDINATES_FILE);
        let boundaries = io::load_buffer(&boundaries_path, mode)?;
        let num_polygons = verified_polygon_count(&boundaries, &boundaries_path)?;

        let holes_path = data_dir.join(io::HOLES_DIR).join(io::COORDINATES_FILE);
        let holes = io::load_buffer(&holes_path, mode)?;
        let num_holes = verified_polygon_count(&holes, &holes_path)?;

        if zone_ids.len() != num_polygons
            || xmin.len() != num_polygons
            || xmax.len() != num_polygons
            || ymin.len() != num_polygons
            || ymax.len() != num_polygons
        {
            return Err(corrupt(format!(
                "per-polygon arrays disagree on the polygon count ({} boundary polygons)",
                num_polygons
            )));
        }
        if zone_positions.len() != names.len() + 1 {
            return Err(corrupt(format!(
                "zone_positions has {} entries for {} zones",
                zone_positions.len(),
                names.len()
            )));
        }
        if zone_positions.first() != Some(&0)
            || zone_positions.last().copied() != Some(num_polygons as u32)
            || zone_positions.windows(2).any(|pair| pair[0] > pair[1])
        {
            return Err(corrupt("zone_positions is not a prefix sum over the polygons".to_string()));
        }
        for poly_id in 0..num_polygons {
            // zone_ids length was checked above
            let zone_id = zone_ids.get(poly_id).unwrap_or(u16::MAX);
            if usize::from(zone_id) >= names.len() {
                return Err(corrupt(format!(
                    "polygon {} references zone {} of {}",
                    poly_id,
                    zone_id,
                    names.len()
                )));
            }
        }

        let hole_registry = read_hole_registry(
            &data_dir.join(io::HOLE_REGISTRY_FILE),
            num_polygons,
            num_holes,
        )?;

        debug!(
            polygons = num_polygons,
            holes = num_holes,
            zones = names.len(),
            "loaded polygon store"
        );
        Ok(Self {
            names,
            zone_ids,
            zone_positions,
            xmin,
            xmax,
            ymin,
            ymax,
            hole_registry,
            boundaries,
            holes,
        })
    }

    /// Number of outer polygons.
    pub fn len(&self) -> usize {
        self.xmin.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xmin.is_empty()
    }

    /// Number of timezones in the name table.
    pub fn num_zones(&self) -> usize {
        self.names.len()
    }

    /// All zone names, indexed by zone id.
    pub fn zone_names(&self) -> &[String] {
        &self.names
    }

    /// Name of the zone with the given id.
    pub fn zone_name(&self, zone_id: u16) -> Result<&str, TzGridError> {
        self.names
            .get(usize::from(zone_id))
            .map(String::as_str)
            .ok_or_else(|| corrupt(format!("zone id {} out of range ({} zones)", zone_id, self.names.len())))
    }

    /// Id of the zone with the given name.
    pub fn zone_id_of_name(&self, name: &str) -> Option<u16> {
        self.names.iter().position(|n| n == name).map(|idx| idx as u16)
    }

    /// Zone id of an outer polygon.
    pub fn zone_of(&self, poly_id: u32) -> Result<u16, TzGridError> {
        self.zone_ids.get(poly_id as usize).ok_or_else(|| {
            corrupt(format!("polygon id {} out of range ({} stored)", poly_id, self.len()))
        })
    }

    /// Bounding box `(xmin, ymin, xmax, ymax)` of an outer polygon.
    pub fn bbox(&self, poly_id: u32) -> Result<(i32, i32, i32, i32), TzGridError> {
        let idx = poly_id as usize;
        match (
            self.xmin.get(idx),
            self.ymin.get(idx),
            self.xmax.get(idx),
            self.ymax.get(idx),
        ) {
            (Some(&xmin), Some(&ymin), Some(&xmax), Some(&ymax)) => Ok((xmin, ymin, xmax, ymax)),
            _ => Err(corrupt(format!(
                "polygon id {} out of range ({} stored)",
                poly_id,
                self.len()
            ))),
        }
    }

    /// Ids of the polygons belonging to one zone, in stored order
    /// (largest polygon first).
    pub fn polygons_of_zone(&self, zone_id: u16) -> Option<Range<u32>> {
        let idx = usize::from(zone_id);
        if idx + 1 >= self.zone_positions.len() {
            return None;
        }
        Some(self.zone_positions[idx]..self.zone_positions[idx + 1])
    }

    fn view_at<'a>(
        buffer: &'a DataBuffer,
        idx: u32,
        len: usize,
        what: &str,
    ) -> Result<PolygonView<'a>, TzGridError> {
        if idx as usize >= len {
            return Err(corrupt(format!(
                "{} polygon id {} out of range ({} stored)",
                what, idx, len
            )));
        }
        // Safety: the buffer was verified during load.
        let collection = unsafe { flatbuffers::root_unchecked::<PolygonCollection>(buffer) };
        let polygons = collection
            .polygons()
            .ok_or_else(|| corrupt(format!("{} collection has no polygon vector", what)))?;
        let polygon = polygons.get(idx as usize);
        let x = polygon
            .x()
            .ok_or_else(|| corrupt(format!("{} polygon {} has no x column", what, idx)))?;
        let y = polygon
            .y()
            .ok_or_else(|| corrupt(format!("{} polygon {} has no y column", what, idx)))?;
        if x.len() != y.len() {
            return Err(corrupt(format!(
                "{} polygon {} has mismatched columns ({} x, {} y)",
                what,
                idx,
                x.len(),
                y.len()
            )));
        }
        Ok(PolygonView::new(x, y))
    }

    /// Zero-copy view of an outer polygon.
    pub fn polygon(&self, poly_id: u32) -> Result<PolygonView<'_>, TzGridError> {
        Self::view_at(&self.boundaries, poly_id, self.len(), "boundary")
    }

    /// Number of hole polygons.
    pub fn num_holes(&self) -> usize {
        // the hole collection was verified during load
        let collection = unsafe { flatbuffers::root_unchecked::<PolygonCollection>(&self.holes) };
        collection.polygons().map_or(0, |polygons| polygons.len())
    }

    /// Zero-copy view of a hole polygon.
    pub fn hole(&self, hole_id: u32) -> Result<PolygonView<'_>, TzGridError> {
        Self::view_at(&self.holes, hole_id, self.num_holes(), "hole")
    }

    /// Views of the holes carved out of an outer polygon (usually none).
    pub fn holes_of<'a>(
        &'a self,
        poly_id: u32,
    ) -> Result<impl Iterator<Item = Result<PolygonView<'a>, TzGridError>> + 'a, TzGridError> {
        let (first, count) = *self.hole_registry.get(poly_id as usize).ok_or_else(|| {
            corrupt(format!("polygon id {} out of range ({} stored)", poly_id, self.len()))
        })?;
        Ok((first..first + count).map(move |hole_id| self.hole(hole_id)))
    }

    /// Full containment test for one outer polygon: bounding-box rejection,
    /// then the ray-cast kernel, then the polygon's holes (a point inside a
    /// hole belongs to whichever zone fills the hole, so it does not count).
    pub fn contains(&self, poly_id: u32, x: i32, y: i32) -> Result<bool, TzGridError> {
        let (xmin, ymin, xmax, ymax) = self.bbox(poly_id)?;
        if x < xmin || x > xmax || y < ymin || y > ymax {
            return Ok(false);
        }
        if !kernel::inside_polygon(x, y, &self.polygon(poly_id)?) {
            return Ok(false);
        }
        for hole in self.holes_of(poly_id)? {
            if kernel::inside_polygon(x, y, &hole?) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
