//! Hybrid H3 shortcut index.
//!
//! One entry per H3 cell at resolution 3 (~41k cells covering the globe).
//! A cell whose intersecting polygons all belong to one zone stores that
//! zone id directly; every other cell stores its candidate polygon ids,
//! ordered by decreasing zone frequency so the engine can stop early once
//! the remaining candidates collapse to a single zone.

use crate::coord::{is_valid_lat, is_valid_lon};
use crate::error::TzGridError;
use crate::io::flatbuf::{ShortcutCollection, ShortcutEntry};
use crate::io::{self, DataBuffer, LoadMode};
use h3o::{LatLng, Resolution};
use std::cmp::Ordering;
use std::path::Path;
use tracing::debug;

/// H3 resolution of the shortcut grid.
///
/// Lower resolutions leave too many polygons per cell, higher ones blow up
/// the cell count and storage.
pub const SHORTCUT_H3_RESOLUTION: Resolution = Resolution::Three;

/// H3 cell containing the coordinate, at the shortcut resolution.
///
/// Both axes are range-checked here so an invalid value is attributed to
/// the coordinate that caused it, whether or not the caller went through
/// [`validate_coordinates`](crate::coord::validate_coordinates). The
/// engine folds `+180` to `-180` before calling.
pub(crate) fn shortcut_cell(lon: f64, lat: f64) -> Result<u64, TzGridError> {
    if !is_valid_lon(lon) {
        return Err(TzGridError::LongitudeOutOfBounds(lon));
    }
    if !is_valid_lat(lat) {
        return Err(TzGridError::LatitudeOutOfBounds(lat));
    }
    // in-range values are finite, which is all h3o requires of them
    let coord = LatLng::new(lat, lon).map_err(|_| {
        if lat.is_finite() {
            TzGridError::LongitudeOutOfBounds(lon)
        } else {
            TzGridError::LatitudeOutOfBounds(lat)
        }
    })?;
    Ok(u64::from(coord.to_cell(SHORTCUT_H3_RESOLUTION)))
}

/// Candidate polygon ids of one shortcut cell (zero-copy).
#[derive(Clone, Copy)]
pub struct CandidateList<'a> {
    ids: flatbuffers::Vector<'a, u32>,
}

impl<'a> CandidateList<'a> {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn get(&self, idx: usize) -> u32 {
        self.ids.get(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + 'a {
        self.ids.iter()
    }
}

/// Payload of one shortcut cell.
pub enum ShortcutPayload<'a> {
    /// Every polygon intersecting the cell belongs to this zone; no polygon
    /// test is needed.
    UniqueZone(u16),
    /// Polygons of more than one zone intersect the cell; the point must be
    /// tested against these candidates in order.
    Candidates(CandidateList<'a>),
}

/// The spatial index of one engine instance.
pub struct ShortcutIndex {
    buffer: DataBuffer,
    num_entries: usize,
}

impl ShortcutIndex {
    pub(crate) fn load(data_dir: &Path, mode: LoadMode) -> Result<Self, TzGridError> {
        // the file suffix mirrors the zone-id width of the dataset; accept either
        let path = [io::SHORTCUTS_U8_FILE, io::SHORTCUTS_U16_FILE]
            .iter()
            .map(|name| data_dir.join(name))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| TzGridError::Load {
                path: data_dir.join(io::SHORTCUTS_U16_FILE),
                reason: "no hybrid shortcut file in dataset directory".to_string(),
            })?;
        let buffer = io::load_buffer(&path, mode)?;

        let collection =
            flatbuffers::root::<ShortcutCollection>(&buffer).map_err(|e| TzGridError::Load {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        let entries = collection.entries().ok_or_else(|| TzGridError::Load {
            path: path.clone(),
            reason: "shortcut collection has no entry vector".to_string(),
        })?;

        // lookup is a binary search; require strictly ascending cell ids
        let num_entries = entries.len();
        let mut previous: Option<u64> = None;
        for entry in entries.iter() {
            let h3_id = entry.h3_id();
            if previous.is_some_and(|p| p >= h3_id) {
                return Err(TzGridError::CorruptData(
                    "shortcut entries are not sorted by h3 id".to_string(),
                ));
            }
            previous = Some(h3_id);
        }

        debug!(entries = num_entries, path = %path.display(), "loaded shortcut index");
        Ok(Self { buffer, num_entries })
    }

    fn collection(&self) -> ShortcutCollection<'_> {
        // Safety: the buffer was verified during load.
        unsafe { flatbuffers::root_unchecked::<ShortcutCollection>(&self.buffer) }
    }

    /// Number of indexed cells.
    pub fn len(&self) -> usize {
        self.num_entries
    }

    pub fn is_empty(&self) -> bool {
        self.num_entries == 0
    }

    /// Payload for the given H3 cell, or `None` when the cell has no entry
    /// (possible for datasets without full ocean coverage).
    pub fn lookup(&self, cell: u64) -> Option<ShortcutPayload<'_>> {
        let entries = self.collection().entries()?;
        let mut low = 0usize;
        let mut high = self.num_entries;
        while low < high {
            let mid = low + (high - low) / 2;
            let entry = entries.get(mid);
            match entry.h3_id().cmp(&cell) {
                Ordering::Less => low = mid + 1,
                Ordering::Greater => high = mid,
                Ordering::Equal => return Some(payload_of(entry)),
            }
        }
        None
    }
}

fn payload_of(entry: ShortcutEntry<'_>) -> ShortcutPayload<'_> {
    match entry.poly_ids() {
        Some(ids) if !ids.is_empty() => ShortcutPayload::Candidates(CandidateList { ids }),
        _ => ShortcutPayload::UniqueZone(entry.zone_id()),
    }
}
