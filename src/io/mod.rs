//! Dataset file layout and the buffer loader.
//!
//! A dataset is one directory with fixed file names. All multi-byte values
//! are little-endian.

pub mod flatbuf;
pub mod npy;

use crate::error::TzGridError;
use memmap2::Mmap;
use std::fs;
use std::ops::Deref;
use std::path::Path;
use tracing::debug;

/// UTF-8 zone name table, one IANA name per line, LF-terminated.
pub const TIMEZONE_NAMES_FILE: &str = "timezone_names.txt";
/// Per-outer-polygon zone id (`u8` or `u16`).
pub const ZONE_IDS_FILE: &str = "zone_ids.npy";
/// Prefix sums: polygons of zone `z` are `zone_positions[z]..zone_positions[z+1]`.
pub const ZONE_POSITIONS_FILE: &str = "zone_positions.npy";
/// Per-outer-polygon bounding boxes in fixed-point coordinates.
pub const XMIN_FILE: &str = "xmin.npy";
pub const XMAX_FILE: &str = "xmax.npy";
pub const YMIN_FILE: &str = "ymin.npy";
pub const YMAX_FILE: &str = "ymax.npy";
/// Subdirectory holding the outer boundary coordinates.
pub const BOUNDARIES_DIR: &str = "boundaries";
/// Subdirectory holding the hole coordinates.
pub const HOLES_DIR: &str = "holes";
/// FlatBuffers polygon collection inside [`BOUNDARIES_DIR`] / [`HOLES_DIR`].
pub const COORDINATES_FILE: &str = "coordinates.fbs";
/// JSON mapping `outer polygon id -> [first hole id, hole count]`.
pub const HOLE_REGISTRY_FILE: &str = "hole_registry.json";
/// Hybrid shortcut index; the suffix mirrors the dtype of `zone_ids.npy`.
pub const SHORTCUTS_U8_FILE: &str = "hybrid_shortcuts_u8.fbs";
pub const SHORTCUTS_U16_FILE: &str = "hybrid_shortcuts_u16.fbs";

/// How the larger dataset files are brought into the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadMode {
    /// Memory-map the files (small resident set; first access to a cold
    /// page may fault).
    #[default]
    Mmap,
    /// Read everything into owned buffers up front (larger resident set; no
    /// page faults during queries).
    InMemory,
}

/// A read-only byte buffer, either memory-mapped or owned.
///
/// The query code path is identical for both variants.
#[derive(Debug)]
pub(crate) enum DataBuffer {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Deref for DataBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            DataBuffer::Mapped(map) => map,
            DataBuffer::Owned(bytes) => bytes,
        }
    }
}

/// Opens one dataset file according to the load mode.
pub(crate) fn load_buffer(path: &Path, mode: LoadMode) -> Result<DataBuffer, TzGridError> {
    let load_error = |reason: String| TzGridError::Load {
        path: path.to_path_buf(),
        reason,
    };
    let buffer = match mode {
        LoadMode::InMemory => DataBuffer::Owned(fs::read(path).map_err(|e| load_error(e.to_string()))?),
        LoadMode::Mmap => {
            let file = fs::File::open(path).map_err(|e| load_error(e.to_string()))?;
            // Safety: dataset files are immutable for the process lifetime.
            let map = unsafe { Mmap::map(&file) }.map_err(|e| load_error(e.to_string()))?;
            DataBuffer::Mapped(map)
        }
    };
    debug!(path = %path.display(), bytes = buffer.len(), mode = ?mode, "opened dataset file");
    Ok(buffer)
}
