//! Synthetic dataset fixtures, written through the real array and
//! FlatBuffers writers.
//!
//! The standard fixture is a miniature world exercising every query path:
//! a zone with an enclave carved out as a hole, a zone made of several
//! polygons, an ocean zone including a cell at the antimeridian, an
//! uncovered region, and one deliberately corrupt shortcut entry.

use crate::coord::to_fixed;
use crate::error::TzGridError;
use crate::index::shortcut_cell;
use crate::io::flatbuf::{self, EntryPayload};
use crate::io::{self, npy};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Probe whose shortcut cell references a polygon id past the end of the
/// store; querying it must surface `CorruptData`.
pub(crate) const DANGLING_PROBE: (f64, f64) = (140.0, -30.0);

fn write_file(path: &Path, bytes: impl AsRef<[u8]>) -> Result<(), TzGridError> {
    fs::write(path, bytes).map_err(|e| TzGridError::Load {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn rect(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> Vec<(f64, f64)> {
    vec![(lon1, lat1), (lon2, lat1), (lon2, lat2), (lon1, lat2)]
}

fn ring(vertices: &[(f64, f64)]) -> (Vec<i32>, Vec<i32>) {
    let xs = vertices.iter().map(|v| to_fixed(v.0)).collect();
    let ys = vertices.iter().map(|v| to_fixed(v.1)).collect();
    (xs, ys)
}

fn add_entry(entries: &mut HashMap<u64, EntryPayload>, cell: u64, payload: EntryPayload) {
    match entries.get(&cell) {
        None => {
            entries.insert(cell, payload);
        }
        Some(existing) => assert_eq!(
            existing, &payload,
            "fixture probes collide on cell {} with different payloads",
            cell
        ),
    }
}

/// Writes the standard fixture dataset into `dir`.
///
/// Zones (ids in order): `Africa/Johannesburg` (one square with the Maseru
/// enclave as a hole), `Africa/Maseru` (the enclave), `Europe/Berlin` (two
/// polygons, largest first), `Etc/GMT` (two ocean squares, one touching the
/// antimeridian).
pub(crate) fn write_standard_dataset(dir: &Path) -> Result<(), TzGridError> {
    let names = [
        "Africa/Johannesburg",
        "Africa/Maseru",
        "Europe/Berlin",
        "Etc/GMT",
    ];
    let outers: Vec<Vec<(f64, f64)>> = vec![
        // 0: Johannesburg territory with the enclave cut out below
        rect(24.0, -33.0, 32.0, -25.0),
        // 1: the enclave itself
        rect(27.0, -31.0, 29.0, -29.0),
        // 2: Berlin, main polygon (six vertices, the larger one)
        vec![
            (10.0, 50.0),
            (13.0, 50.0),
            (16.0, 50.0),
            (16.0, 54.0),
            (13.0, 54.0),
            (10.0, 54.0),
        ],
        // 3: Berlin, secondary polygon
        rect(5.0, 50.0, 8.0, 52.0),
        // 4: ocean around the null island
        rect(-10.0, -10.0, 10.0, 10.0),
        // 5: ocean touching the antimeridian
        rect(-180.0, 5.0, -176.0, 15.0),
    ];
    let zone_ids: [u8; 6] = [0, 1, 2, 2, 3, 3];
    let zone_positions: [u32; 5] = [0, 1, 2, 4, 6];
    let holes: Vec<Vec<(f64, f64)>> = vec![rect(27.0, -31.0, 29.0, -29.0)];

    write_file(
        &dir.join(io::TIMEZONE_NAMES_FILE),
        format!("{}\n", names.join("\n")),
    )?;
    npy::write_u8(&dir.join(io::ZONE_IDS_FILE), &zone_ids)?;
    npy::write_u32(&dir.join(io::ZONE_POSITIONS_FILE), &zone_positions)?;

    let outer_rings: Vec<(Vec<i32>, Vec<i32>)> = outers.iter().map(|o| ring(o)).collect();
    let hole_rings: Vec<(Vec<i32>, Vec<i32>)> = holes.iter().map(|h| ring(h)).collect();

    let xmin: Vec<i32> = outer_rings.iter().map(|(xs, _)| *xs.iter().min().unwrap()).collect();
    let xmax: Vec<i32> = outer_rings.iter().map(|(xs, _)| *xs.iter().max().unwrap()).collect();
    let ymin: Vec<i32> = outer_rings.iter().map(|(_, ys)| *ys.iter().min().unwrap()).collect();
    let ymax: Vec<i32> = outer_rings.iter().map(|(_, ys)| *ys.iter().max().unwrap()).collect();
    npy::write_i32(&dir.join(io::XMIN_FILE), &xmin)?;
    npy::write_i32(&dir.join(io::XMAX_FILE), &xmax)?;
    npy::write_i32(&dir.join(io::YMIN_FILE), &ymin)?;
    npy::write_i32(&dir.join(io::YMAX_FILE), &ymax)?;

    let boundaries_dir = dir.join(io::BOUNDARIES_DIR);
    fs::create_dir_all(&boundaries_dir).map_err(|e| TzGridError::Load {
        path: boundaries_dir.clone(),
        reason: e.to_string(),
    })?;
    write_file(
        &boundaries_dir.join(io::COORDINATES_FILE),
        flatbuf::write_polygon_collection(&outer_rings),
    )?;

    let holes_dir = dir.join(io::HOLES_DIR);
    fs::create_dir_all(&holes_dir).map_err(|e| TzGridError::Load {
        path: holes_dir.clone(),
        reason: e.to_string(),
    })?;
    write_file(
        &holes_dir.join(io::COORDINATES_FILE),
        flatbuf::write_polygon_collection(&hole_rings),
    )?;

    write_file(&dir.join(io::HOLE_REGISTRY_FILE), r#"{"0": [0, 1]}"#)?;

    // shortcut entries for the cells the tests probe; everything else stays
    // uncovered on purpose
    let mut entries: HashMap<u64, EntryPayload> = HashMap::new();
    add_entry(
        &mut entries,
        shortcut_cell(28.0473, -26.2041)?,
        EntryPayload::UniqueZone(0),
    );
    add_entry(
        &mut entries,
        shortcut_cell(27.8546, -29.3151)?,
        EntryPayload::Polygons(vec![0, 1]),
    );
    add_entry(
        &mut entries,
        shortcut_cell(26.5, -29.3)?,
        EntryPayload::Polygons(vec![0, 1]),
    );
    add_entry(
        &mut entries,
        shortcut_cell(13.358, 52.5061)?,
        EntryPayload::Polygons(vec![2, 3]),
    );
    add_entry(&mut entries, shortcut_cell(0.0, 0.0)?, EntryPayload::UniqueZone(3));
    add_entry(
        &mut entries,
        shortcut_cell(-180.0, 10.0)?,
        EntryPayload::UniqueZone(3),
    );
    add_entry(
        &mut entries,
        shortcut_cell(DANGLING_PROBE.0, DANGLING_PROBE.1)?,
        EntryPayload::Polygons(vec![0, 99]),
    );

    let entries: Vec<(u64, EntryPayload)> = entries.into_iter().collect();
    write_file(
        &dir.join(io::SHORTCUTS_U8_FILE),
        flatbuf::write_shortcut_collection(&entries),
    )?;

    Ok(())
}
