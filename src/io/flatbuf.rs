//! Wire tables for the FlatBuffers dataset files.
//!
//! Two root types are stored on disk (schema sources in `schemas/`):
//!
//! * `PolygonCollection` — all outer boundaries or all holes of a dataset,
//!   one table per polygon with separate `x`/`y` columns
//!   (`boundaries/coordinates.fbs`, `holes/coordinates.fbs`).
//! * `ShortcutCollection` — the hybrid spatial index, one entry per H3 cell,
//!   sorted by cell id (`hybrid_shortcuts_{u8,u16}.fbs`). An entry with an
//!   absent or empty `poly_ids` vector is a unique-zone entry and `zone_id`
//!   is authoritative; otherwise `poly_ids` lists the candidate polygons and
//!   `zone_id` is unused.
//!
//! The accessor impls follow the flatc Rust output shape (`Follow` +
//! `Table` + `Verifiable`) so the checked-in schemas stay the source of
//! truth. The builder functions are shared between the offline dataset
//! compiler and the test fixtures.

use flatbuffers::{
    FlatBufferBuilder, Follow, ForwardsUOffset, InvalidFlatbuffer, Table, Vector, Verifiable,
    Verifier, WIPOffset,
};

/// One polygon ring in fixed-point coordinates, stored columnar.
///
/// The first and last vertices are not repeated; the closing edge is
/// implicit.
#[derive(Copy, Clone)]
pub struct Polygon<'a> {
    pub _tab: Table<'a>,
}

impl<'a> Follow<'a> for Polygon<'a> {
    type Inner = Polygon<'a>;
    #[inline]
    unsafe fn follow(buf: &'a [u8], loc: usize) -> Self::Inner {
        Self {
            _tab: Table::new(buf, loc),
        }
    }
}

impl<'a> Polygon<'a> {
    pub const VT_X: flatbuffers::VOffsetT = 4;
    pub const VT_Y: flatbuffers::VOffsetT = 6;

    pub fn x(&self) -> Option<Vector<'a, i32>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Vector<'a, i32>>>(Self::VT_X, None)
        }
    }

    pub fn y(&self) -> Option<Vector<'a, i32>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Vector<'a, i32>>>(Self::VT_Y, None)
        }
    }
}

impl Verifiable for Polygon<'_> {
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<ForwardsUOffset<Vector<'_, i32>>>("x", Self::VT_X, false)?
            .visit_field::<ForwardsUOffset<Vector<'_, i32>>>("y", Self::VT_Y, false)?
            .finish();
        Ok(())
    }
}

/// Root table of a polygon file: all outer boundaries, or all holes.
#[derive(Copy, Clone)]
pub struct PolygonCollection<'a> {
    pub _tab: Table<'a>,
}

impl<'a> Follow<'a> for PolygonCollection<'a> {
    type Inner = PolygonCollection<'a>;
    #[inline]
    unsafe fn follow(buf: &'a [u8], loc: usize) -> Self::Inner {
        Self {
            _tab: Table::new(buf, loc),
        }
    }
}

impl<'a> PolygonCollection<'a> {
    pub const VT_POLYGONS: flatbuffers::VOffsetT = 4;

    pub fn polygons(&self) -> Option<Vector<'a, ForwardsUOffset<Polygon<'a>>>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Vector<'a, ForwardsUOffset<Polygon<'a>>>>>(
                    Self::VT_POLYGONS,
                    None,
                )
        }
    }
}

impl Verifiable for PolygonCollection<'_> {
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<ForwardsUOffset<Vector<'_, ForwardsUOffset<Polygon<'_>>>>>(
                "polygons",
                Self::VT_POLYGONS,
                false,
            )?
            .finish();
        Ok(())
    }
}

/// One shortcut entry: an H3 cell and its payload.
#[derive(Copy, Clone)]
pub struct ShortcutEntry<'a> {
    pub _tab: Table<'a>,
}

impl<'a> Follow<'a> for ShortcutEntry<'a> {
    type Inner = ShortcutEntry<'a>;
    #[inline]
    unsafe fn follow(buf: &'a [u8], loc: usize) -> Self::Inner {
        Self {
            _tab: Table::new(buf, loc),
        }
    }
}

impl<'a> ShortcutEntry<'a> {
    pub const VT_H3_ID: flatbuffers::VOffsetT = 4;
    pub const VT_ZONE_ID: flatbuffers::VOffsetT = 6;
    pub const VT_POLY_IDS: flatbuffers::VOffsetT = 8;

    pub fn h3_id(&self) -> u64 {
        unsafe { self._tab.get::<u64>(Self::VT_H3_ID, Some(0)).unwrap_or(0) }
    }

    pub fn zone_id(&self) -> u16 {
        unsafe { self._tab.get::<u16>(Self::VT_ZONE_ID, Some(0)).unwrap_or(0) }
    }

    pub fn poly_ids(&self) -> Option<Vector<'a, u32>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Vector<'a, u32>>>(Self::VT_POLY_IDS, None)
        }
    }
}

impl Verifiable for ShortcutEntry<'_> {
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<u64>("h3_id", Self::VT_H3_ID, false)?
            .visit_field::<u16>("zone_id", Self::VT_ZONE_ID, false)?
            .visit_field::<ForwardsUOffset<Vector<'_, u32>>>("poly_ids", Self::VT_POLY_IDS, false)?
            .finish();
        Ok(())
    }
}

/// Root table of a hybrid shortcut file.
#[derive(Copy, Clone)]
pub struct ShortcutCollection<'a> {
    pub _tab: Table<'a>,
}

impl<'a> Follow<'a> for ShortcutCollection<'a> {
    type Inner = ShortcutCollection<'a>;
    #[inline]
    unsafe fn follow(buf: &'a [u8], loc: usize) -> Self::Inner {
        Self {
            _tab: Table::new(buf, loc),
        }
    }
}

impl<'a> ShortcutCollection<'a> {
    pub const VT_ENTRIES: flatbuffers::VOffsetT = 4;

    pub fn entries(&self) -> Option<Vector<'a, ForwardsUOffset<ShortcutEntry<'a>>>> {
        unsafe {
            self._tab
                .get::<ForwardsUOffset<Vector<'a, ForwardsUOffset<ShortcutEntry<'a>>>>>(
                    Self::VT_ENTRIES,
                    None,
                )
        }
    }
}

impl Verifiable for ShortcutCollection<'_> {
    fn run_verifier(v: &mut Verifier, pos: usize) -> Result<(), InvalidFlatbuffer> {
        v.visit_table(pos)?
            .visit_field::<ForwardsUOffset<Vector<'_, ForwardsUOffset<ShortcutEntry<'_>>>>>(
                "entries",
                Self::VT_ENTRIES,
                false,
            )?
            .finish();
        Ok(())
    }
}

/// Payload of one shortcut entry when building a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryPayload {
    /// Every polygon intersecting the cell belongs to this zone.
    UniqueZone(u16),
    /// Candidate polygon ids, ordered by decreasing zone frequency
    /// (ties by ascending polygon id). Must not be empty.
    Polygons(Vec<u32>),
}

fn create_polygon<'a>(
    fbb: &mut FlatBufferBuilder<'a>,
    xs: &[i32],
    ys: &[i32],
) -> WIPOffset<Polygon<'a>> {
    let x = fbb.create_vector(xs);
    let y = fbb.create_vector(ys);
    let start = fbb.start_table();
    fbb.push_slot_always(Polygon::VT_X, x);
    fbb.push_slot_always(Polygon::VT_Y, y);
    WIPOffset::new(fbb.end_table(start).value())
}

/// Serializes a polygon collection, one `(x, y)` column pair per polygon.
pub fn write_polygon_collection(polygons: &[(Vec<i32>, Vec<i32>)]) -> Vec<u8> {
    let mut fbb = FlatBufferBuilder::new();
    let offsets: Vec<_> = polygons
        .iter()
        .map(|(xs, ys)| create_polygon(&mut fbb, xs, ys))
        .collect();
    let vector = fbb.create_vector(&offsets);
    let start = fbb.start_table();
    fbb.push_slot_always(PolygonCollection::VT_POLYGONS, vector);
    let root = WIPOffset::<PolygonCollection>::new(fbb.end_table(start).value());
    fbb.finish(root, None);
    fbb.finished_data().to_vec()
}

fn create_entry<'a>(
    fbb: &mut FlatBufferBuilder<'a>,
    h3_id: u64,
    payload: &EntryPayload,
) -> WIPOffset<ShortcutEntry<'a>> {
    let poly_ids = match payload {
        EntryPayload::UniqueZone(_) => None,
        EntryPayload::Polygons(ids) => Some(fbb.create_vector(ids)),
    };
    let start = fbb.start_table();
    fbb.push_slot::<u64>(ShortcutEntry::VT_H3_ID, h3_id, 0);
    if let EntryPayload::UniqueZone(zone_id) = payload {
        fbb.push_slot::<u16>(ShortcutEntry::VT_ZONE_ID, *zone_id, 0);
    }
    if let Some(ids) = poly_ids {
        fbb.push_slot_always(ShortcutEntry::VT_POLY_IDS, ids);
    }
    WIPOffset::new(fbb.end_table(start).value())
}

/// Serializes a shortcut collection, sorting the entries by H3 cell id so
/// the reader can binary-search them.
pub fn write_shortcut_collection(entries: &[(u64, EntryPayload)]) -> Vec<u8> {
    let mut sorted: Vec<&(u64, EntryPayload)> = entries.iter().collect();
    sorted.sort_by_key(|(h3_id, _)| *h3_id);

    let mut fbb = FlatBufferBuilder::new();
    let offsets: Vec<_> = sorted
        .iter()
        .map(|(h3_id, payload)| create_entry(&mut fbb, *h3_id, payload))
        .collect();
    let vector = fbb.create_vector(&offsets);
    let start = fbb.start_table();
    fbb.push_slot_always(ShortcutCollection::VT_ENTRIES, vector);
    let root = WIPOffset::<ShortcutCollection>::new(fbb.end_table(start).value());
    fbb.finish(root, None);
    fbb.finished_data().to_vec()
}
