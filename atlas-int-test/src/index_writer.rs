//! Reference writer for the area index file format.
//!
//! Builds a quadtree from grid-addressed cells and emits the byte stream
//! [`atlas_index::AreaIndex::open`] reads: header, then per-level blocks of
//! entry records keyed by their absolute file position. Layout happens in
//! two passes - record lengths first, then absolute positions - because a
//! parent's child slots store the positions of records in the *next* block.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use atlas_index::area_index::index_constants::{header_len, INDEX_MAGIC, INDEX_VERSION, NO_OFFSET};
use atlas_index::area_index::Quadrant;
use atlas_index::{FileOffset, TypeId};

/// Grid address of a cell: `(level, ix, iy)` with `ix, iy < 2^level`.
/// `iy` grows northward, matching the index's quadrant convention.
pub type CellAddress = (u32, u32, u32);

/// Entity references anchored at one cell, plus test-only corruption
/// hooks.
#[derive(Debug, Clone, Default)]
pub struct EntryPayload {
    ways: BTreeMap<TypeId, Vec<FileOffset>>,
    rel_ways: BTreeMap<TypeId, Vec<FileOffset>>,
    areas: Vec<FileOffset>,
    rel_areas: Vec<FileOffset>,
    /// Child-slot overrides written verbatim, bypassing the real child
    /// layout. Lets corruption tests emit dangling references.
    bogus_children: BTreeMap<usize, FileOffset>,
}

impl EntryPayload {
    pub fn way(&mut self, type_id: TypeId, offset: FileOffset) -> &mut Self {
        self.ways.entry(type_id).or_default().push(offset);
        self
    }

    pub fn rel_way(&mut self, type_id: TypeId, offset: FileOffset) -> &mut Self {
        self.rel_ways.entry(type_id).or_default().push(offset);
        self
    }

    pub fn area(&mut self, offset: FileOffset) -> &mut Self {
        self.areas.push(offset);
        self
    }

    pub fn rel_area(&mut self, offset: FileOffset) -> &mut Self {
        self.rel_areas.push(offset);
        self
    }

    /// Forces the given child slot to a raw offset in the emitted record.
    pub fn bogus_child(&mut self, slot: usize, offset: FileOffset) -> &mut Self {
        assert!(slot < 4, "child slot out of range");
        self.bogus_children.insert(slot, offset);
        self
    }

    fn byte_len(&self) -> usize {
        fn group_section_len(groups: &BTreeMap<TypeId, Vec<FileOffset>>) -> usize {
            4 + groups
                .values()
                .map(|offsets| 2 + 4 + 8 * offsets.len())
                .sum::<usize>()
        }
        fn list_len(list: &[FileOffset]) -> usize {
            4 + 8 * list.len()
        }

        4 * 8
            + group_section_len(&self.ways)
            + group_section_len(&self.rel_ways)
            + list_len(&self.areas)
            + list_len(&self.rel_areas)
    }
}

/// A quadtree under construction, addressed by grid cell.
///
/// Adding an entry materializes its whole ancestor chain, so the emitted
/// file always satisfies the reader's referential-integrity checks (unless
/// a bogus child is planted on purpose).
#[derive(Debug, Clone)]
pub struct IndexFixture {
    max_level: u32,
    root_width: f64,
    root_height: f64,
    cells: BTreeMap<CellAddress, EntryPayload>,
}

impl IndexFixture {
    pub fn new(max_level: u32, root_width: f64, root_height: f64) -> Self {
        let mut cells = BTreeMap::new();
        cells.insert((0, 0, 0), EntryPayload::default());
        Self {
            max_level,
            root_width,
            root_height,
            cells,
        }
    }

    pub fn max_level(&self) -> u32 {
        self.max_level
    }

    /// The payload of the cell at `(level, ix, iy)`, created on first
    /// access together with its ancestors.
    pub fn entry(&mut self, level: u32, ix: u32, iy: u32) -> &mut EntryPayload {
        assert!(level <= self.max_level, "level beyond the tree's depth");
        assert!(
            ix < 1 << level && iy < 1 << level,
            "cell ({}, {}) out of range for level {}",
            ix,
            iy,
            level
        );

        let (mut ax, mut ay) = (ix, iy);
        for ancestor_level in (0..=level).rev() {
            self.cells
                .entry((ancestor_level, ax, ay))
                .or_default();
            ax /= 2;
            ay /= 2;
        }
        self.cells.get_mut(&(level, ix, iy)).unwrap()
    }

    /// Number of cells materialized at the given level.
    pub fn entries_at(&self, level: u32) -> usize {
        self.cells.keys().filter(|(l, _, _)| *l == level).count()
    }

    /// Emits the complete index file.
    pub fn write_bytes(&self) -> Vec<u8> {
        // Pass 1: absolute position of every record.
        let mut positions: BTreeMap<CellAddress, FileOffset> = BTreeMap::new();
        let mut pos = header_len(self.max_level) as FileOffset;
        for level in 0..=self.max_level {
            pos += 12; // block prelude
            for (address, payload) in self.cells.range((level, 0, 0)..=(level, u32::MAX, u32::MAX))
            {
                positions.insert(*address, pos);
                pos += payload.byte_len() as FileOffset;
            }
        }

        // Pass 2: emit.
        let mut buf = Vec::with_capacity(pos as usize);
        push_u32(&mut buf, INDEX_MAGIC);
        push_u32(&mut buf, INDEX_VERSION);
        push_u32(&mut buf, self.max_level);
        for level in 0..=self.max_level {
            let factor = (1u64 << level) as f64;
            push_f64(&mut buf, self.root_width / factor);
            push_f64(&mut buf, self.root_height / factor);
        }

        for level in 0..=self.max_level {
            let level_cells: Vec<(&CellAddress, &EntryPayload)> = self
                .cells
                .range((level, 0, 0)..=(level, u32::MAX, u32::MAX))
                .collect();

            push_u32(&mut buf, level_cells.len() as u32);
            let block_len: usize = level_cells
                .iter()
                .map(|(_, payload)| payload.byte_len())
                .sum();
            push_u64(&mut buf, block_len as u64);

            for (&(_, ix, iy), payload) in level_cells {
                debug_assert_eq!(buf.len() as FileOffset, positions[&(level, ix, iy)]);
                self.push_entry(&mut buf, level, ix, iy, payload, &positions);
            }
        }

        buf
    }

    /// Writes the emitted file to `path`.
    pub fn write_to(&self, path: &Path) -> io::Result<()> {
        let bytes = self.write_bytes();
        log::debug!("writing {} byte index fixture to {:?}", bytes.len(), path);
        std::fs::write(path, bytes)
    }

    fn push_entry(
        &self,
        buf: &mut Vec<u8>,
        level: u32,
        ix: u32,
        iy: u32,
        payload: &EntryPayload,
        positions: &BTreeMap<CellAddress, FileOffset>,
    ) {
        for (slot, quadrant) in Quadrant::ALL.iter().enumerate() {
            let child = if let Some(&bogus) = payload.bogus_children.get(&slot) {
                bogus
            } else if level < self.max_level {
                let child_address = (level + 1, 2 * ix + quadrant.dx(), 2 * iy + quadrant.dy());
                positions.get(&child_address).copied().unwrap_or(NO_OFFSET)
            } else {
                NO_OFFSET
            };
            push_u64(buf, child);
        }

        push_groups(buf, &payload.ways);
        push_groups(buf, &payload.rel_ways);
        push_list(buf, &payload.areas);
        push_list(buf, &payload.rel_areas);
    }
}

fn push_groups(buf: &mut Vec<u8>, groups: &BTreeMap<TypeId, Vec<FileOffset>>) {
    push_u32(buf, groups.len() as u32);
    for (&type_id, offsets) in groups {
        push_u16(buf, type_id);
        push_list(buf, offsets);
    }
}

fn push_list(buf: &mut Vec<u8>, offsets: &[FileOffset]) {
    push_u32(buf, offsets.len() as u32);
    for &offset in offsets {
        push_u64(buf, offset);
    }
}

fn push_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn push_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn push_u64(buf: &mut Vec<u8>, value: u64) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn push_f64(buf: &mut Vec<u8>, value: f64) {
    buf.extend_from_slice(&value.to_bits().to_le_bytes());
}
