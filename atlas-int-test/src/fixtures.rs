//! Shared index fixtures for the integration suites and benchmarks.

use atlas_index::FileOffset;

use crate::index_writer::IndexFixture;

/// Entity offsets used by the reference tree, so assertions can name them.
pub const WAY_AT_1_1: FileOffset = 0x1000;
pub const ROOT_AREA: FileOffset = 0x900;
pub const SW_REL_AREA: FileOffset = 0x910;

/// The depth-2 reference tree: root cell (0,0)-(4,4), four 2x2 quadrants,
/// sixteen 1x1 sub-quadrants. One way of type 5 is anchored at the
/// sub-quadrant covering (1,1)-(2,2); an area sits at the root and a
/// relation area at the south-west quadrant.
pub fn reference_tree() -> IndexFixture {
    let mut fixture = IndexFixture::new(2, 4.0, 4.0);
    fixture.entry(0, 0, 0).area(ROOT_AREA);
    fixture.entry(1, 0, 0).rel_area(SW_REL_AREA);
    fixture.entry(2, 1, 1).way(5, WAY_AT_1_1);
    fixture
}

/// Sibling offsets for the cap-determinism scenario.
pub const SIBLING_LOW: FileOffset = 0x2000;
pub const SIBLING_HIGH: FileOffset = 0x3000;

/// Two ways of type 5 anchored at sibling sub-quadrants, with the *larger*
/// offset in the cell a depth-first descent visits first. A capped query
/// overlapping both must keep the numerically smaller offset.
pub fn sibling_ways_tree() -> IndexFixture {
    let mut fixture = IndexFixture::new(2, 4.0, 4.0);
    // (2,0,1) is the NW quadrant of the SW 2x2 cell and is visited before
    // its SE sibling (2,1,0) in quadrant order.
    fixture.entry(2, 0, 1).way(5, SIBLING_HIGH);
    fixture.entry(2, 1, 0).way(5, SIBLING_LOW);
    fixture
}

/// A fully populated tree: every deepest-level cell carries one way whose
/// type cycles through `type_count` and whose offset encodes its grid
/// position, plus an area every eighth cell.
pub fn dense_tree(max_level: u32, type_count: u16) -> IndexFixture {
    let mut fixture = IndexFixture::new(max_level, 1024.0, 1024.0);
    let side = 1u32 << max_level;
    for iy in 0..side {
        for ix in 0..side {
            let cell_index = iy * side + ix;
            let offset = 0x10000 + (cell_index as FileOffset) * 8;
            let type_id = (cell_index % type_count as u32) as u16;
            let entry = fixture.entry(max_level, ix, iy);
            entry.way(type_id, offset);
            if cell_index % 8 == 0 {
                entry.area(offset + 1);
            }
        }
    }
    fixture
}
