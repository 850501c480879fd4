//! The area index: eager load plus the range-query engine.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::bounding_box::BoundingBox;
use crate::style::{StyleConfig, TypeSet};

use super::index_loader::{link_levels, read_header, read_levels};
use super::index_scanner::{IndexFile, Scanner};
use super::index_types::{
    EntryId, FileOffset, IndexLevel, IndexResult, IndexStatistics, LevelStatistics, QueryOffsets,
    Quadrant,
};

/// The quadtree-structured spatial index over map entities.
///
/// An `AreaIndex` is constructed by [`AreaIndex::open`], which reads the
/// whole index file into memory in one pass and fails closed on any I/O or
/// format problem: on error no index value exists, so a query can never
/// observe a half-loaded tree. Re-loading is re-opening; callers replace
/// the old value as a unit.
///
/// After `open` returns the index is immutable. Queries borrow `&self`,
/// perform no I/O and take no locks, so one index wrapped in an `Arc` can
/// serve a renderer and a router concurrently; publishing the `Arc` is the
/// only synchronization required.
///
/// # Examples
///
/// ```rust,no_run
/// use atlas_index::{AreaIndex, BoundingBox, TypeSet};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let index = AreaIndex::open("region.areaidx")?;
///
/// let viewport = BoundingBox::new(1200.0, 3400.0, 1300.0, 3500.0);
/// let road_types: TypeSet = [3, 4, 5].into_iter().collect();
/// let offsets = index.get_offsets(&viewport, 10, 2000, &road_types, 4000);
///
/// for offset in &offsets.way_ways {
///     // resolve against the entity-data file
///     let _ = offset;
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct AreaIndex {
    path: PathBuf,
    max_level: u32,
    cell_width: Vec<f64>,
    cell_height: Vec<f64>,
    covering: BoundingBox,
    levels: Vec<IndexLevel>,
}

/// Borrowed query parameters threaded through the descent.
struct QueryParams<'a> {
    bbox: BoundingBox,
    max_area_level: u32,
    max_area_count: usize,
    way_types: &'a TypeSet,
    max_way_count: usize,
}

impl AreaIndex {
    /// Opens and fully loads the index file at `path`.
    ///
    /// The load is eager and blocking; it is meant to run once during
    /// application startup. Any I/O error (missing file, truncation) or
    /// format error (bad header, corrupt counts, dangling child reference)
    /// discards everything and returns `Err` - there is no partial load.
    pub fn open(path: impl AsRef<Path>) -> IndexResult<Self> {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(index) => {
                log::debug!(
                    "loaded area index {:?}: {} levels, {} entries",
                    path,
                    index.levels.len(),
                    index.entry_count()
                );
                Ok(index)
            }
            Err(err) => {
                log::error!("failed to load area index {:?}: {}", path, err);
                Err(err)
            }
        }
    }

    fn load(path: &Path) -> IndexResult<Self> {
        let file = IndexFile::open(path)?;
        let mut scanner = Scanner::new(file.bytes());

        let header = read_header(&mut scanner)?;
        let raw_levels = read_levels(&mut scanner, &header)?;
        let levels = link_levels(raw_levels)?;

        Ok(Self {
            path: path.to_path_buf(),
            max_level: header.max_level,
            covering: header.covering_bbox(),
            cell_width: header.cell_width,
            cell_height: header.cell_height,
            levels,
        })
    }

    /// The path the index was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deepest quadtree level of the index.
    pub fn max_level(&self) -> u32 {
        self.max_level
    }

    /// The root cell: the full bounding box the index covers.
    pub fn covering_bbox(&self) -> BoundingBox {
        self.covering
    }

    /// Total number of quadtree nodes across all levels.
    pub fn entry_count(&self) -> usize {
        self.levels.iter().map(IndexLevel::len).sum()
    }

    /// Runs a range query: collects references to all entities of the
    /// requested kinds whose anchor cells overlap `bbox`.
    ///
    /// * `bbox` - query window in index-native coordinates.
    /// * `max_area_level` - deepest level at which area and relation-area
    ///   references are still collected; ways are not affected by it and
    ///   are collected down to the tree's own deepest level.
    /// * `max_area_count` - joint cap on `way_areas` + `relation_areas`.
    /// * `way_types` - only way references of these types are collected;
    ///   types outside the set never appear in the way outputs.
    /// * `max_way_count` - joint cap on `way_ways` + `relation_ways`.
    ///
    /// When a cap is exceeded the numerically smallest offsets win, so a
    /// truncated result does not depend on traversal order. Caps bound the
    /// output size, not the number of nodes visited: a very large `bbox`
    /// still walks every overlapping node.
    pub fn get_offsets(
        &self,
        bbox: &BoundingBox,
        max_area_level: u32,
        max_area_count: usize,
        way_types: &TypeSet,
        max_way_count: usize,
    ) -> QueryOffsets {
        let mut offsets = QueryOffsets::default();
        // An inverted box overlaps nothing.
        if !bbox.is_valid() {
            return offsets;
        }

        let params = QueryParams {
            bbox: *bbox,
            max_area_level,
            max_area_count,
            way_types,
            max_way_count,
        };
        self.visit(
            0,
            0,
            self.covering.min_x,
            self.covering.min_y,
            &params,
            &mut offsets,
        );
        offsets
    }

    /// Range query with the type filter derived from a style configuration.
    ///
    /// This is the entry point the rendering layer calls: the set of way
    /// types the style draws becomes the query's type filter.
    pub fn get_offsets_for_style(
        &self,
        style: &StyleConfig,
        bbox: &BoundingBox,
        max_area_level: u32,
        max_area_count: usize,
        max_way_count: usize,
    ) -> QueryOffsets {
        self.get_offsets(
            bbox,
            max_area_level,
            max_area_count,
            style.way_types(),
            max_way_count,
        )
    }

    fn visit(
        &self,
        level: u32,
        entry_id: EntryId,
        origin_x: f64,
        origin_y: f64,
        params: &QueryParams<'_>,
        out: &mut QueryOffsets,
    ) {
        let cell = BoundingBox::from_origin(
            origin_x,
            origin_y,
            self.cell_width[level as usize],
            self.cell_height[level as usize],
        );
        if !cell_intersects(&cell, &params.bbox) {
            return;
        }

        let entry = &self.levels[level as usize][entry_id as usize];

        for group in &entry.ways {
            if params.way_types.contains(group.type_id) {
                for &offset in &group.offsets {
                    insert_capped(
                        &mut out.way_ways,
                        &mut out.relation_ways,
                        offset,
                        params.max_way_count,
                    );
                }
            }
        }
        for group in &entry.rel_ways {
            if params.way_types.contains(group.type_id) {
                for &offset in &group.offsets {
                    insert_capped(
                        &mut out.relation_ways,
                        &mut out.way_ways,
                        offset,
                        params.max_way_count,
                    );
                }
            }
        }

        if level <= params.max_area_level {
            for &offset in &entry.areas {
                insert_capped(
                    &mut out.way_areas,
                    &mut out.relation_areas,
                    offset,
                    params.max_area_count,
                );
            }
            for &offset in &entry.rel_areas {
                insert_capped(
                    &mut out.relation_areas,
                    &mut out.way_areas,
                    offset,
                    params.max_area_count,
                );
            }
        }

        if level < self.max_level {
            let child_width = self.cell_width[level as usize + 1];
            let child_height = self.cell_height[level as usize + 1];
            for (slot, quadrant) in Quadrant::ALL.iter().enumerate() {
                if let Some(child_id) = entry.children[slot] {
                    let child_x = origin_x + quadrant.dx() as f64 * child_width;
                    let child_y = origin_y + quadrant.dy() as f64 * child_height;
                    self.visit(level + 1, child_id, child_x, child_y, params, out);
                }
            }
        }
    }

    /// Computes a diagnostic snapshot: per-level entry counts, reference
    /// counts and occupancy. Purely informational.
    pub fn statistics(&self) -> IndexStatistics {
        let levels = self
            .levels
            .iter()
            .enumerate()
            .map(|(level, entries)| {
                let mut stats = LevelStatistics {
                    level: level as u32,
                    entries: entries.len(),
                    way_refs: 0,
                    relation_way_refs: 0,
                    area_refs: 0,
                    relation_area_refs: 0,
                    occupancy: 0.0,
                };
                for entry in entries.values() {
                    stats.way_refs += entry.ways.iter().map(|g| g.offsets.len()).sum::<usize>();
                    stats.relation_way_refs +=
                        entry.rel_ways.iter().map(|g| g.offsets.len()).sum::<usize>();
                    stats.area_refs += entry.areas.len();
                    stats.relation_area_refs += entry.rel_areas.len();
                }
                // 4^level cells exist at this depth
                let capacity = (1u64 << (2 * level.min(31))) as f64;
                stats.occupancy = entries.len() as f64 / capacity;
                stats
            })
            .collect();

        IndexStatistics {
            max_level: self.max_level,
            total_entries: self.entry_count(),
            covering_bbox: self.covering,
            levels,
        }
    }

    /// Logs the statistics snapshot through the `log` facade.
    pub fn dump_statistics(&self) {
        let stats = self.statistics();
        log::info!(
            "area index {:?}: levels 0..={}, {} entries, covering {}",
            self.path,
            stats.max_level,
            stats.total_entries,
            stats.covering_bbox
        );
        for level in &stats.levels {
            log::debug!(
                "  level {}: {} entries (occupancy {:.6}), ways {}+{}, areas {}+{}",
                level.level,
                level.entries,
                level.occupancy,
                level.way_refs,
                level.relation_way_refs,
                level.area_refs,
                level.relation_area_refs,
            );
        }
    }
}

/// Overlap test between a quadtree cell and the query window.
///
/// Cells tile the plane half-open ([min, max) on both axes): a query that
/// touches a cell only at the cell's max edge does not enter it, while a
/// query touching the cell's min edge does. This matches how the builder
/// assigns entities to cells and keeps sibling cells disjoint.
fn cell_intersects(cell: &BoundingBox, query: &BoundingBox) -> bool {
    cell.min_x <= query.max_x
        && cell.max_x > query.min_x
        && cell.min_y <= query.max_y
        && cell.max_y > query.min_y
}

/// Adds `offset` to `target` while keeping `target.len() + sibling.len()`
/// within `cap`.
///
/// When the pair of sets is full, the largest offset across both sets is
/// evicted if the newcomer is smaller; otherwise the newcomer is dropped.
/// The surviving offsets are therefore always the `cap` numerically
/// smallest ones seen, independent of traversal order.
fn insert_capped(
    target: &mut BTreeSet<FileOffset>,
    sibling: &mut BTreeSet<FileOffset>,
    offset: FileOffset,
    cap: usize,
) {
    if target.contains(&offset) {
        return;
    }
    if target.len() + sibling.len() < cap {
        target.insert(offset);
        return;
    }

    let target_last = target.last().copied();
    let sibling_last = sibling.last().copied();
    let largest = match (target_last, sibling_last) {
        (Some(a), Some(b)) => a.max(b),
        (Some(a), None) => a,
        (None, Some(b)) => b,
        // cap is zero
        (None, None) => return,
    };
    if offset >= largest {
        return;
    }
    if target_last == Some(largest) {
        target.pop_last();
    } else {
        sibling.pop_last();
    }
    target.insert(offset);
}
