//! Core types and data structures of the area index.
//!
//! This module defines the types used throughout the index:
//! - Error and result types
//! - File offset, type id and entry id aliases
//! - Quadtree node and level representations
//! - Query result container
//! - Statistics structures

use std::collections::BTreeSet;
use std::io;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

use crate::bounding_box::BoundingBox;

use super::index_constants::{CHILD_COUNT, INDEX_MAGIC, INDEX_VERSION, MAX_LEVEL_LIMIT};

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while loading an area index.
///
/// Queries cannot fail: every error channel of this crate is surfaced
/// through [`crate::AreaIndex::open`], and on any error no index value
/// exists at all.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("index format error: {0}")]
    Format(String),
}

impl IndexError {
    pub(crate) fn format(detail: impl Into<String>) -> Self {
        IndexError::Format(detail.into())
    }
}

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;

// ============================================================================
// Identifier Aliases
// ============================================================================

/// Byte position of a record in the index file or the entity-data file.
///
/// Offsets are opaque to the index; callers resolve the offsets a query
/// returns against the entity-data file. `0` is reserved as the "no such
/// child/record" sentinel.
pub type FileOffset = u64;

/// Small unsigned integer classifying an entity's semantic kind (road
/// class, building, ...), assigned by the host application's type registry.
pub type TypeId = u16;

/// Dense slot index of an entry within its level's arena.
///
/// Entry ids replace raw child file offsets after loading; they are never
/// exposed to callers.
pub type EntryId = u32;

// ============================================================================
// Quadrants
// ============================================================================

/// The four geographic quadrants of a quadtree cell, in child-slot order.
///
/// The y axis grows northward, so the north quadrants are the upper half of
/// the parent cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quadrant {
    NorthWest,
    NorthEast,
    SouthWest,
    SouthEast,
}

impl Quadrant {
    /// All quadrants in child-slot order.
    pub const ALL: [Quadrant; CHILD_COUNT] = [
        Quadrant::NorthWest,
        Quadrant::NorthEast,
        Quadrant::SouthWest,
        Quadrant::SouthEast,
    ];

    /// Horizontal cell step (0 = west half, 1 = east half).
    pub fn dx(self) -> u32 {
        match self {
            Quadrant::NorthWest | Quadrant::SouthWest => 0,
            Quadrant::NorthEast | Quadrant::SouthEast => 1,
        }
    }

    /// Vertical cell step (0 = south half, 1 = north half).
    pub fn dy(self) -> u32 {
        match self {
            Quadrant::SouthWest | Quadrant::SouthEast => 0,
            Quadrant::NorthWest | Quadrant::NorthEast => 1,
        }
    }
}

// ============================================================================
// Node and Level Types
// ============================================================================

/// Inline-friendly list of entity references anchored at a node.
pub type OffsetList = SmallVec<[FileOffset; 4]>;

/// Way references of one entity type anchored at a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedOffsets {
    pub type_id: TypeId,
    pub offsets: OffsetList,
}

/// One quadtree node.
///
/// Entities are anchored at the shallowest node whose cell fully contains
/// their bounding box, so interior nodes carry references just like the
/// deepest ones. Child links are dense [`EntryId`]s into the next level's
/// arena, resolved from raw file offsets during load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexEntry {
    /// Children in quadrant order NW, NE, SW, SE; `None` = empty quadrant.
    pub children: [Option<EntryId>; CHILD_COUNT],
    /// Plain way references, grouped by type in ascending type order.
    pub ways: Vec<TypedOffsets>,
    /// Relation-member way references, same shape as `ways`.
    pub rel_ways: Vec<TypedOffsets>,
    /// Area references.
    pub areas: OffsetList,
    /// Relation-member area references.
    pub rel_areas: OffsetList,
}

/// All entries of one quadtree depth, keyed by their file position.
///
/// The insertion-ordered map doubles as the level's arena: an entry's
/// [`EntryId`] is its slot index, and the original file offset is retained
/// only as the key (for diagnostics), never as a live pointer.
pub type IndexLevel = IndexMap<FileOffset, IndexEntry>;

// ============================================================================
// File Header
// ============================================================================

/// Decoded index file header.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHeader {
    pub magic: u32,
    pub version: u32,
    /// Deepest level present; levels are `0..=max_level`.
    pub max_level: u32,
    /// Cell width per level, in index-native units.
    pub cell_width: Vec<f64>,
    /// Cell height per level.
    pub cell_height: Vec<f64>,
}

impl IndexHeader {
    /// Checks magic, version and level-count plausibility.
    ///
    /// This is the subset of validation possible before the cell arrays
    /// have been read; the loader runs it before the declared level count
    /// sizes any allocation.
    pub fn validate_identity(&self) -> IndexResult<()> {
        if self.magic != INDEX_MAGIC {
            return Err(IndexError::format(format!(
                "bad magic 0x{:08x}, not an area index file",
                self.magic
            )));
        }
        if self.version != INDEX_VERSION {
            return Err(IndexError::format(format!(
                "unsupported format version {}",
                self.version
            )));
        }
        if self.max_level > MAX_LEVEL_LIMIT {
            return Err(IndexError::format(format!(
                "implausible level count {} (limit {})",
                self.max_level + 1,
                MAX_LEVEL_LIMIT + 1
            )));
        }
        Ok(())
    }

    /// Validates the full header: identity plus the strict-quadtree cell
    /// geometry (each level must halve both cell dimensions).
    pub fn validate(&self) -> IndexResult<()> {
        self.validate_identity()?;

        let levels = self.max_level as usize + 1;
        if self.cell_width.len() != levels || self.cell_height.len() != levels {
            return Err(IndexError::format(
                "cell dimension arrays do not match the declared level count",
            ));
        }
        if self.cell_width[0] <= 0.0 || self.cell_height[0] <= 0.0 {
            return Err(IndexError::format("non-positive root cell dimensions"));
        }
        for level in 0..=self.max_level as usize {
            let factor = (1u64 << level) as f64;
            if self.cell_width[level] != self.cell_width[0] / factor
                || self.cell_height[level] != self.cell_height[0] / factor
            {
                return Err(IndexError::format(format!(
                    "cell dimensions at level {} do not halve the parent level",
                    level
                )));
            }
        }
        Ok(())
    }

    /// The root cell, which is the index's full covering bounding box.
    ///
    /// The index origin is fixed at `(0, 0)` in native units.
    pub fn covering_bbox(&self) -> BoundingBox {
        BoundingBox::from_origin(0.0, 0.0, self.cell_width[0], self.cell_height[0])
    }
}

// ============================================================================
// Query Result
// ============================================================================

/// The four offset sets a range query yields.
///
/// Each set iterates in ascending [`FileOffset`] order; that ordering is a
/// stated contract (it makes cap truncation reproducible), not an accident
/// of the container. Callers resolve the offsets against the entity-data
/// file out-of-band.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOffsets {
    /// Plain way references matching the type filter.
    pub way_ways: BTreeSet<FileOffset>,
    /// Relation-member way references matching the type filter.
    pub relation_ways: BTreeSet<FileOffset>,
    /// Area references at depths up to the query's area level bound.
    pub way_areas: BTreeSet<FileOffset>,
    /// Relation-member area references, same depth bound.
    pub relation_areas: BTreeSet<FileOffset>,
}

impl QueryOffsets {
    /// Combined size of both way output sets.
    pub fn way_count(&self) -> usize {
        self.way_ways.len() + self.relation_ways.len()
    }

    /// Combined size of both area output sets.
    pub fn area_count(&self) -> usize {
        self.way_areas.len() + self.relation_areas.len()
    }

    /// Checks whether the query matched nothing at all.
    pub fn is_empty(&self) -> bool {
        self.way_count() == 0 && self.area_count() == 0
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Per-level occupancy figures, see [`IndexStatistics`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelStatistics {
    pub level: u32,
    /// Number of nodes present at this level.
    pub entries: usize,
    /// Plain way references anchored at this level.
    pub way_refs: usize,
    /// Relation-member way references.
    pub relation_way_refs: usize,
    /// Area references.
    pub area_refs: usize,
    /// Relation-member area references.
    pub relation_area_refs: usize,
    /// Present nodes over the level's 4^level cell capacity.
    pub occupancy: f64,
}

/// Diagnostic snapshot of a loaded index.
///
/// Purely informational; computing it never mutates the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStatistics {
    pub max_level: u32,
    pub total_entries: usize,
    pub covering_bbox: BoundingBox,
    pub levels: Vec<LevelStatistics>,
}
