//! # Atlas Index - Quadtree Area Index for Map Data
//!
//! This crate reads and queries the disk-resident spatial index of a
//! map-rendering/routing application. The index file is built offline by a
//! separate tool; this crate owns the read side:
//!
//! - **Eager Load**: the whole quadtree is decoded into memory once at
//!   startup, fail-closed on any I/O or format error
//! - **Verified Structure**: level geometry and child references are
//!   checked during load, so queries can assume a sound tree
//! - **Bounded Queries**: range queries filter by entity type and cap the
//!   number of returned references per kind
//! - **Deterministic Results**: offsets come back as ascending ordered
//!   sets, and cap truncation keeps the smallest offsets
//! - **Lock-Free Reads**: the loaded index is immutable; any number of
//!   threads may query it concurrently through `&self`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use atlas_index::{AreaIndex, BoundingBox, StyleConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let index = AreaIndex::open("region.areaidx")?;
//!
//! let style = StyleConfig::with_way_types([3, 4, 5]);
//! let viewport = BoundingBox::new(1200.0, 3400.0, 1300.0, 3500.0);
//! let offsets = index.get_offsets_for_style(&style, &viewport, 10, 2000, 4000);
//!
//! // Offsets reference records in the entity-data file; resolving them is
//! // the caller's concern.
//! println!(
//!     "{} ways, {} areas",
//!     offsets.way_count(),
//!     offsets.area_count()
//! );
//! # Ok(())
//! # }
//! ```

pub mod area_index;
pub mod bounding_box;
pub mod style;

pub use area_index::{
    AreaIndex, FileOffset, IndexError, IndexResult, IndexStatistics, LevelStatistics,
    QueryOffsets, TypeId,
};
pub use bounding_box::BoundingBox;
pub use style::{StyleConfig, TypeSet};
