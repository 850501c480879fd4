//! Quadtree area index: on-disk format, loader and query engine.
//!
//! The index file is produced by an out-of-tree builder and read here:
//! - One-shot eager load into per-level arenas ([`AreaIndex::open`])
//! - Fail-closed parsing with full referential-integrity verification
//! - Pruned depth-first range queries with type filters and result caps
//! - Lock-free concurrent reads over the immutable loaded tree

pub mod index_constants;
pub mod index_scanner;
pub mod index_types;
mod index_impl;
mod index_loader;

pub use index_impl::AreaIndex;
pub use index_types::{
    EntryId, FileOffset, IndexEntry, IndexError, IndexHeader, IndexLevel, IndexResult,
    IndexStatistics, LevelStatistics, OffsetList, Quadrant, QueryOffsets, TypeId, TypedOffsets,
};
