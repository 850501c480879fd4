//! Style configuration boundary.
//!
//! The style layer of the host application decides which entity types are
//! visible at a given magnification; the index only ever performs
//! set-membership tests against the resulting [`TypeSet`]. `StyleConfig`
//! here is the hand-off point: a registry of the way types the style
//! considers drawable, from which the query filter is derived. Style *rules*
//! (magnification thresholds, per-layer toggles) stay outside this crate.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::area_index::TypeId;

/// An ordered set of entity type ids used as a query filter.
///
/// Iteration and membership are over ascending `TypeId`, matching the order
/// in which type groups are laid out inside index entries.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeSet {
    types: BTreeSet<TypeId>,
}

impl TypeSet {
    /// Creates an empty type set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a type id to the set.
    pub fn insert(&mut self, type_id: TypeId) {
        self.types.insert(type_id);
    }

    /// Checks whether a type id is a member of the set.
    pub fn contains(&self, type_id: TypeId) -> bool {
        self.types.contains(&type_id)
    }

    /// Returns the number of type ids in the set.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Checks whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Iterates the member type ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.types.iter().copied()
    }
}

impl FromIterator<TypeId> for TypeSet {
    fn from_iter<I: IntoIterator<Item = TypeId>>(iter: I) -> Self {
        Self {
            types: iter.into_iter().collect(),
        }
    }
}

/// The subset of the host application's style configuration the index
/// queries against.
///
/// Callers typically populate this once per style sheet and derive the
/// per-query filter with [`StyleConfig::way_types`]; the convenience entry
/// point [`crate::AreaIndex::get_offsets_for_style`] does exactly that.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleConfig {
    way_types: TypeSet,
}

impl StyleConfig {
    /// Creates a style configuration with no visible way types.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a style configuration from the way types the style draws.
    pub fn with_way_types<I: IntoIterator<Item = TypeId>>(way_types: I) -> Self {
        Self {
            way_types: way_types.into_iter().collect(),
        }
    }

    /// Marks a way type as visible.
    pub fn enable_way_type(&mut self, type_id: TypeId) {
        self.way_types.insert(type_id);
    }

    /// The set of visible way types, usable directly as a query filter.
    pub fn way_types(&self) -> &TypeSet {
        &self.way_types
    }

    /// Checks whether the style draws ways of the given type.
    pub fn is_way_type_enabled(&self, type_id: TypeId) -> bool {
        self.way_types.contains(type_id)
    }
}
