use serde::{Deserialize, Serialize};

/// An axis-aligned bounding box in index-native coordinate units.
///
/// The index makes no assumption about what the units mean (projected
/// meters, scaled degrees, tile units) beyond the axes being orthogonal
/// and y growing northward. All query-side geometry is reduced to
/// box-overlap tests on this type.
///
/// # Examples
///
/// ```rust
/// use atlas_index::BoundingBox;
///
/// let cell = BoundingBox::new(0.0, 0.0, 2.0, 2.0);
/// let query = BoundingBox::new(1.0, 1.0, 3.0, 3.0);
/// assert!(cell.intersects(&query));
/// ```
#[derive(Clone, Copy, PartialEq, Default, Debug, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Minimum X coordinate
    pub min_x: f64,
    /// Minimum Y coordinate
    pub min_y: f64,
    /// Maximum X coordinate
    pub max_x: f64,
    /// Maximum Y coordinate
    pub max_y: f64,
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BoundingBox({}, {}, {}, {})",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

impl BoundingBox {
    /// Creates a new bounding box from its minimum and maximum corners.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> BoundingBox {
        BoundingBox {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Creates a bounding box from its lower-left corner and its size.
    ///
    /// This is the form the quadtree descent uses: a cell is its origin
    /// plus the per-level cell dimensions.
    pub fn from_origin(x: f64, y: f64, width: f64, height: f64) -> BoundingBox {
        BoundingBox {
            min_x: x,
            min_y: y,
            max_x: x + width,
            max_y: y + height,
        }
    }

    /// Returns the width of the bounding box.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Returns the height of the bounding box.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Checks if this bounding box intersects another bounding box.
    ///
    /// Touching edges count as intersection.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    /// Checks if this bounding box fully contains another bounding box.
    pub fn contains(&self, other: &BoundingBox) -> bool {
        other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_y >= self.min_y
            && other.max_y <= self.max_y
    }

    /// Checks if this bounding box is valid (min <= max on both axes).
    pub fn is_valid(&self) -> bool {
        self.min_x <= self.max_x && self.min_y <= self.max_y
    }
}
