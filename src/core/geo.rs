use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents a point in world, level-pixel or screen coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn add(&self, other: &Point) -> Point {
        Point::new(self.x + other.x, self.y + other.y)
    }

    pub fn subtract(&self, other: &Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }

    pub fn multiply(&self, scalar: f64) -> Point {
        Point::new(self.x * scalar, self.y * scalar)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Default for Point {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Grid position of one tile in the pyramid.
///
/// `x` and `y` are signed so that indices produced by a wrapping layer keep
/// their display position (`x = -1` is the column left of `x = 0`). The
/// per-axis tile count of a level is decided by the layer, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileIndex {
    pub x: i64,
    pub y: i64,
    pub level: u32,
}

impl TileIndex {
    pub fn new(x: i64, y: i64, level: u32) -> Self {
        Self { x, y, level }
    }

    /// The `level_y_x` key shared by the tile cache and the coverage tree.
    ///
    /// Distinct indices always give distinct keys: the three integers are
    /// written in full and separated by a character no integer contains.
    pub fn hash_key(&self) -> String {
        format!("{}_{}_{}", self.level, self.y, self.x)
    }

    /// Gets the parent tile at the next coarser level
    pub fn parent(&self) -> Option<TileIndex> {
        if self.level == 0 {
            None
        } else {
            Some(TileIndex::new(
                self.x.div_euclid(2),
                self.y.div_euclid(2),
                self.level - 1,
            ))
        }
    }

    /// Gets the four tiles covering this one at the next finer level
    pub fn children(&self) -> [TileIndex; 4] {
        let level = self.level + 1;
        [
            TileIndex::new(self.x * 2, self.y * 2, level),
            TileIndex::new(self.x * 2 + 1, self.y * 2, level),
            TileIndex::new(self.x * 2, self.y * 2 + 1, level),
            TileIndex::new(self.x * 2 + 1, self.y * 2 + 1, level),
        ]
    }
}

impl fmt::Display for TileIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hash_key())
    }
}
