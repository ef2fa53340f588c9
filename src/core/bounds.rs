use crate::core::geo::Point;
use serde::{Deserialize, Serialize};

/// Represents a bounding box in world or pixel coordinates
///
/// `y` grows downwards, so `min` is the top-left corner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Point,
    pub max: Point,
}

impl Bounds {
    /// Creates new bounds from two points
    pub fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    /// Creates bounds from individual coordinates
    pub fn from_coords(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self::new(Point::new(min_x, min_y), Point::new(max_x, max_y))
    }

    /// Creates bounds from a center point and size
    pub fn from_center_and_size(center: Point, width: f64, height: f64) -> Self {
        let half_width = width / 2.0;
        let half_height = height / 2.0;
        Self::new(
            Point::new(center.x - half_width, center.y - half_height),
            Point::new(center.x + half_width, center.y + half_height),
        )
    }

    /// Gets the width of the bounds
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    /// Gets the height of the bounds
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// Gets the center point of the bounds
    pub fn center(&self) -> Point {
        Point::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
        )
    }

    /// Gets the four corner points of the bounds
    pub fn corners(&self) -> [Point; 4] {
        [
            self.min,                           // top-left
            Point::new(self.max.x, self.min.y), // top-right
            Point::new(self.min.x, self.max.y), // bottom-left
            self.max,                           // bottom-right
        ]
    }

    /// Returns the bounds scaled about the coordinate origin
    pub fn scaled(&self, factor: f64) -> Bounds {
        Bounds::new(self.min.multiply(factor), self.max.multiply(factor))
    }
}

/// Edges of one tile in pixel units of its level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TileBounds {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

impl TileBounds {
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    /// Shifts every edge by the given offset
    pub fn translated(&self, dx: f64, dy: f64) -> TileBounds {
        TileBounds {
            left: self.left + dx,
            right: self.right + dx,
            top: self.top + dy,
            bottom: self.bottom + dy,
        }
    }

    /// Multiplies every edge by the given factor
    pub fn scaled(&self, factor: f64) -> TileBounds {
        TileBounds {
            left: self.left * factor,
            right: self.right * factor,
            top: self.top * factor,
            bottom: self.bottom * factor,
        }
    }
}

impl From<TileBounds> for Bounds {
    fn from(bounds: TileBounds) -> Self {
        Bounds::from_coords(bounds.left, bounds.top, bounds.right, bounds.bottom)
    }
}
