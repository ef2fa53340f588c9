//! Level and index arithmetic: which tiles a view needs and where they sit.

use super::types::{TileHooks, TileLayerOptions};
use crate::core::bounds::{Bounds, TileBounds};
use crate::core::geo::{Point, TileIndex};
use crate::core::view::ViewBounds;
use crate::prelude::{HashMap, RefCell};
use crate::tiles::tile::Tile;
use std::cmp::Ordering;

/// A level's share of the view origin: the tile holding it and the pixel
/// offset inside that tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelOrigin {
    pub index: TileIndex,
    pub offset: Point,
}

/// An inclusive rectangle of tile indices at one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub level: u32,
    pub start_x: i64,
    pub start_y: i64,
    pub end_x: i64,
    pub end_y: i64,
}

impl TileRange {
    pub fn count(&self) -> usize {
        let w = (self.end_x - self.start_x + 1).max(0) as usize;
        let h = (self.end_y - self.start_y + 1).max(0) as usize;
        w * h
    }

    pub fn contains(&self, index: &TileIndex) -> bool {
        index.level == self.level
            && (self.start_x..=self.end_x).contains(&index.x)
            && (self.start_y..=self.end_y).contains(&index.y)
    }
}

/// Reference point for load ordering: the centre of the finest requested
/// range, and the level from which tiles load first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadCenter {
    pub x: f64,
    pub y: f64,
    pub level: u32,
    pub bottom_level: i64,
}

impl LoadCenter {
    /// Centre of `range`; levels whose tiles are still at least about one
    /// tile across the view load before coarser ones.
    pub fn for_range(range: &TileRange) -> Self {
        let mut bottom_level = range.level as i64;
        let mut num_tiles =
            ((range.end_x - range.start_x).max(range.end_y - range.start_y) + 1) as f64;
        while num_tiles >= 1.0 {
            bottom_level -= 1;
            num_tiles /= 2.0;
        }
        Self {
            x: (range.start_x + range.end_x) as f64 / 2.0,
            y: (range.start_y + range.end_y) as f64 / 2.0,
            level: range.level,
            bottom_level,
        }
    }
}

/// Orders tiles for loading.
///
/// Tiles at or above `bottom_level` come before the rest, then lower levels
/// before higher ones; within a level, nearest to the centre first.
pub fn load_order(center: &LoadCenter, a: &TileIndex, b: &TileIndex) -> Ordering {
    if a.level != b.level {
        let a_low = a.level as i64 >= center.bottom_level;
        let b_low = b.level as i64 >= center.bottom_level;
        if a_low != b_low {
            return if a_low {
                Ordering::Less
            } else {
                Ordering::Greater
            };
        }
        return a.level.cmp(&b.level);
    }

    // Centre expressed in a's level; the 0.5 terms keep it on tile centres.
    let scale = 2f64.powi(a.level as i32 - center.level as i32);
    let cx = (center.x + 0.5) * scale - 0.5;
    let cy = (center.y + 0.5) * scale - 0.5;
    let da = (a.x as f64 - cx).powi(2) + (a.y as f64 - cy).powi(2);
    let db = (b.x as f64 - cx).powi(2) + (b.y as f64 - cy).powi(2);
    da.partial_cmp(&db).unwrap_or(Ordering::Equal)
}

/// The tile grid of a layer: geometry, wrapping and per-level offsets.
#[derive(Debug)]
pub struct TileGrid {
    tile_width: f64,
    tile_height: f64,
    overlap: f64,
    min_level: u32,
    max_level: u32,
    wrap_x: bool,
    wrap_y: bool,
    hooks: TileHooks,
    offsets: RefCell<HashMap<u32, Point>>,
    max_bounds: RefCell<HashMap<u32, Option<Point>>>,
}

impl TileGrid {
    pub fn new(options: &TileLayerOptions) -> Self {
        Self {
            tile_width: options.tile_width as f64,
            tile_height: options.tile_height as f64,
            overlap: options.tile_overlap as f64,
            min_level: options.min_level,
            max_level: options.max_level,
            wrap_x: options.wrap_x,
            wrap_y: options.wrap_y,
            hooks: options.hooks.clone(),
            offsets: RefCell::new(HashMap::default()),
            max_bounds: RefCell::new(HashMap::default()),
        }
    }

    pub fn tile_size(&self) -> Point {
        Point::new(self.tile_width, self.tile_height)
    }

    pub fn overlap(&self) -> Point {
        Point::new(self.overlap, self.overlap)
    }

    /// Maps a continuous zoom to a level within `[min_level, max_level]`
    pub fn level_for_zoom(&self, zoom: f64) -> u32 {
        let level = (self.hooks.tile_rounding)(zoom);
        level.clamp(self.min_level as i64, self.max_level as i64) as u32
    }

    /// Number of tiles per axis at `level`
    pub fn tiles_at_zoom(&self, level: u32) -> (i64, i64) {
        match &self.hooks.tiles_at_zoom {
            Some(tiles_at_zoom) => tiles_at_zoom(level),
            None => {
                let n = 1i64 << level.min(62);
                (n, n)
            }
        }
    }

    /// Whether an index names a tile that exists
    pub fn is_valid(&self, index: &TileIndex) -> bool {
        if index.level < self.min_level || index.level > self.max_level {
            return false;
        }
        let (nx, ny) = self.tiles_at_zoom(index.level);
        (self.wrap_x || (0..nx).contains(&index.x)) && (self.wrap_y || (0..ny).contains(&index.y))
    }

    /// The index a displayed tile loads its data from
    pub fn source_index(&self, index: &TileIndex) -> TileIndex {
        let (nx, ny) = self.tiles_at_zoom(index.level);
        let mut source = *index;
        if self.wrap_x && nx > 0 {
            source.x = index.x.rem_euclid(nx);
        }
        if self.wrap_y && ny > 0 {
            source.y = index.y.rem_euclid(ny);
        }
        source
    }

    /// Pixel offset of a level's origin, computed once per level
    pub fn tile_offset(&self, level: u32) -> Point {
        let Some(offset_fn) = &self.hooks.tile_offset else {
            return Point::default();
        };
        *self
            .offsets
            .borrow_mut()
            .entry(level)
            .or_insert_with(|| offset_fn(level))
    }

    /// Pixel extent of the data at a level, if limited
    pub fn tiles_max_bounds(&self, level: u32) -> Option<Point> {
        let max_bounds_fn = self.hooks.tiles_max_bounds.as_ref()?;
        *self
            .max_bounds
            .borrow_mut()
            .entry(level)
            .or_insert_with(|| Some(max_bounds_fn(level)).filter(|p| p.is_finite()))
    }

    /// Locates the view origin at `level`
    pub fn origin(&self, level: u32, view_origin: &Point) -> LevelOrigin {
        let origin = view_origin.multiply(2f64.powi(level as i32));
        let index = TileIndex::new(
            (origin.x / self.tile_width).floor() as i64,
            (origin.y / self.tile_height).floor() as i64,
            level,
        );
        // The only subtraction of large absolute pixel values.
        let offset = Point::new(
            origin.x - self.tile_width * index.x as f64,
            origin.y - self.tile_height * index.y as f64,
        );
        LevelOrigin { index, offset }
    }

    /// The index of the tile under a world point at `level`
    pub fn tile_at_point(&self, point: &Point, level: u32, view_origin: &Point) -> (i64, i64) {
        let o = self.origin(level, view_origin);
        let mut p = point
            .subtract(view_origin)
            .multiply(2f64.powi(level as i32));
        if p.x.is_nan() {
            p.x = 0.0;
        }
        if p.y.is_nan() {
            p.y = 0.0;
        }
        let p = p.add(&self.tile_offset(level));
        (
            (o.index.x as f64 + (o.offset.x + p.x) / self.tile_width).floor() as i64,
            (o.index.y as f64 + (o.offset.y + p.y) / self.tile_height).floor() as i64,
        )
    }

    /// The tiles at `level` touched by world `bounds`, not yet clamped
    pub fn tile_range(&self, level: u32, bounds: &Bounds, view_origin: &Point) -> TileRange {
        let corners = bounds
            .corners()
            .map(|corner| self.tile_at_point(&corner, level, view_origin));
        TileRange {
            level,
            start_x: corners.iter().map(|c| c.0).min().unwrap_or(0),
            start_y: corners.iter().map(|c| c.1).min().unwrap_or(0),
            end_x: corners.iter().map(|c| c.0).max().unwrap_or(0),
            end_y: corners.iter().map(|c| c.1).max().unwrap_or(0),
        }
    }

    /// Where a tile is drawn: pixels of its level relative to the view origin
    pub fn placement_bounds(&self, tile: &Tile, view_origin: &Point) -> TileBounds {
        let level = tile.index().level;
        let origin = self.origin(level, view_origin);
        let to = self.tile_offset(level);
        tile.bounds(&origin.index, &origin.offset)
            .translated(-to.x, -to.y)
    }

    /// Visible size of a tile crossing the maximum data bounds
    pub fn tile_crop(&self, tile: &Tile) -> Option<Point> {
        let max = self.tiles_max_bounds(tile.index().level)?;
        let edges = tile.edges();
        if edges.right > max.x || edges.bottom > max.y {
            Some(Point::new(
                (max.x.min(edges.right) - edges.left).max(0.0),
                (max.y.min(edges.bottom) - edges.top).max(0.0),
            ))
        } else {
            None
        }
    }

    /// A tile's footprint in world coordinates
    pub fn tile_world_bounds(&self, index: &TileIndex) -> Bounds {
        let tile = Tile::new(*index, *index, self.tile_size(), self.overlap(), "");
        let to = self.tile_offset(index.level);
        let unit = 2f64.powi(-(index.level as i32));
        Bounds::from(tile.edges().translated(-to.x, -to.y)).scaled(unit)
    }

    /// Whether a tile lies entirely outside the view
    pub fn out_of_bounds(&self, tile: &Tile, view: &ViewBounds) -> bool {
        let level = tile.index().level;
        let to = self.tile_offset(level);
        let scale = 2f64.powi(view.level as i32 - level as i32);
        let e = tile.edges();
        (e.bottom - to.y) * scale < view.top
            || (e.left - to.x) * scale > view.right
            || (e.top - to.y) * scale > view.bottom
            || (e.right - to.x) * scale < view.left
    }
}
