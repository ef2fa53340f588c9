use crate::core::bounds::TileBounds;
use crate::core::geo::Point;
use crate::prelude::Rc;
use crate::tiles::tile::Tile;

/// Where and how to show one tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TilePlacement {
    pub level: u32,
    /// Pixels of `level`, relative to the view origin
    pub bounds: TileBounds,
    /// Visible size when the tile crosses the data's maximum bounds
    pub crop: Option<Point>,
}

/// Turns fetched tiles into pixels. Implemented by the rendering backend.
pub trait TileRenderer {
    /// Show a fetched tile that is not displayed yet
    fn draw_tile(&mut self, tile: &Rc<Tile>, placement: &TilePlacement);

    /// Bring an already displayed tile to the front of its level
    fn move_to_top(&mut self, _tile: &Rc<Tile>) {}

    /// Release everything held for a displayed tile. Called once per tile
    /// leaving the display.
    fn remove_tile(&mut self, tile: &Rc<Tile>);
}
