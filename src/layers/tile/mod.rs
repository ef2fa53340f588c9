//! Tile layer: level selection, load ordering and coverage-based purging
//!
//! - `layer`: the orchestrating [`TileLayer`]
//! - `range`: index arithmetic for views, levels and wrapping
//! - `tree`: drawn-tile lookup for coverage checks
//! - `types`: options and closure hooks
//! - `render`: the rendering backend seam

pub mod layer;
pub mod range;
pub mod render;
pub mod tree;
pub mod types;

pub use layer::{TileLayer, TileOutput, TileRequest};
pub use range::{LevelOrigin, LoadCenter, TileGrid, TileRange};
pub use render::{TilePlacement, TileRenderer};
pub use tree::TileTree;
pub use types::{TileHooks, TileLayerOptions};
