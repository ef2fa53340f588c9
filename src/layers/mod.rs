//! Layers built on the tile pyramid.

pub mod tile;
