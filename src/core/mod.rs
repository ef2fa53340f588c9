//! Core value types shared by the cache, the queue and the tile layer.

pub mod bounds;
pub mod constants;
pub mod geo;
pub mod view;
