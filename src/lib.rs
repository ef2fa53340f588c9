//! # Tile Pyramid
//!
//! A client-side manager for multi-resolution tile pyramids.
//!
//! Given a view (continuous zoom plus world bounds) the [`TileLayer`] works out
//! which tiles of which pyramid levels are needed, creates them through an LRU
//! [`TileCache`], schedules their fetches through a bounded, reprioritisable
//! [`FetchQueue`], hands fetched tiles to a [`TileRenderer`] and purges tiles
//! that left the view or are covered by neighbouring levels.
//!
//! Everything runs on one thread. Fetches are futures driven by the queue;
//! the caller awaits [`TileLayer::process_next`] or polls
//! [`TileLayer::process_ready`] once per frame.

pub mod core;
pub mod layers;
pub mod prelude;
pub mod tiles;

// Re-export public API
pub use core::{
    bounds::{Bounds, TileBounds},
    geo::{Point, TileIndex},
    view::{View, ViewBounds},
};

pub use layers::tile::{
    TileHooks, TileLayer, TileLayerOptions, TilePlacement, TileRenderer, TileTree,
};

pub use tiles::{
    cache::TileCache,
    image::TileImage,
    queue::{Completion, FetchQueue, FetchRequest},
    source::{TileFetcher, UrlTemplate},
    tile::Tile,
};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types
///
/// Errors are `Clone` so that one fetch result can be handed to every
/// caller awaiting the same tile.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Invalid view: {0}")]
    InvalidView(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to fetch tile from {descriptor}: {reason}")]
    Fetch { descriptor: String, reason: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Network error: {0}")]
    Http(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Install an `env_logger` subscriber for the `log` records emitted here.
///
/// Safe to call more than once; later calls are ignored.
#[cfg(feature = "debug")]
pub fn init_logging() {
    let _ = env_logger::builder().try_init();
}
