pub mod cache;
pub mod image;
pub mod queue;
pub mod source;
pub mod tile;

// Re-exports for convenience
pub use cache::TileCache;
pub use queue::{Completion, FetchQueue, FetchRequest};
pub use source::{ByteSource, TileFetcher, UrlTemplate};
pub use tile::Tile;

#[cfg(feature = "image")]
pub use image::ImageFetcher;
#[cfg(feature = "http")]
pub use source::HttpSource;
