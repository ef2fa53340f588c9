//! Core constants derived from common web-map tile pyramid conventions.
//! Keeping them in a single place makes it easier to tweak engine-wide magic numbers.

/// Default tile width and height in pixels.
pub const TILE_SIZE: u32 = 256;

/// Default finest pyramid level.
pub const DEFAULT_MAX_LEVEL: u32 = 18;

/// Highest level whose per-axis tile count still fits the index arithmetic.
pub const MAX_SUPPORTED_LEVEL: u32 = 62;

/// Concurrent fetches granted by the queue. Browsers allowed six requests per
/// host when the layer was tuned, so the default mirrors that.
pub const DEFAULT_QUEUE_SIZE: usize = 6;

/// Tile cache capacity when coarser levels are retained.
pub const CACHE_SIZE_KEEP_LOWER: usize = 600;

/// Tile cache capacity when only the current level is shown.
pub const CACHE_SIZE_SINGLE_LEVEL: usize = 200;

/// Capacity used by a bare `TileCache` when none (or zero) is given.
pub const DEFAULT_CACHE_SIZE: usize = 64;

/// Queue length above which queued requests are tested for staleness.
pub const DEFAULT_QUEUE_TRACK: usize = 600;

/// Default subdomain labels used to shard tile requests.
pub const DEFAULT_SUBDOMAINS: &str = "abc";
