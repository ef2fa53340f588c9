use crate::core::bounds::TileBounds;
use crate::core::constants::TILE_SIZE;
use crate::core::geo::{Point, TileIndex};
use crate::prelude::{Arc, Cell, LocalBoxFuture, Rc, RefCell};
use crate::tiles::image::TileImage;
use crate::tiles::source::TileFetcher;
use crate::Result;
use futures::future::{FutureExt, Shared};
use once_cell::unsync::OnceCell;
use std::fmt;

/// The shared completion of one tile fetch. Every clone resolves to the same
/// result.
pub type TileFetch = Shared<LocalBoxFuture<'static, Result<Arc<TileImage>>>>;

/// One cell of one pyramid level.
///
/// The index and geometry never change; the payload is written once when the
/// fetch succeeds. A tile owns at most one fetch operation over its lifetime.
pub struct Tile {
    index: TileIndex,
    /// Index the descriptor was built from (the wrapped position)
    source: TileIndex,
    size: Point,
    overlap: Point,
    descriptor: String,
    hash: String,
    image: OnceCell<Arc<TileImage>>,
    failed: Cell<bool>,
    queued: Cell<bool>,
    fetch: RefCell<Option<TileFetch>>,
}

impl Tile {
    pub fn new(
        index: TileIndex,
        source: TileIndex,
        size: Point,
        overlap: Point,
        descriptor: impl Into<String>,
    ) -> Self {
        Self {
            hash: index.hash_key(),
            index,
            source,
            size,
            overlap,
            descriptor: descriptor.into(),
            image: OnceCell::new(),
            failed: Cell::new(false),
            queued: Cell::new(false),
            fetch: RefCell::new(None),
        }
    }

    /// A 256 pixel tile without overlap whose source is its own index
    pub fn with_defaults(index: TileIndex, descriptor: impl Into<String>) -> Self {
        let size = Point::new(TILE_SIZE as f64, TILE_SIZE as f64);
        Self::new(index, index, size, Point::default(), descriptor)
    }

    pub fn index(&self) -> TileIndex {
        self.index
    }

    pub fn source(&self) -> TileIndex {
        self.source
    }

    pub fn size(&self) -> Point {
        self.size
    }

    pub fn overlap(&self) -> Point {
        self.overlap
    }

    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    /// The `level_y_x` key used by the cache and the coverage tree
    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn fetched(&self) -> bool {
        self.image.get().is_some()
    }

    pub fn failed(&self) -> bool {
        self.failed.get()
    }

    pub fn image(&self) -> Option<Arc<TileImage>> {
        self.image.get().cloned()
    }

    /// Whether the layer has handed this tile to the fetch queue
    pub fn queued(&self) -> bool {
        self.queued.get()
    }

    pub(crate) fn set_queued(&self, queued: bool) {
        self.queued.set(queued);
    }

    /// Starts the fetch, or returns the one already started.
    ///
    /// The returned future is shared: calling this again before or after
    /// completion never issues a second request and every caller sees the
    /// same result. The payload is stored on the tile as the fetch resolves.
    pub fn fetch(self: &Rc<Self>, fetcher: &Rc<dyn TileFetcher>) -> TileFetch {
        if let Some(fetch) = self.fetch.borrow().as_ref() {
            return fetch.clone();
        }

        let fetch = match self.image.get() {
            Some(image) => futures::future::ready(Ok(Arc::clone(image)))
                .boxed_local()
                .shared(),
            None => {
                let tile = Rc::downgrade(self);
                let fetcher = Rc::clone(fetcher);
                let descriptor = self.descriptor.clone();
                async move {
                    let result = fetcher.fetch(&descriptor).await.map(Arc::new);
                    // The tile may have been dropped by everyone while the
                    // fetch was in flight.
                    if let Some(tile) = tile.upgrade() {
                        match &result {
                            Ok(image) => {
                                let _ = tile.image.set(Arc::clone(image));
                            }
                            Err(_) => tile.failed.set(true),
                        }
                    }
                    result
                }
                .boxed_local()
                .shared()
            }
        };

        *self.fetch.borrow_mut() = Some(fetch.clone());
        fetch
    }

    /// Whether a fetch has been started
    pub fn fetch_started(&self) -> bool {
        self.fetch.borrow().is_some()
    }

    /// Bounds relative to a shared origin tile and a sub-tile pixel shift.
    ///
    /// All tiles of a level measured against the same origin line up without
    /// subtracting large absolute pixel values.
    pub fn bounds(&self, origin: &TileIndex, shift: &Point) -> TileBounds {
        let left = self.size.x * (self.index.x - origin.x) as f64 - self.overlap.x - shift.x;
        let top = self.size.y * (self.index.y - origin.y) as f64 - self.overlap.y - shift.y;
        TileBounds {
            left,
            right: left + self.size.x + self.overlap.x * 2.0,
            top,
            bottom: top + self.size.y + self.overlap.y * 2.0,
        }
    }

    /// Edges in absolute pixels of the tile's level, overlap included
    pub fn edges(&self) -> TileBounds {
        TileBounds {
            left: self.size.x * self.index.x as f64 - self.overlap.x,
            right: self.size.x * (self.index.x + 1) as f64 + self.overlap.x,
            top: self.size.y * self.index.y as f64 - self.overlap.y,
            bottom: self.size.y * (self.index.y + 1) as f64 + self.overlap.y,
        }
    }
}

impl PartialEq for Tile {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for Tile {}

impl std::hash::Hash for Tile {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

impl fmt::Debug for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tile")
            .field("index", &self.index)
            .field("source", &self.source)
            .field("descriptor", &self.descriptor)
            .field("fetched", &self.fetched())
            .field("failed", &self.failed())
            .finish()
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hash)
    }
}
