//! Core TileLayer implementation

use super::range::{load_order, LoadCenter, TileGrid, TileRange};
use super::render::{TilePlacement, TileRenderer};
use super::tree::TileTree;
use super::types::{TileLayerOptions, UrlFn};
use crate::core::bounds::Bounds;
use crate::core::geo::{Point, TileIndex};
use crate::core::view::{View, ViewBounds};
use crate::prelude::{Arc, HashMap, LocalBoxFuture, Rc, RefCell, Weak};
use crate::tiles::cache::TileCache;
use crate::tiles::image::TileImage;
use crate::tiles::queue::{Completion, FetchQueue, FetchRequest};
use crate::tiles::source::{parse_subdomains, TileFetcher, UrlTemplate};
use crate::tiles::tile::Tile;
use crate::{Error, Result};
use futures::FutureExt;

/// Queue handle for one tile fetch.
///
/// Two requests are the same when they carry the same tile object. A request
/// stays needed while that object is the one cached under its hash.
#[derive(Debug, Clone)]
pub struct TileRequest {
    pub(crate) tile: Rc<Tile>,
    cache: Weak<RefCell<TileCache>>,
}

impl TileRequest {
    pub fn tile(&self) -> &Rc<Tile> {
        &self.tile
    }
}

impl PartialEq for TileRequest {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.tile, &other.tile)
    }
}

impl FetchRequest for TileRequest {
    fn is_needed(&self) -> bool {
        let Some(cache) = self.cache.upgrade() else {
            return false;
        };
        let Ok(cache) = cache.try_borrow() else {
            return true;
        };
        cache
            .peek(self.tile.hash())
            .map_or(false, |cached| Rc::ptr_eq(cached, &self.tile))
    }
}

pub type TileOutput = Result<Arc<TileImage>>;

#[derive(Clone)]
enum DescriptorSource {
    Template(UrlTemplate),
    Function(UrlFn),
}

impl DescriptorSource {
    fn from_options(options: &TileLayerOptions) -> Result<Self> {
        if let Some(url_fn) = &options.hooks.url_fn {
            return Ok(Self::Function(Rc::clone(url_fn)));
        }
        if let Some(url) = &options.url {
            return Ok(Self::Template(UrlTemplate::parse(url)));
        }
        if let Some(base_url) = &options.base_url {
            return Ok(Self::Template(UrlTemplate::from_base_url(
                base_url,
                &options.image_format,
            )));
        }
        Err(Error::InvalidConfig(
            "one of url, base_url or a url function is required".to_string(),
        ))
    }

    fn descriptor(&self, source: &TileIndex, subdomains: &[String]) -> String {
        match self {
            Self::Template(template) => {
                template.descriptor(source.x, source.y, source.level, subdomains)
            }
            Self::Function(url_fn) => url_fn(source.x, source.y, source.level, subdomains),
        }
    }
}

/// Keeps the tiles of a pyramid in step with a view.
///
/// Each [`TileLayer::update`] works out the tiles the view needs, draws those
/// already fetched and queues the rest in load order. Fetch completions are
/// consumed by [`TileLayer::process_next`], [`TileLayer::settle`] or
/// [`TileLayer::process_ready`]; each one is checked against the current
/// cache and view before anything is drawn.
pub struct TileLayer {
    pub(crate) options: TileLayerOptions,
    pub(crate) grid: TileGrid,
    descriptors: DescriptorSource,
    pub(crate) cache: Rc<RefCell<TileCache>>,
    pub(crate) queue: FetchQueue<TileRequest, TileOutput>,
    fetcher: Rc<dyn TileFetcher>,
    renderer: Box<dyn TileRenderer>,
    pub(crate) active_tiles: HashMap<String, Rc<Tile>>,
    pub(crate) tree: TileTree,
    last_tile_set: Vec<TileIndex>,
    view: Option<View>,
    /// Unsettled tiles of each update still loading
    frames: Vec<Vec<Rc<Tile>>>,
    visible: bool,
    exited: bool,
}

impl TileLayer {
    /// Create a tile layer. Fails when the options do not validate.
    pub fn new<R>(
        options: TileLayerOptions,
        fetcher: Rc<dyn TileFetcher>,
        renderer: R,
    ) -> Result<Self>
    where
        R: TileRenderer + 'static,
    {
        options.validate()?;
        let cache_size = options.effective_cache_size();
        Ok(Self {
            grid: TileGrid::new(&options),
            descriptors: DescriptorSource::from_options(&options)?,
            cache: Rc::new(RefCell::new(TileCache::new(cache_size))),
            queue: FetchQueue::with_track(options.queue_size, cache_size),
            fetcher,
            renderer: Box::new(renderer),
            active_tiles: HashMap::default(),
            tree: TileTree::new(),
            last_tile_set: Vec::new(),
            view: None,
            frames: Vec::new(),
            visible: true,
            exited: false,
            options,
        })
    }

    pub fn options(&self) -> &TileLayerOptions {
        &self.options
    }

    /// The last view passed to [`TileLayer::update`]
    pub fn view(&self) -> Option<&View> {
        self.view.as_ref()
    }

    pub fn queue(&self) -> &FetchQueue<TileRequest, TileOutput> {
        &self.queue
    }

    pub fn tree(&self) -> &TileTree {
        &self.tree
    }

    pub fn cache_len(&self) -> usize {
        self.cache.borrow().len()
    }

    pub fn cache_size(&self) -> usize {
        self.cache.borrow().size()
    }

    /// Changes the cache capacity; evicted tiles leave the display too
    pub fn set_cache_size(&mut self, size: usize) {
        let evicted = self.cache.borrow_mut().set_size(size);
        for tile in evicted {
            self.remove(&tile);
        }
    }

    /// Looks a tile up in the cache without refreshing it
    pub fn cached_tile(&self, index: &TileIndex) -> Option<Rc<Tile>> {
        self.cache.borrow().peek(&index.hash_key()).cloned()
    }

    pub fn is_active(&self, index: &TileIndex) -> bool {
        self.active_tiles.contains_key(&index.hash_key())
    }

    /// Indices of the displayed tiles, coarse levels first
    pub fn active_indices(&self) -> Vec<TileIndex> {
        let mut indices: Vec<TileIndex> = self.active_tiles.values().map(|t| t.index()).collect();
        indices.sort_by_key(|i| (i.level, i.y, i.x));
        indices
    }

    /// Number of updates whose tiles are still loading
    pub fn pending_frames(&self) -> usize {
        self.frames.len()
    }

    /// Pyramid level shown for a continuous zoom
    pub fn level_for_zoom(&self, zoom: f64) -> u32 {
        self.grid.level_for_zoom(zoom)
    }

    fn view_origin(&self) -> Point {
        self.view.as_ref().map(|v| v.origin).unwrap_or_default()
    }

    /// The index of the tile under a world point at `level`
    pub fn tile_at_point(&self, point: &Point, level: u32) -> (i64, i64) {
        self.grid.tile_at_point(point, level, &self.view_origin())
    }

    /// Tiles at `level` touched by world `bounds`
    pub fn tile_range(&self, level: u32, bounds: &Bounds) -> TileRange {
        self.grid.tile_range(level, bounds, &self.view_origin())
    }

    pub fn tile_crop(&self, tile: &Tile) -> Option<Point> {
        self.grid.tile_crop(tile)
    }

    pub fn tile_world_bounds(&self, index: &TileIndex) -> Bounds {
        self.grid.tile_world_bounds(index)
    }

    /// The current view in pixels of the level it displays
    pub fn view_bounds(&self) -> Option<ViewBounds> {
        let view = self.view.as_ref()?;
        let level = self.grid.level_for_zoom(view.zoom);
        Some(ViewBounds::at_level(&view.bounds, view.zoom, level))
    }

    /// Descriptor for the data of a (wrapped) tile index
    pub fn descriptor(&self, source: &TileIndex) -> String {
        self.descriptors.descriptor(source, &self.options.subdomains)
    }

    fn create_tile(&self, index: TileIndex, source: TileIndex) -> Tile {
        Tile::new(
            index,
            source,
            self.grid.tile_size(),
            self.grid.overlap(),
            self.descriptor(&source),
        )
    }

    fn get_tile_cached(
        &self,
        index: TileIndex,
        source: TileIndex,
        defer_purge: bool,
        evicted: &mut Vec<Rc<Tile>>,
    ) -> Rc<Tile> {
        let cached = self.cache.borrow_mut().get(&index.hash_key());
        if let Some(tile) = cached {
            return tile;
        }
        let tile = Rc::new(self.create_tile(index, source));
        self.cache.borrow_mut().add(
            Rc::clone(&tile),
            |old| evicted.push(Rc::clone(old)),
            defer_purge,
        );
        tile
    }

    /// Collects the tiles needed for `bounds` from `min_level` (or
    /// `max_level` alone without `keep_lower`) up to `max_level`.
    ///
    /// Returns `None` when `only_if_changed` is set and the index list equals
    /// the previous one.
    pub(crate) fn get_tiles(
        &mut self,
        max_level: u32,
        bounds: &Bounds,
        sorted: bool,
        only_if_changed: bool,
    ) -> Option<Vec<Rc<Tile>>> {
        let keep_lower = self.options.keep_lower;
        let min_level = if keep_lower {
            self.options.min_level
        } else {
            max_level
        };
        let max_level = max_level.max(min_level);
        let origin = self.view_origin();

        let mut wanted: Vec<(TileIndex, TileIndex)> = Vec::new();
        let mut changed = false;
        let mut last_range = None;

        for level in min_level..=max_level {
            let mut range = self.grid.tile_range(level, bounds, &origin);
            let (nx, ny) = self.grid.tiles_at_zoom(level);

            if !self.options.wrap_x {
                range.start_x = range.start_x.max(0).min(nx - 1);
                range.end_x = range.end_x.max(0).min(nx - 1);
                if level == min_level && keep_lower {
                    range.start_x = 0;
                    range.end_x = nx - 1;
                }
            }
            if !self.options.wrap_y {
                range.start_y = range.start_y.max(0).min(ny - 1);
                range.end_y = range.end_y.max(0).min(ny - 1);
                if level == min_level && keep_lower {
                    range.start_y = 0;
                    range.end_y = ny - 1;
                }
            }

            for x in range.start_x..=range.end_x {
                for y in range.start_y..=range.end_y {
                    let index = TileIndex::new(x, y, level);
                    let source = self.grid.source_index(&index);
                    if !self.grid.is_valid(&source) {
                        continue;
                    }
                    if only_if_changed && wanted.len() < self.last_tile_set.len() {
                        changed = changed || self.last_tile_set[wanted.len()] != index;
                    }
                    wanted.push((index, source));
                }
            }
            last_range = Some(range);
        }

        if only_if_changed {
            if !changed && wanted.len() == self.last_tile_set.len() {
                return None;
            }
            self.last_tile_set = wanted.iter().map(|(index, _)| *index).collect();
        }

        if sorted {
            if let Some(range) = last_range {
                let center = LoadCenter::for_range(&range);
                wanted.sort_by(|a, b| load_order(&center, &a.0, &b.0));
            }
            self.queue.batch(true);
        }

        {
            let mut cache = self.cache.borrow_mut();
            if cache.size() < wanted.len() {
                log::info!("Increasing cache size to {}", wanted.len());
                cache.set_size(wanted.len());
            }
        }

        let mut evicted = Vec::new();
        let tiles: Vec<Rc<Tile>> = wanted
            .into_iter()
            .map(|(index, source)| self.get_tile_cached(index, source, true, &mut evicted))
            .collect();
        self.cache
            .borrow_mut()
            .purge(|old| evicted.push(Rc::clone(old)));
        for tile in evicted {
            self.remove(&tile);
        }
        Some(tiles)
    }

    /// Brings the layer in line with `view`.
    ///
    /// Fetched tiles are drawn at once; missing ones are queued nearest the
    /// view centre first. Fails only for a malformed view.
    pub fn update(&mut self, view: View) -> Result<()> {
        view.validate()?;
        let bounds = view.bounds.clone();
        let zoom = self.grid.level_for_zoom(view.zoom);
        self.view = Some(view);
        if !self.visible || self.exited {
            return Ok(());
        }

        let Some(tiles) = self.get_tiles(zoom, &bounds, true, true) else {
            return Ok(());
        };

        self.tree.clear();
        let mut pending: Vec<Rc<Tile>> = Vec::new();
        for tile in &tiles {
            if tile.fetched() {
                self.draw_tile(tile);
                self.set_tile_tree(tile);
            } else if !tile.queued() {
                self.enqueue(tile);
                tile.set_queued(true);
                pending.push(Rc::clone(tile));
            } else {
                // Already waiting: move it up to this update's priority.
                let request = self.request_for(tile);
                if self.queue.get(&request).is_some() {
                    self.enqueue(tile);
                }
                if !tile.failed() {
                    pending.push(Rc::clone(tile));
                }
            }
        }

        if pending.is_empty() {
            self.purge(zoom, true);
        } else {
            self.frames.push(pending);
        }
        Ok(())
    }

    fn request_for(&self, tile: &Rc<Tile>) -> TileRequest {
        TileRequest {
            tile: Rc::clone(tile),
            cache: Rc::downgrade(&self.cache),
        }
    }

    fn enqueue(&mut self, tile: &Rc<Tile>) {
        let request = self.request_for(tile);
        let fetcher = Rc::clone(&self.fetcher);
        let target = Rc::clone(tile);
        self.queue.add(
            request,
            move || -> LocalBoxFuture<'static, TileOutput> { target.fetch(&fetcher).boxed_local() },
            false,
        );
    }

    /// Records a drawn tile for coverage checks. Layers keeping lower levels
    /// never purge by coverage, so they skip it.
    fn set_tile_tree(&mut self, tile: &Rc<Tile>) {
        if self.options.keep_lower {
            return;
        }
        self.tree.insert(tile);
    }

    /// Whether drawn neighbours at the adjacent levels hide this tile
    pub fn is_covered(&self, tile: &Tile) -> bool {
        self.tree.is_covered(&tile.index())
    }

    /// Whether a tile may leave the display at rounded view level `zoom`.
    pub fn can_purge(
        &self,
        tile: &Tile,
        bounds: Option<&ViewBounds>,
        zoom: u32,
        done_loading: bool,
    ) -> bool {
        let level = tile.index().level;
        if self.options.keep_lower {
            if zoom < level && level != self.options.min_level {
                return true;
            }
            if level == self.options.min_level && !self.options.wrap_x && !self.options.wrap_y {
                return false;
            }
        } else if (done_loading || self.is_covered(tile)) && zoom != level {
            return true;
        }
        match bounds {
            Some(bounds) => self.grid.out_of_bounds(tile, bounds),
            None => false,
        }
    }

    /// Removes every displayed tile that [`TileLayer::can_purge`] allows.
    pub fn purge(&mut self, zoom: u32, done_loading: bool) {
        let Some(bounds) = self.view_bounds() else {
            return;
        };
        let snapshot: Vec<Rc<Tile>> = self.active_tiles.values().cloned().collect();
        for tile in snapshot {
            if self.can_purge(&tile, Some(&bounds), zoom, done_loading) {
                self.remove(&tile);
            }
        }
    }

    /// Displays a fetched tile, or moves it to the top if already shown.
    pub fn draw_tile(&mut self, tile: &Rc<Tile>) {
        let hash = tile.hash().to_string();
        let shown = self
            .active_tiles
            .get(&hash)
            .map(|current| Rc::ptr_eq(current, tile));
        match shown {
            Some(true) => self.renderer.move_to_top(tile),
            Some(false) => {
                // A recreated tile replaces the stale one under the same hash.
                self.remove(tile);
                self.render(tile);
            }
            None => self.render(tile),
        }
        self.active_tiles.insert(hash, Rc::clone(tile));
    }

    fn render(&mut self, tile: &Rc<Tile>) {
        let placement = TilePlacement {
            level: tile.index().level,
            bounds: self.grid.placement_bounds(tile, &self.view_origin()),
            crop: self.grid.tile_crop(tile),
        };
        self.renderer.draw_tile(tile, &placement);
    }

    /// Takes the tile displayed under this tile's hash off the display.
    pub fn remove(&mut self, tile: &Tile) -> Option<Rc<Tile>> {
        let removed = self.active_tiles.remove(tile.hash())?;
        self.renderer.remove_tile(&removed);
        Some(removed)
    }

    /// Removes all displayed tiles and forgets the coverage state
    pub fn clear(&mut self) -> Vec<Rc<Tile>> {
        let snapshot: Vec<Rc<Tile>> = self.active_tiles.values().cloned().collect();
        let removed = snapshot
            .iter()
            .filter_map(|tile| self.remove(tile))
            .collect();
        self.tree.clear();
        self.last_tile_set.clear();
        removed
    }

    /// Clears the display, the cache and all queued or running fetches
    pub fn reset(&mut self) {
        self.clear();
        self.cache.borrow_mut().clear();
        self.queue.clear();
        self.frames.clear();
    }

    /// Detaches the layer. Completions arriving later are ignored.
    pub fn exit(&mut self) {
        self.reset();
        self.exited = true;
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    /// Shows or hides the layer; showing it catches up with the last view
    pub fn set_visible(&mut self, visible: bool) -> Result<()> {
        if self.visible == visible {
            return Ok(());
        }
        self.visible = visible;
        match (visible, self.view.clone()) {
            (true, Some(view)) => self.update(view),
            _ => Ok(()),
        }
    }

    /// Switches to a new descriptor template and starts over
    pub fn set_url(&mut self, url: impl Into<String>) {
        let url = url.into();
        if self.options.hooks.url_fn.is_none() && self.options.url.as_deref() == Some(url.as_str())
        {
            return;
        }
        self.options.hooks.url_fn = None;
        self.descriptors = DescriptorSource::Template(UrlTemplate::parse(&url));
        self.options.url = Some(url);
        self.refresh();
    }

    /// Switches to a descriptor function and starts over
    pub fn set_url_fn<F>(&mut self, url_fn: F)
    where
        F: Fn(i64, i64, u32, &[String]) -> String + 'static,
    {
        let url_fn: UrlFn = Rc::new(url_fn);
        self.options.hooks.url_fn = Some(Rc::clone(&url_fn));
        self.descriptors = DescriptorSource::Function(url_fn);
        self.refresh();
    }

    /// Replaces the subdomain labels (comma separated, or one per character)
    pub fn set_subdomains(&mut self, subdomains: &str) -> Result<()> {
        let labels = parse_subdomains(subdomains);
        if labels.is_empty() || labels.iter().any(|s| s.is_empty()) {
            return Err(Error::InvalidConfig(format!(
                "invalid subdomains {:?}",
                subdomains
            )));
        }
        self.options.subdomains = labels;
        self.refresh();
        Ok(())
    }

    fn refresh(&mut self) {
        self.reset();
        if let Some(view) = self.view.clone() {
            if let Err(err) = self.update(view) {
                log::warn!("tile layer refresh failed: {}", err);
            }
        }
    }

    /// Fetches every tile needed for `bounds` up to `level`, bypassing the
    /// queue. The returned future resolves once all of them have settled.
    pub fn prefetch(
        &mut self,
        level: u32,
        bounds: &Bounds,
    ) -> LocalBoxFuture<'static, Vec<TileOutput>> {
        let tiles = self.get_tiles(level, bounds, true, false).unwrap_or_default();
        let fetches: Vec<_> = tiles.iter().map(|tile| tile.fetch(&self.fetcher)).collect();
        futures::future::join_all(fetches).boxed_local()
    }

    /// Waits for the next fetch to leave the queue and acts on it.
    ///
    /// Returns `false` once nothing is queued or running.
    pub async fn process_next(&mut self) -> bool {
        match self.queue.next_completion().await {
            Some(completion) => {
                self.handle_completion(completion);
                true
            }
            None => false,
        }
    }

    /// Drives fetches until the queue is idle
    pub async fn settle(&mut self) {
        while self.process_next().await {}
    }

    /// Handles every completion that is ready without waiting, as a frame
    /// loop would. Returns how many were handled.
    pub fn process_ready(&mut self) -> usize {
        let mut handled = 0;
        while let Some(Some(completion)) = self.queue.next_completion().now_or_never() {
            self.handle_completion(completion);
            handled += 1;
        }
        handled
    }

    fn handle_completion(&mut self, completion: Completion<TileRequest, TileOutput>) {
        match completion {
            Completion::Finished { request, output } => {
                if !self.exited {
                    self.tile_finished(&request.tile, output);
                }
                self.settle_frames(&request.tile);
            }
            Completion::Rejected { request } => {
                log::debug!("Skipped tile {} that is no longer needed", request.tile);
                self.settle_frames(&request.tile);
            }
        }
    }

    fn tile_finished(&mut self, tile: &Rc<Tile>, output: TileOutput) {
        if let Err(err) = output {
            log::warn!("Could not load tile at {}: {}", tile, err);
            if self
                .active_tiles
                .get(tile.hash())
                .map_or(false, |active| Rc::ptr_eq(active, tile))
            {
                self.remove(tile);
            }
            return;
        }

        let current = self.cache.borrow().peek(tile.hash()).cloned();
        if !current.map_or(false, |cached| Rc::ptr_eq(&cached, tile)) {
            log::debug!("Dropped tile {} that left the cache while loading", tile);
            return;
        }

        let Some(view) = self.view.as_ref() else {
            return;
        };
        let zoom = self.grid.level_for_zoom(view.zoom);
        let bounds = self.view_bounds();
        if self.can_purge(tile, bounds.as_ref(), zoom, false) {
            self.remove(tile);
            return;
        }
        self.draw_tile(tile);
        self.set_tile_tree(tile);
    }

    /// Marks a tile settled in every loading update and purges after each
    /// update whose tiles have all settled.
    ///
    /// Frames hold tile objects: a completion from a stale tile sharing the
    /// hash of a newer one settles nothing for the newer one.
    fn settle_frames(&mut self, tile: &Rc<Tile>) {
        let before = self.frames.len();
        for frame in &mut self.frames {
            frame.retain(|pending| !Rc::ptr_eq(pending, tile));
        }
        self.frames.retain(|frame| !frame.is_empty());
        if self.frames.len() == before || self.exited {
            return;
        }
        if let Some(view) = self.view.as_ref() {
            let zoom = self.grid.level_for_zoom(view.zoom);
            self.purge(zoom, true);
        }
    }
}

impl std::fmt::Debug for TileLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileLayer")
            .field("options", &self.options)
            .field("active_tiles", &self.active_tiles.len())
            .field("queue", &self.queue)
            .field("visible", &self.visible)
            .field("exited", &self.exited)
            .finish()
    }
}
