//! Shared fakes for the integration tests: fetchers that either answer at
//! once or wait for the test, and a renderer that records its calls.
#![allow(dead_code)]

use async_trait::async_trait;
use futures::channel::oneshot;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tile_pyramid::prelude::*;
use tile_pyramid::tiles::source::fetch_error;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Options for a layer whose descriptors are `z/x/y`
pub fn options() -> TileLayerOptions {
    TileLayerOptions::default().with_url("{z}/{x}/{y}")
}

/// Options for a single-level layer without wrapping
pub fn single_level() -> TileLayerOptions {
    TileLayerOptions {
        keep_lower: false,
        wrap_x: false,
        ..options()
    }
}

pub fn view(zoom: f64, left: f64, top: f64, right: f64, bottom: f64) -> View {
    View::new(zoom, Bounds::from_coords(left, top, right, bottom))
}

/// Answers every fetch at once; descriptors listed in `failing` fail.
#[derive(Default)]
pub struct ImmediateFetcher {
    pub calls: RefCell<Vec<String>>,
    pub failing: RefCell<Vec<String>>,
}

impl ImmediateFetcher {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn failing(descriptors: &[&str]) -> Rc<Self> {
        let fetcher = Self::default();
        fetcher
            .failing
            .borrow_mut()
            .extend(descriptors.iter().map(|d| d.to_string()));
        Rc::new(fetcher)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, descriptor: &str) -> usize {
        self.calls.borrow().iter().filter(|d| *d == descriptor).count()
    }
}

#[async_trait(?Send)]
impl TileFetcher for ImmediateFetcher {
    async fn fetch(&self, descriptor: &str) -> tile_pyramid::Result<TileImage> {
        self.calls.borrow_mut().push(descriptor.to_string());
        if self.failing.borrow().iter().any(|d| d == descriptor) {
            return Err(fetch_error(descriptor, "HTTP 404"));
        }
        Ok(TileImage::blank(1, 1))
    }
}

/// Holds every fetch open until the test completes or fails it.
#[derive(Default)]
pub struct ManualFetcher {
    started: RefCell<Vec<String>>,
    waiting: RefCell<HashMap<String, oneshot::Sender<tile_pyramid::Result<TileImage>>>>,
}

impl ManualFetcher {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Descriptors whose fetch has begun, in order
    pub fn started(&self) -> Vec<String> {
        self.started.borrow().clone()
    }

    /// Descriptors started and not yet answered
    pub fn open(&self) -> Vec<String> {
        let mut open: Vec<String> = self.waiting.borrow().keys().cloned().collect();
        open.sort();
        open
    }

    pub fn complete(&self, descriptor: &str) -> bool {
        self.answer(descriptor, Ok(TileImage::blank(1, 1)))
    }

    pub fn fail(&self, descriptor: &str) -> bool {
        self.answer(descriptor, Err(fetch_error(descriptor, "HTTP 500")))
    }

    pub fn complete_all(&self) -> usize {
        let open = self.open();
        open.iter().filter(|d| self.complete(d)).count()
    }

    fn answer(&self, descriptor: &str, result: tile_pyramid::Result<TileImage>) -> bool {
        match self.waiting.borrow_mut().remove(descriptor) {
            Some(sender) => sender.send(result).is_ok(),
            None => false,
        }
    }
}

#[async_trait(?Send)]
impl TileFetcher for ManualFetcher {
    async fn fetch(&self, descriptor: &str) -> tile_pyramid::Result<TileImage> {
        let (sender, receiver) = oneshot::channel();
        self.started.borrow_mut().push(descriptor.to_string());
        self.waiting
            .borrow_mut()
            .insert(descriptor.to_string(), sender);
        receiver
            .await
            .unwrap_or_else(|_| Err(fetch_error(descriptor, "dropped")))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    Draw(String),
    MoveToTop(String),
    Remove(String),
}

/// Records renderer calls; clones share one log.
#[derive(Debug, Clone, Default)]
pub struct RecordingRenderer {
    pub events: Rc<RefCell<Vec<RenderEvent>>>,
    pub placements: Rc<RefCell<Vec<(String, TilePlacement)>>>,
}

impl RecordingRenderer {
    pub fn draws(&self, hash: &str) -> usize {
        self.count(&RenderEvent::Draw(hash.to_string()))
    }

    pub fn removals(&self, hash: &str) -> usize {
        self.count(&RenderEvent::Remove(hash.to_string()))
    }

    pub fn drawn(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                RenderEvent::Draw(hash) => Some(hash.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn removed(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                RenderEvent::Remove(hash) => Some(hash.clone()),
                _ => None,
            })
            .collect()
    }

    fn count(&self, event: &RenderEvent) -> usize {
        self.events.borrow().iter().filter(|e| *e == event).count()
    }
}

impl TileRenderer for RecordingRenderer {
    fn draw_tile(&mut self, tile: &Rc<Tile>, placement: &TilePlacement) {
        self.events
            .borrow_mut()
            .push(RenderEvent::Draw(tile.hash().to_string()));
        self.placements
            .borrow_mut()
            .push((tile.hash().to_string(), *placement));
    }

    fn move_to_top(&mut self, tile: &Rc<Tile>) {
        self.events
            .borrow_mut()
            .push(RenderEvent::MoveToTop(tile.hash().to_string()));
    }

    fn remove_tile(&mut self, tile: &Rc<Tile>) {
        self.events
            .borrow_mut()
            .push(RenderEvent::Remove(tile.hash().to_string()));
    }
}

/// A layer plus handles on its fetcher and renderer
pub fn layer_with<F>(options: TileLayerOptions, fetcher: Rc<F>) -> (TileLayer, RecordingRenderer)
where
    F: TileFetcher + 'static,
{
    init_logging();
    let renderer = RecordingRenderer::default();
    let layer = TileLayer::new(options, fetcher, renderer.clone()).expect("valid options");
    (layer, renderer)
}
