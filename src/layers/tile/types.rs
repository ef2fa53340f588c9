//! Configuration types for the tile layer

use crate::core::constants::{
    CACHE_SIZE_KEEP_LOWER, CACHE_SIZE_SINGLE_LEVEL, DEFAULT_MAX_LEVEL, DEFAULT_QUEUE_SIZE,
    DEFAULT_SUBDOMAINS, MAX_SUPPORTED_LEVEL, TILE_SIZE,
};
use crate::core::geo::Point;
use crate::prelude::Rc;
use crate::tiles::source::parse_subdomains;
use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Builds a fetch descriptor from `(x, y, level, subdomains)`
pub type UrlFn = Rc<dyn Fn(i64, i64, u32, &[String]) -> String>;
/// Maps the continuous map zoom to a pyramid level
pub type RoundingFn = Rc<dyn Fn(f64) -> i64>;
/// Pixel offset of a level's origin
pub type OffsetFn = Rc<dyn Fn(u32) -> Point>;
/// Number of tiles per axis at a level
pub type TilesAtZoomFn = Rc<dyn Fn(u32) -> (i64, i64)>;
/// Size in level pixels of the region that holds data at a level
pub type MaxBoundsFn = Rc<dyn Fn(u32) -> Point>;

/// Closure-valued options. These cannot be serialized and are configured in
/// code.
#[derive(Clone)]
pub struct TileHooks {
    /// Takes precedence over the `url` template
    pub url_fn: Option<UrlFn>,
    pub tile_rounding: RoundingFn,
    pub tile_offset: Option<OffsetFn>,
    pub tiles_at_zoom: Option<TilesAtZoomFn>,
    pub tiles_max_bounds: Option<MaxBoundsFn>,
}

impl Default for TileHooks {
    fn default() -> Self {
        Self {
            url_fn: None,
            tile_rounding: Rc::new(|zoom: f64| zoom.round() as i64),
            tile_offset: None,
            tiles_at_zoom: None,
            tiles_max_bounds: None,
        }
    }
}

impl fmt::Debug for TileHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileHooks")
            .field("url_fn", &self.url_fn.is_some())
            .field("tile_offset", &self.tile_offset.is_some())
            .field("tiles_at_zoom", &self.tiles_at_zoom.is_some())
            .field("tiles_max_bounds", &self.tiles_max_bounds.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TileLayerOptions {
    pub min_level: u32,
    pub max_level: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    /// Pixels each tile shares with its neighbours on every side
    pub tile_overlap: u32,
    pub wrap_x: bool,
    pub wrap_y: bool,
    /// `None` picks 600 with `keep_lower` and 200 without
    pub cache_size: Option<usize>,
    /// Keep coarser levels displayed while finer ones load
    pub keep_lower: bool,
    /// Descriptor template, see [`crate::UrlTemplate`]
    pub url: Option<String>,
    /// Legacy alternative to `url`: `base_url/{z}/{x}/{y}.<image_format>`
    pub base_url: Option<String>,
    pub image_format: String,
    /// Either a list or a string (comma separated, or one label per character)
    #[serde(deserialize_with = "subdomain_list")]
    pub subdomains: Vec<String>,
    /// Fetches allowed in flight at once
    pub queue_size: usize,
    #[serde(skip)]
    pub hooks: TileHooks,
}

impl Default for TileLayerOptions {
    fn default() -> Self {
        Self {
            min_level: 0,
            max_level: DEFAULT_MAX_LEVEL,
            tile_width: TILE_SIZE,
            tile_height: TILE_SIZE,
            tile_overlap: 0,
            wrap_x: true,
            wrap_y: false,
            cache_size: None,
            keep_lower: true,
            url: None,
            base_url: None,
            image_format: "png".to_string(),
            subdomains: parse_subdomains(DEFAULT_SUBDOMAINS),
            queue_size: DEFAULT_QUEUE_SIZE,
            hooks: TileHooks::default(),
        }
    }
}

/// Unified configuration presets for TileLayerOptions
impl TileLayerOptions {
    pub fn low_resource() -> Self {
        Self {
            cache_size: Some(100),
            keep_lower: false,
            queue_size: 2,
            ..Self::default()
        }
    }

    pub fn high_performance() -> Self {
        Self {
            cache_size: Some(2000),
            queue_size: 16,
            ..Self::default()
        }
    }

    /// Loads options from JSON; hooks keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        Ok(options)
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_url_fn<F>(mut self, url_fn: F) -> Self
    where
        F: Fn(i64, i64, u32, &[String]) -> String + 'static,
    {
        self.hooks.url_fn = Some(Rc::new(url_fn));
        self
    }

    pub fn with_tile_rounding<F>(mut self, rounding: F) -> Self
    where
        F: Fn(f64) -> i64 + 'static,
    {
        self.hooks.tile_rounding = Rc::new(rounding);
        self
    }

    pub fn with_tile_offset<F>(mut self, offset: F) -> Self
    where
        F: Fn(u32) -> Point + 'static,
    {
        self.hooks.tile_offset = Some(Rc::new(offset));
        self
    }

    pub fn with_tiles_at_zoom<F>(mut self, tiles_at_zoom: F) -> Self
    where
        F: Fn(u32) -> (i64, i64) + 'static,
    {
        self.hooks.tiles_at_zoom = Some(Rc::new(tiles_at_zoom));
        self
    }

    pub fn with_tiles_max_bounds<F>(mut self, max_bounds: F) -> Self
    where
        F: Fn(u32) -> Point + 'static,
    {
        self.hooks.tiles_max_bounds = Some(Rc::new(max_bounds));
        self
    }

    /// The configured capacity, or the default for the `keep_lower` mode
    pub fn effective_cache_size(&self) -> usize {
        match self.cache_size {
            Some(size) => size,
            None if self.keep_lower => CACHE_SIZE_KEEP_LOWER,
            None => CACHE_SIZE_SINGLE_LEVEL,
        }
    }

    /// Rejects option sets the layer cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.tile_width == 0 || self.tile_height == 0 {
            return Err(Error::InvalidConfig(format!(
                "tile size must be positive, got {}x{}",
                self.tile_width, self.tile_height
            )));
        }
        if self.min_level > self.max_level {
            return Err(Error::InvalidConfig(format!(
                "min_level {} is above max_level {}",
                self.min_level, self.max_level
            )));
        }
        if self.max_level > MAX_SUPPORTED_LEVEL {
            return Err(Error::InvalidConfig(format!(
                "max_level {} exceeds {}",
                self.max_level, MAX_SUPPORTED_LEVEL
            )));
        }
        if self.subdomains.is_empty() || self.subdomains.iter().any(|s| s.is_empty()) {
            return Err(Error::InvalidConfig(
                "subdomains must be non-empty labels".to_string(),
            ));
        }
        if self.queue_size == 0 {
            return Err(Error::InvalidConfig("queue_size must be positive".to_string()));
        }
        if self.cache_size == Some(0) {
            return Err(Error::InvalidConfig("cache_size must be positive".to_string()));
        }
        if self.hooks.url_fn.is_none() && self.url.is_none() && self.base_url.is_none() {
            return Err(Error::InvalidConfig(
                "one of url, base_url or a url function is required".to_string(),
            ));
        }
        Ok(())
    }
}

fn subdomain_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Subdomains {
        List(Vec<String>),
        Text(String),
    }

    Ok(match Subdomains::deserialize(deserializer)? {
        Subdomains::List(list) => list,
        Subdomains::Text(text) => parse_subdomains(&text),
    })
}
