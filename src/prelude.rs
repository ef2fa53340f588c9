//! Prelude module for common tile pyramid types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use tile_pyramid::prelude::*;`

pub use crate::core::{
    bounds::{Bounds, TileBounds},
    geo::{Point, TileIndex},
    view::{View, ViewBounds},
};

pub use crate::layers::tile::{
    TileHooks, TileLayer, TileLayerOptions, TilePlacement, TileRenderer,
};

pub use crate::tiles::{
    cache::TileCache,
    image::TileImage,
    queue::{Completion, FetchQueue, FetchRequest},
    source::{ByteSource, TileFetcher, UrlTemplate},
    tile::Tile,
};

pub use crate::{Error as TileError, Result};

pub use std::{
    cell::{Cell, RefCell},
    rc::{Rc, Weak},
    sync::Arc,
};

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet};

pub use futures::future::LocalBoxFuture;
