use crate::core::geo::TileIndex;
use crate::prelude::{HashMap, Rc};
use crate::tiles::tile::Tile;

/// Drawn tiles by hash, rebuilt on every view update.
///
/// Only answers coverage questions; the layer's active set stays the record
/// of what is displayed.
#[derive(Debug, Default)]
pub struct TileTree {
    tiles: HashMap<String, Rc<Tile>>,
}

impl TileTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tile: &Rc<Tile>) {
        self.tiles.insert(tile.hash().to_string(), Rc::clone(tile));
    }

    pub fn get(&self, index: &TileIndex) -> Option<&Rc<Tile>> {
        self.tiles.get(&index.hash_key())
    }

    pub fn contains(&self, index: &TileIndex) -> bool {
        self.tiles.contains_key(&index.hash_key())
    }

    /// The drawn tiles hiding `index`: its parent, or else all four children.
    pub fn covering(&self, index: &TileIndex) -> Option<Vec<Rc<Tile>>> {
        if let Some(parent) = index.parent().and_then(|p| self.get(&p)) {
            return Some(vec![Rc::clone(parent)]);
        }
        index
            .children()
            .iter()
            .map(|child| self.get(child).cloned())
            .collect()
    }

    pub fn is_covered(&self, index: &TileIndex) -> bool {
        self.covering(index).is_some()
    }

    pub fn clear(&mut self) {
        self.tiles.clear();
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}
