use crate::core::constants::DEFAULT_CACHE_SIZE;
use crate::prelude::Rc;
use crate::tiles::tile::Tile;
use lru::LruCache;

/// In-memory tile store with least-recently-used eviction.
///
/// The capacity is enforced by [`TileCache::purge`] rather than on insert so
/// that a caller can add a whole frame of tiles and evict once afterwards.
#[derive(Debug)]
pub struct TileCache {
    cache: LruCache<String, Rc<Tile>>,
    size: usize,
}

impl TileCache {
    /// Create a new tile cache holding at most `size` tiles
    pub fn new(size: usize) -> Self {
        Self {
            cache: LruCache::unbounded(),
            size,
        }
    }

    /// Looks a tile up and marks it as most recently used
    pub fn get(&mut self, hash: &str) -> Option<Rc<Tile>> {
        self.cache.get(hash).cloned()
    }

    /// Looks a tile up without touching the access order
    pub fn peek(&self, hash: &str) -> Option<&Rc<Tile>> {
        self.cache.peek(hash)
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.cache.contains(hash)
    }

    /// Inserts or replaces a tile at the most recently used position.
    ///
    /// Unless `defer_purge` is set, least recently used tiles are evicted
    /// until the capacity holds, and `on_evict` sees each of them.
    pub fn add<F>(&mut self, tile: Rc<Tile>, on_evict: F, defer_purge: bool)
    where
        F: FnMut(&Rc<Tile>),
    {
        self.cache.put(tile.hash().to_string(), tile);
        if !defer_purge {
            self.purge(on_evict);
        }
    }

    /// Evicts least recently used tiles until the capacity holds
    pub fn purge<F>(&mut self, mut on_evict: F)
    where
        F: FnMut(&Rc<Tile>),
    {
        while self.cache.len() > self.size {
            match self.cache.pop_lru() {
                Some((_, tile)) => on_evict(&tile),
                None => break,
            }
        }
    }

    /// Removes a tile by hash
    pub fn remove(&mut self, hash: &str) -> bool {
        self.cache.pop(hash).is_some()
    }

    /// Removes whatever is cached under this tile's hash
    pub fn remove_tile(&mut self, tile: &Tile) -> bool {
        self.remove(tile.hash())
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Get the cache capacity
    pub fn size(&self) -> usize {
        self.size
    }

    /// Changes the capacity, returning the tiles a smaller size evicted.
    /// A size of 0 empties the cache.
    pub fn set_size(&mut self, size: usize) -> Vec<Rc<Tile>> {
        self.size = size;
        let mut evicted = Vec::new();
        self.purge(|tile| evicted.push(Rc::clone(tile)));
        evicted
    }

    /// Get the current number of cached tiles
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Hashes from most to least recently used
    pub fn hashes(&self) -> Vec<String> {
        self.cache.iter().map(|(hash, _)| hash.clone()).collect()
    }
}

impl Default for TileCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geo::TileIndex;

    fn tile(x: i64) -> Rc<Tile> {
        Rc::new(Tile::with_defaults(TileIndex::new(x, 0, 3), format!("t{}", x)))
    }

    #[test]
    fn test_lru_eviction() {
        let mut cache = TileCache::new(2);
        let mut evicted = Vec::new();
        for x in 0..3 {
            cache.add(tile(x), |t| evicted.push(t.hash().to_string()), false);
        }

        assert_eq!(cache.len(), 2);
        assert_eq!(evicted, vec!["3_0_0"]);
        assert!(!cache.contains("3_0_0"));
        assert!(cache.contains("3_0_1"));
        assert!(cache.contains("3_0_2"));
    }

    #[test]
    fn test_get_refreshes_access_order() {
        let mut cache = TileCache::new(2);
        cache.add(tile(0), |_| {}, false);
        cache.add(tile(1), |_| {}, false);
        assert!(cache.get("3_0_0").is_some());
        cache.add(tile(2), |_| {}, false);

        assert!(cache.contains("3_0_0"));
        assert!(!cache.contains("3_0_1"));
        assert_eq!(cache.hashes(), vec!["3_0_2", "3_0_0"]);
    }

    #[test]
    fn test_peek_does_not_refresh() {
        let mut cache = TileCache::new(2);
        cache.add(tile(0), |_| {}, false);
        cache.add(tile(1), |_| {}, false);
        assert!(cache.peek("3_0_0").is_some());
        cache.add(tile(2), |_| {}, false);
        assert!(!cache.contains("3_0_0"));
    }

    #[test]
    fn test_deferred_purge() {
        let mut cache = TileCache::new(2);
        for x in 0..4 {
            cache.add(tile(x), |_| {}, true);
        }
        assert_eq!(cache.len(), 4);

        let mut evicted = 0;
        cache.purge(|_| evicted += 1);
        assert_eq!(evicted, 2);
        assert_eq!(cache.len(), cache.size());
    }

    #[test]
    fn test_replace_same_hash() {
        let mut cache = TileCache::new(4);
        let first = tile(0);
        let second = tile(0);
        cache.add(Rc::clone(&first), |_| {}, false);
        cache.add(Rc::clone(&second), |_| {}, false);

        assert_eq!(cache.len(), 1);
        assert!(Rc::ptr_eq(cache.peek("3_0_0").unwrap(), &second));
    }

    #[test]
    fn test_shrinking_size_evicts() {
        let mut cache = TileCache::new(4);
        for x in 0..4 {
            cache.add(tile(x), |_| {}, false);
        }
        let evicted = cache.set_size(1);
        assert_eq!(evicted.len(), 3);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains("3_0_3"));
    }

    #[test]
    fn test_zero_size_evicts_everything() {
        let mut cache = TileCache::new(4);
        for x in 0..3 {
            cache.add(tile(x), |_| {}, false);
        }
        let evicted = cache.set_size(0);
        assert_eq!(evicted.len(), 3);
        assert!(cache.is_empty());
        assert_eq!(cache.size(), 0);

        cache.add(tile(5), |_| {}, false);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_remove_tile_by_object() {
        let mut cache = TileCache::new(4);
        let cached = tile(0);
        cache.add(Rc::clone(&cached), |_| {}, false);
        cache.add(tile(1), |_| {}, false);

        // A different object with the same index names the same entry.
        let twin = Tile::with_defaults(TileIndex::new(0, 0, 3), "other");
        assert!(cache.remove_tile(&twin));
        assert!(!cache.remove_tile(&cached));
        assert_eq!(cache.hashes(), vec!["3_0_1"]);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut cache = TileCache::default();
        cache.add(tile(0), |_| {}, false);
        cache.add(tile(1), |_| {}, false);
        assert!(cache.remove("3_0_0"));
        assert!(!cache.remove("3_0_0"));
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.size(), DEFAULT_CACHE_SIZE);
    }
}
