//! Least recently used cache of per-tile state.

use std::collections::{btree_map, BTreeMap, HashSet};

use crate::coords::WorldTileCoords;

struct Entry<V> {
    value: V,
    last_used: u64,
}

/// Stores values by tile coordinates and remembers the order in which they were used.
///
/// Inserting or touching an entry makes it the most recently used one. Nothing is evicted
/// implicitly, callers decide when to [`expire`](RepresentationCache::expire).
pub struct RepresentationCache<V> {
    entries: BTreeMap<WorldTileCoords, Entry<V>>,
    clock: u64,
}

impl<V> Default for RepresentationCache<V> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            clock: 0,
        }
    }
}

impl<V> RepresentationCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Inserts a value, returning the one it replaced.
    pub fn insert(&mut self, coords: WorldTileCoords, value: V) -> Option<V> {
        let last_used = self.tick();
        self.entries
            .insert(coords, Entry { value, last_used })
            .map(|entry| entry.value)
    }

    pub fn get(&self, coords: &WorldTileCoords) -> Option<&V> {
        self.entries.get(coords).map(|entry| &entry.value)
    }

    pub fn get_mut(&mut self, coords: &WorldTileCoords) -> Option<&mut V> {
        self.entries.get_mut(coords).map(|entry| &mut entry.value)
    }

    /// Marks an entry as used. Returns false if there is no entry.
    pub fn touch(&mut self, coords: &WorldTileCoords) -> bool {
        let now = self.tick();
        match self.entries.get_mut(coords) {
            Some(entry) => {
                entry.last_used = now;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, coords: &WorldTileCoords) -> Option<V> {
        self.entries.remove(coords).map(|entry| entry.value)
    }

    pub fn contains(&self, coords: &WorldTileCoords) -> bool {
        self.entries.contains_key(coords)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates in coordinate order.
    pub fn iter(&self) -> impl Iterator<Item = (&WorldTileCoords, &V)> {
        self.entries.iter().map(|(coords, entry)| (coords, &entry.value))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&WorldTileCoords, &mut V)> {
        self.entries
            .iter_mut()
            .map(|(coords, entry)| (coords, &mut entry.value))
    }

    /// Removes all entries and returns them.
    pub fn drain(&mut self) -> Vec<(WorldTileCoords, V)> {
        std::mem::take(&mut self.entries)
            .into_iter()
            .map(|(coords, entry)| (coords, entry.value))
            .collect()
    }

    /// Evicts least recently used entries until at most `max` remain. Entries in `keep` are
    /// never evicted, so the cache may stay above `max`.
    pub fn expire(
        &mut self,
        max: usize,
        keep: &HashSet<WorldTileCoords>,
    ) -> Vec<(WorldTileCoords, V)> {
        if self.entries.len() <= max {
            return Vec::new();
        }

        let mut candidates: Vec<(u64, WorldTileCoords)> = self
            .entries
            .iter()
            .filter(|(coords, _)| !keep.contains(*coords))
            .map(|(coords, entry)| (entry.last_used, *coords))
            .collect();
        candidates.sort_unstable();

        let excess = self.entries.len() - max;
        candidates
            .into_iter()
            .take(excess)
            .filter_map(|(_, coords)| match self.entries.entry(coords) {
                btree_map::Entry::Occupied(entry) => Some((coords, entry.remove().value)),
                btree_map::Entry::Vacant(_) => None,
            })
            .collect()
    }
}
