//! Replacement policies for the per-node caches.

use itertools::Itertools;
use rand::prelude::*;
use rustc_hash::FxHashMap;

use crate::types::ContentId;

/// Replacement policy applied by every cache in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Policy {
    Lru,
    Lfu,
    Fifo,
    Rand,
    /// Stores nothing. Every lookup misses, every insertion is dropped.
    Null,
}

/// A bounded content store.
///
/// `entries` is kept in policy order: for LRU the back is the most recently
/// used, for FIFO and LFU it is insertion order. Eviction for RAND draws from
/// the cache's own seeded generator, so runs stay reproducible.
#[derive(Debug, Clone)]
pub struct Cache {
    policy: Policy,
    capacity: usize,
    entries: Vec<ContentId>,
    freq: FxHashMap<ContentId, u64>,
    rng: StdRng,
}

impl Cache {
    pub fn new(policy: Policy, capacity: usize, seed: u64) -> Self {
        Self {
            policy,
            capacity,
            entries: Vec::with_capacity(capacity),
            freq: FxHashMap::default(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks `content` up without touching recency or frequency state.
    pub fn contains(&self, content: ContentId) -> bool {
        self.entries.contains(&content)
    }

    /// Looks `content` up, updating policy state on a hit.
    pub fn get(&mut self, content: ContentId) -> bool {
        let Some(pos) = self.entries.iter().position(|&c| c == content) else {
            return false;
        };
        match self.policy {
            Policy::Lru => {
                let item = self.entries.remove(pos);
                self.entries.push(item);
            }
            Policy::Lfu => {
                *self.freq.entry(content).or_insert(0) += 1;
            }
            Policy::Fifo | Policy::Rand | Policy::Null => {}
        }
        true
    }

    /// Inserts `content`, evicting one resident item when full. Returns the
    /// evicted item, if any. Inserting a resident item only refreshes policy
    /// state.
    pub fn put(&mut self, content: ContentId) -> Option<ContentId> {
        if self.capacity == 0 || self.policy == Policy::Null {
            return None;
        }
        if self.contains(content) {
            self.get(content);
            return None;
        }
        let evicted = if self.entries.len() == self.capacity {
            Some(self.evict())
        } else {
            None
        };
        self.entries.push(content);
        if self.policy == Policy::Lfu {
            self.freq.insert(content, 1);
        }
        evicted
    }

    fn evict(&mut self) -> ContentId {
        let pos = match self.policy {
            Policy::Lru | Policy::Fifo => 0,
            // Oldest entry among the least frequently used.
            Policy::Lfu => self
                .entries
                .iter()
                .position_min_by_key(|c| self.freq.get(c).copied().unwrap_or(0))
                .unwrap_or(0),
            Policy::Rand => self.rng.gen_range(0..self.entries.len()),
            Policy::Null => unreachable!("NULL caches never hold entries"),
        };
        let evicted = self.entries.remove(pos);
        self.freq.remove(&evicted);
        evicted
    }

    pub fn iter(&self) -> impl Iterator<Item = ContentId> + '_ {
        self.entries.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(policy: Policy, capacity: usize) -> Cache {
        Cache::new(policy, capacity, 0)
    }

    fn c(id: u64) -> ContentId {
        ContentId::new(id)
    }

    #[test]
    fn lru_evicts_least_recently_used() {
        let mut cache = cache(Policy::Lru, 2);
        assert_eq!(cache.put(c(1)), None);
        assert_eq!(cache.put(c(2)), None);
        // Touch 1 so that 2 becomes the eviction victim.
        assert!(cache.get(c(1)));
        assert_eq!(cache.put(c(3)), Some(c(2)));
        assert!(cache.contains(c(1)));
        assert!(cache.contains(c(3)));
    }

    #[test]
    fn fifo_evicts_in_insertion_order_regardless_of_hits() {
        let mut cache = cache(Policy::Fifo, 2);
        cache.put(c(1));
        cache.put(c(2));
        assert!(cache.get(c(1)));
        assert_eq!(cache.put(c(3)), Some(c(1)));
    }

    #[test]
    fn lfu_evicts_least_frequently_used() {
        let mut cache = cache(Policy::Lfu, 2);
        cache.put(c(1));
        cache.put(c(2));
        assert!(cache.get(c(1)));
        assert!(cache.get(c(1)));
        assert!(cache.get(c(2)));
        assert_eq!(cache.put(c(3)), Some(c(2)));
    }

    #[test]
    fn rand_eviction_is_reproducible_for_a_seed() {
        let run = || {
            let mut cache = Cache::new(Policy::Rand, 3, 99);
            for id in 1..=10 {
                cache.put(c(id));
            }
            cache.iter().collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn null_policy_stores_nothing() {
        let mut cache = cache(Policy::Null, 4);
        assert_eq!(cache.put(c(1)), None);
        assert!(!cache.get(c(1)));
        assert!(cache.is_empty());
    }

    #[test]
    fn zero_capacity_drops_every_insertion() {
        let mut cache = cache(Policy::Lru, 0);
        assert_eq!(cache.put(c(1)), None);
        assert!(!cache.contains(c(1)));
        assert!(!cache.get(c(1)));
    }

    #[test]
    fn occupancy_never_exceeds_capacity() {
        let mut cache = cache(Policy::Lru, 3);
        for id in 1..=50 {
            cache.put(c(id));
            assert!(cache.len() <= 3);
        }
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn contains_does_not_disturb_recency() {
        let mut cache = cache(Policy::Lru, 2);
        cache.put(c(1));
        cache.put(c(2));
        // A peek at 1 must not save it from eviction.
        assert!(cache.contains(c(1)));
        assert_eq!(cache.put(c(3)), Some(c(1)));
    }

    #[test]
    fn reinserting_resident_item_evicts_nothing() {
        let mut cache = cache(Policy::Lru, 2);
        cache.put(c(1));
        cache.put(c(2));
        assert_eq!(cache.put(c(1)), None);
        assert_eq!(cache.len(), 2);
        // The refresh makes 2 the LRU victim.
        assert_eq!(cache.put(c(3)), Some(c(2)));
    }
}
