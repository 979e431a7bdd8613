//! Small per-thread cache of recent stack interval tree hits.
use smallvec::SmallVec;

use crate::{
    interval::{Interval, NodeId},
    thread::StackInterval,
    Addr,
};

pub type CachedHit = (Interval, NodeId, StackInterval);

/// Entries move one step towards the front on every hit, so hot intervals
/// are found after a few comparisons. Must be flushed whenever the owning
/// tree changes.
#[derive(Debug, Clone)]
pub struct QueryCache {
    entries: SmallVec<[CachedHit; 16]>,
    capacity: usize,
}

impl QueryCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: SmallVec::new(),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn lookup(&mut self, addr: Addr) -> Option<CachedHit> {
        let probe = Interval::probe(addr);
        let pos = self.entries.iter().position(|(iv, ..)| *iv == probe)?;
        if pos > 0 {
            self.entries.swap(pos, pos - 1);
            Some(self.entries[pos - 1])
        } else {
            Some(self.entries[0])
        }
    }

    /// Inserts a fresh tree hit, evicting the last entry when full.
    pub fn insert(&mut self, hit: CachedHit) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop();
        }
        let mid = self.entries.len() / 2;
        self.entries.insert(mid, hit);
    }

    pub fn invalidate(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interner::{StackBlockRef, StackVecRef};
    use crate::interval::IntervalTree;
    use cranelift_entity::EntityRef;

    fn hits(n: u64) -> Vec<CachedHit> {
        let mut tree = IntervalTree::new();
        let value = StackInterval {
            block: StackBlockRef::new(StackVecRef::new(0), 0),
            depth: 1,
        };
        (0..n)
            .map(|i| {
                let iv = Interval::try_new(0x1000 * (i + 1), 0x10).unwrap();
                let id = tree.insert(iv, ()).unwrap();
                (iv, id, value)
            })
            .collect()
    }

    #[test]
    fn hit_moves_towards_front() {
        let mut cache = QueryCache::new(4);
        for hit in hits(3) {
            cache.insert(hit);
        }
        let last = cache.entries[2].0.addr();
        let found = cache.lookup(last + 4).unwrap();
        assert_eq!(found.0.addr(), last);
        assert_eq!(cache.entries[1].0.addr(), last);
        assert!(cache.lookup(0x10).is_none());
    }

    #[test]
    fn bounded_and_flushable() {
        let mut cache = QueryCache::new(2);
        for hit in hits(5) {
            cache.insert(hit);
        }
        assert_eq!(cache.len(), 2);
        cache.invalidate();
        assert!(cache.is_empty());

        let mut disabled = QueryCache::new(0);
        disabled.insert(hits(1)[0]);
        assert!(disabled.is_empty());
    }
}
