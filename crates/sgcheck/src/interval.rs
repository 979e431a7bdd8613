//! Ordered maps keyed by non-empty, non-overlapping address intervals.
use std::{cmp::Ordering, collections::BTreeMap, fmt};

use crate::Addr;

/// The half open range `[addr, addr + size)`, `size > 0`.
///
/// Two intervals compare equal whenever they overlap, so a map keyed by
/// `Interval` can be probed with a one byte interval to find the entry
/// covering an address.
#[derive(Debug, Clone, Copy)]
pub struct Interval {
    addr: Addr,
    last: Addr,
}

impl Interval {
    /// Returns `None` for empty ranges and ranges that wrap the address space.
    pub fn try_new(addr: Addr, size: u64) -> Option<Self> {
        let last = addr.checked_add(size.checked_sub(1)?)?;
        Some(Self { addr, last })
    }

    /// Same as [`Interval::try_new`], but clamps ranges running off the end
    /// of the address space.
    pub fn clamped(addr: Addr, size: u64) -> Option<Self> {
        let last = addr.saturating_add(size.checked_sub(1)?);
        Some(Self { addr, last })
    }

    pub fn probe(addr: Addr) -> Self {
        Self { addr, last: addr }
    }

    pub fn addr(&self) -> Addr {
        self.addr
    }

    pub fn size(&self) -> u64 {
        self.last - self.addr + 1
    }

    pub fn contains(&self, addr: Addr, size: u64) -> bool {
        range_contains(self.addr, self.size(), addr, size)
    }

    pub fn overlaps(&self, other: &Self) -> bool {
        self.addr <= other.last && other.addr <= self.last
    }
}

impl PartialEq for Interval {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Interval {}

impl PartialOrd for Interval {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Interval {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.last < other.addr {
            Ordering::Less
        } else if other.last < self.addr {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:#x}, +{})", self.addr, self.size())
    }
}

/// Whether `[addr, addr + size)` lies inside `[lo, lo + len)`.
pub fn range_contains(lo: Addr, len: u64, addr: Addr, size: u64) -> bool {
    addr >= lo && size <= len && addr - lo <= len - size
}

/// Identity of a tree node. Never reused within a tree, so it stays a
/// valid equality key after the node is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("interval {new} overlaps registered interval {existing}")]
pub struct Overlap {
    pub new: Interval,
    pub existing: Interval,
}

#[derive(Debug, Clone)]
pub struct Node<V> {
    pub id: NodeId,
    pub value: V,
}

#[derive(Debug, Clone, Copy)]
pub struct Entry<'a, V> {
    pub interval: Interval,
    pub id: NodeId,
    pub value: &'a V,
}

#[derive(Debug, Clone)]
pub struct IntervalTree<V> {
    map: BTreeMap<Interval, Node<V>>,
    next_id: u64,
}

impl<V> Default for IntervalTree<V> {
    fn default() -> Self {
        Self {
            map: BTreeMap::new(),
            next_id: 0,
        }
    }
}

impl<V> IntervalTree<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn insert(&mut self, interval: Interval, value: V) -> Result<NodeId, Overlap> {
        if let Some((&existing, _)) = self.map.get_key_value(&interval) {
            return Err(Overlap {
                new: interval,
                existing,
            });
        }

        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.map.insert(interval, Node { id, value });
        Ok(id)
    }

    pub fn find_covering(&self, addr: Addr) -> Option<Entry<'_, V>> {
        self.map
            .get_key_value(&Interval::probe(addr))
            .map(|(&interval, node)| Entry {
                interval,
                id: node.id,
                value: &node.value,
            })
    }

    /// Removes the interval covering `addr`.
    pub fn remove_at(&mut self, addr: Addr) -> Option<(Interval, Node<V>)> {
        self.map.remove_entry(&Interval::probe(addr))
    }

    /// Removes every interval overlapping `range`.
    pub fn delete_range(&mut self, range: Interval) -> Vec<(Interval, Node<V>)> {
        let mut removed = Vec::new();
        while let Some(hit) = self.map.remove_entry(&range) {
            removed.push(hit);
        }
        removed
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.map.values().any(|node| node.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = Entry<'_, V>> {
        self.map.iter().map(|(&interval, node)| Entry {
            interval,
            id: node.id,
            value: &node.value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iv(addr: Addr, size: u64) -> Interval {
        Interval::try_new(addr, size).unwrap()
    }

    #[test]
    fn interval_order() {
        assert_eq!(iv(0x10, 0x10).cmp(&iv(0x20, 1)), Ordering::Less);
        assert_eq!(iv(0x20, 1).cmp(&iv(0x10, 0x10)), Ordering::Greater);
        assert_eq!(iv(0x10, 0x10).cmp(&iv(0x1f, 4)), Ordering::Equal);
        assert!(Interval::try_new(0x10, 0).is_none());
        assert!(Interval::try_new(Addr::MAX, 2).is_none());
        assert_eq!(iv(Addr::MAX, 1).size(), 1);
    }

    #[test]
    fn containment() {
        let i = iv(0x7fe0, 16);
        assert!(i.contains(0x7fe0, 16));
        assert!(i.contains(0x7fec, 4));
        assert!(!i.contains(0x7fed, 4));
        assert!(!i.contains(0x7fdf, 1));
        assert!(!i.contains(0x7fe0, 17));
    }

    #[test]
    fn insert_and_find() {
        let mut tree = IntervalTree::new();
        let a = tree.insert(iv(0x1000, 0x40), "a").unwrap();
        let b = tree.insert(iv(0x2000, 0x10), "b").unwrap();
        assert_ne!(a, b);

        let hit = tree.find_covering(0x1020).unwrap();
        assert_eq!(hit.id, a);
        assert_eq!(*hit.value, "a");
        assert_eq!(hit.interval.addr(), 0x1000);
        assert!(tree.find_covering(0x1040).is_none());
        assert!(tree.find_covering(0x0fff).is_none());

        assert!(tree.insert(iv(0x2010, 0x10), "adjacent").is_ok());
        assert_eq!(tree.len(), 3);

        let err = tree.insert(iv(0x200f, 0x10), "c").unwrap_err();
        assert_eq!(err.existing.addr(), 0x2000);
        assert_eq!(err.existing.size(), 0x10);
        assert_eq!(tree.len(), 3);
        let kept = tree.find_covering(0x2008).unwrap();
        assert_eq!(kept.id, b);
        assert_eq!(*kept.value, "b");

        let err = tree.insert(iv(0x0f00, 0x2000), "wide").unwrap_err();
        assert_eq!(err.new.addr(), 0x0f00);
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn delete_range_removes_all_overlaps() {
        let mut tree = IntervalTree::new();
        tree.insert(iv(0x1000, 0x10), 1).unwrap();
        tree.insert(iv(0x1010, 0x10), 2).unwrap();
        tree.insert(iv(0x1800, 0x10), 3).unwrap();
        tree.insert(iv(0x3000, 0x10), 4).unwrap();

        let removed = tree.delete_range(iv(0x1008, 0x800));
        let mut values: Vec<_> = removed.iter().map(|(_, n)| n.value).collect();
        values.sort();
        assert_eq!(values, vec![1, 2, 3]);
        assert_eq!(tree.len(), 1);
        assert!(tree.delete_range(iv(0x1000, 0x100)).is_empty());
    }

    #[test]
    fn node_ids_are_not_reused() {
        let mut tree = IntervalTree::new();
        let first = tree.insert(iv(0x1000, 8), ()).unwrap();
        tree.remove_at(0x1004).unwrap();
        let second = tree.insert(iv(0x1000, 8), ()).unwrap();
        assert_ne!(first, second);
        assert!(!tree.contains_node(first));
        assert!(tree.contains_node(second));
    }
}
