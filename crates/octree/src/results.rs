//! The refinement frontier: a capacity-bounded priority index.

use std::collections::BTreeMap;

use crate::arena::CellId;

/// Ordering key: log priority first, then insertion sequence with older
/// entries ranked higher, so among equal priorities the oldest cell is
/// refined first.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Key {
    log_priority: f64,
    seq: u64,
}

impl Eq for Key {}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.log_priority
            .total_cmp(&other.log_priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Ordered set of candidate cells keyed by priority.
///
/// Priorities are compared in log space; the linear-space priority of any
/// stored entry is therefore finite and non-negative. `NaN` priorities are
/// rejected at insertion. When full, inserting a higher-priority entry
/// evicts the current minimum, so the index always keeps the best
/// `capacity` candidates seen.
#[derive(Debug)]
pub struct ResultIndex {
    entries: BTreeMap<Key, CellId>,
    capacity: usize,
    next_seq: u64,
}

impl ResultIndex {
    /// Creates an empty index holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            capacity: capacity.max(1),
            next_seq: 0,
        }
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts a cell with the given log priority.
    ///
    /// Returns `false` when the priority is `NaN` or the index is full of
    /// strictly better entries; the cell is dropped in either case.
    pub fn insert(&mut self, log_priority: f64, cell: CellId) -> bool {
        if log_priority.is_nan() {
            return false;
        }
        let key = Key {
            log_priority,
            seq: self.next_seq,
        };
        if self.entries.len() >= self.capacity {
            // Full: the newcomer must beat the current minimum.
            let min = *self.entries.keys().next().unwrap();
            if key < min {
                return false;
            }
            self.entries.remove(&min);
        }
        self.next_seq += 1;
        self.entries.insert(key, cell);
        true
    }

    /// Removes and returns the highest-priority entry.
    pub fn pop_max(&mut self) -> Option<(f64, CellId)> {
        self.entries
            .pop_last()
            .map(|(key, cell)| (key.log_priority, cell))
    }

    /// The highest stored log priority, if any.
    pub fn peek_max(&self) -> Option<f64> {
        self.entries.keys().next_back().map(|k| k.log_priority)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(i: usize) -> CellId {
        // CellIds are opaque; allocate through an arena to obtain them.
        let mut arena = crate::arena::CellArena::default();
        let mut last = None;
        for _ in 0..=i {
            last = Some(arena.alloc(
                poseidon_event::Point3::new(0.0, 0.0, 0.0),
                [1.0, 1.0, 1.0],
                None,
            ));
        }
        last.unwrap()
    }

    #[test]
    fn pops_in_descending_priority_order() {
        let mut index = ResultIndex::new(16);
        index.insert(-3.0, id(0));
        index.insert(-1.0, id(1));
        index.insert(-2.0, id(2));
        assert_eq!(index.pop_max().unwrap(), (-1.0, id(1)));
        assert_eq!(index.pop_max().unwrap(), (-2.0, id(2)));
        assert_eq!(index.pop_max().unwrap(), (-3.0, id(0)));
        assert!(index.pop_max().is_none());
    }

    #[test]
    fn ties_extract_oldest_first() {
        let mut index = ResultIndex::new(16);
        index.insert(-1.0, id(0));
        index.insert(-1.0, id(1));
        index.insert(-1.0, id(2));
        assert_eq!(index.pop_max().unwrap().1, id(0));
        assert_eq!(index.pop_max().unwrap().1, id(1));
        assert_eq!(index.pop_max().unwrap().1, id(2));
    }

    #[test]
    fn rejects_nan_priorities() {
        let mut index = ResultIndex::new(4);
        assert!(!index.insert(f64::NAN, id(0)));
        assert!(index.is_empty());
    }

    #[test]
    fn capacity_evicts_the_minimum() {
        let mut index = ResultIndex::new(2);
        assert!(index.insert(-5.0, id(0)));
        assert!(index.insert(-1.0, id(1)));
        // Better than the minimum: evicts -5.
        assert!(index.insert(-3.0, id(2)));
        assert_eq!(index.len(), 2);
        // Worse than every stored entry: dropped.
        assert!(!index.insert(-10.0, id(3)));
        assert_eq!(index.pop_max().unwrap().1, id(1));
        assert_eq!(index.pop_max().unwrap().1, id(2));
    }

    #[test]
    fn peek_does_not_remove() {
        let mut index = ResultIndex::new(4);
        index.insert(-2.0, id(0));
        assert_eq!(index.peek_max(), Some(-2.0));
        assert_eq!(index.len(), 1);
    }
}
