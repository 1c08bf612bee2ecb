use crate::types::{EventId, EventWrapper};
use std::collections::VecDeque;

/// Fixed-capacity FIFO store. Once full, pushing evicts the logically-oldest
/// element. There is no eviction callback; callers infer wraparound from
/// `len() == capacity()`.
#[derive(Clone, PartialEq, Debug)]
pub struct BoundedRingStore<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedRingStore<T> {
    /// Capacity is fixed for the lifetime of the store.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be non-zero");
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends an item, returning the evicted oldest element when the store
    /// was already at capacity.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    /// Logical index 0 is the oldest surviving element.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.items.len() == self.capacity
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

impl<T> IntoIterator for BoundedRingStore<T> {
    type Item = T;
    type IntoIter = std::collections::vec_deque::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// Backing storage for the unfiltered sequence. The whole value is replaced,
/// never mutated in place, when the container switches modes.
#[derive(Clone, PartialEq, Debug)]
pub(crate) enum Backing {
    Cyclic(BoundedRingStore<EventWrapper>),
    Linear(Vec<EventWrapper>),
}

impl Backing {
    pub(crate) fn new(cyclic: bool, capacity: usize) -> Self {
        if cyclic {
            Backing::Cyclic(BoundedRingStore::new(capacity))
        } else {
            Backing::Linear(Vec::new())
        }
    }

    pub(crate) fn is_cyclic(&self) -> bool {
        matches!(self, Backing::Cyclic(_))
    }

    /// Eviction capacity; `None` in linear mode, which is unbounded.
    pub(crate) fn capacity(&self) -> Option<usize> {
        match self {
            Backing::Cyclic(ring) => Some(ring.capacity()),
            Backing::Linear(_) => None,
        }
    }

    pub(crate) fn push(&mut self, wrapper: EventWrapper) -> Option<EventWrapper> {
        match self {
            Backing::Cyclic(ring) => ring.push(wrapper),
            Backing::Linear(items) => {
                items.push(wrapper);
                None
            }
        }
    }

    pub(crate) fn get(&self, index: usize) -> Option<&EventWrapper> {
        match self {
            Backing::Cyclic(ring) => ring.get(index),
            Backing::Linear(items) => items.get(index),
        }
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut EventWrapper> {
        match self {
            Backing::Cyclic(ring) => ring.get_mut(index),
            Backing::Linear(items) => items.get_mut(index),
        }
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            Backing::Cyclic(ring) => ring.len(),
            Backing::Linear(items) => items.len(),
        }
    }

    pub(crate) fn clear(&mut self) {
        match self {
            Backing::Cyclic(ring) => ring.clear(),
            Backing::Linear(items) => items.clear(),
        }
    }

    pub(crate) fn iter(&self) -> Box<dyn Iterator<Item = &EventWrapper> + '_> {
        match self {
            Backing::Cyclic(ring) => Box::new(ring.iter()),
            Backing::Linear(items) => Box::new(items.iter()),
        }
    }

    /// Locates a wrapper by id. Ids are strictly increasing in arrival
    /// order, so this is a binary search over the logical indices.
    pub(crate) fn index_of(&self, id: EventId) -> Option<usize> {
        let mut lo = 0usize;
        let mut hi = self.len();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let mid_id = self.get(mid)?.id();
            if mid_id == id {
                return Some(mid);
            } else if mid_id < id {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        None
    }

    pub(crate) fn get_by_id(&self, id: EventId) -> Option<&EventWrapper> {
        self.index_of(id).and_then(|i| self.get(i))
    }

    pub(crate) fn get_by_id_mut(&mut self, id: EventId) -> Option<&mut EventWrapper> {
        self.index_of(id).and_then(move |i| self.get_mut(i))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn push_below_capacity() {
        let mut ring = BoundedRingStore::new(3);
        assert_eq!(ring.push(1), None);
        assert_eq!(ring.push(2), None);
        assert_eq!(ring.len(), 2);
        assert!(!ring.is_full());
        assert_eq!(ring.get(0), Some(&1));
        assert_eq!(ring.get(1), Some(&2));
    }

    #[test]
    fn push_evicts_oldest() {
        let mut ring = BoundedRingStore::new(3);
        assert_eq!(ring.push("a"), None);
        assert_eq!(ring.push("b"), None);
        assert_eq!(ring.push("c"), None);
        assert!(ring.is_full());

        assert_eq!(ring.push("d"), Some("a"));
        assert_eq!(ring.push("e"), Some("b"));
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec!["c", "d", "e"]);
    }

    #[test]
    fn get_out_of_range() {
        let mut ring = BoundedRingStore::new(2);
        assert_eq!(ring.push(10), None);
        assert_eq!(ring.get(1), None);
        assert_eq!(ring.get(99), None);
    }

    #[test]
    fn clear_keeps_capacity() {
        let mut ring = BoundedRingStore::new(2);
        assert_eq!(ring.push(1), None);
        assert_eq!(ring.push(2), None);
        assert_eq!(ring.push(3), Some(1));
        ring.clear();
        assert!(ring.is_empty());
        assert_eq!(ring.capacity(), 2);

        // Wraparound state does not leak across a clear
        assert_eq!(ring.push(4), None);
        assert_eq!(ring.get(0), Some(&4));
    }

    #[test]
    #[should_panic(expected = "non-zero")]
    fn zero_capacity_panics() {
        let _ = BoundedRingStore::<u32>::new(0);
    }
}
