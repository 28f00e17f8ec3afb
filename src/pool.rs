//! Generational Object Pool
//!
//! [`Pool<T>`] is the foundational arena allocator of the resource layer:
//! a growable array of slots with a free list and per-slot generation
//! counters. Freeing a slot bumps its generation, which permanently
//! invalidates every handle issued for the previous occupancy, even if the
//! slot is immediately reused. Growth never invalidates live handles.

use crate::handle::Handle;

const INITIAL_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Free,
    Occupied,
}

/// Growable slot arena with generation-checked handles.
#[derive(Debug)]
pub struct Pool<T> {
    items: Vec<Option<T>>,
    generations: Vec<u32>,
    states: Vec<SlotState>,
    free_list: Vec<u32>,
    count: usize,
}

impl<T> Pool<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let mut pool = Self {
            items: Vec::new(),
            generations: Vec::new(),
            states: Vec::new(),
            free_list: Vec::new(),
            count: 0,
        };
        if capacity > 0 {
            pool.grow_to(capacity);
        }
        pool
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Total slot capacity (occupied + free).
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.items.len()
    }

    fn grow_to(&mut self, new_capacity: usize) {
        let old = self.items.len();
        self.items.resize_with(new_capacity, || None);
        // New slots start at generation 1 so a zeroed handle never matches.
        self.generations.resize(new_capacity, 1);
        self.states.resize(new_capacity, SlotState::Free);
        for i in old..new_capacity {
            self.free_list.push(i as u32);
        }
    }

    /// Allocates a slot and stores `item` in it, returning a handle stamped
    /// with the slot's current generation. Grows 2x when the free list is
    /// empty.
    pub fn alloc(&mut self, item: T) -> Handle<T> {
        if self.free_list.is_empty() {
            let new_cap = if self.items.is_empty() {
                INITIAL_CAPACITY
            } else {
                self.items.len() * 2
            };
            self.grow_to(new_cap);
        }

        // The grow above guarantees a free index.
        let index = match self.free_list.pop() {
            Some(i) => i,
            None => return Handle::INVALID,
        };

        let i = index as usize;
        self.items[i] = Some(item);
        self.states[i] = SlotState::Occupied;
        self.count += 1;

        Handle::new(index, self.generations[i])
    }

    /// Frees the slot referenced by `h`, returning the item. Bumps the
    /// slot's generation so every outstanding handle for it becomes stale.
    /// Returns `None` if `h` is invalid, stale or already free.
    pub fn free(&mut self, h: Handle<T>) -> Option<T> {
        if !self.is_valid(h) {
            return None;
        }
        let i = h.index() as usize;
        let item = self.items[i].take();
        self.states[i] = SlotState::Free;
        self.generations[i] = self.generations[i].wrapping_add(1);
        self.free_list.push(h.index());
        self.count -= 1;
        item
    }

    /// A handle is valid iff its index is in range, the slot is occupied,
    /// and the stored generation matches.
    #[must_use]
    pub fn is_valid(&self, h: Handle<T>) -> bool {
        let i = h.index() as usize;
        i < self.items.len()
            && self.states[i] == SlotState::Occupied
            && self.generations[i] == h.generation()
    }

    #[must_use]
    pub fn get(&self, h: Handle<T>) -> Option<&T> {
        if self.is_valid(h) {
            self.items[h.index() as usize].as_ref()
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, h: Handle<T>) -> Option<&mut T> {
        if self.is_valid(h) {
            self.items[h.index() as usize].as_mut()
        } else {
            None
        }
    }

    /// Direct slot access for internal iteration. `None` for free slots.
    #[must_use]
    pub(crate) fn get_at(&self, index: u32) -> Option<&T> {
        self.items.get(index as usize).and_then(Option::as_ref)
    }

    pub(crate) fn get_at_mut(&mut self, index: u32) -> Option<&mut T> {
        self.items.get_mut(index as usize).and_then(Option::as_mut)
    }

    /// Rebuilds a handle for an occupied slot index.
    #[must_use]
    pub(crate) fn handle_at(&self, index: u32) -> Option<Handle<T>> {
        let i = index as usize;
        if i < self.items.len() && self.states[i] == SlotState::Occupied {
            Some(Handle::new(index, self.generations[i]))
        } else {
            None
        }
    }

    /// Visits occupied slots in index order. The closure returns `false` to
    /// terminate early.
    pub fn for_each(&self, mut f: impl FnMut(Handle<T>, &T) -> bool) {
        for i in 0..self.items.len() {
            if self.states[i] == SlotState::Occupied {
                if let Some(item) = self.items[i].as_ref() {
                    let h = Handle::new(i as u32, self.generations[i]);
                    if !f(h, item) {
                        break;
                    }
                }
            }
        }
    }

    /// Iterator over occupied slots in index order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.items.iter().enumerate().filter_map(move |(i, slot)| {
            if self.states[i] == SlotState::Occupied {
                slot.as_ref()
                    .map(|item| (Handle::new(i as u32, self.generations[i]), item))
            } else {
                None
            }
        })
    }

    /// Frees every occupied slot, bumping each generation, and rebuilds the
    /// free list. Outstanding handles all become stale.
    pub fn clear(&mut self) {
        for i in 0..self.items.len() {
            if self.states[i] == SlotState::Occupied {
                self.items[i] = None;
                self.states[i] = SlotState::Free;
                self.generations[i] = self.generations[i].wrapping_add(1);
            }
        }
        self.free_list.clear();
        for i in 0..self.items.len() {
            self.free_list.push(i as u32);
        }
        self.count = 0;
    }
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_then_get() {
        let mut pool = Pool::new();
        let h = pool.alloc(42u32);
        assert!(pool.is_valid(h));
        assert_eq!(pool.get(h), Some(&42));
        assert_eq!(pool.count(), 1);
    }

    #[test]
    fn free_invalidates_forever() {
        let mut pool = Pool::new();
        let h = pool.alloc(1u32);
        assert_eq!(pool.free(h), Some(1));
        assert!(!pool.is_valid(h));
        assert!(pool.get(h).is_none());

        // Reuse of the same slot index must not resurrect the old handle.
        let h2 = pool.alloc(2u32);
        assert_eq!(h2.index(), h.index());
        assert!(!pool.is_valid(h));
        assert!(pool.is_valid(h2));
    }

    #[test]
    fn double_free_is_rejected() {
        let mut pool = Pool::new();
        let h = pool.alloc(7u32);
        assert!(pool.free(h).is_some());
        assert!(pool.free(h).is_none());
        assert_eq!(pool.count(), 0);
    }

    #[test]
    fn growth_keeps_handles_valid() {
        let mut pool = Pool::with_capacity(2);
        let handles: Vec<_> = (0..100u32).map(|i| pool.alloc(i)).collect();
        for (i, h) in handles.iter().enumerate() {
            assert_eq!(pool.get(*h), Some(&(i as u32)));
        }
        assert_eq!(pool.count(), 100);
    }

    #[test]
    fn for_each_visits_in_index_order_with_early_exit() {
        let mut pool = Pool::new();
        for i in 0..5u32 {
            pool.alloc(i);
        }
        let mut seen = Vec::new();
        pool.for_each(|h, item| {
            seen.push((h.index(), *item));
            seen.len() < 3
        });
        assert_eq!(seen.len(), 3);
        assert!(seen.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn clear_invalidates_all() {
        let mut pool = Pool::new();
        let a = pool.alloc(1u32);
        let b = pool.alloc(2u32);
        pool.clear();
        assert!(!pool.is_valid(a));
        assert!(!pool.is_valid(b));
        assert_eq!(pool.count(), 0);
        // Slots are reusable afterwards.
        let c = pool.alloc(3u32);
        assert!(pool.is_valid(c));
    }
}
