//! UUID Resource Map
//!
//! Open-addressed hash table mapping a UUID string to a packed pool index,
//! used for name/uuid lookup atop a [`Pool`](crate::pool::Pool). Deletions
//! leave tombstones so probe chains stay intact; the table resizes (full
//! rehash) once live entries plus tombstones exceed ~70% of capacity.
//!
//! Values are `u32` pool indices. Linear probing with FNV-1a hashing keeps
//! the table simple and predictable for the low-thousands entry counts
//! registries are expected to hold.

use crate::hashing::fnv1a_str;

const INITIAL_CAPACITY: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Entry {
    Empty,
    Tombstone,
    Occupied { key: String, value: u32 },
}

/// Open-addressed UUID → pool-index table with tombstone deletion.
#[derive(Debug)]
pub struct ResourceMap {
    entries: Vec<Entry>,
    count: usize,
    deleted: usize,
}

impl ResourceMap {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: vec![Entry::Empty; INITIAL_CAPACITY],
            count: 0,
            deleted: 0,
        }
    }

    /// Number of live entries (tombstones excluded).
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Inserts `key → value`. Returns `false` if the key already exists.
    pub fn add(&mut self, key: &str, value: u32) -> bool {
        if self.contains(key) {
            return false;
        }

        // Resize at ~70% load, counting tombstones.
        if (self.count + self.deleted) * 10 > self.entries.len() * 7 {
            self.resize(self.entries.len() * 2);
        }

        let mask = self.entries.len() - 1;
        let start = (fnv1a_str(key) as usize) & mask;
        let mut first_tombstone = None;

        for i in 0..self.entries.len() {
            let probe = (start + i) & mask;
            match &self.entries[probe] {
                Entry::Empty => {
                    let slot = match first_tombstone {
                        Some(t) => {
                            self.deleted -= 1;
                            t
                        }
                        None => probe,
                    };
                    self.entries[slot] = Entry::Occupied {
                        key: key.to_owned(),
                        value,
                    };
                    self.count += 1;
                    return true;
                }
                Entry::Tombstone => {
                    if first_tombstone.is_none() {
                        first_tombstone = Some(probe);
                    }
                }
                Entry::Occupied { .. } => {}
            }
        }

        false
    }

    /// Looks up the packed index for `key`. Probing skips tombstones but
    /// stops at true empty slots.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<u32> {
        let mask = self.entries.len() - 1;
        let start = (fnv1a_str(key) as usize) & mask;

        for i in 0..self.entries.len() {
            let probe = (start + i) & mask;
            match &self.entries[probe] {
                Entry::Empty => return None,
                Entry::Occupied { key: k, value } if k == key => return Some(*value),
                _ => {}
            }
        }
        None
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Removes `key`, leaving a tombstone. Returns `false` if absent.
    pub fn remove(&mut self, key: &str) -> bool {
        let mask = self.entries.len() - 1;
        let start = (fnv1a_str(key) as usize) & mask;

        for i in 0..self.entries.len() {
            let probe = (start + i) & mask;
            match &self.entries[probe] {
                Entry::Empty => return false,
                Entry::Occupied { key: k, .. } if k == key => {
                    self.entries[probe] = Entry::Tombstone;
                    self.count -= 1;
                    self.deleted += 1;
                    return true;
                }
                _ => {}
            }
        }
        false
    }

    /// Visits live entries; the closure returns `false` to terminate early.
    pub fn for_each(&self, mut f: impl FnMut(&str, u32) -> bool) {
        for entry in &self.entries {
            if let Entry::Occupied { key, value } = entry {
                if !f(key, *value) {
                    break;
                }
            }
        }
    }

    /// Drops all entries and tombstones and resets counters.
    pub fn clear(&mut self) {
        for entry in &mut self.entries {
            *entry = Entry::Empty;
        }
        self.count = 0;
        self.deleted = 0;
    }

    /// Rehashes every live entry into a fresh table; tombstones are
    /// discarded rather than relocated.
    fn resize(&mut self, new_capacity: usize) {
        let old = std::mem::replace(&mut self.entries, vec![Entry::Empty; new_capacity]);
        self.count = 0;
        self.deleted = 0;

        let mask = new_capacity - 1;
        for entry in old {
            if let Entry::Occupied { key, value } = entry {
                let start = (fnv1a_str(&key) as usize) & mask;
                for i in 0..new_capacity {
                    let probe = (start + i) & mask;
                    if matches!(self.entries[probe], Entry::Empty) {
                        self.entries[probe] = Entry::Occupied { key, value };
                        self.count += 1;
                        break;
                    }
                }
            }
        }
    }
}

impl Default for ResourceMap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_get_remove() {
        let mut map = ResourceMap::new();
        assert!(map.add("mesh-1", 0));
        assert!(map.add("mesh-2", 1));
        assert!(!map.add("mesh-1", 5), "duplicate add must fail");

        assert_eq!(map.get("mesh-1"), Some(0));
        assert_eq!(map.get("mesh-2"), Some(1));
        assert_eq!(map.get("mesh-3"), None);

        assert!(map.remove("mesh-1"));
        assert!(!map.remove("mesh-1"));
        assert_eq!(map.get("mesh-1"), None);
        assert_eq!(map.count(), 1);
    }

    #[test]
    fn tombstones_do_not_break_probe_chains() {
        let mut map = ResourceMap::new();
        // Enough keys to force collisions in a 16-slot table.
        for i in 0..10u32 {
            assert!(map.add(&format!("key-{i}"), i));
        }
        for i in 0..5u32 {
            assert!(map.remove(&format!("key-{i}")));
        }
        // Remaining keys must still be reachable through tombstones.
        for i in 5..10u32 {
            assert_eq!(map.get(&format!("key-{i}")), Some(i));
        }
        // Deleted keys can be re-added (tombstone reuse).
        for i in 0..5u32 {
            assert!(map.add(&format!("key-{i}"), i + 100));
            assert_eq!(map.get(&format!("key-{i}")), Some(i + 100));
        }
    }

    #[test]
    fn survives_growth() {
        let mut map = ResourceMap::new();
        for i in 0..1000u32 {
            assert!(map.add(&format!("uuid-{i:04}"), i));
        }
        assert_eq!(map.count(), 1000);
        for i in 0..1000u32 {
            assert_eq!(map.get(&format!("uuid-{i:04}")), Some(i));
        }
    }

    #[test]
    fn for_each_early_exit() {
        let mut map = ResourceMap::new();
        for i in 0..8u32 {
            map.add(&format!("k{i}"), i);
        }
        let mut visited = 0;
        map.for_each(|_, _| {
            visited += 1;
            visited < 3
        });
        assert_eq!(visited, 3);
    }
}
