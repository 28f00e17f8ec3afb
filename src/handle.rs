//! Generic Resource Handle
//!
//! A [`Handle<T>`] is an (index, generation) pair identifying a slot in a
//! [`Pool`](crate::pool::Pool). Handles are the only sanctioned external
//! reference to a pooled resource: they are `Copy`, never dangle, and a
//! handle captured before a `free` becomes permanently invalid because the
//! slot's generation is bumped on every free.
//!
//! The phantom marker ties a handle to its resource type at compile time,
//! so a `Handle<Mesh>` cannot be passed where a `Handle<Shader>` is
//! expected, while the invalid-sentinel and equality logic exists once.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Typed (index, generation) reference into a [`Pool<T>`](crate::pool::Pool).
pub struct Handle<T> {
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    /// The invalid sentinel: `index == u32::MAX`.
    pub const INVALID: Self = Self {
        index: u32::MAX,
        generation: 0,
        _marker: PhantomData,
    };

    #[must_use]
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            _marker: PhantomData,
        }
    }

    /// Slot index into the owning pool. Also used to key GPU slot arrays.
    #[must_use]
    pub fn index(self) -> u32 {
        self.index
    }

    /// Generation the handle was issued with.
    #[must_use]
    pub fn generation(self) -> u32 {
        self.generation
    }

    /// Whether this is the invalid sentinel. A non-sentinel handle may still
    /// be stale; validity against a live pool is checked by
    /// [`Pool::is_valid`](crate::pool::Pool::is_valid).
    #[must_use]
    pub fn is_invalid(self) -> bool {
        self.index == u32::MAX
    }
}

// Manual impls: deriving would bound T, but the marker carries no data.

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> Default for Handle<T> {
    fn default() -> Self {
        Self::INVALID
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_invalid() {
            write!(f, "Handle(invalid)")
        } else {
            write!(f, "Handle({}v{})", self.index, self.generation)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy;

    #[test]
    fn invalid_sentinel() {
        let h: Handle<Dummy> = Handle::INVALID;
        assert!(h.is_invalid());
        assert_eq!(h, Handle::default());
    }

    #[test]
    fn equality_requires_both_fields() {
        let a: Handle<Dummy> = Handle::new(3, 1);
        let b: Handle<Dummy> = Handle::new(3, 2);
        let c: Handle<Dummy> = Handle::new(3, 1);
        assert_ne!(a, b);
        assert_eq!(a, c);
    }
}
