//! CPU-side Resource Registries
//!
//! One registry per resource kind (mesh, shader, texture, material), each
//! built from one [`Pool`](crate::pool::Pool) plus one or two
//! [`ResourceMap`](crate::resource_map::ResourceMap)s. Registries own the
//! CPU-side data; handles are the only external reference, and explicit
//! `add_ref`/`release` pairs decide lifetime — the last release destroys
//! the resource and invalidates its handle via a generation bump.

pub mod material;
pub mod mesh;
pub mod primitives;
pub mod shader;
pub mod texture;

use crate::interner::{self, Symbol};

/// Maximum UUID length in bytes; longer caller-supplied UUIDs are truncated.
pub const UUID_MAX_LEN: usize = 39;

/// Common header shared by every resource kind.
///
/// `version` starts at 1 and is bumped on any data-affecting mutation; the
/// GPU sync layer compares it against cached slot versions to decide when
/// to re-upload. `pool_index` always equals the slot the resource occupies
/// and keys the share-group GPU slot arrays.
#[derive(Debug, Clone)]
pub struct ResourceHeader {
    uuid: String,
    pub name: Option<Symbol>,
    version: u32,
    ref_count: u32,
    pool_index: u32,
    is_loaded: bool,
}

impl ResourceHeader {
    #[must_use]
    pub fn new(uuid: &str) -> Self {
        let mut uuid = uuid.to_owned();
        if uuid.len() > UUID_MAX_LEN {
            // Back off to a char boundary so multi-byte tails cannot panic.
            let mut cut = UUID_MAX_LEN;
            while !uuid.is_char_boundary(cut) {
                cut -= 1;
            }
            uuid.truncate(cut);
        }
        Self {
            uuid,
            name: None,
            version: 1,
            ref_count: 0,
            pool_index: 0,
            is_loaded: false,
        }
    }

    #[must_use]
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    #[must_use]
    pub fn name_str(&self) -> Option<&'static str> {
        self.name.map(interner::resolve)
    }

    pub fn set_name(&mut self, name: &str) {
        if !name.is_empty() {
            self.name = Some(interner::intern(name));
        }
    }

    /// Label for diagnostics: the name when set, otherwise the uuid.
    #[must_use]
    pub fn label(&self) -> &str {
        self.name_str().unwrap_or(&self.uuid)
    }

    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Marks a data-affecting mutation. Monotonic; never decreases.
    pub fn bump_version(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    pub(crate) fn set_version(&mut self, version: u32) {
        self.version = version;
    }

    #[must_use]
    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }

    pub(crate) fn add_ref(&mut self) {
        self.ref_count += 1;
    }

    /// Decrements the refcount. Returns `false` on underflow (caller logs).
    pub(crate) fn dec_ref(&mut self) -> bool {
        if self.ref_count == 0 {
            return false;
        }
        self.ref_count -= 1;
        true
    }

    #[must_use]
    pub fn pool_index(&self) -> u32 {
        self.pool_index
    }

    pub(crate) fn set_pool_index(&mut self, index: u32) {
        self.pool_index = index;
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.is_loaded
    }

    pub(crate) fn set_loaded(&mut self, loaded: bool) {
        self.is_loaded = loaded;
    }
}

/// Synthesizes a registry UUID of the form `"<prefix>-<16 hex digits>"`
/// from a monotonically increasing counter.
#[must_use]
pub(crate) fn generate_prefixed_uuid(prefix: &str, counter: &mut u64) -> String {
    let uuid = format!("{prefix}-{:016x}", *counter);
    *counter += 1;
    uuid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_starts_at_version_1() {
        let h = ResourceHeader::new("abc");
        assert_eq!(h.version(), 1);
        assert_eq!(h.ref_count(), 0);
        assert_eq!(h.uuid(), "abc");
    }

    #[test]
    fn long_uuid_is_truncated() {
        let long = "x".repeat(64);
        let h = ResourceHeader::new(&long);
        assert_eq!(h.uuid().len(), UUID_MAX_LEN);
    }

    #[test]
    fn long_uuid_truncation_respects_char_boundaries() {
        // 'é' straddles the byte limit; the cut backs off instead of
        // splitting the char.
        let long = format!("{}é", "x".repeat(UUID_MAX_LEN - 1));
        let h = ResourceHeader::new(&long);
        assert_eq!(h.uuid(), "x".repeat(UUID_MAX_LEN - 1));
    }

    #[test]
    fn prefixed_uuid_format() {
        let mut counter = 1u64;
        assert_eq!(
            generate_prefixed_uuid("mesh", &mut counter),
            "mesh-0000000000000001"
        );
        assert_eq!(
            generate_prefixed_uuid("mesh", &mut counter),
            "mesh-0000000000000002"
        );
    }

    #[test]
    fn label_prefers_name() {
        let mut h = ResourceHeader::new("uuid-1");
        assert_eq!(h.label(), "uuid-1");
        h.set_name("bricks");
        assert_eq!(h.label(), "bricks");
    }
}
