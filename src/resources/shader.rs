//! Shader Registry
//!
//! Shaders carry vertex/fragment (and optionally geometry) source strings.
//! On top of the common registry contract they are deduplicated by a
//! content hash over all three sources, independent of UUID, and support
//! derived *variants*: a shader created from an "original" plus a transform
//! tag, snapshotting the original's version so staleness is a pure integer
//! comparison.

use log::{error, warn};

use crate::errors::{GfxError, Result};
use crate::handle::Handle;
use crate::hashing::{self, FNV_OFFSET_BASIS};
use crate::interner::{self, Symbol};
use crate::pool::Pool;
use crate::resource_map::ResourceMap;
use crate::resources::{ResourceHeader, generate_prefixed_uuid};

pub type ShaderHandle = Handle<Shader>;

/// Transform applied to an original shader to derive a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantOp {
    Skinning,
    Instancing,
    Morphing,
}

/// Lineage of a derived shader: which original it came from and the
/// original's version at derivation time.
#[derive(Debug, Clone, Copy)]
pub struct VariantInfo {
    pub original: ShaderHandle,
    pub op: VariantOp,
    pub original_version: u32,
}

#[derive(Debug)]
pub struct Shader {
    pub header: ResourceHeader,
    vertex_src: String,
    fragment_src: String,
    geometry_src: Option<String>,
    source_hash: Option<String>,
    pub source_path: Option<Symbol>,
    variant: Option<VariantInfo>,
}

impl Shader {
    fn new(uuid: &str) -> Self {
        Self {
            header: ResourceHeader::new(uuid),
            vertex_src: String::new(),
            fragment_src: String::new(),
            geometry_src: None,
            source_hash: None,
            source_path: None,
            variant: None,
        }
    }

    /// Content hash over all three sources, with a separator so that moving
    /// text between stages changes the hash. 16 lowercase hex digits.
    #[must_use]
    pub fn compute_source_hash(vertex: &str, fragment: &str, geometry: Option<&str>) -> String {
        let mut h = hashing::fnv1a_bytes(vertex.as_bytes(), FNV_OFFSET_BASIS);
        h = hashing::fnv1a_bytes(b"::", h);
        h = hashing::fnv1a_bytes(fragment.as_bytes(), h);
        h = hashing::fnv1a_bytes(b"::", h);
        if let Some(g) = geometry {
            h = hashing::fnv1a_bytes(g.as_bytes(), h);
        }
        hashing::hex16(h)
    }

    #[must_use]
    pub fn vertex_src(&self) -> &str {
        &self.vertex_src
    }

    #[must_use]
    pub fn fragment_src(&self) -> &str {
        &self.fragment_src
    }

    #[must_use]
    pub fn geometry_src(&self) -> Option<&str> {
        self.geometry_src.as_deref()
    }

    #[must_use]
    pub fn has_geometry(&self) -> bool {
        self.geometry_src.is_some()
    }

    #[must_use]
    pub fn source_hash(&self) -> Option<&str> {
        self.source_hash.as_deref()
    }

    /// Total bytes of source text across all stages.
    #[must_use]
    pub fn source_size(&self) -> usize {
        self.vertex_src.len()
            + self.fragment_src.len()
            + self.geometry_src.as_ref().map_or(0, String::len)
    }

    #[must_use]
    pub fn variant(&self) -> Option<&VariantInfo> {
        self.variant.as_ref()
    }

    #[must_use]
    pub fn is_variant(&self) -> bool {
        self.variant.is_some()
    }
}

/// Diagnostic snapshot of one shader.
#[derive(Debug, Clone)]
pub struct ShaderInfo {
    pub handle: ShaderHandle,
    pub uuid: String,
    pub name: Option<&'static str>,
    pub ref_count: u32,
    pub version: u32,
    pub source_hash: Option<String>,
    pub source_size: usize,
    pub has_geometry: bool,
    pub is_variant: bool,
}

/// Shader pool with a UUID map and a content-hash map for deduplication.
pub struct ShaderRegistry {
    pool: Pool<Shader>,
    uuid_to_index: ResourceMap,
    hash_to_index: ResourceMap,
    next_uuid: u64,
}

impl ShaderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pool: Pool::with_capacity(64),
            uuid_to_index: ResourceMap::new(),
            hash_to_index: ResourceMap::new(),
            next_uuid: 1,
        }
    }

    // ========================================================================
    // Create / find / destroy
    // ========================================================================

    pub fn create(&mut self, uuid: Option<&str>) -> Result<ShaderHandle> {
        let uuid = match uuid {
            Some(u) if !u.is_empty() => {
                if self.uuid_to_index.contains(u) {
                    warn!("shader create: uuid '{u}' already exists");
                    return Err(GfxError::DuplicateUuid(u.to_owned()));
                }
                u.to_owned()
            }
            _ => generate_prefixed_uuid("shader", &mut self.next_uuid),
        };

        let h = self.pool.alloc(Shader::new(&uuid));
        if h.is_invalid() {
            error!("shader create: pool alloc failed");
            return Err(GfxError::AllocationFailed("shader pool"));
        }
        let index = h.index();
        if let Some(shader) = self.pool.get_mut(h) {
            shader.header.set_pool_index(index);
        }
        if !self.uuid_to_index.add(&uuid, index) {
            error!("shader create: failed to add '{uuid}' to uuid map");
            self.pool.free(h);
            return Err(GfxError::AllocationFailed("shader uuid map"));
        }
        Ok(h)
    }

    #[must_use]
    pub fn find(&self, uuid: &str) -> Option<ShaderHandle> {
        let index = self.uuid_to_index.get(uuid)?;
        self.pool.handle_at(index)
    }

    #[must_use]
    pub fn find_by_hash(&self, hash: &str) -> Option<ShaderHandle> {
        let index = self.hash_to_index.get(hash)?;
        self.pool.handle_at(index)
    }

    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<ShaderHandle> {
        let sym = interner::get(name)?;
        let mut found = None;
        self.pool.for_each(|h, shader| {
            if shader.header.name == Some(sym) {
                found = Some(h);
                false
            } else {
                true
            }
        });
        found
    }

    pub fn get_or_create(&mut self, uuid: &str) -> Result<ShaderHandle> {
        if uuid.is_empty() {
            warn!("shader get_or_create: empty uuid");
            return Err(GfxError::MissingInput("uuid"));
        }
        if let Some(h) = self.find(uuid) {
            return Ok(h);
        }
        self.create(Some(uuid))
    }

    #[must_use]
    pub fn get(&self, h: ShaderHandle) -> Option<&Shader> {
        self.pool.get(h)
    }

    pub fn get_mut(&mut self, h: ShaderHandle) -> Option<&mut Shader> {
        self.pool.get_mut(h)
    }

    #[must_use]
    pub fn is_valid(&self, h: ShaderHandle) -> bool {
        self.pool.is_valid(h)
    }

    #[must_use]
    pub fn contains(&self, uuid: &str) -> bool {
        self.uuid_to_index.contains(uuid)
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.pool.count()
    }

    pub fn destroy(&mut self, h: ShaderHandle) -> bool {
        let Some(shader) = self.pool.get(h) else {
            return false;
        };
        let uuid = shader.header.uuid().to_owned();
        let hash = shader.source_hash.clone();
        self.uuid_to_index.remove(&uuid);
        // On a hash collision the first shader keeps the map entry; only
        // the owner may evict it.
        if let Some(hash) = hash {
            if self.hash_to_index.get(&hash) == Some(h.index()) {
                self.hash_to_index.remove(&hash);
            }
        }
        self.pool.free(h).is_some()
    }

    // ========================================================================
    // Reference counting
    // ========================================================================

    pub fn add_ref(&mut self, h: ShaderHandle) {
        if let Some(shader) = self.pool.get_mut(h) {
            shader.header.add_ref();
        }
    }

    pub fn release(&mut self, h: ShaderHandle) -> bool {
        let Some(shader) = self.pool.get_mut(h) else {
            warn!("shader release: invalid handle");
            return false;
        };
        if !shader.header.dec_ref() {
            warn!(
                "shader release: '{}' [{}] already at ref_count=0",
                shader.header.name_str().unwrap_or("?"),
                shader.header.uuid()
            );
            return false;
        }
        if shader.header.ref_count() == 0 {
            self.destroy(h);
            return true;
        }
        false
    }

    // ========================================================================
    // Sources / deduplication
    // ========================================================================

    /// Replaces the shader's sources. A hash identical to the current one is
    /// a no-op (returns `Ok(false)`); otherwise the hash map is rekeyed, the
    /// version bumped, and `Ok(true)` returned.
    pub fn set_sources(
        &mut self,
        h: ShaderHandle,
        vertex: &str,
        fragment: &str,
        geometry: Option<&str>,
    ) -> Result<bool> {
        if vertex.is_empty() || fragment.is_empty() {
            return Err(GfxError::MissingInput("vertex/fragment source"));
        }
        let new_hash = Shader::compute_source_hash(vertex, fragment, geometry);

        let Some(shader) = self.pool.get_mut(h) else {
            return Err(GfxError::InvalidHandle);
        };
        if shader.source_hash.as_deref() == Some(new_hash.as_str()) {
            return Ok(false);
        }

        let old_hash = shader.source_hash.take();
        shader.vertex_src = vertex.to_owned();
        shader.fragment_src = fragment.to_owned();
        shader.geometry_src = geometry.map(str::to_owned);
        shader.source_hash = Some(new_hash.clone());
        shader.header.bump_version();
        let index = shader.header.pool_index();

        if let Some(old) = old_hash {
            if self.hash_to_index.get(&old) == Some(index) {
                self.hash_to_index.remove(&old);
            }
        }
        // A hash collision across distinct UUIDs leaves the first owner in
        // the map; dedup lookups then resolve to that one.
        if !self.hash_to_index.contains(&new_hash) {
            self.hash_to_index.add(&new_hash, index);
        }
        Ok(true)
    }

    /// Deduplicating constructor. Without a UUID hint, an existing shader
    /// with the same content hash is returned as-is; otherwise a new shader
    /// is created. With a hint, the shader at that UUID is created or
    /// updated in place (version bumps only when the hash changed).
    pub fn from_sources(
        &mut self,
        vertex: &str,
        fragment: &str,
        geometry: Option<&str>,
        uuid_hint: Option<&str>,
        name: Option<&str>,
    ) -> Result<ShaderHandle> {
        if vertex.is_empty() || fragment.is_empty() {
            return Err(GfxError::MissingInput("vertex/fragment source"));
        }

        let h = match uuid_hint {
            Some(u) if !u.is_empty() => self.get_or_create(u)?,
            _ => {
                let hash = Shader::compute_source_hash(vertex, fragment, geometry);
                if let Some(existing) = self.find_by_hash(&hash) {
                    return Ok(existing);
                }
                self.create(None)?
            }
        };
        self.set_sources(h, vertex, fragment, geometry)?;
        if let (Some(name), Some(shader)) = (name, self.pool.get_mut(h)) {
            shader.header.set_name(name);
        }
        Ok(h)
    }

    // ========================================================================
    // Variants
    // ========================================================================

    /// Marks `h` as a variant of `original`, snapshotting the original's
    /// current version.
    pub fn set_variant_info(
        &mut self,
        h: ShaderHandle,
        original: ShaderHandle,
        op: VariantOp,
    ) -> Result<()> {
        let original_version = self
            .pool
            .get(original)
            .ok_or(GfxError::InvalidHandle)?
            .header
            .version();
        let shader = self.pool.get_mut(h).ok_or(GfxError::InvalidHandle)?;
        shader.variant = Some(VariantInfo {
            original,
            op,
            original_version,
        });
        Ok(())
    }

    /// True iff the original was destroyed or its version advanced past the
    /// snapshot taken at variant creation. Pure comparison; nothing is
    /// recompiled or invalidated here.
    #[must_use]
    pub fn variant_is_stale(&self, h: ShaderHandle) -> bool {
        let Some(info) = self.pool.get(h).and_then(|s| s.variant) else {
            return false;
        };
        match self.pool.get(info.original) {
            Some(original) => original.header.version() != info.original_version,
            None => true,
        }
    }

    // ========================================================================
    // Iteration / diagnostics
    // ========================================================================

    pub fn for_each(&self, f: impl FnMut(ShaderHandle, &Shader) -> bool) {
        self.pool.for_each(f);
    }

    #[must_use]
    pub fn collect_info(&self) -> Vec<ShaderInfo> {
        let mut infos = Vec::with_capacity(self.pool.count());
        self.pool.for_each(|h, shader| {
            infos.push(ShaderInfo {
                handle: h,
                uuid: shader.header.uuid().to_owned(),
                name: shader.header.name_str(),
                ref_count: shader.header.ref_count(),
                version: shader.header.version(),
                source_hash: shader.source_hash.clone(),
                source_size: shader.source_size(),
                has_geometry: shader.has_geometry(),
                is_variant: shader.is_variant(),
            });
            true
        });
        infos
    }

    pub fn clear(&mut self) {
        self.pool.clear();
        self.uuid_to_index.clear();
        self.hash_to_index.clear();
    }
}

impl Default for ShaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VS: &str = "void main() { gl_Position = vec4(0.0); }";
    const FS: &str = "void main() { out_color = vec4(1.0); }";

    #[test]
    fn from_sources_dedups_identical_content() {
        let mut reg = ShaderRegistry::new();
        let a = reg.from_sources(VS, FS, None, None, None).unwrap();
        let b = reg.from_sources(VS, FS, None, None, None).unwrap();
        assert_eq!(a, b);
        assert_eq!(reg.count(), 1);

        let c = reg.from_sources(VS, "void main() {}", None, None, None).unwrap();
        assert_ne!(a, c);
        assert_eq!(reg.count(), 2);
    }

    #[test]
    fn set_sources_same_hash_is_noop() {
        let mut reg = ShaderRegistry::new();
        let h = reg.from_sources(VS, FS, None, Some("s1"), None).unwrap();
        let v = reg.get(h).unwrap().header.version();

        assert!(!reg.set_sources(h, VS, FS, None).unwrap());
        assert_eq!(reg.get(h).unwrap().header.version(), v);

        assert!(reg.set_sources(h, VS, "void main() {}", None).unwrap());
        assert_eq!(reg.get(h).unwrap().header.version(), v + 1);
    }

    #[test]
    fn from_sources_with_uuid_updates_in_place() {
        let mut reg = ShaderRegistry::new();
        let a = reg.from_sources(VS, FS, None, Some("s1"), None).unwrap();
        let b = reg
            .from_sources(VS, "void main() {}", None, Some("s1"), None)
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(reg.get(a).unwrap().header.version(), 3);
    }

    #[test]
    fn hash_covers_stage_boundaries() {
        // Same concatenated text split differently across stages must hash
        // differently.
        let h1 = Shader::compute_source_hash("ab", "c", None);
        let h2 = Shader::compute_source_hash("a", "bc", None);
        assert_ne!(h1, h2);

        let h3 = Shader::compute_source_hash("a", "b", Some("g"));
        let h4 = Shader::compute_source_hash("a", "b", None);
        assert_ne!(h3, h4);
    }

    #[test]
    fn variant_staleness_tracks_original_version() {
        let mut reg = ShaderRegistry::new();
        let original = reg.from_sources(VS, FS, None, Some("base"), None).unwrap();
        let variant = reg
            .from_sources(VS, FS, Some("void main() {}"), Some("base-skin"), None)
            .unwrap();
        reg.set_variant_info(variant, original, VariantOp::Skinning)
            .unwrap();
        assert!(!reg.variant_is_stale(variant));

        // Mutating the original flips staleness without touching the variant.
        reg.set_sources(original, VS, "void main() { discard; }", None)
            .unwrap();
        assert!(reg.variant_is_stale(variant));
    }

    #[test]
    fn variant_stale_when_original_destroyed() {
        let mut reg = ShaderRegistry::new();
        let original = reg.from_sources(VS, FS, None, Some("base"), None).unwrap();
        let variant = reg
            .from_sources("x", "y", None, Some("var"), None)
            .unwrap();
        reg.set_variant_info(variant, original, VariantOp::Instancing)
            .unwrap();

        reg.destroy(original);
        assert!(reg.variant_is_stale(variant));
    }

    #[test]
    fn destroy_removes_hash_entry() {
        let mut reg = ShaderRegistry::new();
        let h = reg.from_sources(VS, FS, None, None, None).unwrap();
        let hash = reg.get(h).unwrap().source_hash().unwrap().to_owned();

        reg.destroy(h);
        assert!(reg.find_by_hash(&hash).is_none());

        // Fresh creation from the same sources must work again.
        let h2 = reg.from_sources(VS, FS, None, None, None).unwrap();
        assert!(reg.is_valid(h2));
    }

    #[test]
    fn destroying_a_hash_duplicate_keeps_the_owner_entry() {
        let mut reg = ShaderRegistry::new();
        // Explicit uuids bypass dedup, so two shaders share one content hash
        // and the first owns the map entry.
        let a = reg.from_sources(VS, FS, None, Some("s1"), None).unwrap();
        let b = reg.from_sources(VS, FS, None, Some("s2"), None).unwrap();
        let hash = reg.get(a).unwrap().source_hash().unwrap().to_owned();
        assert_eq!(reg.find_by_hash(&hash), Some(a));

        reg.destroy(b);
        assert_eq!(reg.find_by_hash(&hash), Some(a));
        assert_eq!(reg.from_sources(VS, FS, None, None, None).unwrap(), a);
    }
}
