//! Mesh Registry
//!
//! Meshes hold an interleaved vertex buffer, an index buffer and a
//! [`VertexLayout`]. Besides the common create/find/destroy contract the
//! registry supports a declare/lazy-load protocol: `declare` registers an
//! unloaded placeholder, and `ensure_loaded` invokes a registered loader
//! exactly once. The loader table is the one mutex-guarded structure in
//! the core, because loaders may be registered from a different call site
//! than the one that triggers loading.

use log::{error, info, warn};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::errors::{GfxError, Result};
use crate::handle::Handle;
use crate::hashing::{self, FNV_PRIME};
use crate::pool::Pool;
use crate::resource_map::ResourceMap;
use crate::resources::{ResourceHeader, generate_prefixed_uuid};
use crate::vertex::{DrawMode, VertexLayout};

pub type MeshHandle = Handle<Mesh>;

/// Loader invoked by [`MeshRegistry::ensure_loaded`]. Returns `true` when
/// the mesh data was populated successfully.
pub type MeshLoader = Box<dyn FnMut(&mut Mesh) -> bool + Send>;

/// CPU-side mesh: interleaved vertices + indices + layout.
#[derive(Debug)]
pub struct Mesh {
    pub header: ResourceHeader,
    vertices: Vec<u8>,
    vertex_count: usize,
    indices: Vec<u32>,
    layout: VertexLayout,
    pub draw_mode: DrawMode,
}

impl Mesh {
    fn new(uuid: &str) -> Self {
        Self {
            header: ResourceHeader::new(uuid),
            vertices: Vec::new(),
            vertex_count: 0,
            indices: Vec::new(),
            layout: VertexLayout::default(),
            draw_mode: DrawMode::default(),
        }
    }

    #[must_use]
    pub fn vertices(&self) -> &[u8] {
        &self.vertices
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    #[must_use]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    #[must_use]
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    #[must_use]
    pub fn layout(&self) -> &VertexLayout {
        &self.layout
    }

    #[must_use]
    pub fn has_data(&self) -> bool {
        !self.vertices.is_empty()
    }

    /// Replaces vertices and indices in one step (single version bump) and
    /// marks the mesh loaded.
    pub fn set_data(
        &mut self,
        vertices: &[u8],
        vertex_count: usize,
        layout: &VertexLayout,
        indices: &[u32],
        name: Option<&str>,
    ) -> Result<()> {
        if vertices.len() != vertex_count * layout.stride() as usize {
            return Err(GfxError::MissingInput("vertex data does not match layout"));
        }
        if let Some(name) = name {
            self.header.set_name(name);
        }
        self.vertices = vertices.to_vec();
        self.vertex_count = vertex_count;
        self.layout = layout.clone();
        self.indices = indices.to_vec();
        self.header.bump_version();
        self.header.set_loaded(true);
        Ok(())
    }

    /// Replaces only the vertex buffer and layout.
    pub fn set_vertices(
        &mut self,
        vertices: &[u8],
        vertex_count: usize,
        layout: &VertexLayout,
    ) -> Result<()> {
        if vertices.len() != vertex_count * layout.stride() as usize {
            return Err(GfxError::MissingInput("vertex data does not match layout"));
        }
        self.vertices = vertices.to_vec();
        self.vertex_count = vertex_count;
        self.layout = layout.clone();
        self.header.bump_version();
        Ok(())
    }

    /// Replaces only the index buffer.
    pub fn set_indices(&mut self, indices: &[u32]) {
        self.indices = indices.to_vec();
        self.header.bump_version();
    }

    /// Content-derived UUID: FNV-1a over vertices and indices, combined and
    /// rendered as 16 hex digits.
    #[must_use]
    pub fn compute_uuid(vertices: &[u8], indices: &[u32]) -> String {
        let h1 = hashing::fnv1a(vertices);
        let mut index_bytes = Vec::with_capacity(indices.len() * 4);
        for i in indices {
            index_bytes.extend_from_slice(&i.to_le_bytes());
        }
        let h2 = hashing::fnv1a(&index_bytes);
        hashing::hex16(h1 ^ h2.wrapping_mul(FNV_PRIME))
    }
}

/// Diagnostic snapshot of one mesh.
#[derive(Debug, Clone)]
pub struct MeshInfo {
    pub handle: MeshHandle,
    pub uuid: String,
    pub name: Option<&'static str>,
    pub ref_count: u32,
    pub version: u32,
    pub vertex_count: usize,
    pub index_count: usize,
    pub stride: u16,
    pub memory_bytes: usize,
    pub is_loaded: bool,
    pub has_loader: bool,
}

/// UUID-indexed mesh pool with lazy-load support.
pub struct MeshRegistry {
    pool: Pool<Mesh>,
    uuid_to_index: ResourceMap,
    next_uuid: u64,
    // Keyed by pool index. Guarded because loaders can be registered from a
    // different call site (e.g. an asset scanner thread) than the draw path
    // that invokes them.
    loaders: Mutex<FxHashMap<u32, MeshLoader>>,
}

impl MeshRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pool: Pool::with_capacity(64),
            uuid_to_index: ResourceMap::new(),
            next_uuid: 1,
            loaders: Mutex::new(FxHashMap::default()),
        }
    }

    // ========================================================================
    // Create / find / destroy
    // ========================================================================

    /// Creates a mesh. With an explicit UUID the call fails if the UUID is
    /// taken (use [`get_or_create`](Self::get_or_create) for idempotence);
    /// without one, a `mesh-<counter>` UUID is synthesized.
    pub fn create(&mut self, uuid: Option<&str>) -> Result<MeshHandle> {
        let uuid = match uuid {
            Some(u) if !u.is_empty() => {
                if self.uuid_to_index.contains(u) {
                    warn!("mesh create: uuid '{u}' already exists");
                    return Err(GfxError::DuplicateUuid(u.to_owned()));
                }
                u.to_owned()
            }
            _ => generate_prefixed_uuid("mesh", &mut self.next_uuid),
        };

        let mut mesh = Mesh::new(&uuid);
        // Created meshes are considered loaded; data will be set directly.
        mesh.header.set_loaded(true);
        let h = self.pool.alloc(mesh);
        if h.is_invalid() {
            error!("mesh create: pool alloc failed");
            return Err(GfxError::AllocationFailed("mesh pool"));
        }

        let index = h.index();
        if let Some(mesh) = self.pool.get_mut(h) {
            mesh.header.set_pool_index(index);
        }
        if !self.uuid_to_index.add(&uuid, index) {
            error!("mesh create: failed to add '{uuid}' to uuid map");
            self.pool.free(h);
            return Err(GfxError::AllocationFailed("mesh uuid map"));
        }
        Ok(h)
    }

    #[must_use]
    pub fn find(&self, uuid: &str) -> Option<MeshHandle> {
        let index = self.uuid_to_index.get(uuid)?;
        self.pool.handle_at(index)
    }

    /// Linear scan; registries are not expected to hold more than low
    /// thousands of entries.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<MeshHandle> {
        let sym = crate::interner::get(name)?;
        let mut found = None;
        self.pool.for_each(|h, mesh| {
            if mesh.header.name == Some(sym) {
                found = Some(h);
                false
            } else {
                true
            }
        });
        found
    }

    pub fn get_or_create(&mut self, uuid: &str) -> Result<MeshHandle> {
        if uuid.is_empty() {
            warn!("mesh get_or_create: empty uuid");
            return Err(GfxError::MissingInput("uuid"));
        }
        if let Some(h) = self.find(uuid) {
            return Ok(h);
        }
        self.create(Some(uuid))
    }

    #[must_use]
    pub fn get(&self, h: MeshHandle) -> Option<&Mesh> {
        self.pool.get(h)
    }

    pub fn get_mut(&mut self, h: MeshHandle) -> Option<&mut Mesh> {
        self.pool.get_mut(h)
    }

    #[must_use]
    pub fn is_valid(&self, h: MeshHandle) -> bool {
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

    /// Removes the mesh from the uuid map, drops its data and loader, and
    /// frees the pool slot (bumping its generation).
    pub fn destroy(&mut self, h: MeshHandle) -> bool {
        let Some(mesh) = self.pool.get(h) else {
            return false;
        };
        info!(
            "mesh destroy: uuid={} name={} refcount={}",
            mesh.header.uuid(),
            mesh.header.name_str().unwrap_or("(none)"),
            mesh.header.ref_count()
        );
        let uuid = mesh.header.uuid().to_owned();
        self.uuid_to_index.remove(&uuid);
        self.loaders.lock().remove(&h.index());
        self.pool.free(h).is_some()
    }

    // ========================================================================
    // Reference counting
    // ========================================================================

    pub fn add_ref(&mut self, h: MeshHandle) {
        if let Some(mesh) = self.pool.get_mut(h) {
            mesh.header.add_ref();
        }
    }

    /// Decrements the refcount; reaching zero destroys the mesh. Releasing
    /// an already-zero resource is a logged no-op.
    pub fn release(&mut self, h: MeshHandle) -> bool {
        let Some(mesh) = self.pool.get_mut(h) else {
            warn!("mesh release: invalid handle");
            return false;
        };
        if !mesh.header.dec_ref() {
            warn!(
                "mesh release: '{}' [{}] already at ref_count=0",
                mesh.header.name_str().unwrap_or("?"),
                mesh.header.uuid()
            );
            return false;
        }
        if mesh.header.ref_count() == 0 {
            self.destroy(h);
            return true;
        }
        false
    }

    // ========================================================================
    // Lazy loading
    // ========================================================================

    /// Registers an unloaded placeholder. Idempotent: an existing UUID
    /// returns its handle unchanged.
    pub fn declare(&mut self, uuid: &str, name: Option<&str>) -> Result<MeshHandle> {
        if uuid.is_empty() {
            return Err(GfxError::MissingInput("uuid"));
        }
        if let Some(existing) = self.find(uuid) {
            return Ok(existing);
        }

        let mut mesh = Mesh::new(uuid);
        // Placeholder: no data yet, version 0 so the first real load lands
        // the mesh at version 1.
        mesh.header.set_version(0);
        if let Some(name) = name {
            mesh.header.set_name(name);
        }
        let h = self.pool.alloc(mesh);
        if h.is_invalid() {
            error!("mesh declare: pool alloc failed");
            return Err(GfxError::AllocationFailed("mesh pool"));
        }
        let index = h.index();
        if let Some(mesh) = self.pool.get_mut(h) {
            mesh.header.set_pool_index(index);
        }
        if !self.uuid_to_index.add(uuid, index) {
            error!("mesh declare: failed to add '{uuid}' to uuid map");
            self.pool.free(h);
            return Err(GfxError::AllocationFailed("mesh uuid map"));
        }
        Ok(h)
    }

    pub fn set_loader(&self, h: MeshHandle, loader: MeshLoader) {
        if self.pool.is_valid(h) {
            self.loaders.lock().insert(h.index(), loader);
        }
    }

    #[must_use]
    pub fn is_loaded(&self, h: MeshHandle) -> bool {
        self.pool.get(h).is_some_and(|m| m.header.is_loaded())
    }

    /// Invokes the registered loader if the mesh is not yet loaded.
    /// Idempotent when already loaded; a failed load leaves the mesh
    /// unloaded (and its version untouched) so a later retry can succeed.
    pub fn ensure_loaded(&mut self, h: MeshHandle) -> bool {
        if !self.pool.is_valid(h) {
            return false;
        }
        if self.is_loaded(h) {
            return true;
        }

        let mut loaders = self.loaders.lock();
        let Some(loader) = loaders.get_mut(&h.index()) else {
            let uuid = self.pool.get(h).map_or(String::new(), |m| {
                m.header.uuid().to_owned()
            });
            warn!("mesh ensure_loaded: '{uuid}' has no loader");
            return false;
        };

        let Some(mesh) = self.pool.get_at_mut(h.index()) else {
            return false;
        };
        let success = loader(mesh);
        if success {
            mesh.header.set_loaded(true);
        } else {
            error!("mesh ensure_loaded: loader failed for '{}'", mesh.header.uuid());
        }
        success
    }

    // ========================================================================
    // Convenience constructors
    // ========================================================================

    /// Gets or creates a mesh from interleaved data, deduplicating by
    /// content UUID when no hint is given. Data is only written when the
    /// mesh is new (an existing mesh keeps its current data).
    pub fn from_interleaved(
        &mut self,
        vertices: &[u8],
        vertex_count: usize,
        layout: &VertexLayout,
        indices: &[u32],
        name: Option<&str>,
        uuid_hint: Option<&str>,
        draw_mode: DrawMode,
    ) -> Result<MeshHandle> {
        if vertices.is_empty() || vertex_count == 0 {
            return Err(GfxError::MissingInput("vertex data"));
        }

        let uuid = match uuid_hint {
            Some(u) if !u.is_empty() => u.to_owned(),
            _ => Mesh::compute_uuid(vertices, indices),
        };

        let h = self.get_or_create(&uuid)?;
        let Some(mesh) = self.pool.get_mut(h) else {
            return Err(GfxError::InvalidHandle);
        };
        if mesh.vertex_count() == 0 {
            mesh.set_data(vertices, vertex_count, layout, indices, name)?;
            mesh.draw_mode = draw_mode;
        }
        Ok(h)
    }

    // ========================================================================
    // Iteration / diagnostics
    // ========================================================================

    pub fn for_each(&self, f: impl FnMut(MeshHandle, &Mesh) -> bool) {
        self.pool.for_each(f);
    }

    #[must_use]
    pub fn collect_info(&self) -> Vec<MeshInfo> {
        let loaders = self.loaders.lock();
        let mut infos = Vec::with_capacity(self.pool.count());
        self.pool.for_each(|h, mesh| {
            infos.push(MeshInfo {
                handle: h,
                uuid: mesh.header.uuid().to_owned(),
                name: mesh.header.name_str(),
                ref_count: mesh.header.ref_count(),
                version: mesh.header.version(),
                vertex_count: mesh.vertex_count(),
                index_count: mesh.index_count(),
                stride: mesh.layout().stride(),
                memory_bytes: mesh.vertices().len() + mesh.index_count() * 4,
                is_loaded: mesh.header.is_loaded(),
                has_loader: loaders.contains_key(&h.index()),
            });
            true
        });
        infos
    }

    /// Destroys every mesh; all outstanding handles become stale.
    pub fn clear(&mut self) {
        self.pool.clear();
        self.uuid_to_index.clear();
        self.loaders.lock().clear();
    }
}

impl Default for MeshRegistry {
    fn default() -> Self {
        Self::new()
    }
}
