//! Material Registry
//!
//! A material is a set of render *phases*. Each phase carries a shader
//! handle, a render-state block, a mark string (`"opaque"`, `"shadow"`, ...)
//! used to select phases at draw time, a priority for ordering same-mark
//! phases, and small tables of uniform values and texture bindings.
//!
//! Materials own their shader references: attaching a shader to a phase
//! adds a ref, removing the phase (or destroying the material) releases it.
//! Because that crosses registries, the phase-mutating operations take the
//! shader registry as an explicit parameter.
//!
//! Version rule: structural changes (phase add/remove, texture attach,
//! color) bump the version; per-draw uniform values do not, since uniforms
//! are pushed on every use rather than uploaded once.

use log::{error, warn};
use smallvec::SmallVec;

use crate::errors::{GfxError, Result};
use crate::handle::Handle;
use crate::interner::{self, Symbol};
use crate::pool::Pool;
use crate::resource_map::ResourceMap;
use crate::resources::shader::{ShaderHandle, ShaderRegistry};
use crate::resources::texture::TextureHandle;
use crate::resources::{ResourceHeader, generate_prefixed_uuid};

pub type MaterialHandle = Handle<Material>;

pub const MAX_PHASES: usize = 8;

// ============================================================================
// Render state
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PolygonMode {
    #[default]
    Fill,
    Line,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendFactor {
    Zero,
    One,
    SrcAlpha,
    OneMinusSrcAlpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DepthFunc {
    #[default]
    Less,
    LessEqual,
    Equal,
    Greater,
    GreaterEqual,
    NotEqual,
    Always,
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderState {
    pub polygon_mode: PolygonMode,
    pub cull: bool,
    pub depth_test: bool,
    pub depth_write: bool,
    pub blend: bool,
    pub blend_src: BlendFactor,
    pub blend_dst: BlendFactor,
    pub depth_func: DepthFunc,
}

impl RenderState {
    #[must_use]
    pub fn opaque() -> Self {
        Self {
            polygon_mode: PolygonMode::Fill,
            cull: true,
            depth_test: true,
            depth_write: true,
            blend: false,
            blend_src: BlendFactor::SrcAlpha,
            blend_dst: BlendFactor::OneMinusSrcAlpha,
            depth_func: DepthFunc::Less,
        }
    }

    #[must_use]
    pub fn transparent() -> Self {
        Self {
            blend: true,
            depth_write: false,
            ..Self::opaque()
        }
    }

    #[must_use]
    pub fn wireframe() -> Self {
        Self {
            polygon_mode: PolygonMode::Line,
            cull: false,
            ..Self::opaque()
        }
    }
}

impl Default for RenderState {
    fn default() -> Self {
        Self::opaque()
    }
}

// ============================================================================
// Uniforms and texture bindings
// ============================================================================

/// Tagged uniform payload; tag and value cannot disagree.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Mat4([f32; 16]),
    FloatArray(Vec<f32>),
}

#[derive(Debug, Clone)]
pub struct UniformSlot {
    pub name: Symbol,
    pub value: UniformValue,
}

#[derive(Debug, Clone)]
pub struct TextureBinding {
    /// Sampler uniform name, e.g. `u_albedo`.
    pub name: Symbol,
    pub texture: TextureHandle,
}

// ============================================================================
// Phase
// ============================================================================

#[derive(Debug, Clone)]
pub struct Phase {
    pub shader: ShaderHandle,
    pub state: RenderState,
    pub mark: String,
    pub priority: i32,
    uniforms: SmallVec<[UniformSlot; 8]>,
    textures: SmallVec<[TextureBinding; 4]>,
}

impl Phase {
    fn new(shader: ShaderHandle, mark: &str, priority: i32) -> Self {
        Self {
            shader,
            state: RenderState::opaque(),
            mark: mark.to_owned(),
            priority,
            uniforms: SmallVec::new(),
            textures: SmallVec::new(),
        }
    }

    #[must_use]
    pub fn uniform(&self, name: &str) -> Option<&UniformValue> {
        let sym = interner::get(name)?;
        self.uniforms
            .iter()
            .find(|u| u.name == sym)
            .map(|u| &u.value)
    }

    /// Adds or updates a uniform. Never bumps the material version.
    pub fn set_uniform(&mut self, name: &str, value: UniformValue) {
        let sym = interner::intern(name);
        if let Some(slot) = self.uniforms.iter_mut().find(|u| u.name == sym) {
            slot.value = value;
        } else {
            self.uniforms.push(UniformSlot { name: sym, value });
        }
    }

    #[must_use]
    pub fn texture(&self, name: &str) -> Option<TextureHandle> {
        let sym = interner::get(name)?;
        self.textures
            .iter()
            .find(|t| t.name == sym)
            .map(|t| t.texture)
    }

    pub fn set_texture(&mut self, name: &str, texture: TextureHandle) {
        let sym = interner::intern(name);
        if let Some(slot) = self.textures.iter_mut().find(|t| t.name == sym) {
            slot.texture = texture;
        } else {
            self.textures.push(TextureBinding { name: sym, texture });
        }
    }

    #[must_use]
    pub fn uniforms(&self) -> &[UniformSlot] {
        &self.uniforms
    }

    #[must_use]
    pub fn textures(&self) -> &[TextureBinding] {
        &self.textures
    }

    #[must_use]
    pub fn color(&self) -> Option<[f32; 4]> {
        match self.uniform("u_color") {
            Some(UniformValue::Vec4(c)) => Some(*c),
            _ => None,
        }
    }

    pub fn set_color(&mut self, color: [f32; 4]) {
        self.set_uniform("u_color", UniformValue::Vec4(color));
    }

    pub fn make_transparent(&mut self) {
        self.state = RenderState::transparent();
    }
}

// ============================================================================
// Material
// ============================================================================

#[derive(Debug)]
pub struct Material {
    pub header: ResourceHeader,
    phases: SmallVec<[Phase; 2]>,
    /// Mark forced by the caller regardless of pass, if any.
    pub active_mark: Option<String>,
    pub source_path: Option<Symbol>,
    // Mirror of texture bindings for inspection, independent of phases.
    texture_handles: SmallVec<[TextureBinding; 4]>,
}

impl Material {
    fn new(uuid: &str, name: &str) -> Self {
        let mut header = ResourceHeader::new(uuid);
        header.set_name(name);
        header.set_loaded(true);
        Self {
            header,
            phases: SmallVec::new(),
            active_mark: None,
            source_path: None,
            texture_handles: SmallVec::new(),
        }
    }

    #[must_use]
    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    #[must_use]
    pub fn phase(&self, index: usize) -> Option<&Phase> {
        self.phases.get(index)
    }

    pub fn phase_mut(&mut self, index: usize) -> Option<&mut Phase> {
        self.phases.get_mut(index)
    }

    /// First phase with the given mark.
    #[must_use]
    pub fn find_phase(&self, mark: &str) -> Option<&Phase> {
        self.phases.iter().find(|p| p.mark == mark)
    }

    pub fn find_phase_mut(&mut self, mark: &str) -> Option<&mut Phase> {
        self.phases.iter_mut().find(|p| p.mark == mark)
    }

    /// Indices of all phases with the given mark, stably ordered by
    /// ascending priority.
    #[must_use]
    pub fn phases_for_mark(&self, mark: &str) -> SmallVec<[usize; 4]> {
        let mut indices: SmallVec<[usize; 4]> = self
            .phases
            .iter()
            .enumerate()
            .filter(|(_, p)| p.mark == mark)
            .map(|(i, _)| i)
            .collect();
        indices.sort_by_key(|&i| self.phases[i].priority);
        indices
    }

    #[must_use]
    pub fn texture_handles(&self) -> &[TextureBinding] {
        &self.texture_handles
    }

    /// Sets a uniform on every phase. Per-draw value, no version bump.
    pub fn set_uniform(&mut self, name: &str, value: UniformValue) {
        for phase in &mut self.phases {
            phase.set_uniform(name, value.clone());
        }
    }

    /// Binds a texture on every phase and in the material-level mirror.
    /// Structural change, bumps version.
    pub fn set_texture(&mut self, name: &str, texture: TextureHandle) {
        for phase in &mut self.phases {
            phase.set_texture(name, texture);
        }
        let sym = interner::intern(name);
        if let Some(slot) = self.texture_handles.iter_mut().find(|t| t.name == sym) {
            slot.texture = texture;
        } else {
            self.texture_handles.push(TextureBinding { name: sym, texture });
        }
        self.header.bump_version();
    }

    pub fn set_color(&mut self, color: [f32; 4]) {
        for phase in &mut self.phases {
            phase.set_color(color);
        }
        self.header.bump_version();
    }

    /// `u_color` of the first phase.
    #[must_use]
    pub fn color(&self) -> Option<[f32; 4]> {
        self.phases.first().and_then(Phase::color)
    }
}

/// Diagnostic snapshot of one material.
#[derive(Debug, Clone)]
pub struct MaterialInfo {
    pub handle: MaterialHandle,
    pub uuid: String,
    pub name: Option<&'static str>,
    pub ref_count: u32,
    pub version: u32,
    pub phase_count: usize,
    pub texture_count: usize,
}

// ============================================================================
// Registry
// ============================================================================

pub struct MaterialRegistry {
    pool: Pool<Material>,
    uuid_to_index: ResourceMap,
    // Materials are authored assets looked up by name constantly, so they
    // get a dedicated name map on top of the uuid map. First creation owns
    // the name; later duplicates (e.g. repeated copies) fall back to scan.
    name_to_index: ResourceMap,
    next_uuid: u64,
}

impl MaterialRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pool: Pool::with_capacity(64),
            uuid_to_index: ResourceMap::new(),
            name_to_index: ResourceMap::new(),
            next_uuid: 1,
        }
    }

    /// Creates a material. Unlike the other registries a name is required;
    /// materials are authored assets and always referred to by name.
    pub fn create(&mut self, uuid: Option<&str>, name: &str) -> Result<MaterialHandle> {
        if name.is_empty() {
            error!("material create: name is required");
            return Err(GfxError::MissingInput("material name"));
        }
        let uuid = match uuid {
            Some(u) if !u.is_empty() => {
                if self.uuid_to_index.contains(u) {
                    warn!("material create: uuid '{u}' already exists");
                    return Err(GfxError::DuplicateUuid(u.to_owned()));
                }
                u.to_owned()
            }
            _ => generate_prefixed_uuid("mat", &mut self.next_uuid),
        };

        let h = self.pool.alloc(Material::new(&uuid, name));
        if h.is_invalid() {
            error!("material create: pool alloc failed");
            return Err(GfxError::AllocationFailed("material pool"));
        }
        let index = h.index();
        if let Some(mat) = self.pool.get_mut(h) {
            mat.header.set_pool_index(index);
        }
        if !self.uuid_to_index.add(&uuid, index) {
            error!("material create: failed to add '{uuid}' to uuid map");
            self.pool.free(h);
            return Err(GfxError::AllocationFailed("material uuid map"));
        }
        if self.name_to_index.contains(name) {
            warn!("material create: name '{name}' already in use, lookup keeps the first owner");
        } else {
            self.name_to_index.add(name, index);
        }
        Ok(h)
    }

    #[must_use]
    pub fn find(&self, uuid: &str) -> Option<MaterialHandle> {
        let index = self.uuid_to_index.get(uuid)?;
        self.pool.handle_at(index)
    }

    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<MaterialHandle> {
        if let Some(index) = self.name_to_index.get(name) {
            return self.pool.handle_at(index);
        }
        // Duplicate names never enter the map; scan covers them.
        let sym = interner::get(name)?;
        let mut found = None;
        self.pool.for_each(|h, mat| {
            if mat.header.name == Some(sym) {
                found = Some(h);
                false
            } else {
                true
            }
        });
        found
    }

    pub fn get_or_create(&mut self, uuid: &str, name: &str) -> Result<MaterialHandle> {
        if uuid.is_empty() {
            warn!("material get_or_create: empty uuid");
            return Err(GfxError::MissingInput("uuid"));
        }
        if let Some(h) = self.find(uuid) {
            return Ok(h);
        }
        self.create(Some(uuid), name)
    }

    #[must_use]
    pub fn get(&self, h: MaterialHandle) -> Option<&Material> {
        self.pool.get(h)
    }

    pub fn get_mut(&mut self, h: MaterialHandle) -> Option<&mut Material> {
        self.pool.get_mut(h)
    }

    #[must_use]
    pub fn is_valid(&self, h: MaterialHandle) -> bool {
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

    /// Destroys the material, releasing every phase's shader reference.
    pub fn destroy(&mut self, h: MaterialHandle, shaders: &mut ShaderRegistry) -> bool {
        let Some(mat) = self.pool.get(h) else {
            return false;
        };
        let uuid = mat.header.uuid().to_owned();
        let name = mat.header.name_str();
        let shader_handles: SmallVec<[ShaderHandle; 8]> =
            mat.phases.iter().map(|p| p.shader).collect();
        for sh in shader_handles {
            if shaders.is_valid(sh) {
                shaders.release(sh);
            }
        }
        self.uuid_to_index.remove(&uuid);
        if let Some(name) = name {
            if self.name_to_index.get(name) == Some(h.index()) {
                self.name_to_index.remove(name);
            }
        }
        self.pool.free(h).is_some()
    }

    // ========================================================================
    // Reference counting
    // ========================================================================

    pub fn add_ref(&mut self, h: MaterialHandle) {
        if let Some(mat) = self.pool.get_mut(h) {
            mat.header.add_ref();
        }
    }

    pub fn release(&mut self, h: MaterialHandle, shaders: &mut ShaderRegistry) -> bool {
        let Some(mat) = self.pool.get_mut(h) else {
            warn!("material release: invalid handle");
            return false;
        };
        if !mat.header.dec_ref() {
            warn!(
                "material release: '{}' [{}] already at ref_count=0",
                mat.header.name_str().unwrap_or("?"),
                mat.header.uuid()
            );
            return false;
        }
        if mat.header.ref_count() == 0 {
            self.destroy(h, shaders);
            return true;
        }
        false
    }

    // ========================================================================
    // Phases
    // ========================================================================

    /// Appends a phase, taking a shader reference on the material's behalf.
    /// Returns the phase index.
    pub fn add_phase(
        &mut self,
        h: MaterialHandle,
        shaders: &mut ShaderRegistry,
        shader: ShaderHandle,
        mark: &str,
        priority: i32,
    ) -> Result<usize> {
        if !self.pool.is_valid(h) {
            return Err(GfxError::InvalidHandle);
        }
        {
            let mat = self.pool.get(h).ok_or(GfxError::InvalidHandle)?;
            if mat.phases.len() >= MAX_PHASES {
                warn!(
                    "material add_phase: '{}' already has {MAX_PHASES} phases",
                    mat.header.uuid()
                );
                return Err(GfxError::AllocationFailed("material phase table"));
            }
        }
        if shaders.is_valid(shader) {
            shaders.add_ref(shader);
        }
        let mat = self.pool.get_mut(h).ok_or(GfxError::InvalidHandle)?;
        let mark = if mark.is_empty() { "opaque" } else { mark };
        mat.phases.push(Phase::new(shader, mark, priority));
        mat.header.bump_version();
        Ok(mat.phases.len() - 1)
    }

    /// Removes the phase at `index`, releasing its shader reference.
    /// Later phases shift down.
    pub fn remove_phase(
        &mut self,
        h: MaterialHandle,
        shaders: &mut ShaderRegistry,
        index: usize,
    ) -> bool {
        let Some(mat) = self.pool.get_mut(h) else {
            return false;
        };
        if index >= mat.phases.len() {
            return false;
        }
        let phase = mat.phases.remove(index);
        mat.header.bump_version();
        if shaders.is_valid(phase.shader) {
            shaders.release(phase.shader);
        }
        true
    }

    /// Deep copy under a new uuid; the copy's name is `<name>_copy` and
    /// every copied phase takes its own shader reference.
    pub fn copy(
        &mut self,
        src: MaterialHandle,
        shaders: &mut ShaderRegistry,
        new_uuid: Option<&str>,
    ) -> Result<MaterialHandle> {
        let (name, phases, texture_handles, active_mark, source_path) = {
            let mat = self.pool.get(src).ok_or(GfxError::InvalidHandle)?;
            let Some(name) = mat.header.name_str() else {
                error!("material copy: source '{}' has no name", mat.header.uuid());
                return Err(GfxError::MissingInput("source material name"));
            };
            (
                format!("{name}_copy"),
                mat.phases.clone(),
                mat.texture_handles.clone(),
                mat.active_mark.clone(),
                mat.source_path,
            )
        };

        let dst = self.create(new_uuid, &name)?;
        for phase in &phases {
            if shaders.is_valid(phase.shader) {
                shaders.add_ref(phase.shader);
            }
        }
        if let Some(mat) = self.pool.get_mut(dst) {
            mat.phases = phases;
            mat.texture_handles = texture_handles;
            mat.active_mark = active_mark;
            mat.source_path = source_path;
        }
        Ok(dst)
    }

    // ========================================================================
    // Iteration / diagnostics
    // ========================================================================

    pub fn for_each(&self, f: impl FnMut(MaterialHandle, &Material) -> bool) {
        self.pool.for_each(f);
    }

    #[must_use]
    pub fn collect_info(&self) -> Vec<MaterialInfo> {
        let mut infos = Vec::with_capacity(self.pool.count());
        self.pool.for_each(|h, mat| {
            infos.push(MaterialInfo {
                handle: h,
                uuid: mat.header.uuid().to_owned(),
                name: mat.header.name_str(),
                ref_count: mat.header.ref_count(),
                version: mat.header.version(),
                phase_count: mat.phases.len(),
                texture_count: mat.texture_handles.len(),
            });
            true
        });
        infos
    }

    /// Destroys every material, releasing all shader references.
    pub fn clear(&mut self, shaders: &mut ShaderRegistry) {
        let handles: Vec<MaterialHandle> = self.pool.iter().map(|(h, _)| h).collect();
        for h in handles {
            self.destroy(h, shaders);
        }
        self.uuid_to_index.clear();
        self.name_to_index.clear();
    }
}

impl Default for MaterialRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_shader(shaders: &mut ShaderRegistry, tag: &str) -> ShaderHandle {
        shaders
            .from_sources(&format!("vs-{tag}"), &format!("fs-{tag}"), None, None, None)
            .unwrap()
    }

    #[test]
    fn create_requires_name() {
        let mut reg = MaterialRegistry::new();
        assert!(reg.create(Some("m1"), "").is_err());
        assert!(reg.create(Some("m1"), "basic").is_ok());
    }

    #[test]
    fn phase_attach_owns_shader_ref() {
        let mut shaders = ShaderRegistry::new();
        let mut reg = MaterialRegistry::new();
        let sh = make_shader(&mut shaders, "a");
        shaders.add_ref(sh); // caller's own ref

        let m = reg.create(None, "mat").unwrap();
        reg.add_phase(m, &mut shaders, sh, "opaque", 0).unwrap();
        assert_eq!(shaders.get(sh).unwrap().header.ref_count(), 2);

        // Caller drops its ref; material's ref keeps the shader alive.
        shaders.release(sh);
        assert!(shaders.is_valid(sh));

        reg.destroy(m, &mut shaders);
        assert!(!shaders.is_valid(sh));
    }

    #[test]
    fn remove_phase_releases_shader_and_shifts() {
        let mut shaders = ShaderRegistry::new();
        let mut reg = MaterialRegistry::new();
        let a = make_shader(&mut shaders, "a");
        let b = make_shader(&mut shaders, "b");

        let m = reg.create(None, "mat").unwrap();
        reg.add_phase(m, &mut shaders, a, "opaque", 0).unwrap();
        reg.add_phase(m, &mut shaders, b, "shadow", 0).unwrap();

        assert!(reg.remove_phase(m, &mut shaders, 0));
        assert!(!shaders.is_valid(a)); // material held the only ref
        let mat = reg.get(m).unwrap();
        assert_eq!(mat.phases().len(), 1);
        assert_eq!(mat.phases()[0].mark, "shadow");
    }

    #[test]
    fn phases_for_mark_sorts_by_priority_stably() {
        let mut shaders = ShaderRegistry::new();
        let mut reg = MaterialRegistry::new();
        let sh = make_shader(&mut shaders, "a");

        let m = reg.create(None, "mat").unwrap();
        reg.add_phase(m, &mut shaders, sh, "opaque", 5).unwrap();
        reg.add_phase(m, &mut shaders, sh, "shadow", 0).unwrap();
        reg.add_phase(m, &mut shaders, sh, "opaque", 1).unwrap();
        reg.add_phase(m, &mut shaders, sh, "opaque", 5).unwrap();

        let order = reg.get(m).unwrap().phases_for_mark("opaque");
        assert_eq!(order.as_slice(), &[2, 0, 3]);
    }

    #[test]
    fn uniforms_do_not_bump_version_but_textures_do() {
        let mut shaders = ShaderRegistry::new();
        let mut reg = MaterialRegistry::new();
        let sh = make_shader(&mut shaders, "a");
        let m = reg.create(None, "mat").unwrap();
        reg.add_phase(m, &mut shaders, sh, "opaque", 0).unwrap();
        let v = reg.get(m).unwrap().header.version();

        reg.get_mut(m)
            .unwrap()
            .set_uniform("u_time", UniformValue::Float(1.5));
        assert_eq!(reg.get(m).unwrap().header.version(), v);

        reg.get_mut(m).unwrap().set_texture("u_albedo", TextureHandle::INVALID);
        assert_eq!(reg.get(m).unwrap().header.version(), v + 1);
    }

    #[test]
    fn color_round_trips_through_first_phase() {
        let mut shaders = ShaderRegistry::new();
        let mut reg = MaterialRegistry::new();
        let sh = make_shader(&mut shaders, "a");
        let m = reg.create(None, "mat").unwrap();
        reg.add_phase(m, &mut shaders, sh, "opaque", 0).unwrap();

        reg.get_mut(m).unwrap().set_color([1.0, 0.5, 0.25, 1.0]);
        assert_eq!(reg.get(m).unwrap().color(), Some([1.0, 0.5, 0.25, 1.0]));
    }

    #[test]
    fn find_by_name_tracks_create_and_destroy() {
        let mut shaders = ShaderRegistry::new();
        let mut reg = MaterialRegistry::new();
        let a = reg.create(None, "wood").unwrap();
        let b = reg.create(None, "wood").unwrap();

        // First creation owns the name.
        assert_eq!(reg.find_by_name("wood"), Some(a));
        assert_eq!(reg.find_by_name("stone"), None);

        // After the owner goes away the duplicate is still reachable.
        reg.destroy(a, &mut shaders);
        assert_eq!(reg.find_by_name("wood"), Some(b));

        reg.destroy(b, &mut shaders);
        assert_eq!(reg.find_by_name("wood"), None);
    }

    #[test]
    fn copy_re_refs_shaders_and_renames() {
        let mut shaders = ShaderRegistry::new();
        let mut reg = MaterialRegistry::new();
        let sh = make_shader(&mut shaders, "a");
        let m = reg.create(Some("m1"), "wood").unwrap();
        reg.add_phase(m, &mut shaders, sh, "opaque", 0).unwrap();

        let c = reg.copy(m, &mut shaders, Some("m2")).unwrap();
        assert_eq!(shaders.get(sh).unwrap().header.ref_count(), 2);
        let copy = reg.get(c).unwrap();
        assert_eq!(copy.header.name_str(), Some("wood_copy"));
        assert_eq!(copy.phases().len(), 1);

        // Destroying the original leaves the copy's shader ref intact.
        reg.destroy(m, &mut shaders);
        assert!(shaders.is_valid(sh));
    }
}
