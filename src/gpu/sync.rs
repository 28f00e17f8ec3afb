//! Version-driven upload/compile/draw protocol.
//!
//! [`GpuSystem`] owns the backend vtable, the share-group registry and an
//! optional shader preprocessor. Every entry point takes the `GpuContext`
//! being rendered with; the caller guarantees that context's native context
//! is current. The protocol is the same for every resource kind: look up
//! the cached slot by pool index, compare versions, and only call into the
//! backend when the slot is stale.

use log::error;

use crate::errors::{GfxError, Result};
use crate::gpu::context::GpuContext;
use crate::gpu::ops::GpuOps;
use crate::gpu::share_group::ShareGroupRegistry;
use crate::resources::material::{Phase, UniformValue};
use crate::resources::mesh::Mesh;
use crate::resources::shader::Shader;
use crate::resources::texture::{Texture, TextureFlags, TextureFormat, TextureRegistry};

/// Resolves textual includes in shader source. Takes the raw source and a
/// display name for diagnostics; returns the transformed source, or `None`
/// to compile the original.
pub type ShaderPreprocessor = Box<dyn Fn(&str, &str) -> Option<String> + Send>;

pub struct GpuSystem {
    ops: Option<Box<dyn GpuOps>>,
    groups: ShareGroupRegistry,
    preprocessor: Option<ShaderPreprocessor>,
}

impl GpuSystem {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ops: None,
            groups: ShareGroupRegistry::new(),
            preprocessor: None,
        }
    }

    /// Installs the backend vtable. Until this is called every sync
    /// operation fails with [`GfxError::NoGpuOps`].
    pub fn set_ops(&mut self, ops: Box<dyn GpuOps>) {
        self.ops = Some(ops);
    }

    #[must_use]
    pub fn has_ops(&self) -> bool {
        self.ops.is_some()
    }

    pub fn set_preprocessor(&mut self, preprocessor: ShaderPreprocessor) {
        self.preprocessor = Some(preprocessor);
    }

    #[must_use]
    pub fn share_groups(&self) -> &ShareGroupRegistry {
        &self.groups
    }

    // ========================================================================
    // Context lifecycle
    // ========================================================================

    /// Creates a context for native context `key`. With `share_key` the
    /// context joins that existing share group; otherwise it gets (or
    /// creates) the group keyed by its own `key`.
    pub fn create_context(&mut self, key: usize, share_key: Option<usize>) -> Result<GpuContext> {
        let group_key = self.groups.get_or_create(share_key.unwrap_or(key))?;
        Ok(GpuContext::new(key, group_key))
    }

    /// Deletes the context's private VAOs and drops its share-group
    /// reference; the last context out deletes all shared GL objects.
    pub fn free_context(&mut self, mut ctx: GpuContext) {
        if let Some(ops) = self.ops.as_deref_mut() {
            for slot in ctx.vao_slots_mut() {
                if slot.vao != 0 {
                    ops.mesh_delete(slot.vao);
                    *slot = Default::default();
                }
            }
        }
        // as_deref_mut() yields `&mut (dyn GpuOps + 'static)`; the cast is
        // the coercion site down to the borrow's lifetime.
        let ops = self.ops.as_deref_mut().map(|o| o as &mut dyn GpuOps);
        self.groups.unref(ctx.group_key(), ops);
    }

    // ========================================================================
    // Textures
    // ========================================================================

    /// True when the shared slot is missing, empty, or version-stale.
    #[must_use]
    pub fn texture_needs_upload(&self, ctx: &GpuContext, tex: &Texture) -> bool {
        let Some(group) = self.groups.get(ctx.group_key()) else {
            return true;
        };
        let slot = group.peek_texture_slot(tex.header.pool_index());
        slot.id == 0 || slot.version != tex.header.version() as i32
    }

    /// Cached texture id, 0 if never uploaded.
    #[must_use]
    pub fn texture_gpu_id(&self, ctx: &GpuContext, tex: &Texture) -> u32 {
        self.groups
            .get(ctx.group_key())
            .map_or(0, |g| g.peek_texture_slot(tex.header.pool_index()).id)
    }

    /// Ensures the texture is on the GPU; returns the (possibly cached) id.
    /// One upload serves every context in the share group.
    pub fn texture_upload(&mut self, ctx: &GpuContext, tex: &Texture) -> Result<u32> {
        if !tex.has_data() {
            return Err(GfxError::NoData(tex.header.label().to_owned()));
        }
        let ops = self.ops.as_deref_mut().ok_or(GfxError::NoGpuOps)?;
        let group = self
            .groups
            .get_mut(ctx.group_key())
            .ok_or(GfxError::InvalidHandle)?;
        let slot = group.texture_slot(tex.header.pool_index());

        if slot.id != 0 && slot.version == tex.header.version() as i32 {
            return Ok(slot.id);
        }

        if slot.id != 0 {
            ops.texture_delete(slot.id);
        }

        let id = if tex.format == TextureFormat::Depth24 {
            let depths: Vec<f32> = tex
                .data()
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect();
            ops.depth_texture_upload(
                &depths,
                tex.width(),
                tex.height(),
                tex.flags.contains(TextureFlags::COMPARE),
            )
        } else {
            ops.texture_upload(
                tex.data(),
                tex.width(),
                tex.height(),
                tex.format.channels(),
                tex.flags.contains(TextureFlags::MIPMAP),
                tex.flags.contains(TextureFlags::CLAMP),
            )
        };

        if id == 0 {
            // Leave the slot untouched so a corrected retry can succeed.
            error!("texture upload failed for '{}'", tex.header.label());
            return Err(GfxError::UploadFailed(tex.header.label().to_owned()));
        }
        slot.id = id;
        slot.version = tex.header.version() as i32;
        Ok(id)
    }

    /// Uploads if needed, then binds to `unit` via the format-appropriate
    /// backend path.
    pub fn texture_bind(&mut self, ctx: &GpuContext, tex: &Texture, unit: u32) -> Result<()> {
        let id = self.texture_upload(ctx, tex)?;
        let ops = self.ops.as_deref_mut().ok_or(GfxError::NoGpuOps)?;
        if tex.format == TextureFormat::Depth24 {
            ops.depth_texture_bind(id, unit);
        } else {
            ops.texture_bind(id, unit);
        }
        Ok(())
    }

    /// Deletes the shared GPU texture (for the whole group) and resets its
    /// slot.
    pub fn texture_delete(&mut self, ctx: &GpuContext, tex: &Texture) {
        let Some(group) = self.groups.get_mut(ctx.group_key()) else {
            return;
        };
        let slot = group.texture_slot(tex.header.pool_index());
        if slot.id != 0 {
            if let Some(ops) = self.ops.as_deref_mut() {
                ops.texture_delete(slot.id);
            }
        }
        *slot = Default::default();
    }

    // ========================================================================
    // Shaders
    // ========================================================================

    /// Cached program id, 0 if never compiled.
    #[must_use]
    pub fn shader_program(&self, ctx: &GpuContext, shader: &Shader) -> u32 {
        self.groups
            .get(ctx.group_key())
            .map_or(0, |g| g.peek_shader_slot(shader.header.pool_index()).id)
    }

    /// Ensures the program is compiled; returns the (possibly cached) id.
    pub fn shader_compile(&mut self, ctx: &GpuContext, shader: &Shader) -> Result<u32> {
        if shader.vertex_src().is_empty() || shader.fragment_src().is_empty() {
            error!("shader compile: missing sources for '{}'", shader.header.label());
            return Err(GfxError::MissingInput("shader sources"));
        }
        let ops = self.ops.as_deref_mut().ok_or(GfxError::NoGpuOps)?;
        let group = self
            .groups
            .get_mut(ctx.group_key())
            .ok_or(GfxError::InvalidHandle)?;
        let slot = group.shader_slot(shader.header.pool_index());

        if slot.id != 0 && slot.version == shader.header.version() as i32 {
            return Ok(slot.id);
        }

        if slot.id != 0 {
            ops.shader_delete(slot.id);
        }

        let name = shader.header.label();
        let preprocess = |src: &str| -> Option<String> {
            // Only invoked when the source actually uses includes.
            if src.contains("#include") {
                self.preprocessor.as_ref().and_then(|p| p(src, name))
            } else {
                None
            }
        };
        let vertex = preprocess(shader.vertex_src());
        let fragment = preprocess(shader.fragment_src());
        let geometry = shader.geometry_src().map(|g| (g, preprocess(g)));

        let id = ops.shader_compile(
            vertex.as_deref().unwrap_or(shader.vertex_src()),
            fragment.as_deref().unwrap_or(shader.fragment_src()),
            geometry
                .as_ref()
                .map(|(orig, pre)| pre.as_deref().unwrap_or(orig)),
        );
        if id == 0 {
            error!("shader compile failed for '{name}'");
            return Err(GfxError::CompileFailed(name.to_owned()));
        }
        slot.id = id;
        slot.version = shader.header.version() as i32;
        Ok(id)
    }

    /// Compiles if needed, then makes the program active.
    pub fn shader_use(&mut self, ctx: &GpuContext, shader: &Shader) -> Result<u32> {
        let id = self.shader_compile(ctx, shader)?;
        let ops = self.ops.as_deref_mut().ok_or(GfxError::NoGpuOps)?;
        ops.shader_use(id);
        Ok(id)
    }

    /// Deletes the shared program and resets its slot.
    pub fn shader_delete(&mut self, ctx: &GpuContext, shader: &Shader) {
        let Some(group) = self.groups.get_mut(ctx.group_key()) else {
            return;
        };
        let slot = group.shader_slot(shader.header.pool_index());
        if slot.id != 0 {
            if let Some(ops) = self.ops.as_deref_mut() {
                ops.shader_delete(slot.id);
            }
        }
        *slot = Default::default();
    }

    /// Pushes one uniform to the shader's current program. No-op if the
    /// shader was never compiled in this group.
    pub fn set_uniform(
        &mut self,
        ctx: &GpuContext,
        shader: &Shader,
        name: &str,
        value: &UniformValue,
    ) {
        let program = self.shader_program(ctx, shader);
        if program == 0 {
            return;
        }
        let Some(ops) = self.ops.as_deref_mut() else {
            return;
        };
        match value {
            UniformValue::Bool(b) => ops.shader_set_bool(program, name, *b),
            UniformValue::Int(i) => ops.shader_set_int(program, name, *i),
            UniformValue::Float(f) => ops.shader_set_float(program, name, *f),
            UniformValue::Vec2(v) => ops.shader_set_vec2(program, name, *v),
            UniformValue::Vec3(v) => ops.shader_set_vec3(program, name, *v),
            UniformValue::Vec4(v) => ops.shader_set_vec4(program, name, *v),
            UniformValue::Mat4(m) => ops.shader_set_mat4(program, name, m, false),
            UniformValue::FloatArray(a) => ops.shader_set_float_array(program, name, a),
        }
    }

    pub fn set_block_binding(
        &mut self,
        ctx: &GpuContext,
        shader: &Shader,
        block_name: &str,
        binding_point: u32,
    ) {
        let program = self.shader_program(ctx, shader);
        if program == 0 {
            return;
        }
        if let Some(ops) = self.ops.as_deref_mut() {
            ops.shader_set_block_binding(program, block_name, binding_point);
        }
    }

    /// Pushes every uniform of a material phase. Uniforms are per-draw
    /// values, so this runs every use; nothing is cached or versioned.
    pub fn apply_phase_uniforms(&mut self, ctx: &GpuContext, shader: &Shader, phase: &Phase) {
        for slot in phase.uniforms() {
            self.set_uniform(ctx, shader, crate::interner::resolve(slot.name), &slot.value);
        }
    }

    /// Binds the phase's textures to consecutive units starting at
    /// `first_unit` and points each sampler uniform at its unit.
    pub fn bind_phase_textures(
        &mut self,
        ctx: &GpuContext,
        shader: &Shader,
        phase: &Phase,
        textures: &TextureRegistry,
        first_unit: u32,
    ) -> Result<()> {
        let mut unit = first_unit;
        for binding in phase.textures() {
            let Some(tex) = textures.get(binding.texture) else {
                continue;
            };
            self.texture_bind(ctx, tex, unit)?;
            let name = crate::interner::resolve(binding.name);
            self.set_uniform(ctx, shader, name, &UniformValue::Int(unit as i32));
            unit += 1;
        }
        Ok(())
    }

    // ========================================================================
    // Meshes
    // ========================================================================

    /// Ensures VBO/EBO (shared) and VAO (per-context) are current; returns
    /// this context's VAO.
    ///
    /// Two independent staleness signals: the shared slot version drives
    /// buffer re-upload, and the VAO's recorded buffer ids drive a cheap
    /// VAO-only rebuild when the data itself is current (a context joining
    /// an established group hits this path).
    pub fn mesh_upload(&mut self, ctx: &mut GpuContext, mesh: &Mesh) -> Result<u32> {
        if !mesh.has_data() {
            return Err(GfxError::NoData(mesh.header.label().to_owned()));
        }
        let ops = self.ops.as_deref_mut().ok_or(GfxError::NoGpuOps)?;
        let group = self
            .groups
            .get_mut(ctx.group_key())
            .ok_or(GfxError::InvalidHandle)?;
        let index = mesh.header.pool_index();
        let shared = group.mesh_data_slot(index);
        let vao_slot = ctx.vao_slot(index);

        let data_current = shared.vbo != 0 && shared.version == mesh.header.version() as i32;
        if data_current {
            if vao_slot.vao != 0
                && vao_slot.bound_vbo == shared.vbo
                && vao_slot.bound_ebo == shared.ebo
            {
                return Ok(vao_slot.vao);
            }

            // Buffers are current, only this context's VAO is missing or
            // built against old buffer ids.
            if vao_slot.vao != 0 {
                ops.mesh_delete(vao_slot.vao);
            }
            let vao = ops.mesh_create_vao(mesh.layout(), shared.vbo, shared.ebo);
            if vao == 0 {
                error!("mesh vao rebuild failed for '{}'", mesh.header.label());
                return Err(GfxError::UploadFailed(mesh.header.label().to_owned()));
            }
            vao_slot.vao = vao;
            vao_slot.bound_vbo = shared.vbo;
            vao_slot.bound_ebo = shared.ebo;
            return Ok(vao);
        }

        // Full path: drop this context's VAO and the shared buffers, then
        // re-upload everything.
        if vao_slot.vao != 0 {
            ops.mesh_delete(vao_slot.vao);
            *vao_slot = Default::default();
        }
        if shared.vbo != 0 {
            ops.buffer_delete(shared.vbo);
        }
        if shared.ebo != 0 {
            ops.buffer_delete(shared.ebo);
        }
        shared.vbo = 0;
        shared.ebo = 0;

        let Some(upload) = ops.mesh_upload(
            mesh.vertices(),
            mesh.vertex_count(),
            mesh.indices(),
            mesh.layout(),
        ) else {
            error!("mesh upload failed for '{}'", mesh.header.label());
            return Err(GfxError::UploadFailed(mesh.header.label().to_owned()));
        };

        shared.vbo = upload.vbo;
        shared.ebo = upload.ebo;
        shared.version = mesh.header.version() as i32;
        vao_slot.vao = upload.vao;
        vao_slot.bound_vbo = upload.vbo;
        vao_slot.bound_ebo = upload.ebo;
        Ok(upload.vao)
    }

    /// Uploads/rebuilds as needed, then issues the draw.
    pub fn mesh_draw(&mut self, ctx: &mut GpuContext, mesh: &Mesh) -> Result<()> {
        let index = mesh.header.pool_index();
        let (shared, vao_slot) = {
            let group = self
                .groups
                .get(ctx.group_key())
                .ok_or(GfxError::InvalidHandle)?;
            (group.peek_mesh_data_slot(index), ctx.peek_vao_slot(index))
        };

        let data_stale = shared.vbo == 0 || shared.version != mesh.header.version() as i32;
        let vao_stale = vao_slot.vao == 0
            || vao_slot.bound_vbo != shared.vbo
            || vao_slot.bound_ebo != shared.ebo;
        if data_stale || vao_stale {
            self.mesh_upload(ctx, mesh)?;
        }

        let vao = ctx.peek_vao_slot(index).vao;
        if vao == 0 {
            return Err(GfxError::UploadFailed(mesh.header.label().to_owned()));
        }
        let ops = self.ops.as_deref_mut().ok_or(GfxError::NoGpuOps)?;
        ops.mesh_draw(vao, mesh.index_count(), mesh.draw_mode);
        Ok(())
    }

    /// Deletes this context's VAO and the shared buffers, resetting both
    /// slots.
    pub fn mesh_delete(&mut self, ctx: &mut GpuContext, mesh: &Mesh) {
        let index = mesh.header.pool_index();
        let Some(ops) = self.ops.as_deref_mut() else {
            return;
        };

        let vao_slot = ctx.vao_slot(index);
        if vao_slot.vao != 0 {
            ops.mesh_delete(vao_slot.vao);
        }
        *vao_slot = Default::default();

        if let Some(group) = self.groups.get_mut(ctx.group_key()) {
            let shared = group.mesh_data_slot(index);
            if shared.vbo != 0 {
                ops.buffer_delete(shared.vbo);
            }
            if shared.ebo != 0 {
                ops.buffer_delete(shared.ebo);
            }
            *shared = Default::default();
        }
    }
}

impl Default for GpuSystem {
    fn default() -> Self {
        Self::new()
    }
}
