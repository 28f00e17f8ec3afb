//! Backend vtable.
//!
//! A concrete graphics backend implements [`GpuOps`] and hands it to the
//! [`GpuSystem`](crate::gpu::GpuSystem) once at startup. Object ids follow
//! GL conventions: `u32` names with 0 meaning "none"/failure. The sync
//! layer never interprets ids beyond that.

use crate::vertex::{DrawMode, VertexLayout};

/// Result of a full mesh upload: the new VAO plus the shared buffer ids it
/// was built against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeshUpload {
    pub vao: u32,
    pub vbo: u32,
    pub ebo: u32,
}

/// Primitive GPU operations, supplied by the rendering backend.
///
/// All calls are synchronous and must be made with the intended native
/// context current; the sync layer upholds that by construction since every
/// entry point takes the `GpuContext` being drawn with.
pub trait GpuOps {
    // -- Textures ------------------------------------------------------------

    /// Uploads tightly packed 8-bit pixel data; returns the texture id, 0 on
    /// failure.
    fn texture_upload(
        &mut self,
        data: &[u8],
        width: u32,
        height: u32,
        channels: u8,
        mipmap: bool,
        clamp: bool,
    ) -> u32;

    /// Uploads a depth texture (shadow map path). `compare_mode` enables
    /// depth comparison for `sampler2DShadow`.
    fn depth_texture_upload(&mut self, data: &[f32], width: u32, height: u32, compare_mode: bool)
    -> u32;

    fn texture_bind(&mut self, id: u32, unit: u32);
    fn depth_texture_bind(&mut self, id: u32, unit: u32);
    fn texture_delete(&mut self, id: u32);

    // -- Shaders -------------------------------------------------------------

    /// Compiles and links a program; returns the program id, 0 on failure.
    fn shader_compile(&mut self, vertex: &str, fragment: &str, geometry: Option<&str>) -> u32;
    fn shader_use(&mut self, id: u32);
    fn shader_delete(&mut self, id: u32);

    fn shader_set_bool(&mut self, id: u32, name: &str, value: bool);
    fn shader_set_int(&mut self, id: u32, name: &str, value: i32);
    fn shader_set_float(&mut self, id: u32, name: &str, value: f32);
    fn shader_set_vec2(&mut self, id: u32, name: &str, value: [f32; 2]);
    fn shader_set_vec3(&mut self, id: u32, name: &str, value: [f32; 3]);
    fn shader_set_vec4(&mut self, id: u32, name: &str, value: [f32; 4]);
    fn shader_set_mat4(&mut self, id: u32, name: &str, value: &[f32; 16], transpose: bool);
    fn shader_set_float_array(&mut self, id: u32, name: &str, values: &[f32]);
    fn shader_set_block_binding(&mut self, id: u32, block_name: &str, binding_point: u32);

    // -- Meshes --------------------------------------------------------------

    /// Creates VBO + EBO + VAO from interleaved data; `None` on failure.
    fn mesh_upload(
        &mut self,
        vertices: &[u8],
        vertex_count: usize,
        indices: &[u32],
        layout: &VertexLayout,
    ) -> Option<MeshUpload>;

    fn mesh_draw(&mut self, vao: u32, index_count: usize, mode: DrawMode);

    /// Deletes a VAO.
    fn mesh_delete(&mut self, vao: u32);

    /// Builds a VAO over already-uploaded shared buffers, for contexts that
    /// joined the share group after the data was uploaded. Returns the VAO
    /// id, 0 on failure.
    fn mesh_create_vao(&mut self, layout: &VertexLayout, vbo: u32, ebo: u32) -> u32;

    /// Deletes a VBO/EBO/UBO.
    fn buffer_delete(&mut self, id: u32);
}
