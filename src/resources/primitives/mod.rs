//! Procedural mesh primitives.
//!
//! Generators produce interleaved position/normal/uv data ready for
//! [`MeshRegistry::from_interleaved`](crate::resources::mesh::MeshRegistry::from_interleaved),
//! which deduplicates by content hash, so requesting the same primitive
//! twice yields the same mesh.

pub mod box_shape;
pub mod plane;
pub mod sphere;

pub use box_shape::{BoxOptions, create_box};
pub use plane::{PlaneOptions, create_plane};
pub use sphere::{SphereOptions, create_sphere};

use crate::errors::Result;
use crate::resources::mesh::{MeshHandle, MeshRegistry};
use crate::vertex::{DrawMode, VertexLayout};

/// Interleaved pos/normal/uv vertices plus indices, as produced by the
/// generators in this module.
#[derive(Debug, Clone)]
pub struct PrimitiveData {
    vertices: Vec<u8>,
    vertex_count: usize,
    indices: Vec<u32>,
}

impl PrimitiveData {
    fn with_capacity(vertex_count: usize, index_count: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_count * Self::layout().stride() as usize),
            vertex_count: 0,
            indices: Vec::with_capacity(index_count),
        }
    }

    #[must_use]
    pub fn layout() -> VertexLayout {
        VertexLayout::pos_normal_uv()
    }

    fn push_vertex(&mut self, position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) {
        for c in position.iter().chain(&normal).chain(&uv) {
            self.vertices.extend_from_slice(&c.to_le_bytes());
        }
        self.vertex_count += 1;
    }

    fn push_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.indices.extend_from_slice(&[a, b, c]);
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

    /// Registers the data as a mesh, deduplicated by content.
    pub fn register(&self, meshes: &mut MeshRegistry, name: &str) -> Result<MeshHandle> {
        meshes.from_interleaved(
            &self.vertices,
            self.vertex_count,
            &Self::layout(),
            &self.indices,
            Some(name),
            None,
            DrawMode::Triangles,
        )
    }
}
