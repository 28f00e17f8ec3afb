//! Vertex Layout Descriptors
//!
//! Describes how an interleaved vertex buffer is laid out: a small ordered
//! set of named attributes with component counts, scalar types and byte
//! offsets. The layout travels with mesh data and is handed to the GPU
//! backend when buffers are uploaded or a VAO is (re)built.

use smallvec::SmallVec;

use crate::interner::{self, Symbol};

/// Maximum attributes per layout; matches what a VAO realistically binds.
pub const MAX_VERTEX_ATTRIBS: usize = 8;

/// Scalar type of one attribute component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttribType {
    Float32,
    Int32,
    Uint32,
    Int16,
    Uint16,
    Int8,
    Uint8,
}

impl AttribType {
    /// Size in bytes of one component.
    #[must_use]
    pub fn size(self) -> u16 {
        match self {
            Self::Float32 | Self::Int32 | Self::Uint32 => 4,
            Self::Int16 | Self::Uint16 => 2,
            Self::Int8 | Self::Uint8 => 1,
        }
    }
}

/// Primitive topology used when drawing a mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawMode {
    #[default]
    Triangles,
    TriangleStrip,
    Lines,
    LineStrip,
    Points,
}

/// One attribute within an interleaved vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttrib {
    pub name: Symbol,
    /// Component count (e.g. 3 for a vec3 position).
    pub size: u8,
    pub ty: AttribType,
    /// Shader attribute location.
    pub location: u8,
    /// Byte offset within the vertex.
    pub offset: u16,
}

/// Ordered attribute set plus the resulting vertex stride.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VertexLayout {
    attribs: SmallVec<[VertexAttrib; MAX_VERTEX_ATTRIBS]>,
    stride: u16,
}

impl VertexLayout {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an attribute at the current end of the vertex. Returns
    /// `false` when the layout is full.
    pub fn add(&mut self, name: &str, size: u8, ty: AttribType, location: u8) -> bool {
        if self.attribs.len() >= MAX_VERTEX_ATTRIBS {
            return false;
        }
        self.attribs.push(VertexAttrib {
            name: interner::intern(name),
            size,
            ty,
            location,
            offset: self.stride,
        });
        self.stride += u16::from(size) * ty.size();
        true
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<&VertexAttrib> {
        let sym = interner::get(name)?;
        self.attribs.iter().find(|a| a.name == sym)
    }

    /// Bytes per vertex.
    #[must_use]
    pub fn stride(&self) -> u16 {
        self.stride
    }

    #[must_use]
    pub fn attribs(&self) -> &[VertexAttrib] {
        &self.attribs
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attribs.is_empty()
    }

    // ========================================================================
    // Predefined layouts
    // ========================================================================

    #[must_use]
    pub fn pos() -> Self {
        let mut l = Self::new();
        l.add("position", 3, AttribType::Float32, 0);
        l
    }

    #[must_use]
    pub fn pos_normal() -> Self {
        let mut l = Self::pos();
        l.add("normal", 3, AttribType::Float32, 1);
        l
    }

    #[must_use]
    pub fn pos_normal_uv() -> Self {
        let mut l = Self::pos_normal();
        l.add("uv", 2, AttribType::Float32, 2);
        l
    }

    #[must_use]
    pub fn pos_normal_uv_tangent() -> Self {
        let mut l = Self::pos_normal_uv();
        l.add("tangent", 4, AttribType::Float32, 3);
        l
    }

    #[must_use]
    pub fn pos_normal_uv_color() -> Self {
        let mut l = Self::pos_normal_uv();
        l.add("color", 4, AttribType::Float32, 5);
        l
    }

    #[must_use]
    pub fn skinned() -> Self {
        let mut l = Self::pos_normal_uv();
        l.add("joints", 4, AttribType::Float32, 3);
        l.add("weights", 4, AttribType::Float32, 4);
        l
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stride_and_offsets() {
        let l = VertexLayout::pos_normal_uv();
        assert_eq!(l.stride(), (3 + 3 + 2) * 4);
        assert_eq!(l.find("position").unwrap().offset, 0);
        assert_eq!(l.find("normal").unwrap().offset, 12);
        assert_eq!(l.find("uv").unwrap().offset, 24);
        assert!(l.find("tangent").is_none());
    }

    #[test]
    fn full_layout_rejects_more_attribs() {
        let mut l = VertexLayout::new();
        for i in 0..MAX_VERTEX_ATTRIBS {
            assert!(l.add(&format!("a{i}"), 1, AttribType::Float32, i as u8));
        }
        assert!(!l.add("overflow", 1, AttribType::Float32, 9));
    }

    #[test]
    fn mixed_types() {
        let mut l = VertexLayout::new();
        l.add("position", 3, AttribType::Float32, 0);
        l.add("color", 4, AttribType::Uint8, 1);
        assert_eq!(l.stride(), 12 + 4);
        assert_eq!(l.find("color").unwrap().offset, 12);
    }
}
