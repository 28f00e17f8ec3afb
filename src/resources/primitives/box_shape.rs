//! Axis-aligned box with per-face normals (24 vertices, 4 per face).

use super::PrimitiveData;

pub struct BoxOptions {
    pub width: f32,
    pub height: f32,
    pub depth: f32,
}

impl Default for BoxOptions {
    fn default() -> Self {
        Self {
            width: 1.0,
            height: 1.0,
            depth: 1.0,
        }
    }
}

#[must_use]
pub fn create_box(options: BoxOptions) -> PrimitiveData {
    let w = options.width / 2.0;
    let h = options.height / 2.0;
    let d = options.depth / 2.0;

    let mut data = PrimitiveData::with_capacity(24, 36);

    // face: (normal, four corners, four uvs), CCW winding
    let faces: [([f32; 3], [[f32; 3]; 4], [[f32; 2]; 4]); 6] = [
        // +Z
        (
            [0.0, 0.0, 1.0],
            [[-w, -h, d], [w, -h, d], [w, h, d], [-w, h, d]],
            [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]],
        ),
        // -Z
        (
            [0.0, 0.0, -1.0],
            [[-w, -h, -d], [-w, h, -d], [w, h, -d], [w, -h, -d]],
            [[1.0, 1.0], [1.0, 0.0], [0.0, 0.0], [0.0, 1.0]],
        ),
        // +Y
        (
            [0.0, 1.0, 0.0],
            [[-w, h, -d], [-w, h, d], [w, h, d], [w, h, -d]],
            [[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0]],
        ),
        // -Y
        (
            [0.0, -1.0, 0.0],
            [[-w, -h, -d], [w, -h, -d], [w, -h, d], [-w, -h, d]],
            [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]],
        ),
        // +X
        (
            [1.0, 0.0, 0.0],
            [[w, -h, -d], [w, h, -d], [w, h, d], [w, -h, d]],
            [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]],
        ),
        // -X
        (
            [-1.0, 0.0, 0.0],
            [[-w, -h, -d], [-w, -h, d], [-w, h, d], [-w, h, -d]],
            [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]],
        ),
    ];

    for (face, (normal, corners, uvs)) in faces.iter().enumerate() {
        for i in 0..4 {
            data.push_vertex(corners[i], *normal, uvs[i]);
        }
        let base = (face * 4) as u32;
        data.push_triangle(base, base + 1, base + 2);
        data.push_triangle(base, base + 2, base + 3);
    }

    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_counts() {
        let data = create_box(BoxOptions::default());
        assert_eq!(data.vertex_count(), 24);
        assert_eq!(data.indices().len(), 36);
        assert!(data.indices().iter().all(|&i| i < 24));
    }
}
