//! UV sphere built from a latitude/longitude grid.

use std::f32::consts::PI;

use super::PrimitiveData;

pub struct SphereOptions {
    pub radius: f32,
    pub width_segments: u32,
    pub height_segments: u32,
}

impl Default for SphereOptions {
    fn default() -> Self {
        Self {
            radius: 1.0,
            width_segments: 32,
            height_segments: 16,
        }
    }
}

#[must_use]
pub fn create_sphere(options: SphereOptions) -> PrimitiveData {
    let radius = options.radius;
    let width_segments = options.width_segments.max(3);
    let height_segments = options.height_segments.max(2);

    let mut data = PrimitiveData::with_capacity(
        ((width_segments + 1) * (height_segments + 1)) as usize,
        (width_segments * height_segments * 6) as usize,
    );

    for y in 0..=height_segments {
        let v_ratio = y as f32 / height_segments as f32;
        // Latitude from 0 (south pole) to PI (north pole), Y-up.
        let theta = v_ratio * PI;

        let py = -radius * theta.cos();
        let ring_radius = radius * theta.sin();

        for x in 0..=width_segments {
            let u_ratio = x as f32 / width_segments as f32;
            let phi = u_ratio * 2.0 * PI;

            let px = -ring_radius * phi.cos();
            let pz = ring_radius * phi.sin();

            data.push_vertex(
                [px, py, pz],
                [px / radius, py / radius, pz / radius],
                [u_ratio, 1.0 - v_ratio],
            );
        }
    }

    // Two triangles per grid cell. The cells touching a pole produce
    // degenerate triangles which the rasterizer discards.
    let stride = width_segments + 1;
    for y in 0..height_segments {
        for x in 0..width_segments {
            let v0 = y * stride + x;
            let v1 = v0 + 1;
            let v2 = (y + 1) * stride + x;
            let v3 = v2 + 1;

            data.push_triangle(v0, v1, v2);
            data.push_triangle(v1, v3, v2);
        }
    }

    data
}
