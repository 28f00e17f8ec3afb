//! Axis-aligned plane in the XY plane, facing +Z.

use super::PrimitiveData;

pub struct PlaneOptions {
    pub width: f32,
    pub height: f32,
    pub width_segments: u32,
    pub height_segments: u32,
}

impl Default for PlaneOptions {
    fn default() -> Self {
        Self {
            width: 1.0,
            height: 1.0,
            width_segments: 1,
            height_segments: 1,
        }
    }
}

#[must_use]
pub fn create_plane(options: PlaneOptions) -> PrimitiveData {
    let width_half = options.width / 2.0;
    let height_half = options.height / 2.0;

    let grid_x = options.width_segments.max(1);
    let grid_y = options.height_segments.max(1);

    let grid_x1 = grid_x + 1;
    let grid_y1 = grid_y + 1;

    let segment_width = options.width / grid_x as f32;
    let segment_height = options.height / grid_y as f32;

    let mut data = PrimitiveData::with_capacity(
        (grid_x1 * grid_y1) as usize,
        (grid_x * grid_y * 6) as usize,
    );

    for iy in 0..grid_y1 {
        let y = iy as f32 * segment_height - height_half;
        for ix in 0..grid_x1 {
            let x = ix as f32 * segment_width - width_half;

            // -y keeps v increasing downward to match the uv origin
            data.push_vertex(
                [x, -y, 0.0],
                [0.0, 0.0, 1.0],
                [ix as f32 / grid_x as f32, 1.0 - (iy as f32 / grid_y as f32)],
            );
        }
    }

    for iy in 0..grid_y {
        for ix in 0..grid_x {
            let a = ix + grid_x1 * iy;
            let b = ix + grid_x1 * (iy + 1);
            let c = (ix + 1) + grid_x1 * (iy + 1);
            let d = (ix + 1) + grid_x1 * iy;

            data.push_triangle(a, b, d);
            data.push_triangle(b, c, d);
        }
    }

    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_plane_is_a_quad() {
        let data = create_plane(PlaneOptions::default());
        assert_eq!(data.vertex_count(), 4);
        assert_eq!(data.indices().len(), 6);
    }

    #[test]
    fn segmented_plane_counts() {
        let data = create_plane(PlaneOptions {
            width_segments: 4,
            height_segments: 3,
            ..PlaneOptions::default()
        });
        assert_eq!(data.vertex_count(), 5 * 4);
        assert_eq!(data.indices().len(), 4 * 3 * 6);
    }
}
