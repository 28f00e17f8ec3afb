//! Per-native-context GPU state.
//!
//! A context joins exactly one share group and owns a private array of
//! VAO slots keyed by mesh pool index. Each slot remembers which shared
//! buffers its VAO was built against, so a VAO can be detected as stale
//! even when the mesh data version has not moved (e.g. the buffers were
//! re-uploaded by another context).

const INITIAL_SLOTS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VaoSlot {
    pub vao: u32,
    pub bound_vbo: u32,
    pub bound_ebo: u32,
}

#[derive(Debug)]
pub struct GpuContext {
    key: usize,
    group_key: usize,
    mesh_vaos: Vec<VaoSlot>,
}

impl GpuContext {
    pub(crate) fn new(key: usize, group_key: usize) -> Self {
        Self {
            key,
            group_key,
            mesh_vaos: Vec::new(),
        }
    }

    #[must_use]
    pub fn key(&self) -> usize {
        self.key
    }

    /// Key of the share group this context belongs to.
    #[must_use]
    pub fn group_key(&self) -> usize {
        self.group_key
    }

    pub fn vao_slot(&mut self, index: u32) -> &mut VaoSlot {
        let index = index as usize;
        if index >= self.mesh_vaos.len() {
            let mut len = self.mesh_vaos.len().max(INITIAL_SLOTS);
            while len <= index {
                len *= 2;
            }
            self.mesh_vaos.resize(len, VaoSlot::default());
        }
        &mut self.mesh_vaos[index]
    }

    #[must_use]
    pub fn peek_vao_slot(&self, index: u32) -> VaoSlot {
        self.mesh_vaos
            .get(index as usize)
            .copied()
            .unwrap_or_default()
    }

    pub(crate) fn vao_slots_mut(&mut self) -> &mut [VaoSlot] {
        &mut self.mesh_vaos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vao_slots_start_zeroed_and_survive_growth() {
        let mut ctx = GpuContext::new(1, 1);
        assert_eq!(ctx.peek_vao_slot(10), VaoSlot::default());

        ctx.vao_slot(10).vao = 7;
        ctx.vao_slot(10).bound_vbo = 8;
        let _ = ctx.vao_slot(500);
        assert_eq!(
            ctx.peek_vao_slot(10),
            VaoSlot {
                vao: 7,
                bound_vbo: 8,
                bound_ebo: 0
            }
        );
    }
}
