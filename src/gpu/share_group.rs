//! Share groups: refcounted caches of GPU objects shared across contexts.
//!
//! Slot arrays are indexed by the CPU resource's pool index and grow lazily
//! to cover the highest index touched. A slot version of -1 means "never
//! uploaded"; CPU versions start at 1 (0 for unloaded placeholders), so -1
//! can never compare equal to a live resource version.

use log::error;

use crate::errors::{GfxError, Result};
use crate::gpu::ops::GpuOps;

/// Upper bound on simultaneously live share groups; an application has one
/// or two in practice.
pub const MAX_SHARE_GROUPS: usize = 16;

const INITIAL_SLOTS: usize = 64;

/// Cached GPU object for a texture or shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuSlot {
    pub id: u32,
    pub version: i32,
}

impl GpuSlot {
    pub const EMPTY: Self = Self { id: 0, version: -1 };
}

impl Default for GpuSlot {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Cached shared buffers for one mesh. The VAO built over them lives in
/// each context, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshDataSlot {
    pub vbo: u32,
    pub ebo: u32,
    pub version: i32,
}

impl MeshDataSlot {
    pub const EMPTY: Self = Self {
        vbo: 0,
        ebo: 0,
        version: -1,
    };
}

impl Default for MeshDataSlot {
    fn default() -> Self {
        Self::EMPTY
    }
}

fn grown_len(current: usize, index: usize) -> usize {
    let mut len = current.max(INITIAL_SLOTS);
    while len <= index {
        len *= 2;
    }
    len
}

/// One native sharing group's worth of GPU objects.
#[derive(Debug)]
pub struct ShareGroup {
    key: usize,
    refcount: u32,
    textures: Vec<GpuSlot>,
    shaders: Vec<GpuSlot>,
    mesh_data: Vec<MeshDataSlot>,
}

impl ShareGroup {
    fn new(key: usize) -> Self {
        Self {
            key,
            refcount: 1,
            textures: Vec::new(),
            shaders: Vec::new(),
            mesh_data: Vec::new(),
        }
    }

    #[must_use]
    pub fn key(&self) -> usize {
        self.key
    }

    #[must_use]
    pub fn refcount(&self) -> u32 {
        self.refcount
    }

    pub fn texture_slot(&mut self, index: u32) -> &mut GpuSlot {
        let index = index as usize;
        if index >= self.textures.len() {
            self.textures.resize(grown_len(self.textures.len(), index), GpuSlot::EMPTY);
        }
        &mut self.textures[index]
    }

    pub fn shader_slot(&mut self, index: u32) -> &mut GpuSlot {
        let index = index as usize;
        if index >= self.shaders.len() {
            self.shaders.resize(grown_len(self.shaders.len(), index), GpuSlot::EMPTY);
        }
        &mut self.shaders[index]
    }

    pub fn mesh_data_slot(&mut self, index: u32) -> &mut MeshDataSlot {
        let index = index as usize;
        if index >= self.mesh_data.len() {
            self.mesh_data
                .resize(grown_len(self.mesh_data.len(), index), MeshDataSlot::EMPTY);
        }
        &mut self.mesh_data[index]
    }

    /// Read-only views that never grow the arrays.
    #[must_use]
    pub fn peek_texture_slot(&self, index: u32) -> GpuSlot {
        self.textures
            .get(index as usize)
            .copied()
            .unwrap_or(GpuSlot::EMPTY)
    }

    #[must_use]
    pub fn peek_shader_slot(&self, index: u32) -> GpuSlot {
        self.shaders
            .get(index as usize)
            .copied()
            .unwrap_or(GpuSlot::EMPTY)
    }

    #[must_use]
    pub fn peek_mesh_data_slot(&self, index: u32) -> MeshDataSlot {
        self.mesh_data
            .get(index as usize)
            .copied()
            .unwrap_or(MeshDataSlot::EMPTY)
    }

    fn delete_all(&mut self, ops: &mut dyn GpuOps) {
        for slot in &mut self.textures {
            if slot.id != 0 {
                ops.texture_delete(slot.id);
            }
            *slot = GpuSlot::EMPTY;
        }
        for slot in &mut self.shaders {
            if slot.id != 0 {
                ops.shader_delete(slot.id);
            }
            *slot = GpuSlot::EMPTY;
        }
        for slot in &mut self.mesh_data {
            if slot.vbo != 0 {
                ops.buffer_delete(slot.vbo);
            }
            if slot.ebo != 0 {
                ops.buffer_delete(slot.ebo);
            }
            *slot = MeshDataSlot::EMPTY;
        }
    }
}

/// Bounded registry of live share groups, searched linearly by key.
#[derive(Debug, Default)]
pub struct ShareGroupRegistry {
    groups: Vec<ShareGroup>,
}

impl ShareGroupRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self { groups: Vec::new() }
    }

    /// Joins the group with `key`, bumping its refcount, or creates a fresh
    /// one with refcount 1.
    pub fn get_or_create(&mut self, key: usize) -> Result<usize> {
        if let Some(group) = self.groups.iter_mut().find(|g| g.key == key) {
            group.refcount += 1;
            return Ok(key);
        }
        if self.groups.len() >= MAX_SHARE_GROUPS {
            error!("share group registry full ({MAX_SHARE_GROUPS} groups)");
            return Err(GfxError::ShareGroupsFull(MAX_SHARE_GROUPS));
        }
        self.groups.push(ShareGroup::new(key));
        Ok(key)
    }

    #[must_use]
    pub fn get(&self, key: usize) -> Option<&ShareGroup> {
        self.groups.iter().find(|g| g.key == key)
    }

    pub fn get_mut(&mut self, key: usize) -> Option<&mut ShareGroup> {
        self.groups.iter_mut().find(|g| g.key == key)
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.groups.len()
    }

    pub fn add_ref(&mut self, key: usize) {
        if let Some(group) = self.get_mut(key) {
            group.refcount += 1;
        }
    }

    /// Drops one reference. On reaching zero every live GL object in the
    /// group is deleted through `ops` (the owning native context must be
    /// current) and the group is removed. Returns true when the group died.
    pub fn unref(&mut self, key: usize, ops: Option<&mut dyn GpuOps>) -> bool {
        let Some(pos) = self.groups.iter().position(|g| g.key == key) else {
            return false;
        };
        let group = &mut self.groups[pos];
        group.refcount = group.refcount.saturating_sub(1);
        if group.refcount > 0 {
            return false;
        }
        if let Some(ops) = ops {
            group.delete_all(ops);
        }
        self.groups.swap_remove(pos);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_start_empty_with_version_minus_one() {
        let mut reg = ShareGroupRegistry::new();
        let key = reg.get_or_create(7).unwrap();
        let group = reg.get_mut(key).unwrap();

        assert_eq!(*group.texture_slot(0), GpuSlot::EMPTY);
        assert_eq!(group.texture_slot(200).version, -1);
        assert_eq!(group.mesh_data_slot(5).version, -1);
    }

    #[test]
    fn slot_growth_preserves_existing_entries() {
        let mut reg = ShareGroupRegistry::new();
        let key = reg.get_or_create(1).unwrap();
        let group = reg.get_mut(key).unwrap();

        group.shader_slot(3).id = 42;
        group.shader_slot(3).version = 9;
        // Force growth well past the initial block.
        let _ = group.shader_slot(1000);
        assert_eq!(group.peek_shader_slot(3), GpuSlot { id: 42, version: 9 });
    }

    #[test]
    fn get_or_create_joins_existing_group() {
        let mut reg = ShareGroupRegistry::new();
        let a = reg.get_or_create(5).unwrap();
        let b = reg.get_or_create(5).unwrap();
        assert_eq!(a, b);
        assert_eq!(reg.count(), 1);
        assert_eq!(reg.get(a).unwrap().refcount(), 2);
    }

    #[test]
    fn registry_is_bounded() {
        let mut reg = ShareGroupRegistry::new();
        for key in 0..MAX_SHARE_GROUPS {
            reg.get_or_create(key).unwrap();
        }
        assert!(matches!(
            reg.get_or_create(999),
            Err(GfxError::ShareGroupsFull(_))
        ));
    }

    #[test]
    fn unref_removes_group_only_at_zero() {
        let mut reg = ShareGroupRegistry::new();
        let key = reg.get_or_create(3).unwrap();
        reg.add_ref(key);

        assert!(!reg.unref(key, None));
        assert!(reg.get(key).is_some());
        assert!(reg.unref(key, None));
        assert!(reg.get(key).is_none());
    }
}
