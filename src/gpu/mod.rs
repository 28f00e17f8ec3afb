//! GPU synchronization layer.
//!
//! CPU resources live in the registries; this module maps them onto GPU
//! objects through a backend-supplied [`GpuOps`] implementation. Shared
//! objects (textures, shader programs, mesh buffers) are cached per
//! [`ShareGroup`] and keyed by the resource's pool index; vertex array
//! objects are cached per [`GpuContext`] because the underlying API does
//! not share them across native contexts.

pub mod context;
pub mod ops;
pub mod share_group;
pub mod sync;

pub use context::{GpuContext, VaoSlot};
pub use ops::{GpuOps, MeshUpload};
pub use share_group::{GpuSlot, MeshDataSlot, ShareGroup, ShareGroupRegistry, MAX_SHARE_GROUPS};
pub use sync::{GpuSystem, ShaderPreprocessor};
