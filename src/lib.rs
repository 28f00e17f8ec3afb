#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod errors;
pub mod gpu;
pub mod handle;
pub mod hashing;
pub mod interner;
pub mod pool;
pub mod resource_map;
pub mod resources;
pub mod vertex;

pub use errors::{GfxError, Result};
pub use gpu::context::{GpuContext, VaoSlot};
pub use gpu::ops::{GpuOps, MeshUpload};
pub use gpu::share_group::{GpuSlot, MeshDataSlot, ShareGroup, ShareGroupRegistry};
pub use gpu::sync::{GpuSystem, ShaderPreprocessor};
pub use handle::Handle;
pub use pool::Pool;
pub use resource_map::ResourceMap;
pub use resources::ResourceHeader;
pub use resources::material::{
    Material, MaterialHandle, MaterialRegistry, Phase, RenderState, UniformValue,
};
pub use resources::mesh::{Mesh, MeshHandle, MeshLoader, MeshRegistry};
pub use resources::primitives::{
    BoxOptions, PlaneOptions, PrimitiveData, SphereOptions, create_box, create_plane,
    create_sphere,
};
pub use resources::shader::{Shader, ShaderHandle, ShaderRegistry, VariantInfo, VariantOp};
pub use resources::texture::{
    Texture, TextureFlags, TextureFormat, TextureHandle, TextureRegistry,
};
pub use vertex::{AttribType, DrawMode, VertexAttrib, VertexLayout};
