//! Registry Lifecycle Tests
//!
//! Tests for:
//! - Handle/pool invariants through the public registry API: stale handles
//!   stay invalid after destroy, even when the slot is reused
//! - get_or_create idempotence across all registries
//! - add_ref/release semantics: n refs take n releases, extra release is a
//!   logged no-op
//! - Mesh set_data round trip with exactly one version bump
//! - Shader content-hash deduplication and in-place source updates
//! - Material phase ownership of shader references

use glimt::resources::material::MaterialRegistry;
use glimt::resources::mesh::MeshRegistry;
use glimt::resources::shader::ShaderRegistry;
use glimt::resources::texture::TextureRegistry;
use glimt::vertex::{DrawMode, VertexLayout};

fn pos_triangle(layout: &VertexLayout) -> Vec<u8> {
    let verts: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
    let mut data = Vec::with_capacity(3 * layout.stride() as usize);
    for v in &verts {
        for c in v {
            data.extend_from_slice(&c.to_le_bytes());
        }
    }
    data
}

// ============================================================================
// Handle invariants
// ============================================================================

#[test]
fn stale_handle_never_aliases_reused_slot() {
    let mut reg = MeshRegistry::new();
    let old = reg.create(Some("a")).unwrap();
    assert!(reg.is_valid(old));

    reg.destroy(old);
    assert!(!reg.is_valid(old));

    // Fill enough meshes to guarantee the freed slot is reissued.
    let mut reissued = None;
    for i in 0..8 {
        let h = reg.create(Some(&format!("b{i}"))).unwrap();
        if h.index() == old.index() {
            reissued = Some(h);
        }
    }
    let reissued = reissued.expect("freed slot should be reused");
    assert_ne!(reissued.generation(), old.generation());
    assert!(reg.is_valid(reissued));
    assert!(!reg.is_valid(old));
    assert!(reg.get(old).is_none());
}

#[test]
fn get_or_create_is_idempotent_per_uuid() {
    let mut meshes = MeshRegistry::new();
    let a = meshes.get_or_create("m1").unwrap();
    let b = meshes.get_or_create("m1").unwrap();
    assert_eq!(a, b);

    let mut textures = TextureRegistry::new();
    let a = textures.get_or_create("t1").unwrap();
    let b = textures.get_or_create("t1").unwrap();
    assert_eq!(a, b);

    let mut shaders = ShaderRegistry::new();
    let a = shaders.get_or_create("s1").unwrap();
    let b = shaders.get_or_create("s1").unwrap();
    assert_eq!(a, b);

    let mut materials = MaterialRegistry::new();
    let a = materials.get_or_create("mat1", "basic").unwrap();
    let b = materials.get_or_create("mat1", "ignored").unwrap();
    assert_eq!(a, b);
}

#[test]
fn create_with_taken_uuid_fails_but_registry_survives() {
    let mut reg = TextureRegistry::new();
    let first = reg.create(Some("dup")).unwrap();
    assert!(reg.create(Some("dup")).is_err());

    assert!(reg.is_valid(first));
    assert_eq!(reg.count(), 1);
    assert_eq!(reg.find("dup"), Some(first));
}

#[test]
fn auto_uuids_are_prefixed_hex_and_unique() {
    let mut reg = MeshRegistry::new();
    let a = reg.create(None).unwrap();
    let b = reg.create(None).unwrap();

    let ua = reg.get(a).unwrap().header.uuid().to_owned();
    let ub = reg.get(b).unwrap().header.uuid().to_owned();
    assert_ne!(ua, ub);
    assert_eq!(ua, "mesh-0000000000000001");
    assert_eq!(ub, "mesh-0000000000000002");
}

// ============================================================================
// Reference counting
// ============================================================================

#[test]
fn n_refs_take_n_releases_and_extra_release_is_harmless() {
    let mut reg = TextureRegistry::new();
    let h = reg.create(Some("t")).unwrap();
    for _ in 0..3 {
        reg.add_ref(h);
    }

    assert!(!reg.release(h));
    assert!(!reg.release(h));
    assert!(reg.is_valid(h));
    assert!(reg.release(h)); // third release destroys
    assert!(!reg.is_valid(h));

    // One extra release must not corrupt anything.
    assert!(!reg.release(h));
    assert_eq!(reg.count(), 0);
    assert!(reg.create(Some("t")).is_ok());
}

// ============================================================================
// Mesh data round trip
// ============================================================================

#[test]
fn set_data_round_trips_with_single_version_bump() {
    let mut reg = MeshRegistry::new();
    let layout = VertexLayout::pos();
    let vertices = pos_triangle(&layout);
    let indices = [0u32, 1, 2];

    let h = reg.create(Some("tri")).unwrap();
    let before = reg.get(h).unwrap().header.version();
    reg.get_mut(h)
        .unwrap()
        .set_data(&vertices, 3, &layout, &indices, None)
        .unwrap();

    let mesh = reg.get(h).unwrap();
    assert_eq!(mesh.header.version(), before + 1);
    assert_eq!(mesh.vertices(), &vertices[..]);
    assert_eq!(mesh.indices(), &indices);
    assert_eq!(mesh.vertex_count(), 3);
    assert_eq!(mesh.index_count(), 3);
}

#[test]
fn from_interleaved_content_uuid_is_stable() {
    let mut reg = MeshRegistry::new();
    let layout = VertexLayout::pos();
    let vertices = pos_triangle(&layout);

    let a = reg
        .from_interleaved(&vertices, 3, &layout, &[0, 1, 2], None, None, DrawMode::Triangles)
        .unwrap();
    let b = reg
        .from_interleaved(&vertices, 3, &layout, &[0, 1, 2], None, None, DrawMode::Triangles)
        .unwrap();
    assert_eq!(a, b);

    // Different indices produce a different content id.
    let c = reg
        .from_interleaved(&vertices, 3, &layout, &[2, 1, 0], None, None, DrawMode::Triangles)
        .unwrap();
    assert_ne!(a, c);
    assert_eq!(reg.count(), 2);
}

// ============================================================================
// Shader deduplication
// ============================================================================

#[test]
fn identical_sources_resolve_to_one_shader() {
    let mut reg = ShaderRegistry::new();
    let a = reg.from_sources("vs", "fs", None, None, None).unwrap();
    let b = reg.from_sources("vs", "fs", None, None, None).unwrap();
    assert_eq!(a, b);
    assert_eq!(reg.count(), 1);

    // Changing any stage yields a distinct shader.
    let c = reg.from_sources("vs2", "fs", None, None, None).unwrap();
    let d = reg.from_sources("vs", "fs2", None, None, None).unwrap();
    let e = reg.from_sources("vs", "fs", Some("gs"), None, None).unwrap();
    assert_ne!(a, c);
    assert_ne!(a, d);
    assert_ne!(a, e);
    assert_eq!(reg.count(), 4);
}

#[test]
fn existing_uuid_updates_sources_with_version_bump() {
    let mut reg = ShaderRegistry::new();
    let h = reg.from_sources("vs", "fs", None, Some("s"), None).unwrap();
    let v = reg.get(h).unwrap().header.version();

    let same = reg.from_sources("vs", "fs", None, Some("s"), None).unwrap();
    assert_eq!(same, h);
    assert_eq!(reg.get(h).unwrap().header.version(), v);

    let updated = reg.from_sources("vs", "fs3", None, Some("s"), None).unwrap();
    assert_eq!(updated, h);
    assert_eq!(reg.get(h).unwrap().header.version(), v + 1);
}

// ============================================================================
// Material shader ownership
// ============================================================================

#[test]
fn material_lifecycle_owns_shader_refs() {
    let mut shaders = ShaderRegistry::new();
    let mut materials = MaterialRegistry::new();

    let sh = shaders.from_sources("vs", "fs", None, None, None).unwrap();
    let m1 = materials.create(Some("m1"), "wood").unwrap();
    let m2 = materials.create(Some("m2"), "stone").unwrap();

    materials.add_phase(m1, &mut shaders, sh, "opaque", 0).unwrap();
    materials.add_phase(m2, &mut shaders, sh, "opaque", 0).unwrap();
    assert_eq!(shaders.get(sh).unwrap().header.ref_count(), 2);

    materials.destroy(m1, &mut shaders);
    assert!(shaders.is_valid(sh));
    materials.destroy(m2, &mut shaders);
    assert!(!shaders.is_valid(sh));
}
