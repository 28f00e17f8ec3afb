//! Texture Registry
//!
//! Textures hold a raw pixel blob plus dimensions, a format tag and a set
//! of transform/sampling flags. Depth textures (`TextureFormat::Depth24`)
//! ride the same registry and version machinery as color textures; only
//! the upload path downstream treats them differently.

use bitflags::bitflags;
use log::{error, warn};

use crate::errors::{GfxError, Result};
use crate::handle::Handle;
use crate::hashing::{self, FNV_OFFSET_BASIS};
use crate::interner::{self, Symbol};
use crate::pool::Pool;
use crate::resource_map::ResourceMap;
use crate::resources::{ResourceHeader, generate_prefixed_uuid};

pub type TextureHandle = Handle<Texture>;

pub const WHITE_1X1_UUID: &str = "__white_1x1__";
pub const DUMMY_SHADOW_1X1_UUID: &str = "__dummy_shadow_1x1__";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextureFormat {
    #[default]
    Rgba8,
    Rgb8,
    Rg8,
    R8,
    Rgba16F,
    Rgb16F,
    /// Depth texture for shadow maps; uploaded through the depth-specific
    /// backend path.
    Depth24,
}

impl TextureFormat {
    #[must_use]
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba8 | Self::Depth24 => 4,
            Self::Rgb8 => 3,
            Self::Rg8 => 2,
            Self::R8 => 1,
            Self::Rgba16F => 8,
            Self::Rgb16F => 6,
        }
    }

    #[must_use]
    pub fn channels(self) -> u8 {
        match self {
            Self::Rgba8 | Self::Rgba16F => 4,
            Self::Rgb8 | Self::Rgb16F => 3,
            Self::Rg8 => 2,
            Self::R8 | Self::Depth24 => 1,
        }
    }

    #[must_use]
    pub fn from_channels(channels: u8) -> Self {
        match channels {
            1 => Self::R8,
            2 => Self::Rg8,
            3 => Self::Rgb8,
            _ => Self::Rgba8,
        }
    }
}

bitflags! {
    /// Orientation transforms plus sampling options.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TextureFlags: u8 {
        const FLIP_X = 1 << 0;
        const FLIP_Y = 1 << 1;
        const TRANSPOSE = 1 << 2;
        const MIPMAP = 1 << 3;
        const CLAMP = 1 << 4;
        /// Depth-comparison mode for `sampler2DShadow`.
        const COMPARE = 1 << 5;
    }
}

impl Default for TextureFlags {
    // Image rows arrive top-down; GL wants bottom-up.
    fn default() -> Self {
        Self::FLIP_Y | Self::MIPMAP
    }
}

#[derive(Debug)]
pub struct Texture {
    pub header: ResourceHeader,
    data: Vec<u8>,
    width: u32,
    height: u32,
    pub format: TextureFormat,
    pub flags: TextureFlags,
    pub source_path: Option<Symbol>,
}

impl Texture {
    fn new(uuid: &str) -> Self {
        Self {
            header: ResourceHeader::new(uuid),
            data: Vec::new(),
            width: 0,
            height: 0,
            format: TextureFormat::default(),
            flags: TextureFlags::default(),
            source_path: None,
        }
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn has_data(&self) -> bool {
        !self.data.is_empty()
    }

    #[must_use]
    pub fn data_size(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }

    /// Replaces the pixel blob with tightly packed 8-bit data.
    pub fn set_data(
        &mut self,
        data: &[u8],
        width: u32,
        height: u32,
        channels: u8,
        name: Option<&str>,
        source_path: Option<&str>,
    ) -> Result<()> {
        let expected = width as usize * height as usize * channels as usize;
        if data.len() != expected || expected == 0 {
            return Err(GfxError::MissingInput("pixel data does not match dimensions"));
        }
        self.data = data.to_vec();
        self.width = width;
        self.height = height;
        self.format = TextureFormat::from_channels(channels);
        if let Some(name) = name {
            self.header.set_name(name);
        }
        if let Some(path) = source_path {
            self.source_path = Some(interner::intern(path));
        }
        self.header.bump_version();
        self.header.set_loaded(true);
        Ok(())
    }

    /// Updates orientation flags; a change bumps the version because the
    /// transform is baked in at upload time.
    pub fn set_transforms(&mut self, flip_x: bool, flip_y: bool, transpose: bool) {
        let mut flags = self.flags;
        flags.set(TextureFlags::FLIP_X, flip_x);
        flags.set(TextureFlags::FLIP_Y, flip_y);
        flags.set(TextureFlags::TRANSPOSE, transpose);
        if flags != self.flags {
            self.flags = flags;
            self.header.bump_version();
        }
    }

    /// Content-derived UUID: FNV-1a over dimensions then pixel bytes,
    /// 16 lowercase hex digits.
    #[must_use]
    pub fn compute_uuid(data: &[u8], width: u32, height: u32, channels: u8) -> String {
        let mut h = FNV_OFFSET_BASIS;
        h = hashing::fnv1a_bytes(&width.to_le_bytes(), h);
        h = hashing::fnv1a_bytes(&height.to_le_bytes(), h);
        h = hashing::fnv1a_bytes(&u32::from(channels).to_le_bytes(), h);
        h = hashing::fnv1a_bytes(data, h);
        hashing::hex16(h)
    }
}

/// Diagnostic snapshot of one texture.
#[derive(Debug, Clone)]
pub struct TextureInfo {
    pub handle: TextureHandle,
    pub uuid: String,
    pub name: Option<&'static str>,
    pub source_path: Option<&'static str>,
    pub ref_count: u32,
    pub version: u32,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub memory_bytes: usize,
}

pub struct TextureRegistry {
    pool: Pool<Texture>,
    uuid_to_index: ResourceMap,
    next_uuid: u64,
}

impl TextureRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pool: Pool::with_capacity(64),
            uuid_to_index: ResourceMap::new(),
            next_uuid: 1,
        }
    }

    // ========================================================================
    // Create / find / destroy
    // ========================================================================

    pub fn create(&mut self, uuid: Option<&str>) -> Result<TextureHandle> {
        let uuid = match uuid {
            Some(u) if !u.is_empty() => {
                if self.uuid_to_index.contains(u) {
                    warn!("texture create: uuid '{u}' already exists");
                    return Err(GfxError::DuplicateUuid(u.to_owned()));
                }
                u.to_owned()
            }
            _ => generate_prefixed_uuid("texture", &mut self.next_uuid),
        };

        let h = self.pool.alloc(Texture::new(&uuid));
        if h.is_invalid() {
            error!("texture create: pool alloc failed");
            return Err(GfxError::AllocationFailed("texture pool"));
        }
        let index = h.index();
        if let Some(tex) = self.pool.get_mut(h) {
            tex.header.set_pool_index(index);
        }
        if !self.uuid_to_index.add(&uuid, index) {
            error!("texture create: failed to add '{uuid}' to uuid map");
            self.pool.free(h);
            return Err(GfxError::AllocationFailed("texture uuid map"));
        }
        Ok(h)
    }

    #[must_use]
    pub fn find(&self, uuid: &str) -> Option<TextureHandle> {
        let index = self.uuid_to_index.get(uuid)?;
        self.pool.handle_at(index)
    }

    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Option<TextureHandle> {
        let sym = interner::get(name)?;
        let mut found = None;
        self.pool.for_each(|h, tex| {
            if tex.header.name == Some(sym) {
                found = Some(h);
                false
            } else {
                true
            }
        });
        found
    }

    pub fn get_or_create(&mut self, uuid: &str) -> Result<TextureHandle> {
        if uuid.is_empty() {
            warn!("texture get_or_create: empty uuid");
            return Err(GfxError::MissingInput("uuid"));
        }
        if let Some(h) = self.find(uuid) {
            return Ok(h);
        }
        self.create(Some(uuid))
    }

    #[must_use]
    pub fn get(&self, h: TextureHandle) -> Option<&Texture> {
        self.pool.get(h)
    }

    pub fn get_mut(&mut self, h: TextureHandle) -> Option<&mut Texture> {
        self.pool.get_mut(h)
    }

    #[must_use]
    pub fn is_valid(&self, h: TextureHandle) -> bool {
        self.pool.is_valid(h)
    }

    #[must_use]
    pub fn contains(&self, uuid: &str) -> bool {
        self.uuid_to_index.contains(uuid)
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.pool.count()
    }

    pub fn destroy(&mut self, h: TextureHandle) -> bool {
        let Some(tex) = self.pool.get(h) else {
            return false;
        };
        let uuid = tex.header.uuid().to_owned();
        self.uuid_to_index.remove(&uuid);
        self.pool.free(h).is_some()
    }

    // ========================================================================
    // Reference counting
    // ========================================================================

    pub fn add_ref(&mut self, h: TextureHandle) {
        if let Some(tex) = self.pool.get_mut(h) {
            tex.header.add_ref();
        }
    }

    pub fn release(&mut self, h: TextureHandle) -> bool {
        let Some(tex) = self.pool.get_mut(h) else {
            warn!("texture release: invalid handle");
            return false;
        };
        if !tex.header.dec_ref() {
            warn!(
                "texture release: '{}' [{}] already at ref_count=0",
                tex.header.name_str().unwrap_or("?"),
                tex.header.uuid()
            );
            return false;
        }
        if tex.header.ref_count() == 0 {
            self.destroy(h);
            return true;
        }
        false
    }

    // ========================================================================
    // Convenience constructors
    // ========================================================================

    /// Gets or creates a texture from pixel data, deduplicating by content
    /// UUID when no hint is given.
    pub fn from_data(
        &mut self,
        data: &[u8],
        width: u32,
        height: u32,
        channels: u8,
        name: Option<&str>,
        source_path: Option<&str>,
        uuid_hint: Option<&str>,
    ) -> Result<TextureHandle> {
        let uuid = match uuid_hint {
            Some(u) if !u.is_empty() => u.to_owned(),
            _ => Texture::compute_uuid(data, width, height, channels),
        };
        if let Some(existing) = self.find(&uuid) {
            return Ok(existing);
        }

        let h = self.create(Some(&uuid))?;
        let Some(tex) = self.pool.get_mut(h) else {
            return Err(GfxError::InvalidHandle);
        };
        if let Err(e) = tex.set_data(data, width, height, channels, name, source_path) {
            self.destroy(h);
            return Err(e);
        }
        Ok(h)
    }

    /// 1x1 opaque white RGBA texture, the stand-in for "no texture bound".
    /// Built through the normal API and cached by UUID.
    pub fn white_1x1(&mut self) -> Result<TextureHandle> {
        if let Some(h) = self.find(WHITE_1X1_UUID) {
            return Ok(h);
        }
        self.from_data(
            &[255, 255, 255, 255],
            1,
            1,
            4,
            Some(WHITE_1X1_UUID),
            None,
            Some(WHITE_1X1_UUID),
        )
    }

    /// 1x1 depth texture at max depth (fully lit), bound to shadow samplers
    /// when no shadow map exists yet.
    pub fn dummy_shadow_1x1(&mut self) -> Result<TextureHandle> {
        if let Some(h) = self.find(DUMMY_SHADOW_1X1_UUID) {
            return Ok(h);
        }
        let h = self.create(Some(DUMMY_SHADOW_1X1_UUID))?;
        let Some(tex) = self.pool.get_mut(h) else {
            return Err(GfxError::InvalidHandle);
        };
        tex.data = 1.0f32.to_le_bytes().to_vec();
        tex.width = 1;
        tex.height = 1;
        tex.format = TextureFormat::Depth24;
        tex.flags = TextureFlags::CLAMP | TextureFlags::COMPARE;
        tex.header.set_name(DUMMY_SHADOW_1X1_UUID);
        tex.header.set_loaded(true);
        Ok(h)
    }

    // ========================================================================
    // Iteration / diagnostics
    // ========================================================================

    pub fn for_each(&self, f: impl FnMut(TextureHandle, &Texture) -> bool) {
        self.pool.for_each(f);
    }

    #[must_use]
    pub fn collect_info(&self) -> Vec<TextureInfo> {
        let mut infos = Vec::with_capacity(self.pool.count());
        self.pool.for_each(|h, tex| {
            infos.push(TextureInfo {
                handle: h,
                uuid: tex.header.uuid().to_owned(),
                name: tex.header.name_str(),
                source_path: tex.source_path.map(interner::resolve),
                ref_count: tex.header.ref_count(),
                version: tex.header.version(),
                width: tex.width(),
                height: tex.height(),
                format: tex.format,
                memory_bytes: tex.data().len(),
            });
            true
        });
        infos
    }

    pub fn clear(&mut self) {
        self.pool.clear();
        self.uuid_to_index.clear();
    }
}

impl Default for TextureRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_data_bumps_version_and_round_trips() {
        let mut reg = TextureRegistry::new();
        let h = reg.create(Some("t1")).unwrap();
        let pixels = [10u8, 20, 30, 40];
        reg.get_mut(h)
            .unwrap()
            .set_data(&pixels, 1, 1, 4, Some("pixel"), None)
            .unwrap();

        let tex = reg.get(h).unwrap();
        assert_eq!(tex.header.version(), 2);
        assert_eq!(tex.data(), &pixels);
        assert_eq!(tex.format, TextureFormat::Rgba8);
    }

    #[test]
    fn set_data_rejects_size_mismatch() {
        let mut reg = TextureRegistry::new();
        let h = reg.create(None).unwrap();
        let err = reg.get_mut(h).unwrap().set_data(&[0u8; 3], 2, 2, 4, None, None);
        assert!(err.is_err());
        assert_eq!(reg.get(h).unwrap().header.version(), 1);
    }

    #[test]
    fn transforms_bump_only_on_change() {
        let mut reg = TextureRegistry::new();
        let h = reg.create(None).unwrap();
        let v0 = reg.get(h).unwrap().header.version();

        // Defaults already have flip_y set, so this is a no-op.
        reg.get_mut(h).unwrap().set_transforms(false, true, false);
        assert_eq!(reg.get(h).unwrap().header.version(), v0);

        reg.get_mut(h).unwrap().set_transforms(true, true, false);
        assert_eq!(reg.get(h).unwrap().header.version(), v0 + 1);
    }

    #[test]
    fn from_data_dedups_by_content() {
        let mut reg = TextureRegistry::new();
        let pixels = [1u8, 2, 3, 4];
        let a = reg.from_data(&pixels, 1, 1, 4, None, None, None).unwrap();
        let b = reg.from_data(&pixels, 1, 1, 4, None, None, None).unwrap();
        assert_eq!(a, b);
        assert_eq!(reg.count(), 1);
    }

    #[test]
    fn white_1x1_is_cached() {
        let mut reg = TextureRegistry::new();
        let a = reg.white_1x1().unwrap();
        let b = reg.white_1x1().unwrap();
        assert_eq!(a, b);

        let tex = reg.get(a).unwrap();
        assert_eq!(tex.data(), &[255, 255, 255, 255]);
        assert_eq!((tex.width(), tex.height()), (1, 1));
    }

    #[test]
    fn dummy_shadow_is_depth_with_compare() {
        let mut reg = TextureRegistry::new();
        let h = reg.dummy_shadow_1x1().unwrap();
        let tex = reg.get(h).unwrap();
        assert_eq!(tex.format, TextureFormat::Depth24);
        assert!(tex.flags.contains(TextureFlags::COMPARE));
        assert!(tex.flags.contains(TextureFlags::CLAMP));
        assert_eq!(tex.data(), &1.0f32.to_le_bytes());
        assert_eq!(tex.header.version(), 1);
    }
}
