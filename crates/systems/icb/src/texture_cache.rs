//! Named texture cache
//!
//! Scene data refers to textures by resource name (texel file, palette file,
//! base directory), each optionally with a precomputed hash. The cache maps
//! the hash triple to a registered [`TextureId`] so a texture shared by many
//! objects is loaded and registered once per scene.
//!
//! Loading is delegated to a [`TextureSource`]. When the palette comes from
//! a different resource than the texels, the palette resource's entries
//! replace the descriptor's palette before registration.

use thiserror::Error;

use rev_core::logging::{log, LogCategory, LogLevel};

use crate::context::RenderContext;
use crate::texture::{TextureDescriptor, TextureError, TextureId, PALETTE_ENTRIES};

/// Most textures the cache holds at once
pub const MAX_CACHED_TEXTURES: usize = 256;

/// Hash value meaning "not computed, hash the name"
pub const NULL_HASH: u32 = 0;

/// Resource-name hash used for cache keys
pub fn hash_name(name: &str) -> u32 {
    crc32fast::hash(name.as_bytes())
}

fn resolve(hash: u32, name: &str) -> u32 {
    if hash == NULL_HASH {
        hash_name(name)
    } else {
        hash
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TextureCacheError {
    #[error("texture cache full ({0} entries)")]
    Full(usize),
    #[error("failed to load {name}: {reason}")]
    Load { name: String, reason: String },
    #[error(transparent)]
    Register(#[from] TextureError),
}

/// Supplies texel and palette data on a cache miss
pub trait TextureSource<'a> {
    fn load_texture(&mut self, name: &str, base: &str) -> Result<TextureDescriptor<'a>, TextureCacheError>;

    fn load_palette(&mut self, name: &str, base: &str) -> Result<[u32; PALETTE_ENTRIES], TextureCacheError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureKey {
    pub texture: u32,
    pub palette: u32,
    pub base: u32,
}

/// A texture lookup by resource names; zero hashes are computed from the names
#[derive(Debug, Clone, Copy)]
pub struct TextureRequest<'n> {
    pub texture: &'n str,
    pub texture_hash: u32,
    pub palette: &'n str,
    pub palette_hash: u32,
    pub base: &'n str,
    pub base_hash: u32,
}

impl<'n> TextureRequest<'n> {
    pub fn named(texture: &'n str, palette: &'n str, base: &'n str) -> Self {
        Self {
            texture,
            texture_hash: NULL_HASH,
            palette,
            palette_hash: NULL_HASH,
            base,
            base_hash: NULL_HASH,
        }
    }

    pub fn key(&self) -> TextureKey {
        TextureKey {
            texture: resolve(self.texture_hash, self.texture),
            palette: resolve(self.palette_hash, self.palette),
            base: resolve(self.base_hash, self.base),
        }
    }
}

#[derive(Debug, Default)]
pub struct TextureCache {
    entries: Vec<(TextureKey, TextureId)>,
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn lookup(&self, key: TextureKey) -> Option<TextureId> {
        self.entries.iter().find(|(k, _)| *k == key).map(|&(_, id)| id)
    }

    /// Cached texture for `request`, loading and registering it on a miss
    pub fn get_registered_texture<'a, S: TextureSource<'a>>(
        &mut self,
        ctx: &mut RenderContext<'a>,
        source: &mut S,
        request: &TextureRequest<'_>,
    ) -> Result<TextureId, TextureCacheError> {
        let key = request.key();
        if let Some(id) = self.lookup(key) {
            return Ok(id);
        }
        if self.entries.len() >= MAX_CACHED_TEXTURES {
            return Err(TextureCacheError::Full(MAX_CACHED_TEXTURES));
        }

        let mut desc = source.load_texture(request.texture, request.base)?;
        if key.palette != key.texture && !desc.is_true_colour() {
            desc.palette = source.load_palette(request.palette, request.base)?;
        }

        let id = ctx.register_texture(&desc)?;
        log(LogCategory::Texture, LogLevel::Debug, || {
            format!(
                "Cached {}:{} ({:08X}:{:08X}:{:08X}) as {:?}",
                request.texture, request.palette, key.texture, key.palette, key.base, id
            )
        });
        self.entries.push((key, id));
        Ok(id)
    }

    /// Load a texture ahead of use
    pub fn pre_register<'a, S: TextureSource<'a>>(
        &mut self,
        ctx: &mut RenderContext<'a>,
        source: &mut S,
        request: &TextureRequest<'_>,
    ) -> Result<(), TextureCacheError> {
        self.get_registered_texture(ctx, source, request).map(|_| ())
    }

    /// Unregister every cached texture
    pub fn clear(&mut self, ctx: &mut RenderContext<'_>) {
        for (_, id) in self.entries.drain(..) {
            ctx.unregister_texture(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Library<'d> {
        textures: HashMap<&'static str, (u32, [u32; PALETTE_ENTRIES], &'d [u8])>,
        palettes: HashMap<&'static str, [u32; PALETTE_ENTRIES]>,
        texture_loads: usize,
        palette_loads: usize,
    }

    impl<'d> Library<'d> {
        fn new() -> Self {
            Self {
                textures: HashMap::new(),
                palettes: HashMap::new(),
                texture_loads: 0,
                palette_loads: 0,
            }
        }
    }

    impl<'d> TextureSource<'d> for Library<'d> {
        fn load_texture(&mut self, name: &str, _base: &str) -> Result<TextureDescriptor<'d>, TextureCacheError> {
            self.texture_loads += 1;
            let &(size, palette, texels) = self.textures.get(name).ok_or_else(|| TextureCacheError::Load {
                name: name.to_string(),
                reason: "not found".to_string(),
            })?;
            Ok(TextureDescriptor::paletted(palette, size, size, texels))
        }

        fn load_palette(&mut self, name: &str, _base: &str) -> Result<[u32; PALETTE_ENTRIES], TextureCacheError> {
            self.palette_loads += 1;
            self.palettes.get(name).copied().ok_or_else(|| TextureCacheError::Load {
                name: name.to_string(),
                reason: "not found".to_string(),
            })
        }
    }

    #[test]
    fn test_hash_name_matches_crc32() {
        assert_eq!(hash_name("floor"), crc32fast::hash(b"floor"));
        assert_ne!(hash_name("floor"), hash_name("wall"));
    }

    #[test]
    fn test_null_hash_is_computed_from_name() {
        let implicit = TextureRequest::named("floor", "floor", "set01").key();
        let explicit = TextureRequest {
            texture_hash: hash_name("floor"),
            palette_hash: hash_name("floor"),
            base_hash: hash_name("set01"),
            ..TextureRequest::named("floor", "floor", "set01")
        };
        assert_eq!(implicit, explicit.key());

        let custom = TextureRequest {
            texture_hash: 7,
            ..TextureRequest::named("floor", "floor", "set01")
        };
        assert_eq!(custom.key().texture, 7);
    }

    #[test]
    fn test_hit_loads_once() {
        let texels = [1u8; 16];
        let mut lib = Library::new();
        lib.textures.insert("floor", (4, [0xFF11_2233; PALETTE_ENTRIES], &texels[..]));
        let mut ctx = RenderContext::new();
        let mut cache = TextureCache::new();

        let request = TextureRequest::named("floor", "floor", "set01");
        let first = cache.get_registered_texture(&mut ctx, &mut lib, &request).unwrap();
        let second = cache.get_registered_texture(&mut ctx, &mut lib, &request).unwrap();
        assert_eq!(first, second);
        assert_eq!(lib.texture_loads, 1);
        assert_eq!(lib.palette_loads, 0);
        assert_eq!(cache.len(), 1);
        assert_eq!(ctx.texture_count(), 1);
    }

    #[test]
    fn test_separate_palette_replaces_entries() {
        let texels = [5u8; 16];
        let mut lib = Library::new();
        lib.textures.insert("crate", (4, [0; PALETTE_ENTRIES], &texels[..]));
        let mut night = [0u32; PALETTE_ENTRIES];
        night[5] = 0xFF00_0040;
        lib.palettes.insert("night", night);

        let mut ctx = RenderContext::new();
        let mut cache = TextureCache::new();
        let day = cache
            .get_registered_texture(&mut ctx, &mut lib, &TextureRequest::named("crate", "crate", "b"))
            .unwrap();
        let dark = cache
            .get_registered_texture(&mut ctx, &mut lib, &TextureRequest::named("crate", "night", "b"))
            .unwrap();
        assert_ne!(day, dark);
        assert_eq!(lib.palette_loads, 1);
        assert_eq!(ctx.texture(day).and_then(|t| t.palette()).map(|p| p[5]), Some(0));
        assert_eq!(ctx.texture(dark).and_then(|t| t.palette()).map(|p| p[5]), Some(0xFF00_0040));
    }

    #[test]
    fn test_errors_propagate() {
        let bad = [0u8; 9];
        let mut lib = Library::new();
        lib.textures.insert("odd", (3, [0; PALETTE_ENTRIES], &bad[..]));
        let mut ctx = RenderContext::new();
        let mut cache = TextureCache::new();

        let missing = cache.pre_register(&mut ctx, &mut lib, &TextureRequest::named("nope", "nope", "b"));
        assert!(matches!(missing, Err(TextureCacheError::Load { .. })));

        let rejected = cache.pre_register(&mut ctx, &mut lib, &TextureRequest::named("odd", "odd", "b"));
        assert!(matches!(rejected, Err(TextureCacheError::Register(_))));
        assert!(cache.is_empty());
        assert_eq!(ctx.texture_count(), 0);
    }

    #[test]
    fn test_capacity_and_clear() {
        let texel = [0u8; 1];
        let mut lib = Library::new();
        lib.textures.insert("dot", (1, [0; PALETTE_ENTRIES], &texel[..]));
        let mut ctx = RenderContext::new();
        let mut cache = TextureCache::new();

        for base in 0..MAX_CACHED_TEXTURES {
            let request = TextureRequest {
                base_hash: base as u32 + 1,
                ..TextureRequest::named("dot", "dot", "")
            };
            cache.pre_register(&mut ctx, &mut lib, &request).unwrap();
        }
        assert_eq!(cache.len(), MAX_CACHED_TEXTURES);

        let overflow = TextureRequest {
            base_hash: 10_000,
            ..TextureRequest::named("dot", "dot", "")
        };
        assert_eq!(
            cache.pre_register(&mut ctx, &mut lib, &overflow),
            Err(TextureCacheError::Full(MAX_CACHED_TEXTURES))
        );

        cache.clear(&mut ctx);
        assert!(cache.is_empty());
        assert_eq!(ctx.texture_count(), 0);
    }
}
