//! Texture registration and texel fetch
//!
//! A [`TextureDescriptor`] describes caller memory: a 256-entry palette, the
//! level-0 dimensions and up to nine mip arrays. Registration turns it into a
//! [`TextureHandle`]:
//!
//! - palette slot 0 holding [`TRUE_COLOUR_MARKER`] means level 0 is already
//!   flattened to 4-byte BGRA. The texels are borrowed, not copied, and only
//!   level 0 is used.
//! - anything else is paletted: 1-byte indices, dimensions must each be a
//!   power of two in `[1, 256]`, and the palette plus every mip level is
//!   copied into the handle.

use std::borrow::Cow;

use thiserror::Error;

use rev_core::logging::{log, LogCategory, LogLevel};

/// Palette slot 0 value marking a pre-flattened true-colour texture
pub const TRUE_COLOUR_MARKER: u32 = 0xDEAD_BEAF;

/// Mip levels a texture can carry, level 0 included
pub const MAX_MIP_LEVELS: usize = 9;

/// Largest paletted texture edge
pub const MAX_TEXTURE_DIMENSION: u32 = 256;

pub const PALETTE_ENTRIES: usize = 256;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TextureError {
    #[error("Texture dimensions {width}x{height} must be powers of two in [1, 256]")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("Mip level 0 is missing")]
    MissingLevel,
    #[error("Mip level {level} has {actual} bytes, expected {expected}")]
    LevelTooSmall {
        level: usize,
        expected: usize,
        actual: usize,
    },
}

/// Caller-side texture description
#[derive(Debug, Clone)]
pub struct TextureDescriptor<'a> {
    /// Packed BGRA entries; slot 0 may hold [`TRUE_COLOUR_MARKER`]
    pub palette: [u32; PALETTE_ENTRIES],
    pub width: u32,
    pub height: u32,
    pub level: [Option<&'a [u8]>; MAX_MIP_LEVELS],
}

impl<'a> TextureDescriptor<'a> {
    /// Paletted texture with only a level-0 index array
    pub fn paletted(palette: [u32; PALETTE_ENTRIES], width: u32, height: u32, indices: &'a [u8]) -> Self {
        let mut level = [None; MAX_MIP_LEVELS];
        level[0] = Some(indices);
        Self {
            palette,
            width,
            height,
            level,
        }
    }

    /// Pre-flattened BGRA texture (4 bytes per texel)
    pub fn true_colour(width: u32, height: u32, texels: &'a [u8]) -> Self {
        let mut palette = [0; PALETTE_ENTRIES];
        palette[0] = TRUE_COLOUR_MARKER;
        let mut level = [None; MAX_MIP_LEVELS];
        level[0] = Some(texels);
        Self {
            palette,
            width,
            height,
            level,
        }
    }

    /// Attach a mip level (ignored past the ninth)
    pub fn with_level(mut self, index: usize, data: &'a [u8]) -> Self {
        if let Some(slot) = self.level.get_mut(index) {
            *slot = Some(data);
        }
        self
    }

    pub fn is_true_colour(&self) -> bool {
        self.palette[0] == TRUE_COLOUR_MARKER
    }
}

/// Power of two in `[1, MAX_TEXTURE_DIMENSION]`, checked by shifting up
fn is_valid_dimension(n: u32) -> bool {
    let mut size = 1;
    while size <= MAX_TEXTURE_DIMENSION {
        if size == n {
            return true;
        }
        size <<= 1;
    }
    false
}

/// A registered texture
///
/// Levels are `Cow`: the true-colour path borrows caller memory for the
/// handle's lifetime, the paletted path owns deep copies. Dropping the
/// handle frees whatever it owns.
#[derive(Debug, Clone)]
pub struct TextureHandle<'a> {
    levels: [Option<Cow<'a, [u8]>>; MAX_MIP_LEVELS],
    palette: Option<Box<[u32; PALETTE_ENTRIES]>>,
    width: u32,
    height: u32,
    bpp: u32,
}

impl<'a> TextureHandle<'a> {
    pub fn register(desc: &TextureDescriptor<'a>) -> Result<Self, TextureError> {
        if desc.is_true_colour() {
            Self::register_true_colour(desc)
        } else {
            Self::register_paletted(desc)
        }
    }

    fn register_true_colour(desc: &TextureDescriptor<'a>) -> Result<Self, TextureError> {
        if desc.width == 0 || desc.height == 0 {
            return Err(TextureError::InvalidDimensions {
                width: desc.width,
                height: desc.height,
            });
        }
        let texels = desc.level[0].ok_or(TextureError::MissingLevel)?;
        let expected = desc.width as usize * desc.height as usize * 4;
        if texels.len() < expected {
            return Err(TextureError::LevelTooSmall {
                level: 0,
                expected,
                actual: texels.len(),
            });
        }

        let mut levels: [Option<Cow<'a, [u8]>>; MAX_MIP_LEVELS] = Default::default();
        levels[0] = Some(Cow::Borrowed(texels));
        Ok(Self {
            levels,
            palette: None,
            width: desc.width,
            height: desc.height,
            bpp: 4,
        })
    }

    fn register_paletted(desc: &TextureDescriptor<'a>) -> Result<Self, TextureError> {
        if !is_valid_dimension(desc.width) || !is_valid_dimension(desc.height) {
            return Err(TextureError::InvalidDimensions {
                width: desc.width,
                height: desc.height,
            });
        }

        let mut levels: [Option<Cow<'a, [u8]>>; MAX_MIP_LEVELS] = Default::default();
        let mut size = desc.width as usize * desc.height as usize;
        for (index, slot) in levels.iter_mut().enumerate() {
            if size == 0 {
                break;
            }
            let Some(src) = desc.level[index] else {
                if index == 0 {
                    return Err(TextureError::MissingLevel);
                }
                break;
            };
            if src.len() < size {
                if index == 0 {
                    return Err(TextureError::LevelTooSmall {
                        level: 0,
                        expected: size,
                        actual: src.len(),
                    });
                }
                log(LogCategory::Texture, LogLevel::Warn, || {
                    format!(
                        "mip level {} has {} bytes, expected {}; dropping it and smaller levels",
                        index,
                        src.len(),
                        size
                    )
                });
                break;
            }
            *slot = Some(Cow::Owned(src[..size].to_vec()));
            size /= 4;
        }

        Ok(Self {
            levels,
            palette: Some(Box::new(desc.palette)),
            width: desc.width,
            height: desc.height,
            bpp: 1,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per texel: 4 for true colour, 1 for paletted
    pub fn bpp(&self) -> u32 {
        self.bpp
    }

    pub fn is_paletted(&self) -> bool {
        self.bpp <= 3
    }

    pub fn palette(&self) -> Option<&[u32; PALETTE_ENTRIES]> {
        self.palette.as_deref()
    }

    pub fn level(&self, index: usize) -> Option<&[u8]> {
        self.levels.get(index)?.as_deref()
    }

    /// Whether level `index` points at caller memory
    pub fn is_borrowed(&self, index: usize) -> bool {
        matches!(self.levels.get(index), Some(Some(Cow::Borrowed(_))))
    }

    /// Number of leading levels present
    pub fn level_count(&self) -> usize {
        self.levels.iter().take_while(|l| l.is_some()).count()
    }

    /// Texel dimensions of mip level `index`
    pub fn level_size(&self, index: usize) -> (u32, u32) {
        let shift = index.min(31) as u32;
        ((self.width >> shift).max(1), (self.height >> shift).max(1))
    }

    /// Sampler for the requested mip level
    ///
    /// Falls back to the finest present level at or below `mip`. `None` when
    /// the handle has no texels at all.
    pub fn sampler(&self, mip: usize) -> Option<Sampler<'_>> {
        let wanted = mip.min(MAX_MIP_LEVELS - 1);
        let index = (0..=wanted).rev().find(|&i| self.levels[i].is_some())?;
        let data = self.levels[index].as_deref()?;
        let (w, h) = self.level_size(index);
        let level = MipLevel {
            data,
            width: w as i32,
            height: h as i32,
            shift: index as u32,
        };
        Some(match self.palette.as_deref() {
            Some(palette) if self.is_paletted() => Sampler::Paletted(PalettedTexels { level, palette }),
            _ => Sampler::TrueColour(TrueColourTexels { level }),
        })
    }
}

/// One mip level's texels and geometry
#[derive(Debug, Clone, Copy)]
pub struct MipLevel<'t> {
    data: &'t [u8],
    width: i32,
    height: i32,
    shift: u32,
}

impl MipLevel<'_> {
    /// Texel index for level-0 integer coordinates, clamped to the level
    #[inline]
    fn index(&self, u: i32, v: i32) -> usize {
        let x = (u >> self.shift).clamp(0, self.width - 1);
        let y = (v >> self.shift).clamp(0, self.height - 1);
        (y * self.width + x) as usize
    }
}

/// Nearest-neighbour texel lookup returning packed BGRA
///
/// `u` and `v` are integer texel coordinates in level-0 space.
pub trait TexelFetch {
    fn fetch(&self, u: i32, v: i32) -> u32;
}

#[derive(Debug, Clone, Copy)]
pub struct PalettedTexels<'t> {
    level: MipLevel<'t>,
    palette: &'t [u32; PALETTE_ENTRIES],
}

impl TexelFetch for PalettedTexels<'_> {
    #[inline]
    fn fetch(&self, u: i32, v: i32) -> u32 {
        let idx = self.level.data.get(self.level.index(u, v)).copied().unwrap_or(0);
        self.palette[idx as usize]
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TrueColourTexels<'t> {
    level: MipLevel<'t>,
}

impl TexelFetch for TrueColourTexels<'_> {
    #[inline]
    fn fetch(&self, u: i32, v: i32) -> u32 {
        let offset = self.level.index(u, v) * 4;
        match self.level.data.get(offset..offset + 4) {
            Some(b) => u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
            None => 0,
        }
    }
}

/// Texel source resolved once per draw call
#[derive(Debug, Clone, Copy)]
pub enum Sampler<'t> {
    Paletted(PalettedTexels<'t>),
    TrueColour(TrueColourTexels<'t>),
}

impl TexelFetch for Sampler<'_> {
    #[inline]
    fn fetch(&self, u: i32, v: i32) -> u32 {
        match self {
            Sampler::Paletted(t) => t.fetch(u, v),
            Sampler::TrueColour(t) => t.fetch(u, v),
        }
    }
}

/// Slot in the render context's texture table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId {
    index: u32,
    generation: u32,
}

impl TextureId {
    pub(crate) fn new(index: usize, generation: u32) -> Self {
        Self {
            index: index as u32,
            generation,
        }
    }

    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grey_palette() -> [u32; PALETTE_ENTRIES] {
        let mut palette = [0u32; PALETTE_ENTRIES];
        for (i, p) in palette.iter_mut().enumerate() {
            let c = i as u32;
            *p = c | (c << 8) | (c << 16) | 0xFF00_0000;
        }
        palette
    }

    #[test]
    fn test_dimension_validation() {
        for n in [1, 2, 4, 8, 16, 32, 64, 128, 256] {
            assert!(is_valid_dimension(n), "{} should be valid", n);
        }
        for n in [0, 3, 100, 255, 512, 1024] {
            assert!(!is_valid_dimension(n), "{} should be invalid", n);
        }
    }

    #[test]
    fn test_paletted_rejects_non_power_of_two() {
        let indices = vec![0u8; 100 * 64];
        let desc = TextureDescriptor::paletted(grey_palette(), 100, 64, &indices);
        assert_eq!(
            TextureHandle::register(&desc).unwrap_err(),
            TextureError::InvalidDimensions {
                width: 100,
                height: 64
            }
        );
    }

    #[test]
    fn test_paletted_rejects_oversized() {
        let indices = vec![0u8; 512 * 4];
        let desc = TextureDescriptor::paletted(grey_palette(), 512, 4, &indices);
        assert!(TextureHandle::register(&desc).is_err());
    }

    #[test]
    fn test_paletted_copies_levels_until_size_reaches_zero() {
        let l0 = vec![1u8; 8 * 8];
        let l1 = vec![2u8; 4 * 4];
        let l2 = vec![3u8; 2 * 2];
        let l3 = vec![4u8; 1];
        let desc = TextureDescriptor::paletted(grey_palette(), 8, 8, &l0)
            .with_level(1, &l1)
            .with_level(2, &l2)
            .with_level(3, &l3)
            .with_level(4, &l3);
        let tex = TextureHandle::register(&desc).unwrap();
        assert_eq!(tex.bpp(), 1);
        assert!(tex.is_paletted());
        // 64, 16, 4, 1, then 0 bytes
        assert_eq!(tex.level_count(), 4);
        assert!(tex.level(4).is_none());
        assert_eq!(tex.level(2), Some(&[3u8; 4][..]));
        assert!(!tex.is_borrowed(0));
        assert_eq!(tex.palette().map(|p| p[7]), Some(0xFF07_0707));
    }

    #[test]
    fn test_paletted_requires_level_zero() {
        let mut desc = TextureDescriptor::paletted(grey_palette(), 4, 4, &[]);
        assert!(matches!(
            TextureHandle::register(&desc),
            Err(TextureError::LevelTooSmall { level: 0, .. })
        ));
        desc.level[0] = None;
        assert_eq!(
            TextureHandle::register(&desc).unwrap_err(),
            TextureError::MissingLevel
        );
    }

    #[test]
    fn test_true_colour_borrows_level_zero() {
        let texels = vec![0xAAu8; 3 * 5 * 4];
        let mip = vec![0u8; 16];
        let desc = TextureDescriptor::true_colour(3, 5, &texels).with_level(1, &mip);
        let tex = TextureHandle::register(&desc).unwrap();
        assert_eq!(tex.bpp(), 4);
        assert!(tex.palette().is_none());
        assert!(tex.is_borrowed(0));
        assert_eq!(tex.level_count(), 1);
        assert_eq!(tex.level(0).map(|l| l.as_ptr()), Some(texels.as_ptr()));
    }

    #[test]
    fn test_paletted_fetch() {
        let indices: Vec<u8> = (0..16).collect();
        let desc = TextureDescriptor::paletted(grey_palette(), 4, 4, &indices);
        let tex = TextureHandle::register(&desc).unwrap();
        let Some(Sampler::Paletted(s)) = tex.sampler(0) else {
            panic!("expected paletted sampler");
        };
        assert_eq!(s.fetch(1, 2), 0xFF09_0909);
        // Clamped to the last row and column
        assert_eq!(s.fetch(40, 40), 0xFF0F_0F0F);
        assert_eq!(s.fetch(-3, 0), 0xFF00_0000);
    }

    #[test]
    fn test_true_colour_fetch() {
        let mut texels = vec![0u8; 2 * 2 * 4];
        texels[4..8].copy_from_slice(&[0x10, 0x20, 0x30, 0x40]);
        let desc = TextureDescriptor::true_colour(2, 2, &texels);
        let tex = TextureHandle::register(&desc).unwrap();
        let Some(Sampler::TrueColour(s)) = tex.sampler(0) else {
            panic!("expected true-colour sampler");
        };
        assert_eq!(s.fetch(1, 0), 0x4030_2010);
    }

    #[test]
    fn test_sampler_selects_mip_level() {
        let l0 = vec![1u8; 4 * 4];
        let l1 = vec![2u8; 2 * 2];
        let desc = TextureDescriptor::paletted(grey_palette(), 4, 4, &l0).with_level(1, &l1);
        let tex = TextureHandle::register(&desc).unwrap();

        let Some(Sampler::Paletted(s)) = tex.sampler(1) else {
            panic!("expected paletted sampler");
        };
        assert_eq!(s.fetch(3, 3), 0xFF02_0202);

        // Level 5 is absent: falls back to level 1
        let Some(Sampler::Paletted(s)) = tex.sampler(5) else {
            panic!("expected paletted sampler");
        };
        assert_eq!(s.fetch(0, 0), 0xFF02_0202);
        assert_eq!(tex.level_size(1), (2, 2));
        assert_eq!(tex.level_size(8), (1, 1));
    }
}
