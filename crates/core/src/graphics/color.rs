//! Colour utilities for the rasterizer
//!
//! Vertex colours, palette entries and framebuffer pixels are packed BGRA:
//! blue in the lowest byte, then green, red and alpha, so that a little-endian
//! store of the `u32` lays the bytes out as B, G, R, A in memory.
//!
//! Modulation follows the engine convention that a channel value of 128 is a
//! gain of 1.0.

/// Channel value that leaves a texel unchanged under [`ColorOps::modulate`]
pub const UNITY_GAIN: u8 = 128;

/// Colour operation utilities
pub struct ColorOps;

impl ColorOps {
    /// Pack channels into BGRA order
    ///
    /// ```
    /// use rev_core::graphics::ColorOps;
    ///
    /// let c = ColorOps::pack_bgra(0x11, 0x22, 0x33, 0x44);
    /// assert_eq!(c.to_le_bytes(), [0x33, 0x22, 0x11, 0x44]);
    /// ```
    #[inline]
    pub fn pack_bgra(r: u8, g: u8, b: u8, a: u8) -> u32 {
        (b as u32) | ((g as u32) << 8) | ((r as u32) << 16) | ((a as u32) << 24)
    }

    #[inline]
    pub fn blue(color: u32) -> u8 {
        color as u8
    }

    #[inline]
    pub fn green(color: u32) -> u8 {
        (color >> 8) as u8
    }

    #[inline]
    pub fn red(color: u32) -> u8 {
        (color >> 16) as u8
    }

    #[inline]
    pub fn alpha(color: u32) -> u8 {
        (color >> 24) as u8
    }

    /// Scale a texel channel by a vertex channel, 128 = unchanged
    ///
    /// The result is `(vertex * texel) >> 7` clamped to `[0, 255]`.
    #[inline]
    pub fn modulate(vertex: i32, texel: u8) -> u8 {
        ((vertex * texel as i32) >> 7).clamp(0, 255) as u8
    }

    /// Clamp an interpolated channel to a byte
    #[inline]
    pub fn clamp_channel(v: i32) -> u8 {
        v.clamp(0, 255) as u8
    }

    /// BGRA to ARGB8888 (0xAARRGGBB) for presentation
    #[inline]
    pub fn bgra_to_argb(bytes: [u8; 4]) -> u32 {
        ((bytes[3] as u32) << 24)
            | ((bytes[2] as u32) << 16)
            | ((bytes[1] as u32) << 8)
            | (bytes[0] as u32)
    }

    /// Channels as normalized floats in RGBA order (for GPU upload)
    #[inline]
    pub fn to_rgba_f32(color: u32) -> [f32; 4] {
        [
            Self::red(color) as f32 / 255.0,
            Self::green(color) as f32 / 255.0,
            Self::blue(color) as f32 / 255.0,
            Self::alpha(color) as f32 / 255.0,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_and_extract() {
        let c = ColorOps::pack_bgra(0xBB, 0xCC, 0xDD, 0xAA);
        assert_eq!(c, 0xAABBCCDD);
        assert_eq!(ColorOps::red(c), 0xBB);
        assert_eq!(ColorOps::green(c), 0xCC);
        assert_eq!(ColorOps::blue(c), 0xDD);
        assert_eq!(ColorOps::alpha(c), 0xAA);
    }

    #[test]
    fn test_modulate_unity_gain() {
        for texel in 0..=255u8 {
            assert_eq!(ColorOps::modulate(UNITY_GAIN as i32, texel), texel);
        }
    }

    #[test]
    fn test_modulate_clamps() {
        assert_eq!(ColorOps::modulate(255, 255), 255);
        assert_eq!(ColorOps::modulate(64, 200), 100);
        assert_eq!(ColorOps::modulate(0, 200), 0);
        assert_eq!(ColorOps::modulate(-5, 200), 0);
    }

    #[test]
    fn test_bgra_to_argb() {
        assert_eq!(ColorOps::bgra_to_argb([0x33, 0x22, 0x11, 0xFF]), 0xFF112233);
    }

    #[test]
    fn test_to_rgba_f32() {
        let rgba = ColorOps::to_rgba_f32(ColorOps::pack_bgra(255, 0, 0, 255));
        assert_eq!(rgba, [1.0, 0.0, 0.0, 1.0]);
    }
}
