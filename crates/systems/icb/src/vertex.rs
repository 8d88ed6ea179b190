//! Screen-space vertex format
//!
//! Vertices arrive already projected. Positions and texel coordinates are
//! 16.16 fixed point; `colour` is packed BGRA (see [`rev_core::graphics::color`]).

use rev_core::graphics::{ColorOps, Fixed16};

/// Largest polygon the clipper accepts
pub const MAX_POLY_VERTICES: usize = 8;

/// Largest texel coordinate a 16.16 `u`/`v` can hold
pub const MAX_TEXEL_COORD: u16 = i16::MAX as u16;

/// Largest polygon the clipper can emit: one extra vertex per clip plane
pub const MAX_CLIPPED_VERTICES: usize = MAX_POLY_VERTICES + 4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Vertex2D {
    /// 16.16 screen x
    pub x: i32,
    /// 16.16 screen y
    pub y: i32,
    /// 16.16 texel u (level-0 texel space)
    pub u: i32,
    /// 16.16 texel v (level-0 texel space)
    pub v: i32,
    /// Packed BGRA
    pub colour: u32,
}

impl Vertex2D {
    /// Vertex at integer screen coordinates
    pub fn at(x: i32, y: i32, colour: u32) -> Self {
        Self {
            x: Fixed16::from_int(x),
            y: Fixed16::from_int(y),
            u: 0,
            v: 0,
            colour,
        }
    }

    /// Vertex at integer screen and texel coordinates
    ///
    /// Texel coordinates above [`MAX_TEXEL_COORD`] saturate.
    pub fn textured(x: i32, y: i32, u: u16, v: u16, colour: u32) -> Self {
        Self::at(x, y, colour).with_texel(u, v)
    }

    pub fn with_texel(self, u: u16, v: u16) -> Self {
        Self {
            u: Fixed16::from_int_saturating(u as i32),
            v: Fixed16::from_int_saturating(v as i32),
            ..self
        }
    }

    #[inline]
    pub fn red(&self) -> u8 {
        ColorOps::red(self.colour)
    }

    #[inline]
    pub fn green(&self) -> u8 {
        ColorOps::green(self.colour)
    }

    #[inline]
    pub fn blue(&self) -> u8 {
        ColorOps::blue(self.colour)
    }

    #[inline]
    pub fn alpha(&self) -> u8 {
        ColorOps::alpha(self.colour)
    }
}

/// Twice the signed area of the triangle (a, b, c) in squared 16.16 units
///
/// Positive when the vertices run clockwise on a y-down screen, which is the
/// engine's front-facing order.
#[inline]
pub fn signed_area(a: &Vertex2D, b: &Vertex2D, c: &Vertex2D) -> i128 {
    let abx = (b.x as i128) - (a.x as i128);
    let aby = (b.y as i128) - (a.y as i128);
    let acx = (c.x as i128) - (a.x as i128);
    let acy = (c.y as i128) - (a.y as i128);
    abx * acy - aby * acx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_at_shifts_to_fixed() {
        let v = Vertex2D::at(10, -2, 0xFF0000FF);
        assert_eq!(v.x, 10 << 16);
        assert_eq!(v.y, -2 << 16);
        assert_eq!(v.blue(), 0xFF);
        assert_eq!(v.alpha(), 0xFF);
        assert_eq!(v.red(), 0);
    }

    #[test]
    fn test_textured_vertex() {
        let v = Vertex2D::textured(1, 2, 255, 7, 0);
        assert_eq!(v.u, 255 << 16);
        assert_eq!(v.v, 7 << 16);
    }

    #[test]
    fn test_large_texel_coords_saturate() {
        let v = Vertex2D::textured(0, 0, 40_000, u16::MAX, 0);
        assert_eq!(v.u, (MAX_TEXEL_COORD as i32) << 16);
        assert_eq!(v.v, (MAX_TEXEL_COORD as i32) << 16);
        assert!(v.u > 0 && v.v > 0);
    }

    #[test]
    fn test_signed_area_orientation() {
        let a = Vertex2D::at(10, 10, 0);
        let b = Vertex2D::at(50, 10, 0);
        let c = Vertex2D::at(30, 50, 0);
        assert!(signed_area(&a, &b, &c) > 0);
        assert!(signed_area(&a, &c, &b) < 0);
        assert_eq!(signed_area(&a, &a, &c), 0);
    }
}
