//! Screen-rectangle polygon clipping
//!
//! Sutherland–Hodgman against the four sides of `[0, width) × [0, height)`,
//! one half-plane at a time in the order left, right, bottom, top. All
//! arithmetic stays in 16.16; intersections interpolate `x, y, u, v` and take
//! the preceding vertex's colour unchanged.

use rev_core::graphics::Fixed16;
use rev_core::logging::{log, LogCategory, LogLevel};

use crate::vertex::{signed_area, Vertex2D, MAX_CLIPPED_VERTICES, MAX_POLY_VERTICES};

/// Destination rectangle in whole pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipRect {
    pub width: i32,
    pub height: i32,
}

impl ClipRect {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width as i32,
            height: height as i32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Plane {
    Left,
    Right,
    Bottom,
    Top,
}

const PLANES: [Plane; 4] = [Plane::Left, Plane::Right, Plane::Bottom, Plane::Top];

impl Plane {
    #[inline]
    fn coord(self, v: &Vertex2D) -> i32 {
        match self {
            Plane::Left | Plane::Right => v.x,
            Plane::Bottom | Plane::Top => v.y,
        }
    }

    #[inline]
    fn value(self, rect: ClipRect) -> i32 {
        match self {
            Plane::Left | Plane::Top => 0,
            Plane::Right => Fixed16::from_int(rect.width),
            Plane::Bottom => Fixed16::from_int(rect.height),
        }
    }

    #[inline]
    fn inside(self, v: &Vertex2D, rect: ClipRect) -> bool {
        let c = self.coord(v);
        match self {
            Plane::Left | Plane::Top => c >= self.value(rect),
            Plane::Right | Plane::Bottom => c < self.value(rect),
        }
    }

    /// Point where edge `s -> e` meets the plane
    fn intersect(self, s: &Vertex2D, e: &Vertex2D, rect: ClipRect) -> Vertex2D {
        let plane = self.value(rect);
        let cs = self.coord(s) as i64;
        let ce = self.coord(e) as i64;
        // An edge that never moves along this axis contributes its far end
        let t = Fixed16::ratio(plane as i64 - cs, ce - cs);

        let mut out = Vertex2D {
            x: Fixed16::lerp(s.x, e.x, t),
            y: Fixed16::lerp(s.y, e.y, t),
            u: Fixed16::lerp(s.u, e.u, t),
            v: Fixed16::lerp(s.v, e.v, t),
            colour: s.colour,
        };
        if ce != cs {
            match self {
                Plane::Left | Plane::Right => out.x = plane,
                Plane::Bottom | Plane::Top => out.y = plane,
            }
        }
        out
    }
}

/// Output of [`clip_polygon`], sized for the worst-case inflation
#[derive(Debug, Clone, Copy)]
pub struct ClippedPolygon {
    verts: [Vertex2D; MAX_CLIPPED_VERTICES],
    len: usize,
}

impl Default for ClippedPolygon {
    fn default() -> Self {
        Self {
            verts: [Vertex2D::default(); MAX_CLIPPED_VERTICES],
            len: 0,
        }
    }
}

impl ClippedPolygon {
    pub fn as_slice(&self) -> &[Vertex2D] {
        &self.verts[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn push(&mut self, v: Vertex2D) {
        if self.len < MAX_CLIPPED_VERTICES {
            self.verts[self.len] = v;
            self.len += 1;
        }
    }

    fn clear(&mut self) {
        self.len = 0;
    }

    /// Fan triangulation `(0, i, i + 1)`; nothing for fewer than 3 vertices
    pub fn fan(&self) -> impl Iterator<Item = [Vertex2D; 3]> + '_ {
        let verts = self.as_slice();
        (1..verts.len().saturating_sub(1)).map(move |i| [verts[0], verts[i], verts[i + 1]])
    }
}

/// Cheap back-face test on the first three vertices
///
/// Returns `true` (reject) for anticlockwise or zero-area winding on the
/// y-down screen, and for anything with fewer than three vertices.
pub fn simple_reject(verts: &[Vertex2D]) -> bool {
    if verts.len() < 3 {
        return true;
    }
    signed_area(&verts[0], &verts[1], &verts[2]) <= 0
}

fn clip_against(plane: Plane, rect: ClipRect, src: &[Vertex2D], dst: &mut ClippedPolygon) {
    dst.clear();
    let Some(&last) = src.last() else {
        return;
    };

    let mut prev = last;
    let mut prev_in = plane.inside(&prev, rect);
    for &cur in src {
        let cur_in = plane.inside(&cur, rect);
        if cur_in != prev_in {
            dst.push(plane.intersect(&prev, &cur, rect));
        }
        if cur_in {
            dst.push(cur);
        }
        prev = cur;
        prev_in = cur_in;
    }
}

/// Clip a convex polygon to the screen rectangle
///
/// Writes the result into `out` and returns its vertex count; 0 means the
/// polygon is entirely outside. Results with fewer than 3 vertices draw
/// nothing.
pub fn clip_polygon(input: &[Vertex2D], rect: ClipRect, out: &mut ClippedPolygon) -> usize {
    out.clear();
    if input.len() < 3 {
        return 0;
    }
    if input.len() > MAX_POLY_VERTICES {
        log(LogCategory::Clip, LogLevel::Warn, || {
            format!(
                "polygon with {} vertices exceeds the {} vertex limit, skipped",
                input.len(),
                MAX_POLY_VERTICES
            )
        });
        return 0;
    }

    if trivially_outside(input, rect) {
        return 0;
    }

    // Common case: nothing to clip
    if input.iter().all(|v| PLANES.iter().all(|p| p.inside(v, rect))) {
        for &v in input {
            out.push(v);
        }
        return out.len();
    }

    let mut scratch = ClippedPolygon::default();
    for &v in input {
        scratch.push(v);
    }
    for plane in PLANES {
        clip_against(plane, rect, scratch.as_slice(), out);
        if out.is_empty() {
            log(LogCategory::Clip, LogLevel::Trace, || {
                format!("polygon fully outside {:?} plane", plane)
            });
            return 0;
        }
        scratch = *out;
    }
    out.len()
}

/// Whether every vertex lies on the outside of one shared plane
pub fn trivially_outside(verts: &[Vertex2D], rect: ClipRect) -> bool {
    PLANES
        .iter()
        .any(|p| verts.iter().all(|v| !p.inside(v, rect)))
}
