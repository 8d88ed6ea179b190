//! Scanline polygon rasterizer
//!
//! Two passes per polygon:
//!
//! 1. [`build_spans`] walks the left chain (decreasing vertex index) and the
//!    right chain (increasing index) from the top vertex to the bottom one,
//!    recording edge x and interpolants for every covered scanline. Each
//!    edge's per-scanline increments are set up once in `f64`; everything
//!    after that is integer.
//!    Every recorded start value carries a `(1 << 16) - 1` bias, so x becomes
//!    the covering pixel and colour/texel values round up at the span ends.
//! 2. [`fill_spans`] walks each row left to right with 8.8 accumulators and
//!    asks a [`PixelShader`] for the BGRA value of every pixel. The z tag is
//!    written unconditionally, there is no depth test.
//!
//! The four shading variants are separate `PixelShader` types so the texel
//! format and shading mode are resolved once per draw call.

use rev_core::graphics::{ColorOps, Fixed16, FIXED_ONE, FIXED_ROUND_BIAS, FIXED_SHIFT};

use crate::device::RenderDevice;
use crate::span::{Side, SpanBuffer, SpanEdge};
use crate::texture::TexelFetch;
use crate::vertex::Vertex2D;

/// Per-pixel interpolants in 8.8
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Interp {
    pub a: i32,
    pub r: i32,
    pub g: i32,
    pub b: i32,
    pub u: i32,
    pub v: i32,
}

impl Interp {
    /// Integer channel value for an 8.8 accumulator
    #[inline]
    fn int(v: i32) -> i32 {
        v >> 8
    }

    #[inline]
    fn add(&mut self, d: &Interp) {
        self.a += d.a;
        self.r += d.r;
        self.g += d.g;
        self.b += d.b;
        self.u += d.u;
        self.v += d.v;
    }
}

/// Produces the colour for one pixel of a span
pub trait PixelShader {
    /// Whether colour channels vary across the polygon
    const GOURAUD: bool;
    /// Whether texel coordinates are walked
    const TEXTURED: bool;

    fn shade(&self, at: &Interp) -> u32;
}

/// Solid colour, vertex alpha
#[derive(Debug, Clone, Copy)]
pub struct FlatFill {
    pub colour: u32,
}

impl PixelShader for FlatFill {
    const GOURAUD: bool = false;
    const TEXTURED: bool = false;

    #[inline]
    fn shade(&self, _at: &Interp) -> u32 {
        self.colour
    }
}

/// Interpolated vertex colours
#[derive(Debug, Clone, Copy)]
pub struct GouraudFill;

impl PixelShader for GouraudFill {
    const GOURAUD: bool = true;
    const TEXTURED: bool = false;

    #[inline]
    fn shade(&self, at: &Interp) -> u32 {
        ColorOps::pack_bgra(
            ColorOps::clamp_channel(Interp::int(at.r)),
            ColorOps::clamp_channel(Interp::int(at.g)),
            ColorOps::clamp_channel(Interp::int(at.b)),
            ColorOps::clamp_channel(Interp::int(at.a)),
        )
    }
}

/// Texels scaled by one colour
#[derive(Debug, Clone, Copy)]
pub struct FlatTextured<T> {
    pub texels: T,
    pub colour: u32,
}

impl<T: TexelFetch> PixelShader for FlatTextured<T> {
    const GOURAUD: bool = false;
    const TEXTURED: bool = true;

    #[inline]
    fn shade(&self, at: &Interp) -> u32 {
        let t = self.texels.fetch(Interp::int(at.u), Interp::int(at.v));
        let c = self.colour;
        ColorOps::pack_bgra(
            ColorOps::modulate(ColorOps::red(c) as i32, ColorOps::red(t)),
            ColorOps::modulate(ColorOps::green(c) as i32, ColorOps::green(t)),
            ColorOps::modulate(ColorOps::blue(c) as i32, ColorOps::blue(t)),
            ColorOps::alpha(c),
        )
    }
}

/// Texels scaled by interpolated vertex colours
#[derive(Debug, Clone, Copy)]
pub struct GouraudTextured<T> {
    pub texels: T,
}

impl<T: TexelFetch> PixelShader for GouraudTextured<T> {
    const GOURAUD: bool = true;
    const TEXTURED: bool = true;

    #[inline]
    fn shade(&self, at: &Interp) -> u32 {
        let t = self.texels.fetch(Interp::int(at.u), Interp::int(at.v));
        ColorOps::pack_bgra(
            ColorOps::modulate(Interp::int(at.r), ColorOps::red(t)),
            ColorOps::modulate(Interp::int(at.g), ColorOps::green(t)),
            ColorOps::modulate(Interp::int(at.b), ColorOps::blue(t)),
            ColorOps::clamp_channel(Interp::int(at.a)),
        )
    }
}

/// One interpolated quantity along an edge, 16.16 in an `i64`
#[derive(Debug, Clone, Copy)]
struct EdgeStep {
    value: i64,
    step: i64,
}

impl EdgeStep {
    /// `start` and `end` are 16.16; `prestep` is the 16.16 distance from the
    /// start vertex down to the first covered scanline
    fn new(start: i32, end: i32, inv_height: f64, prestep: i64) -> Self {
        let slope = (end as f64 - start as f64) * inv_height;
        Self {
            value: start as i64 + (slope * prestep as f64) as i64,
            step: (slope * FIXED_ONE as f64) as i64,
        }
    }

    /// Current value plus the start bias, saturated to `i32`
    #[inline]
    fn biased(&self) -> i32 {
        (self.value + FIXED_ROUND_BIAS as i64).clamp(i32::MIN as i64, i32::MAX as i64) as i32
    }

    #[inline]
    fn advance(&mut self) {
        self.value += self.step;
    }
}

#[inline]
fn channel(c: u8) -> i32 {
    Fixed16::from_int(c as i32)
}

fn walk_edge(from: &Vertex2D, to: &Vertex2D, side: Side, spans: &mut SpanBuffer, gouraud: bool, textured: bool) {
    let y_start = Fixed16::ceil(from.y);
    let y_end = Fixed16::ceil(to.y);
    if y_end <= y_start {
        return;
    }

    let inv_height = 1.0 / (to.y as f64 - from.y as f64);
    let prestep = ((y_start as i64) << FIXED_SHIFT) - from.y as i64;
    let mut x = EdgeStep::new(from.x, to.x, inv_height, prestep);

    let mut extra: [Option<EdgeStep>; 6] = [None; 6];
    if gouraud {
        extra[0] = Some(EdgeStep::new(channel(from.alpha()), channel(to.alpha()), inv_height, prestep));
        extra[1] = Some(EdgeStep::new(channel(from.red()), channel(to.red()), inv_height, prestep));
        extra[2] = Some(EdgeStep::new(channel(from.green()), channel(to.green()), inv_height, prestep));
        extra[3] = Some(EdgeStep::new(channel(from.blue()), channel(to.blue()), inv_height, prestep));
    }
    if textured {
        extra[4] = Some(EdgeStep::new(from.u, to.u, inv_height, prestep));
        extra[5] = Some(EdgeStep::new(from.v, to.v, inv_height, prestep));
    }

    for y in y_start..y_end {
        let value = |i: usize| extra[i].map_or(0, |s| s.biased());
        let edge = SpanEdge {
            x: x.biased() >> FIXED_SHIFT,
            a: value(0),
            r: value(1),
            g: value(2),
            b: value(3),
            u: value(4),
            v: value(5),
        };
        spans.set_edge(y, side, edge);

        x.advance();
        for s in extra.iter_mut().flatten() {
            s.advance();
        }
    }
}

/// Fill `spans` for a convex polygon
///
/// Returns `false` when the polygon does not cross a single scanline centre;
/// that is "nothing to draw", not an error.
pub fn build_spans(verts: &[Vertex2D], spans: &mut SpanBuffer, gouraud: bool, textured: bool) -> bool {
    let n = verts.len();
    if n < 3 {
        return false;
    }

    let mut top = 0;
    let mut bottom = 0;
    for (i, v) in verts.iter().enumerate().skip(1) {
        if v.y < verts[top].y {
            top = i;
        }
        if v.y > verts[bottom].y {
            bottom = i;
        }
    }

    let y_top = Fixed16::ceil(verts[top].y);
    let y_bottom = Fixed16::ceil(verts[bottom].y);
    if y_top == y_bottom {
        return false;
    }
    spans.prepare(y_top, y_bottom);

    let mut i = top;
    while i != bottom {
        let next = (i + n - 1) % n;
        walk_edge(&verts[i], &verts[next], Side::Left, spans, gouraud, textured);
        i = next;
    }

    let mut i = top;
    while i != bottom {
        let next = (i + 1) % n;
        walk_edge(&verts[i], &verts[next], Side::Right, spans, gouraud, textured);
        i = next;
    }

    true
}

/// Write every span into the device
///
/// Rows and columns outside the device are skipped, so unclipped input
/// cannot write out of bounds.
pub fn fill_spans<P: PixelShader>(spans: &SpanBuffer, device: &mut RenderDevice<'_>, depth: u16, shader: &P) {
    for (y, span) in spans.iter() {
        let count = span.count();
        if count <= 0 {
            continue;
        }
        let Some((rgb, z)) = device.row_mut(y) else {
            continue;
        };
        let x_start = span.left.x.max(0);
        let x_end = span.right.x.min(z.len() as i32);
        if x_start >= x_end {
            continue;
        }

        let mut at = Interp::default();
        let mut step = Interp::default();
        let skip = x_start - span.left.x;
        let setup = |l: i32, r: i32| {
            let l = l >> 8;
            let d = ((r >> 8) - l) / count;
            (l + d * skip, d)
        };
        if P::GOURAUD {
            (at.a, step.a) = setup(span.left.a, span.right.a);
            (at.r, step.r) = setup(span.left.r, span.right.r);
            (at.g, step.g) = setup(span.left.g, span.right.g);
            (at.b, step.b) = setup(span.left.b, span.right.b);
        }
        if P::TEXTURED {
            (at.u, step.u) = setup(span.left.u, span.right.u);
            (at.v, step.v) = setup(span.left.v, span.right.v);
        }

        let bytes = &mut rgb[x_start as usize * 4..x_end as usize * 4];
        let tags = &mut z[x_start as usize..x_end as usize];
        for (px, tag) in bytes.chunks_exact_mut(4).zip(tags.iter_mut()) {
            px.copy_from_slice(&shader.shade(&at).to_le_bytes());
            *tag = depth;
            at.add(&step);
        }
    }
}

/// Rasterize one convex polygon; returns whether any span was produced
pub fn draw_polygon<P: PixelShader>(
    verts: &[Vertex2D],
    spans: &mut SpanBuffer,
    device: &mut RenderDevice<'_>,
    depth: u16,
    shader: &P,
) -> bool {
    if !build_spans(verts, spans, P::GOURAUD, P::TEXTURED) {
        return false;
    }
    fill_spans(spans, device, depth, shader);
    true
}

/// Two-point line, stepping one pixel along the major axis
///
/// `gouraud` interpolates from `from.colour` to `to.colour`, otherwise the
/// whole line takes `from.colour`. Pixels off the device are skipped.
pub fn draw_line(device: &mut RenderDevice<'_>, from: &Vertex2D, to: &Vertex2D, gouraud: bool, depth: u16) {
    let round = |v: i32| ((v as i64 + (FIXED_ONE as i64 >> 1)) >> FIXED_SHIFT) as i32;
    let (x0, y0) = (round(from.x), round(from.y));
    let (x1, y1) = (round(to.x), round(to.y));
    let steps = (x1 - x0).abs().max((y1 - y0).abs());
    if steps == 0 {
        device.put_pixel(x0, y0, from.colour, depth);
        return;
    }

    let per_step = |a: i32, b: i32| ((b as i64 - a as i64) << FIXED_SHIFT) / steps as i64;
    let (dx, dy) = (per_step(x0, x1), per_step(y0, y1));
    let mut x = (x0 as i64) << FIXED_SHIFT;
    let mut y = (y0 as i64) << FIXED_SHIFT;

    let start = [from.red(), from.green(), from.blue(), from.alpha()];
    let end = [to.red(), to.green(), to.blue(), to.alpha()];
    let mut c = [0i64; 4];
    let mut dc = [0i64; 4];
    for i in 0..4 {
        c[i] = (start[i] as i64) << FIXED_SHIFT;
        if gouraud {
            dc[i] = per_step(start[i] as i32, end[i] as i32);
        }
    }

    for _ in 0..=steps {
        let colour = if gouraud {
            let ch = |i: usize| ColorOps::clamp_channel((c[i] >> FIXED_SHIFT) as i32);
            ColorOps::pack_bgra(ch(0), ch(1), ch(2), ch(3))
        } else {
            from.colour
        };
        device.put_pixel(
            ((x + (FIXED_ONE as i64 >> 1)) >> FIXED_SHIFT) as i32,
            ((y + (FIXED_ONE as i64 >> 1)) >> FIXED_SHIFT) as i32,
            colour,
            depth,
        );
        x += dx;
        y += dy;
        for i in 0..4 {
            c[i] += dc[i];
        }
    }
}
