//! Per-scanline span accumulator
//!
//! The edge walker records, for every scanline a polygon covers, where the
//! left and right edges cross it and the interpolants at those points. Rows
//! are addressed by absolute screen y; the buffer stores them relative to the
//! polygon's top scanline and is reused across draw calls.

/// Interpolants at one end of a span
///
/// `x` is an integer pixel column; the other fields are 16.16 with the
/// rasterizer's `(1 << 16) - 1` start bias already added.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpanEdge {
    pub x: i32,
    pub a: i32,
    pub r: i32,
    pub g: i32,
    pub b: i32,
    pub u: i32,
    pub v: i32,
}

/// One scanline of a polygon: pixels `[left.x, right.x)` are covered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Span {
    pub left: SpanEdge,
    pub right: SpanEdge,
}

impl Span {
    /// Covered pixel count, zero or negative when the row is empty
    #[inline]
    pub fn count(&self) -> i32 {
        self.right.x - self.left.x
    }
}

/// Which chain of the polygon an edge belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Grow-and-keep scratch storage for one polygon's spans
#[derive(Debug, Default)]
pub struct SpanBuffer {
    top: i32,
    rows: Vec<Span>,
}

impl SpanBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset for a polygon covering scanlines `[top, bottom)`
    ///
    /// Allocation only happens when a polygon is taller than any before it.
    pub fn prepare(&mut self, top: i32, bottom: i32) {
        let height = (bottom - top).max(0) as usize;
        self.top = top;
        self.rows.clear();
        self.rows.resize(height, Span::default());
    }

    /// First covered scanline
    pub fn top(&self) -> i32 {
        self.top
    }

    /// One past the last covered scanline
    pub fn bottom(&self) -> i32 {
        self.top + self.rows.len() as i32
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows currently allocated (kept between polygons)
    pub fn capacity(&self) -> usize {
        self.rows.capacity()
    }

    #[inline]
    fn index(&self, y: i32) -> Option<usize> {
        let idx = y.checked_sub(self.top)?;
        if idx < 0 || idx as usize >= self.rows.len() {
            return None;
        }
        Some(idx as usize)
    }

    pub fn row(&self, y: i32) -> Option<&Span> {
        self.index(y).map(|i| &self.rows[i])
    }

    /// Record one edge crossing for scanline `y`; rows outside the polygon are ignored
    #[inline]
    pub fn set_edge(&mut self, y: i32, side: Side, edge: SpanEdge) {
        if let Some(i) = self.index(y) {
            match side {
                Side::Left => self.rows[i].left = edge,
                Side::Right => self.rows[i].right = edge,
            }
        }
    }

    /// Rows with their absolute scanline
    pub fn iter(&self) -> impl Iterator<Item = (i32, &Span)> {
        let top = self.top;
        self.rows
            .iter()
            .enumerate()
            .map(move |(i, span)| (top + i as i32, span))
    }
}
