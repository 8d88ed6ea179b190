//! Render backend trait - where clipped triangles end up
//!
//! The draw-call front end ([`crate::RenderContext`]) assembles vertices,
//! clips against the device and splits the result into a fan of front-facing
//! triangles. A backend turns each triangle into pixels in the bound device:
//!
//! ```text
//! RenderContext -> clip -> fan -> RenderBackend -> {Software, OpenGL}
//! ```
//!
//! The backend is picked when the context is built; both implement the same
//! contract so a context never needs to know which one it drives.

use serde::{Deserialize, Serialize};

use crate::device::RenderDevice;
use crate::texture::{TextureHandle, TextureId};
use crate::vertex::Vertex2D;

/// Result of a draw call
///
/// `Handled` covers both "pixels written" and "nothing visible"
/// (back-facing, degenerate or clipped away). `NotPerformed` means a required
/// resource (device or texture) was missing and no buffer was touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum DrawStatus {
    NotPerformed = 0,
    Handled = 1,
}

impl DrawStatus {
    pub fn code(self) -> i32 {
        self as i32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shading {
    /// Whole polygon takes the first vertex's colour
    Flat,
    /// Vertex colours interpolated per pixel
    Gouraud,
}

/// Backend selection, stored in [`crate::RenderConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Software,
    OpenGl,
}

/// Texture bound to a primitive with the mip level to sample
#[derive(Debug, Clone, Copy)]
pub struct BoundTexture<'t> {
    pub id: TextureId,
    pub handle: &'t TextureHandle<'t>,
    pub mip_level: usize,
}

/// Per-primitive state shared by every triangle of a draw call
#[derive(Debug, Clone, Copy)]
pub struct PrimitiveStyle<'t> {
    pub shading: Shading,
    pub texture: Option<BoundTexture<'t>>,
    /// Raw depth tag, smaller is nearer
    pub z: u16,
}

/// Trait for render backends
pub trait RenderBackend<'a> {
    /// Bind a validated device, replacing any previous one
    fn set_render_device(&mut self, device: RenderDevice<'a>);

    fn render_device(&self) -> Option<&RenderDevice<'a>>;

    /// Unbind the device, handing the buffers back
    fn release_device(&mut self) -> Option<RenderDevice<'a>>;

    /// A texture was added to the context's table
    fn texture_registered(&mut self, _id: TextureId, _texture: &TextureHandle<'a>) {}

    /// A texture was removed from the context's table
    fn texture_unregistered(&mut self, _id: TextureId) {}

    /// Start of a frame: save whatever state the backend changes
    fn start_drawing(&mut self) {}

    /// End of a frame: restore state and make the frame visible in the device
    fn end_drawing(&mut self) {}

    /// Fill one clipped, front-facing triangle
    ///
    /// Called only when a device is bound.
    fn draw_triangle(&mut self, tri: &[Vertex2D; 3], style: &PrimitiveStyle<'_>);

    /// Two-point line; endpoints may lie off the device
    fn draw_line(&mut self, from: &Vertex2D, to: &Vertex2D, shading: Shading, z: u16);

    /// Get the name of this backend (for logs)
    fn name(&self) -> &str;

    fn is_hardware_accelerated(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_status_codes() {
        assert_eq!(DrawStatus::NotPerformed.code(), 0);
        assert_eq!(DrawStatus::Handled.code(), 1);
    }

    #[test]
    fn test_backend_kind_names() {
        assert_eq!(serde_json::to_string(&BackendKind::Software).unwrap(), "\"software\"");
        assert_eq!(
            serde_json::from_str::<BackendKind>("\"opengl\"").unwrap(),
            BackendKind::OpenGl
        );
        assert_eq!(BackendKind::default(), BackendKind::Software);
    }
}
