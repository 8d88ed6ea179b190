//! Software polygon rasterizer and render-device abstraction.
//!
//! Screen-space polygons go through a fixed pipeline:
//!
//! - **Front end** ([`RenderContext`]): integer draw calls for flat/gouraud,
//!   textured/untextured triangles and quads, tiles, sprites and lines
//! - **Clipper** ([`clip`]): back-face rejection, then Sutherland-Hodgman
//!   against the device rectangle, then a fan of triangles
//! - **Backend** ([`RenderBackend`]): the software span rasterizer
//!   ([`raster`]), or OpenGL with the `opengl` feature
//! - **Device** ([`RenderDevice`]): caller-owned BGRA colour and 16-bit depth
//!   buffers
//!
//! Coordinates inside the pipeline are 16.16 fixed point. Textures are
//! 8-bit paletted (power-of-two, up to 256x256, up to 9 mip levels) or 32-bit
//! true colour borrowed from the caller.
//!
//! ```
//! use rev_icb::{FrameBuffers, RenderContext};
//!
//! let mut buffers = FrameBuffers::new(100, 100);
//! let mut ctx = RenderContext::new();
//! assert!(ctx.set_render_device(buffers.device()).is_ok());
//! let status = ctx.draw_flat_triangle([[10, 10], [50, 10], [30, 50]], [255, 0, 0], 255, 100);
//! assert_eq!(status.code(), 1);
//! ```

pub mod clip;
pub mod config;
pub mod context;
pub mod device;
pub mod raster;
pub mod render_backend;
#[cfg(feature = "opengl")]
pub mod render_backend_opengl;
pub mod render_backend_software;
pub mod span;
pub mod texture;
pub mod texture_cache;
pub mod vertex;

pub use config::RenderConfig;
pub use context::{Point, RenderContext, Rgb, TexCoord};
pub use device::{DeviceSetupResult, FrameBuffers, RenderDevice, RenderDeviceDesc, MAX_DEVICE_DIMENSION};
pub use render_backend::{BackendKind, DrawStatus, RenderBackend, Shading};
#[cfg(feature = "opengl")]
pub use render_backend_opengl::OpenGlBackend;
pub use render_backend_software::SoftwareBackend;
pub use texture::{TextureDescriptor, TextureError, TextureHandle, TextureId, TRUE_COLOUR_MARKER};
pub use texture_cache::{TextureCache, TextureCacheError, TextureRequest, TextureSource};
pub use vertex::Vertex2D;
