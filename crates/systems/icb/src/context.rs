//! Draw-call front end
//!
//! [`RenderContext`] owns everything a draw call reads besides its arguments:
//! the backend (and through it the bound render device), the texture table,
//! the bound texture and the mip level. Draw calls take integer screen
//! coordinates, shift them to 16.16, reject back-facing input, clip against
//! the device and hand each front-facing fan triangle to the backend.
//!
//! Return conventions:
//! - draw calls return [`DrawStatus`]: `NotPerformed` (0) when the device or a
//!   needed texture is missing, `Handled` (1) otherwise, including when
//!   nothing ends up visible
//! - [`RenderContext::set_render_device`] returns [`DeviceSetupResult`], whose
//!   code is 0 on success

use rev_core::graphics::ColorOps;
use rev_core::logging::{log, LogCategory, LogLevel};

use crate::clip::{clip_polygon, simple_reject, ClipRect, ClippedPolygon};
use crate::config::RenderConfig;
use crate::device::{DeviceSetupResult, RenderDevice, RenderDeviceDesc};
use crate::render_backend::{BoundTexture, DrawStatus, PrimitiveStyle, RenderBackend, Shading};
use crate::render_backend_software::SoftwareBackend;
use crate::texture::{TextureDescriptor, TextureError, TextureHandle, TextureId, MAX_MIP_LEVELS};
use crate::vertex::{Vertex2D, MAX_TEXEL_COORD};

/// Integer screen position
pub type Point = [i32; 2];
/// Red, green, blue; 128 is unity gain for textured draws
pub type Rgb = [u8; 3];
/// Level-0 texel coordinate
pub type TexCoord = [u16; 2];

/// Corner order of quads: top-left, top-right, bottom-left, bottom-right.
/// Walked as a polygon in this order.
const QUAD_ORDER: [usize; 4] = [0, 1, 3, 2];

#[derive(Debug, Default)]
struct TextureSlot<'a> {
    generation: u32,
    handle: Option<TextureHandle<'a>>,
}

fn lookup<'s, 'a>(slots: &'s [TextureSlot<'a>], id: TextureId) -> Option<&'s TextureHandle<'a>> {
    let slot = slots.get(id.index())?;
    if slot.generation != id.generation() {
        return None;
    }
    slot.handle.as_ref()
}

/// Rendering state for one drawing surface
pub struct RenderContext<'a> {
    backend: Box<dyn RenderBackend<'a> + 'a>,
    textures: Vec<TextureSlot<'a>>,
    bound: Option<TextureId>,
    mip_map_level: usize,
    max_device_dimension: u32,
}

impl Default for RenderContext<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> RenderContext<'a> {
    /// Software backend, default configuration
    pub fn new() -> Self {
        Self::with_backend(Box::new(SoftwareBackend::new()), &RenderConfig::default())
    }

    pub fn with_backend(backend: Box<dyn RenderBackend<'a> + 'a>, config: &RenderConfig) -> Self {
        log(LogCategory::Backend, LogLevel::Info, || {
            format!("Render context using {} backend", backend.name())
        });
        let mut ctx = Self {
            backend,
            textures: Vec::new(),
            bound: None,
            mip_map_level: 0,
            max_device_dimension: config.max_device_dimension,
        };
        ctx.set_mip_map_level(config.mip_map_level);
        ctx
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn is_hardware_accelerated(&self) -> bool {
        self.backend.is_hardware_accelerated()
    }

    // ---- Render device ----

    /// Validate and bind a device; on failure the current device stays bound
    pub fn set_render_device(&mut self, desc: RenderDeviceDesc<'a>) -> DeviceSetupResult {
        let (width, height) = (desc.width, desc.height);
        match RenderDevice::from_desc(desc, self.max_device_dimension) {
            Ok(device) => {
                log(LogCategory::Device, LogLevel::Info, || {
                    format!(
                        "Render device {}x{} (pitch {} bytes)",
                        width,
                        height,
                        device.rgb_pitch()
                    )
                });
                self.backend.set_render_device(device);
                DeviceSetupResult::Ok
            }
            Err(result) => {
                log(LogCategory::Device, LogLevel::Warn, || {
                    format!("Rejected render device {}x{}: {:?}", width, height, result)
                });
                result
            }
        }
    }

    pub fn render_device(&self) -> Option<&RenderDevice<'a>> {
        self.backend.render_device()
    }

    /// Unbind the device and hand its buffers back
    pub fn release_device(&mut self) -> Option<RenderDevice<'a>> {
        self.backend.release_device()
    }

    // ---- Textures ----

    pub fn register_texture(&mut self, desc: &TextureDescriptor<'a>) -> Result<TextureId, TextureError> {
        let handle = TextureHandle::register(desc).map_err(|e| {
            log(LogCategory::Texture, LogLevel::Warn, || format!("Texture rejected: {}", e));
            e
        })?;

        let index = match self.textures.iter().position(|s| s.handle.is_none()) {
            Some(i) => i,
            None => {
                self.textures.push(TextureSlot::default());
                self.textures.len() - 1
            }
        };
        let slot = &mut self.textures[index];
        slot.generation = slot.generation.wrapping_add(1);
        let id = TextureId::new(index, slot.generation);

        log(LogCategory::Texture, LogLevel::Debug, || {
            format!(
                "Registered {:?}: {}x{} bpp {} with {} level(s)",
                id,
                handle.width(),
                handle.height(),
                handle.bpp(),
                handle.level_count()
            )
        });
        self.backend.texture_registered(id, &handle);
        slot.handle = Some(handle);
        Ok(id)
    }

    /// Release a texture; always 0
    ///
    /// Unbinds it if bound. Unknown or stale ids are ignored.
    pub fn unregister_texture(&mut self, id: TextureId) -> i32 {
        if let Some(slot) = self.textures.get_mut(id.index()) {
            if slot.generation == id.generation() && slot.handle.take().is_some() {
                self.backend.texture_unregistered(id);
                log(LogCategory::Texture, LogLevel::Debug, || format!("Unregistered {:?}", id));
            }
        }
        if self.bound == Some(id) {
            self.bound = None;
        }
        0
    }

    pub fn texture(&self, id: TextureId) -> Option<&TextureHandle<'a>> {
        lookup(&self.textures, id)
    }

    /// Number of live textures
    pub fn texture_count(&self) -> usize {
        self.textures.iter().filter(|s| s.handle.is_some()).count()
    }

    /// Bind the texture used by textured draws; always 0
    pub fn set_texture_state(&mut self, tex: Option<TextureId>) -> i32 {
        self.bound = tex;
        0
    }

    pub fn bound_texture(&self) -> Option<TextureId> {
        self.bound
    }

    /// Select the mip level textured draws sample, clamped to `0..=8`
    pub fn set_mip_map_level(&mut self, level: usize) {
        self.mip_map_level = level.min(MAX_MIP_LEVELS - 1);
    }

    pub fn mip_map_level(&self) -> usize {
        self.mip_map_level
    }

    // ---- Frame bracket ----

    pub fn start_drawing(&mut self) {
        self.backend.start_drawing();
    }

    pub fn end_drawing(&mut self) {
        self.backend.end_drawing();
    }

    /// End-of-frame hook; nothing to restore on current targets
    pub fn clear_processor_state(&mut self) {
        log(LogCategory::Stubs, LogLevel::Trace, || "clear_processor_state".to_string());
    }

    // ---- Primitives ----

    fn draw_primitive(&mut self, verts: &[Vertex2D], shading: Shading, textured: bool, z: u16) -> DrawStatus {
        let Some(device) = self.backend.render_device() else {
            return DrawStatus::NotPerformed;
        };
        let rect = ClipRect::new(device.width(), device.height());

        let texture = if textured {
            let Some(id) = self.bound else {
                return DrawStatus::NotPerformed;
            };
            let Some(handle) = lookup(&self.textures, id) else {
                log(LogCategory::Texture, LogLevel::Debug, || {
                    format!("Textured draw with stale texture {:?}", id)
                });
                return DrawStatus::NotPerformed;
            };
            Some(BoundTexture {
                id,
                handle,
                mip_level: self.mip_map_level,
            })
        } else {
            None
        };

        if simple_reject(verts) {
            log(LogCategory::Clip, LogLevel::Trace, || "Back-facing polygon rejected".to_string());
            return DrawStatus::Handled;
        }

        let mut clipped = ClippedPolygon::default();
        if clip_polygon(verts, rect, &mut clipped) < 3 {
            return DrawStatus::Handled;
        }

        let style = PrimitiveStyle { shading, texture, z };
        for tri in clipped.fan() {
            if simple_reject(&tri) {
                continue;
            }
            self.backend.draw_triangle(&tri, &style);
        }
        DrawStatus::Handled
    }

    /// Rebind for a textured draw; without a device the binding is untouched
    fn bind_for_draw(&mut self, tex: Option<TextureId>) {
        if tex.is_some() && self.backend.render_device().is_some() {
            self.bound = tex;
        }
    }

    fn flat_vertices<const N: usize>(points: [Point; N], rgb: Rgb, alpha: u8) -> [Vertex2D; N] {
        let colour = ColorOps::pack_bgra(rgb[0], rgb[1], rgb[2], alpha);
        points.map(|p| Vertex2D::at(p[0], p[1], colour))
    }

    fn gouraud_vertices<const N: usize>(points: [Point; N], colours: [Rgb; N], alpha: u8) -> [Vertex2D; N] {
        let mut out = [Vertex2D::default(); N];
        for (i, v) in out.iter_mut().enumerate() {
            let c = colours[i];
            *v = Vertex2D::at(points[i][0], points[i][1], ColorOps::pack_bgra(c[0], c[1], c[2], alpha));
        }
        out
    }

    fn with_uvs<const N: usize>(verts: [Vertex2D; N], uvs: [TexCoord; N]) -> [Vertex2D; N] {
        if uvs.iter().flatten().any(|&t| t > MAX_TEXEL_COORD) {
            log(LogCategory::Texture, LogLevel::Debug, || {
                format!("Texel coordinates {:?} saturated to {}", uvs, MAX_TEXEL_COORD)
            });
        }
        let mut out = verts;
        for (v, uv) in out.iter_mut().zip(uvs) {
            *v = v.with_texel(uv[0], uv[1]);
        }
        out
    }

    fn quad(verts: [Vertex2D; 4]) -> [Vertex2D; 4] {
        QUAD_ORDER.map(|i| verts[i])
    }

    pub fn draw_flat_triangle(&mut self, points: [Point; 3], rgb: Rgb, alpha: u8, z: u16) -> DrawStatus {
        let verts = Self::flat_vertices(points, rgb, alpha);
        self.draw_primitive(&verts, Shading::Flat, false, z)
    }

    /// Corners in strip order: top-left, top-right, bottom-left, bottom-right
    pub fn draw_flat_quad(&mut self, points: [Point; 4], rgb: Rgb, alpha: u8, z: u16) -> DrawStatus {
        let verts = Self::quad(Self::flat_vertices(points, rgb, alpha));
        self.draw_primitive(&verts, Shading::Flat, false, z)
    }

    pub fn draw_gouraud_triangle(&mut self, points: [Point; 3], colours: [Rgb; 3], alpha: u8, z: u16) -> DrawStatus {
        let verts = Self::gouraud_vertices(points, colours, alpha);
        self.draw_primitive(&verts, Shading::Gouraud, false, z)
    }

    pub fn draw_gouraud_quad(&mut self, points: [Point; 4], colours: [Rgb; 4], alpha: u8, z: u16) -> DrawStatus {
        let verts = Self::quad(Self::gouraud_vertices(points, colours, alpha));
        self.draw_primitive(&verts, Shading::Gouraud, false, z)
    }

    /// `tex` rebinds the current texture when given; `None` draws with the
    /// texture already bound
    #[allow(clippy::too_many_arguments)]
    pub fn draw_flat_triangle_textured(
        &mut self,
        points: [Point; 3],
        rgb: Rgb,
        uvs: [TexCoord; 3],
        alpha: u8,
        z: u16,
        tex: Option<TextureId>,
    ) -> DrawStatus {
        self.bind_for_draw(tex);
        let verts = Self::with_uvs(Self::flat_vertices(points, rgb, alpha), uvs);
        self.draw_primitive(&verts, Shading::Flat, true, z)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn draw_flat_quad_textured(
        &mut self,
        points: [Point; 4],
        rgb: Rgb,
        uvs: [TexCoord; 4],
        alpha: u8,
        z: u16,
        tex: Option<TextureId>,
    ) -> DrawStatus {
        self.bind_for_draw(tex);
        let verts = Self::quad(Self::with_uvs(Self::flat_vertices(points, rgb, alpha), uvs));
        self.draw_primitive(&verts, Shading::Flat, true, z)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn draw_gouraud_triangle_textured(
        &mut self,
        points: [Point; 3],
        colours: [Rgb; 3],
        uvs: [TexCoord; 3],
        alpha: u8,
        z: u16,
        tex: Option<TextureId>,
    ) -> DrawStatus {
        self.bind_for_draw(tex);
        let verts = Self::with_uvs(Self::gouraud_vertices(points, colours, alpha), uvs);
        self.draw_primitive(&verts, Shading::Gouraud, true, z)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn draw_gouraud_quad_textured(
        &mut self,
        points: [Point; 4],
        colours: [Rgb; 4],
        uvs: [TexCoord; 4],
        alpha: u8,
        z: u16,
        tex: Option<TextureId>,
    ) -> DrawStatus {
        self.bind_for_draw(tex);
        let verts = Self::quad(Self::with_uvs(Self::gouraud_vertices(points, colours, alpha), uvs));
        self.draw_primitive(&verts, Shading::Gouraud, true, z)
    }

    /// Solid axis-aligned rectangle covering `[x, x + w) × [y, y + h)`
    pub fn draw_tile(&mut self, origin: Point, size: [u32; 2], rgb: Rgb, alpha: u8, z: u16) -> DrawStatus {
        self.draw_flat_quad(Self::rect_corners(origin, size), rgb, alpha, z)
    }

    /// Textured axis-aligned rectangle mapping texels 1:1 from `uv`
    #[allow(clippy::too_many_arguments)]
    pub fn draw_sprite(
        &mut self,
        origin: Point,
        size: [u32; 2],
        uv: TexCoord,
        rgb: Rgb,
        alpha: u8,
        z: u16,
        tex: Option<TextureId>,
    ) -> DrawStatus {
        let u1 = uv[0].saturating_add(size[0].min(u16::MAX as u32) as u16);
        let v1 = uv[1].saturating_add(size[1].min(u16::MAX as u32) as u16);
        let uvs = [[uv[0], uv[1]], [u1, uv[1]], [uv[0], v1], [u1, v1]];
        self.draw_flat_quad_textured(Self::rect_corners(origin, size), rgb, uvs, alpha, z, tex)
    }

    fn rect_corners(origin: Point, size: [u32; 2]) -> [Point; 4] {
        let [x, y] = origin;
        let x1 = x.saturating_add(size[0].min(i32::MAX as u32) as i32);
        let y1 = y.saturating_add(size[1].min(i32::MAX as u32) as i32);
        [[x, y], [x1, y], [x, y1], [x1, y1]]
    }

    pub fn draw_line_f2(&mut self, from: Point, to: Point, rgb: Rgb, alpha: u8, z: u16) -> DrawStatus {
        let [a, b] = Self::flat_vertices([from, to], rgb, alpha);
        self.draw_line(&a, &b, Shading::Flat, z)
    }

    pub fn draw_line_g2(&mut self, from: Point, to: Point, colours: [Rgb; 2], alpha: u8, z: u16) -> DrawStatus {
        let [a, b] = Self::gouraud_vertices([from, to], colours, alpha);
        self.draw_line(&a, &b, Shading::Gouraud, z)
    }

    fn draw_line(&mut self, from: &Vertex2D, to: &Vertex2D, shading: Shading, z: u16) -> DrawStatus {
        if self.backend.render_device().is_none() {
            return DrawStatus::NotPerformed;
        }
        self.backend.draw_line(from, to, shading, z);
        DrawStatus::Handled
    }
}
