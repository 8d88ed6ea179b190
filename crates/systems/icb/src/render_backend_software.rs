//! Software render backend - CPU rasterization into the caller's buffers
//!
//! Every triangle goes through the span rasterizer in [`crate::raster`]; the
//! texel format is resolved once per triangle and the matching monomorphized
//! shader fills the spans.

use rev_core::logging::{log, LogCategory, LogLevel};

use crate::device::RenderDevice;
use crate::raster::{self, FlatFill, FlatTextured, GouraudFill, GouraudTextured};
use crate::render_backend::{PrimitiveStyle, RenderBackend, Shading};
use crate::span::SpanBuffer;
use crate::texture::Sampler;
use crate::vertex::Vertex2D;

/// Software render backend
#[derive(Debug, Default)]
pub struct SoftwareBackend<'a> {
    device: Option<RenderDevice<'a>>,
    spans: SpanBuffer,
}

impl<'a> SoftwareBackend<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scanlines the span scratch buffer can hold without reallocating
    pub fn span_capacity(&self) -> usize {
        self.spans.capacity()
    }
}

impl<'a> RenderBackend<'a> for SoftwareBackend<'a> {
    fn set_render_device(&mut self, device: RenderDevice<'a>) {
        self.device = Some(device);
    }

    fn render_device(&self) -> Option<&RenderDevice<'a>> {
        self.device.as_ref()
    }

    fn release_device(&mut self) -> Option<RenderDevice<'a>> {
        self.device.take()
    }

    fn draw_triangle(&mut self, tri: &[Vertex2D; 3], style: &PrimitiveStyle<'_>) {
        let Some(device) = self.device.as_mut() else {
            return;
        };
        let spans = &mut self.spans;
        let z = style.z;

        let Some(bound) = style.texture else {
            match style.shading {
                Shading::Flat => {
                    let colour = tri[0].colour;
                    raster::draw_polygon(tri, spans, device, z, &FlatFill { colour });
                }
                Shading::Gouraud => {
                    raster::draw_polygon(tri, spans, device, z, &GouraudFill);
                }
            }
            return;
        };

        let Some(sampler) = bound.handle.sampler(bound.mip_level) else {
            log(LogCategory::Raster, LogLevel::Debug, || {
                format!("texture {:?} has no texels, triangle skipped", bound.id)
            });
            return;
        };
        let colour = tri[0].colour;
        match (style.shading, sampler) {
            (Shading::Flat, Sampler::Paletted(texels)) => {
                raster::draw_polygon(tri, spans, device, z, &FlatTextured { texels, colour });
            }
            (Shading::Flat, Sampler::TrueColour(texels)) => {
                raster::draw_polygon(tri, spans, device, z, &FlatTextured { texels, colour });
            }
            (Shading::Gouraud, Sampler::Paletted(texels)) => {
                raster::draw_polygon(tri, spans, device, z, &GouraudTextured { texels });
            }
            (Shading::Gouraud, Sampler::TrueColour(texels)) => {
                raster::draw_polygon(tri, spans, device, z, &GouraudTextured { texels });
            }
        }
    }

    fn draw_line(&mut self, from: &Vertex2D, to: &Vertex2D, shading: Shading, z: u16) {
        if let Some(device) = self.device.as_mut() {
            raster::draw_line(device, from, to, shading == Shading::Gouraud, z);
        }
    }

    fn name(&self) -> &str {
        "Software"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{RenderDeviceDesc, MAX_DEVICE_DIMENSION};
    use crate::texture::{TextureDescriptor, TextureHandle, TextureId};
    use crate::render_backend::BoundTexture;
    use rev_core::graphics::ColorOps;

    fn device<'a>(rgb: &'a mut [u8], z: &'a mut [u16]) -> RenderDevice<'a> {
        RenderDevice::from_desc(
            RenderDeviceDesc {
                width: 32,
                height: 32,
                stride: 128,
                rgb,
                z,
            },
            MAX_DEVICE_DIMENSION,
        )
        .unwrap()
    }

    fn tri(colour: u32) -> [Vertex2D; 3] {
        [
            Vertex2D::textured(0, 0, 0, 0, colour),
            Vertex2D::textured(32, 0, 4, 0, colour),
            Vertex2D::textured(0, 32, 0, 4, colour),
        ]
    }

    #[test]
    fn test_draw_without_device_is_noop() {
        let mut backend = SoftwareBackend::new();
        backend.draw_triangle(
            &tri(0xFFFF_FFFF),
            &PrimitiveStyle {
                shading: Shading::Flat,
                texture: None,
                z: 1,
            },
        );
        assert!(backend.render_device().is_none());
        assert_eq!(backend.name(), "Software");
        assert!(!backend.is_hardware_accelerated());
    }

    #[test]
    fn test_flat_triangle_uses_first_vertex_colour() {
        let mut rgb = vec![0u8; 32 * 32 * 4];
        let mut z = vec![0u16; 32 * 32];
        let mut backend = SoftwareBackend::new();
        backend.set_render_device(device(&mut rgb, &mut z));

        let mut verts = tri(0xFF00_FF00);
        verts[1].colour = 0xFFFF_0000;
        backend.draw_triangle(
            &verts,
            &PrimitiveStyle {
                shading: Shading::Flat,
                texture: None,
                z: 9,
            },
        );
        let dev = backend.release_device().unwrap();
        assert_eq!(dev.pixel(2, 2), Some(0xFF00_FF00));
        assert_eq!(dev.depth(2, 2), Some(9));
        assert_eq!(dev.depth(31, 31), Some(0));
        assert!(backend.span_capacity() >= 32);
    }

    #[test]
    fn test_textured_triangle_samples_texture() {
        let palette = {
            let mut p = [0u32; 256];
            p[3] = ColorOps::pack_bgra(10, 20, 30, 255);
            p
        };
        let indices = [3u8; 16];
        let tex = TextureHandle::register(&TextureDescriptor::paletted(palette, 4, 4, &indices)).unwrap();

        let mut rgb = vec![0u8; 32 * 32 * 4];
        let mut z = vec![0u16; 32 * 32];
        let mut backend = SoftwareBackend::new();
        backend.set_render_device(device(&mut rgb, &mut z));
        let unity = ColorOps::pack_bgra(128, 128, 128, 200);
        backend.draw_triangle(
            &tri(unity),
            &PrimitiveStyle {
                shading: Shading::Gouraud,
                texture: Some(BoundTexture {
                    id: TextureId::new(0, 0),
                    handle: &tex,
                    mip_level: 0,
                }),
                z: 2,
            },
        );
        let dev = backend.release_device().unwrap();
        assert_eq!(dev.pixel(4, 4), Some(ColorOps::pack_bgra(10, 20, 30, 200)));
    }

    #[test]
    fn test_line_through_backend() {
        let mut rgb = vec![0u8; 32 * 32 * 4];
        let mut z = vec![0u16; 32 * 32];
        let mut backend = SoftwareBackend::new();
        backend.set_render_device(device(&mut rgb, &mut z));
        backend.draw_line(
            &Vertex2D::at(0, 5, 0xFFFF_FFFF),
            &Vertex2D::at(40, 5, 0xFFFF_FFFF),
            Shading::Flat,
            3,
        );
        drop(backend);
        assert_eq!(z[5 * 32], 3);
        assert_eq!(z[5 * 32 + 31], 3);
        assert_eq!(z[6 * 32], 0);
    }
}
