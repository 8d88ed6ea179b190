//! OpenGL render backend - GPU rasterization with readback
//!
//! **Architecture**:
//! - OpenGL 3.3 core profile through `glow`
//! - Renders into an FBO sized to the bound device
//! - One shader program; flat shading is done by giving all three vertices
//!   the first vertex's colour
//! - Texels are modulated so that a vertex channel of 128 is unity gain
//! - Depth goes through the hardware depth test as `32767 - z`; the device's
//!   Z buffer is left alone
//! - `end_drawing` reads the frame back into the device's colour buffer
//!
//! The caller owns the GL context and must keep it current.

use std::collections::HashMap;

use glow::HasContext;

use rev_core::graphics::{ColorOps, Fixed16};
use rev_core::logging::{log, LogCategory, LogLevel};

use crate::device::{RenderDevice, RGB_BYTES_PER_PIXEL};
use crate::render_backend::{PrimitiveStyle, RenderBackend, Shading};
use crate::texture::{TexelFetch, TextureHandle, TextureId};
use crate::vertex::Vertex2D;

/// Floats per vertex: position (3), colour (4), texcoord (2)
const VERTEX_FLOATS: usize = 9;

const VERTEX_SHADER: &str = r#"#version 330 core
layout (location = 0) in vec3 aPos;
layout (location = 1) in vec4 aColour;
layout (location = 2) in vec2 aTexCoord;

out vec4 vColour;
out vec2 vTexCoord;

void main() {
    gl_Position = vec4(aPos, 1.0);
    vColour = aColour;
    vTexCoord = aTexCoord;
}
"#;

const FRAGMENT_SHADER: &str = r#"#version 330 core
in vec4 vColour;
in vec2 vTexCoord;
out vec4 FragColor;

uniform sampler2D uTexture;
uniform int uTextured;

void main() {
    if (uTextured != 0) {
        vec4 texel = texture(uTexture, vTexCoord);
        // Vertex channel 128/255 is a gain of 1.0
        FragColor = vec4(clamp(texel.rgb * vColour.rgb * (255.0 / 128.0), 0.0, 1.0), vColour.a);
    } else {
        FragColor = vColour;
    }
}
"#;

#[derive(Debug, Clone, Copy)]
struct GlTexture {
    texture: glow::Texture,
    width: u32,
    height: u32,
    levels: usize,
}

/// OpenGL render backend
pub struct OpenGlBackend<'a> {
    gl: glow::Context,
    device: Option<RenderDevice<'a>>,
    width: u32,
    height: u32,

    fbo: glow::Framebuffer,
    color_texture: glow::Texture,
    depth_renderbuffer: glow::Renderbuffer,
    program: glow::Program,
    textured_location: Option<glow::UniformLocation>,
    vao: glow::VertexArray,
    vbo: glow::Buffer,

    textures: HashMap<TextureId, GlTexture>,
}

impl<'a> OpenGlBackend<'a> {
    /// Create the backend on a current GL context
    pub fn new(gl: glow::Context) -> Result<Self, String> {
        unsafe {
            let fbo = gl
                .create_framebuffer()
                .map_err(|e| format!("Failed to create framebuffer: {}", e))?;
            let color_texture = gl
                .create_texture()
                .map_err(|e| format!("Failed to create texture: {}", e))?;
            let depth_renderbuffer = gl
                .create_renderbuffer()
                .map_err(|e| format!("Failed to create renderbuffer: {}", e))?;

            let program = create_program(&gl)?;
            let textured_location = gl.get_uniform_location(program, "uTextured");
            gl.use_program(Some(program));
            let sampler_location = gl.get_uniform_location(program, "uTexture");
            gl.uniform_1_i32(sampler_location.as_ref(), 0);

            let vao = gl
                .create_vertex_array()
                .map_err(|e| format!("Failed to create VAO: {}", e))?;
            let vbo = gl
                .create_buffer()
                .map_err(|e| format!("Failed to create VBO: {}", e))?;

            gl.bind_vertex_array(Some(vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
            let float = std::mem::size_of::<f32>() as i32;
            let stride = VERTEX_FLOATS as i32 * float;
            gl.vertex_attrib_pointer_f32(0, 3, glow::FLOAT, false, stride, 0);
            gl.enable_vertex_attrib_array(0);
            gl.vertex_attrib_pointer_f32(1, 4, glow::FLOAT, false, stride, 3 * float);
            gl.enable_vertex_attrib_array(1);
            gl.vertex_attrib_pointer_f32(2, 2, glow::FLOAT, false, stride, 7 * float);
            gl.enable_vertex_attrib_array(2);
            gl.bind_vertex_array(None);

            let mut backend = Self {
                gl,
                device: None,
                width: 0,
                height: 0,
                fbo,
                color_texture,
                depth_renderbuffer,
                program,
                textured_location,
                vao,
                vbo,
                textures: HashMap::new(),
            };
            backend.resize_targets(1, 1)?;
            Ok(backend)
        }
    }

    /// (Re)allocate the FBO attachments
    fn resize_targets(&mut self, width: u32, height: u32) -> Result<(), String> {
        if self.width == width && self.height == height {
            return Ok(());
        }
        unsafe {
            let gl = &self.gl;
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(self.fbo));

            gl.bind_texture(glow::TEXTURE_2D, Some(self.color_texture));
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA as i32,
                width as i32,
                height as i32,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                None,
            );
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::NEAREST as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::NEAREST as i32);
            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                Some(self.color_texture),
                0,
            );

            gl.bind_renderbuffer(glow::RENDERBUFFER, Some(self.depth_renderbuffer));
            gl.renderbuffer_storage(glow::RENDERBUFFER, glow::DEPTH_COMPONENT16, width as i32, height as i32);
            gl.framebuffer_renderbuffer(
                glow::FRAMEBUFFER,
                glow::DEPTH_ATTACHMENT,
                glow::RENDERBUFFER,
                Some(self.depth_renderbuffer),
            );

            let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            if status != glow::FRAMEBUFFER_COMPLETE {
                return Err(format!("Framebuffer incomplete: status = 0x{:X}", status));
            }
        }
        self.width = width;
        self.height = height;
        Ok(())
    }

    /// Device colour buffer (BGRA, top-down) as GL rows (RGBA, bottom-up)
    fn device_to_gl(device: &RenderDevice<'_>) -> Vec<u8> {
        let w = device.width() as usize;
        let h = device.height() as usize;
        let mut out = vec![0u8; w * h * 4];
        for y in 0..h {
            let src_row = y * device.rgb_pitch();
            let dst_row = (h - 1 - y) * w * 4;
            for x in 0..w {
                let s = src_row + x * RGB_BYTES_PER_PIXEL;
                let d = dst_row + x * 4;
                if let Some(px) = device.rgb().get(s..s + 4) {
                    out[d..d + 4].copy_from_slice(&[px[2], px[1], px[0], px[3]]);
                }
            }
        }
        out
    }

    /// Screen-space 16.16 to normalized device coordinates
    fn to_ndc(&self, v: &Vertex2D) -> (f32, f32) {
        let x = Fixed16::to_f64(v.x) as f32;
        let y = Fixed16::to_f64(v.y) as f32;
        let nx = (x / self.width as f32) * 2.0 - 1.0;
        let ny = 1.0 - (y / self.height as f32) * 2.0;
        (nx, ny)
    }

    /// Depth tag to NDC z: tag 0 is the near plane
    fn depth_to_ndc(z: u16) -> f32 {
        let inverted = 32767.0 - z as f32;
        (-inverted / 32767.0).clamp(-1.0, 1.0)
    }

    fn push_vertex(&self, out: &mut Vec<f32>, v: &Vertex2D, colour: u32, z: f32, tex_size: (f32, f32)) {
        let (nx, ny) = self.to_ndc(v);
        let rgba = ColorOps::to_rgba_f32(colour);
        let s = Fixed16::to_f64(v.u) as f32 / tex_size.0;
        let t = Fixed16::to_f64(v.v) as f32 / tex_size.1;
        out.extend_from_slice(&[nx, ny, z, rgba[0], rgba[1], rgba[2], rgba[3], s, t]);
    }

    unsafe fn submit(&self, mode: u32, vertices: &[f32], texture: Option<(GlTexture, usize)>) {
        let gl = &self.gl;
        gl.bind_framebuffer(glow::FRAMEBUFFER, Some(self.fbo));
        gl.viewport(0, 0, self.width as i32, self.height as i32);
        gl.use_program(Some(self.program));

        match texture {
            Some((tex, mip)) => {
                let level = mip.min(tex.levels.saturating_sub(1)) as i32;
                gl.active_texture(glow::TEXTURE0);
                gl.bind_texture(glow::TEXTURE_2D, Some(tex.texture));
                gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_BASE_LEVEL, level);
                gl.uniform_1_i32(self.textured_location.as_ref(), 1);
            }
            None => gl.uniform_1_i32(self.textured_location.as_ref(), 0),
        }

        gl.bind_vertex_array(Some(self.vao));
        gl.bind_buffer(glow::ARRAY_BUFFER, Some(self.vbo));
        gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, bytemuck::cast_slice(vertices), glow::STREAM_DRAW);
        gl.draw_arrays(mode, 0, (vertices.len() / VERTEX_FLOATS) as i32);
        gl.bind_vertex_array(None);
        gl.bind_framebuffer(glow::FRAMEBUFFER, None);
    }
}

impl<'a> RenderBackend<'a> for OpenGlBackend<'a> {
    fn set_render_device(&mut self, device: RenderDevice<'a>) {
        if let Err(e) = self.resize_targets(device.width(), device.height()) {
            log(LogCategory::Backend, LogLevel::Error, || e.clone());
        }
        self.device = Some(device);
    }

    fn render_device(&self) -> Option<&RenderDevice<'a>> {
        self.device.as_ref()
    }

    fn release_device(&mut self) -> Option<RenderDevice<'a>> {
        self.device.take()
    }

    fn texture_registered(&mut self, id: TextureId, texture: &TextureHandle<'a>) {
        let texture_object = match unsafe { self.gl.create_texture() } {
            Ok(t) => t,
            Err(e) => {
                log(LogCategory::Backend, LogLevel::Error, || {
                    format!("Failed to create texture for {:?}: {}", id, e)
                });
                return;
            }
        };

        let levels = texture.level_count();
        unsafe {
            let gl = &self.gl;
            gl.bind_texture(glow::TEXTURE_2D, Some(texture_object));
            for index in 0..levels {
                let Some(sampler) = texture.sampler(index) else {
                    continue;
                };
                let (w, h) = texture.level_size(index);
                let mut rgba = Vec::with_capacity((w * h * 4) as usize);
                for y in 0..h as i32 {
                    for x in 0..w as i32 {
                        let c = sampler.fetch(x << index, y << index);
                        rgba.extend_from_slice(&[
                            ColorOps::red(c),
                            ColorOps::green(c),
                            ColorOps::blue(c),
                            ColorOps::alpha(c),
                        ]);
                    }
                }
                gl.tex_image_2d(
                    glow::TEXTURE_2D,
                    index as i32,
                    glow::RGBA as i32,
                    w as i32,
                    h as i32,
                    0,
                    glow::RGBA,
                    glow::UNSIGNED_BYTE,
                    Some(&rgba),
                );
            }
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::NEAREST as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::NEAREST as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE as i32);
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MAX_LEVEL,
                levels.saturating_sub(1) as i32,
            );
            gl.bind_texture(glow::TEXTURE_2D, None);
        }

        if let Some(old) = self.textures.insert(
            id,
            GlTexture {
                texture: texture_object,
                width: texture.width(),
                height: texture.height(),
                levels,
            },
        ) {
            unsafe { self.gl.delete_texture(old.texture) };
        }
    }

    fn texture_unregistered(&mut self, id: TextureId) {
        if let Some(tex) = self.textures.remove(&id) {
            unsafe { self.gl.delete_texture(tex.texture) };
        }
    }

    fn start_drawing(&mut self) {
        let Some(device) = self.device.as_ref() else {
            return;
        };
        let pixels = Self::device_to_gl(device);
        unsafe {
            let gl = &self.gl;
            gl.bind_texture(glow::TEXTURE_2D, Some(self.color_texture));
            gl.tex_sub_image_2d(
                glow::TEXTURE_2D,
                0,
                0,
                0,
                self.width as i32,
                self.height as i32,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                glow::PixelUnpackData::Slice(&pixels),
            );
            gl.bind_texture(glow::TEXTURE_2D, None);

            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(self.fbo));
            gl.clear_depth_f32(1.0);
            gl.clear(glow::DEPTH_BUFFER_BIT);
            gl.enable(glow::DEPTH_TEST);
            gl.depth_func(glow::LEQUAL);
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
        }
    }

    fn end_drawing(&mut self) {
        let (w, h) = (self.width as usize, self.height as usize);
        let mut pixels = vec![0u8; w * h * 4];
        unsafe {
            let gl = &self.gl;
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(self.fbo));
            gl.read_pixels(
                0,
                0,
                w as i32,
                h as i32,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                glow::PixelPackData::Slice(&mut pixels),
            );
            gl.disable(glow::DEPTH_TEST);
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
        }

        let Some(device) = self.device.as_mut() else {
            return;
        };
        let pitch = device.rgb_pitch();
        let rgb = device.rgb_mut();
        // GL rows are bottom-up
        for y in 0..h {
            let src_row = (h - 1 - y) * w * 4;
            for x in 0..w {
                let s = src_row + x * 4;
                let d = y * pitch + x * RGB_BYTES_PER_PIXEL;
                if let Some(dst) = rgb.get_mut(d..d + 4) {
                    dst.copy_from_slice(&[pixels[s + 2], pixels[s + 1], pixels[s], pixels[s + 3]]);
                }
            }
        }
    }

    fn draw_triangle(&mut self, tri: &[Vertex2D; 3], style: &PrimitiveStyle<'_>) {
        if self.device.is_none() {
            return;
        }
        let texture = style
            .texture
            .and_then(|b| self.textures.get(&b.id).map(|t| (*t, b.mip_level)));
        if style.texture.is_some() && texture.is_none() {
            log(LogCategory::Backend, LogLevel::Warn, || {
                "textured triangle with no uploaded texture, skipped".to_string()
            });
            return;
        }
        let tex_size = texture.map_or((1.0, 1.0), |(t, _)| (t.width as f32, t.height as f32));

        let z = Self::depth_to_ndc(style.z);
        let mut vertices = Vec::with_capacity(3 * VERTEX_FLOATS);
        for v in tri {
            let colour = match style.shading {
                Shading::Flat => tri[0].colour,
                Shading::Gouraud => v.colour,
            };
            self.push_vertex(&mut vertices, v, colour, z, tex_size);
        }
        unsafe { self.submit(glow::TRIANGLES, &vertices, texture) };
    }

    fn draw_line(&mut self, from: &Vertex2D, to: &Vertex2D, shading: Shading, z: u16) {
        if self.device.is_none() {
            return;
        }
        let z = Self::depth_to_ndc(z);
        let end_colour = match shading {
            Shading::Flat => from.colour,
            Shading::Gouraud => to.colour,
        };
        let mut vertices = Vec::with_capacity(2 * VERTEX_FLOATS);
        self.push_vertex(&mut vertices, from, from.colour, z, (1.0, 1.0));
        self.push_vertex(&mut vertices, to, end_colour, z, (1.0, 1.0));
        unsafe { self.submit(glow::LINES, &vertices, None) };
    }

    fn name(&self) -> &str {
        "OpenGL"
    }

    fn is_hardware_accelerated(&self) -> bool {
        true
    }
}

unsafe fn compile_shader(gl: &glow::Context, shader_type: u32, source: &str) -> Result<glow::Shader, String> {
    let shader = gl
        .create_shader(shader_type)
        .map_err(|e| format!("Failed to create shader: {}", e))?;
    gl.shader_source(shader, source);
    gl.compile_shader(shader);
    if !gl.get_shader_compile_status(shader) {
        let info = gl.get_shader_info_log(shader);
        gl.delete_shader(shader);
        return Err(format!("Shader compilation failed: {}", info));
    }
    Ok(shader)
}

fn create_program(gl: &glow::Context) -> Result<glow::Program, String> {
    unsafe {
        let vertex_shader = compile_shader(gl, glow::VERTEX_SHADER, VERTEX_SHADER)?;
        let fragment_shader = compile_shader(gl, glow::FRAGMENT_SHADER, FRAGMENT_SHADER)?;

        let program = gl
            .create_program()
            .map_err(|e| format!("Failed to create program: {}", e))?;
        gl.attach_shader(program, vertex_shader);
        gl.attach_shader(program, fragment_shader);
        gl.link_program(program);
        if !gl.get_program_link_status(program) {
            let info = gl.get_program_info_log(program);
            gl.delete_program(program);
            return Err(format!("Program linking failed: {}", info));
        }

        gl.delete_shader(vertex_shader);
        gl.delete_shader(fragment_shader);
        Ok(program)
    }
}

impl Drop for OpenGlBackend<'_> {
    fn drop(&mut self) {
        unsafe {
            for tex in self.textures.values() {
                self.gl.delete_texture(tex.texture);
            }
            self.gl.delete_framebuffer(self.fbo);
            self.gl.delete_texture(self.color_texture);
            self.gl.delete_renderbuffer(self.depth_renderbuffer);
            self.gl.delete_program(self.program);
            self.gl.delete_vertex_array(self.vao);
            self.gl.delete_buffer(self.vbo);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_mapping_puts_small_tags_near() {
        assert_eq!(OpenGlBackend::depth_to_ndc(0), -1.0);
        assert_eq!(OpenGlBackend::depth_to_ndc(32767), 0.0);
        assert_eq!(OpenGlBackend::depth_to_ndc(u16::MAX), 1.0);
        assert!(OpenGlBackend::depth_to_ndc(100) < OpenGlBackend::depth_to_ndc(200));
    }
}
