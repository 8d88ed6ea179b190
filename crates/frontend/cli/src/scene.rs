//! JSON scene files
//!
//! A scene names a screen size, a background colour, a set of textures and a
//! list of draw commands. Each command maps onto one `RenderContext` draw
//! call; textured commands name their texture (and optionally a palette taken
//! from another texture) and go through the texture cache.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use rev_core::graphics::ColorOps;
use rev_icb::texture::{MAX_MIP_LEVELS, PALETTE_ENTRIES};
use rev_icb::{
    DrawStatus, Point, RenderContext, Rgb, TexCoord, TextureCache, TextureCacheError, TextureDescriptor,
    TextureId, TextureRequest, TextureSource,
};

/// Base path used for every scene texture's cache key
const SCENE_BASE: &str = "scene";

fn opaque() -> u8 {
    255
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scene {
    pub width: u32,
    pub height: u32,
    /// Background colour
    #[serde(default)]
    pub clear: Rgb,
    #[serde(default)]
    pub textures: Vec<SceneTexture>,
    pub commands: Vec<Command>,
}

/// Texture as written in the scene file
///
/// Exactly one of `indices` (8-bit paletted) or `rgba` (true colour, R G B A
/// per texel) must be given.
#[derive(Debug, Clone, Deserialize)]
pub struct SceneTexture {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Palette entries as `[r, g, b, a]`; missing entries are transparent black
    #[serde(default)]
    pub palette: Vec<[u8; 4]>,
    #[serde(default)]
    pub indices: Vec<u8>,
    /// Extra paletted mip levels, level 1 first
    #[serde(default)]
    pub mips: Vec<Vec<u8>>,
    #[serde(default)]
    pub rgba: Vec<u8>,
}

/// Texture (and optional palette source) used by a textured command
#[derive(Debug, Clone, Deserialize)]
pub struct TextureRef {
    pub texture: String,
    #[serde(default)]
    pub palette: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    FlatTriangle {
        points: [Point; 3],
        rgb: Rgb,
        #[serde(default = "opaque")]
        alpha: u8,
        #[serde(default)]
        z: u16,
    },
    FlatQuad {
        points: [Point; 4],
        rgb: Rgb,
        #[serde(default = "opaque")]
        alpha: u8,
        #[serde(default)]
        z: u16,
    },
    GouraudTriangle {
        points: [Point; 3],
        colours: [Rgb; 3],
        #[serde(default = "opaque")]
        alpha: u8,
        #[serde(default)]
        z: u16,
    },
    GouraudQuad {
        points: [Point; 4],
        colours: [Rgb; 4],
        #[serde(default = "opaque")]
        alpha: u8,
        #[serde(default)]
        z: u16,
    },
    FlatTriangleTextured {
        points: [Point; 3],
        rgb: Rgb,
        uvs: [TexCoord; 3],
        #[serde(default = "opaque")]
        alpha: u8,
        #[serde(default)]
        z: u16,
        #[serde(flatten)]
        tex: TextureRef,
    },
    FlatQuadTextured {
        points: [Point; 4],
        rgb: Rgb,
        uvs: [TexCoord; 4],
        #[serde(default = "opaque")]
        alpha: u8,
        #[serde(default)]
        z: u16,
        #[serde(flatten)]
        tex: TextureRef,
    },
    GouraudTriangleTextured {
        points: [Point; 3],
        colours: [Rgb; 3],
        uvs: [TexCoord; 3],
        #[serde(default = "opaque")]
        alpha: u8,
        #[serde(default)]
        z: u16,
        #[serde(flatten)]
        tex: TextureRef,
    },
    GouraudQuadTextured {
        points: [Point; 4],
        colours: [Rgb; 4],
        uvs: [TexCoord; 4],
        #[serde(default = "opaque")]
        alpha: u8,
        #[serde(default)]
        z: u16,
        #[serde(flatten)]
        tex: TextureRef,
    },
    Tile {
        origin: Point,
        size: [u32; 2],
        rgb: Rgb,
        #[serde(default = "opaque")]
        alpha: u8,
        #[serde(default)]
        z: u16,
    },
    Sprite {
        origin: Point,
        size: [u32; 2],
        #[serde(default)]
        uv: TexCoord,
        rgb: Rgb,
        #[serde(default = "opaque")]
        alpha: u8,
        #[serde(default)]
        z: u16,
        #[serde(flatten)]
        tex: TextureRef,
    },
    LineF2 {
        from: Point,
        to: Point,
        rgb: Rgb,
        #[serde(default = "opaque")]
        alpha: u8,
        #[serde(default)]
        z: u16,
    },
    LineG2 {
        from: Point,
        to: Point,
        colours: [Rgb; 2],
        #[serde(default = "opaque")]
        alpha: u8,
        #[serde(default)]
        z: u16,
    },
    MipLevel {
        level: usize,
    },
}

impl Scene {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).with_context(|| format!("reading scene {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("parsing scene {}", path.display()))
    }

    pub fn parse(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn clear_colour(&self) -> u32 {
        ColorOps::pack_bgra(self.clear[0], self.clear[1], self.clear[2], 255)
    }
}

/// Scene textures converted to the formats the rasterizer registers
pub struct TextureLibrary {
    textures: Vec<LibraryTexture>,
}

struct LibraryTexture {
    name: String,
    width: u32,
    height: u32,
    palette: Option<[u32; PALETTE_ENTRIES]>,
    levels: Vec<Vec<u8>>,
}

impl TextureLibrary {
    pub fn build(textures: &[SceneTexture]) -> Result<Self> {
        let mut out = Vec::with_capacity(textures.len());
        for tex in textures {
            out.push(Self::convert(tex).with_context(|| format!("texture '{}'", tex.name))?);
        }
        Ok(Self { textures: out })
    }

    fn convert(tex: &SceneTexture) -> Result<LibraryTexture> {
        match (tex.indices.is_empty(), tex.rgba.is_empty()) {
            (false, true) => {
                if tex.palette.len() > PALETTE_ENTRIES {
                    bail!("palette has {} entries, at most {}", tex.palette.len(), PALETTE_ENTRIES);
                }
                if tex.mips.len() >= MAX_MIP_LEVELS {
                    bail!("{} extra mip levels, at most {}", tex.mips.len(), MAX_MIP_LEVELS - 1);
                }
                let mut palette = [0u32; PALETTE_ENTRIES];
                for (entry, &[r, g, b, a]) in palette.iter_mut().zip(&tex.palette) {
                    *entry = ColorOps::pack_bgra(r, g, b, a);
                }
                let mut levels = vec![tex.indices.clone()];
                levels.extend(tex.mips.iter().cloned());
                Ok(LibraryTexture {
                    name: tex.name.clone(),
                    width: tex.width,
                    height: tex.height,
                    palette: Some(palette),
                    levels,
                })
            }
            (true, false) => {
                let bgra = tex
                    .rgba
                    .chunks_exact(4)
                    .flat_map(|px| ColorOps::pack_bgra(px[0], px[1], px[2], px[3]).to_le_bytes())
                    .collect();
                Ok(LibraryTexture {
                    name: tex.name.clone(),
                    width: tex.width,
                    height: tex.height,
                    palette: None,
                    levels: vec![bgra],
                })
            }
            _ => bail!("needs exactly one of 'indices' or 'rgba'"),
        }
    }

    fn find(&self, name: &str) -> Result<&LibraryTexture, TextureCacheError> {
        self.textures
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| TextureCacheError::Load {
                name: name.to_string(),
                reason: "not defined in scene".to_string(),
            })
    }

    pub fn source(&self) -> LibrarySource<'_> {
        LibrarySource { library: self }
    }
}

/// Cache-miss loader reading from a [`TextureLibrary`]
pub struct LibrarySource<'s> {
    library: &'s TextureLibrary,
}

impl<'s> TextureSource<'s> for LibrarySource<'s> {
    fn load_texture(&mut self, name: &str, _base: &str) -> Result<TextureDescriptor<'s>, TextureCacheError> {
        let tex = self.library.find(name)?;
        let Some(first) = tex.levels.first() else {
            return Err(TextureCacheError::Load {
                name: name.to_string(),
                reason: "no texels".to_string(),
            });
        };
        let Some(palette) = tex.palette else {
            return Ok(TextureDescriptor::true_colour(tex.width, tex.height, first));
        };
        let mut desc = TextureDescriptor::paletted(palette, tex.width, tex.height, first);
        for (i, level) in tex.levels.iter().enumerate().skip(1) {
            desc = desc.with_level(i, level);
        }
        Ok(desc)
    }

    fn load_palette(&mut self, name: &str, _base: &str) -> Result<[u32; PALETTE_ENTRIES], TextureCacheError> {
        self.library.find(name)?.palette.ok_or_else(|| TextureCacheError::Load {
            name: name.to_string(),
            reason: "true-colour texture has no palette".to_string(),
        })
    }
}

/// Draw counts for one scene run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub handled: usize,
    pub not_performed: usize,
}

fn texture_id<'a>(
    ctx: &mut RenderContext<'a>,
    cache: &mut TextureCache,
    source: &mut LibrarySource<'a>,
    tex: &TextureRef,
) -> Result<TextureId> {
    let palette = tex.palette.as_deref().unwrap_or(&tex.texture);
    let request = TextureRequest::named(&tex.texture, palette, SCENE_BASE);
    Ok(cache.get_registered_texture(ctx, source, &request)?)
}

/// Issue every command of `scene` against `ctx`
pub fn run<'a>(
    scene: &Scene,
    ctx: &mut RenderContext<'a>,
    cache: &mut TextureCache,
    source: &mut LibrarySource<'a>,
) -> Result<RunSummary> {
    let mut summary = RunSummary::default();

    ctx.start_drawing();
    for (index, command) in scene.commands.iter().enumerate() {
        let status = match command {
            Command::FlatTriangle { points, rgb, alpha, z } => ctx.draw_flat_triangle(*points, *rgb, *alpha, *z),
            Command::FlatQuad { points, rgb, alpha, z } => ctx.draw_flat_quad(*points, *rgb, *alpha, *z),
            Command::GouraudTriangle {
                points,
                colours,
                alpha,
                z,
            } => ctx.draw_gouraud_triangle(*points, *colours, *alpha, *z),
            Command::GouraudQuad {
                points,
                colours,
                alpha,
                z,
            } => ctx.draw_gouraud_quad(*points, *colours, *alpha, *z),
            Command::FlatTriangleTextured {
                points,
                rgb,
                uvs,
                alpha,
                z,
                tex,
            } => {
                let id = texture_id(ctx, cache, source, tex)?;
                ctx.draw_flat_triangle_textured(*points, *rgb, *uvs, *alpha, *z, Some(id))
            }
            Command::FlatQuadTextured {
                points,
                rgb,
                uvs,
                alpha,
                z,
                tex,
            } => {
                let id = texture_id(ctx, cache, source, tex)?;
                ctx.draw_flat_quad_textured(*points, *rgb, *uvs, *alpha, *z, Some(id))
            }
            Command::GouraudTriangleTextured {
                points,
                colours,
                uvs,
                alpha,
                z,
                tex,
            } => {
                let id = texture_id(ctx, cache, source, tex)?;
                ctx.draw_gouraud_triangle_textured(*points, *colours, *uvs, *alpha, *z, Some(id))
            }
            Command::GouraudQuadTextured {
                points,
                colours,
                uvs,
                alpha,
                z,
                tex,
            } => {
                let id = texture_id(ctx, cache, source, tex)?;
                ctx.draw_gouraud_quad_textured(*points, *colours, *uvs, *alpha, *z, Some(id))
            }
            Command::Tile {
                origin,
                size,
                rgb,
                alpha,
                z,
            } => ctx.draw_tile(*origin, *size, *rgb, *alpha, *z),
            Command::Sprite {
                origin,
                size,
                uv,
                rgb,
                alpha,
                z,
                tex,
            } => {
                let id = texture_id(ctx, cache, source, tex)?;
                ctx.draw_sprite(*origin, *size, *uv, *rgb, *alpha, *z, Some(id))
            }
            Command::LineF2 {
                from,
                to,
                rgb,
                alpha,
                z,
            } => ctx.draw_line_f2(*from, *to, *rgb, *alpha, *z),
            Command::LineG2 {
                from,
                to,
                colours,
                alpha,
                z,
            } => ctx.draw_line_g2(*from, *to, *colours, *alpha, *z),
            Command::MipLevel { level } => {
                ctx.set_mip_map_level(*level);
                continue;
            }
        };

        log::debug!("command {} -> {:?}", index, status);
        match status {
            DrawStatus::Handled => summary.handled += 1,
            DrawStatus::NotPerformed => {
                log::warn!("command {} was not performed", index);
                summary.not_performed += 1;
            }
        }
    }
    ctx.end_drawing();
    ctx.clear_processor_state();

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rev_icb::FrameBuffers;

    const SCENE: &str = r#"{
        "width": 64,
        "height": 64,
        "clear": [0, 0, 32],
        "textures": [
            { "name": "checker", "width": 2, "height": 2,
              "palette": [[255, 255, 255, 255], [0, 0, 0, 255]],
              "indices": [0, 1, 1, 0] },
            { "name": "night", "width": 1, "height": 1,
              "palette": [[0, 0, 200, 255], [0, 0, 100, 255]],
              "indices": [0] },
            { "name": "photo", "width": 1, "height": 1, "rgba": [10, 20, 30, 255] }
        ],
        "commands": [
            { "op": "flat_triangle", "points": [[0, 0], [20, 0], [0, 20]], "rgb": [255, 0, 0], "z": 5 },
            { "op": "sprite", "origin": [32, 0], "size": [2, 2], "rgb": [128, 128, 128], "texture": "checker" },
            { "op": "sprite", "origin": [40, 0], "size": [2, 2], "rgb": [128, 128, 128],
              "texture": "checker", "palette": "night" },
            { "op": "tile", "origin": [0, 40], "size": [4, 4], "rgb": [0, 255, 0] },
            { "op": "sprite", "origin": [50, 50], "size": [1, 1], "rgb": [128, 128, 128], "texture": "photo" },
            { "op": "line_f2", "from": [0, 63], "to": [63, 63], "rgb": [9, 9, 9] },
            { "op": "mip_level", "level": 2 }
        ]
    }"#;

    #[test]
    fn test_parse_scene() {
        let scene = Scene::parse(SCENE).unwrap();
        assert_eq!((scene.width, scene.height), (64, 64));
        assert_eq!(scene.textures.len(), 3);
        assert_eq!(scene.commands.len(), 7);
        assert!(matches!(scene.commands[0], Command::FlatTriangle { alpha: 255, z: 5, .. }));
        match &scene.commands[2] {
            Command::Sprite { tex, .. } => assert_eq!(tex.palette.as_deref(), Some("night")),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_unknown_op_is_rejected() {
        let json = r#"{ "width": 4, "height": 4, "commands": [ { "op": "polyline" } ] }"#;
        assert!(Scene::parse(json).is_err());
    }

    #[test]
    fn test_texture_needs_one_texel_format() {
        let tex = SceneTexture {
            name: "both".to_string(),
            width: 1,
            height: 1,
            palette: Vec::new(),
            indices: vec![0],
            mips: Vec::new(),
            rgba: vec![0, 0, 0, 0],
        };
        assert!(TextureLibrary::build(&[tex]).is_err());
    }

    #[test]
    fn test_run_scene() {
        let scene = Scene::parse(SCENE).unwrap();
        let library = TextureLibrary::build(&scene.textures).unwrap();
        let mut buffers = FrameBuffers::new(scene.width, scene.height);
        buffers.fill(scene.clear_colour());

        let summary = {
            let mut source = library.source();
            let mut ctx = RenderContext::new();
            let mut cache = TextureCache::new();
            assert!(ctx.set_render_device(buffers.device()).is_ok());
            let summary = run(&scene, &mut ctx, &mut cache, &mut source).unwrap();
            // checker, checker with the night palette, photo
            assert_eq!(cache.len(), 3);
            assert_eq!(ctx.mip_map_level(), 2);
            cache.clear(&mut ctx);
            assert_eq!(ctx.texture_count(), 0);
            summary
        };
        assert_eq!(
            summary,
            RunSummary {
                handled: 6,
                not_performed: 0
            }
        );

        let red = ColorOps::pack_bgra(255, 0, 0, 255);
        assert_eq!(buffers.pixel(2, 2), Some(red));
        assert_eq!(buffers.depth(2, 2), Some(5));
        assert_eq!(buffers.pixel(30, 30), Some(scene.clear_colour()));
        assert_eq!(buffers.depth(30, 30), Some(0xFFFF));

        assert_eq!(buffers.pixel(32, 0), Some(ColorOps::pack_bgra(255, 255, 255, 255)));
        assert_eq!(buffers.pixel(33, 0), Some(ColorOps::pack_bgra(0, 0, 0, 255)));
        assert_eq!(buffers.pixel(40, 0), Some(ColorOps::pack_bgra(0, 0, 200, 255)));
        assert_eq!(buffers.pixel(41, 0), Some(ColorOps::pack_bgra(0, 0, 100, 255)));

        assert_eq!(buffers.pixel(1, 41), Some(ColorOps::pack_bgra(0, 255, 0, 255)));
        assert_eq!(buffers.pixel(50, 50), Some(ColorOps::pack_bgra(10, 20, 30, 255)));
        assert_eq!(buffers.pixel(20, 63), Some(ColorOps::pack_bgra(9, 9, 9, 255)));
    }
}
