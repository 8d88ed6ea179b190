mod scene;

use anyhow::{bail, Context, Result};
use clap::Parser;
use rev_core::types::Frame;
use rev_icb::{
    BackendKind, FrameBuffers, RenderConfig, RenderContext, SoftwareBackend, TextureCache, MAX_DEVICE_DIMENSION,
};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use scene::{Scene, TextureLibrary};

/// Render a JSON scene through the polygon rasterizer and save it as PNG
#[derive(Parser)]
struct Args {
    /// Scene description (JSON)
    scene: PathBuf,

    /// Output image
    #[arg(short, long, default_value = "out.png")]
    output: PathBuf,

    /// Render configuration (JSON); defaults are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Rasterizer log level: off, error, warn, info, debug, trace
    #[arg(long)]
    log_level: Option<String>,

    /// Print the draw summary
    #[arg(long, default_value_t = false)]
    stats: bool,
}

fn write_png(frame: &Frame, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), frame.width, frame.height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&frame.to_rgba_bytes())?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match args.config.as_deref() {
        Some(path) => RenderConfig::load(path)?,
        None => RenderConfig::default(),
    };
    if let Some(level) = args.log_level {
        config.log_level = level;
    }
    config.apply_logging();

    if config.backend == BackendKind::OpenGl {
        // No window or GL context in a headless tool
        log::warn!("OpenGL backend requested; revdraw renders with the software backend");
    }

    let scene = Scene::load(&args.scene)?;
    let library = TextureLibrary::build(&scene.textures)?;

    let mut buffers = FrameBuffers::new(scene.width, scene.height);
    buffers.fill(scene.clear_colour());

    let summary = {
        let mut source = library.source();
        let mut ctx = RenderContext::with_backend(Box::new(SoftwareBackend::new()), &config);
        let result = ctx.set_render_device(buffers.device());
        if !result.is_ok() {
            bail!(
                "cannot render a {}x{} scene: {:?} (limit {})",
                scene.width,
                scene.height,
                result,
                config.max_device_dimension.min(MAX_DEVICE_DIMENSION)
            );
        }

        let mut cache = TextureCache::new();
        let summary = scene::run(&scene, &mut ctx, &mut cache, &mut source)?;
        cache.clear(&mut ctx);
        summary
    };

    if args.stats {
        println!(
            "{} command(s) handled, {} not performed",
            summary.handled, summary.not_performed
        );
    }

    write_png(&buffers.to_frame(), &args.output)?;
    log::info!("Wrote {}", args.output.display());
    Ok(())
}
