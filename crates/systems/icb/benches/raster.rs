use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rev_core::graphics::ColorOps;
use rev_icb::texture::PALETTE_ENTRIES;
use rev_icb::{FrameBuffers, RenderContext, TextureDescriptor};

const W: u32 = 640;
const H: u32 = 480;

fn bench_flat(c: &mut Criterion) {
    let mut group = c.benchmark_group("flat_triangle");

    for size in [16, 64, 256].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let mut buffers = FrameBuffers::new(W, H);
            let mut ctx = RenderContext::new();
            ctx.set_render_device(buffers.device());
            b.iter(|| {
                black_box(ctx.draw_flat_triangle([[10, 10], [10 + size, 10], [10, 10 + size]], [200, 80, 40], 255, 10))
            });
        });
    }

    group.finish();
}

fn bench_gouraud_quad(c: &mut Criterion) {
    c.bench_function("gouraud_quad_fullscreen", |b| {
        let mut buffers = FrameBuffers::new(W, H);
        let mut ctx = RenderContext::new();
        ctx.set_render_device(buffers.device());
        let w = W as i32;
        let h = H as i32;
        b.iter(|| {
            black_box(ctx.draw_gouraud_quad(
                [[0, 0], [w, 0], [0, h], [w, h]],
                [[255, 0, 0], [0, 255, 0], [0, 0, 255], [255, 255, 255]],
                255,
                10,
            ))
        });
    });
}

fn bench_textured(c: &mut Criterion) {
    let mut group = c.benchmark_group("textured_quad");

    let mut palette = [0u32; PALETTE_ENTRIES];
    for (i, p) in palette.iter_mut().enumerate() {
        *p = ColorOps::pack_bgra(i as u8, (i * 3) as u8, (i * 7) as u8, 255);
    }
    let indices: Vec<u8> = (0..256 * 256).map(|i| (i ^ (i >> 8)) as u8).collect();
    let texels: Vec<u8> = indices.iter().flat_map(|&i| palette[i as usize].to_le_bytes()).collect();

    let formats = [
        ("paletted", TextureDescriptor::paletted(palette, 256, 256, &indices)),
        ("true_colour", TextureDescriptor::true_colour(256, 256, &texels)),
    ];

    for (name, desc) in formats.iter() {
        group.bench_function(*name, |b| {
            let mut buffers = FrameBuffers::new(W, H);
            let mut ctx = RenderContext::new();
            let Ok(tex) = ctx.register_texture(desc) else {
                return;
            };
            ctx.set_render_device(buffers.device());
            b.iter(|| {
                black_box(ctx.draw_gouraud_quad_textured(
                    [[32, 32], [288, 32], [32, 288], [288, 288]],
                    [[128, 128, 128]; 4],
                    [[0, 0], [255, 0], [0, 255], [255, 255]],
                    255,
                    10,
                    Some(tex),
                ))
            });
        });
    }

    group.finish();
}

fn bench_clear(c: &mut Criterion) {
    c.bench_function("frame_clear", |b| {
        let mut buffers = FrameBuffers::new(W, H);
        b.iter(|| buffers.clear());
    });
}

criterion_group!(benches, bench_flat, bench_gouraud_quad, bench_textured, bench_clear);
criterion_main!(benches);
