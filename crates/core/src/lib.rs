//! Shared primitives for the rasterizer crates.
//!
//! - [`graphics`]: 16.16 fixed-point helpers and BGRA colour operations
//! - [`logging`]: category-based logging, off by default
//! - [`config`]: JSON configuration loading
//! - [`types`]: the ARGB [`types::Frame`] used for presenting rendered output

pub mod config;
pub mod graphics;
pub mod logging;

pub mod types {
    use serde::{Deserialize, Serialize};

    /// A presentable image in ARGB8888 (0xAARRGGBB), row-major, no padding.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Frame {
        pub width: u32,
        pub height: u32,
        pub pixels: Vec<u32>,
    }

    impl Frame {
        pub fn new(width: u32, height: u32) -> Self {
            Self {
                width,
                height,
                pixels: vec![0; (width * height) as usize],
            }
        }

        /// Pixel at (x, y), `None` outside the frame
        pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
            if x >= self.width || y >= self.height {
                return None;
            }
            self.pixels.get((y * self.width + x) as usize).copied()
        }

        /// Flatten into tightly packed RGBA bytes (for PNG encoding)
        pub fn to_rgba_bytes(&self) -> Vec<u8> {
            let mut out = Vec::with_capacity(self.pixels.len() * 4);
            for &p in &self.pixels {
                out.push((p >> 16) as u8);
                out.push((p >> 8) as u8);
                out.push(p as u8);
                out.push((p >> 24) as u8);
            }
            out
        }
    }
}
