//! Render device: the caller's colour and depth buffers
//!
//! The colour buffer is 4 bytes per pixel (B, G, R, A) with a caller chosen
//! row stride; the depth buffer is one `u16` per pixel with a pitch of
//! `width * 2` bytes. The device only borrows both buffers.

use rev_core::graphics::ColorOps;
use rev_core::logging::{log, LogCategory, LogLevel};
use rev_core::types::Frame;

/// Largest width or height a device may have
pub const MAX_DEVICE_DIMENSION: u32 = 2048;

pub const RGB_BYTES_PER_PIXEL: usize = 4;
pub const Z_BYTES_PER_PIXEL: usize = 2;

/// Depth value a freshly cleared Z buffer holds
pub const Z_CLEAR: u16 = 0xFFFF;

/// Outcome of binding a render device
///
/// The numeric code is inverted relative to the draw calls: 0 is success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceSetupResult {
    Ok,
    InvalidDimensions,
    NullBuffer,
    BufferTooSmall,
}

impl DeviceSetupResult {
    pub fn code(self) -> i32 {
        match self {
            DeviceSetupResult::Ok => 0,
            _ => 1,
        }
    }

    pub fn is_ok(self) -> bool {
        self == DeviceSetupResult::Ok
    }
}

/// Caller-side device description
#[derive(Debug)]
pub struct RenderDeviceDesc<'a> {
    pub width: u32,
    pub height: u32,
    /// Bytes per row of `rgb`
    pub stride: u32,
    pub rgb: &'a mut [u8],
    pub z: &'a mut [u16],
}

/// A validated render device
#[derive(Debug)]
pub struct RenderDevice<'a> {
    width: u32,
    height: u32,
    rgb_pitch: usize,
    z_pitch: usize,
    rgb: &'a mut [u8],
    z: &'a mut [u16],
}

impl<'a> RenderDevice<'a> {
    /// Validate a description against `max_dimension`
    ///
    /// `max_dimension` can only lower the limit; anything above
    /// [`MAX_DEVICE_DIMENSION`] is capped.
    pub fn from_desc(desc: RenderDeviceDesc<'a>, max_dimension: u32) -> Result<Self, DeviceSetupResult> {
        let max_dimension = max_dimension.min(MAX_DEVICE_DIMENSION);
        let RenderDeviceDesc {
            width,
            height,
            stride,
            rgb,
            z,
        } = desc;

        if rgb.is_empty() || z.is_empty() {
            return Err(DeviceSetupResult::NullBuffer);
        }
        if width == 0 || height == 0 || width > max_dimension || height > max_dimension {
            return Err(DeviceSetupResult::InvalidDimensions);
        }

        let w = width as usize;
        let h = height as usize;
        let rgb_pitch = stride as usize;
        if rgb_pitch < w * RGB_BYTES_PER_PIXEL {
            return Err(DeviceSetupResult::InvalidDimensions);
        }
        let rgb_needed = rgb_pitch * (h - 1) + w * RGB_BYTES_PER_PIXEL;
        if rgb.len() < rgb_needed || z.len() < w * h {
            log(LogCategory::Device, LogLevel::Warn, || {
                format!(
                    "device {}x{} needs {} colour bytes and {} depth entries, got {} and {}",
                    width,
                    height,
                    rgb_needed,
                    w * h,
                    rgb.len(),
                    z.len()
                )
            });
            return Err(DeviceSetupResult::BufferTooSmall);
        }

        Ok(Self {
            width,
            height,
            rgb_pitch,
            z_pitch: w * Z_BYTES_PER_PIXEL,
            rgb,
            z,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Colour buffer row pitch in bytes
    pub fn rgb_pitch(&self) -> usize {
        self.rgb_pitch
    }

    /// Depth buffer row pitch in bytes
    pub fn z_pitch(&self) -> usize {
        self.z_pitch
    }

    pub fn rgb(&self) -> &[u8] {
        &*self.rgb
    }

    pub fn z(&self) -> &[u16] {
        &*self.z
    }

    pub fn rgb_mut(&mut self) -> &mut [u8] {
        &mut *self.rgb
    }

    /// Colour and depth slices for row `y`, `width` pixels each
    #[inline]
    pub fn row_mut(&mut self, y: i32) -> Option<(&mut [u8], &mut [u16])> {
        if y < 0 || y as u32 >= self.height {
            return None;
        }
        let y = y as usize;
        let w = self.width as usize;
        let rgb_start = y * self.rgb_pitch;
        let z_start = y * (self.z_pitch / Z_BYTES_PER_PIXEL);
        let rgb = self.rgb.get_mut(rgb_start..rgb_start + w * RGB_BYTES_PER_PIXEL)?;
        let z = self.z.get_mut(z_start..z_start + w)?;
        Some((rgb, z))
    }

    /// Write one pixel; coordinates outside the device are ignored
    #[inline]
    pub fn put_pixel(&mut self, x: i32, y: i32, colour: u32, depth: u16) {
        if x < 0 || x as u32 >= self.width {
            return;
        }
        if let Some((rgb, z)) = self.row_mut(y) {
            let x = x as usize;
            rgb[x * 4..x * 4 + 4].copy_from_slice(&colour.to_le_bytes());
            z[x] = depth;
        }
    }

    /// Packed BGRA at (x, y)
    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = y as usize * self.rgb_pitch + x as usize * RGB_BYTES_PER_PIXEL;
        let b = self.rgb.get(offset..offset + 4)?;
        Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn depth(&self, x: u32, y: u32) -> Option<u16> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.z.get(y as usize * self.width as usize + x as usize).copied()
    }
}

/// Owned colour and depth buffers sized for one screen
#[derive(Debug, Clone)]
pub struct FrameBuffers {
    width: u32,
    height: u32,
    rgb: Vec<u8>,
    z: Vec<u16>,
}

impl FrameBuffers {
    pub fn new(width: u32, height: u32) -> Self {
        let pixels = width as usize * height as usize;
        Self {
            width,
            height,
            rgb: vec![0; pixels * RGB_BYTES_PER_PIXEL],
            z: vec![Z_CLEAR; pixels],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> u32 {
        self.width * RGB_BYTES_PER_PIXEL as u32
    }

    /// Device description borrowing both buffers
    pub fn device(&mut self) -> RenderDeviceDesc<'_> {
        RenderDeviceDesc {
            width: self.width,
            height: self.height,
            stride: self.stride(),
            rgb: &mut self.rgb,
            z: &mut self.z,
        }
    }

    /// Colour to zero, depth to [`Z_CLEAR`]
    pub fn clear(&mut self) {
        self.rgb.fill(0);
        self.z.fill(Z_CLEAR);
    }

    /// Fill the colour buffer with one BGRA value
    pub fn fill(&mut self, colour: u32) {
        let bytes = colour.to_le_bytes();
        for px in self.rgb.chunks_exact_mut(RGB_BYTES_PER_PIXEL) {
            px.copy_from_slice(&bytes);
        }
    }

    pub fn rgb(&self) -> &[u8] {
        &self.rgb
    }

    pub fn z(&self) -> &[u16] {
        &self.z
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * RGB_BYTES_PER_PIXEL;
        let b = self.rgb.get(offset..offset + 4)?;
        Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn depth(&self, x: u32, y: u32) -> Option<u16> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.z.get(y as usize * self.width as usize + x as usize).copied()
    }

    /// Convert to an ARGB frame for presentation
    pub fn to_frame(&self) -> Frame {
        let mut frame = Frame::new(self.width, self.height);
        for (dst, px) in frame
            .pixels
            .iter_mut()
            .zip(self.rgb.chunks_exact(RGB_BYTES_PER_PIXEL))
        {
            *dst = ColorOps::bgra_to_argb([px[0], px[1], px[2], px[3]]);
        }
        frame
    }
}
