//! Numeric and colour helpers shared by the rasterizer and its front ends.

pub mod color;
pub mod fixed;

pub use color::ColorOps;
pub use fixed::{Fixed16, FIXED_ONE, FIXED_ROUND_BIAS, FIXED_SHIFT};
