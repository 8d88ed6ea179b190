//! 16.16 fixed-point helpers
//!
//! Screen positions, texel coordinates and interpolated colour channels are
//! all carried as `i32` with 16 integer and 16 fractional bits. Intermediate
//! products are widened to `i64` so edge setup never overflows.

/// Number of fractional bits
pub const FIXED_SHIFT: u32 = 16;

/// 1.0 in 16.16
pub const FIXED_ONE: i32 = 1 << FIXED_SHIFT;

/// Added before a right shift to turn truncation into ceiling
pub const FIXED_ROUND_BIAS: i32 = FIXED_ONE - 1;

/// 16.16 fixed-point operations
pub struct Fixed16;

impl Fixed16 {
    /// Integer to 16.16
    #[inline]
    pub fn from_int(v: i32) -> i32 {
        v.wrapping_shl(FIXED_SHIFT)
    }

    /// Integer to 16.16, clamped to the representable range `-32768..=32767`
    #[inline]
    pub fn from_int_saturating(v: i32) -> i32 {
        v.clamp(i16::MIN as i32, i16::MAX as i32) << FIXED_SHIFT
    }

    /// Largest integer not above `v`
    #[inline]
    pub fn floor(v: i32) -> i32 {
        v >> FIXED_SHIFT
    }

    /// Smallest integer not below `v`
    ///
    /// ```
    /// use rev_core::graphics::Fixed16;
    ///
    /// assert_eq!(Fixed16::ceil(Fixed16::from_int(3)), 3);
    /// assert_eq!(Fixed16::ceil(Fixed16::from_int(3) + 1), 4);
    /// ```
    #[inline]
    pub fn ceil(v: i32) -> i32 {
        ((v as i64 + FIXED_ROUND_BIAS as i64) >> FIXED_SHIFT) as i32
    }

    /// `num / den` as a 16.16 fraction; a zero denominator yields 1.0
    #[inline]
    pub fn ratio(num: i64, den: i64) -> i32 {
        if den == 0 {
            return FIXED_ONE;
        }
        ((num << FIXED_SHIFT) / den) as i32
    }

    /// `a + (b - a) * t` with `t` in 16.16
    #[inline]
    pub fn lerp(a: i32, b: i32, t: i32) -> i32 {
        let delta = (b as i64 - a as i64) * t as i64;
        (a as i64 + (delta >> FIXED_SHIFT)) as i32
    }

    #[inline]
    pub fn to_f64(v: i32) -> f64 {
        v as f64 / FIXED_ONE as f64
    }
}
