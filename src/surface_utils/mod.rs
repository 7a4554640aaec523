//! Raster storage for filter inputs and outputs.

pub mod iterators;
pub mod shared_surface;

/// How a kernel reads pixels that fall outside its input.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum EdgeMode {
    /// The nearest pixel inside the input's bounds.
    Duplicate,
    /// Transparent black.
    None,
}

/// A premultiplied RGBA pixel, 8 bits per channel.
pub type Pixel = rgb::RGBA8;

pub trait PixelOps {
    fn is_transparent(&self) -> bool;

    /// Largest per-channel difference from `other`.
    fn max_diff(&self, other: &Self) -> u8;
}

impl PixelOps for Pixel {
    #[inline]
    fn is_transparent(&self) -> bool {
        self.a == 0 && self.r == 0 && self.g == 0 && self.b == 0
    }

    #[inline]
    fn max_diff(&self, other: &Pixel) -> u8 {
        self.iter()
            .zip(other.iter())
            .map(|(l, r)| l.abs_diff(r))
            .max()
            .unwrap_or(0)
    }
}
