//! Processing limits.

/// Maximum width or height of any intermediate surface.
///
/// A filter graph that would need a larger offscreen buffer degrades to transparent black
/// for the affected subtree.
pub const MAX_SURFACE_DIMENSION: i32 = 32767;

/// Maximum number of elements in a convolution kernel.
pub const MAX_KERNEL_ELEMENTS: usize = 256;

/// Kernels with up to this many elements are passed to the shader as a uniform array.
pub const MAX_UNIFORM_KERNEL_ELEMENTS: usize = 28;

/// Kernels with up to this many elements use the small packed-texture path.
pub const MAX_SMALL_TEXTURE_KERNEL_ELEMENTS: usize = 64;

/// Maximum number of taps in one pass of a gaussian blur.
///
/// Deviations that would need more are clamped.  The value of 500 is used in webkit.
pub const MAX_BLUR_KERNEL_SIZE: usize = 500;

/// Default number of results kept by [`MemoryCache`](crate::filters::cache::MemoryCache).
pub const MAX_CACHE_ENTRIES: usize = 128;
