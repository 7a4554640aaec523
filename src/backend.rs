//! Allocation of offscreen surfaces.
//!
//! Filter evaluation never creates pixel buffers directly; it asks an [`ImageBackend`],
//! which lets callers substitute their own allocator, e.g. to count allocations or to
//! impose tighter size limits.

use crate::color::{ColorSpace, ColorType};
use crate::error::SurfaceError;
use crate::point::ISize;
use crate::surface_utils::shared_surface::ExclusiveImageSurface;

pub trait ImageBackend: Send + Sync {
    /// Creates a transparent surface of the given size.
    ///
    /// Allocation may fail; callers treat failure as producing nothing.
    fn make_surface(
        &self,
        size: ISize,
        color_type: ColorType,
        color_space: Option<ColorSpace>,
    ) -> Result<ExclusiveImageSurface, SurfaceError>;

    /// Whether surfaces from this backend live on a device rather than in memory.
    fn is_texture_backed(&self) -> bool {
        false
    }
}

/// Allocates surfaces in main memory.
#[derive(Debug, Default, Copy, Clone)]
pub struct RasterBackend;

impl ImageBackend for RasterBackend {
    fn make_surface(
        &self,
        size: ISize,
        color_type: ColorType,
        color_space: Option<ColorSpace>,
    ) -> Result<ExclusiveImageSurface, SurfaceError> {
        ExclusiveImageSurface::new(size.width, size.height, color_type, color_space)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raster_surfaces_are_in_memory() {
        let backend = RasterBackend;
        let surface = backend
            .make_surface(ISize::new(3, 2), ColorType::Rgba8888, Some(ColorSpace::Srgb))
            .unwrap();

        assert_eq!((surface.width(), surface.height()), (3, 2));
        assert!(!backend.is_texture_backed());
        assert!(backend
            .make_surface(ISize::new(0, 2), ColorType::Rgba8888, None)
            .is_err());
    }
}
