//! Helpers shared by the unit tests of the filter modules.

use crate::backend::RasterBackend;
use crate::color::{ColorSpace, ColorType};
use crate::mapping::Mapping;
use crate::rect::IRect;
use crate::session::Session;
use crate::space::LayerSpace;
use crate::surface_utils::shared_surface::SharedImageSurface;
use crate::surface_utils::Pixel;

use super::context::{Context, Stats};
use super::result::FilterResult;

pub struct TestEnv {
    pub session: Session,
    pub stats: Stats,
    pub backend: RasterBackend,
}

impl TestEnv {
    pub fn new() -> TestEnv {
        TestEnv {
            session: Session::new_for_test_suite(),
            stats: Stats::new(),
            backend: RasterBackend,
        }
    }

    pub fn context(&self, desired: IRect) -> Context<'_> {
        self.context_with_source(desired, FilterResult::empty())
    }

    pub fn context_with_source(&self, desired: IRect, source: FilterResult) -> Context<'_> {
        Context::new(
            &self.backend,
            &self.session,
            &self.stats,
            Mapping::default(),
            LayerSpace::new(desired),
            source,
            ColorType::Rgba8888,
            Some(ColorSpace::Srgb),
        )
    }
}

/// An opaque image whose pixels encode their coordinates.
pub fn gradient_image(width: i32, height: i32) -> SharedImageSurface {
    let mut pixels = Vec::new();
    for y in 0..height {
        for x in 0..width {
            pixels.push(Pixel::new((x * 7 % 256) as u8, (y * 11 % 256) as u8, 128, 255));
        }
    }

    SharedImageSurface::from_pixels(
        width,
        height,
        pixels,
        ColorType::Rgba8888,
        Some(ColorSpace::Srgb),
    )
    .unwrap()
}

pub fn solid_image(width: i32, height: i32, pixel: Pixel) -> SharedImageSurface {
    SharedImageSurface::from_pixels(
        width,
        height,
        vec![pixel; (width * height) as usize],
        ColorType::Rgba8888,
        Some(ColorSpace::Srgb),
    )
    .unwrap()
}
