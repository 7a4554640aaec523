//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use filtergraph::color::{ColorSpace, ColorType};
use filtergraph::filters::context::{Context, Stats};
use filtergraph::filters::result::FilterResult;
use filtergraph::filters::{FilterBase, FilterRef, ImageFilter};
use filtergraph::mapping::Mapping;
use filtergraph::point::{IPoint, ISize};
use filtergraph::rect::IRect;
use filtergraph::space::LayerSpace;
use filtergraph::surface_utils::shared_surface::{ExclusiveImageSurface, SharedImageSurface};
use filtergraph::surface_utils::Pixel;
use filtergraph::{ImageBackend, RasterBackend, Session, SurfaceError};

/// A raster backend that counts the surfaces it hands out.
#[derive(Default)]
pub struct CountingBackend {
    surfaces: AtomicUsize,
}

impl CountingBackend {
    pub fn surfaces(&self) -> usize {
        self.surfaces.load(Ordering::SeqCst)
    }
}

impl ImageBackend for CountingBackend {
    fn make_surface(
        &self,
        size: ISize,
        color_type: ColorType,
        color_space: Option<ColorSpace>,
    ) -> Result<ExclusiveImageSurface, SurfaceError> {
        self.surfaces.fetch_add(1, Ordering::SeqCst);
        RasterBackend.make_surface(size, color_type, color_space)
    }
}

/// Everything a [`Context`] borrows.
pub struct Env {
    pub backend: CountingBackend,
    pub session: Session,
    pub stats: Stats,
}

impl Env {
    pub fn new() -> Env {
        Env {
            backend: CountingBackend::default(),
            session: Session::new_for_test_suite(),
            stats: Stats::new(),
        }
    }

    pub fn context(&self, desired: IRect, source: FilterResult) -> Context<'_> {
        self.context_with_mapping(Mapping::default(), desired, source)
    }

    pub fn context_with_mapping(
        &self,
        mapping: Mapping,
        desired: IRect,
        source: FilterResult,
    ) -> Context<'_> {
        Context::new(
            &self.backend,
            &self.session,
            &self.stats,
            mapping,
            LayerSpace::new(desired),
            source,
            ColorType::Rgba8888,
            Some(ColorSpace::Srgb),
        )
    }
}

pub fn gradient(width: i32, height: i32) -> SharedImageSurface {
    let pixels = (0..height)
        .flat_map(|y| {
            (0..width).map(move |x| Pixel::new((x * 7 % 256) as u8, (y * 11 % 256) as u8, 128, 255))
        })
        .collect();

    SharedImageSurface::from_pixels(width, height, pixels, ColorType::Rgba8888, Some(ColorSpace::Srgb))
        .unwrap()
}

pub fn solid(width: i32, height: i32, pixel: Pixel) -> SharedImageSurface {
    let pixels = vec![pixel; (width * height) as usize];

    SharedImageSurface::from_pixels(width, height, pixels, ColorType::Rgba8888, Some(ColorSpace::Srgb))
        .unwrap()
}

/// `image` placed with its top-left corner at `(x, y)` in layer space.
pub fn placed(image: SharedImageSurface, x: i32, y: i32) -> FilterResult {
    FilterResult::new(image, LayerSpace::new(IPoint::new(x, y)))
}

/// Reads the pixel of `result` at layer coordinates `(x, y)`.
pub fn pixel_at(result: &FilterResult, x: i32, y: i32) -> Pixel {
    let origin = result.layer_bounds().top_left();
    let image = result.image().unwrap();

    image.get_pixel((x - origin.x()) as u32, (y - origin.y()) as u32)
}

/// Asserts that two results cover the same layer area with the same pixels.
pub fn assert_same_pixels(ctx: &Context<'_>, a: &FilterResult, b: &FilterResult) {
    let a = a.resolve(ctx, ctx.desired_output());
    let b = b.resolve(ctx, ctx.desired_output());

    assert_eq!(a.layer_bounds(), b.layer_bounds());
    if a.is_empty() {
        return;
    }

    let bounds = a.layer_bounds().get();
    for y in bounds.y0..bounds.y1 {
        for x in bounds.x0..bounds.x1 {
            assert_eq!(pixel_at(&a, x, y), pixel_at(&b, x, y), "at ({}, {})", x, y);
        }
    }
}

/// A leaf that passes the source through and remembers what it was asked for.
#[derive(Debug)]
pub struct Recorder {
    base: FilterBase,
    requests: Mutex<Vec<IRect>>,
}

impl Recorder {
    pub fn new() -> Arc<Recorder> {
        Arc::new(Recorder {
            base: FilterBase::new(vec![]),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<IRect> {
        self.requests.lock().unwrap().clone()
    }

    pub fn as_filter(self: &Arc<Self>) -> FilterRef {
        self.clone()
    }
}

impl ImageFilter for Recorder {
    fn base(&self) -> &FilterBase {
        &self.base
    }

    fn on_filter_image(&self, ctx: &Context<'_>) -> FilterResult {
        self.requests.lock().unwrap().push(ctx.desired_output().get());
        ctx.source().apply_crop(ctx, ctx.desired_output())
    }

    fn on_get_input_layer_bounds(
        &self,
        _mapping: &Mapping,
        desired: LayerSpace<IRect>,
        _content: Option<LayerSpace<IRect>>,
    ) -> LayerSpace<IRect> {
        desired
    }

    fn on_get_output_layer_bounds(
        &self,
        _mapping: &Mapping,
        content: Option<LayerSpace<IRect>>,
    ) -> Option<LayerSpace<IRect>> {
        content
    }
}
