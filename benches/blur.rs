use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use filtergraph::bench_only::{
    Context, FilterResult, IPoint, IRect, LayerSpace, Pixel, SharedImageSurface, Stats,
};
use filtergraph::color::{ColorSpace, ColorType};
use filtergraph::image_filters;
use filtergraph::{Mapping, RasterBackend, Session};

const SURFACE_SIDE: i32 = 256;

fn input_surface() -> SharedImageSurface {
    let pixels = (0..SURFACE_SIDE)
        .flat_map(|y| {
            (0..SURFACE_SIDE).map(move |x| {
                let a = if (x / 16 + y / 16) % 2 == 0 { 255 } else { 0 };
                Pixel::new(a, a, a, a)
            })
        })
        .collect();

    SharedImageSurface::from_pixels(
        SURFACE_SIDE,
        SURFACE_SIDE,
        pixels,
        ColorType::Rgba8888,
        Some(ColorSpace::Srgb),
    )
    .unwrap()
}

fn bench_blur(c: &mut Criterion) {
    let mut group = c.benchmark_group("gaussian_blur");

    let session = Session::new_for_test_suite();
    let stats = Stats::new();
    let source = FilterResult::new(input_surface(), LayerSpace::new(IPoint::new(0, 0)));

    for sigma in [1.0, 4.0, 10.0].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(sigma), sigma, |b, &sigma| {
            let filter = image_filters::blur(sigma, sigma, None, None).unwrap();

            let ctx = Context::new(
                &RasterBackend,
                &session,
                &stats,
                Mapping::default(),
                LayerSpace::new(IRect::new(0, 0, SURFACE_SIDE, SURFACE_SIDE)),
                source.clone(),
                ColorType::Rgba8888,
                Some(ColorSpace::Srgb),
            );

            b.iter(|| black_box(filter.filter_image(&ctx)))
        });
    }
}

criterion_group!(benches, bench_blur);
criterion_main!(benches);
