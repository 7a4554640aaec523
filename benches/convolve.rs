use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use filtergraph::bench_only::{
    Context, FilterResult, IPoint, IRect, ISize, LayerSpace, Pixel, SharedImageSurface, Stats,
};
use filtergraph::color::{ColorSpace, ColorType};
use filtergraph::image_filters;
use filtergraph::surface_utils::EdgeMode;
use filtergraph::{Mapping, RasterBackend, Session};

const SURFACE_SIDE: i32 = 256;

fn input_surface() -> SharedImageSurface {
    let pixels = (0..SURFACE_SIDE)
        .flat_map(|y| {
            (0..SURFACE_SIDE).map(move |x| Pixel::new((x % 256) as u8, (y % 256) as u8, 64, 255))
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

fn bench_convolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("matrix_convolution");

    let session = Session::new_for_test_suite();
    let stats = Stats::new();
    let source = FilterResult::new(input_surface(), LayerSpace::new(IPoint::new(0, 0)));

    // Small kernels go into uniforms; the larger ones are read from a kernel texture.
    for side in [3, 5, 9].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(side), side, |b, &side| {
            let kernel = vec![1.0; (side * side) as usize];
            let filter = image_filters::matrix_convolution(
                ISize::new(side, side),
                &kernel,
                1.0 / (side * side) as f32,
                0.0,
                IPoint::new(side / 2, side / 2),
                EdgeMode::Duplicate,
                false,
                None,
                None,
            )
            .unwrap();

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

criterion_group!(benches, bench_convolve);
criterion_main!(benches);
