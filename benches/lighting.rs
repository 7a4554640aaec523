use criterion::{criterion_group, criterion_main, Criterion};
use nalgebra::Vector3;
use std::hint::black_box;

use filtergraph::bench_only::{
    Context, FilterResult, IPoint, IRect, LayerSpace, Pixel, SharedImageSurface, Stats,
};
use filtergraph::color::{Color, ColorSpace, ColorType};
use filtergraph::image_filters;
use filtergraph::{FilterRef, Mapping, RasterBackend, Session};

const SURFACE_SIDE: i32 = 256;

fn bump_map() -> SharedImageSurface {
    let pixels = (0..SURFACE_SIDE)
        .flat_map(|y| {
            (0..SURFACE_SIDE).map(move |x| {
                let a = ((x * y) % 256) as u8;
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

fn run(c: &mut Criterion, name: &str, filter: FilterRef) {
    let session = Session::new_for_test_suite();
    let stats = Stats::new();

    let ctx = Context::new(
        &RasterBackend,
        &session,
        &stats,
        Mapping::default(),
        LayerSpace::new(IRect::new(0, 0, SURFACE_SIDE, SURFACE_SIDE)),
        FilterResult::new(bump_map(), LayerSpace::new(IPoint::new(0, 0))),
        ColorType::Rgba8888,
        Some(ColorSpace::Srgb),
    );

    c.bench_function(name, |b| b.iter(|| black_box(filter.filter_image(&ctx))));
}

fn bench_lighting(c: &mut Criterion) {
    let white = Color::new(1.0, 1.0, 1.0, 1.0);

    run(
        c,
        "distant diffuse",
        image_filters::distant_lit_diffuse(Vector3::new(1.0, 1.0, 1.0), white, 2.0, 1.0, None, None)
            .unwrap(),
    );

    run(
        c,
        "spot specular",
        image_filters::spot_lit_specular(
            Vector3::new(128.0, 128.0, 100.0),
            Vector3::new(128.0, 128.0, 0.0),
            2.0,
            30.0,
            white,
            2.0,
            1.0,
            16.0,
            None,
            None,
        )
        .unwrap(),
    );
}

criterion_group!(benches, bench_lighting);
criterion_main!(benches);
