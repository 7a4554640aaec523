//! Properties that every filter graph must satisfy, checked through the public API.

mod common;

use nalgebra::Vector3;
use proptest::prelude::*;

use filtergraph::blender::BlendMode;
use filtergraph::color::Color;
use filtergraph::effect::{EffectBuilder, EffectDescription, RuntimeEffect};
use filtergraph::filters::displacement_map::ColorChannel;
use filtergraph::filters::result::FilterResult;
use filtergraph::filters::FilterRef;
use filtergraph::image_filters;
use filtergraph::mapping::Mapping;
use filtergraph::point::{IPoint, ISize, Point};
use filtergraph::rect::{IRect, Rect};
use filtergraph::shader::SamplingOptions;
use filtergraph::space::LayerSpace;
use filtergraph::surface_utils::EdgeMode;
use filtergraph::transform::Transform;

use crate::common::{assert_same_pixels, gradient, placed, Env, Recorder};

fn blur_like_builder() -> EffectBuilder {
    let effect = RuntimeEffect::compile(
        EffectDescription::new("average", |args, p| {
            let a = args.child(0, Point::new(p.x - 1.5, p.y));
            let b = args.child(0, Point::new(p.x + 1.5, p.y));
            Color::new(
                (a.r + b.r) / 2.0,
                (a.g + b.g) / 2.0,
                (a.b + b.b) / 2.0,
                (a.a + b.a) / 2.0,
            )
        })
        .child("input"),
    )
    .unwrap();

    EffectBuilder::new(effect)
}

/// One graph of each kind, each reading the source through `p`.
fn graphs(p: &FilterRef) -> Vec<(&'static str, FilterRef)> {
    let shifted = || image_filters::offset(3.0, -2.0, Some(p.clone()), None).unwrap();

    vec![
        (
            "crop",
            image_filters::crop(Rect::new(2.0, 3.0, 20.0, 18.0), Some(p.clone())).unwrap(),
        ),
        (
            "merge",
            image_filters::merge(vec![Some(p.clone()), Some(shifted())], None).unwrap(),
        ),
        (
            "transform",
            image_filters::matrix_transform(
                Transform::new_scale(1.5, 0.75).pre_translate(2.0, 1.0),
                SamplingOptions::Linear,
                Some(p.clone()),
            )
            .unwrap(),
        ),
        (
            "cubic transform",
            image_filters::matrix_transform(
                Transform::new_rotate(0.3),
                SamplingOptions::MITCHELL,
                Some(p.clone()),
            )
            .unwrap(),
        ),
        (
            "blend",
            image_filters::blend(BlendMode::SrcOver, Some(p.clone()), Some(shifted()), None)
                .unwrap(),
        ),
        (
            "arithmetic",
            image_filters::arithmetic(
                0.5,
                0.25,
                0.25,
                0.0,
                true,
                Some(p.clone()),
                Some(shifted()),
                None,
            )
            .unwrap(),
        ),
        (
            "blur",
            image_filters::blur(1.5, 0.75, Some(p.clone()), None).unwrap(),
        ),
        (
            "convolution",
            image_filters::matrix_convolution(
                ISize::new(3, 2),
                &[1.0, 0.0, -1.0, 0.5, 0.0, 0.5],
                1.0,
                0.0,
                IPoint::new(2, 0),
                EdgeMode::None,
                true,
                Some(p.clone()),
                None,
            )
            .unwrap(),
        ),
        (
            "clamped convolution",
            image_filters::matrix_convolution(
                ISize::new(3, 3),
                &[1.0 / 9.0; 9],
                1.0,
                0.0,
                IPoint::new(1, 1),
                EdgeMode::Duplicate,
                false,
                Some(p.clone()),
                None,
            )
            .unwrap(),
        ),
        (
            "displacement",
            image_filters::displacement_map(
                ColorChannel::R,
                ColorChannel::G,
                6.0,
                Some(p.clone()),
                Some(shifted()),
                None,
            )
            .unwrap(),
        ),
        (
            "lighting",
            image_filters::point_lit_specular(
                Vector3::new(10.0, 10.0, 20.0),
                Color::new(1.0, 1.0, 1.0, 1.0),
                2.0,
                1.0,
                8.0,
                Some(p.clone()),
                None,
            )
            .unwrap(),
        ),
        (
            "runtime",
            image_filters::runtime_shader(blur_like_builder(), 1.5, &["input"], vec![Some(
                p.clone(),
            )])
            .unwrap(),
        ),
        (
            "compose",
            image_filters::compose(
                Some(image_filters::crop(Rect::new(0.0, 0.0, 12.0, 12.0), None).unwrap()),
                Some(shifted()),
            )
            .unwrap(),
        ),
    ]
}

/// Every request that reaches the leaf lies inside what the root declared it needs.
fn check_requests_are_declared(desired: IRect) {
    let env = Env::new();

    let count = graphs(&Recorder::new().as_filter()).len();

    for i in 0..count {
        // A fresh recorder per graph, so its requests come from that graph alone.
        let recorder = Recorder::new();
        let (name, filter) = graphs(&recorder.as_filter()).into_iter().nth(i).unwrap();

        let ctx = env.context(desired, placed(gradient(24, 24), 0, 0));
        filter.filter_image(&ctx);

        let declared =
            filter.get_input_layer_bounds(&Mapping::default(), LayerSpace::new(desired), None);

        for request in recorder.requests() {
            assert!(
                declared.get().contains_rect(&request),
                "{}: asked for {:?} but declared {:?}",
                name,
                request,
                declared.get()
            );
        }
    }
}

#[test]
fn requests_stay_inside_declared_input_bounds() {
    check_requests_are_declared(IRect::new(0, 0, 16, 16));
    check_requests_are_declared(IRect::new(-5, 4, 9, 30));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn convolution_requests_stay_inside_declared_bounds(
        x in -10i32..10,
        y in -10i32..10,
        w in 1i32..30,
        h in 1i32..30,
        kw in 1i32..5,
        kh in 1i32..5,
        duplicate in any::<bool>(),
    ) {
        let env = Env::new();
        let recorder = Recorder::new();
        let kernel = vec![1.0; (kw * kh) as usize];
        let edge_mode = if duplicate { EdgeMode::Duplicate } else { EdgeMode::None };

        let filter = image_filters::matrix_convolution(
            ISize::new(kw, kh),
            &kernel,
            1.0 / (kw * kh) as f32,
            0.0,
            IPoint::new(kw / 2, kh / 2),
            edge_mode,
            true,
            Some(recorder.as_filter()),
            None,
        )
        .unwrap();

        let desired = IRect::new(x, y, x + w, y + h);
        let ctx = env.context(desired, placed(gradient(20, 20), 0, 0));
        filter.filter_image(&ctx);

        let declared =
            filter.get_input_layer_bounds(&Mapping::default(), LayerSpace::new(desired), None);

        for request in recorder.requests() {
            prop_assert!(declared.get().contains_rect(&request));
        }
    }
}

#[test]
fn output_never_exceeds_declared_output_bounds() {
    let env = Env::new();
    let content = LayerSpace::new(IRect::new(0, 0, 24, 24));
    let desired = IRect::new(-20, -20, 50, 50);

    for (name, filter) in graphs(&Recorder::new().as_filter()) {
        let ctx = env.context(desired, placed(gradient(24, 24), 0, 0));
        let out = filter.filter_image(&ctx);

        if out.is_empty() {
            continue;
        }

        if let Some(bounds) = filter.get_output_layer_bounds(&Mapping::default(), Some(content)) {
            assert!(
                bounds.contains(&out.layer_bounds()),
                "{}: produced {:?} outside {:?}",
                name,
                out.layer_bounds().get(),
                bounds.get()
            );
        }
    }
}

#[test]
fn resolve_is_idempotent() {
    let env = Env::new();
    let ctx = env.context(IRect::new(-8, -8, 40, 40), FilterResult::empty());

    let scaled = placed(gradient(16, 16), 1, 2).apply_transform(
        &ctx,
        &LayerSpace::new(Transform::new_scale(1.5, 1.5)),
        SamplingOptions::Linear,
    );

    let bounds = LayerSpace::new(IRect::new(0, 0, 30, 30));
    let once = scaled.resolve(&ctx, bounds);
    let twice = once.resolve(&ctx, bounds);

    assert_same_pixels(&ctx, &once, &twice);
    assert!(once.image().unwrap().shares_pixels_with(twice.image().unwrap()));
}

#[test]
fn transparent_black_stays_transparent() {
    let env = Env::new();
    let ctx = env.context(IRect::new(0, 0, 32, 32), FilterResult::empty());

    for (name, filter) in graphs(&Recorder::new().as_filter()) {
        if filter.affects_transparent_black() {
            continue;
        }

        assert!(
            filter.filter_image(&ctx).is_empty(),
            "{} turned transparent black into pixels",
            name
        );
    }
}

#[test]
fn integer_translation_does_not_copy() {
    let env = Env::new();
    let ctx = env.context(IRect::new(0, 0, 32, 32), FilterResult::empty());
    let image = gradient(16, 16);

    let moved = placed(image.clone(), 0, 0).apply_transform(
        &ctx,
        &LayerSpace::new(Transform::new_translate(3.0, 4.0)),
        SamplingOptions::Linear,
    );
    let resolved = moved.resolve(&ctx, LayerSpace::new(IRect::new(5, 6, 12, 14)));

    assert_eq!(resolved.layer_bounds().get(), IRect::new(5, 6, 12, 14));
    assert!(resolved.image().unwrap().shares_pixels_with(&image));
    assert_eq!(env.backend.surfaces(), 0);
}

#[test]
fn compatible_transforms_are_drawn_once() {
    let env = Env::new();
    let ctx = env.context(IRect::new(-64, -64, 64, 64), FilterResult::empty());

    let r = placed(gradient(16, 16), 0, 0)
        .apply_transform(
            &ctx,
            &LayerSpace::new(Transform::new_scale(1.5, 1.5)),
            SamplingOptions::Linear,
        )
        .apply_transform(
            &ctx,
            &LayerSpace::new(Transform::new_translate(0.5, 0.25)),
            SamplingOptions::Linear,
        );

    assert_eq!(env.backend.surfaces(), 0);

    let resolved = r.resolve(&ctx, ctx.desired_output());
    assert!(!resolved.is_empty());
    assert_eq!(env.backend.surfaces(), 1);
}

#[test]
fn crop_containing_the_image_keeps_it() {
    let env = Env::new();
    let ctx = env.context(IRect::new(-10, -10, 40, 40), FilterResult::empty());
    let image = gradient(16, 16);

    let cropped = placed(image.clone(), 2, 2)
        .apply_crop(&ctx, LayerSpace::new(IRect::new(-5, -5, 30, 30)));

    assert_eq!(cropped.layer_bounds().get(), IRect::new(2, 2, 18, 18));
    assert!(cropped.image().unwrap().shares_pixels_with(&image));
    assert_eq!(env.backend.surfaces(), 0);
}

#[test]
fn disjoint_crop_is_empty() {
    let env = Env::new();
    let ctx = env.context(IRect::new(0, 0, 32, 32), placed(gradient(8, 8), 0, 0));

    let cropped = placed(gradient(8, 8), 20, 20)
        .apply_crop(&ctx, LayerSpace::new(IRect::new(0, 0, 10, 10)));
    assert!(cropped.is_empty());
    assert!(cropped.image().is_none());

    let filter = image_filters::crop(Rect::new(10.0, 10.0, 20.0, 20.0), None).unwrap();
    let out = filter.filter_image(&ctx);
    assert!(out.is_empty());
    assert!(out.image().is_none());
}
