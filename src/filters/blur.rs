//! Gaussian blur, evaluated as two one-dimensional passes.
//!
//! Each pass reads `radius = ⌈3σ⌉` layer pixels on either side of the output pixel, so
//! the blur grows its input's bounds by that radius and asks its child for the same
//! amount of extra context.  Pixels outside the child's output read as transparent black.

use crate::effect::{self, EffectBuilder, EffectDescription, KnownEffect};
use crate::error::FilterError;
use crate::limits::MAX_BLUR_KERNEL_SIZE;
use crate::mapping::{Mapping, MatrixCapability};
use crate::point::{ISize, Point, Size};
use crate::rect::IRect;
use crate::shader::{SamplingOptions, Shader};
use crate::space::{LayerSpace, ParameterSpace};

use super::context::Context;
use super::result::{FilterResult, FilterResultBuilder, ShaderFlags};
use super::{FilterBase, FilterRef, ImageFilter};

/// Largest number of taps on one side of the center.
const MAX_RADIUS: usize = (MAX_BLUR_KERNEL_SIZE - 1) / 2;

// Uniform indices, in declaration order.
const STEP: usize = 0;
const RADIUS: usize = 1;
const WEIGHTS: usize = 2;

pub(crate) fn effect_description() -> EffectDescription {
    EffectDescription::new("gaussian_blur", |args, p| {
        let step = args.uniform(STEP);
        let radius = args.float(RADIUS) as usize;
        let weights = args.uniform(WEIGHTS);

        let tap = |d: f64| {
            args.child(
                0,
                Point::new(p.x + d * f64::from(step[0]), p.y + d * f64::from(step[1])),
            )
        };

        let mut sum = tap(0.0).scale(weights[0]);
        for (i, w) in weights.iter().enumerate().take(radius + 1).skip(1) {
            let d = i as f64;
            sum = sum + (tap(-d) + tap(d)).scale(*w);
        }

        sum.clamp_premultiplied()
    })
    .uniform("step", 2)
    .uniform("radius", 1)
    .uniform("weights", MAX_RADIUS + 1)
    .child("input")
}

/// Weights of the taps `0..=radius` of a normalized gaussian.
///
/// Each weight is the mean of the gaussian over the width of its pixel, so that small
/// deviations don't collapse into a single tap.
fn gaussian_weights(sigma: f64, radius: usize) -> Vec<f32> {
    let gauss = |x: f64| (-x * x / (2.0 * sigma * sigma)).exp();

    let weights: Vec<f64> = (0..=radius)
        .map(|i| {
            let left = i as f64 - 0.5;
            (0..50)
                .map(|j| gauss(left + 0.02 * (f64::from(j) + 0.5)))
                .sum::<f64>()
                / 50.0
        })
        .collect();

    let total = weights[0] + 2.0 * weights[1..].iter().sum::<f64>();
    weights.iter().map(|w| (w / total) as f32).collect()
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Axis {
    Horizontal,
    Vertical,
}

impl Axis {
    fn step(self) -> [f32; 2] {
        match self {
            Axis::Horizontal => [1.0, 0.0],
            Axis::Vertical => [0.0, 1.0],
        }
    }

    fn outset(self, radius: i32) -> LayerSpace<ISize> {
        LayerSpace::new(match self {
            Axis::Horizontal => ISize::new(radius, 0),
            Axis::Vertical => ISize::new(0, radius),
        })
    }
}

/// Blurs its input with standard deviations given in parameter space.
#[derive(Debug)]
pub struct Blur {
    base: FilterBase,
    sigma_x: f64,
    sigma_y: f64,
}

impl Blur {
    pub fn new(sigma_x: f64, sigma_y: f64, input: Option<FilterRef>) -> Result<Blur, FilterError> {
        if !(sigma_x.is_finite() && sigma_y.is_finite()) || sigma_x < 0.0 || sigma_y < 0.0 {
            return Err(FilterError::invalid(
                "blur deviations must be finite and non-negative",
            ));
        }

        Ok(Blur {
            base: FilterBase::new(vec![input]),
            sigma_x,
            sigma_y,
        })
    }

    /// The deviations in layer pixels, limited to what the kernel can hold.
    fn layer_sigma(&self, mapping: &Mapping) -> Size {
        let max = MAX_RADIUS as f64 / 3.0;
        let s = mapping
            .param_to_layer(ParameterSpace::new(Size::new(self.sigma_x, self.sigma_y)))
            .get();

        Size::new(s.width.min(max), s.height.min(max))
    }

    fn radius(sigma: Size) -> LayerSpace<ISize> {
        LayerSpace::new(Size::new(3.0 * sigma.width, 3.0 * sigma.height).ceil())
    }

    fn make_shader(axis: Axis, sigma: f64, radius: i32, input: Option<Shader>) -> Option<Shader> {
        let r = radius as usize;
        let mut weights = vec![0.0; MAX_RADIUS + 1];
        for (w, g) in weights.iter_mut().zip(gaussian_weights(sigma, r)) {
            *w = g;
        }

        let mut builder = EffectBuilder::new(effect::effect_for(KnownEffect::GaussianBlur));
        builder
            .uniform("step", &axis.step())
            .ok()?
            .uniform("radius", &[r as f32])
            .ok()?
            .uniform("weights", &weights)
            .ok()?
            .child("input", input)
            .ok()?;

        builder.make_shader().ok()
    }

    /// One pass over `input`, producing `output`.
    fn pass(
        ctx: &Context<'_>,
        input: FilterResult,
        output: LayerSpace<IRect>,
        axis: Axis,
        sigma: f64,
        radius: i32,
    ) -> FilterResult {
        let ctx = ctx.with_new_desired_output(output);

        let mut builder = FilterResultBuilder::new(&ctx);
        builder.add(
            input,
            Some(output.outset(axis.outset(radius))),
            ShaderFlags::SAMPLED_REPEATEDLY,
            SamplingOptions::Nearest,
        );

        builder.eval(
            |inputs| Self::make_shader(axis, sigma, radius, inputs[0].clone()),
            Some(output),
            false,
        )
    }
}

impl ImageFilter for Blur {
    fn base(&self) -> &FilterBase {
        &self.base
    }

    fn on_filter_image(&self, ctx: &Context<'_>) -> FilterResult {
        let sigma = self.layer_sigma(ctx.mapping());
        let radius = Self::radius(sigma);
        let (rx, ry) = (radius.get().width, radius.get().height);

        if rx == 0 && ry == 0 {
            return self
                .base
                .child_output(0, ctx)
                .apply_crop(ctx, ctx.desired_output());
        }

        let required = ctx.desired_output().outset(radius);
        let child = self
            .base
            .child_output(0, &ctx.with_new_desired_output(required));
        if child.is_empty() {
            return FilterResult::empty();
        }

        let output = match child
            .layer_bounds()
            .outset(radius)
            .intersect(&ctx.desired_output())
        {
            Some(o) => o,
            None => return FilterResult::empty(),
        };

        let horizontal = if rx > 0 {
            // Rows above and below the output feed the vertical pass.
            let rows = child
                .layer_bounds()
                .outset(Axis::Horizontal.outset(rx))
                .intersect(&output.outset(Axis::Vertical.outset(ry)));

            match rows {
                Some(rows) => Self::pass(ctx, child, rows, Axis::Horizontal, sigma.width, rx),
                None => return FilterResult::empty(),
            }
        } else {
            child
        };

        if ry > 0 {
            Self::pass(ctx, horizontal, output, Axis::Vertical, sigma.height, ry)
        } else {
            horizontal.apply_crop(ctx, output)
        }
    }

    fn on_get_input_layer_bounds(
        &self,
        mapping: &Mapping,
        desired: LayerSpace<IRect>,
        content: Option<LayerSpace<IRect>>,
    ) -> LayerSpace<IRect> {
        let radius = Self::radius(self.layer_sigma(mapping));
        self.base
            .child_input_layer_bounds(0, mapping, desired.outset(radius), content)
    }

    fn on_get_output_layer_bounds(
        &self,
        mapping: &Mapping,
        content: Option<LayerSpace<IRect>>,
    ) -> Option<LayerSpace<IRect>> {
        let radius = Self::radius(self.layer_sigma(mapping));
        self.base
            .child_output_layer_bounds(0, mapping, content)
            .map(|b| b.outset(radius))
    }

    fn on_get_ctm_capability(&self) -> MatrixCapability {
        MatrixCapability::ScaleTranslate
    }
}
