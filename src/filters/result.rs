//! Lazy filter results.
//!
//! A [`FilterResult`] is an image together with the transform that places it in layer
//! space, the sampling used to apply that transform, and the layer-space rectangle outside
//! of which the result is transparent.  Transforms and crops accumulate on the handle
//! without touching pixels; pixels are only produced when [`FilterResult::resolve`] is
//! called, or when an accumulated state can't be combined with the next operation.

use bitflags::bitflags;

use crate::color::ColorSpace;
use crate::point::IPoint;
use crate::rect::{IRect, Rect, ROUND_EPSILON};
use crate::shader::{self, SamplingOptions, Shader};
use crate::space::{LayerSpace, ParameterSpace};
use crate::surface_utils::shared_surface::{DrawMode, ExclusiveImageSurface, SharedImageSurface};
use crate::transform::Transform;

use super::context::Context;

bitflags! {
    /// Hints about how a consumer samples an input shader.
    pub struct ShaderFlags: u8 {
        /// Each output pixel reads the input several times.
        const SAMPLED_REPEATEDLY = 1 << 0;

        /// The consumer samples at arbitrary, non-pixel-aligned positions.
        const NON_TRIVIAL_SAMPLING = 1 << 1;

        /// The input is numeric data, not colors; skip color space conversion.
        const RAW = 1 << 2;
    }
}

/// A possibly-deferred image in layer space.
///
/// An absent image is transparent black, and then the layer bounds are always empty.
#[derive(Debug, Clone)]
pub struct FilterResult {
    image: Option<SharedImageSurface>,

    /// Maps the image's pixel coordinates into layer space.
    transform: LayerSpace<Transform>,

    sampling: SamplingOptions,

    /// Outside of this rectangle the result is transparent.
    layer_bounds: LayerSpace<IRect>,
}

impl Default for FilterResult {
    fn default() -> FilterResult {
        FilterResult {
            image: None,
            transform: LayerSpace::identity(),
            sampling: SamplingOptions::default(),
            layer_bounds: LayerSpace::empty(),
        }
    }
}

/// The integer offset of `t`, if it is a translation by nearly whole pixels.
fn integer_translation(t: &LayerSpace<Transform>) -> Option<LayerSpace<IPoint>> {
    const LINEAR_EPSILON: f64 = 1e-6;

    let t = t.get();
    let near = |a: f64, b: f64, eps: f64| (a - b).abs() <= eps;

    if near(t.xx, 1.0, LINEAR_EPSILON)
        && near(t.yy, 1.0, LINEAR_EPSILON)
        && near(t.xy, 0.0, LINEAR_EPSILON)
        && near(t.yx, 0.0, LINEAR_EPSILON)
        && near(t.x0, t.x0.round(), ROUND_EPSILON)
        && near(t.y0, t.y0.round(), ROUND_EPSILON)
    {
        Some(LayerSpace::new(IPoint::new(
            t.x0.round() as i32,
            t.y0.round() as i32,
        )))
    } else {
        None
    }
}

/// The single sampling that is equivalent to applying `current` and then `next`, if any.
///
/// An integer translation doesn't resample, so the other side's sampling wins.
pub(crate) fn compatible_sampling(
    current: SamplingOptions,
    current_is_integer: bool,
    next: SamplingOptions,
    next_is_integer: bool,
) -> Option<SamplingOptions> {
    use SamplingOptions::*;

    if current_is_integer {
        return Some(next);
    }

    if next_is_integer {
        return Some(current);
    }

    match (current, next) {
        (Anisotropic { max_aniso: a }, Anisotropic { max_aniso: b }) => {
            Some(Anisotropic { max_aniso: a.max(b) })
        }

        (Anisotropic { .. }, _) | (_, Anisotropic { .. }) => None,

        (Cubic { .. }, Linear) => Some(current),
        (Cubic { .. }, Cubic { .. }) if current == next => Some(current),
        (Linear, Cubic { .. }) => Some(next),
        (Linear, Linear) => Some(Linear),

        _ => None,
    }
}

impl FilterResult {
    /// An image placed with its top-left corner at `origin`.
    pub fn new(image: SharedImageSurface, origin: LayerSpace<IPoint>) -> FilterResult {
        let bounds = IRect::from_xywh(origin.x(), origin.y(), image.width(), image.height());

        FilterResult {
            image: Some(image),
            transform: LayerSpace::translate(origin),
            sampling: SamplingOptions::default(),
            layer_bounds: LayerSpace::new(bounds),
        }
    }

    /// The transparent black result.
    #[inline]
    pub fn empty() -> FilterResult {
        FilterResult::default()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.image.is_none()
    }

    #[inline]
    pub fn image(&self) -> Option<&SharedImageSurface> {
        self.image.as_ref()
    }

    #[inline]
    pub fn transform(&self) -> LayerSpace<Transform> {
        self.transform
    }

    #[inline]
    pub fn sampling(&self) -> SamplingOptions {
        self.sampling
    }

    #[inline]
    pub fn layer_bounds(&self) -> LayerSpace<IRect> {
        self.layer_bounds
    }

    fn with_layer_bounds(&self, bounds: Option<LayerSpace<IRect>>) -> FilterResult {
        match bounds {
            Some(b) if !b.is_empty() && self.image.is_some() => FilterResult {
                layer_bounds: b,
                ..self.clone()
            },
            _ => FilterResult::empty(),
        }
    }

    /// Places the `src_rect` part of `image` onto `dst_rect` in parameter space.
    pub fn from_image(
        ctx: &Context<'_>,
        image: SharedImageSurface,
        src_rect: Rect,
        dst_rect: ParameterSpace<Rect>,
        sampling: SamplingOptions,
    ) -> FilterResult {
        let src_subset = src_rect.round_out();

        let clipped = match src_subset.intersection(&image.bounds()) {
            Some(r) => r,
            None => return FilterResult::empty(),
        };

        let subset = match image.make_subset(clipped) {
            Some(s) => s,
            None => return FilterResult::empty(),
        };

        let src_to_dst = match Transform::rect_to_rect(&src_rect, dst_rect.inner()) {
            Some(t) => t,
            None => return FilterResult::empty(),
        };

        let subset_to_layer = Transform::new_translate(f64::from(clipped.x0), f64::from(clipped.y0))
            .post_transform(&src_to_dst)
            .post_transform(&ctx.mapping().layer_matrix());

        let result = FilterResult::new(subset, LayerSpace::new(IPoint::new(0, 0))).apply_transform(
            ctx,
            &LayerSpace::new(subset_to_layer),
            sampling,
        );

        if src_rect.round_in() == src_subset {
            result
        } else {
            // Fractional source edges would bleed neighboring pixels into the output.
            let crop = ctx.mapping().param_to_layer(dst_rect).round_out();
            result.apply_crop(ctx, crop)
        }
    }

    /// Restricts the result to `crop`.
    pub fn apply_crop(&self, ctx: &Context<'_>, crop: LayerSpace<IRect>) -> FilterResult {
        if self.image.is_none() {
            return FilterResult::empty();
        }

        let tight = match crop.intersect(&ctx.desired_output()) {
            Some(r) => r,
            None => return FilterResult::empty(),
        };

        if crop.contains(&self.layer_bounds) {
            self.with_layer_bounds(self.layer_bounds.intersect(&ctx.desired_output()))
        } else {
            self.resolve(ctx, tight)
        }
    }

    /// Transforms the result by a layer-space `transform`, sampling with `sampling`.
    ///
    /// When the accumulated sampling and `sampling` combine into one, the transforms are
    /// concatenated without producing pixels; otherwise the current state is resolved first.
    pub fn apply_transform(
        &self,
        ctx: &Context<'_>,
        transform: &LayerSpace<Transform>,
        sampling: SamplingOptions,
    ) -> FilterResult {
        if self.image.is_none() {
            return FilterResult::empty();
        }

        if transform.get() == Transform::identity() {
            return self.clone();
        }

        let current_is_integer = integer_translation(&self.transform).is_some();
        let next_is_integer = integer_translation(transform).is_some();

        let merged = compatible_sampling(self.sampling, current_is_integer, sampling, next_is_integer);

        let base = match merged {
            Some(s) if !self.is_cropped(transform, ctx.desired_output()) => FilterResult {
                sampling: s,
                ..self.clone()
            },

            _ => FilterResult {
                sampling,
                ..self.resolve(ctx, self.layer_bounds)
            },
        };

        base.concat_transform(ctx, transform)
    }

    /// Appends `transform` after the accumulated one, keeping the current sampling.
    pub fn concat_transform(
        &self,
        ctx: &Context<'_>,
        transform: &LayerSpace<Transform>,
    ) -> FilterResult {
        if self.image.is_none() {
            return FilterResult::empty();
        }

        let bounds = transform
            .map_rect(&self.layer_bounds)
            .intersect(&ctx.desired_output());

        match bounds {
            Some(b) => FilterResult {
                image: self.image.clone(),
                transform: self.transform.then(transform),
                sampling: self.sampling,
                layer_bounds: b,
            },
            None => FilterResult::empty(),
        }
    }

    /// Whether the layer bounds cut off part of the image that would be visible in `dst`
    /// after applying `extra`.
    fn is_cropped(&self, extra: &LayerSpace<Transform>, dst: LayerSpace<IRect>) -> bool {
        let image = match self.image {
            Some(ref i) => i,
            None => return false,
        };

        let footprint = self.transform.map_rect(&LayerSpace::new(image.bounds()));
        if self.layer_bounds.contains(&footprint) {
            return false;
        }

        match extra.inverse_map_rect(&dst) {
            Some(d) => !self.layer_bounds.contains(&d),
            None => true,
        }
    }

    /// Produces pixels for `dst_bounds ∩ layer_bounds`, returned with an integer origin.
    pub fn resolve(&self, ctx: &Context<'_>, dst_bounds: LayerSpace<IRect>) -> FilterResult {
        match self.resolve_to(ctx, dst_bounds, false) {
            (Some(image), origin) => FilterResult::new(image, origin),
            (None, _) => FilterResult::empty(),
        }
    }

    /// Like `resolve()`, but with `preserve_dst_bounds` the image covers all of
    /// `dst_bounds`, transparent where the result is.
    pub(crate) fn resolve_to(
        &self,
        ctx: &Context<'_>,
        dst_bounds: LayerSpace<IRect>,
        preserve_dst_bounds: bool,
    ) -> (Option<SharedImageSurface>, LayerSpace<IPoint>) {
        let origin = dst_bounds.top_left();

        let image = match self.image {
            Some(ref i) => i,
            None => return (None, origin),
        };

        let visible = match dst_bounds.intersect(&self.layer_bounds) {
            Some(v) => v,
            None => return (None, origin),
        };

        let bounds = if preserve_dst_bounds {
            dst_bounds
        } else {
            visible
        };

        if let Some(offset) = integer_translation(&self.transform) {
            let footprint = LayerSpace::new(image.bounds()).offset(offset);

            if let Some(covered) = visible.intersect(&footprint) {
                if covered == bounds {
                    let in_image = covered
                        .get()
                        .translate((offset.x().saturating_neg(), offset.y().saturating_neg()));

                    if let Some(subset) = image.make_subset(in_image) {
                        ctx.stats().zero_copy_subset();
                        return (Some(subset), covered.top_left());
                    }
                }
            }
        }

        let origin = bounds.top_left();

        let to_image = match self.transform.invert() {
            Some(t) => t,
            None => return (None, origin),
        };

        let mut surface = match ctx.make_surface(bounds.size()) {
            Some(s) => s,
            None => return (None, origin),
        };

        let clip = visible
            .get()
            .translate((origin.x().saturating_neg(), origin.y().saturating_neg()));
        let s = shader::image(image.clone(), to_image.get(), self.sampling, ctx.color_space());

        surface.draw(&*s, origin.get(), Some(clip), DrawMode::Src);
        ctx.stats().shader_draw();

        (Some(surface.share()), origin)
    }

    /// A shader that reproduces this result in layer space.
    ///
    /// `sampling` is how the consumer samples the shader; `sample_bounds` is the layer-space
    /// area it will read.  Resolves first when the deferred state can't be sampled directly.
    pub fn as_shader(
        &self,
        ctx: &Context<'_>,
        sampling: SamplingOptions,
        flags: ShaderFlags,
        sample_bounds: LayerSpace<IRect>,
    ) -> Option<Shader> {
        self.image.as_ref()?;

        let current_is_integer = integer_translation(&self.transform).is_some();
        let next_is_integer = !flags.contains(ShaderFlags::NON_TRIVIAL_SAMPLING);

        let merged = compatible_sampling(self.sampling, current_is_integer, sampling, next_is_integer);

        let needs_resolve = (flags.contains(ShaderFlags::SAMPLED_REPEATEDLY) && !current_is_integer)
            || merged.is_none()
            || self.is_cropped(&LayerSpace::identity(), sample_bounds);

        let dst_space: Option<ColorSpace> = if flags.contains(ShaderFlags::RAW) {
            None
        } else {
            ctx.color_space()
        };

        if needs_resolve {
            let (image, origin) = self.resolve_to(ctx, sample_bounds, false);
            let to_image = Transform::new_translate(-f64::from(origin.x()), -f64::from(origin.y()));

            image.map(|i| shader::image(i, to_image, sampling, dst_space))
        } else {
            let to_image = self.transform.invert()?;
            let image = self.image.clone()?;

            Some(shader::image(
                image,
                to_image.get(),
                merged.unwrap_or(sampling),
                dst_space,
            ))
        }
    }

    /// Composites this result over `surface`, whose top-left pixel is at `origin`.
    pub(crate) fn draw(
        &self,
        ctx: &Context<'_>,
        surface: &mut ExclusiveImageSurface,
        origin: LayerSpace<IPoint>,
    ) {
        let image = match self.image {
            Some(ref i) => i.clone(),
            None => return,
        };

        let to_image = match self.transform.invert() {
            Some(t) => t,
            None => return,
        };

        let clip = self
            .layer_bounds
            .get()
            .translate((origin.x().saturating_neg(), origin.y().saturating_neg()));

        let s = shader::image(image, to_image.get(), self.sampling, ctx.color_space());
        surface.draw(&*s, origin.get(), Some(clip), DrawMode::SrcOver);
        ctx.stats().shader_draw();
    }
}

struct SampledInput {
    image: FilterResult,
    sample_bounds: Option<LayerSpace<IRect>>,
    flags: ShaderFlags,
    sampling: SamplingOptions,
}

/// Combines several results into one, drawing a single shader over all of them.
pub struct FilterResultBuilder<'c, 'a> {
    ctx: &'c Context<'a>,
    inputs: Vec<SampledInput>,
}

impl<'c, 'a> FilterResultBuilder<'c, 'a> {
    pub fn new(ctx: &'c Context<'a>) -> FilterResultBuilder<'c, 'a> {
        FilterResultBuilder {
            ctx,
            inputs: Vec::new(),
        }
    }

    /// Adds an input; `sample_bounds` defaults to the output bounds of `eval()`.
    pub fn add(
        &mut self,
        image: FilterResult,
        sample_bounds: Option<LayerSpace<IRect>>,
        flags: ShaderFlags,
        sampling: SamplingOptions,
    ) -> &mut Self {
        self.inputs.push(SampledInput {
            image,
            sample_bounds,
            flags,
            sampling,
        });
        self
    }

    /// Builds one shader out of the inputs' shaders with `f` and draws it.
    ///
    /// The output covers `explicit_output ∩ desired output`, or the whole desired output.
    /// With `evaluate_in_parameter_space`, `f` receives and returns shaders that work in
    /// parameter-space coordinates.
    pub fn eval<F>(
        &self,
        f: F,
        explicit_output: Option<LayerSpace<IRect>>,
        evaluate_in_parameter_space: bool,
    ) -> FilterResult
    where
        F: FnOnce(&[Option<Shader>]) -> Option<Shader>,
    {
        let desired = self.ctx.desired_output();

        let output = match explicit_output {
            Some(e) => e.intersect(&desired),
            None => Some(desired).filter(|d| !d.is_empty()),
        };

        let output = match output {
            Some(o) => o,
            None => return FilterResult::empty(),
        };

        let mapping = self.ctx.mapping();

        let shaders: Vec<Option<Shader>> = self
            .inputs
            .iter()
            .map(|input| {
                let sample_bounds = input.sample_bounds.unwrap_or(output);
                let s = input
                    .image
                    .as_shader(self.ctx, input.sampling, input.flags, sample_bounds);

                if evaluate_in_parameter_space {
                    s.map(|s| shader::with_local_matrix(s, mapping.layer_matrix()))
                } else {
                    s
                }
            })
            .collect();

        let combined = match f(&shaders) {
            Some(s) if evaluate_in_parameter_space => {
                shader::with_local_matrix(s, mapping.layer_to_param_matrix())
            }
            Some(s) => s,
            None => return FilterResult::empty(),
        };

        draw_shader(self.ctx, &combined, output)
    }

    /// Composites all inputs with source-over, in order.
    pub fn merge(&self) -> FilterResult {
        if self.inputs.len() == 1 {
            return self.inputs[0].image.clone();
        }

        let bounds = self
            .inputs
            .iter()
            .fold(LayerSpace::empty(), |acc: LayerSpace<IRect>, i| {
                acc.join(&i.image.layer_bounds())
            });

        let bounds = match bounds.intersect(&self.ctx.desired_output()) {
            Some(b) => b,
            None => return FilterResult::empty(),
        };

        let mut surface = match self.ctx.make_surface(bounds.size()) {
            Some(s) => s,
            None => return FilterResult::empty(),
        };

        let origin = bounds.top_left();
        for input in &self.inputs {
            input.image.draw(self.ctx, &mut surface, origin);
        }

        FilterResult::new(surface.share(), origin)
    }
}

/// Fills `bounds` with `shader`.
pub(crate) fn draw_shader(
    ctx: &Context<'_>,
    shader: &Shader,
    bounds: LayerSpace<IRect>,
) -> FilterResult {
    let mut surface = match ctx.make_surface(bounds.size()) {
        Some(s) => s,
        None => return FilterResult::empty(),
    };

    let origin = bounds.top_left();
    surface.draw(&**shader, origin.get(), None, DrawMode::Src);
    ctx.stats().shader_draw();

    FilterResult::new(surface.share(), origin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::test_utils::{gradient_image, TestEnv};
    use crate::surface_utils::PixelOps;
    use SamplingOptions::*;

    #[test]
    fn sampling_compatibility_table() {
        let aniso = |m| Anisotropic { max_aniso: m };

        assert_eq!(compatible_sampling(aniso(2), false, aniso(8), false), Some(aniso(8)));
        assert_eq!(compatible_sampling(aniso(2), false, Linear, false), None);
        assert_eq!(
            compatible_sampling(SamplingOptions::MITCHELL, false, Linear, false),
            Some(SamplingOptions::MITCHELL)
        );
        assert_eq!(
            compatible_sampling(SamplingOptions::MITCHELL, false, SamplingOptions::CATMULL_ROM, false),
            None
        );
        assert_eq!(
            compatible_sampling(Linear, false, SamplingOptions::CATMULL_ROM, false),
            Some(SamplingOptions::CATMULL_ROM)
        );
        assert_eq!(compatible_sampling(Linear, false, Linear, false), Some(Linear));
        assert_eq!(compatible_sampling(Nearest, false, Linear, false), None);
        assert_eq!(compatible_sampling(Nearest, true, Linear, false), Some(Linear));
        assert_eq!(compatible_sampling(Nearest, false, Linear, true), Some(Nearest));
    }

    #[test]
    fn integer_translation_tolerates_noise() {
        let t = LayerSpace::new(Transform::new_translate(3.0004, -1.9999));
        assert_eq!(integer_translation(&t).unwrap().get(), IPoint::new(3, -2));

        let t = LayerSpace::new(Transform::new_translate(3.5, 0.0));
        assert!(integer_translation(&t).is_none());

        let t = LayerSpace::new(Transform::new_scale(2.0, 2.0));
        assert!(integer_translation(&t).is_none());
    }

    #[test]
    fn empty_result_has_empty_bounds() {
        let r = FilterResult::empty();
        assert!(r.is_empty());
        assert!(r.layer_bounds().is_empty());
    }

    #[test]
    fn resolve_inside_integer_translation_is_zero_copy() {
        let env = TestEnv::new();
        let ctx = env.context(IRect::new(-100, -100, 100, 100));

        let image = gradient_image(16, 16);
        let r = FilterResult::new(image.clone(), LayerSpace::new(IPoint::new(10, 20)));

        let resolved = r.resolve(&ctx, LayerSpace::new(IRect::new(12, 22, 18, 30)));
        let pixels = resolved.image().unwrap();

        assert!(pixels.shares_pixels_with(&image));
        assert_eq!(resolved.layer_bounds().get(), IRect::new(12, 22, 18, 30));
        assert_eq!(pixels.get_pixel(0, 0), image.get_pixel(2, 2));
        assert_eq!(env.stats.offscreen_surfaces(), 0);
        assert_eq!(env.stats.zero_copy_subsets(), 1);
    }

    #[test]
    fn resolve_clamps_to_layer_bounds() {
        let env = TestEnv::new();
        let ctx = env.context(IRect::new(-100, -100, 100, 100));

        let r = FilterResult::new(gradient_image(4, 4), LayerSpace::new(IPoint::new(0, 0)));
        let resolved = r.resolve(&ctx, LayerSpace::new(IRect::new(-10, -10, 2, 10)));

        assert_eq!(resolved.layer_bounds().get(), IRect::new(0, 0, 2, 4));
        assert!(r.resolve(&ctx, LayerSpace::new(IRect::new(5, 5, 9, 9))).is_empty());
    }

    #[test]
    fn preserved_bounds_are_padded_with_transparency() {
        let env = TestEnv::new();
        let ctx = env.context(IRect::new(-100, -100, 100, 100));

        let r = FilterResult::new(gradient_image(4, 4), LayerSpace::new(IPoint::new(0, 0)));
        let (image, origin) = r.resolve_to(&ctx, LayerSpace::new(IRect::new(-1, -1, 5, 5)), true);
        let image = image.unwrap();

        assert_eq!(origin.get(), IPoint::new(-1, -1));
        assert_eq!((image.width(), image.height()), (6, 6));
        assert!(image.get_pixel(0, 0).is_transparent());
        assert_eq!(image.get_pixel(1, 1), gradient_image(4, 4).get_pixel(0, 0));
    }

    #[test]
    fn transform_to_nothing_is_transparent_black() {
        let env = TestEnv::new();
        let ctx = env.context(IRect::new(0, 0, 10, 10));

        let r = FilterResult::new(gradient_image(4, 4), LayerSpace::new(IPoint::new(0, 0)));
        let moved = r.apply_transform(
            &ctx,
            &LayerSpace::new(Transform::new_translate(50.0, 0.0)),
            Linear,
        );

        assert!(moved.is_empty());
    }

    #[test]
    fn builder_draws_inputs() {
        let env = TestEnv::new();
        let ctx = env.context(IRect::new(0, 0, 4, 4));

        let image = gradient_image(4, 4);
        let mut builder = FilterResultBuilder::new(&ctx);
        builder.add(
            FilterResult::new(image.clone(), LayerSpace::new(IPoint::new(0, 0))),
            None,
            ShaderFlags::empty(),
            Linear,
        );

        let out = builder.eval(|shaders| shaders[0].clone(), None, false);
        let out_image = out.image().unwrap();

        for (x, y, p) in out_image.pixels() {
            assert_eq!(p, image.get_pixel(x, y));
        }
    }
}
