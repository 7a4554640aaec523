use crate::effect::{self, EffectBuilder, EffectDescription, KnownEffect};
use crate::error::FilterError;
use crate::mapping::{Mapping, MatrixCapability};
use crate::point::{ISize, Point, Size, Vector};
use crate::rect::IRect;
use crate::shader::{SamplingOptions, Shader};
use crate::space::{LayerSpace, ParameterSpace};
use crate::transform::Transform;

use super::context::Context;
use super::result::{FilterResult, FilterResultBuilder, ShaderFlags};
use super::{FilterBase, FilterRef, ImageFilter};

const DISPLACEMENT: usize = 0;
const COLOR: usize = 1;

/// The channel of the displacement input that drives one axis.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ColorChannel {
    R,
    G,
    B,
    A,
}

enum_default!(ColorChannel, ColorChannel::A);

impl ColorChannel {
    fn index(self) -> usize {
        match self {
            ColorChannel::R => 0,
            ColorChannel::G => 1,
            ColorChannel::B => 2,
            ColorChannel::A => 3,
        }
    }
}

pub(crate) fn effect_description() -> EffectDescription {
    EffectDescription::new("displacement_map", |args, p| {
        let scale = args.uniform(0);
        let x_channel = args.float(1) as usize;
        let y_channel = args.float(2) as usize;

        let d = args.child(0, p).unpremultiply();
        let dx = d.channel(x_channel) - 0.5;
        let dy = d.channel(y_channel) - 0.5;

        let q = Point::new(
            p.x + f64::from(scale[0] * dx),
            p.y + f64::from(scale[1] * dy),
        );

        args.child(1, q)
    })
    .uniform("scale", 2)
    .uniform("x_channel", 1)
    .uniform("y_channel", 1)
    .child("displacement")
    .child("color")
}

/// Moves the pixels of a color input by amounts read from a displacement input.
///
/// The displacement input is numeric data and is never color converted.
#[derive(Debug)]
pub struct DisplacementMap {
    base: FilterBase,
    x_channel: ColorChannel,
    y_channel: ColorChannel,
    scale: f32,
}

impl DisplacementMap {
    pub fn new(
        x_channel: ColorChannel,
        y_channel: ColorChannel,
        scale: f32,
        displacement: Option<FilterRef>,
        color: Option<FilterRef>,
    ) -> Result<DisplacementMap, FilterError> {
        if !scale.is_finite() {
            return Err(FilterError::invalid("displacement scale must be finite"));
        }

        Ok(DisplacementMap {
            base: FilterBase::new(vec![displacement, color]),
            x_channel,
            y_channel,
            scale,
        })
    }

    /// The furthest a pixel can move, in layer pixels.
    fn max_displacement(&self, mapping: &Mapping) -> LayerSpace<ISize> {
        let half = 0.5 * f64::from(self.scale.abs());
        mapping
            .param_to_layer(ParameterSpace::new(Size::new(half, half)))
            .ceil()
    }

    fn layer_scale(&self, mapping: &Mapping) -> LayerSpace<Vector> {
        let s = f64::from(self.scale);
        mapping.param_to_layer(ParameterSpace::new(Vector::new(s, s)))
    }

    fn make_shader(
        &self,
        scale: LayerSpace<Vector>,
        displacement: Option<Shader>,
        color: Option<Shader>,
    ) -> Option<Shader> {
        let mut builder = EffectBuilder::new(effect::effect_for(KnownEffect::DisplacementMap));

        builder
            .uniform("scale", &[scale.x() as f32, scale.y() as f32])
            .ok()?
            .uniform("x_channel", &[self.x_channel.index() as f32])
            .ok()?
            .uniform("y_channel", &[self.y_channel.index() as f32])
            .ok()?
            .child("displacement", displacement)
            .ok()?
            .child("color", color)
            .ok()?;

        builder.make_shader().ok()
    }
}

impl ImageFilter for DisplacementMap {
    fn base(&self) -> &FilterBase {
        &self.base
    }

    fn on_filter_image(&self, ctx: &Context<'_>) -> FilterResult {
        let outset = self.max_displacement(ctx.mapping());
        let required_color = ctx.desired_output().outset(outset);

        let color = self
            .base
            .child_output(COLOR, &ctx.with_new_desired_output(required_color));
        if color.is_empty() {
            return FilterResult::empty();
        }

        let output = match color
            .layer_bounds()
            .outset(outset)
            .intersect(&ctx.desired_output())
        {
            Some(o) => o,
            None => return FilterResult::empty(),
        };

        let scale = self.layer_scale(ctx.mapping());
        if scale.x() == 0.0 && scale.y() == 0.0 {
            return color.apply_crop(ctx, output);
        }

        let displacement = self.base.child_output(
            DISPLACEMENT,
            &ctx.with_new_desired_output(output).with_new_color_space(None),
        );

        if displacement.is_empty() {
            // Transparent displacement moves everything by (-scale / 2).
            let t = LayerSpace::new(Transform::new_translate(0.5 * scale.x(), 0.5 * scale.y()));
            return color.apply_transform(ctx, &t, SamplingOptions::Linear);
        }

        let mut builder = FilterResultBuilder::new(ctx);
        builder
            .add(
                displacement,
                Some(output),
                ShaderFlags::RAW,
                SamplingOptions::Nearest,
            )
            .add(
                color,
                Some(required_color),
                ShaderFlags::NON_TRIVIAL_SAMPLING,
                SamplingOptions::Linear,
            );

        builder.eval(
            |inputs| self.make_shader(scale, inputs[0].clone(), inputs[1].clone()),
            Some(output),
            false,
        )
    }

    fn on_get_input_layer_bounds(
        &self,
        mapping: &Mapping,
        desired: LayerSpace<IRect>,
        content: Option<LayerSpace<IRect>>,
    ) -> LayerSpace<IRect> {
        let outset = self.max_displacement(mapping);

        let displacement = self
            .base
            .child_input_layer_bounds(DISPLACEMENT, mapping, desired, content);
        let color =
            self.base
                .child_input_layer_bounds(COLOR, mapping, desired.outset(outset), content);

        displacement.join(&color)
    }

    fn on_get_output_layer_bounds(
        &self,
        mapping: &Mapping,
        content: Option<LayerSpace<IRect>>,
    ) -> Option<LayerSpace<IRect>> {
        let outset = self.max_displacement(mapping);

        self.base
            .child_output_layer_bounds(COLOR, mapping, content)
            .map(|b| b.outset(outset))
    }

    fn ignore_inputs_affects_transparent_black(&self) -> bool {
        // Only the color input can put anything into the output.
        !self
            .base
            .input(COLOR)
            .map_or(false, |c| c.affects_transparent_black())
    }

    fn on_get_ctm_capability(&self) -> MatrixCapability {
        MatrixCapability::ScaleTranslate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::filters::shader::ShaderFilter;
    use crate::filters::test_utils::{gradient_image, TestEnv};
    use crate::point::IPoint;
    use crate::shader;
    use std::sync::Arc;

    fn flat_displacement(r: f32, g: f32) -> Option<FilterRef> {
        Some(Arc::new(ShaderFilter::new(shader::color(Color::new(
            r, g, 0.0, 1.0,
        )))))
    }

    #[test]
    fn zero_scale_is_identity() {
        let env = TestEnv::new();
        let image = gradient_image(10, 10);
        let source = FilterResult::new(image.clone(), LayerSpace::new(IPoint::new(0, 0)));
        let ctx = env.context_with_source(IRect::new(0, 0, 10, 10), source);

        let f: FilterRef = Arc::new(
            DisplacementMap::new(
                ColorChannel::R,
                ColorChannel::G,
                0.0,
                flat_displacement(1.0, 0.0),
                None,
            )
            .unwrap(),
        );

        let out = f.filter_image(&ctx);
        let resolved = out.resolve(&ctx, LayerSpace::new(IRect::new(0, 0, 10, 10)));
        let pixels = resolved.image().unwrap();

        for (x, y, p) in image.pixels() {
            assert_eq!(pixels.get_pixel(x, y), p);
        }
    }

    #[test]
    fn constant_displacement_shifts_color() {
        let env = TestEnv::new();
        let image = gradient_image(10, 10);
        let source = FilterResult::new(image.clone(), LayerSpace::new(IPoint::new(0, 0)));
        let ctx = env.context_with_source(IRect::new(0, 0, 10, 10), source);

        // d.r = 1 on both axes: reads from (scale / 2, scale / 2) = (2, 2) away.
        let f: FilterRef = Arc::new(
            DisplacementMap::new(
                ColorChannel::R,
                ColorChannel::R,
                4.0,
                flat_displacement(1.0, 0.0),
                None,
            )
            .unwrap(),
        );

        let out = f.filter_image(&ctx);
        let origin = out.layer_bounds().top_left();
        let pixels = out.image().unwrap();
        let at = |x: i32, y: i32| pixels.get_pixel((x - origin.x()) as u32, (y - origin.y()) as u32);

        assert_eq!(at(3, 4), image.get_pixel(5, 6));
    }

    #[test]
    fn color_input_is_outset_by_half_scale() {
        let f: FilterRef = Arc::new(
            DisplacementMap::new(ColorChannel::A, ColorChannel::A, 10.0, None, None).unwrap(),
        );
        let m = Mapping::new(Transform::new_scale(2.0, 2.0)).unwrap();

        let input = f.get_input_layer_bounds(&m, LayerSpace::new(IRect::new(0, 0, 10, 10)), None);
        assert_eq!(input.get(), IRect::new(-10, -10, 20, 20));

        let output = f
            .get_output_layer_bounds(&m, Some(LayerSpace::new(IRect::new(0, 0, 10, 10))))
            .unwrap();
        assert_eq!(output.get(), IRect::new(-10, -10, 20, 20));
    }

    #[test]
    fn unbounded_displacement_does_not_leak() {
        let f: FilterRef = Arc::new(
            DisplacementMap::new(ColorChannel::R, ColorChannel::G, 2.0, flat_displacement(0.0, 0.0), None)
                .unwrap(),
        );

        assert!(!f.affects_transparent_black());
        let output = f.get_output_layer_bounds(
            &Mapping::default(),
            Some(LayerSpace::new(IRect::new(0, 0, 10, 10))),
        );
        assert_eq!(output.unwrap().get(), IRect::new(-1, -1, 11, 11));
    }

    #[test]
    fn rejects_non_finite_scale() {
        assert!(DisplacementMap::new(ColorChannel::A, ColorChannel::A, f32::NAN, None, None).is_err());
    }
}
