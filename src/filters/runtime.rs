use itertools::Itertools;
use std::sync::Mutex;

use crate::effect::EffectBuilder;
use crate::error::FilterError;
use crate::mapping::{Mapping, MatrixCapability};
use crate::point::Size;
use crate::rect::IRect;
use crate::shader::{SamplingOptions, Shader};
use crate::space::{LayerSpace, ParameterSpace};

use super::context::Context;
use super::result::{FilterResult, FilterResultBuilder, ShaderFlags};
use super::{FilterBase, FilterRef, ImageFilter};

/// Evaluates a runtime effect with the outputs of the inputs bound to its children.
///
/// The builder holds the uniforms, which are part of the node, and the children, which
/// are bound for the duration of one evaluation only.  A node can be evaluated from
/// several threads at once, so binding, making the shader and unbinding happen under
/// the lock.
#[derive(Debug)]
pub struct RuntimeShader {
    base: FilterBase,
    child_names: Vec<String>,
    max_sample_radius: f64,
    builder: Mutex<EffectBuilder>,
}

impl RuntimeShader {
    /// `child_names[i]` is the effect child that receives the output of `inputs[i]`.
    ///
    /// Children may sample up to `max_sample_radius` away from the point being shaded,
    /// in parameter space.
    pub fn new(
        builder: EffectBuilder,
        max_sample_radius: f64,
        child_names: &[&str],
        inputs: Vec<Option<FilterRef>>,
    ) -> Result<RuntimeShader, FilterError> {
        if !(max_sample_radius.is_finite() && max_sample_radius >= 0.0) {
            return Err(FilterError::invalid(
                "sample radius must be finite and non-negative",
            ));
        }

        if child_names.len() != inputs.len() {
            return Err(FilterError::invalid("every input needs a child name"));
        }

        for (i, name) in child_names.iter().enumerate() {
            if builder.effect().find_child(name).is_none() {
                return Err(FilterError::invalid(format!(
                    "effect `{}` has no child `{}`",
                    builder.effect().name(),
                    name
                )));
            }

            if child_names[..i].contains(name) {
                return Err(FilterError::invalid(format!("child `{}` bound twice", name)));
            }
        }

        let mut builder = builder;
        builder.clear_children();

        Ok(RuntimeShader {
            base: FilterBase::new(inputs),
            child_names: child_names.iter().map(|s| s.to_string()).collect(),
            max_sample_radius,
            builder: Mutex::new(builder),
        })
    }

    fn required_input(&self, mapping: &Mapping, desired: LayerSpace<IRect>) -> LayerSpace<IRect> {
        let r = self.max_sample_radius;
        let outset = mapping
            .param_to_layer(ParameterSpace::new(Size::new(r, r)))
            .ceil();

        desired.outset(outset)
    }

    fn make_shader(&self, ctx: &Context<'_>, inputs: &[Option<Shader>]) -> Option<Shader> {
        let mut builder = match self.builder.lock() {
            Ok(b) => b,
            Err(poisoned) => poisoned.into_inner(),
        };

        let bound = self
            .child_names
            .iter()
            .zip_eq(inputs)
            .try_for_each(|(name, shader)| builder.child(name, shader.clone()).map(|_| ()));

        let made = bound.and_then(|_| builder.make_shader());
        builder.clear_children();

        match made {
            Ok(s) => Some(s),
            Err(e) => {
                fg_log!(
                    ctx.session(),
                    "(runtime effect {} failed: {})",
                    builder.effect().name(),
                    e
                );
                None
            }
        }
    }
}

impl ImageFilter for RuntimeShader {
    fn base(&self) -> &FilterBase {
        &self.base
    }

    fn on_filter_image(&self, ctx: &Context<'_>) -> FilterResult {
        let required = self.required_input(ctx.mapping(), ctx.desired_output());
        let child_ctx = ctx.with_new_desired_output(required);

        let mut builder = FilterResultBuilder::new(ctx);
        for i in 0..self.base.inputs().len() {
            builder.add(
                self.base.child_output(i, &child_ctx),
                Some(required),
                ShaderFlags::NON_TRIVIAL_SAMPLING,
                SamplingOptions::Linear,
            );
        }

        builder.eval(|inputs| self.make_shader(ctx, inputs), None, true)
    }

    fn on_get_input_layer_bounds(
        &self,
        mapping: &Mapping,
        desired: LayerSpace<IRect>,
        content: Option<LayerSpace<IRect>>,
    ) -> LayerSpace<IRect> {
        let required = self.required_input(mapping, desired);

        (0..self.base.inputs().len())
            .map(|i| {
                self.base
                    .child_input_layer_bounds(i, mapping, required, content)
            })
            .fold(LayerSpace::empty(), |acc, r| acc.join(&r))
    }

    fn on_get_output_layer_bounds(
        &self,
        _mapping: &Mapping,
        _content: Option<LayerSpace<IRect>>,
    ) -> Option<LayerSpace<IRect>> {
        None
    }

    fn on_affects_transparent_black(&self) -> bool {
        true
    }

    fn on_get_ctm_capability(&self) -> MatrixCapability {
        MatrixCapability::Translate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{EffectDescription, RuntimeEffect};
    use crate::filters::test_utils::{gradient_image, solid_image, TestEnv};
    use crate::point::{IPoint, Point};
    use crate::surface_utils::Pixel;
    use std::sync::Arc;

    fn shift_builder(dx: f32) -> EffectBuilder {
        let effect = RuntimeEffect::compile(
            EffectDescription::new("shift", |args, p| {
                args.child(0, Point::new(p.x + f64::from(args.float(0)), p.y))
            })
            .uniform("dx", 1)
            .child("input"),
        )
        .unwrap();

        let mut builder = EffectBuilder::new(effect);
        builder.uniform("dx", &[dx]).unwrap();
        builder
    }

    #[test]
    fn binds_input_to_child() {
        let env = TestEnv::new();
        let image = gradient_image(10, 10);
        let source = FilterResult::new(image.clone(), LayerSpace::new(IPoint::new(0, 0)));
        let ctx = env.context_with_source(IRect::new(0, 0, 8, 8), source);

        let f: FilterRef =
            Arc::new(RuntimeShader::new(shift_builder(2.0), 2.0, &["input"], vec![None]).unwrap());

        let out = f.filter_image(&ctx);
        assert_eq!(out.layer_bounds().get(), IRect::new(0, 0, 8, 8));
        assert_eq!(out.image().unwrap().get_pixel(3, 3), image.get_pixel(5, 3));
    }

    #[test]
    fn builder_does_not_keep_children() {
        let env = TestEnv::new();
        let source = FilterResult::new(
            solid_image(4, 4, Pixel::new(10, 20, 30, 255)),
            LayerSpace::new(IPoint::new(0, 0)),
        );
        let ctx = env.context_with_source(IRect::new(0, 0, 4, 4), source);

        let node = Arc::new(RuntimeShader::new(shift_builder(0.0), 0.0, &["input"], vec![None]).unwrap());
        let f: FilterRef = node.clone();
        f.filter_image(&ctx);

        let builder = node.builder.lock().unwrap();
        let shader = builder.make_shader().unwrap();
        assert!(shader.eval(Point::new(1.5, 1.5)).is_transparent());
    }

    #[test]
    fn concurrent_evaluation() {
        let f: FilterRef =
            Arc::new(RuntimeShader::new(shift_builder(1.0), 1.0, &["input"], vec![None]).unwrap());

        std::thread::scope(|scope| {
            for i in 0..4u8 {
                let f = f.clone();
                scope.spawn(move || {
                    let env = TestEnv::new();
                    let pixel = Pixel::new(i * 50, 0, 0, 255);
                    let source = FilterResult::new(
                        solid_image(8, 8, pixel),
                        LayerSpace::new(IPoint::new(0, 0)),
                    );
                    let ctx = env.context_with_source(IRect::new(0, 0, 6, 6), source);

                    for _ in 0..10 {
                        let out = f.filter_image(&ctx);
                        assert_eq!(out.image().unwrap().get_pixel(2, 2), pixel);
                    }
                });
            }
        });
    }

    #[test]
    fn bounds() {
        let f: FilterRef =
            Arc::new(RuntimeShader::new(shift_builder(0.0), 1.5, &["input"], vec![None]).unwrap());

        let input = f.get_input_layer_bounds(
            &Mapping::default(),
            LayerSpace::new(IRect::new(0, 0, 10, 10)),
            None,
        );
        assert_eq!(input.get(), IRect::new(-2, -2, 12, 12));

        assert!(f.affects_transparent_black());
        assert_eq!(f.get_ctm_capability(), MatrixCapability::Translate);
        assert!(f
            .get_output_layer_bounds(&Mapping::default(), Some(LayerSpace::empty()))
            .is_none());
    }

    #[test]
    fn rejects_unknown_children() {
        assert!(RuntimeShader::new(shift_builder(0.0), 0.0, &["nope"], vec![None]).is_err());
        assert!(RuntimeShader::new(shift_builder(0.0), 0.0, &["input"], vec![]).is_err());
        assert!(RuntimeShader::new(shift_builder(0.0), -1.0, &[], vec![]).is_err());
    }
}
