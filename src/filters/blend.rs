use crate::blender::{self, Blender, Coeff};
use crate::effect::{self, EffectDescription, KnownEffect};
use crate::mapping::Mapping;
use crate::point::Point;
use crate::rect::IRect;
use crate::shader::{self, SamplingOptions, Shader};
use crate::space::LayerSpace;

use super::context::Context;
use super::result::{FilterResult, FilterResultBuilder, ShaderFlags};
use super::{FilterBase, FilterRef, ImageFilter};

const BACKGROUND: usize = 0;
const FOREGROUND: usize = 1;

/// Where a blend can produce non-transparent pixels, as a union of regions.
///
/// `None` from [`coverage`] means anywhere.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
struct Coverage {
    intersection: bool,
    foreground: bool,
    background: bool,
}

fn coverage(blender: &Blender) -> Option<Coverage> {
    match *blender {
        Blender::Mode(mode) => Some(match mode.coefficients() {
            Some((fs, fd)) => {
                let mut c = Coverage::default();

                match fs {
                    Coeff::Zero => (),
                    Coeff::DstAlpha => c.intersection = true,
                    _ => c.foreground = true,
                }

                match fd {
                    Coeff::Zero => (),
                    Coeff::SrcAlpha | Coeff::SrcColor => c.intersection = true,
                    _ => c.background = true,
                }

                c
            }

            // The advanced modes leave pixels alone where both inputs are transparent.
            None => Coverage {
                intersection: false,
                foreground: true,
                background: true,
            },
        }),

        Blender::Arithmetic { k, .. } => {
            if k[3] != 0.0 {
                None
            } else {
                Some(Coverage {
                    intersection: k[0] != 0.0,
                    foreground: k[1] != 0.0,
                    background: k[2] != 0.0,
                })
            }
        }

        Blender::Runtime(_) => None,
    }
}

fn join(a: Option<LayerSpace<IRect>>, b: Option<LayerSpace<IRect>>) -> Option<LayerSpace<IRect>> {
    Some(a?.join(&b?))
}

fn intersect(
    a: Option<LayerSpace<IRect>>,
    b: Option<LayerSpace<IRect>>,
) -> Option<LayerSpace<IRect>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.intersect(&b).unwrap_or_else(LayerSpace::empty)),
        (Some(r), None) | (None, Some(r)) => Some(r),
        (None, None) => None,
    }
}

/// Uniform and child layout of the arithmetic blend effect.
pub(crate) fn arithmetic_effect_description() -> EffectDescription {
    EffectDescription::new("arithmetic_blend", |args, p: Point| {
        let k = args.uniform(0);
        let enforce_premul = args.float(1) > 0.5;

        blender::arithmetic(
            [k[0], k[1], k[2], k[3]],
            enforce_premul,
            args.child(0, p),
            args.child(1, p),
        )
    })
    .uniform("k", 4)
    .uniform("enforce_premul", 1)
    .child("src")
    .child("dst")
}

/// Combines a foreground with a background.
#[derive(Debug)]
pub struct Blend {
    base: FilterBase,
    blender: Blender,
}

impl Blend {
    pub fn new(
        blender: Blender,
        background: Option<FilterRef>,
        foreground: Option<FilterRef>,
    ) -> Blend {
        Blend {
            base: FilterBase::new(vec![background, foreground]),
            blender,
        }
    }

    pub fn blender(&self) -> &Blender {
        &self.blender
    }

    fn output_bounds(
        &self,
        background: Option<LayerSpace<IRect>>,
        foreground: Option<LayerSpace<IRect>>,
    ) -> Option<LayerSpace<IRect>> {
        let c = coverage(&self.blender)?;
        let mut bounds = Some(LayerSpace::empty());

        if c.intersection {
            bounds = join(bounds, intersect(background, foreground));
        }

        if c.foreground {
            bounds = join(bounds, foreground);
        }

        if c.background {
            bounds = join(bounds, background);
        }

        bounds
    }

    fn blend_shader(&self, background: Option<Shader>, foreground: Option<Shader>) -> Option<Shader> {
        match self.blender {
            Blender::Arithmetic { k, enforce_premul } => {
                let mut builder =
                    effect::EffectBuilder::new(effect::effect_for(KnownEffect::ArithmeticBlend));

                let made = builder
                    .uniform("k", &k)
                    .and_then(|b| b.uniform("enforce_premul", &[if enforce_premul { 1.0 } else { 0.0 }]))
                    .and_then(|b| b.child("src", foreground))
                    .and_then(|b| b.child("dst", background))
                    .and_then(|b| b.make_shader());

                made.ok()
            }

            _ => Some(shader::blend(self.blender.clone(), background, foreground)),
        }
    }
}

impl ImageFilter for Blend {
    fn base(&self) -> &FilterBase {
        &self.base
    }

    fn on_filter_image(&self, ctx: &Context<'_>) -> FilterResult {
        let background = self.base.child_output(BACKGROUND, ctx);
        let foreground = self.base.child_output(FOREGROUND, ctx);

        let output = self.output_bounds(
            Some(background.layer_bounds()),
            Some(foreground.layer_bounds()),
        );

        let mut builder = FilterResultBuilder::new(ctx);
        builder
            .add(background, None, ShaderFlags::empty(), SamplingOptions::default())
            .add(foreground, None, ShaderFlags::empty(), SamplingOptions::default());

        builder.eval(
            |inputs| self.blend_shader(inputs[0].clone(), inputs[1].clone()),
            output,
            false,
        )
    }

    fn on_get_input_layer_bounds(
        &self,
        mapping: &Mapping,
        desired: LayerSpace<IRect>,
        content: Option<LayerSpace<IRect>>,
    ) -> LayerSpace<IRect> {
        let background = self
            .base
            .child_input_layer_bounds(BACKGROUND, mapping, desired, content);
        let foreground = self
            .base
            .child_input_layer_bounds(FOREGROUND, mapping, desired, content);

        background.join(&foreground)
    }

    fn on_get_output_layer_bounds(
        &self,
        mapping: &Mapping,
        content: Option<LayerSpace<IRect>>,
    ) -> Option<LayerSpace<IRect>> {
        let background = self
            .base
            .child_output_layer_bounds(BACKGROUND, mapping, content);
        let foreground = self
            .base
            .child_output_layer_bounds(FOREGROUND, mapping, content);

        self.output_bounds(background, foreground)
    }

    fn on_affects_transparent_black(&self) -> bool {
        match self.blender {
            Blender::Mode(_) => false,
            Blender::Arithmetic { k, .. } => k[3] != 0.0,
            Blender::Runtime(_) => true,
        }
    }
}
