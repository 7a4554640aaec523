//! Convolution with an arbitrary kernel.
//!
//! Output pixel `p` is `Σ kernel[j][i] · input(p - offset + (i, j))`, scaled by `gain` and
//! shifted by `bias`.  The kernel is handed to the effect in one of three ways depending on
//! its size: small kernels go into a uniform array, larger ones are quantized into a
//! one-row alpha texture that the effect reads as a child.

use itertools::{Itertools, MinMaxResult};
use nalgebra::DMatrix;

use crate::color::{Color, ColorType};
use crate::effect::{self, EffectBuilder, EffectDescription, KnownEffect};
use crate::error::{FilterError, ImplementationLimit};
use crate::limits::{
    MAX_KERNEL_ELEMENTS, MAX_SMALL_TEXTURE_KERNEL_ELEMENTS, MAX_UNIFORM_KERNEL_ELEMENTS,
};
use crate::mapping::{Mapping, MatrixCapability};
use crate::point::{IPoint, ISize, Point};
use crate::rect::IRect;
use crate::shader::{self, SamplingOptions, Shader};
use crate::space::LayerSpace;
use crate::surface_utils::shared_surface::{ExclusiveImageSurface, SharedImageSurface};
use crate::surface_utils::{EdgeMode, Pixel};
use crate::transform::Transform;
use crate::util::clamp;

use super::context::Context;
use super::result::{FilterResult, FilterResultBuilder, ShaderFlags};
use super::{FilterBase, FilterRef, ImageFilter};

// Uniform indices, in declaration order.
const SIZE: usize = 0;
const OFFSET: usize = 1;
const GAIN: usize = 2;
const BIAS: usize = 3;
const CONVOLVE_ALPHA: usize = 4;
const EDGE: usize = 5;
const KERNEL: usize = 6;

// Child indices.
const CHILD: usize = 0;
const KERNEL_TEXTURE: usize = 1;

/// How the kernel reaches the effect.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Strategy {
    Uniforms,
    SmallTexture,
    LargeTexture,
}

impl Strategy {
    fn for_len(len: usize) -> Option<Strategy> {
        if len <= MAX_UNIFORM_KERNEL_ELEMENTS {
            Some(Strategy::Uniforms)
        } else if len <= MAX_SMALL_TEXTURE_KERNEL_ELEMENTS {
            Some(Strategy::SmallTexture)
        } else if len <= MAX_KERNEL_ELEMENTS {
            Some(Strategy::LargeTexture)
        } else {
            None
        }
    }

    fn effect(self) -> KnownEffect {
        match self {
            Strategy::Uniforms => KnownEffect::MatrixConvolutionUniforms,
            Strategy::SmallTexture => KnownEffect::MatrixConvolutionSmallTexture,
            Strategy::LargeTexture => KnownEffect::MatrixConvolutionLargeTexture,
        }
    }

    fn texture_width(self) -> i32 {
        match self {
            Strategy::Uniforms => 0,
            Strategy::SmallTexture => MAX_SMALL_TEXTURE_KERNEL_ELEMENTS as i32,
            Strategy::LargeTexture => MAX_KERNEL_ELEMENTS as i32,
        }
    }
}

/// Kernel values quantized to 8 bits: `value = gain · (a / 255) + bias`.
#[derive(Debug, Clone)]
struct KernelTexture {
    image: SharedImageSurface,
    inner_gain: f32,
    inner_bias: f32,
}

impl KernelTexture {
    fn new(kernel: &DMatrix<f32>, width: i32) -> Result<KernelTexture, FilterError> {
        let (min, max) = match kernel.iter().copied().minmax() {
            MinMaxResult::NoElements => (0.0, 0.0),
            MinMaxResult::OneElement(k) => (k, k),
            MinMaxResult::MinMax(min, max) => (min, max),
        };

        let inner_gain = max - min;
        let inner_bias = min;

        let mut surface = ExclusiveImageSurface::new(width, 1, ColorType::Alpha8, None)
            .map_err(|_| FilterError::LimitExceeded(ImplementationLimit::KernelTooLarge))?;

        // The texture is read in row-major order, but nalgebra stores columns.
        for (i, k) in kernel.transpose().iter().enumerate() {
            let a = if inner_gain > 0.0 {
                ((k - inner_bias) / inner_gain * 255.0 + 0.5) as u8
            } else {
                0
            };

            surface.set_pixel(i as u32, 0, Pixel::new(0, 0, 0, a));
        }

        Ok(KernelTexture {
            image: surface.share(),
            inner_gain,
            inner_bias,
        })
    }

    fn shader(&self) -> Shader {
        shader::image(
            self.image.clone(),
            Transform::identity(),
            SamplingOptions::Nearest,
            None,
        )
    }
}

/// The effect for one kernel strategy.
pub(crate) fn effect_description(key: KnownEffect) -> EffectDescription {
    let textured = key != KnownEffect::MatrixConvolutionUniforms;

    let name = match key {
        KnownEffect::MatrixConvolutionUniforms => "matrix_convolution_uniforms",
        KnownEffect::MatrixConvolutionSmallTexture => "matrix_convolution_small_texture",
        _ => "matrix_convolution_large_texture",
    };

    let desc = EffectDescription::new(name, move |args, p| {
        let size = args.uniform(SIZE);
        let (w, h) = (size[0] as usize, size[1] as usize);
        let offset = args.uniform(OFFSET);
        let gain = args.float(GAIN);
        let bias = args.float(BIAS);
        let convolve_alpha = args.float(CONVOLVE_ALPHA) > 0.5;
        let edge = args.uniform(EDGE);
        let clamp_edges = edge[4] > 0.5;

        let kernel = |n: usize| {
            if textured {
                let ig = args.uniform(KERNEL);
                let t = args.child(KERNEL_TEXTURE, Point::new(n as f64 + 0.5, 0.5));
                t.a * ig[0] + ig[1]
            } else {
                args.uniform(KERNEL)[n]
            }
        };

        let sample = |q: Point| {
            let q = if clamp_edges {
                Point::new(
                    clamp(q.x, f64::from(edge[0]) + 0.5, f64::from(edge[2]) - 0.5),
                    clamp(q.y, f64::from(edge[1]) + 0.5, f64::from(edge[3]) - 0.5),
                )
            } else {
                q
            };

            let c = args.child(CHILD, q);
            if convolve_alpha {
                c
            } else {
                c.unpremultiply()
            }
        };

        let mut sum = Color::TRANSPARENT;
        for j in 0..h {
            for i in 0..w {
                let q = Point::new(
                    p.x + i as f64 - f64::from(offset[0]),
                    p.y + j as f64 - f64::from(offset[1]),
                );

                sum = sum + sample(q).scale(kernel(j * w + i));
            }
        }

        if convolve_alpha {
            Color::new(
                sum.r * gain + bias,
                sum.g * gain + bias,
                sum.b * gain + bias,
                sum.a * gain + bias,
            )
            .clamp_premultiplied()
        } else {
            let a = sample(p).a;
            let c = |v: f32| clamp(v * gain + bias, 0.0, 1.0);
            Color::from_unpremultiplied(c(sum.r), c(sum.g), c(sum.b), a)
        }
    })
    .child("child")
    .uniform("size", 2)
    .uniform("offset", 2)
    .uniform("gain", 1)
    .uniform("bias", 1)
    .uniform("convolve_alpha", 1)
    .uniform("edge", 5);

    if textured {
        desc.uniform("inner_gain_bias", 2).child("kernel")
    } else {
        desc.uniform("kernel", MAX_UNIFORM_KERNEL_ELEMENTS)
    }
}

/// Convolves its input with a kernel of up to [`MAX_KERNEL_ELEMENTS`] values.
#[derive(Debug)]
pub struct MatrixConvolution {
    base: FilterBase,

    /// `size.height` rows by `size.width` columns.
    kernel: DMatrix<f32>,
    size: ISize,
    offset: IPoint,
    gain: f32,
    bias: f32,
    edge_mode: EdgeMode,
    convolve_alpha: bool,

    strategy: Strategy,
    texture: Option<KernelTexture>,
}

impl MatrixConvolution {
    /// `kernel` is given in row-major order.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        size: ISize,
        kernel: &[f32],
        gain: f32,
        bias: f32,
        offset: IPoint,
        edge_mode: EdgeMode,
        convolve_alpha: bool,
        input: Option<FilterRef>,
    ) -> Result<MatrixConvolution, FilterError> {
        if size.width <= 0 || size.height <= 0 {
            return Err(FilterError::invalid("kernel size must be positive"));
        }

        let len = size.width as usize * size.height as usize;
        if kernel.len() != len {
            return Err(FilterError::invalid(format!(
                "incorrect number of kernel elements: expected {}",
                len
            )));
        }

        let strategy = Strategy::for_len(len)
            .ok_or(FilterError::LimitExceeded(ImplementationLimit::KernelTooLarge))?;

        if !gain.is_finite() || !bias.is_finite() || kernel.iter().any(|k| !k.is_finite()) {
            return Err(FilterError::invalid("kernel values must be finite"));
        }

        if offset.x < 0 || offset.x >= size.width || offset.y < 0 || offset.y >= size.height {
            return Err(FilterError::invalid("kernel offset must lie inside the kernel"));
        }

        let kernel = DMatrix::from_row_slice(size.height as usize, size.width as usize, kernel);

        let texture = match strategy {
            Strategy::Uniforms => None,
            _ => Some(KernelTexture::new(&kernel, strategy.texture_width())?),
        };

        Ok(MatrixConvolution {
            base: FilterBase::new(vec![input]),
            kernel,
            size,
            offset,
            gain,
            bias,
            edge_mode,
            convolve_alpha,
            strategy,
            texture,
        })
    }

    /// How far the kernel reaches before and after the target pixel on each axis.
    fn kernel_reach(&self) -> (IPoint, IPoint) {
        (
            self.offset,
            IPoint::new(
                self.size.width - self.offset.x - 1,
                self.size.height - self.offset.y - 1,
            ),
        )
    }

    /// The area of the input read to produce `r`.
    fn bounds_sampled_by_kernel(&self, r: LayerSpace<IRect>) -> LayerSpace<IRect> {
        if r.is_empty() {
            return r;
        }

        let (before, after) = self.kernel_reach();
        let r = r.get();
        LayerSpace::new(IRect::new(
            r.x0.saturating_sub(before.x),
            r.y0.saturating_sub(before.y),
            r.x1.saturating_add(after.x),
            r.y1.saturating_add(after.y),
        ))
    }

    /// The area of the output touched by the input in `r`.
    fn bounds_affected_by_kernel(&self, r: LayerSpace<IRect>) -> LayerSpace<IRect> {
        if r.is_empty() {
            return r;
        }

        let (before, after) = self.kernel_reach();
        let r = r.get();
        LayerSpace::new(IRect::new(
            r.x0.saturating_sub(after.x),
            r.y0.saturating_sub(after.y),
            r.x1.saturating_add(before.x),
            r.y1.saturating_add(before.y),
        ))
    }

    fn affected_by_input(&self, input: LayerSpace<IRect>) -> LayerSpace<IRect> {
        match self.edge_mode {
            EdgeMode::Duplicate => input,
            EdgeMode::None => self.bounds_affected_by_kernel(input),
        }
    }

    fn make_shader(&self, child: Option<Shader>, edge: LayerSpace<IRect>) -> Option<Shader> {
        let e = edge.get();
        let mut builder = EffectBuilder::new(effect::effect_for(self.strategy.effect()));

        builder
            .uniform("size", &[self.size.width as f32, self.size.height as f32])
            .ok()?
            .uniform("offset", &[self.offset.x as f32, self.offset.y as f32])
            .ok()?
            .uniform("gain", &[self.gain])
            .ok()?
            .uniform("bias", &[self.bias])
            .ok()?
            .uniform("convolve_alpha", &[if self.convolve_alpha { 1.0 } else { 0.0 }])
            .ok()?
            .uniform(
                "edge",
                &[
                    e.x0 as f32,
                    e.y0 as f32,
                    e.x1 as f32,
                    e.y1 as f32,
                    if self.edge_mode == EdgeMode::Duplicate { 1.0 } else { 0.0 },
                ],
            )
            .ok()?
            .child("child", child)
            .ok()?;

        match self.texture {
            Some(ref t) => {
                builder
                    .uniform("inner_gain_bias", &[t.inner_gain, t.inner_bias])
                    .ok()?
                    .child("kernel", Some(t.shader()))
                    .ok()?;
            }

            None => {
                let mut values = [0.0; MAX_UNIFORM_KERNEL_ELEMENTS];
                for (v, k) in values.iter_mut().zip(self.kernel.transpose().iter()) {
                    *v = *k;
                }
                builder.uniform("kernel", &values).ok()?;
            }
        }

        builder.make_shader().ok()
    }
}

impl ImageFilter for MatrixConvolution {
    fn base(&self) -> &FilterBase {
        &self.base
    }

    fn on_filter_image(&self, ctx: &Context<'_>) -> FilterResult {
        let required = self.bounds_sampled_by_kernel(ctx.desired_output());
        let child = self
            .base
            .child_output(0, &ctx.with_new_desired_output(required));

        let edge = child.layer_bounds();

        let output = if self.on_affects_transparent_black() {
            ctx.desired_output()
        } else {
            match self.affected_by_input(edge).intersect(&ctx.desired_output()) {
                Some(o) => o,
                None => return FilterResult::empty(),
            }
        };

        let mut builder = FilterResultBuilder::new(ctx);
        builder.add(
            child,
            Some(self.bounds_sampled_by_kernel(output)),
            ShaderFlags::SAMPLED_REPEATEDLY,
            SamplingOptions::Nearest,
        );

        builder.eval(
            |inputs| self.make_shader(inputs[0].clone(), edge),
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
        let required = self.bounds_sampled_by_kernel(desired);
        self.base
            .child_input_layer_bounds(0, mapping, required, content)
    }

    fn on_get_output_layer_bounds(
        &self,
        mapping: &Mapping,
        content: Option<LayerSpace<IRect>>,
    ) -> Option<LayerSpace<IRect>> {
        if self.on_affects_transparent_black() {
            return None;
        }

        self.base
            .child_output_layer_bounds(0, mapping, content)
            .map(|b| self.affected_by_input(b))
    }

    fn on_affects_transparent_black(&self) -> bool {
        self.convolve_alpha && self.bias != 0.0
    }

    fn on_get_ctm_capability(&self) -> MatrixCapability {
        MatrixCapability::Translate
    }
}
