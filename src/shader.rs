//! Shaders: functions from a point to a premultiplied color.
//!
//! This is the reference implementation of the shader collaborator used by filter
//! evaluation.  Every shader is evaluated in the coordinate system of whatever surface
//! it is drawn into; [`with_local_matrix`] moves a shader into another one.

use std::fmt;
use std::sync::Arc;

use crate::blender::Blender;
use crate::color::{self, Color, ColorSpace};
use crate::point::Point;
use crate::surface_utils::shared_surface::SharedImageSurface;
use crate::transform::Transform;

pub trait ShaderEval: Send + Sync + fmt::Debug {
    /// The color at `p`.
    fn eval(&self, p: Point) -> Color;
}

pub type Shader = Arc<dyn ShaderEval>;

/// How an image is sampled between pixel centers.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum SamplingOptions {
    Nearest,
    Linear,
    /// Bicubic filtering with Mitchell-Netravali parameters.
    Cubic { b: f32, c: f32 },
    /// Filtering adapted to the local scale; evaluated as `Linear`.
    Anisotropic { max_aniso: u32 },
}

enum_default!(SamplingOptions, SamplingOptions::Linear);

impl SamplingOptions {
    pub const MITCHELL: SamplingOptions = SamplingOptions::Cubic {
        b: 1.0 / 3.0,
        c: 1.0 / 3.0,
    };

    pub const CATMULL_ROM: SamplingOptions = SamplingOptions::Cubic { b: 0.0, c: 0.5 };
}

#[derive(Debug)]
struct ColorShader(Color);

impl ShaderEval for ColorShader {
    fn eval(&self, _p: Point) -> Color {
        self.0
    }
}

/// A shader that is `color` everywhere.
pub fn color(color: Color) -> Shader {
    Arc::new(ColorShader(color))
}

#[derive(Debug)]
struct ImageShader {
    image: SharedImageSurface,
    to_image: Transform,
    sampling: SamplingOptions,
    src_space: Option<ColorSpace>,
    dst_space: Option<ColorSpace>,
}

impl ImageShader {
    #[inline]
    fn texel(&self, x: i32, y: i32) -> Color {
        Color::from_pixel(self.image.get_pixel_or_transparent(x, y))
    }

    fn nearest(&self, q: Point) -> Color {
        self.texel(q.x.floor() as i32, q.y.floor() as i32)
    }

    fn linear(&self, q: Point) -> Color {
        let fx = q.x - 0.5;
        let fy = q.y - 0.5;
        let x0 = fx.floor();
        let y0 = fy.floor();
        let tx = (fx - x0) as f32;
        let ty = (fy - y0) as f32;
        let (x0, y0) = (x0 as i32, y0 as i32);

        let (x1, y1) = (x0.saturating_add(1), y0.saturating_add(1));

        let top = self.texel(x0, y0).scale(1.0 - tx) + self.texel(x1, y0).scale(tx);
        let bottom = self.texel(x0, y1).scale(1.0 - tx) + self.texel(x1, y1).scale(tx);

        top.scale(1.0 - ty) + bottom.scale(ty)
    }

    fn cubic(&self, q: Point, b: f32, c: f32) -> Color {
        let fx = q.x - 0.5;
        let fy = q.y - 0.5;
        let x0 = fx.floor();
        let y0 = fy.floor();

        let wx = cubic_weights((fx - x0) as f32, b, c);
        let wy = cubic_weights((fy - y0) as f32, b, c);
        let (x0, y0) = (x0 as i32, y0 as i32);

        let mut sum = Color::TRANSPARENT;
        for (j, wy) in wy.iter().enumerate() {
            let mut row = Color::TRANSPARENT;
            for (i, wx) in wx.iter().enumerate() {
                row = row + self.texel(x0.saturating_add(i as i32 - 1), y0.saturating_add(j as i32 - 1)).scale(*wx);
            }
            sum = sum + row.scale(*wy);
        }

        sum.clamp_premultiplied()
    }
}

/// Weights of the four taps at offsets `-1, 0, 1, 2` from the sample left of `t`.
fn cubic_weights(t: f32, b: f32, c: f32) -> [f32; 4] {
    let k = |x: f32| {
        let x = x.abs();
        if x < 1.0 {
            ((12.0 - 9.0 * b - 6.0 * c) * x * x * x
                + (-18.0 + 12.0 * b + 6.0 * c) * x * x
                + (6.0 - 2.0 * b))
                / 6.0
        } else if x < 2.0 {
            ((-b - 6.0 * c) * x * x * x
                + (6.0 * b + 30.0 * c) * x * x
                + (-12.0 * b - 48.0 * c) * x
                + (8.0 * b + 24.0 * c))
                / 6.0
        } else {
            0.0
        }
    };

    [k(t + 1.0), k(t), k(1.0 - t), k(2.0 - t)]
}

impl ShaderEval for ImageShader {
    fn eval(&self, p: Point) -> Color {
        let q = self.to_image.map_point(p);

        let c = match self.sampling {
            SamplingOptions::Nearest => self.nearest(q),
            SamplingOptions::Linear | SamplingOptions::Anisotropic { .. } => self.linear(q),
            SamplingOptions::Cubic { b, c } => self.cubic(q, b, c),
        };

        color::convert(c, self.src_space, self.dst_space)
    }
}

/// Samples `image` with decal tiling.
///
/// `layer_to_image` maps the shader's coordinates into the image's pixel coordinates.
/// Colors are converted from the image's color space into `dst_color_space`; when either
/// is `None` the samples are passed through unchanged.
pub fn image(
    image: SharedImageSurface,
    layer_to_image: Transform,
    sampling: SamplingOptions,
    dst_color_space: Option<ColorSpace>,
) -> Shader {
    let src_space = image.color_space();

    Arc::new(ImageShader {
        image,
        to_image: layer_to_image,
        sampling,
        src_space,
        dst_space: dst_color_space,
    })
}

#[derive(Debug)]
struct LocalMatrixShader {
    inner: Shader,
    matrix: Transform,
}

impl ShaderEval for LocalMatrixShader {
    fn eval(&self, p: Point) -> Color {
        self.inner.eval(self.matrix.map_point(p))
    }
}

/// Evaluates `inner` at `matrix.map_point(p)`.
pub fn with_local_matrix(inner: Shader, matrix: Transform) -> Shader {
    if matrix == Transform::identity() {
        return inner;
    }

    Arc::new(LocalMatrixShader { inner, matrix })
}

#[derive(Debug)]
struct BlendShader {
    blender: Blender,
    dst: Option<Shader>,
    src: Option<Shader>,
}

impl ShaderEval for BlendShader {
    fn eval(&self, p: Point) -> Color {
        let sample = |s: &Option<Shader>| s.as_ref().map_or(Color::TRANSPARENT, |s| s.eval(p));

        self.blender.blend(sample(&self.src), sample(&self.dst))
    }
}

/// Blends `src` over `dst` with `blender`; a missing shader is transparent black.
pub fn blend(blender: Blender, dst: Option<Shader>, src: Option<Shader>) -> Shader {
    Arc::new(BlendShader { blender, dst, src })
}
