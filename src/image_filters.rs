//! Building filter graphs.
//!
//! Every function here returns a new node, or an error when its parameters can't make a
//! well-formed filter.  An input of `None` stands for the source image of the evaluation.
//! Most factories take an optional `crop` in parameter space that restricts their output.
//!
//! Some combinations are simplified at construction time; for example blending with
//! [`BlendMode::Src`] is just the foreground.

use std::sync::Arc;

use nalgebra::Vector3;

use crate::blender::{BlendMode, Blender};
use crate::color::Color;
use crate::effect::EffectBuilder;
use crate::error::FilterError;
use crate::filters::blend::Blend;
use crate::filters::blur::Blur;
use crate::filters::compose::Compose;
use crate::filters::convolve_matrix::MatrixConvolution;
use crate::filters::crop::Crop;
use crate::filters::displacement_map::{ColorChannel, DisplacementMap};
use crate::filters::image::ImageSource;
use crate::filters::lighting::{Light, LightSource, Lighting, Material};
use crate::filters::matrix_transform::MatrixTransform;
use crate::filters::merge::Merge;
use crate::filters::runtime::RuntimeShader;
use crate::filters::shader::ShaderFilter;
use crate::filters::FilterRef;
use crate::point::{IPoint, ISize};
use crate::rect::Rect;
use crate::shader::{SamplingOptions, Shader};
use crate::space::ParameterSpace;
use crate::surface_utils::shared_surface::SharedImageSurface;
use crate::surface_utils::EdgeMode;
use crate::transform::Transform;

fn check_rect(r: &Rect) -> Result<(), FilterError> {
    if r.is_finite() {
        Ok(())
    } else {
        Err(FilterError::invalid("rectangle must be finite"))
    }
}

/// Wraps `filter` in `crop`, if there is one.
fn with_crop(crop: Option<Rect>, filter: FilterRef) -> Result<FilterRef, FilterError> {
    match crop {
        Some(r) => {
            check_rect(&r)?;
            Ok(Arc::new(Crop::new(Some(ParameterSpace::new(r)), Some(filter))))
        }
        None => Ok(filter),
    }
}

/// `input` restricted to `crop`; a bare source input still needs a node.
fn crop_or_input(crop: Option<Rect>, input: Option<FilterRef>) -> Result<FilterRef, FilterError> {
    match (crop, input) {
        (None, Some(f)) => Ok(f),
        (None, None) => Ok(Arc::new(Crop::new(None, None))),
        (Some(r), input) => {
            check_rect(&r)?;
            Ok(Arc::new(Crop::new(Some(ParameterSpace::new(r)), input)))
        }
    }
}

/// A filter that always produces transparent black.
pub fn empty() -> FilterRef {
    Arc::new(Crop::new(Some(ParameterSpace::new(Rect::default())), None))
}

pub fn crop(rect: Rect, input: Option<FilterRef>) -> Result<FilterRef, FilterError> {
    check_rect(&rect)?;
    Ok(Arc::new(Crop::new(Some(ParameterSpace::new(rect)), input)))
}

/// Blends `foreground` over `background` with a blend mode.
pub fn blend(
    mode: BlendMode,
    background: Option<FilterRef>,
    foreground: Option<FilterRef>,
    crop: Option<Rect>,
) -> Result<FilterRef, FilterError> {
    match mode {
        BlendMode::Clear => Ok(empty()),
        BlendMode::Src => crop_or_input(crop, foreground),
        BlendMode::Dst => crop_or_input(crop, background),
        _ => with_crop(
            crop,
            Arc::new(Blend::new(Blender::Mode(mode), background, foreground)),
        ),
    }
}

pub fn blender(
    blender: Blender,
    background: Option<FilterRef>,
    foreground: Option<FilterRef>,
    crop: Option<Rect>,
) -> Result<FilterRef, FilterError> {
    match blender {
        Blender::Mode(mode) => blend(mode, background, foreground, crop),

        Blender::Arithmetic { k, enforce_premul } => arithmetic(
            k[0],
            k[1],
            k[2],
            k[3],
            enforce_premul,
            background,
            foreground,
            crop,
        ),

        b @ Blender::Runtime(_) => with_crop(crop, Arc::new(Blend::new(b, background, foreground))),
    }
}

/// `k1·fg·bg + k2·fg + k3·bg + k4`, per premultiplied component.
#[allow(clippy::too_many_arguments)]
pub fn arithmetic(
    k1: f32,
    k2: f32,
    k3: f32,
    k4: f32,
    enforce_premul: bool,
    background: Option<FilterRef>,
    foreground: Option<FilterRef>,
    crop: Option<Rect>,
) -> Result<FilterRef, FilterError> {
    let k = [k1, k2, k3, k4];

    if k.iter().any(|k| !k.is_finite()) {
        return Err(FilterError::invalid("arithmetic coefficients must be finite"));
    }

    if k == [0.0, 0.0, 0.0, 0.0] {
        Ok(empty())
    } else if k == [0.0, 1.0, 0.0, 0.0] {
        blend(BlendMode::Src, background, foreground, crop)
    } else if k == [0.0, 0.0, 1.0, 0.0] {
        blend(BlendMode::Dst, background, foreground, crop)
    } else {
        with_crop(
            crop,
            Arc::new(Blend::new(
                Blender::Arithmetic { k, enforce_premul },
                background,
                foreground,
            )),
        )
    }
}

/// Evaluates `outer` with the output of `inner` as its source.
pub fn compose(outer: Option<FilterRef>, inner: Option<FilterRef>) -> Option<FilterRef> {
    match (outer, inner) {
        (Some(outer), Some(inner)) => Some(Arc::new(Compose::new(outer, inner))),
        (outer, None) => outer,
        (None, inner) => inner,
    }
}

/// Draws `inputs` over each other in order.
pub fn merge(
    inputs: Vec<Option<FilterRef>>,
    crop: Option<Rect>,
) -> Result<FilterRef, FilterError> {
    if inputs.is_empty() {
        return Ok(empty());
    }

    with_crop(crop, Arc::new(Merge::new(inputs)))
}

pub fn matrix_transform(
    transform: Transform,
    sampling: SamplingOptions,
    input: Option<FilterRef>,
) -> Result<FilterRef, FilterError> {
    if !transform.is_finite() {
        return Err(FilterError::invalid("transform must be finite"));
    }

    if !transform.is_invertible() {
        return Err(FilterError::NonInvertibleMatrix);
    }

    Ok(Arc::new(MatrixTransform::new(
        ParameterSpace::new(transform),
        sampling,
        input,
    )))
}

pub fn offset(
    dx: f64,
    dy: f64,
    input: Option<FilterRef>,
    crop: Option<Rect>,
) -> Result<FilterRef, FilterError> {
    let t = matrix_transform(
        Transform::new_translate(dx, dy),
        SamplingOptions::Linear,
        input,
    )?;

    with_crop(crop, t)
}

/// Draws the `src_rect` part of `image` into `dst_rect`.
pub fn image(
    image: SharedImageSurface,
    src_rect: Rect,
    dst_rect: Rect,
    sampling: SamplingOptions,
) -> Result<FilterRef, FilterError> {
    check_rect(&src_rect)?;
    check_rect(&dst_rect)?;

    let visible = Rect::from(image.bounds()).intersection(&src_rect);

    if visible.is_none() || dst_rect.is_empty() {
        return Ok(empty());
    }

    Ok(Arc::new(ImageSource::new(
        image,
        src_rect,
        ParameterSpace::new(dst_rect),
        sampling,
    )))
}

/// Fills the output with `shader`, which is defined in parameter space.
pub fn shader(shader: Shader, crop: Option<Rect>) -> Result<FilterRef, FilterError> {
    with_crop(crop, Arc::new(ShaderFilter::new(shader)))
}

/// Runs the effect in `builder` with the output of `inputs[i]` bound to `child_names[i]`.
pub fn runtime_shader(
    builder: EffectBuilder,
    max_sample_radius: f64,
    child_names: &[&str],
    inputs: Vec<Option<FilterRef>>,
) -> Result<FilterRef, FilterError> {
    Ok(Arc::new(RuntimeShader::new(
        builder,
        max_sample_radius,
        child_names,
        inputs,
    )?))
}

/// Convolves the input with `kernel`, given in row-major order.
#[allow(clippy::too_many_arguments)]
pub fn matrix_convolution(
    size: ISize,
    kernel: &[f32],
    gain: f32,
    bias: f32,
    offset: IPoint,
    edge_mode: EdgeMode,
    convolve_alpha: bool,
    input: Option<FilterRef>,
    crop: Option<Rect>,
) -> Result<FilterRef, FilterError> {
    let f = MatrixConvolution::new(
        size,
        kernel,
        gain,
        bias,
        offset,
        edge_mode,
        convolve_alpha,
        input,
    )?;

    with_crop(crop, Arc::new(f))
}

/// Gaussian blur with deviations in parameter space; zero on both axes is the input itself.
pub fn blur(
    sigma_x: f64,
    sigma_y: f64,
    input: Option<FilterRef>,
    crop: Option<Rect>,
) -> Result<FilterRef, FilterError> {
    let f = Blur::new(sigma_x, sigma_y, input.clone())?;

    if sigma_x == 0.0 && sigma_y == 0.0 {
        return crop_or_input(crop, input);
    }

    with_crop(crop, Arc::new(f))
}

pub fn displacement_map(
    x_channel: ColorChannel,
    y_channel: ColorChannel,
    scale: f32,
    displacement: Option<FilterRef>,
    color: Option<FilterRef>,
    crop: Option<Rect>,
) -> Result<FilterRef, FilterError> {
    let f = DisplacementMap::new(x_channel, y_channel, scale, displacement, color)?;
    with_crop(crop, Arc::new(f))
}

fn lighting(
    source: LightSource,
    light_color: Color,
    material: Material,
    surface_scale: f64,
    input: Option<FilterRef>,
    crop: Option<Rect>,
) -> Result<FilterRef, FilterError> {
    let light = Light {
        source,
        color: light_color,
    };

    let f = Lighting::new(light, material, surface_scale, input)?;
    with_crop(crop, Arc::new(f))
}

pub fn distant_lit_diffuse(
    direction: Vector3<f64>,
    light_color: Color,
    surface_scale: f64,
    kd: f64,
    input: Option<FilterRef>,
    crop: Option<Rect>,
) -> Result<FilterRef, FilterError> {
    lighting(
        LightSource::Distant { direction },
        light_color,
        Material::Diffuse { kd },
        surface_scale,
        input,
        crop,
    )
}

pub fn point_lit_diffuse(
    location: Vector3<f64>,
    light_color: Color,
    surface_scale: f64,
    kd: f64,
    input: Option<FilterRef>,
    crop: Option<Rect>,
) -> Result<FilterRef, FilterError> {
    lighting(
        LightSource::Point { location },
        light_color,
        Material::Diffuse { kd },
        surface_scale,
        input,
        crop,
    )
}

/// `cutoff_angle` is the half-angle of the light cone, in degrees.
#[allow(clippy::too_many_arguments)]
pub fn spot_lit_diffuse(
    location: Vector3<f64>,
    target: Vector3<f64>,
    falloff_exponent: f64,
    cutoff_angle: f64,
    light_color: Color,
    surface_scale: f64,
    kd: f64,
    input: Option<FilterRef>,
    crop: Option<Rect>,
) -> Result<FilterRef, FilterError> {
    lighting(
        LightSource::Spot {
            location,
            target,
            falloff_exponent,
            cutoff_angle,
        },
        light_color,
        Material::Diffuse { kd },
        surface_scale,
        input,
        crop,
    )
}

#[allow(clippy::too_many_arguments)]
pub fn distant_lit_specular(
    direction: Vector3<f64>,
    light_color: Color,
    surface_scale: f64,
    ks: f64,
    shininess: f64,
    input: Option<FilterRef>,
    crop: Option<Rect>,
) -> Result<FilterRef, FilterError> {
    lighting(
        LightSource::Distant { direction },
        light_color,
        Material::Specular { ks, shininess },
        surface_scale,
        input,
        crop,
    )
}

#[allow(clippy::too_many_arguments)]
pub fn point_lit_specular(
    location: Vector3<f64>,
    light_color: Color,
    surface_scale: f64,
    ks: f64,
    shininess: f64,
    input: Option<FilterRef>,
    crop: Option<Rect>,
) -> Result<FilterRef, FilterError> {
    lighting(
        LightSource::Point { location },
        light_color,
        Material::Specular { ks, shininess },
        surface_scale,
        input,
        crop,
    )
}

#[allow(clippy::too_many_arguments)]
pub fn spot_lit_specular(
    location: Vector3<f64>,
    target: Vector3<f64>,
    falloff_exponent: f64,
    cutoff_angle: f64,
    light_color: Color,
    surface_scale: f64,
    ks: f64,
    shininess: f64,
    input: Option<FilterRef>,
    crop: Option<Rect>,
) -> Result<FilterRef, FilterError> {
    lighting(
        LightSource::Spot {
            location,
            target,
            falloff_exponent,
            cutoff_angle,
        },
        light_color,
        Material::Specular { ks, shininess },
        surface_scale,
        input,
        crop,
    )
}
