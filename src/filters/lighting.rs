//! Diffuse and specular lighting.
//!
//! The input's alpha channel is read as a height map.  Surface normals come from a
//! Sobel kernel over each pixel's 3×3 neighborhood, so every output pixel needs one
//! more pixel of input on each side.
//!
//! Where the input was evaluated over all of that extra pixel, its edge is an artifact of
//! the requested area and samples beyond it are clamped to the edge.  Where the input
//! ended on its own, the surface drops to zero height beyond it.  Each side is decided
//! separately.

use float_cmp::approx_eq;
use nalgebra::Vector3;

use crate::color::{self, Color, ColorSpace};
use crate::effect::{self, EffectBuilder, EffectDescription, KnownEffect};
use crate::error::FilterError;
use crate::mapping::{Mapping, MatrixCapability};
use crate::point::{ISize, Point};
use crate::rect::IRect;
use crate::shader::{SamplingOptions, Shader};
use crate::space::{LayerSpace, ParameterSpace};
use crate::transform::Transform;
use crate::util::clamp;

use super::context::Context;
use super::result::{FilterResult, FilterResultBuilder, ShaderFlags};
use super::{FilterBase, FilterRef, ImageFilter};

/// Where the light comes from, in parameter space.
#[derive(Debug, Clone, PartialEq)]
pub enum LightSource {
    /// Infinitely far away; `direction` points from the surface towards the light.
    Distant { direction: Vector3<f64> },

    Point { location: Vector3<f64> },

    Spot {
        location: Vector3<f64>,
        target: Vector3<f64>,
        falloff_exponent: f64,
        /// Half-angle of the cone, in degrees.
        cutoff_angle: f64,
    },
}

impl LightSource {
    /// A distant light given by its angles, in degrees.
    pub fn distant_from_angles(azimuth: f64, elevation: f64) -> LightSource {
        let azimuth = azimuth.to_radians();
        let elevation = elevation.to_radians();

        LightSource::Distant {
            direction: Vector3::new(
                azimuth.cos() * elevation.cos(),
                azimuth.sin() * elevation.cos(),
                elevation.sin(),
            ),
        }
    }

    fn is_finite(&self) -> bool {
        let finite = |v: &Vector3<f64>| v.iter().all(|c| c.is_finite());

        match *self {
            LightSource::Distant { ref direction } => finite(direction),
            LightSource::Point { ref location } => finite(location),
            LightSource::Spot {
                ref location,
                ref target,
                falloff_exponent,
                cutoff_angle,
            } => {
                finite(location)
                    && finite(target)
                    && falloff_exponent.is_finite()
                    && cutoff_angle.is_finite()
            }
        }
    }

    fn type_index(&self) -> f32 {
        match *self {
            LightSource::Distant { .. } => 0.0,
            LightSource::Point { .. } => 1.0,
            LightSource::Spot { .. } => 2.0,
        }
    }
}

/// A light with an sRGB color; alpha is ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    pub source: LightSource,
    pub color: Color,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Material {
    Diffuse { kd: f64 },
    Specular { ks: f64, shininess: f64 },
}

impl Material {
    /// How much light the surface sends towards the viewer.
    #[inline]
    fn compute_factor(&self, normal: Vector3<f64>, light_vector: Vector3<f64>) -> f64 {
        match *self {
            Material::Diffuse { kd } => kd * normal.dot(&light_vector),

            Material::Specular { ks, shininess } => {
                let h = light_vector + Vector3::new(0.0, 0.0, 1.0);
                let h_norm = h.norm();

                if h_norm == 0.0 {
                    return 0.0;
                }

                let n_dot_h = (normal.dot(&h) / h_norm).max(0.0);

                if approx_eq!(f64, shininess, 1.0) {
                    ks * n_dot_h
                } else {
                    ks * n_dot_h.powf(shininess)
                }
            }
        }
    }
}

/// Scales a distance that is neither horizontal nor vertical, like a light's height.
#[inline]
fn transform_dist(t: &Transform, d: f64) -> f64 {
    d * (t.xx.powi(2) + t.yy.powi(2)).sqrt() / std::f64::consts::SQRT_2
}

/// Normal of the height field `alpha · surface_scale` at the center of `alpha`.
///
/// `alpha` is indexed by row, then column.
fn surface_normal(alpha: &[[f32; 3]; 3], surface_scale: f64) -> Vector3<f64> {
    let a = |row: usize, col: usize| f64::from(alpha[row][col]);

    let nx = -(a(0, 2) + 2.0 * a(1, 2) + a(2, 2) - a(0, 0) - 2.0 * a(1, 0) - a(2, 0)) / 4.0;
    let ny = -(a(2, 0) + 2.0 * a(2, 1) + a(2, 2) - a(0, 0) - 2.0 * a(0, 1) - a(0, 2)) / 4.0;

    Vector3::new(nx * surface_scale, ny * surface_scale, 1.0).normalize()
}

fn vec3(v: &[f32]) -> Vector3<f64> {
    Vector3::new(f64::from(v[0]), f64::from(v[1]), f64::from(v[2]))
}

pub(crate) fn effect_description() -> EffectDescription {
    EffectDescription::new("lighting", |args, p| {
        let light_type = args.float(0) as u32;
        let light_pos = vec3(args.uniform(1));
        let spot_dir = vec3(args.uniform(2));
        let spot_exponent = f64::from(args.float(3));
        let cone_cos = f64::from(args.float(4));
        let light_color = args.uniform(5);
        let material = if args.float(6) > 0.5 {
            Material::Specular {
                ks: f64::from(args.float(8)),
                shininess: f64::from(args.float(9)),
            }
        } else {
            Material::Diffuse {
                kd: f64::from(args.float(8)),
            }
        };
        let surface_scale = f64::from(args.float(7));
        let edges = args.uniform(10);
        let clamp_edges = args.uniform(11);

        let sample = |dx: f64, dy: f64| {
            let mut x = p.x + dx;
            let mut y = p.y + dy;

            if clamp_edges[0] > 0.5 && x < f64::from(edges[0]) {
                x = f64::from(edges[0]) + 0.5;
            }
            if clamp_edges[1] > 0.5 && y < f64::from(edges[1]) {
                y = f64::from(edges[1]) + 0.5;
            }
            if clamp_edges[2] > 0.5 && x > f64::from(edges[2]) {
                x = f64::from(edges[2]) - 0.5;
            }
            if clamp_edges[3] > 0.5 && y > f64::from(edges[3]) {
                y = f64::from(edges[3]) - 0.5;
            }

            args.child(0, Point::new(x, y)).a
        };

        let mut alpha = [[0.0f32; 3]; 3];
        for (row, dy) in [-1.0, 0.0, 1.0].iter().enumerate() {
            for (col, dx) in [-1.0, 0.0, 1.0].iter().enumerate() {
                alpha[row][col] = sample(*dx, *dy);
            }
        }

        let normal = surface_normal(&alpha, surface_scale);
        let z = f64::from(alpha[1][1]) * surface_scale;

        let light_vector = if light_type == 0 {
            light_pos
        } else {
            let v = light_pos - Vector3::new(p.x, p.y, z);
            v.try_normalize(0.0).unwrap_or(v)
        };

        let color_factor = if light_type == 2 {
            let minus_l_dot_s = -light_vector.dot(&spot_dir);
            if minus_l_dot_s <= 0.0 || minus_l_dot_s < cone_cos {
                0.0
            } else {
                minus_l_dot_s.powf(spot_exponent)
            }
        } else {
            1.0
        };

        let factor = material.compute_factor(normal, light_vector) * color_factor;
        let compute = |c: f32| clamp(factor * f64::from(c), 0.0, 1.0) as f32;

        let r = compute(light_color[0]);
        let g = compute(light_color[1]);
        let b = compute(light_color[2]);

        let a = match material {
            Material::Diffuse { .. } => 1.0,
            Material::Specular { .. } => r.max(g).max(b),
        };

        Color::new(r, g, b, a)
    })
    .uniform("light_type", 1)
    .uniform("light_pos", 3)
    .uniform("spot_dir", 3)
    .uniform("spot_exponent", 1)
    .uniform("cone_cos", 1)
    .uniform("light_color", 3)
    .uniform("material_type", 1)
    .uniform("surface_scale", 1)
    .uniform("k", 1)
    .uniform("shininess", 1)
    .uniform("edges", 4)
    .uniform("clamp_edges", 4)
    .child("alpha_map")
}

/// Lights the height map given by the input's alpha channel.
#[derive(Debug)]
pub struct Lighting {
    base: FilterBase,
    light: Light,
    material: Material,
    surface_scale: f64,
}

/// A light converted to layer space.
struct LayerLight {
    position: Vector3<f64>,
    spot_direction: Vector3<f64>,
}

impl Lighting {
    pub fn new(
        light: Light,
        material: Material,
        surface_scale: f64,
        input: Option<FilterRef>,
    ) -> Result<Lighting, FilterError> {
        if !light.source.is_finite() || !surface_scale.is_finite() {
            return Err(FilterError::invalid("lighting parameters must be finite"));
        }

        match material {
            Material::Diffuse { kd } if !(kd.is_finite() && kd >= 0.0) => {
                return Err(FilterError::invalid("diffuse constant must be non-negative"));
            }

            Material::Specular { ks, shininess }
                if !(ks.is_finite() && ks >= 0.0 && shininess.is_finite()) =>
            {
                return Err(FilterError::invalid(
                    "specular constant must be non-negative",
                ));
            }

            _ => (),
        }

        if let LightSource::Distant { ref direction } = light.source {
            if direction.norm() == 0.0 {
                return Err(FilterError::invalid("distant light needs a direction"));
            }
        }

        let material = match material {
            Material::Specular { ks, shininess } => Material::Specular {
                ks,
                shininess: clamp(shininess, 1.0, 128.0),
            },
            m => m,
        };

        Ok(Lighting {
            base: FilterBase::new(vec![input]),
            light,
            material,
            surface_scale,
        })
    }

    pub fn light(&self) -> &Light {
        &self.light
    }

    pub fn material(&self) -> Material {
        self.material
    }

    fn layer_light(&self, mapping: &Mapping) -> LayerLight {
        let t = mapping.layer_matrix();

        let to_layer = |v: &Vector3<f64>| {
            let p = mapping
                .param_to_layer(ParameterSpace::new(Point::new(v.x, v.y)))
                .get();
            Vector3::new(p.x, p.y, transform_dist(&t, v.z))
        };

        match self.light.source {
            LightSource::Distant { ref direction } => LayerLight {
                position: direction.normalize(),
                spot_direction: Vector3::zeros(),
            },

            LightSource::Point { ref location } => LayerLight {
                position: to_layer(location),
                spot_direction: Vector3::zeros(),
            },

            LightSource::Spot {
                ref location,
                ref target,
                ..
            } => {
                let position = to_layer(location);
                let d = to_layer(target) - position;

                LayerLight {
                    position,
                    spot_direction: d.try_normalize(0.0).unwrap_or(d),
                }
            }
        }
    }

    fn make_shader(
        &self,
        ctx: &Context<'_>,
        edges: LayerSpace<IRect>,
        clamp_edges: [bool; 4],
        alpha_map: Option<Shader>,
    ) -> Option<Shader> {
        let mapping = ctx.mapping();
        let light = self.layer_light(mapping);

        let (spot_exponent, cone_cos) = match self.light.source {
            LightSource::Spot {
                falloff_exponent,
                cutoff_angle,
                ..
            } => (falloff_exponent, cutoff_angle.to_radians().cos()),
            _ => (1.0, -1.0),
        };

        let c = color::convert(
            Color::new(self.light.color.r, self.light.color.g, self.light.color.b, 1.0),
            Some(ColorSpace::Srgb),
            ctx.color_space(),
        );

        let (material_type, k, shininess) = match self.material {
            Material::Diffuse { kd } => (0.0, kd, 1.0),
            Material::Specular { ks, shininess } => (1.0, ks, shininess),
        };

        let surface_scale = transform_dist(&mapping.layer_matrix(), self.surface_scale);
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        let pos = |v: &Vector3<f64>| [v.x as f32, v.y as f32, v.z as f32];

        let mut builder = EffectBuilder::new(effect::effect_for(KnownEffect::Lighting));

        builder
            .uniform("light_type", &[self.light.source.type_index()])
            .ok()?
            .uniform("light_pos", &pos(&light.position))
            .ok()?
            .uniform("spot_dir", &pos(&light.spot_direction))
            .ok()?
            .uniform("spot_exponent", &[spot_exponent as f32])
            .ok()?
            .uniform("cone_cos", &[cone_cos as f32])
            .ok()?
            .uniform("light_color", &[c.r, c.g, c.b])
            .ok()?
            .uniform("material_type", &[material_type])
            .ok()?
            .uniform("surface_scale", &[surface_scale as f32])
            .ok()?
            .uniform("k", &[k as f32])
            .ok()?
            .uniform("shininess", &[shininess as f32])
            .ok()?
            .uniform(
                "edges",
                &[
                    edges.left() as f32,
                    edges.top() as f32,
                    edges.right() as f32,
                    edges.bottom() as f32,
                ],
            )
            .ok()?
            .uniform(
                "clamp_edges",
                &[
                    flag(clamp_edges[0]),
                    flag(clamp_edges[1]),
                    flag(clamp_edges[2]),
                    flag(clamp_edges[3]),
                ],
            )
            .ok()?
            .child("alpha_map", alpha_map)
            .ok()?;

        builder.make_shader().ok()
    }
}

fn sobel_outset(desired: LayerSpace<IRect>) -> LayerSpace<IRect> {
    desired.outset(LayerSpace::new(ISize::new(1, 1)))
}

impl ImageFilter for Lighting {
    fn base(&self) -> &FilterBase {
        &self.base
    }

    fn on_filter_image(&self, ctx: &Context<'_>) -> FilterResult {
        let required = sobel_outset(ctx.desired_output());
        let child = self
            .base
            .child_output(0, &ctx.with_new_desired_output(required));

        // A missing input is a flat surface at zero height.
        let edges = child
            .layer_bounds()
            .intersect(&required)
            .unwrap_or(required);

        let clamp_edges = [
            edges.left() == required.left(),
            edges.top() == required.top(),
            edges.right() == required.right(),
            edges.bottom() == required.bottom(),
        ];

        let mut builder = FilterResultBuilder::new(ctx);
        builder.add(
            child,
            Some(required),
            ShaderFlags::SAMPLED_REPEATEDLY,
            SamplingOptions::Nearest,
        );

        builder.eval(
            |inputs| self.make_shader(ctx, edges, clamp_edges, inputs[0].clone()),
            None,
            false,
        )
    }

    fn on_get_input_layer_bounds(
        &self,
        mapping: &Mapping,
        desired: LayerSpace<IRect>,
        content: Option<LayerSpace<IRect>>,
    ) -> LayerSpace<IRect> {
        self.base
            .child_input_layer_bounds(0, mapping, sobel_outset(desired), content)
    }

    fn on_get_output_layer_bounds(
        &self,
        _mapping: &Mapping,
        _content: Option<LayerSpace<IRect>>,
    ) -> Option<LayerSpace<IRect>> {
        // A flat surface is lit too.
        None
    }

    fn on_affects_transparent_black(&self) -> bool {
        true
    }

    fn on_get_ctm_capability(&self) -> MatrixCapability {
        MatrixCapability::ScaleTranslate
    }
}
