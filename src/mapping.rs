//! Decomposition of the canvas transform into layer and device parts.
//!
//! A filter graph is evaluated in a layer space chosen so that the graph can do its work
//! with the kinds of transforms its nodes support.  Whatever part of the canvas transform
//! could not be absorbed into layer space is applied when the filtered layer is drawn to
//! the device.

use crate::matrix::Matrix;
use crate::point::{Point, Size, Vector};
use crate::rect::{IRect, Rect};
use crate::space::{map_irect, DeviceSpace, LayerSpace, ParameterSpace};
use crate::transform::Transform;

/// How much of the canvas transform a filter can handle in its own layer space.
///
/// Ordered from least to most capable, so that the capability of a graph is the minimum
/// over its nodes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MatrixCapability {
    /// Only integer translations; everything else happens when drawing to the device.
    Translate,
    /// Axis-aligned scales and translations.
    ScaleTranslate,
    /// Any affine transform.
    Complex,
}

/// Geometry that can be mapped through a [`Matrix`].
pub trait Mappable: Sized {
    fn map_with(&self, m: &Matrix) -> Self;
}

impl Mappable for IRect {
    fn map_with(&self, m: &Matrix) -> Self {
        map_irect(self, m)
    }
}

impl Mappable for Rect {
    fn map_with(&self, m: &Matrix) -> Self {
        m.map_rect(self)
    }
}

impl Mappable for Point {
    fn map_with(&self, m: &Matrix) -> Self {
        m.map_point(*self)
    }
}

impl Mappable for Vector {
    fn map_with(&self, m: &Matrix) -> Self {
        m.map_vector(*self)
    }
}

impl Mappable for Size {
    fn map_with(&self, m: &Matrix) -> Self {
        m.map_size(*self)
    }
}

/// A transform `T` mapped through `M` is the conjugate `M · T · M⁻¹`, i.e. the same
/// operation expressed in the destination space.
///
/// Only affine, invertible `M` are meaningful here; anything else leaves `T` unchanged.
impl Mappable for Transform {
    fn map_with(&self, m: &Matrix) -> Self {
        let conjugate = m
            .as_affine()
            .and_then(|fwd| fwd.invert().map(|inv| (fwd, inv)))
            .map(|(fwd, inv)| inv.post_transform(self).post_transform(&fwd));

        debug_assert!(conjugate.is_some(), "transform mapped through a projective matrix");

        conjugate.unwrap_or(*self)
    }
}

/// The matrices that relate parameter, layer and device spaces for one evaluation pass.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Mapping {
    param_to_layer: Transform,
    layer_to_param: Transform,
    layer_to_device: Matrix,
    device_to_layer: Matrix,
}

impl Default for Mapping {
    fn default() -> Self {
        Mapping {
            param_to_layer: Transform::identity(),
            layer_to_param: Transform::identity(),
            layer_to_device: Matrix::identity(),
            device_to_layer: Matrix::identity(),
        }
    }
}

impl Mapping {
    /// A mapping whose layer space is the device space, reached from parameter space
    /// through `param_to_layer`.
    pub fn new(param_to_layer: Transform) -> Option<Mapping> {
        Mapping::from_parts(param_to_layer, Matrix::identity())
    }

    /// Assembles a mapping, failing if either matrix can't be inverted.
    pub fn from_parts(param_to_layer: Transform, layer_to_device: Matrix) -> Option<Mapping> {
        if !param_to_layer.is_finite() {
            return None;
        }

        let layer_to_param = param_to_layer.invert()?;
        let device_to_layer = layer_to_device.invert()?;

        Some(Mapping {
            param_to_layer,
            layer_to_param,
            layer_to_device,
            device_to_layer,
        })
    }

    /// Splits the canvas transform `ctm` into a layer matrix that a graph with the given
    /// `capability` can process, and the remainder that is applied afterwards.
    ///
    /// `representative_point` is a parameter-space location used to pick a uniform scale
    /// when `ctm` has perspective.  Returns `None` if the remainder isn't invertible, in
    /// which case the graph produces nothing.
    pub fn decompose_ctm(
        ctm: &Matrix,
        capability: MatrixCapability,
        representative_point: ParameterSpace<Point>,
    ) -> Option<Mapping> {
        let affine = ctm.as_affine();

        let (layer, remainder) = match (capability, affine) {
            (MatrixCapability::Translate, _) => (Transform::identity(), *ctm),

            (MatrixCapability::Complex, Some(t)) => (t, Matrix::identity()),

            (_, Some(t)) if t.is_scale_translate() => (t, Matrix::identity()),

            _ => match ctm.decompose_scale() {
                Some((sx, sy, remainder)) => (Transform::new_scale(sx, sy), remainder),

                None => {
                    let area = ctm.differential_area_scale(representative_point.get());
                    let s = if area.is_finite() && area > f64::EPSILON {
                        area.sqrt()
                    } else {
                        1.0
                    };

                    (Transform::new_scale(s, s), ctm.pre_scale(1.0 / s, 1.0 / s))
                }
            },
        };

        Mapping::from_parts(layer, remainder)
    }

    /// The parameter-to-layer transform.
    #[inline]
    pub fn layer_matrix(&self) -> Transform {
        self.param_to_layer
    }

    /// The layer-to-parameter transform.
    #[inline]
    pub fn layer_to_param_matrix(&self) -> Transform {
        self.layer_to_param
    }

    /// The remainder applied when drawing the filtered layer.
    #[inline]
    pub fn device_matrix(&self) -> Matrix {
        self.layer_to_device
    }

    #[inline]
    pub fn total_matrix(&self) -> Matrix {
        Matrix::from(self.param_to_layer).then(&self.layer_to_device)
    }

    pub fn param_to_layer<T: Mappable>(&self, v: ParameterSpace<T>) -> LayerSpace<T> {
        LayerSpace::new(v.inner().map_with(&Matrix::from(self.param_to_layer)))
    }

    pub fn layer_to_param<T: Mappable>(&self, v: LayerSpace<T>) -> ParameterSpace<T> {
        ParameterSpace::new(v.inner().map_with(&Matrix::from(self.layer_to_param)))
    }

    pub fn layer_to_device<T: Mappable>(&self, v: LayerSpace<T>) -> DeviceSpace<T> {
        DeviceSpace::new(v.inner().map_with(&self.layer_to_device))
    }

    pub fn device_to_layer<T: Mappable>(&self, v: DeviceSpace<T>) -> LayerSpace<T> {
        LayerSpace::new(v.inner().map_with(&self.device_to_layer))
    }
}
