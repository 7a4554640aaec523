//! Coordinate spaces for filter evaluation.
//!
//! A filter graph deals with three coordinate systems:
//!
//! * [`Parameter`] space is where the caller expressed the filter's parameters: crop
//!   rectangles, light positions, displacement scales.
//!
//! * [`Layer`] space is where pixels are processed during one evaluation pass.
//!
//! * [`Device`] space is where the final result is composited.
//!
//! Geometry is wrapped in [`InSpace<S, T>`] so that mixing spaces is a type error; the only
//! way to move a value between spaces is through a [`Mapping`](crate::mapping::Mapping).
//! Operations that stay within one space (intersection, union, outsetting, applying a
//! layer-space transform to a layer-space rectangle) are provided on the wrapper.

use std::fmt;
use std::marker::PhantomData;

use crate::matrix::Matrix;
use crate::point::{IPoint, ISize, Point, Size, Vector};
use crate::rect::{IRect, Rect, ROUND_EPSILON};
use crate::transform::Transform;

/// Marker for the types that name a coordinate space.
pub trait CoordSpace: Copy + fmt::Debug + Default + PartialEq {}

/// Allows declaring `InSpace<Parameter, T>`.
#[derive(Debug, Default, PartialEq, Copy, Clone)]
pub struct Parameter;

/// Allows declaring `InSpace<Layer, T>`.
#[derive(Debug, Default, PartialEq, Copy, Clone)]
pub struct Layer;

/// Allows declaring `InSpace<Device, T>`.
#[derive(Debug, Default, PartialEq, Copy, Clone)]
pub struct Device;

impl CoordSpace for Parameter {}
impl CoordSpace for Layer {}
impl CoordSpace for Device {}

/// A geometric value tagged with the coordinate space it is expressed in.
#[derive(Debug, Default, PartialEq, Copy, Clone)]
pub struct InSpace<S: CoordSpace, T> {
    value: T,

    /// Dummy; used internally for the type parameter `S`
    space: PhantomData<S>,
}

pub type ParameterSpace<T> = InSpace<Parameter, T>;
pub type LayerSpace<T> = InSpace<Layer, T>;
pub type DeviceSpace<T> = InSpace<Device, T>;

impl<S: CoordSpace, T> InSpace<S, T> {
    #[inline]
    pub const fn new(value: T) -> Self {
        InSpace {
            value,
            space: PhantomData,
        }
    }

    /// Unwraps the value.  Use sparingly: the untagged value has lost its space.
    #[inline]
    pub fn into_inner(self) -> T {
        self.value
    }

    #[inline]
    pub fn inner(&self) -> &T {
        &self.value
    }
}

impl<S: CoordSpace, T: Copy> InSpace<S, T> {
    #[inline]
    pub fn get(&self) -> T {
        self.value
    }
}

/// Maps an integer rectangle, taking care to keep one-pixel precision for scale and
/// translate matrices.
pub(crate) fn map_irect(r: &IRect, m: &Matrix) -> IRect {
    if r.is_empty() {
        return IRect::default();
    }

    match m.as_affine() {
        Some(t) if t.is_scale_translate() => {
            let l = t.xx * f64::from(r.x0) + t.x0;
            let rr = t.xx * f64::from(r.x1) + t.x0;
            let tp = t.yy * f64::from(r.y0) + t.y0;
            let b = t.yy * f64::from(r.y1) + t.y0;

            IRect {
                x0: (l.min(rr) + ROUND_EPSILON).floor() as i32,
                y0: (tp.min(b) + ROUND_EPSILON).floor() as i32,
                x1: (l.max(rr) - ROUND_EPSILON).ceil() as i32,
                y1: (tp.max(b) - ROUND_EPSILON).ceil() as i32,
            }
        }

        _ => m.map_rect(&Rect::from(*r)).round_out(),
    }
}

impl<S: CoordSpace> InSpace<S, IRect> {
    #[inline]
    pub fn empty() -> Self {
        Self::new(IRect::default())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    #[inline]
    pub fn left(&self) -> i32 {
        self.value.x0
    }

    #[inline]
    pub fn top(&self) -> i32 {
        self.value.y0
    }

    #[inline]
    pub fn right(&self) -> i32 {
        self.value.x1
    }

    #[inline]
    pub fn bottom(&self) -> i32 {
        self.value.y1
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.value.width()
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.value.height()
    }

    #[inline]
    pub fn size(&self) -> InSpace<S, ISize> {
        InSpace::new(ISize::new(self.width(), self.height()))
    }

    #[inline]
    pub fn top_left(&self) -> InSpace<S, IPoint> {
        InSpace::new(IPoint::new(self.value.x0, self.value.y0))
    }

    #[inline]
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        self.value.intersection(&other.value).map(Self::new)
    }

    /// Union that ignores empty operands.
    #[inline]
    pub fn join(&self, other: &Self) -> Self {
        Self::new(self.value.join(&other.value))
    }

    #[inline]
    pub fn contains(&self, other: &Self) -> bool {
        self.value.contains_rect(&other.value)
    }

    #[inline]
    pub fn outset(&self, by: InSpace<S, ISize>) -> Self {
        if self.is_empty() {
            *self
        } else {
            Self::new(self.value.outset(by.value.width, by.value.height))
        }
    }

    #[inline]
    pub fn offset(&self, by: InSpace<S, IPoint>) -> Self {
        Self::new(self.value.translate((by.value.x, by.value.y)))
    }
}

impl<S: CoordSpace> InSpace<S, Rect> {
    #[inline]
    pub fn round_out(&self) -> InSpace<S, IRect> {
        InSpace::new(self.value.round_out())
    }

    #[inline]
    pub fn round_in(&self) -> InSpace<S, IRect> {
        InSpace::new(self.value.round_in())
    }

    #[inline]
    pub fn round(&self) -> InSpace<S, IRect> {
        InSpace::new(self.value.round())
    }
}

impl<S: CoordSpace> From<InSpace<S, IRect>> for InSpace<S, Rect> {
    #[inline]
    fn from(r: InSpace<S, IRect>) -> Self {
        InSpace::new(Rect::from(r.value))
    }
}

impl<S: CoordSpace> InSpace<S, Size> {
    #[inline]
    pub fn ceil(&self) -> InSpace<S, ISize> {
        InSpace::new(self.value.ceil())
    }
}

impl<S: CoordSpace> InSpace<S, Transform> {
    #[inline]
    pub fn identity() -> Self {
        Self::new(Transform::identity())
    }

    #[inline]
    pub fn translate(p: InSpace<S, IPoint>) -> Self {
        Self::new(Transform::new_translate(
            f64::from(p.value.x),
            f64::from(p.value.y),
        ))
    }

    #[inline]
    pub fn invert(&self) -> Option<Self> {
        self.value.invert().map(Self::new)
    }

    /// Returns a transform that applies `self`, then `next`.
    #[inline]
    pub fn then(&self, next: &Self) -> Self {
        Self::new(self.value.post_transform(&next.value))
    }

    #[inline]
    pub fn map_rect(&self, r: &InSpace<S, IRect>) -> InSpace<S, IRect> {
        InSpace::new(map_irect(&r.value, &Matrix::from(self.value)))
    }

    #[inline]
    pub fn map_point(&self, p: InSpace<S, Point>) -> InSpace<S, Point> {
        InSpace::new(self.value.map_point(p.value))
    }

    /// The smallest rectangle whose image under `self` covers `r`.
    #[inline]
    pub fn inverse_map_rect(&self, r: &InSpace<S, IRect>) -> Option<InSpace<S, IRect>> {
        self.invert().map(|inv| inv.map_rect(r))
    }
}

impl<S: CoordSpace> InSpace<S, Vector> {
    #[inline]
    pub fn x(&self) -> f64 {
        self.value.x
    }

    #[inline]
    pub fn y(&self) -> f64 {
        self.value.y
    }
}

impl<S: CoordSpace> InSpace<S, IPoint> {
    #[inline]
    pub fn x(&self) -> i32 {
        self.value.x
    }

    #[inline]
    pub fn y(&self) -> i32 {
        self.value.y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_path_keeps_precision() {
        // 2^24 + 1 is not representable in f32, but is fine in f64 and must survive
        // a translation.
        let r = IRect::new(16_777_217, 0, 16_777_219, 1);
        let m = Matrix::from(Transform::new_translate(1.0, 0.0));

        assert_eq!(map_irect(&r, &m), IRect::new(16_777_218, 0, 16_777_220, 1));
    }

    #[test]
    fn fractional_scale_rounds_out() {
        let r = IRect::new(1, 1, 3, 3);
        let m = Matrix::from(Transform::new_scale(1.5, 1.5));

        assert_eq!(map_irect(&r, &m), IRect::new(1, 1, 5, 5));
    }

    #[test]
    fn flip_keeps_rect_sorted() {
        let r = IRect::new(0, 0, 10, 5);
        let m = Matrix::from(Transform::new_scale(-1.0, 1.0));

        assert_eq!(map_irect(&r, &m), IRect::new(-10, 0, 0, 5));
    }

    #[test]
    fn empty_maps_to_empty() {
        let m = Matrix::from(Transform::new_translate(10.0, 10.0));
        assert!(map_irect(&IRect::new(3, 3, 3, 8), &m).is_empty());
    }

    #[test]
    fn layer_rect_operations() {
        let a = LayerSpace::new(IRect::new(0, 0, 10, 10));
        let b = LayerSpace::new(IRect::new(5, 5, 20, 20));

        assert_eq!(a.intersect(&b), Some(LayerSpace::new(IRect::new(5, 5, 10, 10))));
        assert_eq!(a.join(&b).get(), IRect::new(0, 0, 20, 20));
        assert_eq!(
            a.outset(LayerSpace::new(ISize::new(1, 2))).get(),
            IRect::new(-1, -2, 11, 12)
        );
        assert!(LayerSpace::<IRect>::empty()
            .outset(LayerSpace::new(ISize::new(1, 1)))
            .is_empty());
    }

    #[test]
    fn inverse_map_covers_output() {
        let t = LayerSpace::new(Transform::new_scale(2.0, 2.0));
        let out = LayerSpace::new(IRect::new(0, 0, 9, 9));

        let needed = t.inverse_map_rect(&out).unwrap();
        assert_eq!(needed.get(), IRect::new(0, 0, 5, 5));
        assert!(t.map_rect(&needed).contains(&out));
    }
}
