//! Affine transformations.
//!
//! A [`Transform`] maps `(x, y)` to `(xx * x + xy * y + x0, yx * x + yy * y + y0)`.  The
//! projective counterpart is [`Matrix`](crate::matrix::Matrix).

use crate::point::{Point, Size, Vector};
use crate::rect::Rect;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transform {
    pub xx: f64,
    pub yx: f64,
    pub xy: f64,
    pub yy: f64,
    pub x0: f64,
    pub y0: f64,
}

impl Transform {
    #[inline]
    pub fn new_unchecked(xx: f64, yx: f64, xy: f64, yy: f64, x0: f64, y0: f64) -> Self {
        Self {
            xx,
            xy,
            x0,
            yx,
            yy,
            y0,
        }
    }

    #[inline]
    pub fn identity() -> Self {
        Self::new_unchecked(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
    }

    #[inline]
    pub fn new_translate(tx: f64, ty: f64) -> Self {
        Self::new_unchecked(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    #[inline]
    pub fn new_scale(sx: f64, sy: f64) -> Self {
        Self::new_unchecked(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    /// Rotation by `radians`, counter-clockwise in a y-up system (clockwise on screen).
    #[inline]
    pub fn new_rotate(radians: f64) -> Self {
        let (s, c) = radians.sin_cos();
        Self::new_unchecked(c, s, -s, c, 0.0, 0.0)
    }

    /// The transform that maps `src` onto `dst`, or `None` if `src` is empty.
    pub fn rect_to_rect(src: &Rect, dst: &Rect) -> Option<Self> {
        if src.is_empty() {
            return None;
        }

        let sx = dst.width() / src.width();
        let sy = dst.height() / src.height();

        Some(Self::new_unchecked(
            sx,
            0.0,
            0.0,
            sy,
            dst.x0 - src.x0 * sx,
            dst.y0 - src.y0 * sy,
        ))
    }

    /// Composes two transforms; the result applies `t1` first, then `t2`.
    #[must_use]
    pub fn multiply(t1: &Transform, t2: &Transform) -> Self {
        Transform {
            xx: t1.xx * t2.xx + t1.yx * t2.xy,
            yx: t1.xx * t2.yx + t1.yx * t2.yy,
            xy: t1.xy * t2.xx + t1.yy * t2.xy,
            yy: t1.xy * t2.yx + t1.yy * t2.yy,
            x0: t1.x0 * t2.xx + t1.y0 * t2.xy + t2.x0,
            y0: t1.x0 * t2.yx + t1.y0 * t2.yy + t2.y0,
        }
    }

    /// Returns a transform that applies `t` before `self`.
    #[inline]
    pub fn pre_transform(&self, t: &Transform) -> Self {
        Self::multiply(t, self)
    }

    /// Returns a transform that applies `t` after `self`.
    #[inline]
    pub fn post_transform(&self, t: &Transform) -> Self {
        Self::multiply(self, t)
    }

    #[inline]
    pub fn pre_translate(&self, x: f64, y: f64) -> Self {
        self.pre_transform(&Transform::new_translate(x, y))
    }

    #[inline]
    pub fn pre_scale(&self, sx: f64, sy: f64) -> Self {
        self.pre_transform(&Transform::new_scale(sx, sy))
    }

    #[inline]
    pub fn post_translate(&self, x: f64, y: f64) -> Self {
        self.post_transform(&Transform::new_translate(x, y))
    }

    #[inline]
    pub fn post_scale(&self, sx: f64, sy: f64) -> Self {
        self.post_transform(&Transform::new_scale(sx, sy))
    }

    #[inline]
    pub fn determinant(&self) -> f64 {
        self.xx * self.yy - self.xy * self.yx
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        [self.xx, self.yx, self.xy, self.yy, self.x0, self.y0]
            .iter()
            .all(|v| v.is_finite())
    }

    #[inline]
    pub fn is_invertible(&self) -> bool {
        let det = self.determinant();

        det != 0.0 && det.is_finite()
    }

    #[must_use]
    pub fn invert(&self) -> Option<Self> {
        let det = self.determinant();

        if det == 0.0 || !det.is_finite() {
            return None;
        }

        let inv_det = 1.0 / det;

        Some(Transform::new_unchecked(
            inv_det * self.yy,
            inv_det * (-self.yx),
            inv_det * (-self.xy),
            inv_det * self.xx,
            inv_det * (self.xy * self.y0 - self.yy * self.x0),
            inv_det * (self.yx * self.x0 - self.xx * self.y0),
        ))
    }

    #[inline]
    pub fn is_scale_translate(&self) -> bool {
        self.yx == 0.0 && self.xy == 0.0
    }

    #[inline]
    pub fn transform_distance(&self, dx: f64, dy: f64) -> (f64, f64) {
        (dx * self.xx + dy * self.xy, dx * self.yx + dy * self.yy)
    }

    #[inline]
    pub fn transform_point(&self, px: f64, py: f64) -> (f64, f64) {
        let (x, y) = self.transform_distance(px, py);
        (x + self.x0, y + self.y0)
    }

    #[inline]
    pub fn map_point(&self, p: Point) -> Point {
        let (x, y) = self.transform_point(p.x, p.y);
        Point::new(x, y)
    }

    #[inline]
    pub fn map_vector(&self, v: Vector) -> Vector {
        let (x, y) = self.transform_distance(v.x, v.y);
        Vector::new(x, y)
    }

    /// Maps a size as the absolute extent of the mapped `(width, 0)` and `(0, height)`
    /// vectors.
    #[inline]
    pub fn map_size(&self, s: Size) -> Size {
        let (wx, wy) = self.transform_distance(s.width, 0.0);
        let (hx, hy) = self.transform_distance(0.0, s.height);
        Size::new(wx.hypot(wy), hx.hypot(hy))
    }

    /// Bounding box of the four mapped corners.
    pub fn transform_rect(&self, rect: &Rect) -> Rect {
        let corners = [
            (rect.x0, rect.y0),
            (rect.x1, rect.y0),
            (rect.x0, rect.y1),
            (rect.x1, rect.y1),
        ];

        let (x, y) = self.transform_point(rect.x0, rect.y0);
        let start = Rect::new(x, y, x, y);

        corners.iter().skip(1).fold(start, |r, &(cx, cy)| {
            let (x, y) = self.transform_point(cx, cy);
            Rect::new(r.x0.min(x), r.y0.min(y), r.x1.max(x), r.y1.max(y))
        })
    }
}

impl Default for Transform {
    #[inline]
    fn default() -> Transform {
        Transform::identity()
    }
}
