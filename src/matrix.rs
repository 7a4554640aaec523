//! Projective 3×3 matrices.
//!
//! The canvas transform handed to a filter evaluation may carry perspective, so the
//! layer-to-device part of a [`Mapping`](crate::mapping::Mapping) is kept as a full
//! homogeneous matrix.  Points are column vectors: `p' = M · (x, y, 1)ᵀ`.

use nalgebra::{Matrix3, Vector3};

use crate::point::{Point, Size, Vector};
use crate::rect::Rect;
use crate::transform::Transform;

/// Below this, the homogeneous `w` of a mapped point is treated as zero.
const W_NEARLY_ZERO: f64 = 1.0 / 4096.0;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Matrix(Matrix3<f64>);

impl Default for Matrix {
    fn default() -> Self {
        Matrix::identity()
    }
}

impl From<Transform> for Matrix {
    fn from(t: Transform) -> Self {
        Matrix(Matrix3::new(
            t.xx, t.xy, t.x0, //
            t.yx, t.yy, t.y0, //
            0.0, 0.0, 1.0,
        ))
    }
}

impl Matrix {
    pub fn identity() -> Self {
        Matrix(Matrix3::identity())
    }

    /// Builds a matrix from its rows.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sx: f64,
        kx: f64,
        tx: f64,
        ky: f64,
        sy: f64,
        ty: f64,
        p0: f64,
        p1: f64,
        p2: f64,
    ) -> Self {
        Matrix(Matrix3::new(sx, kx, tx, ky, sy, ty, p0, p1, p2))
    }

    pub fn new_scale(sx: f64, sy: f64) -> Self {
        Matrix::from(Transform::new_scale(sx, sy))
    }

    #[inline]
    pub fn has_perspective(&self) -> bool {
        let m = &self.0;
        m[(2, 0)] != 0.0 || m[(2, 1)] != 0.0 || m[(2, 2)] != 1.0
    }

    /// The affine part of this matrix, if it has no perspective.
    pub fn as_affine(&self) -> Option<Transform> {
        if self.has_perspective() {
            None
        } else {
            let m = &self.0;
            Some(Transform::new_unchecked(
                m[(0, 0)],
                m[(1, 0)],
                m[(0, 1)],
                m[(1, 1)],
                m[(0, 2)],
                m[(1, 2)],
            ))
        }
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }

    pub fn is_scale_translate(&self) -> bool {
        self.as_affine().map_or(false, |t| t.is_scale_translate())
    }

    /// Composes two matrices; the result applies `self` first, then `next`.
    #[must_use]
    pub fn then(&self, next: &Matrix) -> Matrix {
        Matrix(next.0 * self.0)
    }

    /// Returns a matrix that scales by `(sx, sy)` before applying `self`.
    #[must_use]
    pub fn pre_scale(&self, sx: f64, sy: f64) -> Matrix {
        Matrix::new_scale(sx, sy).then(self)
    }

    #[must_use]
    pub fn invert(&self) -> Option<Matrix> {
        if !self.is_finite() {
            return None;
        }

        self.0
            .try_inverse()
            .filter(|inv| inv.iter().all(|v| v.is_finite()))
            .map(Matrix)
    }

    fn map_homogeneous(&self, x: f64, y: f64) -> Vector3<f64> {
        self.0 * Vector3::new(x, y, 1.0)
    }

    pub fn map_point(&self, p: Point) -> Point {
        let h = self.map_homogeneous(p.x, p.y);
        if self.has_perspective() {
            Point::new(h.x / h.z, h.y / h.z)
        } else {
            Point::new(h.x, h.y)
        }
    }

    /// Maps a vector, ignoring translation.
    ///
    /// With perspective this is only meaningful as the difference of the mapped origin and
    /// the mapped tip, which is what is returned.
    pub fn map_vector(&self, v: Vector) -> Vector {
        if let Some(t) = self.as_affine() {
            t.map_vector(v)
        } else {
            self.map_point(Point::new(v.x, v.y)) - self.map_point(Point::default())
        }
    }

    pub fn map_size(&self, s: Size) -> Size {
        let w = self.map_vector(Vector::new(s.width, 0.0));
        let h = self.map_vector(Vector::new(0.0, s.height));
        Size::new(w.length(), h.length())
    }

    /// Bounds of the mapped corners of `rect`.
    ///
    /// Corners that land behind the `w = 0` plane make the result unbounded in the
    /// directions they would have been projected to, so an infinite rect is returned.
    pub fn map_rect(&self, rect: &Rect) -> Rect {
        if let Some(t) = self.as_affine() {
            return t.transform_rect(rect);
        }

        let corners = [
            (rect.x0, rect.y0),
            (rect.x1, rect.y0),
            (rect.x0, rect.y1),
            (rect.x1, rect.y1),
        ];

        let mut out = Rect::new(
            f64::INFINITY,
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::NEG_INFINITY,
        );

        for (x, y) in corners {
            let h = self.map_homogeneous(x, y);
            if h.z < W_NEARLY_ZERO {
                return Rect::new(
                    f64::NEG_INFINITY,
                    f64::NEG_INFINITY,
                    f64::INFINITY,
                    f64::INFINITY,
                );
            }
            let (px, py) = (h.x / h.z, h.y / h.z);
            out.x0 = out.x0.min(px);
            out.y0 = out.y0.min(py);
            out.x1 = out.x1.max(px);
            out.y1 = out.y1.max(py);
        }

        out
    }

    /// Splits an affine matrix into `(sx, sy)` and the remainder `R` such that
    /// `self == scale(sx, sy).then(R)`.
    ///
    /// Returns `None` for perspective matrices and for degenerate scales.
    pub fn decompose_scale(&self) -> Option<(f64, f64, Matrix)> {
        let t = self.as_affine()?;

        let sx = t.xx.hypot(t.yx);
        let sy = t.xy.hypot(t.yy);

        if !sx.is_finite() || !sy.is_finite() || sx <= f64::EPSILON || sy <= f64::EPSILON {
            return None;
        }

        let remainder = Matrix::from(t.pre_scale(1.0 / sx, 1.0 / sy));
        Some((sx, sy, remainder))
    }

    /// Local area scale factor at `p`, i.e. `|det J|` of the projected mapping.
    ///
    /// Infinite when `p` maps onto or behind the `w = 0` plane.
    pub fn differential_area_scale(&self, p: Point) -> f64 {
        let h = self.map_homogeneous(p.x, p.y);
        if h.z < W_NEARLY_ZERO {
            return f64::INFINITY;
        }

        let m = &self.0;
        let jacobian = Matrix3::new(
            h.x,
            h.y,
            h.z,
            m[(0, 0)],
            m[(1, 0)],
            m[(2, 0)],
            m[(0, 1)],
            m[(1, 1)],
            m[(2, 1)],
        );

        let denom = 1.0 / h.z;
        (jacobian.determinant() * denom * denom * denom).abs()
    }

    /// Raw bits of the coefficients, for hashing.
    pub(crate) fn to_bits(self) -> [u64; 9] {
        let mut bits = [0; 9];
        for (b, v) in bits.iter_mut().zip(self.0.iter()) {
            *b = v.to_bits();
        }
        bits
    }
}
