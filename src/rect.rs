//! Types for rectangles.

/// Slack used when rounding float rectangles to pixels, so that values that are off by
/// floating-point noise from an integer don't grow or shrink the result by a whole pixel.
pub const ROUND_EPSILON: f64 = 1e-3;

#[allow(clippy::module_inception)]
mod rect {
    use float_cmp::approx_eq;
    use num_traits::Zero;

    // Use our own min() and max() that are acceptable for floating point

    fn min<T: PartialOrd>(x: T, y: T) -> T {
        if x <= y {
            x
        } else {
            y
        }
    }

    fn max<T: PartialOrd>(x: T, y: T) -> T {
        if x >= y {
            x
        } else {
            y
        }
    }

    /// Coordinate arithmetic.  Integer coordinates saturate, so an unbounded rectangle
    /// stays sorted when it is outset or moved.
    pub trait Coord: Copy + PartialOrd + Zero {
        fn coord_add(self, other: Self) -> Self;
        fn coord_sub(self, other: Self) -> Self;
    }

    impl Coord for f64 {
        #[inline]
        fn coord_add(self, other: f64) -> f64 {
            self + other
        }

        #[inline]
        fn coord_sub(self, other: f64) -> f64 {
            self - other
        }
    }

    impl Coord for i32 {
        #[inline]
        fn coord_add(self, other: i32) -> i32 {
            self.saturating_add(other)
        }

        #[inline]
        fn coord_sub(self, other: i32) -> i32 {
            self.saturating_sub(other)
        }
    }

    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Rect<T> {
        pub x0: T,
        pub y0: T,
        pub x1: T,
        pub y1: T,
    }

    impl<T> Rect<T> {
        #[inline]
        pub const fn new(x0: T, y0: T, x1: T, y1: T) -> Self {
            Self { x0, y0, x1, y1 }
        }
    }

    impl<T: Coord> Rect<T> {
        #[inline]
        pub fn from_size(w: T, h: T) -> Self {
            Self {
                x0: Zero::zero(),
                y0: Zero::zero(),
                x1: w,
                y1: h,
            }
        }

        #[inline]
        pub fn from_xywh(x: T, y: T, w: T, h: T) -> Self {
            Self {
                x0: x,
                y0: y,
                x1: x.coord_add(w),
                y1: y.coord_add(h),
            }
        }

        #[inline]
        pub fn width(&self) -> T {
            self.x1.coord_sub(self.x0)
        }

        #[inline]
        pub fn height(&self) -> T {
            self.y1.coord_sub(self.y0)
        }

        #[inline]
        pub fn size(&self) -> (T, T) {
            (self.width(), self.height())
        }

        /// Whether the rectangle covers no area.
        ///
        /// Unsorted rectangles are empty.
        #[inline]
        pub fn is_empty(&self) -> bool {
            !(self.x1 > self.x0 && self.y1 > self.y0)
        }

        #[inline]
        pub fn contains(self, x: T, y: T) -> bool {
            x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
        }

        /// Whether `other` lies entirely inside this rectangle.
        ///
        /// An empty `other` is never contained.
        #[inline]
        pub fn contains_rect(&self, other: &Self) -> bool {
            !self.is_empty()
                && !other.is_empty()
                && other.x0 >= self.x0
                && other.y0 >= self.y0
                && other.x1 <= self.x1
                && other.y1 <= self.y1
        }

        #[inline]
        pub fn translate(&self, by: (T, T)) -> Self {
            Self {
                x0: self.x0.coord_add(by.0),
                y0: self.y0.coord_add(by.1),
                x1: self.x1.coord_add(by.0),
                y1: self.y1.coord_add(by.1),
            }
        }

        #[inline]
        pub fn outset(&self, dx: T, dy: T) -> Self {
            Self {
                x0: self.x0.coord_sub(dx),
                y0: self.y0.coord_sub(dy),
                x1: self.x1.coord_add(dx),
                y1: self.y1.coord_add(dy),
            }
        }

        #[inline]
        pub fn intersection(&self, rect: &Self) -> Option<Self> {
            let (x0, y0, x1, y1) = (
                max(self.x0, rect.x0),
                max(self.y0, rect.y0),
                min(self.x1, rect.x1),
                min(self.y1, rect.y1),
            );

            if x1 > x0 && y1 > y0 {
                Some(Self { x0, y0, x1, y1 })
            } else {
                None
            }
        }

        #[inline]
        pub fn union(&self, rect: &Self) -> Self {
            Self {
                x0: min(self.x0, rect.x0),
                y0: min(self.y0, rect.y0),
                x1: max(self.x1, rect.x1),
                y1: max(self.y1, rect.y1),
            }
        }

        /// Like `union()`, but an empty rectangle on either side contributes nothing.
        #[inline]
        pub fn join(&self, rect: &Self) -> Self {
            if rect.is_empty() {
                *self
            } else if self.is_empty() {
                *rect
            } else {
                self.union(rect)
            }
        }
    }

    impl Rect<i32> {
        #[inline]
        pub fn scale(self, x: f64, y: f64) -> Self {
            Self {
                x0: (f64::from(self.x0) * x).floor() as i32,
                y0: (f64::from(self.y0) * y).floor() as i32,
                x1: (f64::from(self.x1) * x).ceil() as i32,
                y1: (f64::from(self.y1) * y).ceil() as i32,
            }
        }
    }

    impl Rect<f64> {
        #[inline]
        pub fn scale(self, x: f64, y: f64) -> Self {
            Self {
                x0: self.x0 * x,
                y0: self.y0 * y,
                x1: self.x1 * x,
                y1: self.y1 * y,
            }
        }

        #[inline]
        pub fn is_finite(&self) -> bool {
            self.x0.is_finite() && self.y0.is_finite() && self.x1.is_finite() && self.y1.is_finite()
        }

        pub fn approx_eq(&self, other: &Self) -> bool {
            approx_eq!(f64, self.x0, other.x0, epsilon = 0.0001)
                && approx_eq!(f64, self.y0, other.y0, epsilon = 0.0001)
                && approx_eq!(f64, self.x1, other.x1, epsilon = 0.0001)
                && approx_eq!(f64, self.y1, other.y1, epsilon = 0.0001)
        }
    }
}

pub type Rect = rect::Rect<f64>;

pub type IRect = rect::Rect<i32>;

impl Rect {
    /// Smallest integer rectangle that contains this one, ignoring `ROUND_EPSILON` of
    /// overhang on each side.
    #[inline]
    pub fn round_out(&self) -> IRect {
        IRect {
            x0: (self.x0 + ROUND_EPSILON).floor() as i32,
            y0: (self.y0 + ROUND_EPSILON).floor() as i32,
            x1: (self.x1 - ROUND_EPSILON).ceil() as i32,
            y1: (self.y1 - ROUND_EPSILON).ceil() as i32,
        }
    }

    /// Largest integer rectangle contained in this one, tolerating `ROUND_EPSILON` of
    /// shortfall on each side.
    #[inline]
    pub fn round_in(&self) -> IRect {
        IRect {
            x0: (self.x0 - ROUND_EPSILON).ceil() as i32,
            y0: (self.y0 - ROUND_EPSILON).ceil() as i32,
            x1: (self.x1 + ROUND_EPSILON).floor() as i32,
            y1: (self.y1 + ROUND_EPSILON).floor() as i32,
        }
    }

    /// Rounds each edge to the nearest integer.
    #[inline]
    pub fn round(&self) -> IRect {
        IRect {
            x0: self.x0.round() as i32,
            y0: self.y0.round() as i32,
            x1: self.x1.round() as i32,
            y1: self.y1.round() as i32,
        }
    }
}

impl From<Rect> for IRect {
    #[inline]
    fn from(r: Rect) -> Self {
        Self {
            x0: r.x0.floor() as i32,
            y0: r.y0.floor() as i32,
            x1: r.x1.ceil() as i32,
            y1: r.y1.ceil() as i32,
        }
    }
}

impl From<IRect> for Rect {
    #[inline]
    fn from(r: IRect) -> Self {
        Self {
            x0: f64::from(r.x0),
            y0: f64::from(r.y0),
            x1: f64::from(r.x1),
            y1: f64::from(r.y1),
        }
    }
}
