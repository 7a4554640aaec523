//! Colors, pixel formats and color spaces.
//!
//! Shaders produce [`Color`] values, which are premultiplied floating-point RGBA.  Surfaces
//! store them as 8-bit [`Pixel`]s in one of the supported [`ColorType`]s.

use std::ops::Add;

use crate::surface_utils::Pixel;
use crate::util::clamp;

/// A premultiplied RGBA color with components nominally in `[0, 1]`.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const TRANSPARENT: Color = Color::new(0.0, 0.0, 0.0, 0.0);

    #[inline]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Color {
        Color { r, g, b, a }
    }

    /// Builds a premultiplied color out of straight-alpha components.
    #[inline]
    pub fn from_unpremultiplied(r: f32, g: f32, b: f32, a: f32) -> Color {
        Color::new(r * a, g * a, b * a, a)
    }

    #[inline]
    pub fn from_pixel(p: Pixel) -> Color {
        Color::new(
            f32::from(p.r) / 255.0,
            f32::from(p.g) / 255.0,
            f32::from(p.b) / 255.0,
            f32::from(p.a) / 255.0,
        )
    }

    /// Quantizes to 8 bits, clamping each component to `[0, 1]`.
    #[inline]
    pub fn to_pixel(self) -> Pixel {
        let q = |c: f32| (clamp(c, 0.0, 1.0) * 255.0 + 0.5) as u8;

        Pixel {
            r: q(self.r),
            g: q(self.g),
            b: q(self.b),
            a: q(self.a),
        }
    }

    /// Returns the straight-alpha components; fully transparent colors become all zeros.
    #[inline]
    pub fn unpremultiply(self) -> Color {
        if self.a <= 0.0 {
            Color::TRANSPARENT
        } else {
            Color::new(self.r / self.a, self.g / self.a, self.b / self.a, self.a)
        }
    }

    /// Inverse of [`Color::unpremultiply`].
    #[inline]
    pub fn premultiply(self) -> Color {
        Color::from_unpremultiplied(self.r, self.g, self.b, self.a)
    }

    /// Clamps alpha to `[0, 1]` and the color channels to `[0, alpha]`.
    #[inline]
    pub fn clamp_premultiplied(self) -> Color {
        let a = clamp(self.a, 0.0, 1.0);
        Color::new(
            clamp(self.r, 0.0, a),
            clamp(self.g, 0.0, a),
            clamp(self.b, 0.0, a),
            a,
        )
    }

    #[inline]
    pub fn is_transparent(&self) -> bool {
        self.a == 0.0 && self.r == 0.0 && self.g == 0.0 && self.b == 0.0
    }

    #[inline]
    pub fn scale(self, k: f32) -> Color {
        Color::new(self.r * k, self.g * k, self.b * k, self.a * k)
    }

    #[inline]
    pub fn map_rgb<F: Fn(f32) -> f32>(self, f: F) -> Color {
        Color::new(f(self.r), f(self.g), f(self.b), self.a)
    }

    /// Component by index, in RGBA order.
    #[inline]
    pub fn channel(&self, index: usize) -> f32 {
        match index {
            0 => self.r,
            1 => self.g,
            2 => self.b,
            _ => self.a,
        }
    }
}

impl Add for Color {
    type Output = Color;

    #[inline]
    fn add(self, o: Color) -> Color {
        Color::new(self.r + o.r, self.g + o.g, self.b + o.b, self.a + o.a)
    }
}

/// In-memory format of surface pixels.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ColorType {
    /// Four 8-bit channels.
    Rgba8888,

    /// Only the alpha channel is meaningful; color channels read as zero.
    Alpha8,
}

enum_default!(ColorType, ColorType::Rgba8888);

impl ColorType {
    /// Drops the channels this format can't represent.
    #[inline]
    pub fn restrict(&self, p: Pixel) -> Pixel {
        match *self {
            ColorType::Rgba8888 => p,
            ColorType::Alpha8 => Pixel::new(0, 0, 0, p.a),
        }
    }
}

/// Interpretation of the color channels.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ColorSpace {
    Srgb,
    LinearSrgb,
}

enum_default!(ColorSpace, ColorSpace::Srgb);

/// Converts an sRGB component to linear light (undoes the gamma correction).
#[inline]
pub fn linearize(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Converts a linear component to sRGB (applies the gamma correction).
#[inline]
pub fn unlinearize(c: f32) -> f32 {
    if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

/// Converts a premultiplied color between color spaces.
///
/// `None` on either side means the data is not a color (e.g. a displacement field) and is
/// passed through unchanged.
pub fn convert(color: Color, from: Option<ColorSpace>, to: Option<ColorSpace>) -> Color {
    let f: fn(f32) -> f32 = match (from, to) {
        (Some(ColorSpace::Srgb), Some(ColorSpace::LinearSrgb)) => linearize,
        (Some(ColorSpace::LinearSrgb), Some(ColorSpace::Srgb)) => unlinearize,
        _ => return color,
    };

    if color.a <= 0.0 {
        return color;
    }

    color.unpremultiply().map_rgb(f).premultiply()
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    #[test]
    fn pixel_roundtrip_is_exact() {
        for v in 0..=255u8 {
            let p = Pixel::new(v, 255 - v, v / 2, 255);
            assert_eq!(Color::from_pixel(p).to_pixel(), p);
        }
    }

    #[test]
    fn transfer_functions_invert() {
        for i in 0..=100 {
            let c = i as f32 / 100.0;
            assert!(approx_eq!(f32, unlinearize(linearize(c)), c, epsilon = 1e-5));
        }
    }

    #[test]
    fn raw_data_is_not_converted() {
        let c = Color::new(0.25, 0.5, 0.125, 0.5);
        assert_eq!(convert(c, None, Some(ColorSpace::LinearSrgb)), c);
        assert_eq!(convert(c, Some(ColorSpace::Srgb), Some(ColorSpace::Srgb)), c);
    }

    #[test]
    fn clamp_keeps_premultiplied_invariant() {
        let c = Color::new(1.5, -0.5, 0.75, 0.5).clamp_premultiplied();
        assert_eq!(c, Color::new(0.5, 0.0, 0.5, 0.5));
    }

    #[test]
    fn alpha8_drops_color() {
        assert_eq!(
            ColorType::Alpha8.restrict(Pixel::new(1, 2, 3, 4)),
            Pixel::new(0, 0, 0, 4)
        );
    }
}
