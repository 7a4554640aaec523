//! Blend modes and blenders.
//!
//! All functions operate on premultiplied colors.  The separable and non-separable modes
//! follow the formulas of the W3C Compositing and Blending specification.

use std::fmt;
use std::sync::Arc;

use crate::color::Color;
use crate::util::clamp;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BlendMode {
    Clear,
    Src,
    Dst,
    SrcOver,
    DstOver,
    SrcIn,
    DstIn,
    SrcOut,
    DstOut,
    SrcATop,
    DstATop,
    Xor,
    Plus,
    Modulate,
    Screen,

    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,
    Multiply,

    Hue,
    Saturation,
    Color,
    Luminosity,
}

enum_default!(BlendMode, BlendMode::SrcOver);

/// A Porter-Duff coefficient: the factor by which the source or destination is multiplied.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Coeff {
    Zero,
    One,
    SrcAlpha,
    InvSrcAlpha,
    DstAlpha,
    InvDstAlpha,
    SrcColor,
    InvSrcColor,
}

impl BlendMode {
    /// The `(source, destination)` coefficients for modes that can be written as
    /// `src · Fs + dst · Fd`; `None` for the others.
    pub fn coefficients(&self) -> Option<(Coeff, Coeff)> {
        use Coeff::*;

        Some(match *self {
            BlendMode::Clear => (Zero, Zero),
            BlendMode::Src => (One, Zero),
            BlendMode::Dst => (Zero, One),
            BlendMode::SrcOver => (One, InvSrcAlpha),
            BlendMode::DstOver => (InvDstAlpha, One),
            BlendMode::SrcIn => (DstAlpha, Zero),
            BlendMode::DstIn => (Zero, SrcAlpha),
            BlendMode::SrcOut => (InvDstAlpha, Zero),
            BlendMode::DstOut => (Zero, InvSrcAlpha),
            BlendMode::SrcATop => (DstAlpha, InvSrcAlpha),
            BlendMode::DstATop => (InvDstAlpha, SrcAlpha),
            BlendMode::Xor => (InvDstAlpha, InvSrcAlpha),
            BlendMode::Plus => (One, One),
            BlendMode::Modulate => (Zero, SrcColor),
            BlendMode::Screen => (One, InvSrcColor),
            _ => return None,
        })
    }

    pub fn blend(&self, src: Color, dst: Color) -> Color {
        if let Some((fs, fd)) = self.coefficients() {
            return apply_coefficients(fs, fd, src, dst);
        }

        match *self {
            BlendMode::Overlay => separable(src, dst, |s, d| hard_light(d, s)),
            BlendMode::Darken => separable(src, dst, f32::min),
            BlendMode::Lighten => separable(src, dst, f32::max),
            BlendMode::ColorDodge => separable(src, dst, color_dodge),
            BlendMode::ColorBurn => separable(src, dst, color_burn),
            BlendMode::HardLight => separable(src, dst, hard_light),
            BlendMode::SoftLight => separable(src, dst, soft_light),
            BlendMode::Difference => separable(src, dst, |s, d| (s - d).abs()),
            BlendMode::Exclusion => separable(src, dst, |s, d| s + d - 2.0 * s * d),
            BlendMode::Multiply => separable(src, dst, |s, d| s * d),

            BlendMode::Hue => non_separable(src, dst, |s, d| set_lum(set_sat(s, sat(d)), lum(d))),
            BlendMode::Saturation => {
                non_separable(src, dst, |s, d| set_lum(set_sat(d, sat(s)), lum(d)))
            }
            BlendMode::Color => non_separable(src, dst, |s, d| set_lum(s, lum(d))),
            BlendMode::Luminosity => non_separable(src, dst, |s, d| set_lum(d, lum(s))),

            _ => unreachable!("coefficient modes are handled above"),
        }
    }
}

fn coefficient(c: Coeff, src: Color, dst: Color, channel: usize) -> f32 {
    match c {
        Coeff::Zero => 0.0,
        Coeff::One => 1.0,
        Coeff::SrcAlpha => src.a,
        Coeff::InvSrcAlpha => 1.0 - src.a,
        Coeff::DstAlpha => dst.a,
        Coeff::InvDstAlpha => 1.0 - dst.a,
        Coeff::SrcColor => src.channel(channel),
        Coeff::InvSrcColor => 1.0 - src.channel(channel),
    }
}

fn apply_coefficients(fs: Coeff, fd: Coeff, src: Color, dst: Color) -> Color {
    let c = |i| {
        src.channel(i) * coefficient(fs, src, dst, i) + dst.channel(i) * coefficient(fd, src, dst, i)
    };

    Color::new(c(0), c(1), c(2), c(3)).clamp_premultiplied()
}

/// `B(s, d)` receives unpremultiplied source and destination components.
fn separable<F: Fn(f32, f32) -> f32>(src: Color, dst: Color, b: F) -> Color {
    let s = src.unpremultiply();
    let d = dst.unpremultiply();
    let both = src.a * dst.a;

    let c = |i| {
        (1.0 - dst.a) * src.channel(i)
            + (1.0 - src.a) * dst.channel(i)
            + both * b(s.channel(i), d.channel(i))
    };

    Color::new(c(0), c(1), c(2), src.a + dst.a - both).clamp_premultiplied()
}

type Rgb = [f32; 3];

fn non_separable<F: Fn(Rgb, Rgb) -> Rgb>(src: Color, dst: Color, b: F) -> Color {
    let s = src.unpremultiply();
    let d = dst.unpremultiply();
    let both = src.a * dst.a;

    let mixed = b([s.r, s.g, s.b], [d.r, d.g, d.b]);

    let c = |i: usize| {
        (1.0 - dst.a) * src.channel(i) + (1.0 - src.a) * dst.channel(i) + both * mixed[i]
    };

    Color::new(c(0), c(1), c(2), src.a + dst.a - both).clamp_premultiplied()
}

fn hard_light(s: f32, d: f32) -> f32 {
    if s <= 0.5 {
        d * 2.0 * s
    } else {
        let s2 = 2.0 * s - 1.0;
        d + s2 - d * s2
    }
}

fn color_dodge(s: f32, d: f32) -> f32 {
    if d == 0.0 {
        0.0
    } else if s >= 1.0 {
        1.0
    } else {
        (d / (1.0 - s)).min(1.0)
    }
}

fn color_burn(s: f32, d: f32) -> f32 {
    if d >= 1.0 {
        1.0
    } else if s <= 0.0 {
        0.0
    } else {
        1.0 - ((1.0 - d) / s).min(1.0)
    }
}

fn soft_light(s: f32, d: f32) -> f32 {
    if s <= 0.5 {
        d - (1.0 - 2.0 * s) * d * (1.0 - d)
    } else {
        let dd = if d <= 0.25 {
            ((16.0 * d - 12.0) * d + 4.0) * d
        } else {
            d.sqrt()
        };
        d + (2.0 * s - 1.0) * (dd - d)
    }
}

fn lum(c: Rgb) -> f32 {
    0.3 * c[0] + 0.59 * c[1] + 0.11 * c[2]
}

fn clip_color(c: Rgb) -> Rgb {
    let l = lum(c);
    let n = c[0].min(c[1]).min(c[2]);
    let x = c[0].max(c[1]).max(c[2]);

    let mut out = c;
    for v in out.iter_mut() {
        if n < 0.0 {
            *v = l + (*v - l) * l / (l - n);
        }
        if x > 1.0 {
            *v = l + (*v - l) * (1.0 - l) / (x - l);
        }
    }
    out
}

fn set_lum(c: Rgb, l: f32) -> Rgb {
    let d = l - lum(c);
    clip_color([c[0] + d, c[1] + d, c[2] + d])
}

fn sat(c: Rgb) -> f32 {
    c[0].max(c[1]).max(c[2]) - c[0].min(c[1]).min(c[2])
}

fn set_sat(c: Rgb, s: f32) -> Rgb {
    let max = c[0].max(c[1]).max(c[2]);
    let min = c[0].min(c[1]).min(c[2]);

    if max <= min {
        return [0.0; 3];
    }

    let mut out = [0.0; 3];
    for (o, v) in out.iter_mut().zip(c.iter()) {
        *o = (*v - min) * s / (max - min);
    }
    out
}

/// `k1 · src · dst + k2 · src + k3 · dst + k4`, per premultiplied channel.
pub fn arithmetic(k: [f32; 4], enforce_premul: bool, src: Color, dst: Color) -> Color {
    let c = |i| {
        let (s, d) = (src.channel(i), dst.channel(i));
        clamp(k[0] * s * d + k[1] * s + k[2] * d + k[3], 0.0, 1.0)
    };

    let out = Color::new(c(0), c(1), c(2), c(3));

    if enforce_premul {
        out.clamp_premultiplied()
    } else {
        out
    }
}

/// A caller-provided blend function of `(src, dst)`.
#[derive(Clone)]
pub struct RuntimeBlender {
    name: String,
    func: Arc<dyn Fn(Color, Color) -> Color + Send + Sync>,
}

impl RuntimeBlender {
    pub fn new<F>(name: &str, func: F) -> RuntimeBlender
    where
        F: Fn(Color, Color) -> Color + Send + Sync + 'static,
    {
        RuntimeBlender {
            name: name.to_string(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for RuntimeBlender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeBlender")
            .field("name", &self.name)
            .finish()
    }
}

/// How a blend node combines its foreground (source) and background (destination).
#[derive(Debug, Clone)]
pub enum Blender {
    Mode(BlendMode),
    Arithmetic { k: [f32; 4], enforce_premul: bool },
    Runtime(RuntimeBlender),
}

impl Blender {
    pub fn blend(&self, src: Color, dst: Color) -> Color {
        match *self {
            Blender::Mode(mode) => mode.blend(src, dst),
            Blender::Arithmetic { k, enforce_premul } => arithmetic(k, enforce_premul, src, dst),
            Blender::Runtime(ref r) => (r.func)(src, dst),
        }
    }
}

impl From<BlendMode> for Blender {
    fn from(mode: BlendMode) -> Blender {
        Blender::Mode(mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;

    const RED: Color = Color::new(1.0, 0.0, 0.0, 1.0);
    const HALF_BLUE: Color = Color::new(0.0, 0.0, 0.5, 0.5);

    fn assert_color_eq(a: Color, b: Color) {
        for i in 0..4 {
            assert!(
                approx_eq!(f32, a.channel(i), b.channel(i), epsilon = 1e-5),
                "{:?} != {:?}",
                a,
                b
            );
        }
    }

    #[test]
    fn porter_duff_basics() {
        assert_color_eq(BlendMode::Clear.blend(RED, HALF_BLUE), Color::TRANSPARENT);
        assert_color_eq(BlendMode::Src.blend(RED, HALF_BLUE), RED);
        assert_color_eq(BlendMode::Dst.blend(RED, HALF_BLUE), HALF_BLUE);
        assert_color_eq(BlendMode::SrcOver.blend(HALF_BLUE, RED), Color::new(0.5, 0.0, 0.5, 1.0));
        assert_color_eq(BlendMode::SrcIn.blend(RED, HALF_BLUE), Color::new(0.5, 0.0, 0.0, 0.5));
        assert_color_eq(BlendMode::SrcIn.blend(RED, Color::TRANSPARENT), Color::TRANSPARENT);
    }

    #[test]
    fn separable_modes_on_transparent_dst_return_src() {
        for mode in [
            BlendMode::Multiply,
            BlendMode::Overlay,
            BlendMode::Difference,
            BlendMode::SoftLight,
            BlendMode::Hue,
            BlendMode::Luminosity,
        ] {
            assert_color_eq(mode.blend(HALF_BLUE, Color::TRANSPARENT), HALF_BLUE);
            assert_color_eq(mode.blend(Color::TRANSPARENT, HALF_BLUE), HALF_BLUE);
        }
    }

    #[test]
    fn multiply_opaque() {
        let a = Color::new(0.5, 1.0, 0.25, 1.0);
        let b = Color::new(0.5, 0.5, 1.0, 1.0);
        assert_color_eq(BlendMode::Multiply.blend(a, b), Color::new(0.25, 0.5, 0.25, 1.0));
    }

    #[test]
    fn arithmetic_matches_modes() {
        // k2 = 1 is the source, k3 = 1 is the destination.
        assert_color_eq(arithmetic([0.0, 1.0, 0.0, 0.0], true, RED, HALF_BLUE), RED);
        assert_color_eq(arithmetic([0.0, 0.0, 1.0, 0.0], true, RED, HALF_BLUE), HALF_BLUE);

        // k4 produces color out of nothing.
        let c = arithmetic([0.0, 0.0, 0.0, 0.5], true, Color::TRANSPARENT, Color::TRANSPARENT);
        assert_color_eq(c, Color::new(0.5, 0.5, 0.5, 0.5));
    }

    #[test]
    fn coefficient_modes_are_classified() {
        assert!(BlendMode::Screen.coefficients().is_some());
        assert!(BlendMode::Multiply.coefficients().is_none());
        assert_eq!(
            BlendMode::SrcATop.coefficients(),
            Some((Coeff::DstAlpha, Coeff::InvSrcAlpha))
        );
    }
}
