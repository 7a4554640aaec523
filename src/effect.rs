//! Runtime effects: parameterized shader programs with named uniforms and children.
//!
//! An effect is declared once with an [`EffectDescription`] and validated by
//! [`RuntimeEffect::compile`].  Its uniforms are laid out back to back as little-endian
//! `f32` values, in declaration order; [`EffectBuilder`] fills that layout by name.
//!
//! The effects used by the built-in filters are declared in their filter modules and
//! compiled once per process into a table indexed by [`KnownEffect`].

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};
use once_cell::sync::Lazy;

use crate::color::Color;
use crate::error::EffectError;
use crate::point::Point;
use crate::shader::{Shader, ShaderEval};

/// What an effect program sees when it is evaluated.
pub struct EffectArgs<'a> {
    effect: &'a RuntimeEffect,
    data: &'a [f32],
    children: &'a [Option<Shader>],
}

impl<'a> EffectArgs<'a> {
    /// Values of the uniform at `index` in declaration order.
    #[inline]
    pub fn uniform(&self, index: usize) -> &'a [f32] {
        let u = &self.effect.uniforms[index];
        &self.data[u.offset..u.offset + u.count]
    }

    /// First value of the uniform at `index`.
    #[inline]
    pub fn float(&self, index: usize) -> f32 {
        self.data[self.effect.uniforms[index].offset]
    }

    /// Evaluates the child at `index`; an unbound child is transparent black.
    #[inline]
    pub fn child(&self, index: usize, p: Point) -> Color {
        match self.children[index] {
            Some(ref s) => s.eval(p),
            None => Color::TRANSPARENT,
        }
    }
}

pub type EffectFn = dyn Fn(&EffectArgs<'_>, Point) -> Color + Send + Sync;

/// Declaration of an effect: its uniforms, its children and the program itself.
#[derive(Clone)]
pub struct EffectDescription {
    pub name: String,

    /// `(name, number of floats)` in layout order.
    pub uniforms: Vec<(String, usize)>,

    pub children: Vec<String>,
    pub program: Arc<EffectFn>,
}

impl EffectDescription {
    pub fn new<F>(name: &str, program: F) -> EffectDescription
    where
        F: Fn(&EffectArgs<'_>, Point) -> Color + Send + Sync + 'static,
    {
        EffectDescription {
            name: name.to_string(),
            uniforms: Vec::new(),
            children: Vec::new(),
            program: Arc::new(program),
        }
    }

    pub fn uniform(mut self, name: &str, count: usize) -> EffectDescription {
        self.uniforms.push((name.to_string(), count));
        self
    }

    pub fn child(mut self, name: &str) -> EffectDescription {
        self.children.push(name.to_string());
        self
    }
}

#[derive(Debug, Clone)]
struct UniformInfo {
    name: String,
    count: usize,
    offset: usize,
}

pub struct RuntimeEffect {
    name: String,
    uniforms: Vec<UniformInfo>,
    children: Vec<String>,
    program: Arc<EffectFn>,
}

impl fmt::Debug for RuntimeEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeEffect")
            .field("name", &self.name)
            .field("uniforms", &self.uniforms)
            .field("children", &self.children)
            .finish()
    }
}

impl RuntimeEffect {
    /// Validates a description; uniform and child names must be unique.
    pub fn compile(desc: EffectDescription) -> Result<Arc<RuntimeEffect>, EffectError> {
        let mut seen = HashSet::new();

        for name in desc
            .uniforms
            .iter()
            .map(|(n, _)| n)
            .chain(desc.children.iter())
        {
            if !seen.insert(name.as_str()) {
                return Err(EffectError::DuplicateName(name.clone()));
            }
        }

        Ok(Arc::new(RuntimeEffect::compile_unchecked(desc)))
    }

    fn compile_unchecked(desc: EffectDescription) -> RuntimeEffect {
        let mut offset = 0;
        let uniforms = desc
            .uniforms
            .into_iter()
            .map(|(name, count)| {
                let u = UniformInfo {
                    name,
                    count,
                    offset,
                };
                offset += count;
                u
            })
            .collect();

        RuntimeEffect {
            name: desc.name,
            uniforms,
            children: desc.children,
            program: desc.program,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size in bytes of the uniform data expected by [`RuntimeEffect::make_shader`].
    pub fn uniform_size(&self) -> usize {
        self.float_count() * std::mem::size_of::<f32>()
    }

    fn float_count(&self) -> usize {
        self.uniforms.iter().map(|u| u.count).sum()
    }

    pub fn children_count(&self) -> usize {
        self.children.len()
    }

    pub fn find_uniform(&self, name: &str) -> Option<usize> {
        self.uniforms.iter().position(|u| u.name == name)
    }

    pub fn find_child(&self, name: &str) -> Option<usize> {
        self.children.iter().position(|c| c == name)
    }

    /// Binds uniform data and children.
    pub fn make_shader(
        self: &Arc<Self>,
        uniforms: &[u8],
        children: Vec<Option<Shader>>,
    ) -> Result<Shader, EffectError> {
        if uniforms.len() != self.uniform_size() {
            return Err(EffectError::UniformBlobSize {
                expected: self.uniform_size(),
                actual: uniforms.len(),
            });
        }

        if children.len() != self.children.len() {
            return Err(EffectError::ChildCount {
                expected: self.children.len(),
                actual: children.len(),
            });
        }

        let mut data = vec![0.0; self.float_count()];
        LittleEndian::read_f32_into(uniforms, &mut data);

        Ok(Arc::new(EffectShader {
            effect: self.clone(),
            data,
            children,
        }))
    }
}

#[derive(Debug)]
struct EffectShader {
    effect: Arc<RuntimeEffect>,
    data: Vec<f32>,
    children: Vec<Option<Shader>>,
}

impl ShaderEval for EffectShader {
    fn eval(&self, p: Point) -> Color {
        let args = EffectArgs {
            effect: &self.effect,
            data: &self.data,
            children: &self.children,
        };

        (self.effect.program)(&args, p)
    }
}

/// Accumulates uniforms and children for one effect by name.
#[derive(Debug, Clone)]
pub struct EffectBuilder {
    effect: Arc<RuntimeEffect>,
    uniforms: Vec<u8>,
    children: Vec<Option<Shader>>,
}

impl EffectBuilder {
    pub fn new(effect: Arc<RuntimeEffect>) -> EffectBuilder {
        let uniforms = vec![0; effect.uniform_size()];
        let children = vec![None; effect.children_count()];

        EffectBuilder {
            effect,
            uniforms,
            children,
        }
    }

    pub fn effect(&self) -> &Arc<RuntimeEffect> {
        &self.effect
    }

    pub fn uniform(&mut self, name: &str, values: &[f32]) -> Result<&mut Self, EffectError> {
        let index = self
            .effect
            .find_uniform(name)
            .ok_or_else(|| EffectError::UnknownUniform(name.to_string()))?;

        let u = &self.effect.uniforms[index];
        if u.count != values.len() {
            return Err(EffectError::UniformSize {
                name: name.to_string(),
                expected: u.count,
                actual: values.len(),
            });
        }

        let start = u.offset * 4;
        LittleEndian::write_f32_into(values, &mut self.uniforms[start..start + values.len() * 4]);

        Ok(self)
    }

    pub fn child(&mut self, name: &str, shader: Option<Shader>) -> Result<&mut Self, EffectError> {
        let index = self
            .effect
            .find_child(name)
            .ok_or_else(|| EffectError::UnknownChild(name.to_string()))?;

        self.children[index] = shader;
        Ok(self)
    }

    /// Unbinds all children, so that the builder doesn't keep their images alive.
    pub fn clear_children(&mut self) {
        for c in self.children.iter_mut() {
            *c = None;
        }
    }

    pub fn make_shader(&self) -> Result<Shader, EffectError> {
        self.effect
            .make_shader(&self.uniforms, self.children.clone())
    }
}

/// Effects used by the built-in filters.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum KnownEffect {
    MatrixConvolutionUniforms,
    MatrixConvolutionSmallTexture,
    MatrixConvolutionLargeTexture,
    DisplacementMap,
    Lighting,
    ArithmeticBlend,
    GaussianBlur,
}

impl KnownEffect {
    pub const ALL: [KnownEffect; 7] = [
        KnownEffect::MatrixConvolutionUniforms,
        KnownEffect::MatrixConvolutionSmallTexture,
        KnownEffect::MatrixConvolutionLargeTexture,
        KnownEffect::DisplacementMap,
        KnownEffect::Lighting,
        KnownEffect::ArithmeticBlend,
        KnownEffect::GaussianBlur,
    ];

    fn description(self) -> EffectDescription {
        use crate::filters::{blend, blur, convolve_matrix, displacement_map, lighting};

        match self {
            KnownEffect::MatrixConvolutionUniforms
            | KnownEffect::MatrixConvolutionSmallTexture
            | KnownEffect::MatrixConvolutionLargeTexture => convolve_matrix::effect_description(self),
            KnownEffect::DisplacementMap => displacement_map::effect_description(),
            KnownEffect::Lighting => lighting::effect_description(),
            KnownEffect::ArithmeticBlend => blend::arithmetic_effect_description(),
            KnownEffect::GaussianBlur => blur::effect_description(),
        }
    }
}

static KNOWN_EFFECTS: Lazy<Vec<Arc<RuntimeEffect>>> = Lazy::new(|| {
    KnownEffect::ALL
        .iter()
        .map(|k| Arc::new(RuntimeEffect::compile_unchecked(k.description())))
        .collect()
});

/// The compiled effect for `key`; compiled once per process on first use.
pub fn effect_for(key: KnownEffect) -> Arc<RuntimeEffect> {
    KNOWN_EFFECTS[key as usize].clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use matches::assert_matches;

    fn tint() -> EffectDescription {
        EffectDescription::new("tint", |args, p| {
            let k = args.uniform(0);
            args.child(0, p).map_rgb(|c| c * k[0]).scale(args.float(1))
        })
        .uniform("gain", 1)
        .uniform("opacity", 1)
        .child("input")
    }

    #[test]
    fn known_effects_are_valid() {
        for k in KnownEffect::ALL {
            let effect = RuntimeEffect::compile(k.description()).unwrap();
            assert_eq!(effect.name(), effect_for(k).name());
        }
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let desc = tint().child("gain");
        assert_matches!(
            RuntimeEffect::compile(desc),
            Err(EffectError::DuplicateName(ref n)) if n == "gain"
        );
    }

    #[test]
    fn builder_binds_by_name() {
        let effect = RuntimeEffect::compile(tint()).unwrap();
        assert_eq!(effect.uniform_size(), 8);

        let mut builder = EffectBuilder::new(effect);
        builder
            .uniform("gain", &[0.5])
            .unwrap()
            .uniform("opacity", &[1.0])
            .unwrap()
            .child("input", Some(crate::shader::color(Color::new(1.0, 1.0, 1.0, 1.0))))
            .unwrap();

        let s = builder.make_shader().unwrap();
        assert_eq!(s.eval(Point::new(0.0, 0.0)), Color::new(0.5, 0.5, 0.5, 1.0));

        builder.clear_children();
        let s = builder.make_shader().unwrap();
        assert!(s.eval(Point::new(0.0, 0.0)).is_transparent());
    }

    #[test]
    fn builder_errors() {
        let mut builder = EffectBuilder::new(RuntimeEffect::compile(tint()).unwrap());

        assert_matches!(
            builder.uniform("nope", &[1.0]),
            Err(EffectError::UnknownUniform(_))
        );
        assert_matches!(
            builder.uniform("gain", &[1.0, 2.0]),
            Err(EffectError::UniformSize {
                expected: 1,
                actual: 2,
                ..
            })
        );
        assert_matches!(builder.child("nope", None), Err(EffectError::UnknownChild(_)));
    }

    #[test]
    fn make_shader_checks_layout() {
        let effect = RuntimeEffect::compile(tint()).unwrap();

        assert_matches!(
            effect.make_shader(&[0; 4], vec![None]),
            Err(EffectError::UniformBlobSize {
                expected: 8,
                actual: 4
            })
        );
        assert_matches!(
            effect.make_shader(&[0; 8], vec![]),
            Err(EffectError::ChildCount {
                expected: 1,
                actual: 0
            })
        );
    }
}
