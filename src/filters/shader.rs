use crate::mapping::Mapping;
use crate::rect::IRect;
use crate::shader::Shader;
use crate::space::LayerSpace;

use super::context::Context;
use super::result::{FilterResult, FilterResultBuilder};
use super::{FilterBase, ImageFilter};

/// Fills the desired output with a shader defined in parameter space.
#[derive(Debug)]
pub struct ShaderFilter {
    base: FilterBase,
    shader: Shader,
}

impl ShaderFilter {
    pub fn new(shader: Shader) -> ShaderFilter {
        ShaderFilter {
            base: FilterBase::new(Vec::new()),
            shader,
        }
    }
}

impl ImageFilter for ShaderFilter {
    fn base(&self) -> &FilterBase {
        &self.base
    }

    fn on_filter_image(&self, ctx: &Context<'_>) -> FilterResult {
        FilterResultBuilder::new(ctx).eval(|_| Some(self.shader.clone()), None, true)
    }

    fn on_get_input_layer_bounds(
        &self,
        _mapping: &Mapping,
        _desired: LayerSpace<IRect>,
        _content: Option<LayerSpace<IRect>>,
    ) -> LayerSpace<IRect> {
        LayerSpace::empty()
    }

    fn on_get_output_layer_bounds(
        &self,
        _mapping: &Mapping,
        _content: Option<LayerSpace<IRect>>,
    ) -> Option<LayerSpace<IRect>> {
        None
    }

    fn on_affects_transparent_black(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::filters::test_utils::TestEnv;
    use crate::filters::FilterRef;
    use crate::point::Point;
    use crate::shader::ShaderEval;
    use crate::surface_utils::Pixel;
    use std::sync::Arc;

    #[derive(Debug)]
    struct LeftHalf;

    impl ShaderEval for LeftHalf {
        fn eval(&self, p: Point) -> Color {
            if p.x < 5.0 {
                Color::new(1.0, 0.0, 0.0, 1.0)
            } else {
                Color::TRANSPARENT
            }
        }
    }

    #[test]
    fn fills_desired_output() {
        let env = TestEnv::new();
        let ctx = env.context(IRect::new(2, 2, 8, 4));

        let f: FilterRef = Arc::new(ShaderFilter::new(Arc::new(LeftHalf)));
        let out = f.filter_image(&ctx);

        assert_eq!(out.layer_bounds().get(), IRect::new(2, 2, 8, 4));
        let image = out.image().unwrap();
        assert_eq!(image.get_pixel(0, 0), Pixel::new(255, 0, 0, 255));
        assert_eq!(image.get_pixel(2, 1), Pixel::new(255, 0, 0, 255));
        assert_eq!(image.get_pixel(3, 1), Pixel::new(0, 0, 0, 0));
    }

    #[test]
    fn is_unbounded() {
        let f: FilterRef = Arc::new(ShaderFilter::new(crate::shader::color(Color::TRANSPARENT)));

        assert!(f.affects_transparent_black());
        assert!(f
            .get_output_layer_bounds(&Mapping::default(), Some(LayerSpace::empty()))
            .is_none());
    }
}
