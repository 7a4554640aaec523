use crate::mapping::Mapping;
use crate::rect::{IRect, Rect};
use crate::shader::SamplingOptions;
use crate::space::{LayerSpace, ParameterSpace};
use crate::surface_utils::shared_surface::SharedImageSurface;

use super::context::Context;
use super::result::FilterResult;
use super::{FilterBase, ImageFilter};

/// Draws part of a fixed image into a parameter-space rectangle; ignores the source.
#[derive(Debug)]
pub struct ImageSource {
    base: FilterBase,
    image: SharedImageSurface,
    src_rect: Rect,
    dst_rect: ParameterSpace<Rect>,
    sampling: SamplingOptions,
}

impl ImageSource {
    pub fn new(
        image: SharedImageSurface,
        src_rect: Rect,
        dst_rect: ParameterSpace<Rect>,
        sampling: SamplingOptions,
    ) -> ImageSource {
        ImageSource {
            base: FilterBase::new(Vec::new()),
            image,
            src_rect,
            dst_rect,
            sampling,
        }
    }
}

impl ImageFilter for ImageSource {
    fn base(&self) -> &FilterBase {
        &self.base
    }

    fn on_filter_image(&self, ctx: &Context<'_>) -> FilterResult {
        FilterResult::from_image(
            ctx,
            self.image.clone(),
            self.src_rect,
            self.dst_rect,
            self.sampling,
        )
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
        mapping: &Mapping,
        _content: Option<LayerSpace<IRect>>,
    ) -> Option<LayerSpace<IRect>> {
        Some(mapping.param_to_layer(self.dst_rect).round_out())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::test_utils::{gradient_image, TestEnv};
    use crate::filters::FilterRef;
    use crate::transform::Transform;
    use std::sync::Arc;

    #[test]
    fn one_to_one_placement_is_zero_copy() {
        let env = TestEnv::new();
        let ctx = env.context(IRect::new(0, 0, 100, 100));
        let image = gradient_image(10, 10);

        let f: FilterRef = Arc::new(ImageSource::new(
            image.clone(),
            Rect::new(2.0, 2.0, 6.0, 6.0),
            ParameterSpace::new(Rect::new(20.0, 30.0, 24.0, 34.0)),
            SamplingOptions::Linear,
        ));

        let out = f.filter_image(&ctx);
        assert_eq!(out.layer_bounds().get(), IRect::new(20, 30, 24, 34));

        let resolved = out.resolve(&ctx, out.layer_bounds());
        let pixels = resolved.image().unwrap();
        assert!(pixels.shares_pixels_with(&image));
        assert_eq!(pixels.get_pixel(0, 0), image.get_pixel(2, 2));
    }

    #[test]
    fn output_bounds_follow_the_mapping() {
        let f: FilterRef = Arc::new(ImageSource::new(
            gradient_image(10, 10),
            Rect::new(0.0, 0.0, 10.0, 10.0),
            ParameterSpace::new(Rect::new(0.0, 0.0, 10.0, 10.0)),
            SamplingOptions::Linear,
        ));

        let m = Mapping::new(Transform::new_scale(1.5, 1.5)).unwrap();
        let b = f.get_output_layer_bounds(&m, None).unwrap();
        assert_eq!(b.get(), IRect::new(0, 0, 15, 15));
        assert!(!f.affects_transparent_black());
    }

    #[test]
    fn source_outside_image_is_empty() {
        let env = TestEnv::new();
        let ctx = env.context(IRect::new(0, 0, 100, 100));

        let f: FilterRef = Arc::new(ImageSource::new(
            gradient_image(10, 10),
            Rect::new(20.0, 20.0, 30.0, 30.0),
            ParameterSpace::new(Rect::new(0.0, 0.0, 10.0, 10.0)),
            SamplingOptions::Linear,
        ));

        assert!(f.filter_image(&ctx).is_empty());
    }
}
