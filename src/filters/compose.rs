use crate::mapping::Mapping;
use crate::rect::IRect;
use crate::space::LayerSpace;

use super::context::Context;
use super::result::FilterResult;
use super::{FilterBase, FilterRef, ImageFilter};

const OUTER: usize = 0;
const INNER: usize = 1;

/// Feeds the output of `inner` to `outer` as its source.
#[derive(Debug)]
pub struct Compose {
    base: FilterBase,
}

impl Compose {
    pub fn new(outer: FilterRef, inner: FilterRef) -> Compose {
        Compose {
            base: FilterBase::new(vec![Some(outer), Some(inner)]),
        }
    }
}

impl ImageFilter for Compose {
    fn base(&self) -> &FilterBase {
        &self.base
    }

    fn on_filter_image(&self, ctx: &Context<'_>) -> FilterResult {
        let inner_output = self.base.child_output_layer_bounds(
            INNER,
            ctx.mapping(),
            Some(ctx.source().layer_bounds()),
        );

        let outer_required = self.base.child_input_layer_bounds(
            OUTER,
            ctx.mapping(),
            ctx.desired_output(),
            inner_output,
        );

        let inner_result = self
            .base
            .child_output(INNER, &ctx.with_new_desired_output(outer_required));

        self.base
            .child_output(OUTER, &ctx.with_new_source(inner_result))
    }

    fn on_get_input_layer_bounds(
        &self,
        mapping: &Mapping,
        desired: LayerSpace<IRect>,
        content: Option<LayerSpace<IRect>>,
    ) -> LayerSpace<IRect> {
        let inner_output = self.base.child_output_layer_bounds(INNER, mapping, content);
        let outer_required =
            self.base
                .child_input_layer_bounds(OUTER, mapping, desired, inner_output);

        self.base
            .child_input_layer_bounds(INNER, mapping, outer_required, content)
    }

    fn on_get_output_layer_bounds(
        &self,
        mapping: &Mapping,
        content: Option<LayerSpace<IRect>>,
    ) -> Option<LayerSpace<IRect>> {
        let inner_output = self.base.child_output_layer_bounds(INNER, mapping, content);
        self.base
            .child_output_layer_bounds(OUTER, mapping, inner_output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::crop::Crop;
    use crate::filters::matrix_transform::MatrixTransform;
    use crate::filters::test_utils::{gradient_image, TestEnv};
    use crate::point::IPoint;
    use crate::rect::Rect;
    use crate::shader::SamplingOptions;
    use crate::space::ParameterSpace;
    use crate::transform::Transform;
    use std::sync::Arc;

    fn offset(dx: f64, dy: f64) -> FilterRef {
        Arc::new(MatrixTransform::new(
            ParameterSpace::new(Transform::new_translate(dx, dy)),
            SamplingOptions::Linear,
            None,
        ))
    }

    fn crop(r: Rect) -> FilterRef {
        Arc::new(Crop::new(Some(ParameterSpace::new(r)), None))
    }

    #[test]
    fn outer_sees_inner_output_as_source() {
        let env = TestEnv::new();
        let source = FilterResult::new(gradient_image(10, 10), LayerSpace::new(IPoint::new(0, 0)));
        let ctx = env.context_with_source(IRect::new(-20, -20, 40, 40), source);

        // Offsetting then cropping is not the same as cropping then offsetting.
        let f: FilterRef = Arc::new(Compose::new(
            crop(Rect::new(0.0, 0.0, 8.0, 8.0)),
            offset(5.0, 5.0),
        ));

        let out = f.filter_image(&ctx);
        assert_eq!(out.layer_bounds().get(), IRect::new(5, 5, 8, 8));
    }

    #[test]
    fn bounds_nest() {
        let f: FilterRef = Arc::new(Compose::new(
            offset(5.0, 0.0),
            crop(Rect::new(0.0, 0.0, 8.0, 8.0)),
        ));
        let m = Mapping::default();

        let out = f
            .get_output_layer_bounds(&m, Some(LayerSpace::new(IRect::new(0, 0, 100, 100))))
            .unwrap();
        assert_eq!(out.get(), IRect::new(5, 0, 13, 8));

        // The offset needs (-2, -1, 6, 11) from the crop, which needs its intersection
        // with the crop rectangle from the source.
        let input = f.get_input_layer_bounds(&m, LayerSpace::new(IRect::new(4, 0, 10, 10)), None);
        assert_eq!(input.get(), IRect::new(0, 0, 6, 8));
    }
}
