use crate::mapping::Mapping;
use crate::point::ISize;
use crate::rect::IRect;
use crate::shader::SamplingOptions;
use crate::space::{LayerSpace, ParameterSpace};
use crate::transform::Transform;

use super::context::Context;
use super::result::FilterResult;
use super::{FilterBase, FilterRef, ImageFilter};

/// Transforms its input by a parameter-space matrix.
///
/// The transform is deferred on the result; it is only applied to pixels when a later
/// operation can't be combined with it.
#[derive(Debug)]
pub struct MatrixTransform {
    base: FilterBase,
    transform: ParameterSpace<Transform>,
    sampling: SamplingOptions,
}

/// How far outside of a pixel a sampling reads.
fn sampling_radius(sampling: SamplingOptions) -> i32 {
    match sampling {
        SamplingOptions::Nearest => 0,
        SamplingOptions::Linear | SamplingOptions::Anisotropic { .. } => 1,
        SamplingOptions::Cubic { .. } => 2,
    }
}

impl MatrixTransform {
    /// `transform` must be invertible.
    pub fn new(
        transform: ParameterSpace<Transform>,
        sampling: SamplingOptions,
        input: Option<FilterRef>,
    ) -> MatrixTransform {
        MatrixTransform {
            base: FilterBase::new(vec![input]),
            transform,
            sampling,
        }
    }

    fn layer_transform(&self, mapping: &Mapping) -> LayerSpace<Transform> {
        mapping.param_to_layer(self.transform)
    }

    fn required_input(
        &self,
        mapping: &Mapping,
        desired: LayerSpace<IRect>,
    ) -> LayerSpace<IRect> {
        let r = sampling_radius(self.sampling);

        match self.layer_transform(mapping).inverse_map_rect(&desired) {
            Some(required) => required.outset(LayerSpace::new(ISize::new(r, r))),
            None => LayerSpace::empty(),
        }
    }
}

impl ImageFilter for MatrixTransform {
    fn base(&self) -> &FilterBase {
        &self.base
    }

    fn on_filter_image(&self, ctx: &Context<'_>) -> FilterResult {
        let required = self.required_input(ctx.mapping(), ctx.desired_output());

        self.base
            .child_output(0, &ctx.with_new_desired_output(required))
            .apply_transform(ctx, &self.layer_transform(ctx.mapping()), self.sampling)
    }

    fn on_get_input_layer_bounds(
        &self,
        mapping: &Mapping,
        desired: LayerSpace<IRect>,
        content: Option<LayerSpace<IRect>>,
    ) -> LayerSpace<IRect> {
        let required = self.required_input(mapping, desired);
        self.base
            .child_input_layer_bounds(0, mapping, required, content)
    }

    fn on_get_output_layer_bounds(
        &self,
        mapping: &Mapping,
        content: Option<LayerSpace<IRect>>,
    ) -> Option<LayerSpace<IRect>> {
        self.base
            .child_output_layer_bounds(0, mapping, content)
            .map(|b| self.layer_transform(mapping).map_rect(&b))
    }
}
