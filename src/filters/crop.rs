use crate::mapping::{Mapping, MatrixCapability};
use crate::rect::{IRect, Rect};
use crate::space::{LayerSpace, ParameterSpace};

use super::context::Context;
use super::result::FilterResult;
use super::{FilterBase, FilterRef, ImageFilter};

/// Restricts its input to a rectangle.
///
/// Without a rectangle the input passes through unchanged; with an empty one the node
/// produces nothing.
#[derive(Debug)]
pub struct Crop {
    base: FilterBase,
    rect: Option<ParameterSpace<Rect>>,
}

impl Crop {
    pub fn new(rect: Option<ParameterSpace<Rect>>, input: Option<FilterRef>) -> Crop {
        Crop {
            base: FilterBase::new(vec![input]),
            rect,
        }
    }

    pub fn rect(&self) -> Option<ParameterSpace<Rect>> {
        self.rect
    }

    /// The crop in layer pixels.  Fractional edges are rounded to the nearest pixel.
    fn layer_crop(&self, mapping: &Mapping) -> Option<LayerSpace<IRect>> {
        self.rect.map(|r| mapping.param_to_layer(r).round())
    }
}

impl ImageFilter for Crop {
    fn base(&self) -> &FilterBase {
        &self.base
    }

    fn on_filter_image(&self, ctx: &Context<'_>) -> FilterResult {
        let crop = match self.layer_crop(ctx.mapping()) {
            Some(c) => c,
            None => return self.base.child_output(0, ctx),
        };

        let child_desired = match crop.intersect(&ctx.desired_output()) {
            Some(d) => d,
            None => return FilterResult::empty(),
        };

        self.base
            .child_output(0, &ctx.with_new_desired_output(child_desired))
            .apply_crop(ctx, crop)
    }

    fn on_get_input_layer_bounds(
        &self,
        mapping: &Mapping,
        desired: LayerSpace<IRect>,
        content: Option<LayerSpace<IRect>>,
    ) -> LayerSpace<IRect> {
        let desired = match self.layer_crop(mapping) {
            Some(crop) => match crop.intersect(&desired) {
                Some(d) => d,
                None => return LayerSpace::empty(),
            },
            None => desired,
        };

        self.base
            .child_input_layer_bounds(0, mapping, desired, content)
    }

    fn on_get_output_layer_bounds(
        &self,
        mapping: &Mapping,
        content: Option<LayerSpace<IRect>>,
    ) -> Option<LayerSpace<IRect>> {
        let child = self.base.child_output_layer_bounds(0, mapping, content);

        match (self.layer_crop(mapping), child) {
            (Some(crop), Some(child)) => {
                Some(crop.intersect(&child).unwrap_or_else(LayerSpace::empty))
            }
            (Some(crop), None) => Some(crop),
            (None, child) => child,
        }
    }

    fn on_get_ctm_capability(&self) -> MatrixCapability {
        if self.rect.is_some() {
            MatrixCapability::ScaleTranslate
        } else {
            MatrixCapability::Complex
        }
    }
}
