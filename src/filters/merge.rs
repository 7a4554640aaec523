use crate::mapping::Mapping;
use crate::rect::IRect;
use crate::shader::SamplingOptions;
use crate::space::LayerSpace;

use super::context::Context;
use super::result::{FilterResult, FilterResultBuilder, ShaderFlags};
use super::{FilterBase, FilterRef, ImageFilter};

/// Composites its inputs with source-over, the first one at the bottom.
#[derive(Debug)]
pub struct Merge {
    base: FilterBase,
}

impl Merge {
    pub fn new(inputs: Vec<Option<FilterRef>>) -> Merge {
        Merge {
            base: FilterBase::new(inputs),
        }
    }
}

impl ImageFilter for Merge {
    fn base(&self) -> &FilterBase {
        &self.base
    }

    fn on_filter_image(&self, ctx: &Context<'_>) -> FilterResult {
        let mut builder = FilterResultBuilder::new(ctx);

        for i in 0..self.base.inputs().len() {
            let child = self.base.child_output(i, ctx);
            if !child.is_empty() {
                builder.add(child, None, ShaderFlags::empty(), SamplingOptions::default());
            }
        }

        builder.merge()
    }

    fn on_get_input_layer_bounds(
        &self,
        mapping: &Mapping,
        desired: LayerSpace<IRect>,
        content: Option<LayerSpace<IRect>>,
    ) -> LayerSpace<IRect> {
        (0..self.base.inputs().len()).fold(LayerSpace::empty(), |acc, i| {
            acc.join(&self.base.child_input_layer_bounds(i, mapping, desired, content))
        })
    }

    fn on_get_output_layer_bounds(
        &self,
        mapping: &Mapping,
        content: Option<LayerSpace<IRect>>,
    ) -> Option<LayerSpace<IRect>> {
        (0..self.base.inputs().len()).try_fold(LayerSpace::empty(), |acc, i| {
            self.base
                .child_output_layer_bounds(i, mapping, content)
                .map(|b| acc.join(&b))
        })
    }
}
