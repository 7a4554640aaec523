//! Entry point for the filter graph infrastructure.
//!
//! A filter graph is a DAG of [`ImageFilter`] nodes.  Evaluating it happens in two
//! phases: bounds negotiation, where each node tells its caller which layer-space area
//! it needs from the source ([`get_input_layer_bounds`]) and which area it can possibly
//! cover ([`get_output_layer_bounds`]), and pixel evaluation through [`filter_image`].
//!
//! Nodes implement the `on_*` methods; callers use the wrappers on `dyn ImageFilter`,
//! which add the bookkeeping shared by all nodes.
//!
//! [`get_input_layer_bounds`]: trait.ImageFilter.html#method.get_input_layer_bounds
//! [`get_output_layer_bounds`]: trait.ImageFilter.html#method.get_output_layer_bounds
//! [`filter_image`]: trait.ImageFilter.html#method.filter_image

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::backend::ImageBackend;
use crate::color::{ColorSpace, ColorType};
use crate::mapping::{Mapping, MatrixCapability};
use crate::matrix::Matrix;
use crate::point::Point;
use crate::rect::{IRect, Rect};
use crate::session::Session;
use crate::shader::SamplingOptions;
use crate::space::{DeviceSpace, LayerSpace, ParameterSpace};
use crate::surface_utils::shared_surface::SharedImageSurface;

pub mod blend;
pub mod blur;
pub mod cache;
pub mod compose;
pub mod context;
pub mod convolve_matrix;
pub mod crop;
pub mod displacement_map;
pub mod image;
pub mod lighting;
pub mod matrix_transform;
pub mod merge;
pub mod result;
pub mod runtime;
pub mod shader;

#[cfg(test)]
pub(crate) mod test_utils;

use self::cache::{CacheKey, FilterCache};
use self::context::{Context, Stats};
use self::result::FilterResult;

/// Shared handle to a filter node; the same node may appear several times in a graph.
pub type FilterRef = Arc<dyn ImageFilter>;

/// Process-wide unique identity of a filter node.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct FilterId(u64);

impl FilterId {
    pub fn next() -> FilterId {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        FilterId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// State common to all filter nodes: identity and inputs.
///
/// A `None` input stands for the dynamic source of the graph.
#[derive(Debug)]
pub struct FilterBase {
    id: FilterId,
    inputs: Vec<Option<FilterRef>>,
}

impl FilterBase {
    pub fn new(inputs: Vec<Option<FilterRef>>) -> FilterBase {
        FilterBase {
            id: FilterId::next(),
            inputs,
        }
    }

    #[inline]
    pub fn id(&self) -> FilterId {
        self.id
    }

    #[inline]
    pub fn inputs(&self) -> &[Option<FilterRef>] {
        &self.inputs
    }

    #[inline]
    pub fn input(&self, index: usize) -> Option<&FilterRef> {
        self.inputs.get(index).and_then(|i| i.as_ref())
    }

    /// Evaluates input `index`, or returns the source for a `None` input.
    pub fn child_output(&self, index: usize, ctx: &Context<'_>) -> FilterResult {
        match self.input(index) {
            Some(f) => f.filter_image(ctx),
            None => ctx.source().clone(),
        }
    }

    /// What input `index` needs from the source to produce `desired`.
    pub fn child_input_layer_bounds(
        &self,
        index: usize,
        mapping: &Mapping,
        desired: LayerSpace<IRect>,
        content: Option<LayerSpace<IRect>>,
    ) -> LayerSpace<IRect> {
        match self.input(index) {
            Some(f) => f.get_input_layer_bounds(mapping, desired, content),
            None => desired,
        }
    }

    /// What input `index` may produce; `None` is unbounded.
    pub fn child_output_layer_bounds(
        &self,
        index: usize,
        mapping: &Mapping,
        content: Option<LayerSpace<IRect>>,
    ) -> Option<LayerSpace<IRect>> {
        match self.input(index) {
            Some(f) => f.get_output_layer_bounds(mapping, content),
            None => content,
        }
    }
}

/// The contract every filter node implements.
pub trait ImageFilter: fmt::Debug + Send + Sync {
    fn base(&self) -> &FilterBase;

    /// Produces this node's output for `ctx.desired_output()`.
    ///
    /// Must only ask its inputs for what `on_get_input_layer_bounds()` declares.
    fn on_filter_image(&self, ctx: &Context<'_>) -> FilterResult;

    /// The layer-space area of the source needed to produce `desired`.
    fn on_get_input_layer_bounds(
        &self,
        mapping: &Mapping,
        desired: LayerSpace<IRect>,
        content: Option<LayerSpace<IRect>>,
    ) -> LayerSpace<IRect>;

    /// The largest area this node can cover, given that the source is non-transparent
    /// only within `content` (`None` if unknown).  `None` means unbounded.
    fn on_get_output_layer_bounds(
        &self,
        mapping: &Mapping,
        content: Option<LayerSpace<IRect>>,
    ) -> Option<LayerSpace<IRect>>;

    /// Whether transparent black input can produce something else.
    fn on_affects_transparent_black(&self) -> bool {
        false
    }

    fn on_get_ctm_capability(&self) -> MatrixCapability {
        MatrixCapability::Complex
    }

    /// Whether the node hides its inputs' effect on transparent black.
    fn ignore_inputs_affects_transparent_black(&self) -> bool {
        false
    }
}

impl dyn ImageFilter {
    pub fn unique_id(&self) -> FilterId {
        self.base().id()
    }

    pub fn count_inputs(&self) -> usize {
        self.base().inputs().len()
    }

    /// Evaluates the node, consulting and filling the context's cache.
    pub fn filter_image(&self, ctx: &Context<'_>) -> FilterResult {
        if ctx.desired_output().is_empty() {
            return FilterResult::empty();
        }

        ctx.stats().visit_filter();

        let key = ctx.cache().map(|_| CacheKey::new(self.unique_id(), ctx));

        if let (Some(cache), Some(key)) = (ctx.cache(), key.as_ref()) {
            if let Some(result) = cache.get(key) {
                ctx.stats().cache_hit();
                return result;
            }
        }

        let result = self.on_filter_image(ctx);

        if let (Some(cache), Some(key)) = (ctx.cache(), key) {
            cache.set(key, result.clone());
        }

        result
    }

    pub fn get_input_layer_bounds(
        &self,
        mapping: &Mapping,
        desired: LayerSpace<IRect>,
        content: Option<LayerSpace<IRect>>,
    ) -> LayerSpace<IRect> {
        if desired.is_empty() {
            LayerSpace::empty()
        } else {
            self.on_get_input_layer_bounds(mapping, desired, content)
        }
    }

    pub fn get_output_layer_bounds(
        &self,
        mapping: &Mapping,
        content: Option<LayerSpace<IRect>>,
    ) -> Option<LayerSpace<IRect>> {
        match content {
            Some(c) if c.is_empty() && !self.affects_transparent_black() => Some(c),
            _ => self.on_get_output_layer_bounds(mapping, content),
        }
    }

    pub fn affects_transparent_black(&self) -> bool {
        if self.on_affects_transparent_black() {
            true
        } else if self.ignore_inputs_affects_transparent_black() {
            false
        } else {
            self.base()
                .inputs()
                .iter()
                .flatten()
                .any(|f| f.affects_transparent_black())
        }
    }

    /// The least capable of this node and all of its descendants.
    pub fn get_ctm_capability(&self) -> MatrixCapability {
        self.base()
            .inputs()
            .iter()
            .flatten()
            .map(|f| f.get_ctm_capability())
            .fold(self.on_get_ctm_capability(), std::cmp::min)
    }

    /// Decomposes `ctm` for this graph.
    pub fn mapping_for(
        &self,
        ctm: &Matrix,
        representative_point: ParameterSpace<Point>,
    ) -> Option<Mapping> {
        Mapping::decompose_ctm(ctm, self.get_ctm_capability(), representative_point)
    }

    /// The device-space area of the source needed to produce `desired`.
    pub fn get_input_bounds(
        &self,
        mapping: &Mapping,
        desired: DeviceSpace<IRect>,
        content: Option<ParameterSpace<Rect>>,
    ) -> DeviceSpace<IRect> {
        let desired = mapping.device_to_layer(desired);
        let content = content.map(|c| mapping.param_to_layer(c).round_out());

        let required = self.get_input_layer_bounds(mapping, desired, content);
        mapping.layer_to_device(required)
    }

    /// The device-space area this graph can cover; `None` if unbounded.
    pub fn get_output_bounds(
        &self,
        mapping: &Mapping,
        content: Option<ParameterSpace<Rect>>,
    ) -> Option<DeviceSpace<IRect>> {
        let content = content.map(|c| mapping.param_to_layer(c).round_out());

        self.get_output_layer_bounds(mapping, content)
            .map(|b| mapping.layer_to_device(b))
    }
}

/// Where the source of a graph comes from and where its output goes.
pub struct RenderParams<'a> {
    pub backend: &'a dyn ImageBackend,
    pub session: &'a Session,
    pub cache: Option<&'a dyn FilterCache>,

    /// The canvas transform, from parameter space to device space.
    pub ctm: Matrix,

    /// The source image, placed at `source_rect` in parameter space.
    pub source: Option<SharedImageSurface>,
    pub source_rect: ParameterSpace<Rect>,

    /// The device-space area to produce.
    pub clip: DeviceSpace<IRect>,

    pub color_type: ColorType,
    pub color_space: Option<ColorSpace>,
}

/// The output of a graph in layer space, and the mapping needed to draw it.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub result: FilterResult,
    pub mapping: Mapping,
}

/// Evaluates a whole graph.
///
/// Returns `None` if the canvas transform can't be decomposed for this graph; in that case
/// nothing should be drawn.
pub fn render(filter: &FilterRef, params: &RenderParams<'_>) -> Option<Rendered> {
    let start = Instant::now();
    let session = params.session;

    let r = params.source_rect.get();
    let representative = ParameterSpace::new(Point::new(
        (r.x0 + r.x1) / 2.0,
        (r.y0 + r.y1) / 2.0,
    ));

    let mapping = match filter.mapping_for(&params.ctm, representative) {
        Some(m) => m,
        None => {
            fg_log!(session, "(filter graph {:?}: canvas transform is not invertible)", filter.unique_id());
            return None;
        }
    };

    let stats = Stats::new();
    let desired = mapping.device_to_layer(params.clip);

    let mut ctx = Context::new(
        params.backend,
        session,
        &stats,
        mapping,
        desired,
        FilterResult::empty(),
        params.color_type,
        params.color_space,
    );

    if let Some(cache) = params.cache {
        ctx = ctx.with_cache(cache);
    }

    if let Some(ref image) = params.source {
        let src_rect = Rect::from(image.bounds());
        let source = FilterResult::from_image(
            &ctx,
            image.clone(),
            src_rect,
            params.source_rect,
            SamplingOptions::default(),
        );
        ctx = ctx.with_new_source(source);
    }

    let result = filter.filter_image(&ctx);

    stats.report(session);

    let elapsed = start.elapsed();
    fg_log!(
        session,
        "(rendered filter graph {:?} in\n    {} seconds)",
        filter.unique_id(),
        elapsed.as_secs_f64()
    );

    Some(Rendered { result, mapping })
}
