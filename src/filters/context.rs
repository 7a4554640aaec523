use std::sync::atomic::{AtomicUsize, Ordering};

use crate::backend::ImageBackend;
use crate::color::{ColorSpace, ColorType};
use crate::mapping::Mapping;
use crate::point::ISize;
use crate::rect::IRect;
use crate::session::Session;
use crate::space::LayerSpace;
use crate::surface_utils::shared_surface::ExclusiveImageSurface;

use super::cache::FilterCache;
use super::result::FilterResult;

/// Counters for one or more evaluation passes.
#[derive(Debug, Default)]
pub struct Stats {
    visited_filters: AtomicUsize,
    cache_hits: AtomicUsize,
    offscreen_surfaces: AtomicUsize,
    zero_copy_subsets: AtomicUsize,
    shader_draws: AtomicUsize,
}

impl Stats {
    pub fn new() -> Stats {
        Stats::default()
    }

    pub(crate) fn visit_filter(&self) {
        self.visited_filters.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn offscreen_surface(&self) {
        self.offscreen_surfaces.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn zero_copy_subset(&self) {
        self.zero_copy_subsets.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn shader_draw(&self) {
        self.shader_draws.fetch_add(1, Ordering::Relaxed);
    }

    pub fn visited_filters(&self) -> usize {
        self.visited_filters.load(Ordering::Relaxed)
    }

    pub fn cache_hits(&self) -> usize {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn offscreen_surfaces(&self) -> usize {
        self.offscreen_surfaces.load(Ordering::Relaxed)
    }

    pub fn zero_copy_subsets(&self) -> usize {
        self.zero_copy_subsets.load(Ordering::Relaxed)
    }

    pub fn shader_draws(&self) -> usize {
        self.shader_draws.load(Ordering::Relaxed)
    }

    pub fn report(&self, session: &Session) {
        fg_log!(
            session,
            "(filter pass: {} filters visited, {} cache hits, {} offscreen surfaces, \
             {} zero-copy subsets, {} shader draws)",
            self.visited_filters(),
            self.cache_hits(),
            self.offscreen_surfaces(),
            self.zero_copy_subsets(),
            self.shader_draws()
        );
    }
}

/// Everything a filter needs to evaluate itself for one pass.
///
/// Contexts are never mutated; nodes derive new ones with the `with_new_*` methods to hand
/// their children a different desired output, color space or source.
#[derive(Clone)]
pub struct Context<'a> {
    backend: &'a dyn ImageBackend,
    cache: Option<&'a dyn FilterCache>,
    session: &'a Session,
    stats: &'a Stats,

    mapping: Mapping,

    /// The layer-space rectangle the caller needs filled.
    desired_output: LayerSpace<IRect>,

    /// The dynamic input of the graph, used by filters with a `None` input.
    source: FilterResult,

    color_type: ColorType,

    /// Working color space; `None` means colors are not converted.
    color_space: Option<ColorSpace>,
}

impl<'a> Context<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        backend: &'a dyn ImageBackend,
        session: &'a Session,
        stats: &'a Stats,
        mapping: Mapping,
        desired_output: LayerSpace<IRect>,
        source: FilterResult,
        color_type: ColorType,
        color_space: Option<ColorSpace>,
    ) -> Context<'a> {
        Context {
            backend,
            cache: None,
            session,
            stats,
            mapping,
            desired_output,
            source,
            color_type,
            color_space,
        }
    }

    pub fn with_cache(mut self, cache: &'a dyn FilterCache) -> Context<'a> {
        self.cache = Some(cache);
        self
    }

    pub fn with_new_desired_output(&self, desired_output: LayerSpace<IRect>) -> Context<'a> {
        Context {
            desired_output,
            ..self.clone()
        }
    }

    pub fn with_new_color_space(&self, color_space: Option<ColorSpace>) -> Context<'a> {
        Context {
            color_space,
            ..self.clone()
        }
    }

    pub fn with_new_source(&self, source: FilterResult) -> Context<'a> {
        Context {
            source,
            ..self.clone()
        }
    }

    #[inline]
    pub fn backend(&self) -> &'a dyn ImageBackend {
        self.backend
    }

    #[inline]
    pub fn cache(&self) -> Option<&'a dyn FilterCache> {
        self.cache
    }

    #[inline]
    pub fn session(&self) -> &'a Session {
        self.session
    }

    #[inline]
    pub fn stats(&self) -> &'a Stats {
        self.stats
    }

    #[inline]
    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    #[inline]
    pub fn desired_output(&self) -> LayerSpace<IRect> {
        self.desired_output
    }

    #[inline]
    pub fn source(&self) -> &FilterResult {
        &self.source
    }

    #[inline]
    pub fn color_type(&self) -> ColorType {
        self.color_type
    }

    #[inline]
    pub fn color_space(&self) -> Option<ColorSpace> {
        self.color_space
    }

    /// Allocates a transparent surface in the context's color type and space.
    ///
    /// Failure is logged and returns `None`; callers degrade to transparent black.
    pub fn make_surface(&self, size: LayerSpace<ISize>) -> Option<ExclusiveImageSurface> {
        let size = size.get();

        match self
            .backend
            .make_surface(size, self.color_type, self.color_space)
        {
            Ok(mut surface) => {
                surface.set_texture_backed(self.backend.is_texture_backed());
                self.stats.offscreen_surface();
                Some(surface)
            }

            Err(e) => {
                fg_log!(
                    self.session,
                    "(could not allocate {}×{} surface: {})",
                    size.width,
                    size.height,
                    e
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RasterBackend;

    #[test]
    fn derived_contexts_leave_original_alone() {
        let session = Session::new_for_test_suite();
        let stats = Stats::new();
        let ctx = Context::new(
            &RasterBackend,
            &session,
            &stats,
            Mapping::default(),
            LayerSpace::new(IRect::new(0, 0, 10, 10)),
            FilterResult::default(),
            ColorType::Rgba8888,
            Some(ColorSpace::Srgb),
        );

        let other = ctx
            .with_new_desired_output(LayerSpace::new(IRect::new(5, 5, 6, 6)))
            .with_new_color_space(None);

        assert_eq!(ctx.desired_output().get(), IRect::new(0, 0, 10, 10));
        assert_eq!(ctx.color_space(), Some(ColorSpace::Srgb));
        assert_eq!(other.desired_output().get(), IRect::new(5, 5, 6, 6));
        assert_eq!(other.color_space(), None);
    }

    #[test]
    fn surface_allocation_is_counted() {
        let session = Session::new_for_test_suite();
        let stats = Stats::new();
        let ctx = Context::new(
            &RasterBackend,
            &session,
            &stats,
            Mapping::default(),
            LayerSpace::empty(),
            FilterResult::default(),
            ColorType::Rgba8888,
            None,
        );

        assert!(ctx.make_surface(LayerSpace::new(ISize::new(4, 4))).is_some());
        assert!(ctx.make_surface(LayerSpace::new(ISize::new(0, 4))).is_none());
        assert_eq!(stats.offscreen_surfaces(), 1);
    }
}
