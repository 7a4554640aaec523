//! Memoization of filter results across evaluation passes.
//!
//! A cache is only ever an optimization: filters produce the same output whether or not
//! an entry is found.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::color::{ColorSpace, ColorType};
use crate::limits::MAX_CACHE_ENTRIES;
use crate::rect::IRect;
use crate::shader::SamplingOptions;
use crate::transform::Transform;

use super::context::Context;
use super::result::FilterResult;
use super::FilterId;

fn transform_bits(t: &Transform) -> [u64; 6] {
    [
        t.xx.to_bits(),
        t.yx.to_bits(),
        t.xy.to_bits(),
        t.yy.to_bits(),
        t.x0.to_bits(),
        t.y0.to_bits(),
    ]
}

fn sampling_bits(s: SamplingOptions) -> (u8, u32, u32) {
    match s {
        SamplingOptions::Nearest => (0, 0, 0),
        SamplingOptions::Linear => (1, 0, 0),
        SamplingOptions::Cubic { b, c } => (2, b.to_bits(), c.to_bits()),
        SamplingOptions::Anisotropic { max_aniso } => (3, max_aniso, 0),
    }
}

/// Image id, subset, transform, sampling and bounds of a source.
type SourceKey = (u64, IRect, [u64; 6], (u8, u32, u32), IRect);

/// Identifies one evaluation of one filter.
///
/// Everything in the context that can change a filter's output is part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    filter: FilterId,
    layer_matrix: [u64; 6],
    desired_output: IRect,
    source: Option<SourceKey>,
    color_type: ColorType,
    color_space: Option<ColorSpace>,
}

impl CacheKey {
    pub fn new(filter: FilterId, ctx: &Context<'_>) -> CacheKey {
        let source = ctx.source();

        CacheKey {
            filter,
            layer_matrix: transform_bits(&ctx.mapping().layer_matrix()),
            desired_output: ctx.desired_output().get(),
            source: source.image().map(|image| {
                (
                    image.unique_id(),
                    image.subset_rect(),
                    transform_bits(source.transform().inner()),
                    sampling_bits(source.sampling()),
                    source.layer_bounds().get(),
                )
            }),
            color_type: ctx.color_type(),
            color_space: ctx.color_space(),
        }
    }
}

pub trait FilterCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<FilterResult>;
    fn set(&self, key: CacheKey, result: FilterResult);
}

struct Entries {
    map: HashMap<CacheKey, FilterResult>,
    order: VecDeque<CacheKey>,
}

/// An in-memory cache that evicts its oldest entries first.
pub struct MemoryCache {
    max_entries: usize,
    entries: Mutex<Entries>,
}

impl Default for MemoryCache {
    fn default() -> MemoryCache {
        MemoryCache::new(MAX_CACHE_ENTRIES)
    }
}

impl MemoryCache {
    pub fn new(max_entries: usize) -> MemoryCache {
        MemoryCache {
            max_entries,
            entries: Mutex::new(Entries {
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FilterCache for MemoryCache {
    fn get(&self, key: &CacheKey) -> Option<FilterResult> {
        let entries = self.entries.lock().ok()?;
        entries.map.get(key).cloned()
    }

    fn set(&self, key: CacheKey, result: FilterResult) {
        if self.max_entries == 0 {
            return;
        }

        if let Ok(mut entries) = self.entries.lock() {
            if entries.map.contains_key(&key) {
                entries.map.insert(key, result);
                return;
            }

            while entries.map.len() >= self.max_entries {
                match entries.order.pop_front() {
                    Some(oldest) => {
                        entries.map.remove(&oldest);
                    }
                    None => break,
                }
            }

            entries.order.push_back(key.clone());
            entries.map.insert(key, result);
        }
    }
}
