//! Lazy, bounds-aware evaluation of image filter graphs.
//!
//! A filter graph is a DAG of immutable nodes, built with the functions in
//! [`image_filters`].  Evaluating it against a source image happens in two phases:
//!
//! * Bounds negotiation asks each node which part of its inputs it needs in order to
//!   produce a given output, and how far its output can extend.  This never touches
//!   pixels, so it can be used to size offscreen layers before drawing anything.
//!
//! * Evaluation calls [`filter_image`] on the root, which recurses into the children
//!   and combines their [`FilterResult`]s.  A result is an image plus a deferred
//!   transform and crop; pixels are only produced when a node can't work with the
//!   deferred state.
//!
//! Coordinates live in one of three spaces: the *parameter space* in which filter
//! parameters are given, the *layer space* in which evaluation happens, and the *device
//! space* of the final pixels.  [`Mapping`] converts between them, and the
//! [`InSpace`](space::InSpace) wrapper keeps values from different spaces apart.
//!
//! # Example
//!
//! ```
//! use filtergraph::blender::BlendMode;
//! use filtergraph::color::{ColorSpace, ColorType};
//! use filtergraph::matrix::Matrix;
//! use filtergraph::rect::{IRect, Rect};
//! use filtergraph::space::{DeviceSpace, ParameterSpace};
//! use filtergraph::{image_filters, render, RasterBackend, RenderParams, Session};
//!
//! let shifted = image_filters::offset(4.0, 4.0, None, None).unwrap();
//! let filter = image_filters::blend(BlendMode::SrcOver, Some(shifted), None, None).unwrap();
//!
//! let session = Session::new_for_test_suite();
//!
//! let rendered = render(
//!     &filter,
//!     &RenderParams {
//!         backend: &RasterBackend,
//!         session: &session,
//!         cache: None,
//!         ctm: Matrix::identity(),
//!         source: None,
//!         source_rect: ParameterSpace::new(Rect::new(0.0, 0.0, 32.0, 32.0)),
//!         clip: DeviceSpace::new(IRect::new(0, 0, 32, 32)),
//!         color_type: ColorType::Rgba8888,
//!         color_space: Some(ColorSpace::Srgb),
//!     },
//! );
//!
//! // Without a source image there is nothing to draw.
//! assert!(rendered.unwrap().result.is_empty());
//! ```
//!
//! [`filter_image`]: filters::ImageFilter
//! [`FilterResult`]: filters::result::FilterResult

#![allow(rustdoc::private_intra_doc_links)]
#![allow(clippy::clone_on_ref_ptr)]
#![allow(clippy::not_unsafe_ptr_arg_deref)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::derive_partial_eq_without_eq)]
#![warn(nonstandard_style, rust_2018_idioms, unused)]
// Some lints no longer exist
#![warn(renamed_and_removed_lints)]
// Standalone lints
#![warn(trivial_casts, trivial_numeric_casts)]

// These two define macros, so they go first.
#[macro_use]
mod log;

#[macro_use]
mod util;

pub mod backend;
pub mod blender;
pub mod color;
pub mod effect;
pub mod error;
pub mod filters;
pub mod image_filters;
pub mod limits;
pub mod mapping;
pub mod matrix;
pub mod point;
pub mod rect;
pub mod session;
pub mod shader;
pub mod space;
pub mod surface_utils;
pub mod transform;

pub use crate::backend::{ImageBackend, RasterBackend};
pub use crate::error::{EffectError, FilterError, ImplementationLimit, SurfaceError};
pub use crate::filters::{render, FilterRef, ImageFilter, RenderParams, Rendered};
pub use crate::mapping::{Mapping, MatrixCapability};
pub use crate::session::Session;

#[doc(hidden)]
pub mod bench_only {
    pub use crate::filters::context::{Context, Stats};
    pub use crate::filters::result::FilterResult;
    pub use crate::point::{IPoint, ISize};
    pub use crate::rect::IRect;
    pub use crate::space::LayerSpace;
    pub use crate::surface_utils::{
        iterators::Pixels,
        shared_surface::{ExclusiveImageSurface, SharedImageSurface},
        EdgeMode, Pixel, PixelOps,
    };
}
