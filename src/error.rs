//! Error types.

use thiserror::Error;

/// A fixed limit in the library was exceeded.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ImplementationLimit {
    /// A convolution kernel has more elements than the largest packed-texture strategy holds.
    KernelTooLarge,

    /// A surface would be wider or taller than [`MAX_SURFACE_DIMENSION`](crate::limits::MAX_SURFACE_DIMENSION).
    SurfaceTooLarge,
}

impl std::fmt::Display for ImplementationLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            ImplementationLimit::KernelTooLarge => write!(
                f,
                "cannot convolve with more than {} kernel elements",
                crate::limits::MAX_KERNEL_ELEMENTS
            ),
            ImplementationLimit::SurfaceTooLarge => write!(
                f,
                "cannot allocate surfaces larger than {} pixels on a side",
                crate::limits::MAX_SURFACE_DIMENSION
            ),
        }
    }
}

/// Rejection of a filter at construction time.
///
/// Every factory in [`image_filters`](crate::image_filters) returns this instead of a node
/// when its parameters can't produce a well-formed filter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    #[error("invalid parameter value: {0}")]
    InvalidParameter(String),

    #[error("matrix is not invertible")]
    NonInvertibleMatrix,

    #[error("limit exceeded: {0}")]
    LimitExceeded(ImplementationLimit),

    #[error("effect error: {0}")]
    Effect(#[from] EffectError),
}

impl FilterError {
    pub(crate) fn invalid(s: impl Into<String>) -> Self {
        FilterError::InvalidParameter(s.into())
    }
}

/// Failure to allocate a surface.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum SurfaceError {
    #[error("invalid surface size {width}×{height}")]
    InvalidSize { width: i32, height: i32 },

    #[error("{0}")]
    LimitExceeded(ImplementationLimit),

    #[error("out of memory for a {width}×{height} surface")]
    OutOfMemory { width: i32, height: i32 },
}

/// Errors from declaring runtime effects or binding their inputs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EffectError {
    #[error("duplicate declaration of `{0}`")]
    DuplicateName(String),

    #[error("unknown uniform `{0}`")]
    UnknownUniform(String),

    #[error("unknown child `{0}`")]
    UnknownChild(String),

    #[error("uniform `{name}` expects {expected} floats, got {actual}")]
    UniformSize {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("uniform data is {actual} bytes, expected {expected}")]
    UniformBlobSize { expected: usize, actual: usize },

    #[error("expected {expected} children, got {actual}")]
    ChildCount { expected: usize, actual: usize },
}
