use thiserror::Error;

/// Typed error kinds for the core engine (spec §7). Ray-level failures
/// (`RayLost`, `InterceptFailure`) are recoverable by the propagator and are
/// never returned out of `radiate`; they exist here so that the lower-level
/// geometry routines that are called directly (tests, diagnostics) have a
/// precise way to report them.
#[derive(Debug, Error)]
pub enum Error {
    #[error("no element with handle {0:?}")]
    InvalidHandle(crate::registry::ElementId),

    #[error("element `{element}` has no parameter `{name}`")]
    InvalidParameter { element: String, name: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("alignment failed at element `{element}`: {reason}")]
    AlignmentFailure { element: String, reason: String },

    #[error("intercept failed: {0}")]
    InterceptFailure(String),

    #[error("ray lost: {0}")]
    RayLost(String),

    #[error("I/O failure: {0}")]
    IoFailure(String),

    #[error("capacity exceeded: needed {needed}, had {available}")]
    CapacityExceeded { needed: usize, available: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
