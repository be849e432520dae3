//! Synchrotron-beamline ray-tracing engine: element model, shape solvers,
//! grating patterns, sources, chained propagation, diagnostics and system
//! registry (see `DESIGN.md` at the workspace root for the module ledger).

pub mod config;
pub mod diagnostics;
pub mod element;
pub mod error;
pub mod ffi;
pub mod geometry;
pub mod kinds;
pub mod legacy_import;
pub mod parameter;
pub mod pattern;
pub mod persistence;
pub mod propagate;
pub mod ray;
pub mod registry;
pub mod shapes;
pub mod source;
pub mod surface;

pub use element::Element;
pub use error::{Error, Result};
pub use kinds::ElementKind;
pub use propagate::{radiate, Context, PropagationStats};
pub use ray::Ray;
pub use registry::{ElementId, Registry};
