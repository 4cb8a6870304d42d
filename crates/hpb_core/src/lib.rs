//! HPB Core - per-case segmentation pipeline for HPB imaging volumes.
//!
//! This crate contains the whole execution pipeline with zero HTTP
//! dependencies: case workspace lifecycle, external model invocation,
//! output resolution, package/manifest assembly, and batch processing.
//! It can be driven by a web server or a CLI tool.

pub mod adapters;
pub mod archive;
pub mod config;
pub mod errors;
pub mod introspect;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod runner;
pub mod workspace;

#[cfg(test)]
pub(crate) mod testing;

pub use config::Settings;
pub use errors::{PipelineError, PipelineResult};
pub use pipeline::SegmentationService;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
