//! Per-case and batch execution pipelines.

mod batch;
mod case;

pub use case::SegmentationService;
