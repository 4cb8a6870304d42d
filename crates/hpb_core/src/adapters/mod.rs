//! Adapters around the external segmentation model binaries.
//!
//! Each adapter translates `(inputs, output dir, options)` into one
//! tool invocation and then resolves the tool's actual output file.
//! The binaries have independent, observed-but-undocumented naming
//! conventions; the per-adapter resolution policies isolate that
//! instability and give a single place to update when a tool's
//! behavior changes.

mod nnunet;
mod resolve;
mod totalseg;

pub use nnunet::{NnUnetTask008, NNUNET_PROGRAM};
pub use resolve::{resolve_output, ResolveStrategy};
pub use totalseg::{TotalSegLiver, TotalSegMultiLabel, TOTALSEG_PROGRAM};
