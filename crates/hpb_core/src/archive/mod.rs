//! Archive handling: batch bundle extraction and result packaging.

mod extract;
mod package;

pub use extract::extract;
pub use package::{build_package, package_outputs, write_json, PackageArtifacts};
