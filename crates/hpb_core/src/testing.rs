//! Shared test fixtures: stub model executables and a service wired
//! to them. Only compiled for unit tests.
//!
//! `tests/pipeline.rs` carries its own copy of these fixtures since
//! `#[cfg(test)]` modules are invisible to integration tests; keep
//! the two in sync when changing a stub.

use std::fs;
use std::path::{Path, PathBuf};

use crate::adapters::{NnUnetTask008, TotalSegLiver, TotalSegMultiLabel};
use crate::config::Settings;
use crate::pipeline::SegmentationService;

/// Stub honoring the TotalSegmentator liver argument surface.
pub const LIVER_STUB: &str = r#"#!/bin/sh
out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then out="$2"; shift; fi
  shift
done
mkdir -p "$out"
printf liver > "$out/liver.nii.gz"
"#;

/// Stub honoring the nnU-Net argument surface: derives the case id
/// from the staged `<case>_0000.nii.gz` input.
pub const NNUNET_STUB: &str = r#"#!/bin/sh
in=""
out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-i" ]; then in="$2"; shift; fi
  if [ "$1" = "-o" ]; then out="$2"; shift; fi
  shift
done
mkdir -p "$out"
for f in "$in"/*_0000.nii.gz; do
  base=$(basename "$f" _0000.nii.gz)
  printf task008 > "$out/$base.nii.gz"
done
"#;

/// Stub for the multi-label model, writing the first-priority
/// candidate name.
pub const MULTILABEL_STUB: &str = r#"#!/bin/sh
out=""
while [ $# -gt 0 ]; do
  if [ "$1" = "-o" ]; then out="$2"; shift; fi
  shift
done
mkdir -p "$out"
printf multilabel > "$out/segmentation.nii.gz"
"#;

/// Write an executable stub script into `dir`.
pub fn write_stub(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

/// A service with workspace roots under `root` and all three
/// adapters pointed at stub executables.
pub fn stub_service(root: &Path) -> SegmentationService {
    let bin = root.join("bin");
    fs::create_dir_all(&bin).unwrap();
    let liver = write_stub(&bin, "totalseg_liver", LIVER_STUB);
    let nnunet = write_stub(&bin, "nnunet_predict", NNUNET_STUB);
    let multilabel = write_stub(&bin, "totalseg_ml", MULTILABEL_STUB);

    let settings = Settings {
        in_root: root.join("in"),
        out_root: root.join("out"),
        ..Settings::default()
    };
    settings.ensure_roots().unwrap();

    SegmentationService::with_adapters(
        settings.clone(),
        NnUnetTask008::new(&settings).with_program(nnunet.display().to_string()),
        TotalSegLiver::new().with_program(liver.display().to_string()),
        TotalSegMultiLabel::new().with_program(multilabel.display().to_string()),
    )
}
