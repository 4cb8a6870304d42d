//! TotalSegmentator adapters: liver-only and multi-label whole-body.

use std::path::{Path, PathBuf};

use crate::errors::PipelineResult;
use crate::models::{LIVER_ARTIFACT, TotalSegOptions};
use crate::runner::ToolInvocation;

use super::resolve::{resolve_output, ResolveStrategy};

/// The TotalSegmentator entry point, shared by both adapters.
pub const TOTALSEG_PROGRAM: &str = "TotalSegmentator";

/// Liver-only region-of-interest model.
///
/// The tool writes one mask per requested structure; with
/// `--roi_subset liver` there is exactly one expected filename and
/// its absence is fatal.
#[derive(Debug, Clone)]
pub struct TotalSegLiver {
    program: String,
}

impl TotalSegLiver {
    pub fn new() -> Self {
        Self {
            program: TOTALSEG_PROGRAM.to_string(),
        }
    }

    /// Point the adapter at a different executable (test seam).
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn run(
        &self,
        input: &Path,
        output_dir: &Path,
        options: &TotalSegOptions,
    ) -> PipelineResult<PathBuf> {
        let mut invocation = ToolInvocation::new(&self.program)
            .arg("-i")
            .arg(input.display().to_string())
            .arg("-o")
            .arg(output_dir.display().to_string())
            .args(["--roi_subset", "liver"]);
        if options.fast {
            invocation = invocation.arg("--fast");
        }
        invocation.run()?;

        resolve_output(
            "TotalSegmentator liver",
            output_dir,
            &[ResolveStrategy::Exact(LIVER_ARTIFACT.to_string())],
        )
    }
}

impl Default for TotalSegLiver {
    fn default() -> Self {
        Self::new()
    }
}

/// Multi-label whole-body model.
///
/// Depending on the tool version the combined mask lands as
/// `segmentation.nii.gz` or `segmentations.nii.gz`; both candidates
/// are tried in that priority order.
#[derive(Debug, Clone)]
pub struct TotalSegMultiLabel {
    program: String,
}

impl TotalSegMultiLabel {
    pub fn new() -> Self {
        Self {
            program: TOTALSEG_PROGRAM.to_string(),
        }
    }

    /// Point the adapter at a different executable (test seam).
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn run(
        &self,
        input: &Path,
        output_dir: &Path,
        options: &TotalSegOptions,
    ) -> PipelineResult<PathBuf> {
        let mut invocation = ToolInvocation::new(&self.program)
            .arg("-i")
            .arg(input.display().to_string())
            .arg("-o")
            .arg(output_dir.display().to_string())
            .arg("--ml");
        if options.fast {
            invocation = invocation.arg("--fast");
        }
        invocation.run()?;

        resolve_output(
            "TotalSegmentator multi-label",
            output_dir,
            &[ResolveStrategy::Candidates(vec![
                "segmentation.nii.gz".to_string(),
                "segmentations.nii.gz".to_string(),
            ])],
        )
    }
}

impl Default for TotalSegMultiLabel {
    fn default() -> Self {
        Self::new()
    }
}
