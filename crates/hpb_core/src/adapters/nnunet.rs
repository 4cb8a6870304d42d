//! nnU-Net v1 Task008 adapter (hepatic vessels and tumours).

use std::path::{Path, PathBuf};

use crate::config::Settings;
use crate::errors::PipelineResult;
use crate::models::{Task008Options, VOLUME_SUFFIX};
use crate::runner::ToolInvocation;

use super::resolve::{resolve_output, ResolveStrategy};

/// The nnU-Net v1 prediction entry point.
pub const NNUNET_PROGRAM: &str = "nnUNet_predict";

const TASK_ID: &str = "Task008_HepaticVessel";
const MODEL: &str = "3d_fullres";
const CHECKPOINT: &str = "model_final_checkpoint";
/// Files nnU-Net drops next to its masks.
const AUX_FILES: &[&str] = &["plans.pkl", "postprocessing.json"];

/// Multi-fold vessel/tumour model.
///
/// Expects an input directory containing exactly one volume named
/// `<case_id>_0000.nii.gz` (the tool scans the directory itself).
/// Test-time augmentation is disabled and pre/post-processing is
/// pinned to one thread; runtime tuning belongs to the deployment,
/// not this adapter.
#[derive(Debug, Clone)]
pub struct NnUnetTask008 {
    program: String,
    weights_root: PathBuf,
}

impl NnUnetTask008 {
    pub fn new(settings: &Settings) -> Self {
        Self {
            program: NNUNET_PROGRAM.to_string(),
            weights_root: settings.weights_root.clone(),
        }
    }

    /// Point the adapter at a different executable (test seam).
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Run the model and resolve its output artifact.
    ///
    /// The tool usually writes `<case_id>.nii.gz` but has been
    /// observed renaming outputs; the fallback picks the first mask
    /// in the directory, skipping the auxiliary files.
    pub fn run(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        case_id: &str,
        options: &Task008Options,
    ) -> PipelineResult<PathBuf> {
        let mut invocation = ToolInvocation::new(&self.program)
            .arg("-i")
            .arg(input_dir.display().to_string())
            .arg("-o")
            .arg(output_dir.display().to_string())
            .args(["-t", TASK_ID])
            .args(["-m", MODEL])
            .args(["-f", options.folds.as_str()])
            .arg("--disable_tta")
            .args(["--num_threads_preprocessing", "1"])
            .args(["--num_threads_nifti_save", "1"])
            .args(["-chk", CHECKPOINT]);

        // The ambient environment's weights location wins over the
        // configured default.
        if std::env::var_os("RESULTS_FOLDER").is_none() {
            invocation = invocation.env("RESULTS_FOLDER", self.weights_root.display().to_string());
        }

        invocation.run()?;

        let strategies = [
            ResolveStrategy::Exact(format!("{case_id}{VOLUME_SUFFIX}")),
            ResolveStrategy::FirstMatching {
                suffix: VOLUME_SUFFIX.to_string(),
                exclude: AUX_FILES.iter().map(|s| s.to_string()).collect(),
            },
        ];
        resolve_output(NNUNET_PROGRAM, output_dir, &strategies)
    }
}
