//! Single-case operations.
//!
//! Each operation follows the same shape: fresh case id, scoped
//! workspace, staged input volume, timed adapter run(s), and a result
//! archive in the system temp directory that outlives the workspace.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::adapters::{NnUnetTask008, TotalSegLiver, TotalSegMultiLabel};
use crate::archive::{build_package, package_outputs, PackageArtifacts};
use crate::config::Settings;
use crate::errors::{PipelineError, PipelineResult};
use crate::models::{
    CaseMetadata, Task008Options, TotalSegOptions, LIVER_ARTIFACT, MULTILABEL_ARTIFACT,
    TASK008_ARTIFACT, VOLUME_SUFFIX,
};
use crate::workspace::{unique_case_id, CaseWorkspace};

/// The segmentation pipeline entry point.
///
/// Owns the settings and the three model adapters. Callers (an HTTP
/// layer, a CLI) supply an input stream and receive the path of a
/// result archive back.
pub struct SegmentationService {
    settings: Settings,
    task008: NnUnetTask008,
    liver: TotalSegLiver,
    multilabel: TotalSegMultiLabel,
}

impl SegmentationService {
    pub fn new(settings: Settings) -> Self {
        let task008 = NnUnetTask008::new(&settings);
        Self {
            settings,
            task008,
            liver: TotalSegLiver::new(),
            multilabel: TotalSegMultiLabel::new(),
        }
    }

    /// Construct with explicit adapters (test seam for stub tools).
    pub fn with_adapters(
        settings: Settings,
        task008: NnUnetTask008,
        liver: TotalSegLiver,
        multilabel: TotalSegMultiLabel,
    ) -> Self {
        Self {
            settings,
            task008,
            liver,
            multilabel,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Liver-only segmentation. The archive contains exactly one
    /// file, `liver.nii.gz`.
    pub fn segment_liver(
        &self,
        volume: impl Read,
        options: &TotalSegOptions,
    ) -> PipelineResult<PathBuf> {
        let case_id = unique_case_id("case");
        let ws = self.workspace(&case_id)?;

        let input = ws.input_dir().join(format!("{case_id}{VOLUME_SUFFIX}"));
        stage_volume(volume, &[input.clone()])?;

        let (artifact, seconds) = timed(|| self.liver.run(&input, ws.output_dir(), options))?;
        log_stage(&case_id, "liver", seconds);

        self.single_artifact_archive(&ws, &case_id, &artifact, LIVER_ARTIFACT)
    }

    /// Vessel/tumour segmentation. The archive contains exactly one
    /// file, `task008.nii.gz`.
    pub fn segment_task008(
        &self,
        volume: impl Read,
        options: &Task008Options,
    ) -> PipelineResult<PathBuf> {
        let case_id = unique_case_id("case");
        let ws = self.workspace(&case_id)?;

        let input = ws.input_dir().join(format!("{case_id}_0000{VOLUME_SUFFIX}"));
        stage_volume(volume, &[input])?;

        let (artifact, seconds) = timed(|| {
            self.task008
                .run(ws.input_dir(), ws.output_dir(), &case_id, options)
        })?;
        log_stage(&case_id, "task008", seconds);

        self.single_artifact_archive(&ws, &case_id, &artifact, TASK008_ARTIFACT)
    }

    /// Multi-label whole-body segmentation. The archive contains
    /// exactly one file, `totalseg.nii.gz`.
    pub fn segment_multilabel(
        &self,
        volume: impl Read,
        options: &TotalSegOptions,
    ) -> PipelineResult<PathBuf> {
        let case_id = unique_case_id("case");
        let ws = self.workspace(&case_id)?;

        let input = ws.input_dir().join(format!("{case_id}{VOLUME_SUFFIX}"));
        stage_volume(volume, &[input.clone()])?;

        let (artifact, seconds) = timed(|| self.multilabel.run(&input, ws.output_dir(), options))?;
        log_stage(&case_id, "totalseg", seconds);

        self.single_artifact_archive(&ws, &case_id, &artifact, MULTILABEL_ARTIFACT)
    }

    /// Combined liver + vessel/tumour pipeline producing a full
    /// package: `liver.nii.gz`, `task008.nii.gz`, `meta.json`.
    pub fn segment_both(
        &self,
        mut volume: impl Read,
        task008_options: &Task008Options,
        totalseg_options: &TotalSegOptions,
    ) -> PipelineResult<PathBuf> {
        let case_id = unique_case_id("case");
        let ws = self.workspace(&case_id)?;

        let mut data = Vec::new();
        volume
            .read_to_end(&mut data)
            .map_err(|e| PipelineError::io("reading uploaded volume", e))?;

        let (pkg_dir, _metadata) =
            self.run_case(&ws, &case_id, &data, task008_options, totalseg_options)?;
        package_outputs(&pkg_dir, &case_id)
    }

    /// Full per-case pipeline shared by `segment_both` and the batch
    /// orchestrator: stage under both naming conventions, run liver
    /// then task008 into separate output subdirectories, build the
    /// package.
    pub(crate) fn run_case(
        &self,
        ws: &CaseWorkspace,
        case_id: &str,
        data: &[u8],
        task008_options: &Task008Options,
        totalseg_options: &TotalSegOptions,
    ) -> PipelineResult<(PathBuf, CaseMetadata)> {
        if data.is_empty() {
            return Err(PipelineError::invalid_input("uploaded volume is empty"));
        }

        // Same bytes under both conventions: TotalSegmentator takes a
        // file path, nnU-Net scans the directory for `*_0000`.
        let raw = ws.input_dir().join(format!("{case_id}{VOLUME_SUFFIX}"));
        let raw_0000 = ws.input_dir().join(format!("{case_id}_0000{VOLUME_SUFFIX}"));
        fs::write(&raw, data).map_err(|e| PipelineError::io("staging volume", e))?;
        fs::write(&raw_0000, data).map_err(|e| PipelineError::io("staging volume", e))?;

        let liver_dir = ws.output_dir().join("totalseg");
        let task_dir = ws.output_dir().join("task008");
        fs::create_dir_all(&liver_dir).map_err(|e| PipelineError::io("creating stage dir", e))?;
        fs::create_dir_all(&task_dir).map_err(|e| PipelineError::io("creating stage dir", e))?;

        let (liver_path, liver_seconds) =
            timed(|| self.liver.run(&raw, &liver_dir, totalseg_options))?;
        log_stage(case_id, "liver", liver_seconds);

        let (task008_path, task008_seconds) = timed(|| {
            self.task008
                .run(ws.input_dir(), &task_dir, case_id, task008_options)
        })?;
        log_stage(case_id, "task008", task008_seconds);

        let metadata = CaseMetadata::new(case_id, liver_seconds, task008_seconds);
        let pkg_dir = build_package(
            ws.output_dir(),
            PackageArtifacts {
                liver: &liver_path,
                task008: &task008_path,
            },
            &metadata,
        )?;
        Ok((pkg_dir, metadata))
    }

    fn workspace(&self, case_id: &str) -> PipelineResult<CaseWorkspace> {
        CaseWorkspace::create(&self.settings, case_id)
            .map_err(|e| PipelineError::io("creating case workspace", e))
    }

    /// Package one resolved artifact under its canonical name and
    /// compress it.
    fn single_artifact_archive(
        &self,
        ws: &CaseWorkspace,
        case_id: &str,
        artifact: &Path,
        canonical_name: &str,
    ) -> PipelineResult<PathBuf> {
        let pkg_dir = ws.output_dir().join("package");
        fs::create_dir_all(&pkg_dir).map_err(|e| PipelineError::io("creating package dir", e))?;
        fs::copy(artifact, pkg_dir.join(canonical_name))
            .map_err(|e| PipelineError::io("copying artifact", e))?;
        package_outputs(&pkg_dir, case_id)
    }
}

/// Write the uploaded volume to each target path.
fn stage_volume(mut volume: impl Read, targets: &[PathBuf]) -> PipelineResult<()> {
    let mut data = Vec::new();
    volume
        .read_to_end(&mut data)
        .map_err(|e| PipelineError::io("reading uploaded volume", e))?;
    if data.is_empty() {
        return Err(PipelineError::invalid_input("uploaded volume is empty"));
    }
    for target in targets {
        fs::write(target, &data).map_err(|e| PipelineError::io("staging volume", e))?;
    }
    Ok(())
}

fn timed<T>(f: impl FnOnce() -> PipelineResult<T>) -> PipelineResult<(T, f64)> {
    let start = Instant::now();
    let value = f()?;
    Ok((value, start.elapsed().as_secs_f64()))
}

fn log_stage(case_id: &str, stage: &str, seconds: f64) {
    tracing::info!(case_id, stage, "stage complete in {seconds:.2}s");
}
