//! Batch orchestration.
//!
//! A batch runs `Extracting → per-case (Workspacing → Liver → Task008
//! → Packaging) → Manifesting → Archiving`. Cases are processed
//! strictly sequentially in discovery order. The policy is fail-fast:
//! the first failing case aborts the batch, wrapped with its case id;
//! partial archives are never produced.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::archive::{extract, package_outputs, write_json};
use crate::errors::{PipelineError, PipelineResult};
use crate::models::{
    BatchManifest, CaseMetadata, Task008Options, TotalSegOptions, MANIFEST_FILE,
};
use crate::workspace::{unique_case_id, CaseWorkspace, ScopedDir};

use super::case::SegmentationService;

/// Accepted raw volume names inside a batch case directory, in
/// priority order.
const RAW_NAMES: &[&str] = &["raw.nii.gz", "raw_0000.nii.gz"];

impl SegmentationService {
    /// Process an uploaded bundle of case directories and return the
    /// consolidated result archive.
    ///
    /// The bundle is extracted into a scoped batch root under
    /// `out_root`; the root is removed once the archive exists,
    /// unless `keep_intermediate` is set. The case cap is enforced
    /// before any per-case work starts.
    pub fn run_batch(
        &self,
        bundle: impl Read,
        task008_options: &Task008Options,
        totalseg_options: &TotalSegOptions,
    ) -> PipelineResult<PathBuf> {
        let batch_id = unique_case_id("batch");
        let batch_root = self.settings().out_root.join(&batch_id);
        let scoped_root = ScopedDir::create(&batch_root, self.settings().keep_intermediate)
            .map_err(|e| PipelineError::io("creating batch root", e))?;

        let case_dirs = extract(bundle, scoped_root.path())?;
        if case_dirs.len() > self.settings().max_batch_cases {
            return Err(PipelineError::invalid_input(format!(
                "too many cases in batch: {} (limit {})",
                case_dirs.len(),
                self.settings().max_batch_cases
            )));
        }
        tracing::info!(batch_id = %batch_id, cases = case_dirs.len(), "batch extracted");

        let mut manifest = BatchManifest {
            batch_id: batch_id.clone(),
            cases: Vec::with_capacity(case_dirs.len()),
        };

        for case_dir in &case_dirs {
            let case_id = case_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            let metadata = self
                .run_batch_case(
                    case_dir,
                    &case_id,
                    scoped_root.path(),
                    task008_options,
                    totalseg_options,
                )
                .map_err(|e| PipelineError::batch_case(&case_id, e))?;
            manifest.cases.push(metadata);
        }

        write_json(&scoped_root.path().join(MANIFEST_FILE), &manifest)?;
        package_outputs(scoped_root.path(), &batch_id)
        // scoped_root drops here; the batch root is gone, the archive
        // in the system temp dir is not.
    }

    /// One case of a batch: locate the raw volume, run the shared
    /// per-case pipeline in its own workspace, then move the finished
    /// package into the batch root under the case id (replacing the
    /// extracted input directory).
    fn run_batch_case(
        &self,
        case_dir: &Path,
        case_id: &str,
        batch_root: &Path,
        task008_options: &Task008Options,
        totalseg_options: &TotalSegOptions,
    ) -> PipelineResult<CaseMetadata> {
        let raw = locate_raw_volume(case_dir)?;
        let data = fs::read(&raw).map_err(|e| PipelineError::io("reading case volume", e))?;

        let ws = CaseWorkspace::create(self.settings(), case_id)
            .map_err(|e| PipelineError::io("creating case workspace", e))?;
        let (pkg_dir, metadata) =
            self.run_case(&ws, case_id, &data, task008_options, totalseg_options)?;

        let dest = batch_root.join(case_id);
        if dest.exists() {
            fs::remove_dir_all(&dest)
                .map_err(|e| PipelineError::io("replacing case package dir", e))?;
        }
        copy_dir(&pkg_dir, &dest)?;
        Ok(metadata)
    }
}

fn locate_raw_volume(case_dir: &Path) -> PipelineResult<PathBuf> {
    for name in RAW_NAMES {
        let candidate = case_dir.join(name);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }
    Err(PipelineError::invalid_input(format!(
        "case '{}' is missing raw.nii.gz",
        case_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    )))
}

fn copy_dir(src: &Path, dest: &Path) -> PipelineResult<()> {
    fs::create_dir_all(dest).map_err(|e| PipelineError::io("copying package dir", e))?;
    let entries = fs::read_dir(src).map_err(|e| PipelineError::io("copying package dir", e))?;
    for entry in entries {
        let entry = entry.map_err(|e| PipelineError::io("copying package dir", e))?;
        let target = dest.join(entry.file_name());
        if entry.path().is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)
                .map_err(|e| PipelineError::io("copying package file", e))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_name_priority_order() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("raw.nii.gz"), b"a").unwrap();
        fs::write(tmp.path().join("raw_0000.nii.gz"), b"b").unwrap();

        let path = locate_raw_volume(tmp.path()).unwrap();
        assert!(path.ends_with("raw.nii.gz"));
    }

    #[test]
    fn raw_0000_accepted_as_fallback() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("raw_0000.nii.gz"), b"b").unwrap();

        let path = locate_raw_volume(tmp.path()).unwrap();
        assert!(path.ends_with("raw_0000.nii.gz"));
    }

    #[test]
    fn missing_raw_volume_is_input_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = locate_raw_volume(tmp.path()).unwrap_err();
        assert!(err.is_input_error());
    }

    #[test]
    fn copy_dir_is_recursive() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("a.txt"), b"a").unwrap();
        fs::write(src.join("nested/b.txt"), b"b").unwrap();

        let dest = tmp.path().join("dest");
        copy_dir(&src, &dest).unwrap();

        assert!(dest.join("a.txt").is_file());
        assert!(dest.join("nested/b.txt").is_file());
    }
}
