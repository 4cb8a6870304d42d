//! Result package assembly and archive compression.
//!
//! Packaging is the normalization boundary: every adapter's output is
//! copied under its fixed canonical name, so the batch manifest and
//! client tooling never see a tool's native naming.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::errors::{PipelineError, PipelineResult};
use crate::models::{CaseMetadata, LIVER_ARTIFACT, META_FILE, TASK008_ARTIFACT};

/// Resolved adapter outputs going into one package.
#[derive(Debug, Clone, Copy)]
pub struct PackageArtifacts<'a> {
    pub liver: &'a Path,
    pub task008: &'a Path,
}

/// Assemble `case_root/package/` from the resolved artifacts plus the
/// metadata document.
///
/// Only called once all required artifacts exist on disk; a partial
/// package directory is never observable.
pub fn build_package(
    case_root: &Path,
    artifacts: PackageArtifacts<'_>,
    metadata: &CaseMetadata,
) -> PipelineResult<PathBuf> {
    let pkg_dir = case_root.join("package");
    fs::create_dir_all(&pkg_dir).map_err(|e| PipelineError::io("creating package dir", e))?;

    fs::copy(artifacts.liver, pkg_dir.join(LIVER_ARTIFACT))
        .map_err(|e| PipelineError::io("copying liver artifact", e))?;
    fs::copy(artifacts.task008, pkg_dir.join(TASK008_ARTIFACT))
        .map_err(|e| PipelineError::io("copying task008 artifact", e))?;

    write_json(&pkg_dir.join(META_FILE), metadata)?;
    Ok(pkg_dir)
}

/// Write a pretty-printed JSON document.
pub fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> PipelineResult<()> {
    let text = serde_json::to_string_pretty(value).map_err(|e| PipelineError::Json {
        what: path.display().to_string(),
        source: e,
    })?;
    fs::write(path, text).map_err(|e| PipelineError::io("writing json document", e))?;
    Ok(())
}

/// Compress `source_dir` into `<system temp>/<base_name>_results.zip`.
///
/// An existing archive at the target path is replaced, never appended
/// to, so repeated invocations for the same base name stay
/// reproducible. The archive lives outside the workspace roots and
/// survives workspace cleanup.
pub fn package_outputs(source_dir: &Path, base_name: &str) -> PipelineResult<PathBuf> {
    let archive_path = std::env::temp_dir().join(format!("{base_name}_results.zip"));
    if archive_path.exists() {
        fs::remove_file(&archive_path)
            .map_err(|e| PipelineError::io("replacing stale archive", e))?;
    }

    let file =
        File::create(&archive_path).map_err(|e| PipelineError::io("creating result archive", e))?;
    let mut writer = ZipWriter::new(file);
    add_dir_recursive(&mut writer, source_dir, Path::new(""))?;
    writer
        .finish()
        .map_err(|e| PipelineError::archive("finalizing result archive", e))?;

    tracing::info!(archive = %archive_path.display(), "result archive written");
    Ok(archive_path)
}

fn add_dir_recursive(
    writer: &mut ZipWriter<File>,
    dir: &Path,
    prefix: &Path,
) -> PipelineResult<()> {
    let options = SimpleFileOptions::default();

    let mut entries: Vec<_> = fs::read_dir(dir)
        .map_err(|e| PipelineError::io("walking package dir", e))?
        .filter_map(|e| e.ok())
        .collect();
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let name = prefix.join(entry.file_name());
        let name_str = name.to_string_lossy().into_owned();

        if path.is_dir() {
            writer
                .add_directory(format!("{name_str}/"), options)
                .map_err(|e| PipelineError::archive("adding archive directory", e))?;
            add_dir_recursive(writer, &path, &name)?;
        } else {
            writer
                .start_file(name_str, options)
                .map_err(|e| PipelineError::archive("adding archive entry", e))?;
            let mut src =
                File::open(&path).map_err(|e| PipelineError::io("reading package file", e))?;
            io::copy(&mut src, writer).map_err(|e| PipelineError::io("compressing file", e))?;
        }
    }
    Ok(())
}
