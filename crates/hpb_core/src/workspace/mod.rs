//! Case identifiers and scoped workspace directories.
//!
//! Each pipeline run owns an exclusive pair of directories keyed by a
//! unique case id. Cleanup is tied to scope exit through `Drop`, so
//! the directories are released on normal return, early return, and
//! propagated failure alike.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::Settings;

/// Generate a unique identifier of the form `<prefix>_<8-hex>`.
pub fn unique_case_id(prefix: &str) -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}", prefix, &hex[..8])
}

/// Scoped pair of input/output directories for one case.
///
/// Both directories are created eagerly (parents included) and
/// recursively deleted when the workspace is dropped, unless the
/// process-wide `keep_intermediate` flag is set. Leftover content
/// from a previous failed run with the same id is tolerated on both
/// creation and deletion.
#[derive(Debug)]
pub struct CaseWorkspace {
    case_id: String,
    input_dir: PathBuf,
    output_dir: PathBuf,
    keep: bool,
}

impl CaseWorkspace {
    /// Create the workspace directories for `case_id` under the
    /// configured roots.
    pub fn create(settings: &Settings, case_id: impl Into<String>) -> io::Result<Self> {
        let case_id = case_id.into();
        let input_dir = settings.in_root.join(&case_id);
        let output_dir = settings.out_root.join(&case_id);
        fs::create_dir_all(&input_dir)?;
        fs::create_dir_all(&output_dir)?;
        Ok(Self {
            case_id,
            input_dir,
            output_dir,
            keep: settings.keep_intermediate,
        })
    }

    pub fn case_id(&self) -> &str {
        &self.case_id
    }

    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

impl Drop for CaseWorkspace {
    fn drop(&mut self) {
        if self.keep {
            tracing::debug!(case_id = %self.case_id, "keeping intermediate workspace");
            return;
        }
        remove_dir_best_effort(&self.input_dir);
        remove_dir_best_effort(&self.output_dir);
    }
}

/// A single directory removed on scope exit, same policy as
/// [`CaseWorkspace`]. Used for batch roots.
#[derive(Debug)]
pub struct ScopedDir {
    path: PathBuf,
    keep: bool,
}

impl ScopedDir {
    /// Create the directory (parents included).
    pub fn create(path: impl Into<PathBuf>, keep: bool) -> io::Result<Self> {
        let path = path.into();
        fs::create_dir_all(&path)?;
        Ok(Self { path, keep })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScopedDir {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        remove_dir_best_effort(&self.path);
    }
}

/// Recursive delete where "already missing" is not an error.
pub(crate) fn remove_dir_best_effort(dir: &Path) {
    if let Err(e) = fs::remove_dir_all(dir) {
        if e.kind() != io::ErrorKind::NotFound {
            tracing::warn!(dir = %dir.display(), error = %e, "failed to remove directory");
        }
    }
}
