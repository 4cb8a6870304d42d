//! Output resolution strategies.
//!
//! An adapter declares an ordered list of strategies; each either
//! yields a path or advances to the next. Exhausting the list is the
//! adapter's failure, reported with the directory's actual contents
//! so convention drift is diagnosable from the error alone.

use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{PipelineError, PipelineResult};

/// One way of locating a tool's output artifact.
#[derive(Debug, Clone)]
pub enum ResolveStrategy {
    /// The exact filename the tool was asked to produce.
    Exact(String),
    /// First file with the given suffix, skipping known auxiliary
    /// files. Entries are considered in name order.
    FirstMatching {
        suffix: String,
        exclude: Vec<String>,
    },
    /// Known candidate filenames, tried in priority order.
    Candidates(Vec<String>),
}

impl ResolveStrategy {
    fn try_resolve(&self, dir: &Path) -> Option<PathBuf> {
        match self {
            Self::Exact(name) => {
                let path = dir.join(name);
                path.is_file().then_some(path)
            }
            Self::FirstMatching { suffix, exclude } => {
                let mut names = list_file_names(dir);
                names.retain(|n| n.ends_with(suffix.as_str()) && !exclude.contains(n));
                names.first().map(|n| dir.join(n))
            }
            Self::Candidates(names) => names
                .iter()
                .map(|n| dir.join(n))
                .find(|p| p.is_file()),
        }
    }
}

/// Try each strategy in order against `dir`.
pub fn resolve_output(
    tool: &str,
    dir: &Path,
    strategies: &[ResolveStrategy],
) -> PipelineResult<PathBuf> {
    for strategy in strategies {
        if let Some(path) = strategy.try_resolve(dir) {
            tracing::debug!(tool, path = %path.display(), "resolved output artifact");
            return Ok(path);
        }
    }
    Err(PipelineError::OutputNotFound {
        tool: tool.to_string(),
        dir: dir.to_path_buf(),
        found: list_file_names(dir),
    })
}

/// Sorted filenames (not directories) directly under `dir`.
fn list_file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .into_iter()
        .flatten()
        .flatten()
        .filter(|e| e.path().is_file())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
