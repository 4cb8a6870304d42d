//! Environment-sourced settings.
//!
//! `Settings` is constructed once at process start and passed by
//! reference into each component. There is no cached global; callers
//! own the struct and its lifetime.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;

/// Immutable process configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Root directory for per-case input workspaces.
    pub in_root: PathBuf,
    /// Root directory for per-case output workspaces.
    pub out_root: PathBuf,
    /// Skip workspace cleanup on scope exit (debugging aid).
    pub keep_intermediate: bool,
    /// Maximum number of cases accepted in one batch bundle.
    pub max_batch_cases: usize,
    /// Default nnU-Net weights root, injected as RESULTS_FOLDER when
    /// the ambient environment does not already set it.
    pub weights_root: PathBuf,
    /// Object-storage region. Consumed by collaborators only; the
    /// pipeline itself never touches object storage.
    pub aws_region: String,
    /// Object-storage bucket, if configured. Collaborators only.
    pub s3_bucket: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            in_root: PathBuf::from("/tmp/hpb_in"),
            out_root: PathBuf::from("/tmp/hpb_out"),
            keep_intermediate: false,
            max_batch_cases: 10,
            weights_root: PathBuf::from("/models/nnunet_v1"),
            aws_region: "us-east-1".to_string(),
            s3_bucket: None,
        }
    }
}

impl Settings {
    /// Build settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_iter(std::env::vars())
    }

    /// Build settings from an explicit set of variables.
    ///
    /// This is the seam used by tests; `from_env` is a thin wrapper.
    /// Unknown variables are ignored, malformed values fall back to
    /// the default with a warning.
    pub fn from_iter(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        let vars: HashMap<String, String> = vars.into_iter().collect();
        let mut settings = Self::default();

        if let Some(v) = vars.get("HPB_IN_ROOT") {
            settings.in_root = PathBuf::from(v);
        }
        if let Some(v) = vars.get("HPB_OUT_ROOT") {
            settings.out_root = PathBuf::from(v);
        }
        if let Some(v) = vars.get("HPB_KEEP_INTERMEDIATE") {
            settings.keep_intermediate = parse_bool(v);
        }
        if let Some(v) = vars.get("HPB_MAX_BATCH") {
            match v.parse::<usize>() {
                Ok(n) => settings.max_batch_cases = n,
                Err(_) => tracing::warn!(
                    value = %v,
                    "HPB_MAX_BATCH is not a number, using default {}",
                    settings.max_batch_cases
                ),
            }
        }
        if let Some(v) = vars.get("RESULTS_FOLDER") {
            settings.weights_root = PathBuf::from(v);
        }
        if let Some(v) = vars.get("AWS_REGION") {
            settings.aws_region = v.clone();
        }
        if let Some(v) = vars.get("HPB_S3_BUCKET") {
            settings.s3_bucket = Some(v.clone());
        }

        settings
    }

    /// Create both workspace roots if they do not exist yet.
    pub fn ensure_roots(&self) -> io::Result<()> {
        fs::create_dir_all(&self.in_root)?;
        fs::create_dir_all(&self.out_root)?;
        Ok(())
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
