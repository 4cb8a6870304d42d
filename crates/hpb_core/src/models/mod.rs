//! Data model: per-case metadata, batch manifest, adapter options,
//! and the canonical artifact names.
//!
//! Packaging normalizes every adapter's native output name to the
//! fixed names below; the batch manifest and client tooling depend on
//! these, never on a tool's own naming.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Canonical liver mask filename inside a package.
pub const LIVER_ARTIFACT: &str = "liver.nii.gz";
/// Canonical vessel/tumour mask filename inside a package.
pub const TASK008_ARTIFACT: &str = "task008.nii.gz";
/// Canonical multi-label mask filename for the single-model operation.
pub const MULTILABEL_ARTIFACT: &str = "totalseg.nii.gz";
/// Per-case metadata document name.
pub const META_FILE: &str = "meta.json";
/// Batch-level manifest document name.
pub const MANIFEST_FILE: &str = "manifest.json";
/// Compressed volume suffix shared by all inputs and artifacts.
pub const VOLUME_SUFFIX: &str = ".nii.gz";

/// Self-describing metadata written into each case package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseMetadata {
    pub case_id: String,
    /// Label id to structure name, for the Task008 mask.
    pub labels_task008: BTreeMap<String, String>,
    pub liver_seconds: f64,
    pub task008_seconds: f64,
    /// Unix timestamp (seconds) of package assembly.
    pub timestamp: f64,
}

impl CaseMetadata {
    pub fn new(case_id: impl Into<String>, liver_seconds: f64, task008_seconds: f64) -> Self {
        Self {
            case_id: case_id.into(),
            labels_task008: task008_labels(),
            liver_seconds: round2(liver_seconds),
            task008_seconds: round2(task008_seconds),
            timestamp: chrono::Utc::now().timestamp_millis() as f64 / 1000.0,
        }
    }
}

/// Consolidated manifest written at the end of a batch run.
///
/// `cases` is ordered by discovery order of the extracted case
/// directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchManifest {
    pub batch_id: String,
    pub cases: Vec<CaseMetadata>,
}

/// Label mapping of the Task008 hepatic vessel/tumour model.
pub fn task008_labels() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("1".to_string(), "hepatic_vessels".to_string()),
        ("2".to_string(), "liver_tumors".to_string()),
    ])
}

/// Options for the multi-fold vessel/tumour model.
#[derive(Debug, Clone)]
pub struct Task008Options {
    /// Fold selector, passed through to the tool verbatim.
    pub folds: String,
}

impl Default for Task008Options {
    fn default() -> Self {
        Self {
            folds: "0".to_string(),
        }
    }
}

/// Options for both TotalSegmentator adapters.
#[derive(Debug, Clone, Default)]
pub struct TotalSegOptions {
    /// Reduced-accuracy, reduced-runtime execution.
    pub fast: bool,
}

fn round2(seconds: f64) -> f64 {
    (seconds * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_rounds_durations() {
        let meta = CaseMetadata::new("case_abc123", 1.23456, 0.009);
        assert_eq!(meta.liver_seconds, 1.23);
        assert_eq!(meta.task008_seconds, 0.01);
        assert!(meta.timestamp > 0.0);
    }

    #[test]
    fn label_mapping_is_fixed() {
        let labels = task008_labels();
        assert_eq!(labels.get("1").unwrap(), "hepatic_vessels");
        assert_eq!(labels.get("2").unwrap(), "liver_tumors");
        assert_eq!(labels.len(), 2);
    }

    #[test]
    fn metadata_serializes_with_expected_keys() {
        let meta = CaseMetadata::new("case_abc123", 0.5, 0.5);
        let json = serde_json::to_string(&meta).unwrap();
        assert!(json.contains("\"case_id\":\"case_abc123\""));
        assert!(json.contains("\"labels_task008\""));
        assert!(json.contains("\"liver_seconds\""));
        assert!(json.contains("\"task008_seconds\""));
        assert!(json.contains("\"timestamp\""));
    }

    #[test]
    fn default_fold_is_zero() {
        assert_eq!(Task008Options::default().folds, "0");
        assert!(!TotalSegOptions::default().fast);
    }
}
