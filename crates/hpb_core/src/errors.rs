//! Error taxonomy for the segmentation pipeline.
//!
//! Every failure during a pipeline run is fatal to that run. The
//! variants distinguish caller mistakes (`InvalidInput`) from tool
//! crashes (`Tool`), convention mismatches (`OutputNotFound`) and
//! infrastructure problems (`Io`, `Archive`, `Json`). Batch failures
//! carry the offending case id.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::runner::ToolError;

/// Top-level pipeline error.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Missing or malformed input: unsupported archive type, batch
    /// over the configured limit, missing raw volume. Maps to the
    /// bad-request class at the caller boundary.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An external model binary exited non-zero or failed to spawn.
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// The tool exited successfully but no artifact matched the
    /// adapter's resolution policy. Indicates a naming-convention
    /// mismatch rather than a tool crash.
    #[error("{tool} produced no resolvable output in {} (found: {found:?})", .dir.display())]
    OutputNotFound {
        tool: String,
        dir: PathBuf,
        found: Vec<String>,
    },

    /// A batch case failed; wraps the underlying error with the case
    /// identifier for diagnostics.
    #[error("batch case '{case_id}' failed: {source}")]
    BatchCase {
        case_id: String,
        #[source]
        source: Box<PipelineError>,
    },

    /// File I/O error with operation context.
    #[error("I/O error while {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },

    /// Archive read/write error.
    #[error("archive error while {operation}: {source}")]
    Archive {
        operation: String,
        #[source]
        source: zip::result::ZipError,
    },

    /// JSON encoding error.
    #[error("failed to encode {what}: {source}")]
    Json {
        what: String,
        #[source]
        source: serde_json::Error,
    },
}

impl PipelineError {
    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create an I/O error with operation context.
    pub fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Create an archive error with operation context.
    pub fn archive(operation: impl Into<String>, source: zip::result::ZipError) -> Self {
        Self::Archive {
            operation: operation.into(),
            source,
        }
    }

    /// Wrap an error with the batch case it belongs to.
    pub fn batch_case(case_id: impl Into<String>, source: PipelineError) -> Self {
        Self::BatchCase {
            case_id: case_id.into(),
            source: Box::new(source),
        }
    }

    /// Whether this failure was caused by bad caller input.
    ///
    /// Gives callers the bad-request/internal split without exposing
    /// process internals across the interface.
    pub fn is_input_error(&self) -> bool {
        match self {
            Self::InvalidInput(_) => true,
            Self::BatchCase { source, .. } => source.is_input_error(),
            _ => false,
        }
    }
}

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_case_carries_id_and_source() {
        let inner = PipelineError::invalid_input("case 'c1' is missing raw.nii.gz");
        let err = PipelineError::batch_case("c1", inner);
        let msg = err.to_string();
        assert!(msg.contains("batch case 'c1'"));
        assert!(msg.contains("missing raw.nii.gz"));
    }

    #[test]
    fn input_classification_passes_through_batch_wrapper() {
        let input = PipelineError::batch_case("c1", PipelineError::invalid_input("bad"));
        assert!(input.is_input_error());

        let internal = PipelineError::batch_case(
            "c2",
            PipelineError::io("copying artifact", io::Error::other("disk full")),
        );
        assert!(!internal.is_input_error());
    }

    #[test]
    fn output_not_found_lists_directory() {
        let err = PipelineError::OutputNotFound {
            tool: "TotalSegmentator".to_string(),
            dir: PathBuf::from("/tmp/out"),
            found: vec!["unexpected.nii.gz".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("TotalSegmentator"));
        assert!(msg.contains("unexpected.nii.gz"));
    }
}
