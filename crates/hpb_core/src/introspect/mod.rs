//! Best-effort external tool introspection.
//!
//! The report never fails: an absent or broken tool becomes an
//! informational `error` field for that tool.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::adapters::{NNUNET_PROGRAM, TOTALSEG_PROGRAM};
use crate::runner::ToolInvocation;

/// The tools the pipeline shells out to.
pub const DEFAULT_TOOLS: &[&str] = &[NNUNET_PROGRAM, TOTALSEG_PROGRAM];

/// Presence/version status of one tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Version report across all probed tools.
#[derive(Debug, Clone, Serialize)]
pub struct ToolVersionReport {
    pub tools: BTreeMap<String, ToolStatus>,
}

/// Probe each program with `--version`.
pub fn tool_versions(programs: &[&str]) -> ToolVersionReport {
    let mut tools = BTreeMap::new();
    for program in programs {
        let status = match ToolInvocation::new(*program).arg("--version").run() {
            Ok(result) => {
                // Some tools report their version on stderr.
                let line = first_line(&result.stdout)
                    .or_else(|| first_line(&result.stderr))
                    .unwrap_or_default();
                ToolStatus {
                    version: Some(line),
                    error: None,
                }
            }
            Err(e) => ToolStatus {
                version: None,
                error: Some(e.to_string()),
            },
        };
        tools.insert(program.to_string(), status);
    }
    ToolVersionReport { tools }
}

fn first_line(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_tool_is_reported_not_fatal() {
        let report = tool_versions(&["definitely-not-a-real-tool-4242"]);
        let status = &report.tools["definitely-not-a-real-tool-4242"];
        assert!(status.version.is_none());
        assert!(status.error.is_some());
    }

    #[test]
    fn present_tool_reports_a_version_line() {
        let report = tool_versions(&["sh"]);
        let status = &report.tools["sh"];
        // `sh --version` succeeds on some shells and fails on others;
        // either way exactly one field must be populated.
        assert!(status.version.is_some() != status.error.is_some());
    }

    #[test]
    fn report_serializes_without_null_fields() {
        let report = tool_versions(&["definitely-not-a-real-tool-4242"]);
        let json = serde_json::to_value(&report).unwrap();
        let status = &json["tools"]["definitely-not-a-real-tool-4242"];
        assert!(status.get("error").is_some());
        // The absent field is skipped entirely, not serialized as null.
        assert!(status.get("version").is_none());
    }
}
