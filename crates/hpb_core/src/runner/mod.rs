//! Synchronous external tool execution.
//!
//! The model binaries are opaque, so every invocation is logged in
//! full before it runs, and both captured streams are preserved on
//! failure. Commands are structured argument vectors; nothing passes
//! through a shell.
//!
//! Invocations block until the tool exits. There is no deadline: the
//! model runtimes vary by orders of magnitude with input size, and
//! callers that need a bound must wrap the call themselves.

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::process::Command;

use thiserror::Error;

/// Threading defaults injected when neither the ambient environment
/// nor the caller sets them. The model tools otherwise oversubscribe
/// the host with nested numeric-library thread pools.
const ENV_DEFAULTS: &[(&str, &str)] = &[("OMP_NUM_THREADS", "1"), ("MKL_NUM_THREADS", "1")];

/// Errors from running an external tool.
#[derive(Error, Debug)]
pub enum ToolError {
    /// The process could not be started at all.
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    /// The process ran but exited non-zero.
    #[error("'{command}' exited with code {exit_code}")]
    NonZeroExit {
        command: String,
        exit_code: i32,
        stdout: String,
        stderr: String,
    },
}

/// Result type for tool invocations.
pub type ToolRunResult<T> = Result<T, ToolError>;

/// Captured outcome of a successful tool run.
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// A fully resolved external tool invocation.
///
/// Immutable once built; consumed exactly once by [`ToolInvocation::run`].
/// Environment precedence: caller override > ambient process
/// environment > built-in default.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    program: String,
    args: Vec<String>,
    env_overrides: BTreeMap<String, String>,
    current_dir: Option<PathBuf>,
}

impl ToolInvocation {
    /// Start building an invocation of `program`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env_overrides: BTreeMap::new(),
            current_dir: None,
        }
    }

    /// Append a single argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment override. Overrides always win, including
    /// over the ambient environment.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_overrides.insert(key.into(), value.into());
        self
    }

    /// Set the working directory for the tool.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// The full command line, for logging and error context.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    /// Spawn the tool, block until it exits, capture both streams.
    ///
    /// A non-zero exit code is a failure value carrying the captured
    /// streams; it is never retried here.
    pub fn run(self) -> ToolRunResult<ToolResult> {
        let command_line = self.command_line();
        tracing::info!(command = %command_line, "running external tool");

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        for (key, value) in ENV_DEFAULTS {
            if std::env::var_os(key).is_none() && !self.env_overrides.contains_key(*key) {
                cmd.env(key, value);
            }
        }
        for (key, value) in &self.env_overrides {
            cmd.env(key, value);
        }
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }

        let output = cmd.output().map_err(|source| ToolError::Spawn {
            command: command_line.clone(),
            source,
        })?;

        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            tracing::error!(
                command = %command_line,
                exit_code,
                "external tool failed\n---- stdout ----\n{}\n---- stderr ----\n{}",
                stdout,
                stderr
            );
            return Err(ToolError::NonZeroExit {
                command: command_line,
                exit_code,
                stdout,
                stderr,
            });
        }

        Ok(ToolResult {
            exit_code,
            stdout,
            stderr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout() {
        let result = ToolInvocation::new("sh")
            .args(["-c", "printf hello"])
            .run()
            .unwrap();
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout, "hello");
    }

    #[test]
    fn nonzero_exit_preserves_streams() {
        let err = ToolInvocation::new("sh")
            .args(["-c", "echo out; echo err >&2; exit 3"])
            .run()
            .unwrap_err();
        match err {
            ToolError::NonZeroExit {
                exit_code,
                stdout,
                stderr,
                ..
            } => {
                assert_eq!(exit_code, 3);
                assert_eq!(stdout.trim(), "out");
                assert_eq!(stderr.trim(), "err");
            }
            other => panic!("expected NonZeroExit, got {other:?}"),
        }
    }

    #[test]
    fn missing_program_is_spawn_error() {
        let err = ToolInvocation::new("definitely-not-a-real-tool-4242")
            .run()
            .unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }));
    }

    #[test]
    fn caller_override_beats_ambient_and_default() {
        let result = ToolInvocation::new("sh")
            .args(["-c", "printf '%s' \"$OMP_NUM_THREADS\""])
            .env("OMP_NUM_THREADS", "7")
            .run()
            .unwrap();
        assert_eq!(result.stdout, "7");
    }

    #[test]
    fn default_applies_when_unset() {
        // Tests share the process environment, so read it instead of
        // mutating it: the default applies when the variable is
        // unset, the ambient value wins when it is set.
        let expected = std::env::var("MKL_NUM_THREADS").unwrap_or_else(|_| "1".to_string());
        let result = ToolInvocation::new("sh")
            .args(["-c", "printf '%s' \"$MKL_NUM_THREADS\""])
            .run()
            .unwrap();
        assert_eq!(result.stdout, expected);
    }

    #[test]
    fn command_line_joins_program_and_args() {
        let invocation = ToolInvocation::new("TotalSegmentator")
            .arg("-i")
            .arg("/in/vol.nii.gz")
            .args(["--roi_subset", "liver"]);
        assert_eq!(
            invocation.command_line(),
            "TotalSegmentator -i /in/vol.nii.gz --roi_subset liver"
        );
    }
}
