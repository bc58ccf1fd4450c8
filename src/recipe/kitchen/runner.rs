// src/recipe/kitchen/runner.rs

//! External tool execution

use crate::error::{Error, Result};
use crate::recipe::build_system::Invocation;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::debug;
use wait_timeout::ChildExt;

/// Captured result of one tool run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code (None when killed by a signal or timeout)
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl ToolOutput {
    /// Successful run with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            ..Default::default()
        }
    }

    /// Failed run with the given exit code and stderr
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stderr: stderr.into(),
            ..Default::default()
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0) && !self.timed_out
    }

    /// stdout followed by stderr
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (true, _) => self.stderr.clone(),
            (false, true) => self.stdout.clone(),
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
        }
    }
}

/// Runs external tools for the Kitchen
///
/// Build steps and file patches go through this trait, so callers can
/// substitute a recording or simulated runner.
pub trait ToolRunner: Send + Sync {
    /// Run one invocation to completion
    ///
    /// A non-zero exit is not an error here; it is reported in the output.
    /// Errors mean the tool could not be started at all.
    fn run(&self, invocation: &Invocation, timeout: Option<Duration>) -> Result<ToolOutput>;
}

/// Runs tools as real child processes
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&self, invocation: &Invocation, timeout: Option<Duration>) -> Result<ToolOutput> {
        let program = if invocation.program.contains(std::path::MAIN_SEPARATOR) {
            std::path::PathBuf::from(&invocation.program)
        } else {
            which::which(&invocation.program)
                .map_err(|_| Error::ToolNotFound(invocation.program.clone()))?
        };

        debug!("Running: {}", invocation);

        // Output goes to unlinked temp files so a chatty tool cannot fill a pipe
        let mut stdout_file = tempfile::tempfile()?;
        let mut stderr_file = tempfile::tempfile()?;

        let mut child = Command::new(&program)
            .args(&invocation.args)
            .current_dir(&invocation.cwd)
            .envs(&invocation.env)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout_file.try_clone()?))
            .stderr(Stdio::from(stderr_file.try_clone()?))
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => Error::ToolNotFound(invocation.program.clone()),
                _ => Error::IoError(format!("Failed to start {}: {}", invocation.program, e)),
            })?;

        let (code, timed_out) = match timeout {
            Some(limit) => match child.wait_timeout(limit)? {
                Some(status) => (status.code(), false),
                None => {
                    let _ = child.kill();
                    let _ = child.wait();
                    (None, true)
                }
            },
            None => (child.wait()?.code(), false),
        };

        Ok(ToolOutput {
            code,
            stdout: read_back(&mut stdout_file)?,
            stderr: read_back(&mut stderr_file)?,
            timed_out,
        })
    }
}

fn read_back(file: &mut File) -> Result<String> {
    file.seek(SeekFrom::Start(0))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_output_helpers() {
        assert!(ToolOutput::ok("done").success());
        let failed = ToolOutput::failed(2, "boom");
        assert!(!failed.success());
        assert_eq!(failed.combined(), "boom");

        let both = ToolOutput {
            code: Some(1),
            stdout: "out".into(),
            stderr: "err".into(),
            timed_out: false,
        };
        assert_eq!(both.combined(), "out\nerr");
    }

    #[test]
    fn test_missing_tool() {
        let inv = Invocation::new("pantry-no-such-tool-xyz", Path::new("."));
        let err = SystemRunner.run(&inv, None).unwrap_err();
        assert!(matches!(err, Error::ToolNotFound(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_captures_output_and_exit_code() {
        let inv = Invocation::new("sh", Path::new("."))
            .arg("-c")
            .arg("echo hello; echo oops >&2; exit 3");
        let out = SystemRunner.run(&inv, Some(Duration::from_secs(30))).unwrap();
        assert_eq!(out.code, Some(3));
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.stderr.trim(), "oops");
        assert!(!out.success());
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_tool() {
        let inv = Invocation::new("sh", Path::new("."))
            .arg("-c")
            .arg("sleep 5");
        let out = SystemRunner
            .run(&inv, Some(Duration::from_millis(100)))
            .unwrap();
        assert!(out.timed_out);
        assert!(!out.success());
    }
}
