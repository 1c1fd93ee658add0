//! Process execution port.
//!
//! Everything that spawns an external binary goes through [`ProcessRunner`], so
//! transcoder logic can be tested with [`crate::testing::MockProcessRunner`]
//! instead of a real ffmpeg.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::debug;

/// Captured result of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` when terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Errors that prevent a process from producing an exit status.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Binary does not exist.
    #[error("Program not found: {program}")]
    NotFound { program: PathBuf },

    /// Spawning failed for another reason (permissions, resources).
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Process did not finish in time and was killed.
    #[error("{program} timed out after {timeout_secs} seconds")]
    Timeout { program: PathBuf, timeout_secs: u64 },
}

/// Runs an external program to completion.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(
        &self,
        program: &Path,
        args: &[String],
        timeout: Duration,
    ) -> Result<ProcessOutput, ProcessError>;
}

/// [`ProcessRunner`] backed by `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct TokioProcessRunner;

impl TokioProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(
        &self,
        program: &Path,
        args: &[String],
        limit: Duration,
    ) -> Result<ProcessOutput, ProcessError> {
        debug!("Running {} {}", program.display(), args.join(" "));

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ProcessError::NotFound {
                        program: program.to_path_buf(),
                    }
                } else {
                    ProcessError::Spawn {
                        program: program.to_path_buf(),
                        source: e,
                    }
                }
            })?;

        // Dropping the wait future on timeout kills the child (kill_on_drop)
        match timeout(limit, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(ProcessOutput {
                exit_code: output.status.code(),
                stdout: output.stdout,
                stderr: output.stderr,
            }),
            Ok(Err(e)) => Err(ProcessError::Spawn {
                program: program.to_path_buf(),
                source: e,
            }),
            Err(_) => Err(ProcessError::Timeout {
                program: program.to_path_buf(),
                timeout_secs: limit.as_secs(),
            }),
        }
    }
}
