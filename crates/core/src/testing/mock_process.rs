//! Mock process runner for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::Duration;

use crate::process::{ProcessError, ProcessOutput, ProcessRunner};

/// A recorded process invocation for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRun {
    pub program: PathBuf,
    pub args: Vec<String>,
}

/// Canned outcome for one invocation.
#[derive(Debug, Clone)]
pub enum MockProcessResponse {
    Exit {
        exit_code: Option<i32>,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
        /// Written to the last argument when the invocation has an `-i` input.
        output: Option<Vec<u8>>,
    },
    NotFound,
    Timeout,
}

impl MockProcessResponse {
    /// Exit 0, nothing written.
    pub fn success() -> Self {
        Self::Exit {
            exit_code: Some(0),
            stdout: Vec::new(),
            stderr: Vec::new(),
            output: None,
        }
    }

    /// Exit 0 after writing `bytes` to the output path.
    pub fn output(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Exit {
            exit_code: Some(0),
            stdout: Vec::new(),
            stderr: Vec::new(),
            output: Some(bytes.into()),
        }
    }

    /// Exit 0 printing `text`.
    pub fn stdout(text: &str) -> Self {
        Self::Exit {
            exit_code: Some(0),
            stdout: text.as_bytes().to_vec(),
            stderr: Vec::new(),
            output: None,
        }
    }

    pub fn failure(exit_code: i32, stderr: &str) -> Self {
        Self::Exit {
            exit_code: Some(exit_code),
            stdout: Vec::new(),
            stderr: stderr.as_bytes().to_vec(),
            output: None,
        }
    }
}

/// Mock implementation of [`ProcessRunner`].
///
/// Queued responses are consumed in order; once the queue is empty every run
/// gets the default response.
///
/// # Example
///
/// ```rust,ignore
/// let runner = MockProcessRunner::producing(fixtures::mp4_header());
/// runner.push_response(MockProcessResponse::failure(1, "boom")).await;
///
/// // First run fails, later runs write the mp4 header to the output path
/// let transcoder = FfmpegTranscoder::with_runner(config, Arc::new(runner.clone()));
/// ```
#[derive(Debug, Clone)]
pub struct MockProcessRunner {
    /// Recorded invocations.
    calls: Arc<RwLock<Vec<RecordedRun>>>,
    /// Responses consumed before falling back to the default.
    queue: Arc<RwLock<VecDeque<MockProcessResponse>>>,
    default: Arc<RwLock<MockProcessResponse>>,
}

impl Default for MockProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProcessRunner {
    /// Every run exits 0 without producing output.
    pub fn new() -> Self {
        Self::with_default(MockProcessResponse::success())
    }

    /// Every run exits 0 and writes `bytes` to the output path.
    pub fn producing(bytes: impl Into<Vec<u8>>) -> Self {
        Self::with_default(MockProcessResponse::output(bytes))
    }

    /// The binary does not exist.
    pub fn missing() -> Self {
        Self::with_default(MockProcessResponse::NotFound)
    }

    fn with_default(default: MockProcessResponse) -> Self {
        Self {
            calls: Arc::new(RwLock::new(Vec::new())),
            queue: Arc::new(RwLock::new(VecDeque::new())),
            default: Arc::new(RwLock::new(default)),
        }
    }

    /// Queue a response for the next unanswered run.
    pub async fn push_response(&self, response: MockProcessResponse) {
        self.queue.write().await.push_back(response);
    }

    pub async fn set_default(&self, response: MockProcessResponse) {
        *self.default.write().await = response;
    }

    /// Get all recorded invocations.
    pub async fn recorded(&self) -> Vec<RecordedRun> {
        self.calls.read().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }

    async fn next_response(&self) -> MockProcessResponse {
        if let Some(response) = self.queue.write().await.pop_front() {
            return response;
        }
        self.default.read().await.clone()
    }
}

#[async_trait]
impl ProcessRunner for MockProcessRunner {
    async fn run(
        &self,
        program: &Path,
        args: &[String],
        limit: Duration,
    ) -> Result<ProcessOutput, ProcessError> {
        self.calls.write().await.push(RecordedRun {
            program: program.to_path_buf(),
            args: args.to_vec(),
        });

        match self.next_response().await {
            MockProcessResponse::NotFound => Err(ProcessError::NotFound {
                program: program.to_path_buf(),
            }),
            MockProcessResponse::Timeout => Err(ProcessError::Timeout {
                program: program.to_path_buf(),
                timeout_secs: limit.as_secs(),
            }),
            MockProcessResponse::Exit {
                exit_code,
                stdout,
                stderr,
                output,
            } => {
                let has_input = args.iter().any(|a| a == "-i");
                if let (Some(bytes), true, Some(path)) = (output, has_input, args.last()) {
                    tokio::fs::write(path, bytes)
                        .await
                        .map_err(|e| ProcessError::Spawn {
                            program: program.to_path_buf(),
                            source: e,
                        })?;
                }
                Ok(ProcessOutput {
                    exit_code,
                    stdout,
                    stderr,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queue_before_default() {
        let runner = MockProcessRunner::new();
        runner
            .push_response(MockProcessResponse::failure(2, "nope"))
            .await;

        let first = runner
            .run(Path::new("ffmpeg"), &[], Duration::from_secs(1))
            .await
            .unwrap();
        let second = runner
            .run(Path::new("ffmpeg"), &[], Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(first.exit_code, Some(2));
        assert_eq!(first.stderr_lossy(), "nope");
        assert!(second.success());
        assert_eq!(runner.call_count().await, 2);
    }

    #[tokio::test]
    async fn test_timeout_response() {
        let runner = MockProcessRunner::new();
        runner.set_default(MockProcessResponse::Timeout).await;
        let err = runner
            .run(Path::new("ffmpeg"), &[], Duration::from_secs(3))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessError::Timeout { timeout_secs: 3, .. }));
    }
}
