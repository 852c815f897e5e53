//! Sandboxed execution of candidate programs.
//!
//! The bubblewrap runner is the production implementation; the trait seam
//! exists so experiments can run against a scripted fake in tests.

mod bubblewrap;

pub use bubblewrap::{BubblewrapRunner, RunnerConfig};

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Terminal status of one sandboxed execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecStatus {
    /// The interpreter exited with status zero.
    Success,
    /// The interpreter reported an error: non-zero exit or death by signal.
    RuntimeError,
    /// The time budget elapsed and the sandbox was forcibly terminated.
    Timeout,
}

/// Outcome of attempting to run one candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Terminal status.
    pub status: ExecStatus,
    /// Process exit code, when the process exited on its own.
    pub exit_code: Option<i32>,
    /// Captured stdout, truncated to the configured bound.
    pub stdout: String,
    /// Captured stderr, truncated to the configured bound.
    pub stderr: String,
    /// Wall-clock duration of the execution.
    pub duration: Duration,
}

impl ExecutionResult {
    /// Whether the candidate counts as runnable.
    pub fn is_runnable(&self) -> bool {
        self.status == ExecStatus::Success
    }
}

/// Trait for sandboxed program runners.
///
/// Runtime errors and timeouts are expected per-candidate outcomes carried
/// in [`ExecutionResult`]. A failure of the sandbox itself (isolation layer
/// unavailable, spawn failure) is an [`Error::Sandbox`](crate::Error) and
/// aborts the batch instead of counting against the candidate.
#[async_trait]
pub trait SandboxRunner: Send + Sync {
    /// Executes one candidate program text in isolation.
    async fn execute(&self, program: &str) -> Result<ExecutionResult>;

    /// Returns the name of this runner.
    fn name(&self) -> &str;
}
