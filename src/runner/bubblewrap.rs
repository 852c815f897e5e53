//! Bubblewrap-backed sandbox runner.
//!
//! Each execution writes the candidate to a transient host file, binds it
//! read-only into a fresh bubblewrap sandbox, and invokes the interpreter on
//! it under a wall-clock budget. The profile unshares every namespace
//! (covering network), mounts a private tmpfs over `/tmp`, and exposes the
//! host's `/usr`, `/bin`, `/lib` and `/lib64` read-only.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::error::{Error, Result};

use super::{ExecStatus, ExecutionResult, SandboxRunner};

/// Fixed path the candidate file appears at inside the sandbox.
const SANDBOX_PROGRAM_PATH: &str = "/tmp/program";

/// Filesystem roots the sandbox always sees read-only.
const STANDARD_BINDS: &[&str] = &["/usr", "/bin", "/lib", "/lib64"];

/// Configuration for the bubblewrap runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Interpreter command, looked up on PATH unless given as a path.
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// Arguments passed to the interpreter before the program path.
    #[serde(default = "default_interpreter_args")]
    pub interpreter_args: Vec<String>,

    /// Wall-clock time budget per candidate, in seconds.
    #[serde(default = "default_time_budget")]
    pub time_budget_secs: u64,

    /// Capture bound per output stream, in bytes.
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
}

fn default_interpreter() -> String {
    "python3".to_string()
}

fn default_interpreter_args() -> Vec<String> {
    // isolated mode, no site imports, no bytecode cache
    vec!["-I".to_string(), "-S".to_string(), "-B".to_string()]
}

fn default_time_budget() -> u64 {
    1
}

fn default_max_output_bytes() -> usize {
    64 * 1024
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            interpreter_args: default_interpreter_args(),
            time_budget_secs: default_time_budget(),
            max_output_bytes: default_max_output_bytes(),
        }
    }
}

impl RunnerConfig {
    /// Returns the time budget as a Duration.
    pub fn time_budget(&self) -> Duration {
        Duration::from_secs(self.time_budget_secs)
    }
}

/// Runs candidate programs under bubblewrap.
pub struct BubblewrapRunner {
    config: RunnerConfig,
    bwrap: PathBuf,
    interpreter: PathBuf,
    /// Interpreter directory to bind when it lives outside the standard binds.
    extra_bind: Option<PathBuf>,
}

impl BubblewrapRunner {
    /// Probes the isolation layer and the interpreter and builds a runner.
    ///
    /// A missing `bwrap` or interpreter binary surfaces here, before the
    /// batch starts, as a sandbox failure.
    pub fn new(config: RunnerConfig) -> Result<Self> {
        let bwrap = resolve_binary("bwrap").ok_or_else(|| {
            Error::Sandbox(
                "bubblewrap (bwrap) not found in PATH; install it to run experiments".to_string(),
            )
        })?;

        let interpreter = resolve_binary(&config.interpreter).ok_or_else(|| {
            Error::Sandbox(format!(
                "interpreter '{}' not found in PATH",
                config.interpreter
            ))
        })?;

        let extra_bind = if STANDARD_BINDS.iter().any(|p| interpreter.starts_with(p)) {
            None
        } else {
            interpreter.parent().map(Path::to_path_buf)
        };

        tracing::debug!(
            bwrap = %bwrap.display(),
            interpreter = %interpreter.display(),
            "sandbox runner ready"
        );

        Ok(Self {
            config,
            bwrap,
            interpreter,
            extra_bind,
        })
    }

    /// The runner configuration.
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }
}

#[async_trait]
impl SandboxRunner for BubblewrapRunner {
    async fn execute(&self, program: &str) -> Result<ExecutionResult> {
        // Transient candidate file; RAII removes it on every exit path.
        let file = NamedTempFile::new()
            .map_err(|e| Error::Sandbox(format!("failed to stage candidate file: {}", e)))?;
        std::fs::write(file.path(), program)
            .map_err(|e| Error::Sandbox(format!("failed to write candidate file: {}", e)))?;

        let args = build_args(&self.config, &self.interpreter, self.extra_bind.as_deref(), file.path());

        let start = Instant::now();
        let mut child = Command::new(&self.bwrap)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Sandbox(format!("failed to spawn bwrap: {}", e)))?;

        let stdout = child.stdout.take().expect("stdout was piped");
        let stderr = child.stderr.take().expect("stderr was piped");

        let cap = self.config.max_output_bytes;
        let stdout_task = tokio::spawn(read_capped(stdout, cap));
        let stderr_task = tokio::spawn(read_capped(stderr, cap));

        let exit = match tokio::time::timeout(self.config.time_budget(), child.wait()).await {
            Ok(status) => {
                let status = status
                    .map_err(|e| Error::Sandbox(format!("failed to wait for sandbox: {}", e)))?;
                Some(status)
            }
            Err(_) => {
                // Budget elapsed: kill the sandbox and reap it. The unshared
                // pid namespace dies with bwrap, taking the interpreter along.
                if let Err(e) = child.start_kill() {
                    tracing::debug!(error = %e, "kill after timeout; process already gone");
                }
                let _ = child.wait().await;
                None
            }
        };
        let duration = start.elapsed();

        let stdout = stdout_task
            .await
            .map_err(|e| Error::Sandbox(format!("stdout reader failed: {}", e)))?;
        let stderr = stderr_task
            .await
            .map_err(|e| Error::Sandbox(format!("stderr reader failed: {}", e)))?;

        let result = match exit {
            None => ExecutionResult {
                status: ExecStatus::Timeout,
                exit_code: None,
                stdout,
                stderr,
                duration,
            },
            Some(status) if status.success() => ExecutionResult {
                status: ExecStatus::Success,
                exit_code: status.code(),
                stdout,
                stderr,
                duration,
            },
            Some(status) => ExecutionResult {
                status: ExecStatus::RuntimeError,
                exit_code: status.code(),
                stdout,
                stderr,
                duration,
            },
        };

        tracing::debug!(
            status = ?result.status,
            exit_code = ?result.exit_code,
            duration_ms = duration.as_millis() as u64,
            "sandboxed execution finished"
        );

        Ok(result)
    }

    fn name(&self) -> &str {
        "bubblewrap"
    }
}

/// Builds the full bwrap argument list for one execution.
///
/// bwrap applies mount operations in order: the tmpfs covers `/tmp` first,
/// then the candidate bind lands inside that tmpfs.
fn build_args(
    config: &RunnerConfig,
    interpreter: &Path,
    extra_bind: Option<&Path>,
    program_file: &Path,
) -> Vec<String> {
    let mut args = vec![
        "--unshare-all".to_string(),
        "--die-with-parent".to_string(),
        "--dir".to_string(),
        "/tmp".to_string(),
        "--tmpfs".to_string(),
        "/tmp".to_string(),
        "--chdir".to_string(),
        "/tmp".to_string(),
        "--ro-bind".to_string(),
        "/usr".to_string(),
        "/usr".to_string(),
        "--ro-bind".to_string(),
        "/bin".to_string(),
        "/bin".to_string(),
        "--ro-bind".to_string(),
        "/lib".to_string(),
        "/lib".to_string(),
        // /lib64 is absent on some distros
        "--ro-bind-try".to_string(),
        "/lib64".to_string(),
        "/lib64".to_string(),
        "--dev".to_string(),
        "/dev".to_string(),
        "--proc".to_string(),
        "/proc".to_string(),
    ];

    if let Some(dir) = extra_bind {
        args.push("--ro-bind".to_string());
        args.push(dir.display().to_string());
        args.push(dir.display().to_string());
    }

    args.push("--ro-bind".to_string());
    args.push(program_file.display().to_string());
    args.push(SANDBOX_PROGRAM_PATH.to_string());

    args.push("--".to_string());
    args.push(interpreter.display().to_string());
    args.extend(config.interpreter_args.iter().cloned());
    args.push(SANDBOX_PROGRAM_PATH.to_string());

    args
}

/// Reads a stream into a bounded buffer, draining anything past the cap so
/// the sandboxed process never blocks on a full pipe.
async fn read_capped<R>(mut reader: R, cap: usize) -> String
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut buf: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 8192];
    let mut truncated = false;

    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                let room = cap.saturating_sub(buf.len());
                let take = n.min(room);
                buf.extend_from_slice(&chunk[..take]);
                if take < n {
                    truncated = true;
                }
            }
            Err(_) => break,
        }
    }

    let mut text = String::from_utf8_lossy(&buf).into_owned();
    if truncated {
        text.push_str("\n[truncated]");
    }
    text
}

/// Resolves a command to an executable path: directly when it contains a
/// path separator, otherwise by searching PATH.
fn resolve_binary(command: &str) -> Option<PathBuf> {
    if command.contains('/') {
        let path = PathBuf::from(command);
        if path.is_file() && is_executable(&path) {
            return Some(path);
        }
        return None;
    }
    find_in_path(command)
}

fn find_in_path(prog: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path) {
        let cand = dir.join(prog);
        if cand.is_file() && is_executable(&cand) {
            return Some(cand);
        }
    }
    None
}

fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt as _;
        if let Ok(meta) = std::fs::metadata(path) {
            return meta.permissions().mode() & 0o111 != 0;
        }
        false
    }
    #[cfg(not(unix))]
    {
        path.is_file()
    }
}
