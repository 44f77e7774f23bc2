//! Process Runner: bounded execution of a prepared command plan.
//!
//! Launches the argument vector directly (no shell layer), captures stdout
//! and stderr independently up to a size cap, and enforces the plan's
//! deadline with SIGTERM-then-SIGKILL escalation. Knows nothing about what
//! the tool means; exit codes are preserved verbatim.

use std::process::Stdio;
use std::time::{Duration, Instant};

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::debug;

use crate::command::CommandPlan;

/// Final state of one tool run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ExecStatus {
    /// Exit code zero.
    Success,
    /// The tool ran to completion and signalled failure. Not an error in the
    /// core's eyes.
    NonZero(i32),
    /// Deadline exceeded; the process was terminated. Partial output kept.
    TimedOut,
    /// The binary could not be started at all. Never retried.
    LaunchFailed(String),
}

impl ExecStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ExecStatus::Success => "success",
            ExecStatus::NonZero(_) => "error",
            ExecStatus::TimedOut => "timeout",
            ExecStatus::LaunchFailed(_) => "launch_failed",
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ExecStatus::Success => Some(0),
            ExecStatus::NonZero(code) => Some(*code),
            _ => None,
        }
    }
}

/// Outcome of running a `CommandPlan`. Immutable once produced.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub request_id: u64,
    pub status: ExecStatus,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    pub truncated: bool,
}

pub struct Runner {
    output_cap: usize,
    kill_grace: Duration,
}

impl Runner {
    pub fn new(output_cap: usize, kill_grace: Duration) -> Self {
        Self {
            output_cap,
            kill_grace,
        }
    }

    /// Run the plan to completion, timeout, or launch failure.
    pub async fn run(&self, plan: &CommandPlan, request_id: u64) -> ExecutionResult {
        let start = Instant::now();

        let mut cmd = Command::new(&plan.program);
        cmd.args(&plan.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Own process group, so deadline enforcement can signal every
            // worker the tool forks, not just the direct child.
            .process_group(0)
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return ExecutionResult {
                    request_id,
                    status: ExecStatus::LaunchFailed(e.to_string()),
                    stdout: String::new(),
                    stderr: String::new(),
                    duration_ms: start.elapsed().as_millis() as u64,
                    truncated: false,
                }
            }
        };

        // Drain both pipes concurrently so a chatty child never blocks on a
        // full pipe while we wait on it.
        let cap = self.output_cap;
        let stdout_task = child
            .stdout
            .take()
            .map(|pipe| tokio::spawn(read_capped(pipe, cap)));
        let stderr_task = child
            .stderr
            .take()
            .map(|pipe| tokio::spawn(read_capped(pipe, cap)));

        let status = match tokio::time::timeout(plan.timeout, child.wait()).await {
            Ok(Ok(exit)) => {
                if exit.success() {
                    ExecStatus::Success
                } else {
                    ExecStatus::NonZero(exit.code().unwrap_or(-1))
                }
            }
            Ok(Err(e)) => ExecStatus::LaunchFailed(e.to_string()),
            Err(_) => {
                debug!("request {request_id}: deadline exceeded, terminating child");
                self.terminate(&mut child).await;
                ExecStatus::TimedOut
            }
        };

        // After a kill the pipes must close promptly; a descendant that
        // escaped the process group could still hold them open, so the drain
        // gets its own bound instead of extending the admission slot.
        let drain_limit = matches!(status, ExecStatus::TimedOut).then_some(self.kill_grace);
        let (stdout, stdout_truncated) = collect(stdout_task, drain_limit).await;
        let (stderr, stderr_truncated) = collect(stderr_task, drain_limit).await;

        ExecutionResult {
            request_id,
            status,
            stdout,
            stderr,
            duration_ms: start.elapsed().as_millis() as u64,
            truncated: stdout_truncated || stderr_truncated,
        }
    }

    /// SIGTERM first, SIGKILL after the grace period, both delivered to the
    /// whole process group so forked workers die with their parent and
    /// release the output pipes. The child is gone by the time this returns.
    async fn terminate(&self, child: &mut Child) {
        if let Some(pid) = child.id() {
            let group = Pid::from_raw(pid as i32);
            let _ = signal::killpg(group, Signal::SIGTERM);
            if tokio::time::timeout(self.kill_grace, child.wait())
                .await
                .is_err()
            {
                let _ = signal::killpg(group, Signal::SIGKILL);
            }
        }
        let _ = child.kill().await;
    }
}

async fn collect(
    task: Option<tokio::task::JoinHandle<(String, bool)>>,
    limit: Option<Duration>,
) -> (String, bool) {
    let Some(mut handle) = task else {
        return (String::new(), false);
    };
    match limit {
        Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
            Ok(result) => result.unwrap_or_default(),
            Err(_) => {
                // The stream is wedged open by something outside the process
                // group. Abandon it; the captured prefix is lost but the
                // admission slot comes back.
                handle.abort();
                (String::new(), false)
            }
        },
        None => handle.await.unwrap_or_default(),
    }
}

/// Read a pipe to EOF, keeping at most `cap` bytes. Overflow is drained and
/// discarded, and the kept text gets an explicit truncation marker.
async fn read_capped<R: AsyncRead + Unpin>(mut reader: R, cap: usize) -> (String, bool) {
    let mut buf: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 8192];
    let mut truncated = false;

    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                if buf.len() < cap {
                    let take = n.min(cap - buf.len());
                    buf.extend_from_slice(&chunk[..take]);
                    if take < n {
                        truncated = true;
                    }
                } else {
                    truncated = true;
                }
            }
            Err(_) => break,
        }
    }

    let mut text = String::from_utf8_lossy(&buf).into_owned();
    if truncated {
        text.push_str(&format!("\n[output truncated at {cap} bytes]"));
    }
    (text, truncated)
}
