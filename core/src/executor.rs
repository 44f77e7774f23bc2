//! Execution Coordinator: the single entry point for running a tool.
//!
//! Pipeline: registry lookup, command build, admission control, process run,
//! history append. Each request runs its own child process; the only state
//! shared between concurrent requests is the admission semaphore, the
//! in-flight gauge, and the history ring.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::availability::AvailabilityCache;
use crate::command::{self, CommandPlan, ToolRequest};
use crate::config::ArmoryConfig;
use crate::error::ExecuteError;
use crate::history::{ExecutionRecord, History};
use crate::registry::{Registry, ToolSpec};
use crate::runner::{ExecStatus, ExecutionResult, Runner};

const TOOL_TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of probing one tool for the debug surface.
#[derive(Debug, Serialize)]
pub struct ToolTestReport {
    pub tool: String,
    pub binary: String,
    pub installed: bool,
    pub path: Option<String>,
    pub version: Option<String>,
}

pub struct Coordinator {
    registry: Registry,
    runner: Runner,
    history: History,
    availability: AvailabilityCache,
    admission: Semaphore,
    in_flight: AtomicUsize,
    request_seq: AtomicU64,
    started_at: Instant,
    path_root: Option<PathBuf>,
    max_concurrent: usize,
}

impl Coordinator {
    pub fn new(config: &ArmoryConfig) -> Self {
        Self::with_registry(config, Registry::builtin())
    }

    pub fn with_registry(config: &ArmoryConfig, registry: Registry) -> Self {
        Self {
            registry,
            runner: Runner::new(
                config.exec.output_cap_bytes,
                Duration::from_secs(config.exec.kill_grace_secs),
            ),
            history: History::new(),
            availability: AvailabilityCache::new(Duration::from_secs(config.exec.probe_ttl_secs)),
            admission: Semaphore::new(config.exec.max_concurrent),
            in_flight: AtomicUsize::new(0),
            request_seq: AtomicU64::new(0),
            started_at: Instant::now(),
            path_root: config.exec.wordlist_root.as_ref().map(PathBuf::from),
            max_concurrent: config.exec.max_concurrent,
        }
    }

    /// Validate, build, and run one tool request.
    ///
    /// Validation and lookup failures return before anything is spawned.
    /// Launch failures and timeouts come back as results, not errors.
    pub async fn execute(&self, request: ToolRequest) -> Result<ExecutionResult, ExecuteError> {
        let spec = self
            .registry
            .lookup(&request.tool)
            .ok_or_else(|| ExecuteError::NotFound(request.tool.clone()))?;
        let plan = command::build(spec, &request, self.path_root.as_deref())?;
        let request_id = self.request_seq.fetch_add(1, Ordering::Relaxed) + 1;

        // Admission control: wait for a slot, never reject.
        let _permit = self
            .admission
            .acquire()
            .await
            .expect("admission semaphore never closed");
        let _gauge = InFlightGuard::enter(&self.in_flight);

        info!(
            "request {request_id}: running {} ({} {})",
            spec.name,
            plan.program,
            plan.display.join(" ")
        );
        let result = self.runner.run(&plan, request_id).await;
        self.log_outcome(spec, &plan, &result);

        self.history
            .push(ExecutionRecord::new(spec.name, redact(spec, &request), &result));
        Ok(result)
    }

    fn log_outcome(&self, spec: &ToolSpec, plan: &CommandPlan, result: &ExecutionResult) {
        match &result.status {
            ExecStatus::TimedOut => warn!(
                "request {}: {} timed out after {}ms ({} {})",
                result.request_id,
                spec.name,
                result.duration_ms,
                plan.program,
                plan.display.join(" ")
            ),
            ExecStatus::LaunchFailed(reason) => warn!(
                "request {}: could not launch {} for {}: {reason}",
                result.request_id, plan.program, spec.name
            ),
            status => info!(
                "request {}: {} finished {} in {}ms",
                result.request_id,
                spec.name,
                status.label(),
                result.duration_ms
            ),
        }
    }

    /// Resolve the tool's binary and, when present, ask it for a version
    /// string. Introspection only; nothing is recorded in the history.
    pub async fn tool_test(&self, tool: &str) -> Result<ToolTestReport, ExecuteError> {
        let spec = self
            .registry
            .lookup(tool)
            .ok_or_else(|| ExecuteError::NotFound(tool.to_string()))?;

        let Some(path) = AvailabilityCache::resolve(spec.binary) else {
            return Ok(ToolTestReport {
                tool: spec.name.to_string(),
                binary: spec.binary.to_string(),
                installed: false,
                path: None,
                version: None,
            });
        };

        let plan = CommandPlan {
            program: path.to_string_lossy().into_owned(),
            args: vec!["--version".to_string()],
            display: vec!["--version".to_string()],
            timeout: TOOL_TEST_TIMEOUT,
        };
        let result = self.runner.run(&plan, 0).await;
        let version = match result.status {
            ExecStatus::Success => first_line(&result.stdout).or_else(|| first_line(&result.stderr)),
            // Some tools have no --version; the binary being runnable is enough.
            _ => None,
        };

        Ok(ToolTestReport {
            tool: spec.name.to_string(),
            binary: spec.binary.to_string(),
            installed: true,
            path: Some(path.to_string_lossy().into_owned()),
            version,
        })
    }

    /// Per-tool binary reachability, cached with a short TTL.
    pub fn tool_availability(&self) -> Vec<(&'static str, bool)> {
        self.registry
            .list()
            .into_iter()
            .map(|spec| (spec.name, self.availability.check(spec.binary)))
            .collect()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn history(&self) -> Vec<ExecutionRecord> {
        self.history.snapshot()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn request_count(&self) -> u64 {
        self.request_seq.load(Ordering::Relaxed)
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }
}

/// Copy of the request parameters with sensitive values masked, for history
/// and logging.
fn redact(spec: &ToolSpec, request: &ToolRequest) -> HashMap<String, String> {
    request
        .params
        .iter()
        .map(|(name, value)| {
            let sensitive = spec
                .params
                .iter()
                .any(|p| p.name == name && p.sensitive);
            let shown = if sensitive { "***".to_string() } else { value.clone() };
            (name.clone(), shown)
        })
        .collect()
}

/// Keeps the in-flight gauge honest on every exit path, including a caller
/// dropping the future mid-run.
struct InFlightGuard<'a>(&'a AtomicUsize);

impl<'a> InFlightGuard<'a> {
    fn enter(gauge: &'a AtomicUsize) -> Self {
        gauge.fetch_add(1, Ordering::SeqCst);
        Self(gauge)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn first_line(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_masks_sensitive_values() {
        let reg = Registry::builtin();
        let spec = reg.lookup("password_bruteforce").unwrap();
        let request = ToolRequest::new(
            "password_bruteforce",
            [
                ("target".to_string(), "10.0.0.1".to_string()),
                ("password".to_string(), "hunter2".to_string()),
            ]
            .into_iter()
            .collect(),
        );
        let redacted = redact(spec, &request);
        assert_eq!(redacted["target"], "10.0.0.1");
        assert_eq!(redacted["password"], "***");
    }

    #[test]
    fn test_first_line() {
        assert_eq!(first_line("nmap 7.94\nmore"), Some("nmap 7.94".into()));
        assert_eq!(first_line("\n  v1.2  \n"), Some("v1.2".into()));
        assert_eq!(first_line(""), None);
    }
}
