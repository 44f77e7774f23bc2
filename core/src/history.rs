//! Bounded execution history.
//!
//! A fixed-capacity ring of the most recent execution records, shared across
//! all callers. The coordinator is the only writer; the mutex is held just
//! long enough for the queue operation, never while a child process runs.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use serde::Serialize;

use crate::runner::ExecutionResult;

pub const HISTORY_CAPACITY: usize = 100;

/// One completed execution: the result, the originating request (with
/// sensitive values already redacted), and when it happened.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionRecord {
    pub request_id: u64,
    pub tool: String,
    pub params: HashMap<String, String>,
    pub status: String,
    pub exit_code: Option<i32>,
    pub error: Option<String>,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    pub truncated: bool,
    pub timestamp: i64,
}

impl ExecutionRecord {
    pub fn new(tool: &str, params: HashMap<String, String>, result: &ExecutionResult) -> Self {
        let error = match &result.status {
            crate::runner::ExecStatus::LaunchFailed(reason) => Some(reason.clone()),
            _ => None,
        };
        Self {
            request_id: result.request_id,
            tool: tool.to_string(),
            params,
            status: result.status.label().to_string(),
            exit_code: result.status.exit_code(),
            error,
            stdout: result.stdout.clone(),
            stderr: result.stderr.clone(),
            duration_ms: result.duration_ms,
            truncated: result.truncated,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

pub struct History {
    inner: Mutex<VecDeque<ExecutionRecord>>,
}

impl History {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(HISTORY_CAPACITY)),
        }
    }

    /// Append a record, evicting the oldest when full.
    pub fn push(&self, record: ExecutionRecord) {
        let mut queue = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if queue.len() >= HISTORY_CAPACITY {
            queue.pop_front();
        }
        queue.push_back(record);
    }

    /// Copy of the current records, oldest first.
    pub fn snapshot(&self) -> Vec<ExecutionRecord> {
        let queue = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        queue.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ExecStatus;

    fn record(id: u64) -> ExecutionRecord {
        let result = ExecutionResult {
            request_id: id,
            status: ExecStatus::Success,
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 1,
            truncated: false,
        };
        ExecutionRecord::new("network_scan", HashMap::new(), &result)
    }

    #[test]
    fn test_push_and_snapshot_order() {
        let history = History::new();
        for id in 1..=3 {
            history.push(record(id));
        }
        let snap = history.snapshot();
        assert_eq!(snap.len(), 3);
        assert_eq!(snap[0].request_id, 1);
        assert_eq!(snap[2].request_id, 3);
    }

    #[test]
    fn test_capacity_never_exceeded() {
        let history = History::new();
        for id in 1..=(HISTORY_CAPACITY as u64 + 1) {
            history.push(record(id));
        }
        assert_eq!(history.len(), HISTORY_CAPACITY);

        // After 101 pushes the oldest is gone and the 2nd-oldest leads.
        let snap = history.snapshot();
        assert_eq!(snap[0].request_id, 2);
        assert_eq!(snap.last().unwrap().request_id, HISTORY_CAPACITY as u64 + 1);
    }

    #[test]
    fn test_launch_failure_reason_recorded() {
        let result = ExecutionResult {
            request_id: 9,
            status: ExecStatus::LaunchFailed("No such file or directory".into()),
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 0,
            truncated: false,
        };
        let rec = ExecutionRecord::new("network_scan", HashMap::new(), &result);
        assert_eq!(rec.status, "launch_failed");
        assert_eq!(rec.exit_code, None);
        assert!(rec.error.unwrap().contains("No such file"));
    }
}
