//! Execution Timeout Management
//!
//! Deadline wrapper used by the process executor. The executor is the only
//! place a request can stall, so every wait on a child goes through here.

use std::future::Future;
use std::time::Duration;
use tokio::time;

/// Default per-command deadline
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// The deadline passed before the future completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("deadline of {after:?} exceeded")]
pub struct DeadlineExceeded {
    pub after: Duration,
}

/// Execution timeout configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionTimeout {
    duration: Duration,
}

impl Default for ExecutionTimeout {
    fn default() -> Self {
        Self::from_secs(DEFAULT_TIMEOUT_SECS)
    }
}

impl ExecutionTimeout {
    /// Zero durations are raised to one millisecond
    pub fn new(duration: Duration) -> Self {
        Self {
            duration: duration.max(Duration::from_millis(1)),
        }
    }

    pub fn from_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Whole seconds, as reported to the agent
    pub fn as_secs(&self) -> u64 {
        self.duration.as_secs()
    }

    /// Drive `future` to completion or give up at the deadline
    ///
    /// The future is dropped when the deadline passes; callers that own a
    /// child process must still kill and reap it.
    pub async fn run<F>(&self, future: F) -> Result<F::Output, DeadlineExceeded>
    where
        F: Future,
    {
        time::timeout(self.duration, future)
            .await
            .map_err(|_| DeadlineExceeded {
                after: self.duration,
            })
    }
}
