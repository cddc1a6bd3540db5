use std::time::Duration;

use super::domain::JobId;

/// Retry policy handed to the queue transport: a bounded number of attempts
/// with a fixed pause between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            interval: Duration::from_secs(60),
        }
    }
}

/// The transport-tracked attempt counter, passed into each execution so the
/// service knows whether a retryable failure still has headroom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    pub number: u32,
    pub max_attempts: u32,
}

impl Attempt {
    pub fn first(policy: RetryPolicy) -> Self {
        Self {
            number: 1,
            max_attempts: policy.max_attempts,
        }
    }

    pub fn next(self) -> Self {
        Self {
            number: self.number + 1,
            ..self
        }
    }

    pub fn is_last(&self) -> bool {
        self.number >= self.max_attempts
    }
}

/// Dispatch abstraction: hands a job id to whatever executes jobs
/// asynchronously. The transport owns ordering (no two executions of one
/// job run concurrently) and the attempt counter.
pub trait QueueTransport: Send + Sync {
    fn enqueue(&self, job_id: JobId, policy: RetryPolicy) -> Result<(), QueueError>;
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue transport unavailable: {0}")]
    Unavailable(String),
}
