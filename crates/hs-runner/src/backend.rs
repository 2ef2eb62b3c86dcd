//! Execution-backend abstraction for remote training services.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use hs_types::ParameterValue;

use crate::remote::JobSpec;

/// Opaque handle assigned to a job by the execution service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobHandle(pub String);

impl std::fmt::Display for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State of a job as reported by the execution service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Failed { cause: String },
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed { .. } | Self::Cancelled)
    }
}

/// Metrics reported by a completed job: the logged metric map plus the
/// exact argument mapping the job ran with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMetrics {
    pub metrics: HashMap<String, f64>,
    pub arguments: HashMap<String, ParameterValue>,
}

/// Connection status of a backend adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    Reconnecting,
}

/// Errors surfaced by backend operations.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("not connected to execution service")]
    NotConnected,
    #[error("compute resources exhausted: {message}")]
    ResourceExhausted { message: String },
    #[error("job not found: {handle}")]
    JobNotFound { handle: String },
    #[error("rate limited — retry after {retry_after_ms} ms")]
    RateLimited { retry_after_ms: u64 },
    #[error("submission rejected: {reason}")]
    Rejected { reason: String },
    #[error("backend internal error: {message}")]
    Internal { message: String },
}

/// Result alias for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Core execution-service interface.
///
/// Implementations may talk to a managed training cluster over its REST
/// API or simulate execution locally (see [`crate::local::LocalBackend`]).
/// Submission is non-blocking: `submit_job` returns the handle as soon as
/// the service accepts the request, and the job runs to a terminal state
/// on its own.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Connect to the execution service and authenticate.
    async fn connect(&mut self) -> BackendResult<()>;

    /// Disconnect gracefully.
    async fn disconnect(&mut self) -> BackendResult<()>;

    /// Current connection status.
    fn connection_status(&self) -> ConnectionStatus;

    /// Submit a job. Returns the service-assigned handle immediately.
    async fn submit_job(&mut self, spec: JobSpec) -> BackendResult<JobHandle>;

    /// Current state of a submitted job.
    async fn job_state(&self, handle: &JobHandle) -> BackendResult<JobState>;

    /// Logged metrics and final arguments. Only available once the job
    /// has completed.
    async fn job_metrics(&self, handle: &JobHandle) -> BackendResult<JobMetrics>;

    /// Request cancellation. Best-effort: a job already past its
    /// cancellation checkpoint completes normally.
    async fn cancel_job(&mut self, handle: &JobHandle) -> BackendResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(!JobState::Queued.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed {
            cause: "oom".into()
        }
        .is_terminal());
        assert!(JobState::Cancelled.is_terminal());
    }

    #[test]
    fn backend_error_display() {
        let err = BackendError::ResourceExhausted {
            message: "cluster at capacity".into(),
        };
        assert!(err.to_string().contains("cluster at capacity"));
    }
}
