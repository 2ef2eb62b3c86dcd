//! # hs-runner
//!
//! Run dispatch, result aggregation, and sweep orchestration for HyperSweep.
//!
//! The execution service is abstracted behind [`ExecutionBackend`]; a fully
//! in-process [`LocalBackend`] is provided for development and tests.  The
//! [`Dispatcher`] throttles submissions under a concurrency ceiling, the
//! [`Aggregator`] waits for every run to reach a terminal state and selects
//! the best one, and [`Sweep`] ties the pieces together.

mod aggregate;
mod backend;
mod dispatch;
mod local;
mod remote;
mod sweep;

pub use aggregate::{Aggregator, CancelToken, PollPolicy};
pub use backend::{
    BackendError, BackendResult, ConnectionStatus, ExecutionBackend, JobHandle, JobMetrics,
    JobState,
};
pub use dispatch::Dispatcher;
pub use local::{LocalBackend, LocalBackendConfig, ObjectiveFn};
pub use remote::{ComputeTarget, JobSpec, RuntimeEnv, TrainerArgs, WorkerResources};
pub use sweep::{Sweep, SweepConfig, SweepState, SweepStatus};
