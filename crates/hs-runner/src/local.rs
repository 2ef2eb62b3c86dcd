//! Local (simulated) execution backend.
//!
//! Runs jobs fully in-process with no external service.  Useful for
//! developing sweep logic, integration testing, and validating the
//! dispatcher's throttling before pointing at a real cluster.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use async_trait::async_trait;
use hs_types::ParameterValue;

use crate::backend::{
    BackendError, BackendResult, ConnectionStatus, ExecutionBackend, JobHandle, JobMetrics,
    JobState,
};
use crate::remote::JobSpec;

/// Objective evaluated for each job: arguments in, metric map (or a
/// failure cause) out.
pub type ObjectiveFn =
    dyn Fn(&HashMap<String, ParameterValue>) -> Result<HashMap<String, f64>, String> + Send + Sync;

/// Configuration for the local backend.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalBackendConfig {
    /// Jobs the simulated cluster accepts as running at once; submissions
    /// beyond this fail with `ResourceExhausted`.
    pub capacity: usize,
    /// Echo numeric job arguments into the logged metric map, the way the
    /// training script logs each hyperparameter it used.
    pub echo_parameters: bool,
    /// Evaluate the objective at submission time instead of waiting for
    /// `tick`, so a sweep can run end-to-end without an external clock.
    pub auto_complete: bool,
}

impl Default for LocalBackendConfig {
    fn default() -> Self {
        Self {
            capacity: 8,
            echo_parameters: true,
            auto_complete: false,
        }
    }
}

#[derive(Debug, Clone)]
struct LocalJob {
    spec: JobSpec,
    state: JobState,
    metrics: Option<HashMap<String, f64>>,
}

struct Inner {
    connected: bool,
    next_handle: u64,
    jobs: HashMap<JobHandle, LocalJob>,
    /// Running jobs, oldest first.  `tick` completes the head.
    running: Vec<JobHandle>,
}

/// A fully in-process backend that simulates job execution.
///
/// Submitted jobs move straight to `Running` and stay there until the
/// test (or demo) drives the clock with [`tick`](LocalBackend::tick), so
/// intermediate states are observable.
pub struct LocalBackend {
    config: LocalBackendConfig,
    objective: Arc<ObjectiveFn>,
    inner: Mutex<Inner>,
}

impl LocalBackend {
    pub fn new<F>(config: LocalBackendConfig, objective: F) -> Self
    where
        F: Fn(&HashMap<String, ParameterValue>) -> Result<HashMap<String, f64>, String>
            + Send
            + Sync
            + 'static,
    {
        Self {
            config,
            objective: Arc::new(objective),
            inner: Mutex::new(Inner {
                connected: false,
                next_handle: 0,
                jobs: HashMap::new(),
                running: Vec::new(),
            }),
        }
    }

    /// Local backend with default settings and a fixed metric name.
    pub fn with_objective<F>(objective: F) -> Self
    where
        F: Fn(&HashMap<String, ParameterValue>) -> Result<HashMap<String, f64>, String>
            + Send
            + Sync
            + 'static,
    {
        Self::new(LocalBackendConfig::default(), objective)
    }

    /// Advance the simulated cluster by one step: the oldest running job
    /// evaluates its objective and reaches a terminal state.  Returns
    /// `false` when nothing was running.
    pub fn tick(&self) -> bool {
        let mut inner = self.inner.lock();
        let handle = loop {
            let Some(candidate) = inner.running.first().cloned() else {
                return false;
            };
            inner.running.remove(0);
            // Cancelled jobs drop out of the running queue silently.
            match inner.jobs.get(&candidate).map(|j| j.state.clone()) {
                Some(JobState::Running) => break candidate,
                _ => continue,
            }
        };

        self.evaluate(&mut inner, &handle);
        true
    }

    /// Evaluate the objective for `handle` and move it to a terminal state.
    fn evaluate(&self, inner: &mut Inner, handle: &JobHandle) {
        let Some(job) = inner.jobs.get(handle).cloned() else {
            return;
        };

        let outcome = (self.objective)(&job.spec.arguments);
        let Some(entry) = inner.jobs.get_mut(handle) else {
            return;
        };
        match outcome {
            Ok(mut metrics) => {
                if self.config.echo_parameters {
                    for (name, value) in &job.spec.arguments {
                        if let Some(v) = value.as_f64() {
                            metrics.entry(name.clone()).or_insert(v);
                        }
                    }
                }
                entry.state = JobState::Completed;
                entry.metrics = Some(metrics);
                info!(handle = %handle, "local backend: job completed");
            }
            Err(cause) => {
                entry.state = JobState::Failed {
                    cause: cause.clone(),
                };
                info!(handle = %handle, cause = %cause, "local backend: job failed");
            }
        }
    }

    /// Run every in-flight job to a terminal state.
    pub fn drain(&self) {
        while self.tick() {}
    }

    /// Number of jobs currently in `Running` state.
    pub fn running_count(&self) -> usize {
        let inner = self.inner.lock();
        inner
            .jobs
            .values()
            .filter(|j| j.state == JobState::Running)
            .count()
    }

    /// High-water mark check helper for tests: states of all jobs.
    pub fn job_states(&self) -> Vec<JobState> {
        let inner = self.inner.lock();
        inner.jobs.values().map(|j| j.state.clone()).collect()
    }
}

#[async_trait]
impl ExecutionBackend for LocalBackend {
    async fn connect(&mut self) -> BackendResult<()> {
        self.inner.lock().connected = true;
        info!("local backend connected (simulated cluster)");
        Ok(())
    }

    async fn disconnect(&mut self) -> BackendResult<()> {
        self.inner.lock().connected = false;
        info!("local backend disconnected");
        Ok(())
    }

    fn connection_status(&self) -> ConnectionStatus {
        if self.inner.lock().connected {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Disconnected
        }
    }

    async fn submit_job(&mut self, spec: JobSpec) -> BackendResult<JobHandle> {
        let mut inner = self.inner.lock();
        if !inner.connected {
            return Err(BackendError::NotConnected);
        }

        let running = inner
            .jobs
            .values()
            .filter(|j| j.state == JobState::Running)
            .count();
        if running >= self.config.capacity {
            return Err(BackendError::ResourceExhausted {
                message: format!("cluster at capacity ({} running)", running),
            });
        }

        let handle = JobHandle(format!("local-{}", inner.next_handle));
        inner.next_handle += 1;

        inner.jobs.insert(
            handle.clone(),
            LocalJob {
                spec,
                state: JobState::Running,
                metrics: None,
            },
        );

        if self.config.auto_complete {
            self.evaluate(&mut inner, &handle);
        } else {
            inner.running.push(handle.clone());
        }
        Ok(handle)
    }

    async fn job_state(&self, handle: &JobHandle) -> BackendResult<JobState> {
        self.inner
            .lock()
            .jobs
            .get(handle)
            .map(|j| j.state.clone())
            .ok_or(BackendError::JobNotFound {
                handle: handle.to_string(),
            })
    }

    async fn job_metrics(&self, handle: &JobHandle) -> BackendResult<JobMetrics> {
        let inner = self.inner.lock();
        let job = inner.jobs.get(handle).ok_or(BackendError::JobNotFound {
            handle: handle.to_string(),
        })?;
        match (&job.state, &job.metrics) {
            (JobState::Completed, Some(metrics)) => Ok(JobMetrics {
                metrics: metrics.clone(),
                arguments: job.spec.arguments.clone(),
            }),
            _ => Err(BackendError::Rejected {
                reason: format!("job {handle} has not completed"),
            }),
        }
    }

    async fn cancel_job(&mut self, handle: &JobHandle) -> BackendResult<()> {
        let mut inner = self.inner.lock();
        let job = inner.jobs.get_mut(handle).ok_or(BackendError::JobNotFound {
            handle: handle.to_string(),
        })?;
        // Past the cancellation checkpoint — the job completes normally.
        if job.state.is_terminal() {
            return Ok(());
        }
        job.state = JobState::Cancelled;
        Ok(())
    }
}
