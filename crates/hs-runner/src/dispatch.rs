//! Run dispatcher: submits one training job per grid point under a
//! concurrency ceiling.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{info, warn};

use hs_types::{GridPoint, HsError, HsResult, RunId, RunRecord, RunStatus, SweepId};

use crate::backend::{BackendError, ExecutionBackend, JobHandle, JobState};
use crate::remote::JobSpec;

/// Outcome of refreshing one in-flight run against the backend.
enum Refresh {
    Completed {
        metric: Option<f64>,
        metrics: std::collections::HashMap<String, f64>,
    },
    Failed(String),
    Cancelled,
    StillRunning,
}

/// Submits runs to the execution backend, at most `max_concurrent_runs`
/// in `Running` state at any instant.
///
/// `enqueue` hands out a [`RunId`] per grid point immediately; the actual
/// backend submission happens inside [`pump`](Dispatcher::pump), which is
/// single-threaded and non-blocking.  The running count is the only
/// shared mutated counter and the dispatcher is its sole mutator.
pub struct Dispatcher {
    sweep_id: SweepId,
    template: JobSpec,
    primary_metric: String,
    max_concurrent_runs: usize,
    runs: Arc<RwLock<Vec<RunRecord>>>,
}

impl Dispatcher {
    pub fn new(
        sweep_id: SweepId,
        template: JobSpec,
        primary_metric: impl Into<String>,
        max_concurrent_runs: usize,
    ) -> HsResult<Self> {
        if max_concurrent_runs == 0 {
            return Err(hs_types::validation_error!(
                "max_concurrent_runs must be at least 1"
            ));
        }
        Ok(Self {
            sweep_id,
            template,
            primary_metric: primary_metric.into(),
            max_concurrent_runs,
            runs: Arc::new(RwLock::new(Vec::new())),
        })
    }

    /// Create one Queued run record per grid point, in submission order.
    /// Returns the handles immediately; nothing touches the backend yet.
    pub fn enqueue(&self, points: impl IntoIterator<Item = GridPoint>) -> Vec<RunId> {
        let mut runs = self.runs.write();
        let mut ids = Vec::new();
        for point in points {
            let record = RunRecord::new(self.sweep_id, runs.len(), point);
            ids.push(record.id);
            runs.push(record);
        }
        info!(sweep_id = %self.sweep_id, queued = ids.len(), "runs enqueued");
        ids
    }

    /// One dispatch step: refresh backend state for in-flight runs, then
    /// submit queued runs while a concurrency slot is free.
    ///
    /// A failed submission marks that run Failed with the cause recorded;
    /// the remaining grid points keep going.
    pub async fn pump(&self, backend: &mut dyn ExecutionBackend) -> HsResult<()> {
        self.refresh(backend).await;
        self.submit_queued(backend).await;
        Ok(())
    }

    async fn refresh(&self, backend: &mut dyn ExecutionBackend) {
        let in_flight: Vec<(RunId, JobHandle)> = {
            let runs = self.runs.read();
            runs.iter()
                .filter(|r| r.status == RunStatus::Running)
                .filter_map(|r| {
                    r.job_handle
                        .as_ref()
                        .map(|h| (r.id, JobHandle(h.clone())))
                })
                .collect()
        };

        for (run_id, handle) in in_flight {
            let outcome = match backend.job_state(&handle).await {
                Ok(JobState::Completed) => match backend.job_metrics(&handle).await {
                    Ok(report) => Refresh::Completed {
                        metric: report.metrics.get(&self.primary_metric).copied(),
                        metrics: report.metrics,
                    },
                    Err(e) => Refresh::Failed(format!("metrics unavailable: {e}")),
                },
                Ok(JobState::Failed { cause }) => Refresh::Failed(cause),
                Ok(JobState::Cancelled) => Refresh::Cancelled,
                Ok(JobState::Queued | JobState::Running) => Refresh::StillRunning,
                Err(BackendError::JobNotFound { .. }) => {
                    Refresh::Failed("job disappeared from execution service".to_string())
                }
                Err(e) => {
                    // Transient polling error: keep the run in flight.
                    warn!(run_id = %run_id, error = %e, "status poll failed");
                    Refresh::StillRunning
                }
            };

            let mut runs = self.runs.write();
            let Some(record) = runs.iter_mut().find(|r| r.id == run_id) else {
                continue;
            };
            match outcome {
                Refresh::Completed {
                    metric: Some(m),
                    metrics,
                } if !m.is_nan() => {
                    info!(run_id = %run_id, metric = m, "run completed");
                    record.mark_completed(m, metrics);
                }
                Refresh::Completed {
                    metric: Some(_), ..
                } => {
                    record.mark_failed(format!(
                        "reported a NaN value for metric '{}'",
                        self.primary_metric
                    ));
                }
                Refresh::Completed {
                    metric: None, ..
                } => {
                    record.mark_failed(format!(
                        "completed without reporting metric '{}'",
                        self.primary_metric
                    ));
                }
                Refresh::Failed(cause) => {
                    warn!(run_id = %run_id, cause = %cause, "run failed");
                    record.mark_failed(cause);
                }
                Refresh::Cancelled => record.mark_cancelled(),
                Refresh::StillRunning => {}
            }
        }
    }

    async fn submit_queued(&self, backend: &mut dyn ExecutionBackend) {
        loop {
            let next = {
                let runs = self.runs.read();
                let running = runs
                    .iter()
                    .filter(|r| r.status == RunStatus::Running)
                    .count();
                if running >= self.max_concurrent_runs {
                    return;
                }
                runs.iter()
                    .find(|r| r.status == RunStatus::Queued)
                    .map(|r| (r.id, r.run_number, r.parameters.clone()))
            };
            let Some((run_id, run_number, params)) = next else {
                return;
            };

            let spec = self.template.merged_with(&params);
            let result = backend.submit_job(spec).await;

            let mut runs = self.runs.write();
            let Some(record) = runs.iter_mut().find(|r| r.id == run_id) else {
                continue;
            };
            match result {
                Ok(handle) => {
                    info!(run_id = %run_id, run_number, handle = %handle, "run submitted");
                    record.mark_running(handle.to_string());
                }
                Err(e) => {
                    warn!(run_id = %run_id, run_number, error = %e, "submission failed");
                    record.mark_failed(e.to_string());
                }
            }
        }
    }

    /// Best-effort cancellation of every non-terminal run.
    pub async fn cancel_all(&self, backend: &mut dyn ExecutionBackend) {
        let pending: Vec<(RunId, Option<JobHandle>)> = {
            let runs = self.runs.read();
            runs.iter()
                .filter(|r| !r.status.is_terminal())
                .map(|r| (r.id, r.job_handle.as_ref().map(|h| JobHandle(h.clone()))))
                .collect()
        };

        for (run_id, handle) in pending {
            match handle {
                // Never submitted: cancel locally.
                None => {
                    let mut runs = self.runs.write();
                    if let Some(record) = runs.iter_mut().find(|r| r.id == run_id) {
                        record.mark_cancelled();
                    }
                }
                Some(handle) => {
                    if let Err(e) = backend.cancel_job(&handle).await {
                        warn!(run_id = %run_id, error = %e, "cancel request failed");
                    }
                }
            }
        }

        // A job past its cancellation checkpoint completes normally; one
        // more refresh settles each run into whichever terminal state the
        // backend reports.
        self.refresh(backend).await;
        info!(sweep_id = %self.sweep_id, "cancellation requested for all non-terminal runs");
    }

    /// Copy of all run records in submission order.
    pub fn snapshot(&self) -> Vec<RunRecord> {
        self.runs.read().clone()
    }

    pub fn all_terminal(&self) -> bool {
        self.runs.read().iter().all(|r| r.status.is_terminal())
    }

    pub fn running_count(&self) -> usize {
        self.runs
            .read()
            .iter()
            .filter(|r| r.status == RunStatus::Running)
            .count()
    }

    pub fn sweep_id(&self) -> SweepId {
        self.sweep_id
    }

    pub fn primary_metric(&self) -> &str {
        &self.primary_metric
    }

    pub fn max_concurrent_runs(&self) -> usize {
        self.max_concurrent_runs
    }
}
