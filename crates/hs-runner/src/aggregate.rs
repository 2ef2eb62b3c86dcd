//! Result aggregation: wait for every run to finish, then pick the best.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use hs_types::{AggregationError, Goal, HsResult, RunRecord, RunStatus, SweepReport};

use crate::backend::ExecutionBackend;
use crate::dispatch::Dispatcher;

/// Polling backoff for the completion wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(200),
            max: Duration::from_secs(5),
        }
    }
}

/// Cooperative cancellation flag for a sweep in progress.
///
/// Cloneable; `request` flips the flag from any thread and the wait loop
/// propagates it to the backend on its next iteration.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Collects run results and selects the best one.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    poll: PollPolicy,
}

impl Aggregator {
    pub fn new(poll: PollPolicy) -> Self {
        Self { poll }
    }

    /// Block (cooperatively) until every enqueued run reaches a terminal
    /// state.  The sleep between polls backs off exponentially up to the
    /// policy's cap; this is the sweep's single suspension point.
    ///
    /// When `cancel` is requested, best-effort cancellation propagates to
    /// every non-terminal run and the wait keeps going until the backend
    /// settles each of them (a job past its cancellation checkpoint
    /// completes normally).
    pub async fn wait(
        &self,
        dispatcher: &Dispatcher,
        backend: &mut dyn ExecutionBackend,
        cancel: &CancelToken,
    ) -> HsResult<()> {
        let mut interval = self.poll.initial;
        let mut cancel_propagated = false;

        loop {
            if cancel.is_requested() && !cancel_propagated {
                dispatcher.cancel_all(backend).await;
                cancel_propagated = true;
            } else {
                dispatcher.pump(backend).await?;
            }

            if dispatcher.all_terminal() {
                info!(sweep_id = %dispatcher.sweep_id(), "all runs terminal");
                return Ok(());
            }

            tokio::time::sleep(interval).await;
            interval = (interval * 2).min(self.poll.max);
        }
    }

    /// The best completed run for `goal`, ties resolved to the earliest
    /// submission.  Fatal ([`AggregationError`]) when nothing completed.
    pub fn select_best(&self, dispatcher: &Dispatcher, goal: Goal) -> HsResult<RunRecord> {
        let records = dispatcher.snapshot();
        Self::select_from(&records, goal, dispatcher.primary_metric())
    }

    /// Selection over an explicit record set.
    pub fn select_from(records: &[RunRecord], goal: Goal, metric_name: &str) -> HsResult<RunRecord> {
        if records.is_empty() {
            return Err(AggregationError::EmptySweep.into());
        }

        let mut best: Option<&RunRecord> = None;
        for record in records.iter().filter(|r| r.status == RunStatus::Completed) {
            let metric = record.metric.ok_or_else(|| AggregationError::MetricMissing {
                run_id: record.id.to_string(),
                metric: metric_name.to_string(),
            })?;
            // A NaN metric can never be an extremum; treat it like a
            // missing value so it cannot capture the best slot.
            if metric.is_nan() {
                continue;
            }

            let improves = match best {
                None => true,
                Some(current) => {
                    // Earlier submission wins ties, and records iterate in
                    // submission order, so only strict improvement replaces.
                    let current_metric = current.metric.unwrap_or(f64::NAN);
                    match goal {
                        Goal::Maximize => metric > current_metric,
                        Goal::Minimize => metric < current_metric,
                    }
                }
            };
            if improves {
                best = Some(record);
            }
        }

        match best {
            Some(record) => Ok(record.clone()),
            None => Err(AggregationError::NoCompletedRuns {
                failed: records.len(),
            }
            .into()),
        }
    }

    /// Full ranked report of the sweep, worst-to-best ordering handled by
    /// [`SweepReport`].
    pub fn report(
        &self,
        dispatcher: &Dispatcher,
        goal: Goal,
        primary_metric: impl Into<String>,
    ) -> SweepReport {
        SweepReport::new(
            dispatcher.sweep_id(),
            goal,
            primary_metric,
            dispatcher.snapshot(),
        )
    }
}
