//! Run records and sweep-level result ordering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

use crate::params::GridPoint;

/// Unique run identifier.
pub type RunId = Uuid;

/// Unique sweep identifier.
pub type SweepId = Uuid;

/// Whether we are maximizing or minimizing the primary metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Goal {
    Maximize,
    Minimize,
}

impl Default for Goal {
    fn default() -> Self {
        Self::Maximize
    }
}

/// Lifecycle state of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Handle exists but the job has not been submitted to the execution
    /// service yet (waiting on a concurrency slot).
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    /// Whether the run can still change state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// A single run: one grid point submitted as one training job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: RunId,
    pub sweep_id: SweepId,
    /// Submission order, 0-indexed.  Ties on the primary metric resolve
    /// to the lowest run number.
    pub run_number: usize,
    pub parameters: GridPoint,
    pub status: RunStatus,
    /// Primary metric value, present once the run completes.
    pub metric: Option<f64>,
    /// Full metric map logged by the job, hyperparameter echoes included.
    pub metrics: std::collections::HashMap<String, f64>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Handle assigned by the execution service, once submitted.
    pub job_handle: Option<String>,
    pub error: Option<String>,
}

impl RunRecord {
    pub fn new(sweep_id: SweepId, run_number: usize, parameters: GridPoint) -> Self {
        Self {
            id: Uuid::new_v4(),
            sweep_id,
            run_number,
            parameters,
            status: RunStatus::Queued,
            metric: None,
            metrics: std::collections::HashMap::new(),
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            job_handle: None,
            error: None,
        }
    }

    pub fn mark_running(&mut self, job_handle: impl Into<String>) {
        self.status = RunStatus::Running;
        self.started_at = Some(Utc::now());
        self.job_handle = Some(job_handle.into());
    }

    pub fn mark_completed(&mut self, metric: f64, metrics: std::collections::HashMap<String, f64>) {
        self.status = RunStatus::Completed;
        self.finished_at = Some(Utc::now());
        self.metric = Some(metric);
        self.metrics = metrics;
    }

    pub fn mark_failed(&mut self, cause: String) {
        self.status = RunStatus::Failed;
        self.finished_at = Some(Utc::now());
        self.error = Some(cause);
    }

    pub fn mark_cancelled(&mut self) {
        self.status = RunStatus::Cancelled;
        self.finished_at = Some(Utc::now());
    }
}

/// The finished sweep, ranked for inspection.
///
/// Completed runs come first, ordered best-to-worst by the primary metric
/// for the configured goal with ties broken by submission order.  Runs
/// without a usable metric (Failed, Cancelled) follow, in submission
/// order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    pub sweep_id: SweepId,
    pub goal: Goal,
    pub primary_metric: String,
    pub runs: Vec<RunRecord>,
}

impl SweepReport {
    pub fn new(
        sweep_id: SweepId,
        goal: Goal,
        primary_metric: impl Into<String>,
        mut runs: Vec<RunRecord>,
    ) -> Self {
        runs.sort_by(|a, b| Self::rank(goal, a, b));
        Self {
            sweep_id,
            goal,
            primary_metric: primary_metric.into(),
            runs,
        }
    }

    /// The best completed run, if any completed.
    pub fn best(&self) -> Option<&RunRecord> {
        self.runs
            .first()
            .filter(|r| r.status == RunStatus::Completed && r.metric.is_some())
    }

    fn rank(goal: Goal, a: &RunRecord, b: &RunRecord) -> Ordering {
        match (a.metric, b.metric) {
            (Some(ma), Some(mb)) => {
                let by_metric = match goal {
                    Goal::Maximize => mb.partial_cmp(&ma),
                    Goal::Minimize => ma.partial_cmp(&mb),
                };
                by_metric
                    .unwrap_or(Ordering::Equal)
                    .then(a.run_number.cmp(&b.run_number))
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.run_number.cmp(&b.run_number),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParameterValue;
    use std::collections::HashMap;

    fn record(run_number: usize, metric: Option<f64>) -> RunRecord {
        let mut r = RunRecord::new(Uuid::new_v4(), run_number, HashMap::new());
        match metric {
            Some(m) => r.mark_completed(m, HashMap::new()),
            None => r.mark_failed("training crashed".into()),
        }
        r
    }

    #[test]
    fn run_lifecycle() {
        let mut params = HashMap::new();
        params.insert("learning_rate".into(), ParameterValue::Float(0.02));

        let mut run = RunRecord::new(Uuid::new_v4(), 0, params);
        assert_eq!(run.status, RunStatus::Queued);
        assert!(!run.status.is_terminal());

        run.mark_running("job-17");
        assert_eq!(run.status, RunStatus::Running);
        assert_eq!(run.job_handle.as_deref(), Some("job-17"));

        let mut metrics = HashMap::new();
        metrics.insert("accuracy".into(), 0.88);
        run.mark_completed(0.88, metrics);
        assert!(run.status.is_terminal());
        assert_eq!(run.metric, Some(0.88));
        assert!(run.finished_at.is_some());
    }

    #[test]
    fn run_failure_records_cause() {
        let mut run = RunRecord::new(Uuid::new_v4(), 3, HashMap::new());
        run.mark_failed("out of GPU memory".into());
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.error.as_deref(), Some("out of GPU memory"));
        assert!(run.metric.is_none());
    }

    #[test]
    fn report_sorts_descending_for_maximize() {
        let runs = vec![
            record(0, Some(0.47)),
            record(1, Some(0.89)),
            record(2, Some(0.74)),
        ];
        let report = SweepReport::new(Uuid::new_v4(), Goal::Maximize, "accuracy", runs);
        let metrics: Vec<f64> = report.runs.iter().filter_map(|r| r.metric).collect();
        assert_eq!(metrics, vec![0.89, 0.74, 0.47]);
        assert_eq!(report.best().unwrap().metric, Some(0.89));
    }

    #[test]
    fn report_sorts_ascending_for_minimize() {
        let runs = vec![record(0, Some(0.3)), record(1, Some(0.1)), record(2, Some(0.2))];
        let report = SweepReport::new(Uuid::new_v4(), Goal::Minimize, "loss", runs);
        let metrics: Vec<f64> = report.runs.iter().filter_map(|r| r.metric).collect();
        assert_eq!(metrics, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn failed_runs_order_last_by_submission() {
        let runs = vec![
            record(0, None),
            record(1, Some(0.5)),
            record(2, None),
            record(3, Some(0.6)),
        ];
        let report = SweepReport::new(Uuid::new_v4(), Goal::Maximize, "accuracy", runs);
        let order: Vec<(usize, Option<f64>)> = report
            .runs
            .iter()
            .map(|r| (r.run_number, r.metric))
            .collect();
        assert_eq!(
            order,
            vec![(3, Some(0.6)), (1, Some(0.5)), (0, None), (2, None)]
        );
    }

    #[test]
    fn metric_tie_prefers_earlier_submission() {
        let runs = vec![record(4, Some(0.9)), record(1, Some(0.9))];
        let report = SweepReport::new(Uuid::new_v4(), Goal::Maximize, "accuracy", runs);
        assert_eq!(report.best().unwrap().run_number, 1);
    }

    #[test]
    fn best_is_none_when_nothing_completed() {
        let runs = vec![record(0, None), record(1, None)];
        let report = SweepReport::new(Uuid::new_v4(), Goal::Maximize, "accuracy", runs);
        assert!(report.best().is_none());
    }
}
