//! Sweep configuration, lifecycle tracking, and end-to-end orchestration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use hs_search::{GridSearch, RandomSearch, SearchSpace, SweepStrategy};
use hs_types::{Goal, HsError, HsResult, RunRecord, RunStatus, SweepId, SweepReport};

use crate::aggregate::{Aggregator, CancelToken, PollPolicy};
use crate::backend::ExecutionBackend;
use crate::dispatch::Dispatcher;
use crate::remote::{ComputeTarget, JobSpec, RuntimeEnv, TrainerArgs, WorkerResources};

/// Top-level configuration for one hyperparameter sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    pub id: SweepId,
    pub name: String,
    pub description: String,

    /// The parameter search space.
    pub search_space: SearchSpace,

    /// Which sweep strategy to use: "grid" or "random".
    pub strategy: String,

    /// Number of steps per continuous dimension for grid search.
    pub float_steps: usize,

    /// Maximum number of runs to submit.
    pub max_runs: usize,

    /// How many runs may be in Running state at once.
    pub max_concurrent_runs: usize,

    /// Metric name the training job logs and the sweep ranks by.
    pub primary_metric: String,

    /// Direction of optimization.
    pub goal: Goal,

    /// Training entry point submitted with every job.
    pub entry_point: String,

    /// Fixed trainer arguments; swept parameters override per grid point.
    pub trainer: TrainerArgs,

    /// Compute resource the jobs run on.
    pub compute_target: ComputeTarget,

    /// Runtime / dependency descriptor for the workers, if needed.
    pub runtime_env: Option<RuntimeEnv>,

    /// Per-job resource requirements.
    pub resources: WorkerResources,

    /// Completion-poll backoff bounds.
    pub poll_initial_ms: u64,
    pub poll_max_ms: u64,

    pub created_at: DateTime<Utc>,
}

impl SweepConfig {
    pub fn new(name: impl Into<String>, search_space: SearchSpace) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            search_space,
            strategy: "grid".to_string(),
            float_steps: 5,
            max_runs: 100,
            max_concurrent_runs: 4,
            primary_metric: "accuracy".to_string(),
            goal: Goal::Maximize,
            entry_point: "train.py".to_string(),
            trainer: TrainerArgs::default(),
            compute_target: ComputeTarget::default(),
            runtime_env: None,
            resources: WorkerResources::default(),
            poll_initial_ms: 200,
            poll_max_ms: 5_000,
            created_at: Utc::now(),
        }
    }

    pub fn with_strategy(mut self, strategy: &str) -> Self {
        self.strategy = strategy.to_string();
        self
    }

    pub fn with_max_runs(mut self, n: usize) -> Self {
        self.max_runs = n;
        self
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.max_concurrent_runs = n;
        self
    }

    pub fn with_goal(mut self, metric: &str, goal: Goal) -> Self {
        self.primary_metric = metric.to_string();
        self.goal = goal;
        self
    }

    pub fn with_trainer(mut self, trainer: TrainerArgs) -> Self {
        self.trainer = trainer;
        self
    }

    pub fn with_compute_target(mut self, target: ComputeTarget) -> Self {
        self.compute_target = target;
        self
    }

    pub fn with_poll_interval(mut self, initial_ms: u64, max_ms: u64) -> Self {
        self.poll_initial_ms = initial_ms;
        self.poll_max_ms = max_ms;
        self
    }

    pub fn validate(&self) -> HsResult<()> {
        if self.max_concurrent_runs == 0 {
            return Err(hs_types::validation_error!(
                "max_concurrent_runs must be at least 1"
            ));
        }
        if self.max_runs == 0 {
            return Err(hs_types::validation_error!("max_runs must be at least 1"));
        }
        if self.primary_metric.is_empty() {
            return Err(hs_types::validation_error!("primary_metric must be named"));
        }
        if !matches!(self.strategy.as_str(), "grid" | "random") {
            return Err(hs_types::config_error!(
                "unknown sweep strategy: {}",
                self.strategy
            ));
        }
        Ok(())
    }
}

/// Lifecycle state for a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SweepState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Aggregate status of a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepStatus {
    pub id: SweepId,
    pub state: SweepState,
    pub runs_completed: usize,
    pub runs_failed: usize,
    pub runs_cancelled: usize,
    pub runs_running: usize,
    pub best_run: Option<RunRecord>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl SweepStatus {
    pub fn new(id: SweepId) -> Self {
        Self {
            id,
            state: SweepState::Pending,
            runs_completed: 0,
            runs_failed: 0,
            runs_cancelled: 0,
            runs_running: 0,
            best_run: None,
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    pub fn mark_running(&mut self) {
        self.state = SweepState::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_completed(&mut self) {
        self.state = SweepState::Completed;
        self.finished_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, error: String) {
        self.state = SweepState::Failed;
        self.finished_at = Some(Utc::now());
        self.error = Some(error);
    }

    pub fn mark_cancelled(&mut self) {
        self.state = SweepState::Cancelled;
        self.finished_at = Some(Utc::now());
    }

    /// Update the best run if `record` improves on the current best.
    /// Runs without a real-valued metric (absent or NaN) never displace
    /// anything.
    pub fn update_best(&mut self, record: &RunRecord, goal: Goal) {
        let metric = match record.metric {
            Some(m) if !m.is_nan() => m,
            _ => return,
        };
        let improves = match &self.best_run {
            None => true,
            Some(current) => match current.metric {
                Some(c) if !c.is_nan() => match goal {
                    Goal::Maximize => metric > c,
                    Goal::Minimize => metric < c,
                },
                _ => true,
            },
        };
        if improves {
            self.best_run = Some(record.clone());
        }
    }

    fn sync_counts(&mut self, records: &[RunRecord]) {
        self.runs_completed = records
            .iter()
            .filter(|r| r.status == RunStatus::Completed)
            .count();
        self.runs_failed = records
            .iter()
            .filter(|r| r.status == RunStatus::Failed)
            .count();
        self.runs_cancelled = records
            .iter()
            .filter(|r| r.status == RunStatus::Cancelled)
            .count();
        self.runs_running = records
            .iter()
            .filter(|r| r.status == RunStatus::Running)
            .count();
    }
}

/// One full hyperparameter sweep: generate, dispatch, wait, select.
pub struct Sweep {
    config: SweepConfig,
    dispatcher: Dispatcher,
    aggregator: Aggregator,
    cancel: CancelToken,
    status: SweepStatus,
}

impl Sweep {
    pub fn new(config: SweepConfig) -> HsResult<Self> {
        config.validate()?;

        let mut template = JobSpec::new(config.entry_point.clone(), config.compute_target.clone())
            .with_arguments(config.trainer.to_arguments())
            .with_resources(config.resources.clone());
        if let Some(env) = &config.runtime_env {
            template = template.with_runtime_env(env.clone());
        }

        let dispatcher = Dispatcher::new(
            config.id,
            template,
            config.primary_metric.clone(),
            config.max_concurrent_runs,
        )?;
        let aggregator = Aggregator::new(PollPolicy {
            initial: Duration::from_millis(config.poll_initial_ms),
            max: Duration::from_millis(config.poll_max_ms),
        });

        let status = SweepStatus::new(config.id);
        Ok(Self {
            config,
            dispatcher,
            aggregator,
            cancel: CancelToken::new(),
            status,
        })
    }

    /// Token for requesting best-effort cancellation of the whole sweep
    /// from another task.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn status(&self) -> &SweepStatus {
        &self.status
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    fn build_strategy(&self) -> HsResult<Box<dyn SweepStrategy>> {
        match self.config.strategy.as_str() {
            "grid" => Ok(Box::new(GridSearch::new(
                &self.config.search_space,
                self.config.float_steps,
            ))),
            "random" => Ok(Box::new(RandomSearch::new(self.config.search_space.clone()))),
            other => Err(hs_types::config_error!("unknown sweep strategy: {other}")),
        }
    }

    /// Run the sweep to completion against `backend` and return the
    /// ranked report.
    ///
    /// Fails with an aggregation error when no run completes (unless the
    /// sweep was cancelled, in which case the partial report is returned).
    pub async fn run(&mut self, backend: &mut dyn ExecutionBackend) -> HsResult<SweepReport> {
        self.status.mark_running();

        let mut strategy = self.build_strategy()?;
        let points = strategy.suggest(self.config.max_runs);
        info!(
            sweep_id = %self.config.id,
            name = %self.config.name,
            strategy = strategy.name(),
            runs = points.len(),
            concurrency = self.config.max_concurrent_runs,
            "sweep started"
        );
        self.dispatcher.enqueue(points);

        let wait = self
            .aggregator
            .wait(&self.dispatcher, backend, &self.cancel)
            .await;
        self.status.sync_counts(&self.dispatcher.snapshot());
        wait?;

        let report = self.aggregator.report(
            &self.dispatcher,
            self.config.goal,
            self.config.primary_metric.clone(),
        );

        if self.cancel.is_requested() {
            warn!(sweep_id = %self.config.id, "sweep cancelled");
            self.status.mark_cancelled();
            if let Some(best) = report.best() {
                self.status.update_best(best, self.config.goal);
            }
            return Ok(report);
        }

        match self
            .aggregator
            .select_best(&self.dispatcher, self.config.goal)
        {
            Ok(best) => {
                info!(
                    sweep_id = %self.config.id,
                    run_number = best.run_number,
                    metric = best.metric.unwrap_or(f64::NAN),
                    "sweep completed"
                );
                self.status.update_best(&best, self.config.goal);
                self.status.mark_completed();
                Ok(report)
            }
            Err(e) => {
                self.status.mark_failed(e.to_string());
                Err(e)
            }
        }
    }
}
