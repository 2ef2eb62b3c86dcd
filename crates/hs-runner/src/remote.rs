//! Job descriptors handed to the execution service.
//!
//! A [`JobSpec`] is the submission payload: the training entry point, the
//! argument mapping (fixed trainer arguments merged with one grid point),
//! the compute target to run on, and the runtime environment the worker
//! needs.  The backend adapter converts this descriptor into whatever its
//! service's submission API expects.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use hs_types::{GridPoint, ParameterValue};

/// Reference to a compute resource on the execution service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputeTarget {
    /// Service-side cluster name (e.g. "gpu-cluster").
    pub name: String,
    /// Upper bound on nodes the service may scale this target to.
    pub max_nodes: usize,
}

impl Default for ComputeTarget {
    fn default() -> Self {
        Self {
            name: "gpu-cluster".to_string(),
            max_nodes: 4,
        }
    }
}

/// Runtime environment for training workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeEnv {
    /// Packages to install on workers.
    pub packages: Vec<String>,
    /// Working directory (uploaded to the service).
    pub working_dir: Option<String>,
    /// Environment variables.
    pub env_vars: HashMap<String, String>,
}

/// Resource requirements for a single worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerResources {
    /// Number of CPUs per worker (fractional ok).
    pub num_cpus: f64,
    /// Number of GPUs per worker (0 = no GPU).
    pub num_gpus: f64,
    /// Memory in bytes (0 = no limit).
    pub memory_bytes: u64,
    /// Custom resource requirements.
    pub custom: HashMap<String, f64>,
}

impl Default for WorkerResources {
    fn default() -> Self {
        Self {
            num_cpus: 1.0,
            num_gpus: 1.0,
            memory_bytes: 0,
            custom: HashMap::new(),
        }
    }
}

/// Describes a single training job to be submitted to the execution
/// service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Training entry point (e.g. "train.py" or a binary name).
    pub entry_point: String,

    /// Argument mapping passed to the entry point.
    pub arguments: HashMap<String, ParameterValue>,

    /// Compute resource to run on.
    pub compute_target: ComputeTarget,

    /// Runtime / dependency descriptor, if the service needs one.
    pub runtime_env: Option<RuntimeEnv>,

    /// Per-job resource requirements.
    pub resources: WorkerResources,

    /// Early-termination policy, passed through opaquely. The core
    /// defines no policy of its own.
    pub termination_policy: Option<serde_json::Value>,
}

impl JobSpec {
    pub fn new(entry_point: impl Into<String>, compute_target: ComputeTarget) -> Self {
        Self {
            entry_point: entry_point.into(),
            arguments: HashMap::new(),
            compute_target,
            runtime_env: None,
            resources: WorkerResources::default(),
            termination_policy: None,
        }
    }

    pub fn with_arguments(mut self, arguments: HashMap<String, ParameterValue>) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn with_runtime_env(mut self, env: RuntimeEnv) -> Self {
        self.runtime_env = Some(env);
        self
    }

    pub fn with_resources(mut self, resources: WorkerResources) -> Self {
        self.resources = resources;
        self
    }

    /// A copy of this spec with the grid point merged into the fixed
    /// arguments. Grid-point values win on name collision.
    pub fn merged_with(&self, point: &GridPoint) -> Self {
        let mut spec = self.clone();
        for (name, value) in point {
            spec.arguments.insert(name.clone(), value.clone());
        }
        spec
    }
}

/// CLI surface of the object-detection training job, with its defaults.
///
/// The trainer itself is an external collaborator; this struct only
/// produces the fixed argument mapping the sweep submits alongside each
/// grid point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerArgs {
    /// Location of the training data.
    pub data_dir: String,
    /// Number of training epochs.
    pub epochs: u32,
    /// Mini-batch size.
    pub batch_size: u32,
    /// Optimizer learning rate.
    pub learning_rate: f64,
    /// Shorter side the input images are resized to.
    pub min_size: u32,
    /// Detections below this score are discarded.
    pub box_score_thresh: f64,
    /// IoU threshold for non-maximum suppression.
    pub box_nms_thresh: f64,
}

impl Default for TrainerArgs {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            epochs: 13,
            batch_size: 2,
            learning_rate: 0.02,
            min_size: 800,
            box_score_thresh: 0.6,
            box_nms_thresh: 0.5,
        }
    }
}

impl TrainerArgs {
    /// The fixed argument mapping for job submission.  Swept parameters
    /// override these per grid point.
    pub fn to_arguments(&self) -> HashMap<String, ParameterValue> {
        let mut args = HashMap::new();
        args.insert(
            "data_dir".to_string(),
            ParameterValue::Json(serde_json::json!(self.data_dir)),
        );
        args.insert("epochs".to_string(), ParameterValue::Int(self.epochs as i64));
        args.insert(
            "batch_size".to_string(),
            ParameterValue::Int(self.batch_size as i64),
        );
        args.insert(
            "learning_rate".to_string(),
            ParameterValue::Float(self.learning_rate),
        );
        args.insert("min_size".to_string(), ParameterValue::Int(self.min_size as i64));
        args.insert(
            "box_score_thresh".to_string(),
            ParameterValue::Float(self.box_score_thresh),
        );
        args.insert(
            "box_nms_thresh".to_string(),
            ParameterValue::Float(self.box_nms_thresh),
        );
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merged_grid_point_overrides_fixed_arguments() {
        let spec = JobSpec::new("train.py", ComputeTarget::default())
            .with_arguments(TrainerArgs::default().to_arguments());
        assert_eq!(
            spec.arguments.get("learning_rate"),
            Some(&ParameterValue::Float(0.02))
        );

        let mut point = GridPoint::new();
        point.insert("learning_rate".into(), ParameterValue::Float(0.0005));
        point.insert("min_size".into(), ParameterValue::Int(600));

        let merged = spec.merged_with(&point);
        assert_eq!(
            merged.arguments.get("learning_rate"),
            Some(&ParameterValue::Float(0.0005))
        );
        assert_eq!(merged.arguments.get("min_size"), Some(&ParameterValue::Int(600)));
        // Untouched fixed arguments survive.
        assert_eq!(merged.arguments.get("epochs"), Some(&ParameterValue::Int(13)));
        // The template itself is unchanged.
        assert_eq!(
            spec.arguments.get("learning_rate"),
            Some(&ParameterValue::Float(0.02))
        );
    }

    #[test]
    fn trainer_defaults_are_stated() {
        let args = TrainerArgs::default();
        assert_eq!(args.epochs, 13);
        assert_eq!(args.batch_size, 2);
        assert_eq!(args.learning_rate, 0.02);
        assert_eq!(args.min_size, 800);
    }

    #[test]
    fn job_spec_serialization_round_trip() {
        let spec = JobSpec::new("train.py", ComputeTarget::default())
            .with_arguments(TrainerArgs::default().to_arguments())
            .with_runtime_env(RuntimeEnv {
                packages: vec!["torchvision".into()],
                working_dir: Some("/workspace".into()),
                env_vars: HashMap::new(),
            });

        let json = serde_json::to_string(&spec).unwrap();
        let back: JobSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(spec, back);
    }
}
