//! Strategy trait and the random-sampling strategy.

use rand::Rng;
use tracing::debug;

use hs_types::{GridPoint, ParameterValue};

use crate::space::{ParameterKind, SearchSpace};

/// Common trait for all sweep strategies.
pub trait SweepStrategy: Send + Sync {
    /// Generate the next batch of parameter combinations to evaluate.
    fn suggest(&mut self, count: usize) -> Vec<GridPoint>;

    /// Report completed run results so adaptive strategies can learn.
    fn report(&mut self, _params: &GridPoint, _objective: f64) {}

    /// Human-readable strategy name.
    fn name(&self) -> &str;
}

/// Independent random sampling across the search space.
#[derive(Debug, Clone)]
pub struct RandomSearch {
    space: SearchSpace,
}

impl RandomSearch {
    pub fn new(space: SearchSpace) -> Self {
        Self { space }
    }

    fn sample_one(&self) -> GridPoint {
        let mut rng = rand::rng();
        let mut params = GridPoint::new();

        for param in &self.space.parameters {
            let value = match &param.kind {
                ParameterKind::Choice { values } => {
                    let idx = rng.random_range(0..values.len());
                    ParameterValue::Json(values[idx].clone())
                }
                ParameterKind::IntRange { low, high } => {
                    ParameterValue::Int(rng.random_range(*low..=*high))
                }
                ParameterKind::FloatRange { low, high } => {
                    ParameterValue::Float(rng.random_range(*low..=*high))
                }
                ParameterKind::LogUniform { low, high } => {
                    let log_low = low.ln();
                    let log_high = high.ln();
                    let log_val: f64 = rng.random_range(log_low..=log_high);
                    ParameterValue::Float(log_val.exp())
                }
            };
            params.insert(param.name.clone(), value);
        }

        params
    }
}

impl SweepStrategy for RandomSearch {
    fn suggest(&mut self, count: usize) -> Vec<GridPoint> {
        debug!(count, dimensions = self.space.parameters.len(), "sampling random points");
        (0..count).map(|_| self.sample_one()).collect()
    }

    fn name(&self) -> &str {
        "random"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_space() -> SearchSpace {
        SearchSpace::new()
            .add_int("batch_size", 1, 8)
            .add_float("momentum", 0.8, 0.99)
            .add_log_uniform("learning_rate", 1e-5, 1e-1)
    }

    #[test]
    fn random_search_respects_bounds() {
        let mut rs = RandomSearch::new(sample_space());
        let suggestions = rs.suggest(50);
        assert_eq!(suggestions.len(), 50);

        for params in &suggestions {
            match params.get("batch_size") {
                Some(ParameterValue::Int(v)) => assert!(*v >= 1 && *v <= 8),
                other => panic!("unexpected batch_size value: {other:?}"),
            }
            match params.get("momentum") {
                Some(ParameterValue::Float(v)) => assert!(*v >= 0.8 && *v <= 0.99),
                other => panic!("unexpected momentum value: {other:?}"),
            }
            match params.get("learning_rate") {
                Some(ParameterValue::Float(v)) => {
                    assert!(*v >= 1e-5 && *v <= 1e-1, "learning_rate out of bounds: {v}")
                }
                other => panic!("unexpected learning_rate value: {other:?}"),
            }
        }
    }

    #[test]
    fn choice_sampling_stays_in_candidate_set() {
        let space = SearchSpace::new().add_choice(
            "backbone",
            vec![
                serde_json::json!("resnet50"),
                serde_json::json!("mobilenet_v3"),
            ],
        );
        let mut rs = RandomSearch::new(space);
        for params in rs.suggest(30) {
            match params.get("backbone") {
                Some(ParameterValue::Json(v)) => {
                    let s = v.as_str().unwrap();
                    assert!(["resnet50", "mobilenet_v3"].contains(&s));
                }
                other => panic!("unexpected backbone value: {other:?}"),
            }
        }
    }
}
