//! Lazy Cartesian-product enumeration of the search space.

use tracing::debug;

use hs_types::{GridPoint, ParameterValue};

use crate::space::{ParameterKind, SearchSpace};
use crate::strategy::SweepStrategy;

/// Lazy iterator over every grid point of a search space.
///
/// Points are produced in a fixed deterministic order: the first-declared
/// parameter varies slowest (odometer style, last axis ticking fastest).
/// Two iterators built from the same space yield identical sequences, so
/// run numbering is reproducible.  Continuous dimensions are discretized
/// into `float_steps` evenly spaced values (log-spaced for log-uniform).
#[derive(Debug, Clone)]
pub struct GridPoints {
    axes: Vec<(String, Vec<ParameterValue>)>,
    indices: Vec<usize>,
    remaining: usize,
}

impl GridPoints {
    pub fn new(space: &SearchSpace, float_steps: usize) -> Self {
        let axes: Vec<(String, Vec<ParameterValue>)> = space
            .parameters
            .iter()
            .map(|param| (param.name.clone(), Self::axis_values(&param.kind, float_steps)))
            .collect();

        let remaining = axes
            .iter()
            .map(|(_, values)| values.len())
            .try_fold(1usize, |acc, n| acc.checked_mul(n))
            .unwrap_or(0);

        debug!(axes = axes.len(), points = remaining, "grid enumerated");

        let indices = vec![0; axes.len()];
        Self {
            axes,
            indices,
            remaining,
        }
    }

    fn axis_values(kind: &ParameterKind, float_steps: usize) -> Vec<ParameterValue> {
        match kind {
            ParameterKind::Choice { values } => values
                .iter()
                .map(|v| ParameterValue::Json(v.clone()))
                .collect(),
            ParameterKind::IntRange { low, high } => {
                (*low..=*high).map(ParameterValue::Int).collect()
            }
            ParameterKind::FloatRange { low, high } => {
                let steps = float_steps.max(2);
                (0..steps)
                    .map(|i| {
                        let t = i as f64 / (steps - 1) as f64;
                        ParameterValue::Float(low + t * (high - low))
                    })
                    .collect()
            }
            ParameterKind::LogUniform { low, high } => {
                let steps = float_steps.max(2);
                let log_low = low.ln();
                let log_high = high.ln();
                (0..steps)
                    .map(|i| {
                        let t = i as f64 / (steps - 1) as f64;
                        ParameterValue::Float((log_low + t * (log_high - log_low)).exp())
                    })
                    .collect()
            }
        }
    }

    fn current(&self) -> GridPoint {
        self.axes
            .iter()
            .zip(&self.indices)
            .map(|((name, values), &i)| (name.clone(), values[i].clone()))
            .collect()
    }

    /// Advance the odometer: last axis ticks fastest.
    fn advance(&mut self) {
        for pos in (0..self.indices.len()).rev() {
            self.indices[pos] += 1;
            if self.indices[pos] < self.axes[pos].1.len() {
                return;
            }
            self.indices[pos] = 0;
        }
    }
}

impl Iterator for GridPoints {
    type Item = GridPoint;

    fn next(&mut self) -> Option<GridPoint> {
        if self.remaining == 0 {
            return None;
        }
        let point = self.current();
        self.advance();
        self.remaining -= 1;
        Some(point)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for GridPoints {}

/// Exhaustive grid search: suggests grid points in generation order until
/// the grid is spent.
#[derive(Debug, Clone)]
pub struct GridSearch {
    points: GridPoints,
}

impl GridSearch {
    pub fn new(space: &SearchSpace, float_steps: usize) -> Self {
        Self {
            points: GridPoints::new(space, float_steps),
        }
    }

    /// Grid points not yet suggested.
    pub fn remaining(&self) -> usize {
        self.points.len()
    }
}

impl SweepStrategy for GridSearch {
    fn suggest(&mut self, count: usize) -> Vec<GridPoint> {
        self.points.by_ref().take(count).collect()
    }

    fn name(&self) -> &str {
        "grid"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection_space() -> SearchSpace {
        SearchSpace::new()
            .add_choice(
                "learning_rate",
                vec![
                    serde_json::json!(0.0005),
                    serde_json::json!(0.005),
                    serde_json::json!(0.02),
                ],
            )
            .add_choice(
                "min_size",
                vec![serde_json::json!(600), serde_json::json!(800)],
            )
    }

    #[test]
    fn yields_exactly_the_cartesian_product() {
        let points: Vec<GridPoint> = GridPoints::new(&detection_space(), 5).collect();
        assert_eq!(points.len(), 6);

        // No duplicates.
        for (i, a) in points.iter().enumerate() {
            for b in &points[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn order_is_deterministic_across_invocations() {
        let space = detection_space();
        let first: Vec<GridPoint> = GridPoints::new(&space, 5).collect();
        let second: Vec<GridPoint> = GridPoints::new(&space, 5).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn first_declared_parameter_varies_slowest() {
        let space = SearchSpace::new().add_int("a", 0, 1).add_int("b", 0, 2);
        let points: Vec<GridPoint> = GridPoints::new(&space, 5).collect();
        let pairs: Vec<(i64, i64)> = points
            .iter()
            .map(|p| {
                let a = match p["a"] {
                    ParameterValue::Int(v) => v,
                    _ => unreachable!(),
                };
                let b = match p["b"] {
                    ParameterValue::Int(v) => v,
                    _ => unreachable!(),
                };
                (a, b)
            })
            .collect();
        assert_eq!(
            pairs,
            vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]
        );
    }

    #[test]
    fn exact_size_tracks_consumption() {
        let mut points = GridPoints::new(&detection_space(), 5);
        assert_eq!(points.len(), 6);
        points.next();
        points.next();
        assert_eq!(points.len(), 4);
    }

    #[test]
    fn empty_space_yields_single_empty_point() {
        let mut points = GridPoints::new(&SearchSpace::new(), 5);
        assert_eq!(points.len(), 1);
        assert_eq!(points.next(), Some(GridPoint::new()));
        assert_eq!(points.next(), None);
    }

    #[test]
    fn empty_axis_yields_nothing() {
        let space = SearchSpace::new().add_choice("x", vec![]);
        let mut points = GridPoints::new(&space, 5);
        assert_eq!(points.len(), 0);
        assert_eq!(points.next(), None);
    }

    #[test]
    fn inverted_int_range_agrees_with_grid_size() {
        let space = SearchSpace::new().add_int("batch_size", 4, 1);
        let mut points = GridPoints::new(&space, 5);
        assert_eq!(points.len(), space.grid_size().unwrap());
        assert_eq!(points.next(), None);
    }

    #[test]
    fn continuous_axes_use_float_steps() {
        let space = SearchSpace::new().add_float("momentum", 0.0, 1.0);
        let points: Vec<GridPoint> = GridPoints::new(&space, 3).collect();
        let values: Vec<f64> = points
            .iter()
            .map(|p| match p["momentum"] {
                ParameterValue::Float(v) => v,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(values, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn log_uniform_endpoints_are_exact_in_log_space() {
        let space = SearchSpace::new().add_log_uniform("learning_rate", 1e-4, 1e-1);
        let points: Vec<GridPoint> = GridPoints::new(&space, 4).collect();
        let first = match points.first().unwrap()["learning_rate"] {
            ParameterValue::Float(v) => v,
            _ => unreachable!(),
        };
        let last = match points.last().unwrap()["learning_rate"] {
            ParameterValue::Float(v) => v,
            _ => unreachable!(),
        };
        assert!((first - 1e-4).abs() < 1e-9);
        assert!((last - 1e-1).abs() < 1e-6);
    }

    #[test]
    fn grid_search_suggests_in_batches_until_spent() {
        let space = SearchSpace::new().add_int("x", 1, 5);
        let mut gs = GridSearch::new(&space, 5);
        assert_eq!(gs.remaining(), 5);

        let first = gs.suggest(3);
        assert_eq!(first.len(), 3);
        let second = gs.suggest(10);
        assert_eq!(second.len(), 2);
        assert!(gs.suggest(1).is_empty());
    }
}
