//! Ordered hyperparameter search space.

use serde::{Deserialize, Serialize};

/// A single parameter dimension in the search space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    /// Hyperparameter name as the training job expects it (e.g.
    /// "learning_rate").
    pub name: String,
    /// The kind of search range.
    pub kind: ParameterKind,
}

/// Describes how a parameter is sampled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterKind {
    /// Explicit ordered candidate list — the grid-search case.
    Choice { values: Vec<serde_json::Value> },
    /// Integer range [low, high] inclusive.
    IntRange { low: i64, high: i64 },
    /// Continuous uniform range [low, high].
    FloatRange { low: f64, high: f64 },
    /// Log-uniform range (sampled in log-space then exponentiated).
    LogUniform { low: f64, high: f64 },
}

/// The full search space: an ordered list of parameter definitions.
///
/// Declaration order is significant — grid enumeration varies the
/// first-declared parameter slowest, so run numbering is reproducible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    pub parameters: Vec<ParameterDef>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self {
            parameters: Vec::new(),
        }
    }

    pub fn add_choice(mut self, name: impl Into<String>, values: Vec<serde_json::Value>) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            kind: ParameterKind::Choice { values },
        });
        self
    }

    pub fn add_int(mut self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            kind: ParameterKind::IntRange { low, high },
        });
        self
    }

    pub fn add_float(mut self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            kind: ParameterKind::FloatRange { low, high },
        });
        self
    }

    pub fn add_log_uniform(mut self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            kind: ParameterKind::LogUniform { low, high },
        });
        self
    }

    /// Total number of grid points (returns `None` if any parameter is
    /// continuous without a natural grid).
    pub fn grid_size(&self) -> Option<usize> {
        let mut total: usize = 1;
        for param in &self.parameters {
            let dim_size = match &param.kind {
                ParameterKind::Choice { values } => values.len(),
                ParameterKind::IntRange { low, high } => (high - low + 1).max(0) as usize,
                // Continuous dimensions need explicit step count — not grid-able by default.
                _ => return None,
            };
            total = total.checked_mul(dim_size)?;
        }
        Some(total)
    }
}

impl Default for SearchSpace {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_size_multiplies_discrete_cardinalities() {
        let space = SearchSpace::new()
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
            );
        assert_eq!(space.grid_size(), Some(6));
    }

    #[test]
    fn grid_size_none_for_continuous() {
        let space = SearchSpace::new().add_float("momentum", 0.8, 0.99);
        assert_eq!(space.grid_size(), None);
    }

    #[test]
    fn int_range_is_inclusive() {
        let space = SearchSpace::new().add_int("batch_size", 1, 4);
        assert_eq!(space.grid_size(), Some(4));
    }

    #[test]
    fn inverted_int_range_is_empty() {
        // An inverted range is an empty axis, not a wrapped-around count.
        let space = SearchSpace::new().add_int("batch_size", 4, 1);
        assert_eq!(space.grid_size(), Some(0));

        let space = SearchSpace::new()
            .add_int("batch_size", 4, 1)
            .add_choice("min_size", vec![serde_json::json!(600)]);
        assert_eq!(space.grid_size(), Some(0));
    }

    #[test]
    fn builder_preserves_declaration_order() {
        let space = SearchSpace::new()
            .add_int("a", 1, 10)
            .add_float("b", 0.0, 1.0)
            .add_log_uniform("c", 0.001, 100.0)
            .add_choice("d", vec![serde_json::json!(true), serde_json::json!(false)]);
        let names: Vec<&str> = space.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
    }
}
