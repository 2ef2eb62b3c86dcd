//! Concrete hyperparameter values as they travel between the search
//! strategies, the dispatcher, and the execution service.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A concrete value assigned to a single hyperparameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Float(f64),
    Int(i64),
    Json(serde_json::Value),
}

impl std::fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Float(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Json(v) => write!(f, "{v}"),
        }
    }
}

impl ParameterValue {
    /// Numeric view of the value, when it has one.  Used when echoing
    /// hyperparameters into the logged metric map.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            Self::Json(v) => v.as_f64(),
        }
    }
}

/// One concrete assignment of a value to every parameter name: a single
/// point of the search grid.
pub type GridPoint = HashMap<String, ParameterValue>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats_plain_numbers() {
        assert_eq!(ParameterValue::Float(0.02).to_string(), "0.02");
        assert_eq!(ParameterValue::Int(600).to_string(), "600");
    }

    #[test]
    fn untagged_serialization() {
        let json = serde_json::to_string(&ParameterValue::Float(0.005)).unwrap();
        assert_eq!(json, "0.005");
        let json = serde_json::to_string(&ParameterValue::Int(8)).unwrap();
        assert_eq!(json, "8");
    }

    #[test]
    fn as_f64_covers_all_variants() {
        assert_eq!(ParameterValue::Float(1.5).as_f64(), Some(1.5));
        assert_eq!(ParameterValue::Int(3).as_f64(), Some(3.0));
        assert_eq!(
            ParameterValue::Json(serde_json::json!(2.5)).as_f64(),
            Some(2.5)
        );
        assert_eq!(ParameterValue::Json(serde_json::json!("size")).as_f64(), None);
    }
}
