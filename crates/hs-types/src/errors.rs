use thiserror::Error;

/// Main error type for the HyperSweep system
#[derive(Error, Debug)]
pub enum HsError {
    #[error("Submission error: {0}")]
    Submission(#[from] SubmissionError),

    #[error("Aggregation error: {0}")]
    Aggregation(#[from] AggregationError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Errors raised while submitting runs to the execution service.
///
/// A submission failure is not fatal to the sweep: the affected run is
/// marked Failed with the cause recorded and the remaining grid points
/// keep going.
#[derive(Error, Debug)]
pub enum SubmissionError {
    #[error("Execution service unavailable: {message}")]
    ServiceUnavailable { message: String },

    #[error("Compute resources exhausted: {message}")]
    ResourceExhausted { message: String },

    #[error("Submission rejected: {reason}")]
    Rejected { reason: String },

    #[error("Rate limited: retry after {retry_after_ms} ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Unknown job handle: {handle}")]
    UnknownHandle { handle: String },
}

/// Errors raised while selecting the best run from a finished sweep.
#[derive(Error, Debug)]
pub enum AggregationError {
    #[error("No completed runs: all {failed} submitted runs failed")]
    NoCompletedRuns { failed: usize },

    #[error("Run {run_id} completed without reporting metric '{metric}'")]
    MetricMissing { run_id: String, metric: String },

    #[error("Sweep has no submitted runs to aggregate")]
    EmptySweep,
}

/// Result type alias for HyperSweep operations
pub type HsResult<T> = Result<T, HsError>;

/// Helper trait for converting string errors
pub trait IntoHsError {
    fn into_hs_error(self) -> HsError;
}

impl IntoHsError for String {
    fn into_hs_error(self) -> HsError {
        HsError::Internal(self)
    }
}

impl IntoHsError for &str {
    fn into_hs_error(self) -> HsError {
        HsError::Internal(self.to_string())
    }
}

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        HsError::Validation(format!($($arg)*))
    };
}

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        HsError::Internal(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        HsError::Config(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = SubmissionError::RateLimited {
            retry_after_ms: 1500,
        };

        assert!(error.to_string().contains("Rate limited"));
        assert!(error.to_string().contains("1500"));
    }

    #[test]
    fn test_error_conversion() {
        let submission_error = SubmissionError::Rejected {
            reason: "test".to_string(),
        };
        let hs_error: HsError = submission_error.into();

        match hs_error {
            HsError::Submission(_) => (),
            _ => panic!("Expected Submission error"),
        }
    }

    #[test]
    fn test_aggregation_error_is_fatal_shape() {
        let error = AggregationError::NoCompletedRuns { failed: 4 };
        assert!(error.to_string().contains("all 4 submitted runs failed"));
    }

    #[test]
    fn test_macros() {
        let _validation_err = validation_error!("Invalid value: {}", 42);
        let _internal_err = internal_error!("Something went wrong");
        let _config_err = config_error!("Missing required field: {}", "primary_metric");
    }
}
