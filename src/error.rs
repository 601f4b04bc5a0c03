use thiserror::Error;

/// Failures raised by the performance aggregator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AggregateError {
    /// A record with non-finite marks or a maximum that is not a positive number.
    #[error("invalid input: marks {marks} out of max_marks {max_marks} (marks must be finite, max_marks > 0)")]
    InvalidInput { marks: f64, max_marks: f64 },
}
