use datafusion::error::DataFusionError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AggregateError>;

/// Reasons an event table is rejected. Every check runs before any buffer is
/// written, so a failed call leaves its inputs as they were.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregateError {
    #[error("{times} timestamps given for {actions} actions")]
    LengthMismatch { times: usize, actions: usize },

    #[error("{required} distinct timestamps do not fit into {capacity} buckets")]
    OutputCapacityExceeded { required: usize, capacity: usize },

    #[error("timestamp at index {index} is lower than its predecessor or NaN")]
    UnsortedInput { index: usize },

    #[error("running total overflows at index {index}")]
    CumulativeOverflow { index: usize },

    #[error("session {index} ends before it starts or has a non-finite bound")]
    InvalidSession { index: usize },
}

impl AggregateError {
    /// Negative status returned by [`crate::ffi::eventtable_aggregate`].
    pub fn code(&self) -> i32 {
        match self {
            AggregateError::OutputCapacityExceeded { .. } => -2,
            AggregateError::UnsortedInput { .. } => -3,
            AggregateError::CumulativeOverflow { .. } => -4,
            AggregateError::LengthMismatch { .. } => -5,
            AggregateError::InvalidSession { .. } => -6,
        }
    }
}

impl From<AggregateError> for DataFusionError {
    fn from(e: AggregateError) -> Self {
        DataFusionError::External(Box::new(e))
    }
}
