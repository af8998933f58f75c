use thiserror::Error;

/// Errors raised when a schedule configuration is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    /// `startTime` or `endTime` is empty
    #[error("{0} is required")]
    MissingTime(&'static str),

    /// A time that is not `HH:MM` within 00:00..=23:59
    #[error("{field} must be HH:MM between 00:00 and 23:59, got '{value}'")]
    InvalidTime { field: &'static str, value: String },

    /// A weekday outside 0..=6
    #[error("days must contain integers between 0 and 6, got {0}")]
    InvalidDay(u8),
}

/// Errors raised by the memory adapters and their factory
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("Unsupported memory provider: {0}")]
    UnsupportedProvider(String),

    #[error("Invalid memory configuration: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    /// A failed adapter call, qualified with the operation name
    #[error("{operation} failed: {message}")]
    Operation {
        operation: &'static str,
        message: String,
    },
}

impl MemoryError {
    pub fn operation(operation: &'static str, message: impl ToString) -> Self {
        MemoryError::Operation {
            operation,
            message: message.to_string(),
        }
    }
}
