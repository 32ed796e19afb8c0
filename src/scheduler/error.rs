//! Error types for the scheduler module

use std::fmt;

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Scheduler-specific errors
#[derive(Debug)]
pub enum SchedulerError {
    /// The authoritative tail line of a publication ledger could not be parsed.
    /// Fatal for the planning pass: defaulting to "publish now" would silently
    /// bypass the rate limit.
    LedgerParse {
        line: String,
        reason: String,
    },

    /// Channel directory layout could not be created or accessed
    ChannelSetup {
        channel: String,
        reason: String,
    },

    /// Invalid upload policy value
    InvalidPolicy {
        field: String,
        reason: String,
    },

    /// IO error
    IoError {
        operation: String,
        reason: String,
    },
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LedgerParse { line, reason } => {
                write!(f, "Malformed ledger line '{}': {}", line, reason)
            }
            Self::ChannelSetup { channel, reason } => {
                write!(f, "Channel '{}' setup failed: {}", channel, reason)
            }
            Self::InvalidPolicy { field, reason } => {
                write!(f, "Invalid policy value for '{}': {}", field, reason)
            }
            Self::IoError { operation, reason } => {
                write!(f, "IO error during '{}': {}", operation, reason)
            }
        }
    }
}

impl std::error::Error for SchedulerError {}

impl From<std::io::Error> for SchedulerError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError {
            operation: "unknown".to_string(),
            reason: err.to_string(),
        }
    }
}

impl SchedulerError {
    /// Create a ledger parse error
    pub fn ledger_parse(line: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::LedgerParse {
            line: line.into(),
            reason: reason.into(),
        }
    }

    /// Create a channel setup error
    pub fn channel_setup(channel: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ChannelSetup {
            channel: channel.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid policy error
    pub fn invalid_policy(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPolicy {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an IO error with context
    pub fn io_error(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::IoError {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Check if the error is recoverable (the next coordinator pass may succeed)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::IoError { .. })
    }
}
