//! Error types for coloc.
//!
//! All errors are strongly typed using thiserror. Validation errors reject
//! malformed input up front, execution errors describe failures while a run
//! is in progress. Every execution error aborts the run: there is no
//! automatic retry anywhere in the pipeline.

use std::path::PathBuf;

use thiserror::Error;

use crate::storage::StorageError;

/// Validation errors that occur while building records or configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Record identifier cannot be empty")]
    EmptyRecordId,

    #[error("Country code '{value}' is not a 3-letter ISO code")]
    InvalidCountryCode {
        value: String,
    },

    #[error("Month {value} is out of range [1, 12]")]
    MonthOutOfRange {
        value: u32,
    },

    #[error("Required field '{field}' is missing")]
    MissingField {
        field: String,
    },

    #[error("Threshold '{name}' must lie in {range}, got {value}")]
    InvalidThreshold {
        name: String,
        range: String,
        value: f64,
    },

    #[error("Match type cannot be empty")]
    EmptyMatchType,

    #[error("Invalid match type order: {reason}")]
    InvalidMatchTypeOrder {
        reason: String,
    },
}

/// Execution errors that occur while a run is in progress.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Source '{source_name}' is unavailable: {message}")]
    SourceUnavailable {
        source_name: String,
        message: String,
    },

    #[error("Storage error: {message}")]
    Storage {
        message: String,
    },

    #[error("Failed to write conflict report to {}: {message}", .path.display())]
    Report {
        path: PathBuf,
        message: String,
    },
}

/// Top-level error type for coloc.
#[derive(Debug, Error)]
pub enum ColocError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Configuration error: {message}")]
    Config {
        message: String,
    },

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl ColocError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a source-unavailable error for an external collaborator.
    #[must_use]
    pub fn source_unavailable(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Execution(ExecutionError::SourceUnavailable {
            source_name: source_name.into(),
            message: message.into(),
        })
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if the error must abort the current run.
    ///
    /// Everything except validation of a single input is fatal.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !self.is_validation()
    }
}

impl From<StorageError> for ColocError {
    fn from(err: StorageError) -> Self {
        Self::Execution(ExecutionError::Storage {
            message: err.to_string(),
        })
    }
}

/// Result type alias for coloc operations.
pub type ColocResult<T> = Result<T, ColocError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_month() {
        let err = ValidationError::MonthOutOfRange { value: 13 };
        let msg = format!("{err}");
        assert!(msg.contains("13"));
        assert!(msg.contains("out of range"));
    }

    #[test]
    fn test_validation_error_country() {
        let err = ValidationError::InvalidCountryCode {
            value: "Germany".to_string(),
        };
        assert!(err.to_string().contains("Germany"));
    }

    #[test]
    fn test_source_unavailable_is_fatal() {
        let err = ColocError::source_unavailable("wikidata", "connection refused");
        assert!(err.is_execution());
        assert!(err.is_fatal());
        let msg = format!("{err}");
        assert!(msg.contains("wikidata"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn test_validation_is_not_fatal() {
        let err: ColocError = ValidationError::EmptyRecordId.into();
        assert!(err.is_validation());
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_storage_error_conversion() {
        let err: ColocError = StorageError::BackendError("poisoned lock: graph".to_string()).into();
        assert!(err.is_execution());
        assert!(err.to_string().contains("poisoned lock"));
    }

    #[test]
    fn test_report_error_display() {
        let err = ExecutionError::Report {
            path: PathBuf::from("/tmp/conflicts.json"),
            message: "permission denied".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("/tmp/conflicts.json"));
        assert!(msg.contains("permission denied"));
    }

    #[test]
    fn test_config_error() {
        let err = ColocError::config("bad json");
        assert!(err.is_fatal());
        assert!(err.to_string().contains("bad json"));
    }
}
