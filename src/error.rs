//! Error types for fraudlab

use thiserror::Error;

/// Result type alias for fraudlab operations
pub type Result<T> = std::result::Result<T, FraudlabError>;

/// Main error type for the fraudlab crate
#[derive(Error, Debug)]
pub enum FraudlabError {
    #[error("Data error: {0}")]
    DataError(String),

    /// A column is missing, unexpected, or of the wrong kind
    #[error("Schema mismatch on column '{column}': {reason}")]
    SchemaMismatch { column: String, reason: String },

    /// A stratification class is too small to appear on both sides of a split
    #[error("Degenerate split: class '{class}' has {count} row(s), too few to place in both subsets")]
    DegenerateSplit { class: String, count: usize },

    /// A categorical level absent at fit time, under the strict unseen policy
    #[error("Unseen category '{value}' in column '{column}'")]
    UnseenCategory { column: String, value: String },

    #[error("Preprocessing error: {0}")]
    PreprocessingError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Tuning error: {0}")]
    TuningError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Thread pool error: {0}")]
    ThreadPoolError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl FraudlabError {
    pub(crate) fn invalid_parameter(
        name: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        FraudlabError::InvalidParameter {
            name: name.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn schema(column: impl Into<String>, reason: impl Into<String>) -> Self {
        FraudlabError::SchemaMismatch {
            column: column.into(),
            reason: reason.into(),
        }
    }
}

impl From<polars::error::PolarsError> for FraudlabError {
    fn from(err: polars::error::PolarsError) -> Self {
        FraudlabError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for FraudlabError {
    fn from(err: serde_json::Error) -> Self {
        FraudlabError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for FraudlabError {
    fn from(err: bincode::Error) -> Self {
        FraudlabError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for FraudlabError {
    fn from(err: ndarray::ShapeError) -> Self {
        FraudlabError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FraudlabError::DataError("test error".to_string());
        assert_eq!(err.to_string(), "Data error: test error");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: FraudlabError = io_err.into();
        assert!(matches!(err, FraudlabError::IoError(_)));
    }

    #[test]
    fn test_taxonomy_messages() {
        let err = FraudlabError::DegenerateSplit { class: "fraud".into(), count: 1 };
        assert!(err.to_string().contains("'fraud' has 1 row"));

        let err = FraudlabError::schema("amount", "missing");
        assert_eq!(err.to_string(), "Schema mismatch on column 'amount': missing");

        let err = FraudlabError::UnseenCategory { column: "type".into(), value: "WIRE".into() };
        assert!(err.to_string().contains("WIRE"));
    }
}
