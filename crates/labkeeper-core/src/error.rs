use thiserror::Error;

/// Top-level error type for the Labkeeper system.
///
/// Storage and configuration failures carry a message; the inventory
/// variants carry enough structure for the API layer to pick a status code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LabError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Insufficient quantity: requested {requested}, available {available}")]
    InsufficientQuantity { requested: f64, available: f64 },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl LabError {
    /// Shorthand for a validation failure on a named field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        LabError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<toml::de::Error> for LabError {
    fn from(err: toml::de::Error) -> Self {
        LabError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for LabError {
    fn from(err: toml::ser::Error) -> Self {
        LabError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for LabError {
    fn from(err: serde_json::Error) -> Self {
        LabError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Labkeeper operations.
pub type Result<T> = std::result::Result<T, LabError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let cases: Vec<(LabError, &str)> = vec![
            (
                LabError::Config("bad key".to_string()),
                "Configuration error: bad key",
            ),
            (
                LabError::Storage("disk full".to_string()),
                "Storage error: disk full",
            ),
            (
                LabError::NotFound {
                    entity: "chemical",
                    id: 7,
                },
                "chemical not found: 7",
            ),
            (
                LabError::InsufficientQuantity {
                    requested: 6.0,
                    available: 4.0,
                },
                "Insufficient quantity: requested 6, available 4",
            ),
            (
                LabError::Conflict("already booked".to_string()),
                "Conflict: already booked",
            ),
            (
                LabError::validation("quantity", "must be positive"),
                "Invalid quantity: must be positive",
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: LabError = io_err.into();
        assert!(matches!(err, LabError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let err: std::result::Result<toml::Value, _> = toml::from_str("invalid = [[[");
        let lab_err: LabError = err.unwrap_err().into();
        assert!(matches!(lab_err, LabError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let err: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ nope }");
        let lab_err: LabError = err.unwrap_err().into();
        assert!(matches!(lab_err, LabError::Serialization(_)));
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(42);
            let value = io_result?;
            Ok(value.to_string())
        }

        assert_eq!(inner().unwrap(), "42");
    }
}
