//! Unified error handling for the screening core.
//!
//! Every fallible operation in the crate returns [`Result`]. Upload-path errors
//! are recorded on the queue item and logged; only storage, capture and local
//! save failures reach the caller.

use thiserror::Error;

/// Unified error type for screening-core operations.
#[derive(Debug, Clone, Error)]
pub enum ScreeningError {
    /// Key/value storage unavailable or a write was rejected
    #[error("Persistence error: {message}")]
    Persistence { message: String },

    /// Stored queue blob could not be encoded or decoded
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Local image referenced by a queue item could not be read
    #[error("Failed to read image '{uri}': {message}")]
    ImageRead { uri: String, message: String },

    /// Upload transport failure (non-2xx status or request error)
    #[error("{}", http_message(.message, .status_code))]
    Http {
        message: String,
        status_code: Option<u16>,
    },

    /// Rendered view could not be captured
    #[error("Capture failed: {message}")]
    Capture { message: String },

    /// Captured image could not be written to the device library
    #[error("Local save failed: {message}")]
    LocalSave { message: String },

    /// Device-motion sensor is not available on this platform
    #[error("Motion sensor unavailable")]
    SensorUnavailable,

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Generic internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

fn http_message(message: &str, status_code: &Option<u16>) -> String {
    match status_code {
        Some(code) => format!("HTTP error ({}): {}", code, message),
        None => format!("HTTP error: {}", message),
    }
}

impl From<serde_json::Error> for ScreeningError {
    fn from(e: serde_json::Error) -> Self {
        ScreeningError::Serialization {
            message: e.to_string(),
        }
    }
}

impl From<std::io::Error> for ScreeningError {
    fn from(e: std::io::Error) -> Self {
        ScreeningError::Persistence {
            message: e.to_string(),
        }
    }
}

#[cfg(feature = "persistence")]
impl From<rusqlite::Error> for ScreeningError {
    fn from(e: rusqlite::Error) -> Self {
        ScreeningError::Persistence {
            message: e.to_string(),
        }
    }
}

impl From<tokio::task::JoinError> for ScreeningError {
    fn from(e: tokio::task::JoinError) -> Self {
        ScreeningError::Internal {
            message: format!("Task join error: {}", e),
        }
    }
}

/// Result type alias for screening-core operations.
pub type Result<T> = std::result::Result<T, ScreeningError>;

/// Extension trait for converting Option to ScreeningError.
pub trait OptionExt<T> {
    /// Convert Option to Result with generic internal error.
    fn ok_or_internal(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_internal(self, message: &str) -> Result<T> {
        self.ok_or_else(|| ScreeningError::Internal {
            message: message.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ScreeningError::ImageRead {
            uri: "file:///tmp/missing.png".to_string(),
            message: "No such file".to_string(),
        };
        assert!(err.to_string().contains("missing.png"));
        assert!(err.to_string().contains("No such file"));
    }

    #[test]
    fn test_http_display_with_and_without_status() {
        let with_status = ScreeningError::Http {
            message: "Bad Gateway".to_string(),
            status_code: Some(502),
        };
        assert_eq!(with_status.to_string(), "HTTP error (502): Bad Gateway");

        let without = ScreeningError::Http {
            message: "connection reset".to_string(),
            status_code: None,
        };
        assert_eq!(without.to_string(), "HTTP error: connection reset");
    }

    #[test]
    fn test_json_error_maps_to_serialization() {
        let err: ScreeningError = serde_json::from_str::<Vec<u32>>("not json")
            .unwrap_err()
            .into();
        assert!(matches!(err, ScreeningError::Serialization { .. }));
    }

    #[test]
    fn test_option_ext() {
        let none: Option<i32> = None;
        let result = none.ok_or_internal("queue not initialised");
        assert!(matches!(result, Err(ScreeningError::Internal { .. })));
    }
}
