//! Error types for the ASA relay.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure kinds of a relay operation.
///
/// Every outcome of a chat turn or proactive request that is not a usable
/// piece of generated text maps onto one of these variants. The display
/// strings are the messages surfaced to the widget.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatError {
    /// Missing API key or empty message. No outbound call was made.
    #[error("Invalid request")]
    InvalidRequest,

    /// Proactive message requested while no API key is configured.
    #[error("API key is not set.")]
    Unconfigured,

    /// The provider could not be reached (connect error, timeout, broken body).
    #[error("API request failed: {0}")]
    TransportFailure(String),

    /// The provider answered with a non-200 status.
    #[error("HTTP status: {status}")]
    HttpError { status: u16 },

    /// The provider returned a structured `error` object.
    #[error("API Error: {0}")]
    ProviderError(String),

    /// The provider answered 200 but without a usable text part.
    #[error("AI did not return a valid response.")]
    EmptyResponse,
}

impl ChatError {
    /// Creates a TransportFailure error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::TransportFailure(message.into())
    }

    /// Creates a ProviderError error
    pub fn provider(message: impl Into<String>) -> Self {
        Self::ProviderError(message.into())
    }

    /// Short machine-readable name, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::Unconfigured => "unconfigured",
            Self::TransportFailure(_) => "transport_failure",
            Self::HttpError { .. } => "http_error",
            Self::ProviderError(_) => "provider_error",
            Self::EmptyResponse => "empty_response",
        }
    }
}

/// Storage and configuration errors shared by the infrastructure layer.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum AsaError {
    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON"
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AsaError {
    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Check if this is a serialization error
    pub fn is_serialization(&self) -> bool {
        matches!(self, Self::Serialization { .. })
    }
}

impl From<std::io::Error> for AsaError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for AsaError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for AsaError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for AsaError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// A type alias for `Result<T, AsaError>`.
pub type Result<T> = std::result::Result<T, AsaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_messages() {
        assert_eq!(ChatError::InvalidRequest.to_string(), "Invalid request");
        assert_eq!(
            ChatError::HttpError { status: 503 }.to_string(),
            "HTTP status: 503"
        );
        assert_eq!(
            ChatError::provider("quota exceeded").to_string(),
            "API Error: quota exceeded"
        );
        assert_eq!(
            ChatError::EmptyResponse.to_string(),
            "AI did not return a valid response."
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let err: AsaError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, AsaError::Io { .. }));
    }

    #[test]
    fn test_json_error_conversion() {
        let err: AsaError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(err.is_serialization());
    }
}
