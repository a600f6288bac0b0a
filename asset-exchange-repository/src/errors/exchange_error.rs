//! Exchange error types.
//!
//! Every failure surfaced by the exchange layer falls into one of three
//! categories: the caller supplied a bad parameter, the caller is not
//! allowed to perform the request, or the metadata server failed. Errors
//! are propagated unchanged; nothing is retried or suppressed.

use thiserror::Error;

/// Result type used throughout the exchange layer.
pub type Result<T> = std::result::Result<T, ExchangeError>;

/// Category of an [`ExchangeError`], for callers that translate failures
/// into transport-level responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidParameter,
    NotAuthorized,
    PropertyServer,
}

/// Errors from exchange handler and collaborator operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExchangeError {
    /// A parameter was missing, blank, malformed or referred to an unknown
    /// element.
    #[error("Invalid parameter {parameter}: {message}")]
    InvalidParameter { parameter: String, message: String },

    /// The caller may not perform the requested operation.
    #[error("User {user_id} is not authorized: {message}")]
    NotAuthorized { user_id: String, message: String },

    /// The metadata server could not complete the request.
    #[error("Property server error: {0}")]
    PropertyServer(String),
}

impl ExchangeError {
    /// Create an invalid parameter error.
    pub fn invalid_parameter(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create a not authorized error.
    pub fn not_authorized(user_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotAuthorized {
            user_id: user_id.into(),
            message: message.into(),
        }
    }

    /// Create a property server error.
    pub fn property_server(msg: impl Into<String>) -> Self {
        Self::PropertyServer(msg.into())
    }

    /// Create the error returned when a GUID does not identify a visible
    /// element of the expected type.
    pub fn unknown_guid(parameter: &str, guid: &str, type_name: &str) -> Self {
        Self::invalid_parameter(
            parameter,
            format!("{} is not the unique identifier of a known {}", guid, type_name),
        )
    }

    /// The category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidParameter { .. } => ErrorKind::InvalidParameter,
            Self::NotAuthorized { .. } => ErrorKind::NotAuthorized,
            Self::PropertyServer(_) => ErrorKind::PropertyServer,
        }
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        Self::PropertyServer(format!("Unable to map element properties: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind() {
        assert_eq!(
            ExchangeError::invalid_parameter("userId", "blank").kind(),
            ErrorKind::InvalidParameter
        );
        assert_eq!(
            ExchangeError::not_authorized("garygeeke", "no access").kind(),
            ErrorKind::NotAuthorized
        );
        assert_eq!(
            ExchangeError::property_server("repository offline").kind(),
            ErrorKind::PropertyServer
        );
    }

    #[test]
    fn test_display() {
        let err = ExchangeError::unknown_guid("connectionGUID", "abc", "Connection");
        assert_eq!(
            err.to_string(),
            "Invalid parameter connectionGUID: abc is not the unique identifier of a known Connection"
        );
    }

    #[test]
    fn test_from_serde_error() {
        let serde_err = serde_json::from_str::<u32>("not a number").unwrap_err();
        let err: ExchangeError = serde_err.into();
        assert_eq!(err.kind(), ErrorKind::PropertyServer);
    }
}
