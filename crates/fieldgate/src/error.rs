//! Error types for the access gateway.
//!
//! Errors are grouped by the stage that produces them: input validation,
//! query construction and backend execution. Validation and query errors are
//! always raised before any backend call is attempted.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// The primary error type returned by [`AccessGateway::fetch`](crate::gateway::AccessGateway::fetch).
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Untrusted input was malformed or looked like a query operator.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The query referenced something outside the schema allow-list.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// The backing store failed.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Coarse classification of a [`GatewayError`].
///
/// Callers use this to tell "no data" apart from "system fault" without
/// matching on every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// Malformed or operator-like input.
    InvalidInput,
    /// Field outside the schema allow-list.
    UnknownField,
    /// Transient connectivity or timeout failure.
    BackendUnavailable,
    /// Unexpected native response shape or misconfigured backend.
    BackendProtocol,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InvalidInput => "invalid-input",
            ErrorKind::UnknownField => "unknown-field",
            ErrorKind::BackendUnavailable => "backend-unavailable",
            ErrorKind::BackendProtocol => "backend-protocol",
        };
        write!(f, "{}", name)
    }
}

impl GatewayError {
    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::Validation(_) => ErrorKind::InvalidInput,
            GatewayError::Query(_) => ErrorKind::UnknownField,
            GatewayError::Backend(e) if e.is_unavailable() => ErrorKind::BackendUnavailable,
            GatewayError::Backend(_) => ErrorKind::BackendProtocol,
        }
    }

    /// Returns true if the caller may retry the same request later.
    ///
    /// The gateway itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Backend(e) if e.is_retryable())
    }

    /// Returns a message that is safe to show to the caller.
    ///
    /// Input and field errors are described in full. Backend protocol errors
    /// are collapsed to an opaque message so native driver details never
    /// leave the process.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::InvalidInput | ErrorKind::UnknownField => self.to_string(),
            ErrorKind::BackendUnavailable => "backend temporarily unavailable".to_string(),
            ErrorKind::BackendProtocol => "internal backend error".to_string(),
        }
    }
}

/// Errors raised while validating untrusted input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The value was empty.
    #[error("invalid input: value is empty")]
    Empty,

    /// The value was longer than the configured maximum.
    #[error("invalid input: value has {length} characters, maximum is {max}")]
    TooLong { length: usize, max: usize },

    /// The value contained a reserved operator token.
    #[error("invalid input: operator token '{token}' is not allowed")]
    OperatorToken { token: String },

    /// The value looked like a nested query object or array.
    #[error("invalid input: nested query structures are not allowed")]
    NestedObject,

    /// The value contained a character outside the allow-list for its type.
    #[error("invalid input: character {character:?} is not allowed in a {field_type} value")]
    DisallowedCharacter {
        character: char,
        field_type: &'static str,
    },

    /// A numeric value did not fit the supported range.
    #[error("invalid input: {value} is out of range")]
    OutOfRange { value: String },
}

/// Errors raised while building a backend query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The field is not in the schema allow-list.
    #[error("unknown field: {field}")]
    UnknownField { field: String },
}

/// Errors raised by a backend adapter.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The backend could not be reached.
    #[error("backend unavailable: {backend_name}: {message}")]
    Unavailable {
        backend_name: String,
        message: String,
    },

    /// The backend did not answer within the configured time.
    #[error("backend {backend_name} timed out after {timeout_ms}ms during {operation}")]
    Timeout {
        backend_name: String,
        operation: &'static str,
        timeout_ms: u64,
    },

    /// The backend answered with something the adapter cannot interpret.
    #[error("protocol error in {backend_name}: {message}")]
    Protocol {
        backend_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The query needs a capability the backend is not configured for.
    #[error("capability '{capability}' not enabled for {backend_name}")]
    UnsupportedCapability {
        backend_name: String,
        capability: String,
    },

    /// The adapter configuration is invalid.
    #[error("invalid configuration for {backend_name}: {message}")]
    Configuration {
        backend_name: String,
        message: String,
    },
}

impl BackendError {
    /// Creates a protocol error without an underlying source.
    pub fn protocol(backend_name: impl Into<String>, message: impl Into<String>) -> Self {
        BackendError::Protocol {
            backend_name: backend_name.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates an unavailable error.
    pub fn unavailable(backend_name: impl Into<String>, message: impl Into<String>) -> Self {
        BackendError::Unavailable {
            backend_name: backend_name.into(),
            message: message.into(),
        }
    }

    /// Returns true for connectivity failures and timeouts.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            BackendError::Unavailable { .. } | BackendError::Timeout { .. }
        )
    }

    /// Returns true if retrying the same call could succeed.
    pub fn is_retryable(&self) -> bool {
        self.is_unavailable()
    }
}

/// Errors raised while reading a record from its persisted layout.
#[derive(Error, Debug)]
pub enum RecordError {
    /// The document was not a JSON object.
    #[error("record document must be an object, got {found}")]
    NotAnObject { found: &'static str },

    /// The document had neither `id` nor `_id`.
    #[error("record document has no id")]
    MissingId,

    /// The identifier had an unsupported shape.
    #[error("record id must be a string, an integer or an ObjectId, got {found}")]
    InvalidId { found: String },

    /// The `accessPolicy` attribute did not match the policy layout.
    #[error("malformed accessPolicy: {0}")]
    InvalidPolicy(#[source] serde_json::Error),
}

impl RecordError {
    /// Wraps this error as a protocol error of the named backend.
    pub fn into_backend(self, backend_name: &str) -> BackendError {
        BackendError::Protocol {
            backend_name: backend_name.to_string(),
            message: self.to_string(),
            source: Some(Box::new(self)),
        }
    }
}

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Result type alias for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for BackendError {
    fn from(err: rusqlite::Error) -> Self {
        BackendError::Protocol {
            backend_name: "sqlite".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<r2d2::Error> for BackendError {
    fn from(err: r2d2::Error) -> Self {
        BackendError::Unavailable {
            backend_name: "sqlite".to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(feature = "mongodb")]
impl From<mongodb::error::Error> for BackendError {
    fn from(err: mongodb::error::Error) -> Self {
        use mongodb::error::ErrorKind as MongoErrorKind;

        match *err.kind {
            MongoErrorKind::ServerSelection { .. }
            | MongoErrorKind::Io(_)
            | MongoErrorKind::ConnectionPoolCleared { .. }
            | MongoErrorKind::DnsResolve { .. } => BackendError::Unavailable {
                backend_name: "mongodb".to_string(),
                message: err.to_string(),
            },
            _ => BackendError::Protocol {
                backend_name: "mongodb".to_string(),
                message: err.to_string(),
                source: Some(Box::new(err)),
            },
        }
    }
}

#[cfg(feature = "neo4j")]
impl From<neo4rs::Error> for BackendError {
    fn from(err: neo4rs::Error) -> Self {
        match err {
            neo4rs::Error::IOError { .. } | neo4rs::Error::ConnectionError => {
                BackendError::Unavailable {
                    backend_name: "neo4j".to_string(),
                    message: err.to_string(),
                }
            }
            _ => BackendError::Protocol {
                backend_name: "neo4j".to_string(),
                message: err.to_string(),
                source: Some(Box::new(err)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::OperatorToken {
            token: "$ne".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid input: operator token '$ne' is not allowed"
        );
    }

    #[test]
    fn test_error_kind_classification() {
        let err: GatewayError = ValidationError::Empty.into();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err: GatewayError = QueryError::UnknownField {
            field: "password".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::UnknownField);

        let err: GatewayError = BackendError::Timeout {
            backend_name: "sqlite".to_string(),
            operation: "query",
            timeout_ms: 50,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
        assert!(err.is_retryable());

        let err: GatewayError = BackendError::protocol("sqlite", "bad row").into();
        assert_eq!(err.kind(), ErrorKind::BackendProtocol);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_public_message_hides_protocol_details() {
        let err: GatewayError =
            BackendError::protocol("mongodb", "cursor id 7731 not found on shard-02").into();
        let message = err.public_message();
        assert_eq!(message, "internal backend error");
        assert!(!message.contains("shard"));
    }

    #[test]
    fn test_public_message_keeps_input_details() {
        let err: GatewayError = QueryError::UnknownField {
            field: "ssn".to_string(),
        }
        .into();
        assert_eq!(err.public_message(), "unknown field: ssn");
    }

    #[test]
    fn test_unsupported_capability_is_not_retryable() {
        let err = BackendError::UnsupportedCapability {
            backend_name: "sqlite".to_string(),
            capability: "full-table-scan".to_string(),
        };
        assert!(!err.is_unavailable());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::InvalidInput.to_string(), "invalid-input");
        assert_eq!(ErrorKind::BackendProtocol.to_string(), "backend-protocol");
    }
}
