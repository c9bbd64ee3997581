//! Error types for lambda-recurse.
//!
//! Every failure of a logical task surfaces as a single [`RecurseError`]. When
//! the failure happened in a later attempt, it travels back through the chain
//! of awaited hand-offs as a Lambda function error and is classified again by
//! its error type, so [`RecurseError::kind`] reports the same [`ErrorKind`]
//! regardless of which attempt raised it.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Boxed error type accepted from user code and invocation clients.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The main error type for lambda-recurse.
#[derive(Debug, Error)]
pub enum RecurseError {
    /// Missing or invalid required input. No polling cycle was started.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message describing the invalid input
        message: String,
    },

    /// The completion check failed while being evaluated.
    #[error("Validator error: {message}")]
    Validator {
        /// Message of the underlying cause
        message: String,
        /// The error returned by the completion check
        #[source]
        source: BoxError,
    },

    /// The time budget ran out and no attempts remain.
    #[error("Max recursion reached: attempt {attempt} of {max_recurse}")]
    MaxRecursion {
        /// The attempt that ran out of time
        attempt: u32,
        /// The configured recursion ceiling
        max_recurse: u32,
    },

    /// Starting the next attempt failed.
    #[error("Hand-off error: {message}")]
    HandOff {
        /// Error message describing the failure
        message: String,
        /// Optional underlying transport error
        #[source]
        source: Option<BoxError>,
    },

    /// The hand-off succeeded but returned nothing usable.
    #[error("No data returned from hand-off to {function_name}: {reason}")]
    NoData {
        /// The function that was invoked
        function_name: String,
        /// What was wrong with the response
        reason: String,
    },

    /// A later attempt failed and reported the failure back as a function error.
    #[error("{message}")]
    Remote {
        /// The error type reported by the later attempt
        error_type: String,
        /// The error message reported by the later attempt
        message: String,
    },
}

impl RecurseError {
    /// Creates a new Configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Wraps an error returned by the completion check.
    pub fn validator(source: BoxError) -> Self {
        Self::Validator {
            message: source.to_string(),
            source,
        }
    }

    /// Creates a new MaxRecursion error.
    pub fn max_recursion(attempt: u32, max_recurse: u32) -> Self {
        Self::MaxRecursion {
            attempt,
            max_recurse,
        }
    }

    /// Creates a new HandOff error without an underlying cause.
    pub fn hand_off(message: impl Into<String>) -> Self {
        Self::HandOff {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new HandOff error wrapping a transport failure.
    pub fn hand_off_caused_by(message: impl Into<String>, source: BoxError) -> Self {
        Self::HandOff {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Creates a new NoData error.
    pub fn no_data(function_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NoData {
            function_name: function_name.into(),
            reason: reason.into(),
        }
    }

    /// Classifies this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::Validator { .. } => ErrorKind::Validator,
            Self::MaxRecursion { .. } => ErrorKind::MaxRecursion,
            Self::HandOff { .. } => ErrorKind::HandOff,
            Self::NoData { .. } => ErrorKind::NoData,
            Self::Remote { error_type, .. } => {
                ErrorKind::from_error_type(error_type).unwrap_or(ErrorKind::HandOff)
            }
        }
    }

    /// The error type reported to the Lambda runtime.
    ///
    /// Remote errors keep the type they arrived with, so an unrecognised type
    /// is passed through unchanged to the next caller up the chain.
    pub fn error_type(&self) -> &str {
        match self {
            Self::Remote { error_type, .. } => error_type,
            other => other.kind().as_str(),
        }
    }

    /// Returns true if this is the expected give-up outcome.
    pub fn is_max_recursion(&self) -> bool {
        self.kind() == ErrorKind::MaxRecursion
    }

    /// Returns true if the failure happened in a later attempt.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }
}

impl From<ErrorObject> for RecurseError {
    fn from(object: ErrorObject) -> Self {
        Self::Remote {
            error_type: object.error_type,
            message: object.error_message,
        }
    }
}

/// Classification of a [`RecurseError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Missing or invalid input
    Configuration,
    /// The completion check failed
    Validator,
    /// Out of time with no attempts left
    MaxRecursion,
    /// The next attempt could not be started
    HandOff,
    /// The next attempt returned nothing usable
    NoData,
}

impl ErrorKind {
    /// All kinds, in declaration order.
    pub const ALL: [ErrorKind; 5] = [
        ErrorKind::Configuration,
        ErrorKind::Validator,
        ErrorKind::MaxRecursion,
        ErrorKind::HandOff,
        ErrorKind::NoData,
    ];

    /// The error type name used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "ConfigurationError",
            ErrorKind::Validator => "ValidatorError",
            ErrorKind::MaxRecursion => "MaxRecursionError",
            ErrorKind::HandOff => "HandOffError",
            ErrorKind::NoData => "NoDataError",
        }
    }

    /// Parses a wire error type name.
    pub fn from_error_type(error_type: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == error_type)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error payload of a failed Lambda invocation.
///
/// Lambda writes this object as the response payload when the invoked
/// function returns an error, and sets the `FunctionError` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorObject {
    /// The error type/name
    #[serde(rename = "errorType", alias = "ErrorType", default)]
    pub error_type: String,
    /// The error message
    #[serde(rename = "errorMessage", alias = "ErrorMessage", default)]
    pub error_message: String,
    /// Optional stack trace
    #[serde(rename = "stackTrace", skip_serializing_if = "Option::is_none", default)]
    pub stack_trace: Option<Vec<String>>,
}

impl ErrorObject {
    /// Creates a new ErrorObject.
    pub fn new(error_type: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            error_message: error_message.into(),
            stack_trace: None,
        }
    }
}

impl From<&RecurseError> for ErrorObject {
    fn from(error: &RecurseError) -> Self {
        match error {
            RecurseError::Remote {
                error_type,
                message,
            } => ErrorObject::new(error_type, message),
            other => ErrorObject::new(other.error_type(), other.to_string()),
        }
    }
}

impl From<RecurseError> for lambda_runtime::Diagnostic {
    fn from(error: RecurseError) -> Self {
        let object = ErrorObject::from(&error);
        lambda_runtime::Diagnostic {
            error_type: object.error_type,
            error_message: object.error_message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error() {
        let error = RecurseError::configuration("validator must be set");
        assert_eq!(error.kind(), ErrorKind::Configuration);
        assert_eq!(error.error_type(), "ConfigurationError");
        assert!(!error.is_max_recursion());
    }

    #[test]
    fn test_validator_error_keeps_source() {
        let error = RecurseError::validator("Quxx".into());
        assert_eq!(error.kind(), ErrorKind::Validator);
        assert!(error.to_string().contains("Quxx"));
        let source = std::error::Error::source(&error).unwrap();
        assert_eq!(source.to_string(), "Quxx");
    }

    #[test]
    fn test_max_recursion_message() {
        let error = RecurseError::max_recursion(3, 3);
        assert!(error.is_max_recursion());
        assert!(error.to_string().starts_with("Max recursion"));
    }

    #[test]
    fn test_error_kind_wire_names_round_trip() {
        for kind in ErrorKind::ALL {
            assert_eq!(ErrorKind::from_error_type(kind.as_str()), Some(kind));
        }
        assert_eq!(ErrorKind::from_error_type("Sandbox.Timedout"), None);
    }

    #[test]
    fn test_remote_error_is_classified_by_type() {
        let error: RecurseError =
            ErrorObject::new("MaxRecursionError", "Max recursion reached: attempt 3 of 3").into();
        assert!(error.is_remote());
        assert!(error.is_max_recursion());
        assert_eq!(error.to_string(), "Max recursion reached: attempt 3 of 3");
    }

    #[test]
    fn test_unknown_remote_error_is_hand_off() {
        let error: RecurseError = ErrorObject::new("Runtime.ExitError", "exit status 1").into();
        assert_eq!(error.kind(), ErrorKind::HandOff);
        assert_eq!(error.error_type(), "Runtime.ExitError");
    }

    #[test]
    fn test_error_object_from_remote_does_not_rewrap_message() {
        let error = RecurseError::Remote {
            error_type: "ValidatorError".to_string(),
            message: "Validator error: Quxx".to_string(),
        };
        let object = ErrorObject::from(&error);
        assert_eq!(object.error_type, "ValidatorError");
        assert_eq!(object.error_message, "Validator error: Quxx");
    }

    #[test]
    fn test_error_object_deserializes_lambda_format() {
        let json = r#"{"errorType":"NoDataError","errorMessage":"nothing","stackTrace":["a","b"]}"#;
        let object: ErrorObject = serde_json::from_str(json).unwrap();
        assert_eq!(object.error_type, "NoDataError");
        assert_eq!(object.stack_trace.as_deref().map(|s| s.len()), Some(2));
    }

    #[test]
    fn test_diagnostic_from_error() {
        let diagnostic: lambda_runtime::Diagnostic =
            RecurseError::no_data("my-fn", "empty payload").into();
        assert_eq!(diagnostic.error_type, "NoDataError");
        assert!(diagnostic.error_message.contains("my-fn"));
        assert!(diagnostic.error_message.contains("empty payload"));
    }

    #[test]
    fn test_serialization_error_type_is_not_a_kind() {
        assert_eq!(ErrorKind::ALL.len(), 5);
        assert_eq!(ErrorKind::from_error_type("SerializationError"), None);
    }
}
