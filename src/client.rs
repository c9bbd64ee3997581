//! Invocation client used to start the next attempt.
//!
//! This module defines the `InvocationClient` trait and a Lambda-based
//! implementation that calls the `Invoke` API with the `RequestResponse`
//! invocation type, so a hand-off returns only once the next attempt has
//! produced its result.

use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_lambda::error::DisplayErrorContext;
use aws_sdk_lambda::primitives::Blob;
use aws_sdk_lambda::types::InvocationType;
use serde_json::Value;

use crate::error::{BoxError, ErrorObject, RecurseError};

/// Maximum payload size of a synchronous Lambda invocation (6MB).
pub const MAX_INVOKE_PAYLOAD_SIZE: usize = 6 * 1024 * 1024;

/// Trait for starting another invocation of a function.
///
/// This trait abstracts the platform call, allowing for different
/// implementations (e.g., Lambda client, in-process loopback for testing).
#[async_trait]
pub trait InvocationClient: Send + Sync {
    /// Invokes `function_name` with `payload` and waits for its response.
    ///
    /// # Returns
    ///
    /// The raw response on success, or the transport/platform error. A
    /// function that ran and failed is a successful call whose response
    /// carries `function_error`.
    async fn invoke(&self, function_name: &str, payload: Vec<u8>) -> Result<InvokeResponse, BoxError>;
}

/// Type alias for a shared InvocationClient.
pub type SharedInvocationClient = Arc<dyn InvocationClient>;

/// Response of a synchronous invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeResponse {
    /// HTTP status code of the invocation
    pub status_code: i32,
    /// The response payload, if any
    pub payload: Option<Vec<u8>>,
    /// Set when the invoked function returned an error
    pub function_error: Option<String>,
}

impl InvokeResponse {
    /// A successful response carrying `payload`.
    pub fn ok(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            status_code: 200,
            payload: Some(payload.into()),
            function_error: None,
        }
    }

    /// A successful response without payload.
    pub fn empty() -> Self {
        Self {
            status_code: 200,
            payload: None,
            function_error: None,
        }
    }

    /// A response reporting that the invoked function failed.
    pub fn function_failed(error: &ErrorObject) -> Self {
        Self {
            status_code: 200,
            payload: serde_json::to_vec(error).ok(),
            function_error: Some("Unhandled".to_string()),
        }
    }

    /// Decodes the response into the result of the invoked attempt.
    ///
    /// - A status outside 2xx is a HandOff error: the next attempt never ran.
    /// - A function error becomes a [`RecurseError::Remote`] built from the
    ///   Lambda error object in the payload.
    /// - A missing, empty, `null` or non-JSON payload is a NoData error.
    pub fn into_result(self, function_name: &str) -> Result<Value, RecurseError> {
        if !(200..300).contains(&self.status_code) {
            return Err(RecurseError::hand_off(format!(
                "invoke of {} returned status {}",
                function_name, self.status_code
            )));
        }

        let payload = match self.payload {
            Some(bytes) if !bytes.is_empty() => bytes,
            _ if self.function_error.is_some() => {
                return Err(RecurseError::Remote {
                    error_type: self.function_error.unwrap_or_default(),
                    message: format!("{} failed without an error payload", function_name),
                })
            }
            _ => return Err(RecurseError::no_data(function_name, "empty response payload")),
        };

        if let Some(function_error) = self.function_error {
            let object = serde_json::from_slice::<ErrorObject>(&payload)
                .ok()
                .filter(|object| !object.error_type.is_empty())
                .unwrap_or_else(|| {
                    ErrorObject::new(function_error, String::from_utf8_lossy(&payload))
                });
            return Err(object.into());
        }

        let value: Value = serde_json::from_slice(&payload).map_err(|e| {
            RecurseError::no_data(function_name, format!("response is not valid JSON: {}", e))
        })?;
        if value.is_null() {
            return Err(RecurseError::no_data(function_name, "response payload is null"));
        }
        Ok(value)
    }
}

/// Lambda-based implementation of the InvocationClient.
#[derive(Debug, Clone)]
pub struct LambdaInvocationClient {
    client: aws_sdk_lambda::Client,
}

impl LambdaInvocationClient {
    /// Creates a new client from an AWS SDK Lambda client.
    pub fn new(client: aws_sdk_lambda::Client) -> Self {
        Self { client }
    }

    /// Creates a new client from the ambient AWS configuration.
    pub async fn from_env() -> Self {
        let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::from_aws_config(&aws_config)
    }

    /// Creates a new client from AWS SDK config.
    pub fn from_aws_config(aws_config: &aws_config::SdkConfig) -> Self {
        Self::new(aws_sdk_lambda::Client::new(aws_config))
    }
}

#[async_trait]
impl InvocationClient for LambdaInvocationClient {
    async fn invoke(&self, function_name: &str, payload: Vec<u8>) -> Result<InvokeResponse, BoxError> {
        let output = self
            .client
            .invoke()
            .function_name(function_name)
            .invocation_type(InvocationType::RequestResponse)
            .payload(Blob::new(payload))
            .send()
            .await
            .map_err(|e| -> BoxError {
                format!("Invoke {} failed: {}", function_name, DisplayErrorContext(&e)).into()
            })?;

        Ok(InvokeResponse {
            status_code: output.status_code(),
            payload: output.payload().map(|blob| blob.as_ref().to_vec()),
            function_error: output.function_error().map(str::to_string),
        })
    }
}

/// A mock implementation of InvocationClient for testing.
#[cfg(test)]
pub struct MockInvocationClient {
    responses: std::sync::Mutex<Vec<Result<InvokeResponse, String>>>,
    calls: std::sync::Mutex<Vec<(String, Value)>>,
}

#[cfg(test)]
impl MockInvocationClient {
    pub fn new() -> Self {
        Self {
            responses: std::sync::Mutex::new(Vec::new()),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn with_response(self, response: Result<InvokeResponse, String>) -> Self {
        self.responses.lock().unwrap().push(response);
        self
    }

    /// Function names and decoded payloads of every call so far.
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl InvocationClient for MockInvocationClient {
    async fn invoke(&self, function_name: &str, payload: Vec<u8>) -> Result<InvokeResponse, BoxError> {
        let decoded = serde_json::from_slice(&payload).unwrap_or(Value::Null);
        self.calls
            .lock()
            .unwrap()
            .push((function_name.to_string(), decoded));
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(InvokeResponse::empty())
        } else {
            responses.remove(0).map_err(BoxError::from)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_into_result_json_payload() {
        let response = InvokeResponse::ok(br#"{"success":true}"#.to_vec());
        assert_eq!(response.into_result("fn").unwrap(), json!({"success": true}));
    }

    #[test]
    fn test_into_result_missing_payload_is_no_data() {
        let err = InvokeResponse::empty().into_result("fn").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoData);
    }

    #[test]
    fn test_into_result_empty_payload_is_no_data() {
        let err = InvokeResponse::ok(Vec::new()).into_result("fn").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoData);
    }

    #[test]
    fn test_into_result_null_payload_is_no_data() {
        let err = InvokeResponse::ok(b"null".to_vec()).into_result("fn").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoData);
    }

    #[test]
    fn test_into_result_invalid_json_is_no_data() {
        let err = InvokeResponse::ok(b"<html>502</html>".to_vec())
            .into_result("fn")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoData);
        assert_eq!(err.error_type(), "NoDataError");
        assert!(err.to_string().contains("not valid JSON"));
    }

    #[test]
    fn test_into_result_function_error_is_remote() {
        let object = ErrorObject::new("MaxRecursionError", "Max recursion reached: attempt 3 of 3");
        let err = InvokeResponse::function_failed(&object)
            .into_result("fn")
            .unwrap_err();
        assert!(err.is_remote());
        assert_eq!(err.kind(), ErrorKind::MaxRecursion);
        assert_eq!(err.to_string(), "Max recursion reached: attempt 3 of 3");
    }

    #[test]
    fn test_into_result_function_error_with_foreign_payload() {
        let response = InvokeResponse {
            status_code: 200,
            payload: Some(b"Task timed out after 900.00 seconds".to_vec()),
            function_error: Some("Unhandled".to_string()),
        };
        let err = response.into_result("fn").unwrap_err();
        assert_eq!(err.error_type(), "Unhandled");
        assert_eq!(err.kind(), ErrorKind::HandOff);
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_into_result_non_success_status_is_hand_off() {
        let response = InvokeResponse {
            status_code: 502,
            payload: Some(br#"{"success":true}"#.to_vec()),
            function_error: None,
        };
        let err = response.into_result("fn").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::HandOff);
        assert!(!err.is_remote());
        assert!(err.to_string().contains("502"));
    }

    #[test]
    fn test_into_result_function_error_without_payload() {
        let response = InvokeResponse {
            status_code: 200,
            payload: None,
            function_error: Some("Unhandled".to_string()),
        };
        let err = response.into_result("fn").unwrap_err();
        assert!(err.is_remote());
        assert_eq!(err.kind(), ErrorKind::HandOff);
    }

    #[tokio::test]
    async fn test_mock_client_records_calls() {
        let client = MockInvocationClient::new()
            .with_response(Ok(InvokeResponse::ok(b"1".to_vec())))
            .with_response(Err("connection reset".to_string()));

        let first = client.invoke("fn", br#"{"a":1}"#.to_vec()).await.unwrap();
        assert_eq!(first.payload, Some(b"1".to_vec()));
        let second = client.invoke("fn", b"{}".to_vec()).await.unwrap_err();
        assert_eq!(second.to_string(), "connection reset");

        let calls = client.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1, json!({"a": 1}));
    }
}
