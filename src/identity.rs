//! Resolution of the function a hand-off targets.
//!
//! A hand-off invokes the function that is currently running. Its name is read
//! from the host environment at hand-off time rather than supplied by the
//! caller, which is what makes the invocation a self-invocation.

use crate::error::RecurseError;

/// Environment variable the Lambda runtime sets to the running function's name.
pub const FUNCTION_NAME_ENV: &str = "AWS_LAMBDA_FUNCTION_NAME";

/// Where the target of a hand-off comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionIdentity {
    /// Read the named environment variable when a hand-off happens
    Environment(String),
    /// Always hand off to this function name or ARN
    Named(String),
}

impl Default for FunctionIdentity {
    fn default() -> Self {
        Self::Environment(FUNCTION_NAME_ENV.to_string())
    }
}

impl FunctionIdentity {
    /// Targets a fixed function name or ARN.
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// Resolves the function name to invoke.
    ///
    /// # Errors
    ///
    /// Returns a HandOff error if the environment variable is unset or empty.
    pub fn resolve(&self) -> Result<String, RecurseError> {
        match self {
            Self::Named(name) => Ok(name.clone()),
            Self::Environment(var) => match std::env::var(var) {
                Ok(name) if !name.trim().is_empty() => Ok(name),
                _ => Err(RecurseError::hand_off(format!(
                    "cannot determine own function name: {} is not set",
                    var
                ))),
            },
        }
    }
}
