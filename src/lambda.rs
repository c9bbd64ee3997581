//! Lambda runtime integration.
//!
//! [`RecursiveFunction`] turns a completion-check factory into a Lambda
//! handler whose every invocation is one attempt of a logical task, and
//! [`run`] serves it with `lambda_runtime`. Hand-offs invoke the same function
//! again, so the whole chain runs inside one deployed function.

use std::fmt;
use std::sync::Arc;

use lambda_runtime::{service_fn, Diagnostic, LambdaEvent};
use serde_json::Value;

use crate::check::CompletionCheck;
use crate::client::LambdaInvocationClient;
use crate::config::{RecurseConfig, RecurseSettings};
use crate::controller::RecursiveRetryController;
use crate::error::RecurseError;

/// A self-invoking Lambda function.
///
/// `make_check` is called once per invocation to build the completion check
/// for that attempt.
pub struct RecursiveFunction<F> {
    controller: RecursiveRetryController,
    settings: RecurseSettings,
    make_check: F,
}

impl<F> fmt::Debug for RecursiveFunction<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecursiveFunction")
            .field("identity", self.controller.identity())
            .field("settings", &self.settings)
            .finish()
    }
}

impl<F, C> RecursiveFunction<F>
where
    F: Fn() -> C + Send + Sync,
    C: CompletionCheck + 'static,
{
    /// Creates a new function with default settings.
    pub fn new(controller: RecursiveRetryController, make_check: F) -> Self {
        Self {
            controller,
            settings: RecurseSettings::default(),
            make_check,
        }
    }

    /// Sets the tunables applied to every attempt started without forwarded
    /// metadata.
    pub fn with_settings(mut self, settings: RecurseSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Handles one invocation.
    pub async fn handle(&self, event: LambdaEvent<Value>) -> Result<Value, RecurseError> {
        let (payload, context) = event.into_parts();
        let config = RecurseConfig::new()
            .set_context(context)
            .set_payload(payload)
            .set_validator((self.make_check)())
            .set_settings(self.settings);
        self.controller.run(config).await
    }
}

/// Serves a self-invoking function on the Lambda runtime.
///
/// Settings come from the `RECURSE_*` environment variables, AWS credentials
/// and region from the default provider chain. Errors are reported to the
/// runtime with their kind as the error type, so an attempt that handed off
/// can classify a failure of the attempt after it.
///
/// # Example
///
/// ```rust,no_run
/// use lambda_recurse::{check_fn, BoxError};
/// use serde_json::json;
///
/// #[tokio::main]
/// async fn main() -> Result<(), lambda_runtime::Error> {
///     lambda_runtime::tracing::init_default_subscriber();
///     lambda_recurse::lambda::run(|| {
///         check_fn(|payload| async move {
///             let ready = payload.contains_key("ready");
///             Ok::<_, BoxError>(if ready { json!({"success": true}) } else { json!(false) })
///         })
///     })
///     .await
/// }
/// ```
pub async fn run<F, C>(make_check: F) -> Result<(), lambda_runtime::Error>
where
    F: Fn() -> C + Send + Sync + 'static,
    C: CompletionCheck + 'static,
{
    let settings = RecurseSettings::from_env()?;
    let client = LambdaInvocationClient::from_env().await;
    let function = Arc::new(
        RecursiveFunction::new(RecursiveRetryController::new(Arc::new(client)), make_check)
            .with_settings(settings),
    );

    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let function = Arc::clone(&function);
        async move { function.handle(event).await.map_err(Diagnostic::from) }
    }))
    .await
}
