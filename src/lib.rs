//! # lambda-recurse
//!
//! Keep long-running work alive past the AWS Lambda execution time limit.
//!
//! ## Overview
//!
//! A Lambda invocation is killed when its time budget runs out. This crate
//! polls a caller-supplied completion check on a fixed cadence and, when the
//! remaining budget drops below a threshold, hands control to a fresh
//! invocation of the same function, forwarding the caller's payload and its
//! own bookkeeping. The chain continues until the check passes or a recursion
//! ceiling is reached. Each hand-off waits for the next invocation's response,
//! so the first invocation resolves with the final result (or error) no matter
//! which invocation produced it.
//!
//! ### Key Features
//!
//! - **Time-bounded polling**: the check runs every `interval` ms, one cycle at a time.
//! - **Self-invocation**: the hand-off target is the running function, read from
//!   `AWS_LAMBDA_FUNCTION_NAME`.
//! - **Hidden bookkeeping**: the attempt counter and tunables travel under a
//!   reserved payload key that the check never sees.
//! - **Transparent results**: success values and classified errors flow back
//!   through every hand-off to the original caller.
//!
//! ## Getting Started
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use lambda_recurse::{
//!     check_fn, BoxError, LambdaInvocationClient, RecurseConfig, RecursiveRetryController,
//! };
//! use lambda_runtime::{service_fn, Diagnostic, LambdaEvent};
//! use serde_json::{json, Value};
//!
//! async fn handler(
//!     controller: &RecursiveRetryController,
//!     event: LambdaEvent<Value>,
//! ) -> Result<Value, Diagnostic> {
//!     let (payload, context) = event.into_parts();
//!     let config = RecurseConfig::new()
//!         .set_context(context)
//!         .set_payload(payload)
//!         .set_validator(check_fn(|payload| async move {
//!             // Replace with a real readiness probe.
//!             let done = payload.get("done").cloned().unwrap_or(Value::Null);
//!             Ok::<_, BoxError>(done)
//!         }))
//!         .set_interval_ms(1000)
//!         .set_max_recurse(3)
//!         .set_max_time_left_ms(10_000);
//!
//!     let result = controller.run(config).await?;
//!     Ok(json!({ "statusCode": 200, "body": result }))
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), lambda_runtime::Error> {
//!     lambda_runtime::tracing::init_default_subscriber();
//!
//!     let client = LambdaInvocationClient::from_env().await;
//!     let controller = Arc::new(RecursiveRetryController::new(Arc::new(client)));
//!
//!     lambda_runtime::run(service_fn(move |event| {
//!         let controller = Arc::clone(&controller);
//!         async move { handler(&controller, event).await }
//!     }))
//!     .await
//! }
//! ```
//!
//! For the common case, [`lambda::run`] wires all of the above from a
//! completion-check factory and the `RECURSE_*` environment variables.
//!
//! ## Configuration
//!
//! | Setting | Default | Env var |
//! |---------|---------|---------|
//! | `interval` | 1000 ms | `RECURSE_INTERVAL_MS` |
//! | `maxRecurse` | 2 | `RECURSE_MAX_RECURSE` |
//! | `maxTimeLeft` | 10000 ms | `RECURSE_MAX_TIME_LEFT_MS` |
//!
//! Values forwarded from a previous attempt take precedence over explicit
//! settings, which take precedence over the defaults.

pub mod check;
pub mod client;
pub mod config;
pub mod context;
pub mod controller;
pub mod error;
pub mod identity;
pub mod lambda;
pub mod payload;

// Re-export main types at crate root
pub use check::{check_fn, CheckFn, CompletionCheck, SharedCompletionCheck};
pub use client::{
    InvocationClient, InvokeResponse, LambdaInvocationClient, SharedInvocationClient,
    MAX_INVOKE_PAYLOAD_SIZE,
};
pub use config::{
    RecurseConfig, RecurseSettings, DEFAULT_INTERVAL_MS, DEFAULT_MAX_RECURSE,
    DEFAULT_MAX_TIME_LEFT_MS,
};
pub use context::{ExecutionContext, SharedExecutionContext};
pub use controller::{recurse, RecursiveRetryController};
pub use error::{BoxError, ErrorKind, ErrorObject, RecurseError};
pub use identity::{FunctionIdentity, FUNCTION_NAME_ENV};
pub use lambda::RecursiveFunction;
pub use payload::{
    is_truthy, RecurseMetadata, TaskAttemptState, UserPayload, METADATA_KEY,
};
