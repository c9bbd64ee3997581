//! The completion check polled by the controller.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::BoxError;
use crate::payload::UserPayload;

/// Decides whether a logical task is finished.
///
/// The check only ever sees the caller's payload. A truthy value (see
/// [`is_truthy`](crate::payload::is_truthy)) ends the task successfully and
/// becomes its result; a falsy value keeps the controller polling; an error
/// fails the task.
#[async_trait]
pub trait CompletionCheck: Send + Sync {
    /// Evaluates the condition once.
    async fn check(&self, payload: &UserPayload) -> Result<Value, BoxError>;
}

/// Type alias for a shared CompletionCheck.
pub type SharedCompletionCheck = Arc<dyn CompletionCheck>;

/// A [`CompletionCheck`] backed by an async closure. Created by [`check_fn`].
#[derive(Clone, Copy, Debug)]
pub struct CheckFn<F> {
    f: F,
}

/// Wraps an async closure as a [`CompletionCheck`].
///
/// The closure receives its own copy of the caller payload on every call.
///
/// # Example
///
/// ```rust
/// use lambda_recurse::{check_fn, BoxError};
/// use serde_json::Value;
///
/// let check = check_fn(|payload| async move {
///     let ready = payload.get("ready").cloned().unwrap_or(Value::Null);
///     Ok::<_, BoxError>(ready)
/// });
/// ```
pub fn check_fn<F, Fut>(f: F) -> CheckFn<F>
where
    F: Fn(UserPayload) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, BoxError>> + Send,
{
    CheckFn { f }
}

#[async_trait]
impl<F, Fut> CompletionCheck for CheckFn<F>
where
    F: Fn(UserPayload) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, BoxError>> + Send,
{
    async fn check(&self, payload: &UserPayload) -> Result<Value, BoxError> {
        (self.f)(payload.clone()).await
    }
}
