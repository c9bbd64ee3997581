//! Shared test utilities for integration tests.
//!
//! The [`LoopbackInvoker`] stands in for the Lambda `Invoke` API: a hand-off
//! runs the next attempt in process, with a fresh execution budget, and
//! reports failures the way Lambda does (a function error plus an error
//! object payload).

#![allow(dead_code)] // These utilities are used by other integration test files

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use lambda_recurse::{
    BoxError, ErrorObject, ExecutionContext, FunctionIdentity, InvocationClient, InvokeResponse,
    RecurseConfig, RecurseSettings, RecursiveRetryController, SharedCompletionCheck,
    SharedExecutionContext,
};
use serde_json::Value;

/// Function name every loopback hand-off targets.
pub const FUNCTION_NAME: &str = "recursive-test-fn";

// =============================================================================
// Execution contexts
// =============================================================================

/// Budget that halves on every read, starting from `start`.
pub struct HalvingContext {
    remaining: AtomicU64,
}

impl HalvingContext {
    pub fn new(start: u64) -> Self {
        Self {
            remaining: AtomicU64::new(start),
        }
    }
}

impl ExecutionContext for HalvingContext {
    fn remaining_time_budget(&self) -> u64 {
        let current = self.remaining.load(Ordering::SeqCst);
        self.remaining.store(current / 2, Ordering::SeqCst);
        current
    }
}

/// Budget that never changes.
pub struct FixedContext(pub u64);

impl ExecutionContext for FixedContext {
    fn remaining_time_budget(&self) -> u64 {
        self.0
    }
}

// =============================================================================
// Loopback invoker
// =============================================================================

/// Builds the execution context of each attempt.
pub type ContextFactory = Box<dyn Fn() -> SharedExecutionContext + Send + Sync>;

/// An invocation client that runs the next attempt in process.
pub struct LoopbackInvoker {
    this: Weak<LoopbackInvoker>,
    validator: SharedCompletionCheck,
    settings: RecurseSettings,
    make_context: ContextFactory,
    invocations: Mutex<Vec<(String, Value)>>,
}

impl LoopbackInvoker {
    /// Creates an invoker whose attempts all share `validator` and `settings`.
    pub fn new(
        validator: SharedCompletionCheck,
        settings: RecurseSettings,
        make_context: impl Fn() -> SharedExecutionContext + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            validator,
            settings,
            make_context: Box::new(make_context),
            invocations: Mutex::new(Vec::new()),
        })
    }

    /// A controller that hands off through this invoker.
    pub fn controller(&self) -> RecursiveRetryController {
        let client = self.this.upgrade().expect("invoker dropped during a test");
        RecursiveRetryController::new(client).with_identity(FunctionIdentity::named(FUNCTION_NAME))
    }

    /// Runs the first attempt of a task with `payload`.
    pub async fn start(&self, payload: Value) -> Result<Value, lambda_recurse::RecurseError> {
        self.controller().run(self.config(payload)).await
    }

    /// Function names and payloads of every hand-off so far.
    pub fn invocations(&self) -> Vec<(String, Value)> {
        self.invocations.lock().unwrap().clone()
    }

    /// The attempt number carried by each hand-off, in order.
    pub fn forwarded_attempts(&self) -> Vec<u64> {
        self.invocations()
            .iter()
            .map(|(_, payload)| payload["_"]["recurseAttempt"].as_u64().unwrap_or(0))
            .collect()
    }

    fn config(&self, payload: Value) -> RecurseConfig {
        RecurseConfig::new()
            .set_shared_context((self.make_context)())
            .set_shared_validator(self.validator.clone())
            .set_payload(payload)
            .set_settings(self.settings)
    }
}

#[async_trait]
impl InvocationClient for LoopbackInvoker {
    async fn invoke(&self, function_name: &str, payload: Vec<u8>) -> Result<InvokeResponse, BoxError> {
        let event: Value = serde_json::from_slice(&payload)?;
        self.invocations
            .lock()
            .unwrap()
            .push((function_name.to_string(), event.clone()));

        let response = match self.controller().run(self.config(event)).await {
            Ok(value) => InvokeResponse::ok(serde_json::to_vec(&value)?),
            Err(e) => InvokeResponse::function_failed(&ErrorObject::from(&e)),
        };
        Ok(response)
    }
}
