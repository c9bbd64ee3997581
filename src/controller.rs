//! The recursive retry controller.
//!
//! One call to [`RecursiveRetryController::run`] is one attempt of a logical
//! task. The attempt polls the completion check on a fixed cadence until the
//! check passes, the check fails, or the execution budget drops below the
//! configured threshold. Running out of time either fails the task (no
//! attempts left) or hands off to a fresh invocation of the same function and
//! returns whatever that invocation returns.

use std::time::Duration;

use serde_json::Value;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::check::SharedCompletionCheck;
use crate::client::{SharedInvocationClient, MAX_INVOKE_PAYLOAD_SIZE};
use crate::config::RecurseConfig;
use crate::context::SharedExecutionContext;
use crate::error::RecurseError;
use crate::identity::FunctionIdentity;
use crate::payload::{is_truthy, TaskAttemptState};

/// States of one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ControllerState {
    /// Polling the completion check
    Polling,
    /// Waiting for the next attempt to finish
    HandingOff,
    /// Finished with a result
    Succeeded,
    /// Finished with an error
    Failed,
}

impl ControllerState {
    /// Returns true if no further polling or hand-off can happen.
    pub(crate) fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Result of a single polling cycle.
enum Cycle {
    /// Falsy check, time remains
    Continue,
    /// Truthy check
    Done(Value),
    /// The check failed
    Failed(RecurseError),
    /// Falsy check, budget below threshold
    OutOfTime { remaining: u64 },
}

/// A validated attempt, ready to poll.
struct Attempt {
    state: TaskAttemptState,
    context: SharedExecutionContext,
    validator: SharedCompletionCheck,
    status: ControllerState,
}

impl Attempt {
    fn from_config(config: RecurseConfig) -> Result<Self, RecurseError> {
        let settings = config.settings();
        let RecurseConfig {
            context,
            payload,
            validator,
            ..
        } = config;
        let context =
            context.ok_or_else(|| RecurseError::configuration("context must be provided"))?;
        let validator =
            validator.ok_or_else(|| RecurseError::configuration("validator must be provided"))?;
        let state = TaskAttemptState::from_wire(payload.unwrap_or(Value::Null), &settings)?;

        Ok(Self {
            state,
            context,
            validator,
            status: ControllerState::Polling,
        })
    }

    fn transition(&mut self, to: ControllerState) {
        debug_assert!(!self.status.is_terminal(), "transition out of terminal state");
        debug!(
            attempt = self.state.metadata.recurse_attempt,
            from = ?self.status,
            to = ?to,
            "State transition"
        );
        self.status = to;
    }

    async fn poll_once(&self) -> Cycle {
        let value = match self.validator.check(&self.state.user_payload).await {
            Ok(value) => value,
            Err(e) => return Cycle::Failed(RecurseError::validator(e)),
        };
        if is_truthy(&value) {
            return Cycle::Done(value);
        }

        let remaining = self.context.remaining_time_budget();
        debug!(
            attempt = self.state.metadata.recurse_attempt,
            remaining_ms = remaining,
            "Condition not met"
        );
        if remaining < self.state.metadata.max_time_left {
            Cycle::OutOfTime { remaining }
        } else {
            Cycle::Continue
        }
    }
}

/// Drives one attempt of a logical task.
///
/// The invocation client is injected so each controller owns exactly the
/// client it hands off with.
#[derive(Clone)]
pub struct RecursiveRetryController {
    client: SharedInvocationClient,
    identity: FunctionIdentity,
}

impl RecursiveRetryController {
    /// Creates a controller that hands off to the running Lambda function.
    pub fn new(client: SharedInvocationClient) -> Self {
        Self {
            client,
            identity: FunctionIdentity::default(),
        }
    }

    /// Overrides where the hand-off target's name comes from.
    pub fn with_identity(mut self, identity: FunctionIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// The hand-off target resolver.
    pub fn identity(&self) -> &FunctionIdentity {
        &self.identity
    }

    /// Runs one attempt to a terminal outcome.
    ///
    /// # Returns
    ///
    /// The first truthy value of the completion check, or the result of the
    /// attempt this one handed off to.
    ///
    /// # Errors
    ///
    /// - Configuration: missing context or validator, invalid payload or
    ///   tunables. Returned before any polling.
    /// - Validator: the completion check failed.
    /// - MaxRecursion: out of time on the last allowed attempt.
    /// - HandOff / NoData: the hand-off could not be completed or returned
    ///   nothing usable.
    /// - Remote: a later attempt failed.
    pub async fn run(&self, config: RecurseConfig) -> Result<Value, RecurseError> {
        let mut attempt = Attempt::from_config(config)?;
        let metadata = attempt.state.metadata;
        info!(
            attempt = metadata.recurse_attempt,
            max_recurse = metadata.max_recurse,
            interval_ms = metadata.interval,
            max_time_left_ms = metadata.max_time_left,
            "Recursion attempt started"
        );

        let mut ticker = interval(Duration::from_millis(metadata.interval));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; the first check runs one
        // interval after start.
        ticker.tick().await;

        let remaining = loop {
            ticker.tick().await;
            match attempt.poll_once().await {
                Cycle::Continue => continue,
                Cycle::Done(value) => {
                    drop(ticker);
                    attempt.transition(ControllerState::Succeeded);
                    info!(attempt = metadata.recurse_attempt, "Condition met");
                    return Ok(value);
                }
                Cycle::Failed(e) => {
                    drop(ticker);
                    attempt.transition(ControllerState::Failed);
                    error!(attempt = metadata.recurse_attempt, error = %e, "Validator failed");
                    return Err(e);
                }
                Cycle::OutOfTime { remaining } => break remaining,
            }
        };
        drop(ticker);

        info!(
            attempt = metadata.recurse_attempt,
            remaining_ms = remaining,
            "Execution environment out of time"
        );

        if metadata.is_last_attempt() {
            attempt.transition(ControllerState::Failed);
            warn!(
                attempt = metadata.recurse_attempt,
                max_recurse = metadata.max_recurse,
                "Max recursion level reached, failing"
            );
            return Err(RecurseError::max_recursion(
                metadata.recurse_attempt,
                metadata.max_recurse,
            ));
        }

        attempt.transition(ControllerState::HandingOff);
        let result = self.hand_off(&attempt.state).await;
        match &result {
            Ok(_) => attempt.transition(ControllerState::Succeeded),
            Err(e) => {
                attempt.transition(ControllerState::Failed);
                error!(attempt = metadata.recurse_attempt, error = %e, "Hand-off failed");
            }
        }
        result
    }

    async fn hand_off(&self, state: &TaskAttemptState) -> Result<Value, RecurseError> {
        let next = state.next_attempt();
        let function_name = self.identity.resolve()?;
        let payload = next.to_bytes()?;
        if payload.len() > MAX_INVOKE_PAYLOAD_SIZE {
            return Err(RecurseError::hand_off(format!(
                "forwarded payload is {} bytes, exceeding the {} byte invoke limit",
                payload.len(),
                MAX_INVOKE_PAYLOAD_SIZE
            )));
        }

        info!(
            function_name = %function_name,
            next_attempt = next.metadata.recurse_attempt,
            "Handing off to next attempt"
        );

        let response = self
            .client
            .invoke(&function_name, payload)
            .await
            .map_err(|e| {
                RecurseError::hand_off_caused_by(
                    format!("failed to invoke {}: {}", function_name, e),
                    e,
                )
            })?;
        response.into_result(&function_name)
    }
}

/// Runs one attempt of a logical task with `client`.
///
/// Shorthand for `RecursiveRetryController::new(client).run(config)`.
pub async fn recurse(
    client: SharedInvocationClient,
    config: RecurseConfig,
) -> Result<Value, RecurseError> {
    RecursiveRetryController::new(client).run(config).await
}
