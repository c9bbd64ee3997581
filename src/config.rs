//! Configuration types for a recursive run.
//!
//! [`RecurseConfig`] carries everything one attempt needs. Its tunables are
//! resolved field by field: metadata forwarded in the incoming payload first,
//! then the explicit value on the config, then the defaults below.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::check::{CompletionCheck, SharedCompletionCheck};
use crate::context::{ExecutionContext, SharedExecutionContext};
use crate::error::RecurseError;
use crate::payload::{IncomingMetadata, RecurseMetadata};

/// Default polling cadence in milliseconds.
pub const DEFAULT_INTERVAL_MS: u64 = 1000;

/// Default recursion ceiling.
pub const DEFAULT_MAX_RECURSE: u32 = 2;

/// Default time-left threshold in milliseconds.
pub const DEFAULT_MAX_TIME_LEFT_MS: u64 = 10_000;

/// Environment variable overriding [`RecurseSettings::interval_ms`].
pub const INTERVAL_ENV: &str = "RECURSE_INTERVAL_MS";

/// Environment variable overriding [`RecurseSettings::max_recurse`].
pub const MAX_RECURSE_ENV: &str = "RECURSE_MAX_RECURSE";

/// Environment variable overriding [`RecurseSettings::max_time_left_ms`].
pub const MAX_TIME_LEFT_ENV: &str = "RECURSE_MAX_TIME_LEFT_MS";

/// Tunables of a recursive run, before forwarded metadata is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecurseSettings {
    /// Polling cadence in milliseconds
    pub interval_ms: u64,
    /// Maximum number of attempts
    pub max_recurse: u32,
    /// Remaining budget, in milliseconds, below which polling stops
    pub max_time_left_ms: u64,
}

impl Default for RecurseSettings {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_INTERVAL_MS,
            max_recurse: DEFAULT_MAX_RECURSE,
            max_time_left_ms: DEFAULT_MAX_TIME_LEFT_MS,
        }
    }
}

impl RecurseSettings {
    /// Reads settings from the process environment, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns a Configuration error if a variable is set but not a number.
    pub fn from_env() -> Result<Self, RecurseError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RecurseError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let settings = Self {
            interval_ms: parse_var(&lookup, INTERVAL_ENV)?.unwrap_or(defaults.interval_ms),
            max_recurse: parse_var(&lookup, MAX_RECURSE_ENV)?.unwrap_or(defaults.max_recurse),
            max_time_left_ms: parse_var(&lookup, MAX_TIME_LEFT_ENV)?
                .unwrap_or(defaults.max_time_left_ms),
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Applies forwarded metadata on top of these settings.
    ///
    /// Forwarded values win. A missing or zero attempt ordinal means this is
    /// the first attempt.
    pub fn resolve(&self, incoming: IncomingMetadata) -> Result<RecurseMetadata, RecurseError> {
        let metadata = RecurseMetadata {
            recurse_attempt: incoming.recurse_attempt.filter(|n| *n > 0).unwrap_or(1),
            interval: incoming.interval.unwrap_or(self.interval_ms),
            max_recurse: incoming.max_recurse.unwrap_or(self.max_recurse),
            max_time_left: incoming.max_time_left.unwrap_or(self.max_time_left_ms),
        };
        if metadata.interval == 0 {
            return Err(RecurseError::configuration("interval must be a positive number"));
        }
        if metadata.max_recurse == 0 {
            return Err(RecurseError::configuration("maxRecurse must be a positive number"));
        }
        Ok(metadata)
    }

    fn validate(&self) -> Result<(), RecurseError> {
        self.resolve(IncomingMetadata::default()).map(|_| ())
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>, RecurseError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            RecurseError::configuration(format!("{} must be a number, got {:?}", key, raw))
        }),
    }
}

/// Everything one attempt of a logical task needs.
///
/// `context` and `validator` are required; the controller rejects a config
/// without them before polling starts.
#[derive(Clone, Default)]
pub struct RecurseConfig {
    /// Source of the remaining execution time budget
    pub context: Option<SharedExecutionContext>,
    /// The incoming event, possibly carrying forwarded metadata
    pub payload: Option<Value>,
    /// The completion check
    pub validator: Option<SharedCompletionCheck>,
    /// Polling cadence override in milliseconds
    pub interval_ms: Option<u64>,
    /// Recursion ceiling override
    pub max_recurse: Option<u32>,
    /// Time-left threshold override in milliseconds
    pub max_time_left_ms: Option<u64>,
}

impl fmt::Debug for RecurseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecurseConfig")
            .field("context", &self.context.is_some())
            .field("payload", &self.payload)
            .field("validator", &self.validator.is_some())
            .field("interval_ms", &self.interval_ms)
            .field("max_recurse", &self.max_recurse)
            .field("max_time_left_ms", &self.max_time_left_ms)
            .finish()
    }
}

impl RecurseConfig {
    /// Creates an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the execution context.
    pub fn set_context(mut self, context: impl ExecutionContext + 'static) -> Self {
        self.context = Some(Arc::new(context));
        self
    }

    /// Sets an already shared execution context.
    pub fn set_shared_context(mut self, context: SharedExecutionContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Sets the incoming event.
    pub fn set_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Sets the completion check.
    pub fn set_validator(mut self, validator: impl CompletionCheck + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Sets an already shared completion check.
    pub fn set_shared_validator(mut self, validator: SharedCompletionCheck) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Sets the polling cadence in milliseconds.
    pub fn set_interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = Some(interval_ms);
        self
    }

    /// Sets the recursion ceiling.
    pub fn set_max_recurse(mut self, max_recurse: u32) -> Self {
        self.max_recurse = Some(max_recurse);
        self
    }

    /// Sets the time-left threshold in milliseconds.
    pub fn set_max_time_left_ms(mut self, max_time_left_ms: u64) -> Self {
        self.max_time_left_ms = Some(max_time_left_ms);
        self
    }

    /// Applies every field of `settings` as an explicit override.
    pub fn set_settings(self, settings: RecurseSettings) -> Self {
        self.set_interval_ms(settings.interval_ms)
            .set_max_recurse(settings.max_recurse)
            .set_max_time_left_ms(settings.max_time_left_ms)
    }

    /// Explicit overrides merged over the defaults.
    pub fn settings(&self) -> RecurseSettings {
        let defaults = RecurseSettings::default();
        RecurseSettings {
            interval_ms: self.interval_ms.unwrap_or(defaults.interval_ms),
            max_recurse: self.max_recurse.unwrap_or(defaults.max_recurse),
            max_time_left_ms: self.max_time_left_ms.unwrap_or(defaults.max_time_left_ms),
        }
    }
}
