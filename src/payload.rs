//! Task attempt state and the forwarded payload wire format.
//!
//! The caller's payload and the controller's bookkeeping are kept apart in
//! [`TaskAttemptState`]. They are only merged when the state is written to the
//! wire for the next attempt, under the reserved [`METADATA_KEY`], and split
//! again as soon as that attempt reads its event.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::RecurseSettings;
use crate::error::RecurseError;

/// Reserved key holding [`RecurseMetadata`] inside a forwarded payload.
pub const METADATA_KEY: &str = "_";

/// The caller-visible part of a payload.
pub type UserPayload = Map<String, Value>;

/// Bookkeeping owned by the controller and forwarded across hand-offs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurseMetadata {
    /// 1-based ordinal of the current attempt
    pub recurse_attempt: u32,
    /// Polling cadence in milliseconds
    pub interval: u64,
    /// Ceiling on `recurse_attempt`
    pub max_recurse: u32,
    /// Remaining budget, in milliseconds, below which polling stops
    pub max_time_left: u64,
}

impl RecurseMetadata {
    /// Metadata for the first attempt of a logical task.
    pub fn first_attempt(settings: &RecurseSettings) -> Self {
        Self {
            recurse_attempt: 1,
            interval: settings.interval_ms,
            max_recurse: settings.max_recurse,
            max_time_left: settings.max_time_left_ms,
        }
    }

    /// Returns true if no further hand-off is allowed.
    pub fn is_last_attempt(&self) -> bool {
        self.recurse_attempt >= self.max_recurse
    }
}

/// Metadata as read from an incoming event. Any field may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IncomingMetadata {
    /// Attempt ordinal, 0 is treated as absent
    pub recurse_attempt: Option<u32>,
    /// Polling cadence in milliseconds
    pub interval: Option<u64>,
    /// Recursion ceiling
    pub max_recurse: Option<u32>,
    /// Time-left threshold in milliseconds
    pub max_time_left: Option<u64>,
}

/// The state of one attempt of a logical task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskAttemptState {
    /// Caller-defined payload, never contains [`METADATA_KEY`]
    pub user_payload: UserPayload,
    /// Controller bookkeeping
    pub metadata: RecurseMetadata,
}

impl TaskAttemptState {
    /// Creates a new state.
    pub fn new(user_payload: UserPayload, metadata: RecurseMetadata) -> Self {
        Self {
            user_payload,
            metadata,
        }
    }

    /// The state forwarded to the next attempt.
    pub fn next_attempt(&self) -> Self {
        let mut next = self.clone();
        next.metadata.recurse_attempt += 1;
        next
    }

    /// Builds the wire object: the user payload plus the reserved metadata key.
    pub fn to_wire(&self) -> Result<Value, RecurseError> {
        let mut object = self.user_payload.clone();
        let metadata = serde_json::to_value(self.metadata).map_err(encode_error)?;
        object.insert(METADATA_KEY.to_string(), metadata);
        Ok(Value::Object(object))
    }

    /// Serializes the wire object.
    ///
    /// A payload that cannot be encoded cannot be handed off, so failures are
    /// HandOff errors.
    pub fn to_bytes(&self) -> Result<Vec<u8>, RecurseError> {
        serde_json::to_vec(&self.to_wire()?).map_err(encode_error)
    }

    /// Reads a wire object back into a state, resolving any missing metadata
    /// fields from `settings`.
    pub fn from_wire(event: Value, settings: &RecurseSettings) -> Result<Self, RecurseError> {
        let (user_payload, incoming) = split_event(event)?;
        let metadata = settings.resolve(incoming.unwrap_or_default())?;
        Ok(Self::new(user_payload, metadata))
    }
}

fn encode_error(e: serde_json::Error) -> RecurseError {
    RecurseError::hand_off_caused_by(format!("failed to serialize forwarded payload: {}", e), e.into())
}

/// Splits an incoming event into the caller payload and the reserved metadata.
///
/// A missing or `null` event is an empty payload. Any other non-object event is
/// rejected.
pub fn split_event(event: Value) -> Result<(UserPayload, Option<IncomingMetadata>), RecurseError> {
    let mut user_payload = match event {
        Value::Null => return Ok((UserPayload::new(), None)),
        Value::Object(map) => map,
        other => {
            return Err(RecurseError::configuration(format!(
                "payload must be a JSON object, got {}",
                json_type_name(&other)
            )))
        }
    };

    let metadata = match user_payload.remove(METADATA_KEY) {
        None | Some(Value::Null) => None,
        Some(raw) => Some(serde_json::from_value::<IncomingMetadata>(raw).map_err(|e| {
            RecurseError::configuration(format!(
                "invalid recursion metadata under \"{}\": {}",
                METADATA_KEY, e
            ))
        })?),
    };

    Ok((user_payload, metadata))
}

/// Returns the JSON truthiness of a value.
///
/// `null`, `false`, zero and the empty string are falsy. Everything else,
/// including empty arrays and objects, is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
