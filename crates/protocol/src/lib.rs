//! Wire format for the Moim proximity attendance exchange.
//!
//! A check-in is one UTF-8 line of JSON sent host-ward over the proximity
//! socket: `{"studyId":"..","meetingId":"..","userId":".."}\n`. The protocol
//! is one-directional and fire-and-forget; the host never writes back.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

mod assertion;

pub use assertion::AttendanceAssertion;

/// Fixed service identifier compiled into both host and client.
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x8ce255c0_200a_11e0_ac64_0800200c9a66);

/// Human-readable service name used for discovery filtering.
pub const SERVICE_NAME: &str = "MoimAttendance";

/// Hard cap on one wire line, terminator included.
pub const MAX_LINE_BYTES: usize = 4096;

/// エラー型
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),
}

/// Encode an assertion as a single JSON line, without the trailing newline.
///
/// JSON string escaping guarantees the output itself contains no newline,
/// so the transport can frame it with a bare `\n`.
pub fn encode(assertion: &AttendanceAssertion) -> Result<String, ProtocolError> {
    let line = serde_json::to_string(assertion)
        .map_err(|e| ProtocolError::MalformedPayload(e.to_string()))?;
    debug_assert!(!line.contains('\n'));
    Ok(line)
}

/// Decode one received line into an assertion.
///
/// Field presence is checked in a fixed order (`studyId`, `meetingId`,
/// `userId`) so that the first missing key is reported deterministically.
/// Unknown extra fields are ignored for forward compatibility.
pub fn decode(line: &str) -> Result<AttendanceAssertion, ProtocolError> {
    let trimmed = line.trim_end_matches(['\r', '\n']);
    let value: Value = serde_json::from_str(trimmed)
        .map_err(|e| ProtocolError::MalformedPayload(e.to_string()))?;

    let map = match value {
        Value::Object(map) => map,
        other => {
            return Err(ProtocolError::MalformedPayload(format!(
                "expected a JSON object, got {}",
                json_type_name(&other)
            )))
        }
    };

    let field = |key: &'static str| -> Result<String, ProtocolError> {
        match map.get(key) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(other) => Err(ProtocolError::MalformedPayload(format!(
                "field {} must be a string, got {}",
                key,
                json_type_name(other)
            ))),
            None => Err(ProtocolError::MissingField(key)),
        }
    };

    Ok(AttendanceAssertion {
        study_id: field("studyId")?,
        meeting_id: field("meetingId")?,
        user_id: field("userId")?,
    })
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
