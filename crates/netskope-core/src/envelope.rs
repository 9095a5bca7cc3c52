//! Response envelope decoding.
//!
//! The management API wraps every response in one of two envelopes:
//!
//! - string status: `{"status": "success" | "error", "data", "result", "total", "message"}`
//! - integer status: `{"status": 200, "result", "total", "message"}`
//!
//! The envelope's `status` field decides success; the HTTP status only
//! short-circuits responses outside `[200, 400)`. Payloads stay opaque
//! [`serde_json::Value`]s until a resource client re-decodes them.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::RawResponse;
use crate::{Error, Result};

/// Envelope status reporting success.
pub const STATUS_SUCCESS: &str = "success";

/// Envelope status reporting a failure.
pub const STATUS_ERROR: &str = "error";

static NULL: Value = Value::Null;

/// Which payload field of a string-status envelope carries the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadField {
    /// `data`
    Data,
    /// `result`
    Result,
}

/// Success code expected from an integer-status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedStatus {
    /// 200, for reads, updates and deletes
    Ok,
    /// 201, for creates
    Created,
}

impl ExpectedStatus {
    /// Numeric status value.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::Ok => 200,
            Self::Created => 201,
        }
    }
}

/// String-status envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// `"success"` or `"error"`
    #[serde(default)]
    pub status: String,

    /// Primary payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Alternate payload field used by some endpoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Total item count for list responses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,

    /// Human-readable message, usually only on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Envelope {
    /// Returns the requested payload field, falling back to the other one,
    /// or `null` when both are absent.
    #[must_use]
    pub fn payload(&self, field: PayloadField) -> &Value {
        let (primary, secondary) = match field {
            PayloadField::Data => (&self.data, &self.result),
            PayloadField::Result => (&self.result, &self.data),
        };
        primary.as_ref().or(secondary.as_ref()).unwrap_or(&NULL)
    }

    /// Consuming variant of [`Envelope::payload`].
    #[must_use]
    pub fn into_payload(self, field: PayloadField) -> Value {
        let (primary, secondary) = match field {
            PayloadField::Data => (self.data, self.result),
            PayloadField::Result => (self.result, self.data),
        };
        primary.or(secondary).unwrap_or(Value::Null)
    }

    /// Returns true when the status is `"success"`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }
}

/// Integer-status envelope used by the IPSec endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NumericEnvelope {
    /// Numeric status, 200 or 201 on success
    #[serde(default)]
    pub status: i64,

    /// Payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Total item count for list responses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<i64>,

    /// Human-readable message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl NumericEnvelope {
    /// Returns the `result` payload, or `null` when absent.
    #[must_use]
    pub fn into_result(self) -> Value {
        self.result.unwrap_or(Value::Null)
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Reject HTTP statuses outside `[200, 400)`.
///
/// The server's `{"message": ...}` is used when the body carries one.
///
/// # Errors
///
/// Returns [`Error::HttpStatus`] for any status outside the accepted range.
pub fn check_http_status(status: StatusCode, body: &[u8]) -> Result<()> {
    let code = status.as_u16();
    if (200..400).contains(&code) {
        return Ok(());
    }

    let message = serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.message)
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| format!("unknown error, status code: {code}"));

    Err(Error::HttpStatus {
        status: code,
        message,
    })
}

/// Decode and classify a string-status envelope.
///
/// # Errors
///
/// - [`Error::HttpStatus`] if the HTTP status is outside `[200, 400)`
/// - [`Error::ParseError`] if the body is not an envelope
/// - [`Error::Api`] for `status: "error"` with a message
/// - [`Error::UnknownStatus`] for any other non-success status
pub fn decode_envelope(raw: &RawResponse, operation: &str) -> Result<Envelope> {
    check_http_status(raw.status, &raw.body)?;

    let envelope: Envelope = serde_json::from_slice(&raw.body)
        .map_err(|err| Error::ParseError(format!("{operation}: {err}")))?;

    match envelope.status.as_str() {
        STATUS_SUCCESS => Ok(envelope),
        STATUS_ERROR => match envelope.message {
            Some(message) if !message.is_empty() => Err(Error::Api(message)),
            message => Err(Error::UnknownStatus {
                status: envelope.status,
                message,
            }),
        },
        _ => Err(Error::UnknownStatus {
            status: envelope.status,
            message: envelope.message,
        }),
    }
}

/// Decode and classify an integer-status envelope.
///
/// # Errors
///
/// - [`Error::HttpStatus`] if the HTTP status is outside `[200, 400)`
/// - [`Error::ParseError`] if the body is not an envelope
/// - [`Error::UnknownStatus`] if `status` differs from `expected`
pub fn decode_numeric_envelope(
    raw: &RawResponse,
    expected: ExpectedStatus,
    operation: &str,
) -> Result<NumericEnvelope> {
    check_http_status(raw.status, &raw.body)?;

    let envelope: NumericEnvelope = serde_json::from_slice(&raw.body)
        .map_err(|err| Error::ParseError(format!("{operation}: {err}")))?;

    if envelope.status != expected.code() {
        return Err(Error::UnknownStatus {
            status: envelope.status.to_string(),
            message: envelope.message,
        });
    }

    Ok(envelope)
}

/// Re-decode an opaque payload into a typed value.
///
/// # Errors
///
/// Returns [`Error::ParseError`] naming `operation` if the payload does not
/// match `T`.
pub fn decode_payload<T>(payload: Value, operation: &str) -> Result<T>
where
    T: DeserializeOwned,
{
    serde_json::from_value(payload).map_err(|err| Error::ParseError(format!("{operation}: {err}")))
}

/// Like [`decode_payload`], but also accepts a one-element array.
///
/// # Errors
///
/// Returns [`Error::ParseError`] if the payload is an array of any other
/// length or does not match `T`.
pub fn decode_single<T>(payload: Value, operation: &str) -> Result<T>
where
    T: DeserializeOwned,
{
    match payload {
        Value::Array(mut items) => {
            if items.len() != 1 {
                return Err(Error::ParseError(format!(
                    "{operation}: expected a single item, got {}",
                    items.len()
                )));
            }
            decode_payload(items.remove(0), operation)
        }
        other => decode_payload(other, operation),
    }
}

/// Encode a request body as JSON.
///
/// # Errors
///
/// Returns [`Error::Serialization`] if `body` cannot be encoded.
pub fn encode_body<T>(body: &T) -> Result<Vec<u8>>
where
    T: Serialize + ?Sized,
{
    serde_json::to_vec(body).map_err(|err| Error::Serialization(err.to_string()))
}
