//! Tolerant deserializers for fields the API reports inconsistently.
//!
//! Some scalar fields arrive as strings on one endpoint and as numbers or
//! booleans on another. These helpers normalise them for use with
//! `#[serde(deserialize_with = "...")]`.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Render a scalar JSON value as a string. Objects, arrays and `null` yield
/// `None`.
#[must_use]
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// Interpret a JSON value as a boolean: `true`/`false`, `"true"`/`"false"`
/// (any case), or `0`/`1`.
#[must_use]
pub fn value_to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        Value::Number(number) => number.as_i64().map(|n| n != 0),
        _ => None,
    }
}

/// Parse an RFC 3339 timestamp into UTC.
#[must_use]
pub fn parse_rfc3339(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text.trim())
        .ok()
        .map(|timestamp| timestamp.with_timezone(&Utc))
}

/// Interpret a JSON value as a timestamp: an RFC 3339 string or Unix seconds.
#[must_use]
pub fn value_to_datetime(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(text) => parse_rfc3339(text),
        Value::Number(number) => number
            .as_i64()
            .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        _ => None,
    }
}

/// Deserialize a string, number or boolean into `Option<String>`.
///
/// # Errors
///
/// Never fails for well-formed JSON; non-scalar values become `None`.
pub fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?
        .as_ref()
        .and_then(scalar_to_string))
}

/// Deserialize a boolean or boolean-like string into `Option<bool>`.
///
/// # Errors
///
/// Never fails for well-formed JSON; unrecognised values become `None`.
pub fn opt_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?
        .as_ref()
        .and_then(value_to_bool))
}

/// Deserialize a number or numeric string into `Option<i64>`.
///
/// # Errors
///
/// Never fails for well-formed JSON; non-numeric values become `None`.
pub fn opt_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        Option::<Value>::deserialize(deserializer)?.and_then(|value| match value {
            Value::Number(number) => number.as_i64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        }),
    )
}

/// Deserialize an RFC 3339 string or Unix seconds into an optional UTC
/// timestamp.
///
/// # Errors
///
/// Never fails for well-formed JSON; unparseable values become `None`.
pub fn opt_datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?
        .as_ref()
        .and_then(value_to_datetime))
}

/// Deserialize a nested object, yielding `None` when the value is missing,
/// not an object, or does not match `T`.
///
/// # Errors
///
/// Never fails for well-formed JSON.
pub fn opt_object<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(
        Option::<Value>::deserialize(deserializer)?.and_then(|value| match value {
            Value::Object(_) => serde_json::from_value(value).ok(),
            _ => None,
        }),
    )
}

/// Deserialize a plain string into a [`SecretString`].
///
/// # Errors
///
/// Fails if the value is not a string.
pub fn secret_string<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Sample {
        #[serde(default, deserialize_with = "opt_string")]
        text: Option<String>,
        #[serde(default, deserialize_with = "opt_bool")]
        flag: Option<bool>,
        #[serde(default, deserialize_with = "opt_i64")]
        count: Option<i64>,
    }

    #[derive(Debug, Deserialize)]
    struct Stamped {
        #[serde(default, deserialize_with = "opt_datetime")]
        at: Option<DateTime<Utc>>,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Inner {
        name: String,
    }

    #[derive(Debug, Deserialize)]
    struct Outer {
        #[serde(default, deserialize_with = "opt_object")]
        inner: Option<Inner>,
    }

    #[derive(Debug, Deserialize)]
    struct Token {
        #[serde(deserialize_with = "secret_string")]
        token: SecretString,
    }

    #[test]
    fn test_opt_string_accepts_scalars() {
        let sample: Sample = serde_json::from_value(json!({"text": 42})).unwrap();
        assert_eq!(sample.text.as_deref(), Some("42"));

        let sample: Sample = serde_json::from_value(json!({"text": "abc"})).unwrap();
        assert_eq!(sample.text.as_deref(), Some("abc"));

        let sample: Sample = serde_json::from_value(json!({"text": {"nested": 1}})).unwrap();
        assert_eq!(sample.text, None);
    }

    #[test]
    fn test_opt_bool_accepts_strings() {
        let sample: Sample = serde_json::from_value(json!({"flag": "False"})).unwrap();
        assert_eq!(sample.flag, Some(false));

        let sample: Sample = serde_json::from_value(json!({"flag": true})).unwrap();
        assert_eq!(sample.flag, Some(true));

        let sample: Sample = serde_json::from_value(json!({"flag": "maybe"})).unwrap();
        assert_eq!(sample.flag, None);
    }

    #[test]
    fn test_opt_i64_accepts_numeric_strings() {
        let sample: Sample = serde_json::from_value(json!({"count": "17"})).unwrap();
        assert_eq!(sample.count, Some(17));

        let sample: Sample = serde_json::from_value(json!({"count": null})).unwrap();
        assert_eq!(sample.count, None);
    }

    #[test]
    fn test_missing_fields_default() {
        let sample: Sample = serde_json::from_value(json!({})).unwrap();
        assert!(sample.text.is_none() && sample.flag.is_none() && sample.count.is_none());
    }

    #[test]
    fn test_opt_datetime() {
        let stamped: Stamped =
            serde_json::from_value(json!({"at": "2023-06-01T12:00:00.000Z"})).unwrap();
        assert_eq!(stamped.at.map(|t| t.timestamp()), Some(1_685_620_800));

        let stamped: Stamped = serde_json::from_value(json!({"at": 1_685_620_800})).unwrap();
        assert_eq!(stamped.at.map(|t| t.timestamp()), Some(1_685_620_800));

        let stamped: Stamped = serde_json::from_value(json!({"at": ""})).unwrap();
        assert!(stamped.at.is_none());
    }

    #[test]
    fn test_opt_object() {
        let outer: Outer = serde_json::from_value(json!({"inner": {"name": "a"}})).unwrap();
        assert_eq!(outer.inner, Some(Inner { name: "a".into() }));

        let outer: Outer = serde_json::from_value(json!({"inner": ""})).unwrap();
        assert!(outer.inner.is_none());

        let outer: Outer = serde_json::from_value(json!({"inner": {"other": 1}})).unwrap();
        assert!(outer.inner.is_none());
    }

    #[test]
    fn test_secret_string() {
        let token: Token = serde_json::from_value(json!({"token": "abc"})).unwrap();
        assert_eq!(token.token.expose_secret(), "abc");
        assert!(!format!("{token:?}").contains("abc"));
    }
}
