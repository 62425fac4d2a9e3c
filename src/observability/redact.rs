//! Redaction of request/response bodies for verbose logging.
//!
//! Audio clips and images travel as byte arrays or base64 strings that run to
//! hundreds of kilobytes. Verbose mode logs bodies through [`redact_for_log`],
//! which swaps those fields for a length indicator.

use serde_json::Value;

/// Numeric arrays longer than this are replaced with a length indicator.
const MAX_LOGGED_ARRAY_LEN: usize = 64;

/// Strings longer than this are replaced with a length indicator.
const MAX_LOGGED_STRING_LEN: usize = 512;

/// Return a copy of `value` with large binary-ish fields replaced.
pub fn redact_for_log(value: &Value) -> Value {
    match value {
        Value::Array(items) if items.len() > MAX_LOGGED_ARRAY_LEN && is_numeric_array(items) => {
            Value::String(format!("<{} values>", items.len()))
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_for_log).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), redact_for_log(v)))
                .collect(),
        ),
        Value::String(s) if s.len() > MAX_LOGGED_STRING_LEN => {
            Value::String(format!("<{} bytes>", s.len()))
        }
        other => other.clone(),
    }
}

/// Render a redacted body for a log line.
pub fn redacted_json(value: &Value) -> String {
    serde_json::to_string(&redact_for_log(value)).unwrap_or_else(|_| "<unserializable>".into())
}

fn is_numeric_array(items: &[Value]) -> bool {
    items.iter().all(Value::is_number)
}
