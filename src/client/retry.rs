//! Server-supplied retry hints on rate-limited responses.

use std::{sync::LazyLock, time::Duration};

use regex::Regex;
use serde_json::Value;

static FREE_TEXT_RETRY_AFTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)retry[ \-_]?after[:\s]+(\d+(?:\.\d+)?)").unwrap());

const TOP_LEVEL_FIELDS: [&str; 3] = ["retry_after", "retryAfter", "retry_after_seconds"];

/// Work out how long the server asked us to wait.
///
/// Strategies, first hit wins:
/// 1. a top-level `retry_after` / `retryAfter` / `retry_after_seconds` field
/// 2. the same fields under `error` or `errors[0]`
/// 3. "retry after N" anywhere in the body text
/// 4. the `Retry-After` header, in seconds or as an HTTP date
pub fn parse_retry_after(body: &str, header: Option<&str>) -> Option<Duration> {
    let json = serde_json::from_str::<Value>(body).ok();

    json.as_ref()
        .and_then(field_hint)
        .or_else(|| json.as_ref()?.get("error").and_then(field_hint))
        .or_else(|| json.as_ref()?.get("errors")?.get(0).and_then(field_hint))
        .or_else(|| {
            FREE_TEXT_RETRY_AFTER
                .captures(body)
                .and_then(|caps| caps[1].parse::<f64>().ok())
                .and_then(seconds)
        })
        .or_else(|| header.and_then(header_hint))
}

fn field_hint(value: &Value) -> Option<Duration> {
    TOP_LEVEL_FIELDS
        .iter()
        .filter_map(|field| value.get(field))
        .find_map(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .and_then(seconds)
}

fn header_hint(header: &str) -> Option<Duration> {
    let header = header.trim();
    if let Ok(secs) = header.parse::<f64>() {
        return seconds(secs);
    }
    let at = chrono::DateTime::parse_from_rfc2822(header).ok()?;
    (at.with_timezone(&chrono::Utc) - chrono::Utc::now())
        .to_std()
        .ok()
}

/// Hints that are negative or do not fit in a `Duration` are ignored.
fn seconds(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs).ok()
}
