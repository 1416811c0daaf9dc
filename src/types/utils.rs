//! Shared utility functions for type serialization and common operations.

use serde::Serialize;
use std::fmt::Display;

/// Extract string from JSON value by key.
#[inline]
pub fn json_string(value: &serde_json::Value, key: &str) -> Option<String> {
    value.get(key)?.as_str().map(String::from)
}

/// Extract string with default value.
#[inline]
pub fn json_string_or(value: &serde_json::Value, key: &str, default: &str) -> String {
    json_string(value, key).unwrap_or_else(|| default.to_string())
}

/// Extract string array from JSON value by key.
#[inline]
pub fn json_string_array(value: &serde_json::Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|s| s.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

/// Extract boolean with default.
#[inline]
pub fn json_bool(value: &serde_json::Value, key: &str, default: bool) -> bool {
    value.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
}

/// Extract i64 with default.
#[inline]
pub fn json_i64(value: &serde_json::Value, key: &str, default: i64) -> i64 {
    value.get(key).and_then(|v| v.as_i64()).unwrap_or(default)
}

/// Extract f64 with default.
#[inline]
pub fn json_f64(value: &serde_json::Value, key: &str, default: f64) -> f64 {
    value.get(key).and_then(|v| v.as_f64()).unwrap_or(default)
}

/// Serialize an enum to its serde-tagged string representation, stripped of
/// surrounding quotes. Used when persisting enum columns as SQLite TEXT.
pub fn enum_to_str<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_default()
        .trim_matches('"')
        .to_string()
}

/// Filter an iterator of Results, logging errors at debug level before discarding.
pub fn log_filter_error<T, E: Display>(result: Result<T, E>, context: &str) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::debug!("{}: {}", context, e);
            None
        }
    }
}

/// Like `log_filter_error` but logs at warn level for more important operations.
pub fn log_filter_warn<T, E: Display>(result: Result<T, E>, context: &str) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!("{}: {}", context, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_string_or_falls_back() {
        let v = json!({"a": "x"});
        assert_eq!(json_string_or(&v, "a", "d"), "x");
        assert_eq!(json_string_or(&v, "missing", "d"), "d");
    }

    #[test]
    fn log_filter_error_discards_err() {
        let ok: Result<i32, &str> = Ok(1);
        let err: Result<i32, &str> = Err("boom");
        assert_eq!(log_filter_error(ok, "ctx"), Some(1));
        assert_eq!(log_filter_error(err, "ctx"), None);
    }
}
