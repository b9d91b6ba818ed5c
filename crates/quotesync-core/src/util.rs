//! Small helpers for user-entered text, remote endpoints, and the clock.

/// Trimmed copy of `value`, or `None` when nothing but whitespace is left.
pub fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Whether `value` names an http(s) endpoint with a host part
pub fn is_web_url(value: &str) -> bool {
    ["http://", "https://"].iter().any(|scheme| {
        value
            .strip_prefix(scheme)
            .is_some_and(|rest| !rest.is_empty() && !rest.starts_with('/'))
    })
}

/// Wall clock in unix milliseconds, the unit of `Record::updated_at`
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
