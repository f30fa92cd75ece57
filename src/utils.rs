use std::time::Duration;

/// Period between frames for a given rate, truncated to whole milliseconds
pub fn frame_interval(fps: u32) -> Duration {
    Duration::from_millis(1000 / u64::from(fps.max(1)))
}

/// Build a `Cookie` header value from the configured cookie.
///
/// `name=value` is used as given (trimmed); a bare value is sent under `default_name`.
pub fn cookie_header(raw: &str, default_name: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    match raw.split_once('=') {
        Some((name, value)) => Some(format!("{}={}", name.trim(), value.trim())),
        None => Some(format!("{}={}", default_name, raw)),
    }
}

/// Camera names double as URL path segments
pub fn is_valid_camera_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
