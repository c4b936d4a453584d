//! Timestamp utilities

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert whole seconds to duration
pub fn secs_to_duration(secs: u64) -> std::time::Duration {
    std::time::Duration::from_secs(secs)
}

/// Render a duration as `1m05s` / `42s` / `850ms` for log lines
pub fn format_elapsed(elapsed: std::time::Duration) -> String {
    let secs = elapsed.as_secs();
    if secs == 0 {
        return format!("{}ms", elapsed.as_millis());
    }
    if secs < 60 {
        return format!("{}s", secs);
    }
    format!("{}m{:02}s", secs / 60, secs % 60)
}
