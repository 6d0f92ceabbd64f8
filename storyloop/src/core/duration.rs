//! Human-readable durations for console output.

use std::time::Duration;

/// Format a duration as `45s`, `2m 34s`, `1h 2m` (sub-second precision dropped).
pub fn format_duration(duration: Duration) -> String {
    let seconds = duration.as_secs();
    let minutes = seconds / 60;
    let hours = minutes / 60;

    if hours > 0 {
        let rem = minutes % 60;
        return if rem > 0 {
            format!("{hours}h {rem}m")
        } else {
            format!("{hours}h")
        };
    }
    if minutes > 0 {
        let rem = seconds % 60;
        return if rem > 0 {
            format!("{minutes}m {rem}s")
        } else {
            format!("{minutes}m")
        };
    }
    format!("{seconds}s")
}
