//! Utility functions

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Version information for the agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Get version information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        build_time: option_env!("BUILD_TIME").unwrap_or("unknown").to_string(),
    }
}

/// Parse an interval such as `30s`, `5m`, `1d` or `250ms`.
///
/// A bare number is read as milliseconds.
pub fn parse_duration(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    let split = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(split);

    let amount: f64 = number
        .parse()
        .map_err(|_| format!("Invalid duration: {:?}", value))?;

    let millis_per_unit = match unit.trim().to_lowercase().as_str() {
        "" | "ms" | "msec" | "msecs" | "millisecond" | "milliseconds" => 1.0,
        "s" | "sec" | "secs" | "second" | "seconds" => 1_000.0,
        "m" | "min" | "mins" | "minute" | "minutes" => 60_000.0,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3_600_000.0,
        "d" | "day" | "days" => 86_400_000.0,
        "w" | "week" | "weeks" => 604_800_000.0,
        other => return Err(format!("Invalid duration unit {:?} in {:?}", other, value)),
    };

    Duration::try_from_secs_f64(amount * millis_per_unit / 1_000.0)
        .map_err(|_| format!("Duration out of range: {:?}", value))
}

/// Render a duration with its largest whole unit, e.g. `1d`, `5m`, `30s`.
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    const UNITS: [(u128, &str); 4] = [
        (86_400_000, "d"),
        (3_600_000, "h"),
        (60_000, "m"),
        (1_000, "s"),
    ];
    for (size, suffix) in UNITS {
        if millis >= size && millis % size == 0 {
            return format!("{}{}", millis / size, suffix);
        }
    }
    format!("{}ms", millis)
}
