//! Formatting helpers shared by diagnostics and storage.

use chrono::{Duration, NaiveDateTime};

/// Format a naive UTC timestamp the way it is stored in the database
/// (e.g., "2011-03-14 23:27:01", with fractional seconds only when present).
pub fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format("%Y-%m-%d %H:%M:%S%.f").to_string()
}

/// Format a duration as zero-padded `HH:MM:SS` (hours may exceed two digits).
pub fn format_duration(duration: Duration) -> String {
    let total = duration.num_seconds();
    let sign = if total < 0 { "-" } else { "" };
    let total = total.abs();
    format!(
        "{}{:02}:{:02}:{:02}",
        sign,
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}
