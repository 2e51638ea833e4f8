use chrono::{DateTime, Utc};

/// Military date-time group style used in report headers, e.g. `0930Z 05 Mar 2024`
const ZULU_FORMAT: &str = "%H%MZ %d %b %Y";

/// Format a UTC instant as `HHMMZ DD Mon YYYY`
pub fn format_zulu(time: DateTime<Utc>) -> String {
    time.format(ZULU_FORMAT).to_string()
}

/// Format a unix timestamp as Zulu time, if it is representable
pub fn format_zulu_unix(unix_seconds: u64) -> Option<String> {
    let secs = i64::try_from(unix_seconds).ok()?;
    DateTime::from_timestamp(secs, 0).map(format_zulu)
}

/// Seconds elapsed between `last_heard` and `now`.
///
/// A timestamp in the future counts as zero elapsed.
pub fn seconds_since(last_heard: u64, now: DateTime<Utc>) -> u64 {
    let now_secs = u64::try_from(now.timestamp()).unwrap_or_default();
    now_secs.saturating_sub(last_heard)
}

/// Humanized age of a last-heard timestamp: `HH:MM - HHMMZ DD Mon YYYY`.
///
/// Hours are never wrapped into days, so a node silent for two days reads `48:00`.
pub fn elapsed_since(last_heard: u64, now: DateTime<Utc>) -> String {
    let elapsed = seconds_since(last_heard, now);
    let hours = elapsed / 3600;
    let minutes = (elapsed % 3600) / 60;
    let heard_at = format_zulu_unix(last_heard).unwrap_or_else(|| "unknown".to_string());
    format!("{hours:02}:{minutes:02} - {heard_at}")
}

/// Break an uptime in seconds into `D Days, H Hours, M Minutes, S Seconds`
pub fn format_uptime(total_seconds: u64) -> String {
    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{days} Days, {hours} Hours, {minutes} Minutes, {seconds} Seconds")
}

/// Current unix time in seconds
pub fn unix_now() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or_default()
}
