//! Simple time helpers used by multiple services.

use std::time::{SystemTime, UNIX_EPOCH};

use time::macros::format_description;
use time::OffsetDateTime;

/// Current timestamp in milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// UTC date formatted as `YYYY_MM_DD`, used for dated download folders.
pub fn utc_date_folder() -> String {
    date_folder(OffsetDateTime::now_utc())
}

fn date_folder(at: OffsetDateTime) -> String {
    at.format(format_description!("[year]_[month]_[day]"))
        .unwrap_or_else(|_| "undated".to_string())
}
