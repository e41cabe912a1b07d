//! Date and timezone helpers.
//!
//! Timezones are fixed offsets: `UTC`/`Z` or `±HH:MM`. Publish dates come
//! from front-matter (`2022-02-21`, `2022-02-21 10:30`, RFC 3339) or from
//! the date encoded in a slug.

use chrono::{
    DateTime, FixedOffset, Locale, NaiveDate, NaiveDateTime, NaiveTime, TimeZone,
};
use serde_json::Value;

/// Parse a timezone setting into a fixed offset.
pub fn parse_timezone(tz: &str) -> Option<FixedOffset> {
    let tz = tz.trim();
    if tz.eq_ignore_ascii_case("utc") || tz == "Z" {
        return FixedOffset::east_opt(0);
    }

    let (sign, rest) = match tz.as_bytes().first()? {
        b'+' => (1, &tz[1..]),
        b'-' => (-1, &tz[1..]),
        _ => return None,
    };
    let (hours, minutes) = rest.split_once(':').unwrap_or((rest, "0"));
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Midnight of the given day in `tz`.
pub fn midnight(tz: FixedOffset, year: i32, month: u32, day: u32) -> Option<DateTime<FixedOffset>> {
    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&naive).single()
}

/// Interpret a front-matter `pub_date` value.
///
/// Dates without a time are midnight; values without an offset are taken to
/// be in `tz`.
pub fn parse_pub_date(value: &Value, tz: FixedOffset) -> Option<DateTime<FixedOffset>> {
    let text = value.as_str()?.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt);
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
            return tz.from_local_datetime(&naive).single();
        }
    }
    let date = NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()?;
    tz.from_local_datetime(&date.and_time(NaiveTime::MIN)).single()
}

fn locale(name: &str) -> Locale {
    Locale::try_from(name).unwrap_or(Locale::en_US)
}

/// Full month name in `locale_name`, falling back to English.
pub fn month_name(month: u32, locale_name: &str) -> String {
    NaiveDate::from_ymd_opt(2000, month, 1)
        .map(|date| date.format_localized("%B", locale(locale_name)).to_string())
        .unwrap_or_default()
}

/// strftime-style formatting with localized names.
pub fn format_date(date: &DateTime<FixedOffset>, fmt: &str, locale_name: &str) -> String {
    date.format_localized(fmt, locale(locale_name)).to_string()
}
