//! Publish-date normalization
//!
//! Feeds in the wild disagree on date syntax. Each raw string is tried
//! against a fixed, ordered list of formats and the first one that parses
//! wins.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};

use crate::{Error, Result};

/// Accepted publish-date formats, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
    /// `Mon, 02 Jan 2006 15:04:05 MST`
    Rfc1123,
    /// `Mon, 02 Jan 2006 15:04:05 -0700`
    Rfc1123Z,
    /// `02 Jan 06 15:04 MST`
    Rfc822,
    /// `02 Jan 06 15:04 -0700`
    Rfc822Z,
    /// `2006-01-02T15:04:05Z`
    Iso8601Utc,
    /// `2006-01-02T15:04:05-07:00`
    Iso8601Offset,
    /// RFC 3339 with fractional seconds, `2006-01-02T15:04:05.999+07:00`
    Rfc3339,
}

impl DateFormat {
    pub const ALL: [DateFormat; 7] = [
        DateFormat::Rfc1123,
        DateFormat::Rfc1123Z,
        DateFormat::Rfc822,
        DateFormat::Rfc822Z,
        DateFormat::Iso8601Utc,
        DateFormat::Iso8601Offset,
        DateFormat::Rfc3339,
    ];

    fn parse(self, s: &str) -> Option<DateTime<Utc>> {
        match self {
            DateFormat::Rfc1123 => parse_with_zone_name(strip_weekday(s)?, "%d %b %Y %H:%M:%S"),
            DateFormat::Rfc1123Z => parse_with_offset(strip_weekday(s)?, "%d %b %Y %H:%M:%S %z"),
            DateFormat::Rfc822 => parse_with_zone_name(s, "%d %b %y %H:%M"),
            DateFormat::Rfc822Z => parse_with_offset(s, "%d %b %y %H:%M %z"),
            DateFormat::Iso8601Utc => NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%SZ")
                .ok()
                .map(|naive| naive.and_utc()),
            DateFormat::Iso8601Offset => parse_with_offset(s, "%Y-%m-%dT%H:%M:%S%:z"),
            DateFormat::Rfc3339 => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

/// Normalize a raw publish date to UTC
pub fn parse_pub_date(raw: &str) -> Result<DateTime<Utc>> {
    let s = raw.trim();
    DateFormat::ALL
        .iter()
        .find_map(|format| format.parse(s))
        .ok_or_else(|| Error::DateFormatUnrecognized(raw.to_string()))
}

/// Drop a leading `Mon, ` style weekday.
///
/// Only the name's syntax is checked; feeds often pair a date with the wrong
/// weekday, and the calendar date wins.
fn strip_weekday(s: &str) -> Option<&str> {
    let (weekday, rest) = s.split_once(", ")?;
    match weekday {
        "Mon" | "Tue" | "Wed" | "Thu" | "Fri" | "Sat" | "Sun" => Some(rest),
        _ => None,
    }
}

fn parse_with_offset(s: &str, pattern: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(s, pattern)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse `<datetime> <ZONE>` where ZONE is an alphabetic abbreviation
fn parse_with_zone_name(s: &str, pattern: &str) -> Option<DateTime<Utc>> {
    let (datetime, zone) = s.rsplit_once(' ')?;
    let offset_secs = zone_offset_secs(zone)?;
    let naive = NaiveDateTime::parse_from_str(datetime, pattern).ok()?;
    let offset = FixedOffset::east_opt(offset_secs)?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// RFC 822 zone names; other alphabetic abbreviations are taken as UTC
fn zone_offset_secs(zone: &str) -> Option<i32> {
    if zone.is_empty() || !zone.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let hours = match zone.to_ascii_uppercase().as_str() {
        "EDT" => -4,
        "EST" | "CDT" => -5,
        "CST" | "MDT" => -6,
        "MST" | "PDT" => -7,
        "PST" => -8,
        _ => 0,
    };
    Some(hours * 3600)
}
