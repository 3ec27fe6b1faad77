//! Compound duration strings (`300ms`, `90s`, `2m`, `1h30m`, `1.5h`)
//!
//! Used by both the configuration (`CLI_APP_TIMER_INTERVAL`) and the
//! `set-interval` control command, so operators can keep writing the
//! durations they already use.

use std::time::Duration;

use crate::{Error, Result};

const NANOS_PER_SEC: u128 = 1_000_000_000;

fn unit_nanos(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(1_000),
        "ms" => Some(1_000_000),
        "s" => Some(NANOS_PER_SEC),
        "m" => Some(60 * NANOS_PER_SEC),
        "h" => Some(3600 * NANOS_PER_SEC),
        _ => None,
    }
}

/// Parse a sequence of decimal numbers, each with an optional fraction and a
/// unit suffix. Negative durations are rejected.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let invalid = || Error::InvalidDuration(input.to_string());

    let s = input.trim();
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.starts_with('-') {
        return Err(invalid());
    }
    let mut rest = s.strip_prefix('+').unwrap_or(s);
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(invalid)?;
        let (number, after) = rest.split_at(number_len);
        let unit_len = after
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(after.len());
        let (unit, after) = after.split_at(unit_len);

        let unit = unit_nanos(unit).ok_or_else(invalid)?;
        let (whole, fraction) = match number.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (number, ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }

        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let mut value = whole.checked_mul(unit).ok_or_else(invalid)?;

        if !fraction.is_empty() {
            // Digits beyond nanosecond precision carry no information
            let fraction = &fraction[..fraction.len().min(18)];
            let scale = 10u128.pow(fraction.len() as u32);
            let digits: u128 = fraction.parse().map_err(|_| invalid())?;
            value = value
                .checked_add(digits * unit / scale)
                .ok_or_else(invalid)?;
        }

        total = total.checked_add(value).ok_or_else(invalid)?;
        rest = after;
    }

    let nanos = u64::try_from(total).map_err(|_| invalid())?;
    Ok(Duration::from_nanos(nanos))
}

fn with_fraction(value: u128, unit: u128) -> String {
    let whole = value / unit;
    let remainder = value % unit;
    if remainder == 0 {
        return whole.to_string();
    }
    let width = unit.to_string().len() - 1;
    let fraction = format!("{:0width$}", remainder, width = width);
    format!("{}.{}", whole, fraction.trim_end_matches('0'))
}

/// Render a duration in canonical unit form (`3m0s`, `1h30m0s`, `1.5s`, `250ms`)
pub fn format_duration(duration: Duration) -> String {
    let nanos = duration.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }
    if nanos < 1_000 {
        return format!("{}ns", nanos);
    }
    if nanos < 1_000_000 {
        return format!("{}µs", with_fraction(nanos, 1_000));
    }
    if nanos < NANOS_PER_SEC {
        return format!("{}ms", with_fraction(nanos, 1_000_000));
    }

    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = with_fraction(
        u128::from(total_secs % 60) * NANOS_PER_SEC + u128::from(duration.subsec_nanos()),
        NANOS_PER_SEC,
    );

    if hours > 0 {
        format!("{}h{}m{}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
