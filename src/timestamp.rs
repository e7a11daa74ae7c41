//! Lenient ISO-8601 timestamp normalization
//!
//! Library exports mix precisions and offset styles: `2023-01-05T10:11:12Z`,
//! `2023-01-05T10:11:12.1234567+00:00`, `2023-01-05 10:11:12.5-0500`, and so
//! on. Everything is parsed into a `DateTime<FixedOffset>` with microsecond
//! precision. Input that still cannot be parsed yields `None` instead of an
//! error, and ends up as a NULL column.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Timelike, Utc};

/// Number of fractional-second digits kept
const FRACTION_DIGITS: usize = 6;

/// Storage format: always six fractional digits and an explicit offset
const CANONICAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f%:z";

/// Parse an optional timestamp string.
///
/// Returns `None` for missing, empty, or unparseable input.
pub fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<FixedOffset>> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }

    // Only look for a time component past the date, so the '-' separators of
    // the date are never mistaken for a negative offset.
    let Some(sep) = raw
        .char_indices()
        .find(|&(_, c)| c == 'T' || c == 't' || c == ' ')
        .map(|(i, _)| i)
    else {
        let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
        return utc().from_local_datetime(&date.and_hms_opt(0, 0, 0)?).single();
    };

    let date = NaiveDate::parse_from_str(&raw[..sep], "%Y-%m-%d").ok()?;
    let (clock, offset) = split_offset(&raw[sep + 1..])?;
    let (hms, micros) = split_fraction(clock)?;

    let time = NaiveTime::parse_from_str(hms, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(hms, "%H:%M"))
        .ok()?
        .with_nanosecond(micros * 1_000)?;

    offset.from_local_datetime(&date.and_time(time)).single()
}

/// Render a timestamp in the form stored in the database
pub fn canonical(ts: &DateTime<FixedOffset>) -> String {
    ts.format(CANONICAL_FORMAT).to_string()
}

/// Parse and render in one step, for mapping into rows
pub fn normalize(raw: Option<&str>) -> Option<String> {
    parse_timestamp(raw).map(|ts| canonical(&ts))
}

fn utc() -> FixedOffset {
    Utc.fix()
}

/// Split `HH:MM:SS[.fff][offset]` into the clock part and its offset.
/// A missing offset means UTC.
fn split_offset(time: &str) -> Option<(&str, FixedOffset)> {
    if let Some(clock) = time.strip_suffix(&['Z', 'z'][..]) {
        return Some((clock, utc()));
    }

    match time.rfind(&['+', '-'][..]) {
        Some(pos) => Some((&time[..pos], parse_offset(&time[pos..])?)),
        None => Some((time, utc())),
    }
}

/// Accepts `+HH:MM`, `+HHMM` and `+HH` (and the `-` forms)
fn parse_offset(offset: &str) -> Option<FixedOffset> {
    let (sign, digits) = match offset.as_bytes().first()? {
        b'+' => (1, &offset[1..]),
        b'-' => (-1, &offset[1..]),
        _ => return None,
    };

    let digits: String = digits.chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let (hours, minutes) = match digits.len() {
        2 => (digits.parse::<i32>().ok()?, 0),
        4 => (digits[..2].parse::<i32>().ok()?, digits[2..].parse::<i32>().ok()?),
        _ => return None,
    };
    if hours > 23 || minutes > 59 {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Split off the fractional seconds, truncated or padded to microseconds
fn split_fraction(clock: &str) -> Option<(&str, u32)> {
    let Some(pos) = clock.find(&['.', ','][..]) else {
        return Some((clock, 0));
    };

    let fraction = &clock[pos + 1..];
    if fraction.is_empty() || !fraction.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let mut micros: String = fraction.chars().take(FRACTION_DIGITS).collect();
    while micros.len() < FRACTION_DIGITS {
        micros.push('0');
    }

    Some((&clock[..pos], micros.parse().ok()?))
}
