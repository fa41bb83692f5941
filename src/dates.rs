// Copyright (C) Thalia Archibald. All rights reserved.
//
// This file is part of fast-export-rust, distributed under the GPL 2.0 with a
// linking exception. For the full terms, see the included COPYING file.

//! Date parsing and formatting. Each routine returns (timestamp, timezone)
//! where timestamp is seconds since the epoch and timezone is the UTC
//! offset in seconds.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::DateError;

/// The date format an authorship line uses, auto-detected from its shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DateFormat {
    Raw,
    Now,
    Rfc2822,
}

/// Auto-detect the date format of an authorship `when` string, the way
/// `ImportParser._who_when` does on the first authorship line of a stream:
/// two space-separated tokens is `raw`; the literal `now` is `now`;
/// anything else is assumed to be `rfc2822`.
pub fn detect_format(datestr: &[u8]) -> DateFormat {
    if datestr == b"now" {
        DateFormat::Now
    } else if datestr.split(|&b| b == b' ').count() == 2 {
        DateFormat::Raw
    } else {
        DateFormat::Rfc2822
    }
}

pub fn parse(format: DateFormat, s: &[u8]) -> Result<(f64, i32), DateError> {
    match format {
        DateFormat::Raw => parse_raw(s),
        DateFormat::Now => Ok(parse_now()),
        DateFormat::Rfc2822 => parse_rfc2822(s),
    }
}

/// Parse "seconds-since-epoch offset-utc", e.g. `1234567890 -0600`.
pub fn parse_raw(s: &[u8]) -> Result<(f64, i32), DateError> {
    let mut parts = s.splitn(2, |&b| b == b' ');
    let ts_str = parts.next().ok_or(DateError::InvalidTimezone)?;
    let tz_str = parts.next().ok_or(DateError::InvalidTimezone)?;
    let ts: f64 = std::str::from_utf8(ts_str)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(DateError::InvalidTimezone)?;
    let tz = parse_tz(tz_str)?;
    Ok((ts, tz))
}

/// Parse a `[+|-]HHMM` timezone specification into an offset in seconds.
pub fn parse_tz(tz: &[u8]) -> Result<i32, DateError> {
    if tz.len() < 3 {
        return Err(DateError::InvalidTimezone);
    }
    let sign = match tz[0] {
        b'+' => 1,
        b'-' => -1,
        _ => return Err(DateError::InvalidTimezone),
    };
    let digits = &tz[1..];
    if digits.len() < 3 || !digits.iter().all(u8::is_ascii_digit) {
        return Err(DateError::InvalidTimezone);
    }
    let (hours_str, minutes_str) = digits.split_at(digits.len() - 2);
    let hours: i32 = std::str::from_utf8(hours_str)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(DateError::InvalidTimezone)?;
    let minutes: i32 = std::str::from_utf8(minutes_str)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(DateError::InvalidTimezone)?;
    Ok(sign * 60 * (60 * hours + minutes))
}

/// Render an offset in seconds as `±HHMM`.
pub fn format_tz(offset: i32) -> String {
    let sign = if offset < 0 { '-' } else { '+' };
    let magnitude = offset.unsigned_abs();
    let hours = magnitude / 3600;
    let minutes = magnitude / 60 - hours * 60;
    format!("{sign}{hours:02}{minutes:02}")
}

/// Returns the current wall-clock time with a UTC (zero) offset, the way
/// `dates.py::parse_now` ignores its input and always returns `(time.time(),
/// 0)`.
pub fn parse_now() -> (f64, i32) {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    (now.as_secs_f64(), 0)
}

/// Always fails: RFC 2822 date parsing is a declared-but-unimplemented
/// format. Selecting it must fail loudly rather than silently defaulting.
pub fn parse_rfc2822(_s: &[u8]) -> Result<(f64, i32), DateError> {
    Err(DateError::Rfc2822Unimplemented)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_raw() {
        assert_eq!(detect_format(b"1234567890 -0600"), DateFormat::Raw);
    }

    #[test]
    fn detect_now() {
        assert_eq!(detect_format(b"now"), DateFormat::Now);
    }

    #[test]
    fn detect_rfc2822_fallback() {
        assert_eq!(
            detect_format(b"Tue, 1 Jul 2003 10:52:37 +0200"),
            DateFormat::Rfc2822
        );
    }

    #[test]
    fn parse_raw_exact() {
        assert_eq!(parse_raw(b"1234567890 -0600").unwrap(), (1234567890.0, -21600));
        assert_eq!(parse_raw(b"1234567890 +0130").unwrap(), (1234567890.0, 5400));
    }

    #[test]
    fn parse_raw_fractional_seconds() {
        let (ts, tz) = parse_raw(b"1234567890.5 +0000").unwrap();
        assert_eq!(ts, 1234567890.5);
        assert_eq!(tz, 0);
    }

    #[test]
    fn tz_roundtrip() {
        for offset in [-21600, 5400, 0, 32400, -32400] {
            assert_eq!(parse_tz(format_tz(offset).as_bytes()).unwrap(), offset);
        }
    }

    #[test]
    fn parse_tz_rejects_bad_sign() {
        assert!(parse_tz(b"0600").is_err());
    }

    #[test]
    fn rfc2822_always_fails() {
        assert_eq!(
            parse_rfc2822(b"Tue, 1 Jul 2003 10:52:37 +0200"),
            Err(DateError::Rfc2822Unimplemented)
        );
    }
}
