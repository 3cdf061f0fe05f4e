//! Lexical helpers for the builtin datatypes
//!
//! Parsers in this module check a whitespace-normalized lexical form and,
//! where the datatype has an ordered value space, return a value usable for
//! comparison. Failures carry a short human readable reason.

use base64::Engine;
use chrono::{Duration as ChronoDuration, Months, NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::str::FromStr;

/// Outcome of a lexical check
pub type LexicalResult<T = ()> = std::result::Result<T, String>;

/// Lexical values of `xs:boolean`
pub const XSD_BOOLEAN_VALUES: &[&str] = &["true", "false", "1", "0"];

static DECIMAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)$").expect("valid regex"));
static INTEGER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?\d+$").expect("valid regex"));
static FLOAT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?|-?INF|NaN)$")
        .expect("valid regex")
});
static DURATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(-)?P(?:(\d+)Y)?(?:(\d+)M)?(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+(?:\.\d*)?|\.\d+)S)?)?$",
    )
    .expect("valid regex")
});
static LANGUAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z]{1,8}(-[a-zA-Z0-9]{1,8})*$").expect("valid regex")
});
static TIMEZONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(Z|[+-]\d{2}:\d{2})$").expect("valid regex")
});

// =============================================================================
// Numeric
// =============================================================================

/// Parse an `xs:decimal` lexical
pub fn parse_decimal(value: &str) -> LexicalResult<Decimal> {
    if !DECIMAL_RE.is_match(value) {
        return Err(format!("'{}' is not a valid decimal", value));
    }
    let (negative, digits) = match value.as_bytes()[0] {
        b'-' => (true, &value[1..]),
        b'+' => (false, &value[1..]),
        _ => (false, value),
    };
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
    let int_part = if int_part.is_empty() { "0" } else { int_part };
    let canonical = if frac_part.is_empty() {
        int_part.to_string()
    } else {
        format!("{}.{}", int_part, frac_part)
    };
    let parsed = Decimal::from_str(&canonical)
        .map_err(|_| format!("decimal '{}' is out of the supported range", value))?;
    Ok(if negative { -parsed } else { parsed })
}

/// Parse an `xs:integer` lexical
pub fn parse_integer(value: &str) -> LexicalResult<Decimal> {
    if !INTEGER_RE.is_match(value) {
        return Err(format!("'{}' is not a valid integer", value));
    }
    parse_decimal(value)
}

/// Parse an integer and check it lies in `[min, max]`
pub fn integer_in_range(value: &str, min: Option<i128>, max: Option<i128>) -> LexicalResult {
    let parsed = parse_integer(value)?;
    if let Some(min) = min {
        if parsed < Decimal::from_i128_with_scale(min, 0) {
            return Err(format!("value {} must be >= {}", value, min));
        }
    }
    if let Some(max) = max {
        if parsed > Decimal::from_i128_with_scale(max, 0) {
            return Err(format!("value {} must be <= {}", value, max));
        }
    }
    Ok(())
}

/// Parse an `xs:float`/`xs:double` lexical
pub fn parse_float(value: &str) -> LexicalResult<f64> {
    if !FLOAT_RE.is_match(value) {
        return Err(format!("'{}' is not a valid floating point number", value));
    }
    match value {
        "INF" => Ok(f64::INFINITY),
        "-INF" => Ok(f64::NEG_INFINITY),
        "NaN" => Ok(f64::NAN),
        _ => value
            .parse::<f64>()
            .map_err(|_| format!("'{}' is not a valid floating point number", value)),
    }
}

/// Count total and fraction digits of a decimal lexical
pub fn decimal_digits(value: &str) -> (usize, usize) {
    let digits = value.trim_start_matches(['+', '-']);
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
    let int_digits = int_part.trim_start_matches('0').len();
    let frac_digits = frac_part.trim_end_matches('0').len();
    ((int_digits + frac_digits).max(1), frac_digits)
}

// =============================================================================
// Strings and names
// =============================================================================

/// Check an `xs:boolean` lexical
pub fn parse_boolean(value: &str) -> LexicalResult<bool> {
    match value {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(format!("'{}' is not a valid boolean", value)),
    }
}

/// Check an `xs:language` lexical
pub fn language_validator(value: &str) -> LexicalResult {
    if LANGUAGE_RE.is_match(value) {
        Ok(())
    } else {
        Err(format!("'{}' is not a valid language tag", value))
    }
}

/// Check an `xs:hexBinary` lexical
pub fn hex_binary_validator(value: &str) -> LexicalResult<usize> {
    if value.len() % 2 != 0 || !value.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("'{}' is not valid hexBinary", value));
    }
    Ok(value.len() / 2)
}

/// Check an `xs:base64Binary` lexical, returning the decoded length
pub fn base64_binary_validator(value: &str) -> LexicalResult<usize> {
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map(|bytes| bytes.len())
        .map_err(|_| format!("'{}' is not valid base64Binary", value))
}

/// Check an `xs:anyURI` lexical
pub fn any_uri_validator(value: &str) -> LexicalResult {
    if value.contains(['\n', '\r', '\t']) || value.matches('#').count() > 1 {
        Err(format!("'{}' is not a valid URI reference", value))
    } else {
        Ok(())
    }
}

// =============================================================================
// Durations
// =============================================================================

/// A parsed `xs:duration`: a month count and a second count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationValue {
    /// Total months, signed
    pub months: i64,
    /// Day/time part in seconds, signed
    pub seconds: Decimal,
}

/// Reference points used to order durations
const DURATION_REFERENCES: [(i32, u32, u32); 4] =
    [(1696, 9, 1), (1697, 2, 1), (1903, 3, 1), (1903, 7, 1)];

impl DurationValue {
    fn add_to(&self, start: NaiveDateTime) -> Option<NaiveDateTime> {
        let shifted = if self.months >= 0 {
            start.checked_add_months(Months::new(u32::try_from(self.months).ok()?))?
        } else {
            start.checked_sub_months(Months::new(u32::try_from(-self.months).ok()?))?
        };
        let whole = self.seconds.trunc();
        let nanos = ((self.seconds - whole) * Decimal::from(1_000_000_000)).trunc();
        let whole: i64 = whole.try_into().ok()?;
        let nanos: i64 = nanos.try_into().ok()?;
        shifted
            .checked_add_signed(ChronoDuration::seconds(whole))?
            .checked_add_signed(ChronoDuration::nanoseconds(nanos))
    }
}

impl PartialOrd for DurationValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self == other {
            return Some(Ordering::Equal);
        }
        let mut result: Option<Ordering> = None;
        for (y, m, d) in DURATION_REFERENCES {
            let start = NaiveDate::from_ymd_opt(y, m, d)?.and_hms_opt(0, 0, 0)?;
            let ord = self.add_to(start)?.cmp(&other.add_to(start)?);
            match result {
                None => result = Some(ord),
                Some(prev) if prev != ord => return None,
                Some(_) => {}
            }
        }
        result
    }
}

/// Parse an `xs:duration` lexical
pub fn parse_duration(value: &str) -> LexicalResult<DurationValue> {
    let invalid = || format!("'{}' is not a valid duration", value);
    let caps = DURATION_RE.captures(value).ok_or_else(invalid)?;
    if value.ends_with('P') || value.ends_with('T') {
        return Err(invalid());
    }
    let number = |i: usize| -> LexicalResult<i64> {
        caps.get(i)
            .map(|m| m.as_str().parse::<i64>().map_err(|_| invalid()))
            .unwrap_or(Ok(0))
    };
    let years = number(2)?;
    let months = number(3)?;
    let days = number(4)?;
    let hours = number(5)?;
    let minutes = number(6)?;
    let seconds = match caps.get(7) {
        Some(m) => parse_decimal(m.as_str())?,
        None => Decimal::ZERO,
    };

    let total_months = years
        .checked_mul(12)
        .and_then(|y| y.checked_add(months))
        .ok_or_else(invalid)?;
    let total_seconds = Decimal::from(days) * Decimal::from(86400)
        + Decimal::from(hours) * Decimal::from(3600)
        + Decimal::from(minutes) * Decimal::from(60)
        + seconds;

    let negative = caps.get(1).is_some();
    Ok(DurationValue {
        months: if negative { -total_months } else { total_months },
        seconds: if negative { -total_seconds } else { total_seconds },
    })
}

// =============================================================================
// Dates and times
// =============================================================================

/// The calendar datatypes sharing one representation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarKind {
    /// xs:dateTime
    DateTime,
    /// xs:date
    Date,
    /// xs:time
    Time,
    /// xs:gYearMonth
    GYearMonth,
    /// xs:gYear
    GYear,
    /// xs:gMonthDay
    GMonthDay,
    /// xs:gDay
    GDay,
    /// xs:gMonth
    GMonth,
}

/// A calendar value normalized to UTC when it carries a timezone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarValue {
    /// Point in time (local time when `has_timezone` is false)
    pub instant: NaiveDateTime,
    /// Whether the lexical carried a timezone
    pub has_timezone: bool,
}

impl PartialOrd for CalendarValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.has_timezone == other.has_timezone {
            return Some(self.instant.cmp(&other.instant));
        }
        // A value without timezone spans +/- 14 hours
        let slack = ChronoDuration::hours(14);
        let (lo_a, hi_a) = self.span(slack);
        let (lo_b, hi_b) = other.span(slack);
        if hi_a < lo_b {
            Some(Ordering::Less)
        } else if lo_a > hi_b {
            Some(Ordering::Greater)
        } else {
            None
        }
    }
}

impl CalendarValue {
    fn span(&self, slack: ChronoDuration) -> (NaiveDateTime, NaiveDateTime) {
        if self.has_timezone {
            (self.instant, self.instant)
        } else {
            (self.instant - slack, self.instant + slack)
        }
    }
}

/// Parse a calendar lexical of the given kind
pub fn parse_calendar(kind: CalendarKind, value: &str) -> LexicalResult<CalendarValue> {
    let invalid = || format!("'{}' is not a valid {}", value, calendar_name(kind));

    let (body, offset) = split_timezone(value).ok_or_else(invalid)?;
    let instant = match kind {
        CalendarKind::DateTime => {
            let (date, time) = body.split_once('T').ok_or_else(invalid)?;
            let date = parse_date_part(date).ok_or_else(invalid)?;
            let (time, carry) = parse_time_part(time).ok_or_else(invalid)?;
            date.and_time(time) + ChronoDuration::days(carry)
        }
        CalendarKind::Date => parse_date_part(body)
            .ok_or_else(invalid)?
            .and_hms_opt(0, 0, 0)
            .ok_or_else(invalid)?,
        CalendarKind::Time => {
            let (time, carry) = parse_time_part(body).ok_or_else(invalid)?;
            reference_date(1, 1).ok_or_else(invalid)?.and_time(time) + ChronoDuration::days(carry)
        }
        CalendarKind::GYearMonth => {
            let (year, month) = body.rsplit_once('-').ok_or_else(invalid)?;
            let year = parse_year(year).ok_or_else(invalid)?;
            let month = two_digits(month).ok_or_else(invalid)?;
            NaiveDate::from_ymd_opt(year, month, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .ok_or_else(invalid)?
        }
        CalendarKind::GYear => {
            let year = parse_year(body).ok_or_else(invalid)?;
            NaiveDate::from_ymd_opt(year, 1, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .ok_or_else(invalid)?
        }
        CalendarKind::GMonthDay => {
            let rest = body.strip_prefix("--").ok_or_else(invalid)?;
            let (month, day) = rest.split_once('-').ok_or_else(invalid)?;
            let month = two_digits(month).ok_or_else(invalid)?;
            let day = two_digits(day).ok_or_else(invalid)?;
            reference_date(month, day)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .ok_or_else(invalid)?
        }
        CalendarKind::GDay => {
            let day = body.strip_prefix("---").and_then(two_digits).ok_or_else(invalid)?;
            reference_date(1, day)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .ok_or_else(invalid)?
        }
        CalendarKind::GMonth => {
            let month = body.strip_prefix("--").and_then(two_digits).ok_or_else(invalid)?;
            reference_date(month, 1)
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .ok_or_else(invalid)?
        }
    };

    Ok(match offset {
        Some(minutes) => CalendarValue {
            instant: instant - ChronoDuration::minutes(minutes),
            has_timezone: true,
        },
        None => CalendarValue {
            instant,
            has_timezone: false,
        },
    })
}

fn calendar_name(kind: CalendarKind) -> &'static str {
    match kind {
        CalendarKind::DateTime => "dateTime",
        CalendarKind::Date => "date",
        CalendarKind::Time => "time",
        CalendarKind::GYearMonth => "gYearMonth",
        CalendarKind::GYear => "gYear",
        CalendarKind::GMonthDay => "gMonthDay",
        CalendarKind::GDay => "gDay",
        CalendarKind::GMonth => "gMonth",
    }
}

// Leap year so that --02-29 is representable
fn reference_date(month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(2000, month, day)
}

/// Split off a trailing timezone, returning its offset in minutes
fn split_timezone(value: &str) -> Option<(&str, Option<i64>)> {
    let Some(m) = TIMEZONE_RE.find(value) else {
        return Some((value, None));
    };
    // "-MM" of gYearMonth/date would otherwise look like an offset
    let body = &value[..m.start()];
    let tz = m.as_str();
    if tz == "Z" {
        return Some((body, Some(0)));
    }
    if body.is_empty() || body.ends_with('-') {
        return Some((value, None));
    }
    let sign = if tz.starts_with('-') { -1 } else { 1 };
    let hours: i64 = tz[1..3].parse().ok()?;
    let minutes: i64 = tz[4..6].parse().ok()?;
    if hours > 14 || minutes > 59 || (hours == 14 && minutes != 0) {
        return None;
    }
    Some((body, Some(sign * (hours * 60 + minutes))))
}

fn two_digits(text: &str) -> Option<u32> {
    if text.len() == 2 && text.bytes().all(|b| b.is_ascii_digit()) {
        text.parse().ok()
    } else {
        None
    }
}

fn parse_year(text: &str) -> Option<i32> {
    let digits = text.strip_prefix('-').unwrap_or(text);
    if digits.len() < 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if digits.len() > 4 && digits.starts_with('0') {
        return None;
    }
    let year: i32 = text.parse().ok()?;
    // XSD 1.0 has no year zero
    if year == 0 {
        None
    } else {
        Some(year)
    }
}

fn parse_date_part(text: &str) -> Option<NaiveDate> {
    let (rest, day) = text.rsplit_once('-')?;
    let (year, month) = rest.rsplit_once('-')?;
    NaiveDate::from_ymd_opt(parse_year(year)?, two_digits(month)?, two_digits(day)?)
}

/// Parse `hh:mm:ss(.s+)?`; `24:00:00` carries into the next day
fn parse_time_part(text: &str) -> Option<(NaiveTime, i64)> {
    let mut parts = text.splitn(3, ':');
    let hour = two_digits(parts.next()?)?;
    let minute = two_digits(parts.next()?)?;
    let seconds = parts.next()?;
    let (whole, frac) = seconds.split_once('.').unwrap_or((seconds, ""));
    let second = two_digits(whole)?;
    if !frac.bytes().all(|b| b.is_ascii_digit()) || (seconds.contains('.') && frac.is_empty()) {
        return None;
    }
    let mut nanos_text: String = frac.chars().take(9).collect();
    while nanos_text.len() < 9 {
        nanos_text.push('0');
    }
    let nanos: u32 = nanos_text.parse().ok()?;

    if hour == 24 {
        return if minute == 0 && second == 0 && nanos == 0 {
            Some((NaiveTime::from_hms_opt(0, 0, 0)?, 1))
        } else {
            None
        };
    }
    Some((NaiveTime::from_hms_nano_opt(hour, minute, second, nanos)?, 0))
}
