use super::types::*;
use crate::error_handling::types::TimeError;

use chrono::{Local, NaiveDate, NaiveDateTime, TimeDelta, TimeZone};
use log::debug;
use regex::Regex;
use std::sync::OnceLock;

const UNITS: [(&str, i64); 4] = [
    ("seconds", 1),
    ("minutes", 60),
    ("hours", 3600),
    ("days", 86400),
];

fn relative_hint() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+\s*[SsMmHhDd]").expect("static regex"))
}

fn relative_form() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)\s*([A-Za-z]+)\s*$").expect("static regex"))
}

fn absolute_form() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(\d{4})-?(\d{2})?-?(\d{2})?[Tt\s]?(\d\d?)?:?(\d{2})?:?(\d{2})?(\.\d+)?([+-]\d+|[Zz])?$",
        )
        .expect("static regex")
    })
}

fn zone_form() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([+-])(\d{2})(\d{2})?$").expect("static regex"))
}

/// Resolves a timestamp expression into an absolute point in time or a
/// relative interval.
///
/// Relative expressions are a count followed by a unit, where the unit is any
/// prefix of `seconds`, `minutes`, `hours` or `days` (`"5m"`, `"2 hours"`,
/// `"1 d"`). Absolute expressions follow a loose ISO 8601 layout where every
/// component after the year is optional:
///
/// ```text
/// 2012-11-12T04:12:43Z
/// 20121111T221243-0600
/// 2012-11-12 15:12:43.250+1100
/// 2012-11
/// ```
///
/// When the expression carries no zone, `default_zone` applies, and when that
/// is absent too the fields are read as local time.
pub fn resolve(text: &str, default_zone: Option<ZoneOffset>) -> Result<Resolved, TimeError> {
    let text = text.trim();

    if relative_hint().is_match(text) {
        return resolve_relative(text).map(Resolved::Relative);
    }

    let caps = absolute_form()
        .captures(text)
        .ok_or_else(|| TimeError::InvalidTimestamp(text.to_string()))?;

    let field = |idx: usize, default: u32| -> Result<u32, TimeError> {
        match caps.get(idx) {
            Some(m) => m
                .as_str()
                .parse::<u32>()
                .map_err(|_| TimeError::InvalidTimestamp(text.to_string())),
            None => Ok(default),
        }
    };

    let year = field(1, 0)? as i32;
    let month = field(2, 1)?;
    let day = field(3, 1)?;
    let hour = field(4, 0)?;
    let minute = field(5, 0)?;
    let second = field(6, 0)?;
    let micros = caps
        .get(7)
        .map(|m| fraction_to_micros(&m.as_str()[1..]))
        .unwrap_or(0);

    let zone = match caps.get(8) {
        Some(m) => Some(parse_zone_offset(m.as_str())?),
        None => default_zone,
    };

    let naive = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_micro_opt(hour, minute, second, micros))
        .ok_or_else(|| TimeError::InvalidTimestamp(text.to_string()))?;

    let resolved = match zone {
        Some(zone) => from_zoned(naive, zone),
        None => from_local(naive),
    }
    .ok_or_else(|| TimeError::InvalidTimestamp(text.to_string()))?;

    debug!("Resolved \"{}\" to {}", text, resolved);
    Ok(Resolved::Absolute(resolved))
}

fn resolve_relative(text: &str) -> Result<Interval, TimeError> {
    let caps = relative_form()
        .captures(text)
        .ok_or_else(|| TimeError::InvalidTimestamp(text.to_string()))?;

    let count: i64 = caps[1]
        .parse()
        .map_err(|_| TimeError::InvalidTimestamp(text.to_string()))?;
    let unit = caps[2].to_lowercase();

    let mut matches = UNITS.iter().filter(|(name, _)| name.starts_with(unit.as_str()));
    let multiplier = match (matches.next(), matches.next()) {
        (Some((_, multiplier)), None) => *multiplier,
        (Some(_), Some(_)) => {
            return Err(TimeError::InvalidTimestamp(format!(
                "ambiguous unit \"{}\" in \"{}\"",
                unit, text
            )))
        }
        _ => return Err(TimeError::InvalidTimestamp(text.to_string())),
    };

    let secs = count
        .checked_mul(multiplier)
        .ok_or_else(|| TimeError::InvalidTimestamp(text.to_string()))?;
    Ok(Interval::from_secs(secs))
}

/// Scales a fraction of any length to microseconds, dropping digits past the
/// sixth.
pub(crate) fn fraction_to_micros(digits: &str) -> u32 {
    let mut micros = 0;
    for (i, c) in digits.chars().chain(std::iter::repeat('0')).take(6).enumerate() {
        let digit = c.to_digit(10).unwrap_or(0);
        micros += digit * 10u32.pow(5 - i as u32);
    }
    micros
}

/// Validates a zone offset of the form `Z`, `z`, `±HH` or `±HHMM`.
pub fn parse_zone_offset(text: &str) -> Result<ZoneOffset, TimeError> {
    if text.eq_ignore_ascii_case("z") {
        return Ok(ZoneOffset::UTC);
    }

    let caps = zone_form()
        .captures(text)
        .ok_or_else(|| TimeError::InvalidTimezoneOffset(text.to_string()))?;

    let hours: i32 = caps[2]
        .parse()
        .map_err(|_| TimeError::InvalidTimezoneOffset(text.to_string()))?;
    let minutes: i32 = match caps.get(3) {
        Some(m) => m
            .as_str()
            .parse()
            .map_err(|_| TimeError::InvalidTimezoneOffset(text.to_string()))?,
        None => 0,
    };
    if hours > 23 || minutes > 59 {
        return Err(TimeError::InvalidTimezoneOffset(text.to_string()));
    }

    let seconds = hours * 3600 + minutes * 60;
    Ok(match &caps[1] {
        "-" => ZoneOffset::from_seconds(-seconds),
        _ => ZoneOffset::from_seconds(seconds),
    })
}

fn from_zoned(naive: NaiveDateTime, zone: ZoneOffset) -> Option<Timeval> {
    let utc = naive.checked_sub_signed(TimeDelta::seconds(i64::from(zone.seconds())))?;
    let ts = utc.and_utc();
    Some(Timeval::new(ts.timestamp(), i64::from(ts.timestamp_subsec_micros())))
}

/// Interprets wall-clock fields in the local time zone.
///
/// On a DST fold the earlier instant wins; a time inside a DST gap is moved
/// forward by an hour.
pub(crate) fn from_local(naive: NaiveDateTime) -> Option<Timeval> {
    let local = Local
        .from_local_datetime(&naive)
        .earliest()
        .or_else(|| {
            let shifted = naive.checked_add_signed(TimeDelta::hours(1))?;
            Local.from_local_datetime(&shifted).earliest()
        })?;
    Some(Timeval::new(
        local.timestamp(),
        i64::from(local.timestamp_subsec_micros()),
    ))
}

/// Resolves user-supplied start and end expressions into a window.
///
/// A relative start counts back from `reference`, or from `now` when there is
/// no reference, and then becomes the reference. A relative end counts
/// forward from the reference, falling back to `now`. Everything is resolved
/// up front so a bad expression fails before any capture file is touched.
pub fn resolve_window(
    start: Option<&str>,
    end: Option<&str>,
    default_zone: Option<&str>,
    reference: Option<Timeval>,
    now: Timeval,
) -> Result<TimeWindow, TimeError> {
    let zone = default_zone.map(parse_zone_offset).transpose()?;
    let mut reference = reference;

    let start = match start {
        Some(text) => {
            let ts = match resolve(text, zone)? {
                Resolved::Absolute(ts) => ts,
                Resolved::Relative(offset) => reference
                    .unwrap_or(now)
                    .checked_sub(offset)
                    .ok_or_else(|| TimeError::InvalidTimestamp(text.to_string()))?,
            };
            if reference.is_none() {
                reference = Some(ts);
            }
            Some(ts)
        }
        None => None,
    };

    let end = match end {
        Some(text) => Some(match resolve(text, zone)? {
            Resolved::Absolute(ts) => ts,
            Resolved::Relative(offset) => reference
                .unwrap_or(now)
                .checked_add(offset)
                .ok_or_else(|| TimeError::InvalidTimestamp(text.to_string()))?,
        }),
        None => None,
    };

    let window = TimeWindow::new(start, end);
    debug!("Resolved time window {:?}", window);
    Ok(window)
}
