//! Value types shared by the time resolver, the spool selector and the
//! extraction engine.

use std::fmt;

use chrono::{DateTime, Utc};

pub const MICROS_PER_SEC: i64 = 1_000_000;

/// A point in time as seconds and microseconds since the Unix epoch.
///
/// The microsecond part is always kept in `[0, 1_000_000)`, so the derived
/// ordering (seconds first, then microseconds) is the chronological order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timeval {
    secs: i64,
    usecs: u32,
}

impl Timeval {
    /// Builds a timeval, carrying any microsecond overflow or underflow into
    /// the seconds.
    pub fn new(secs: i64, usecs: i64) -> Self {
        let (secs, usecs) = normalize(secs, usecs);
        Self { secs, usecs }
    }

    pub fn from_secs(secs: i64) -> Self {
        Self { secs, usecs: 0 }
    }

    pub fn now() -> Self {
        let now = Utc::now();
        Self::new(now.timestamp(), i64::from(now.timestamp_subsec_micros()))
    }

    pub fn secs(&self) -> i64 {
        self.secs
    }

    pub fn usecs(&self) -> u32 {
        self.usecs
    }

    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp(self.secs, self.usecs * 1000)
    }
}

impl fmt::Display for Timeval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.6fZ")),
            None => write!(f, "{}.{:06}", self.secs, self.usecs),
        }
    }
}

/// A relative amount of time, produced by parsing expressions like `"2 hours"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Interval {
    secs: i64,
    usecs: u32,
}

impl Interval {
    pub fn new(secs: i64, usecs: i64) -> Self {
        let (secs, usecs) = normalize(secs, usecs);
        Self { secs, usecs }
    }

    pub fn from_secs(secs: i64) -> Self {
        Self { secs, usecs: 0 }
    }

    pub fn secs(&self) -> i64 {
        self.secs
    }

    pub fn usecs(&self) -> u32 {
        self.usecs
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:06}s", self.secs, self.usecs)
    }
}

fn normalize(secs: i64, usecs: i64) -> (i64, u32) {
    let secs = secs + usecs.div_euclid(MICROS_PER_SEC);
    let usecs = usecs.rem_euclid(MICROS_PER_SEC) as u32;
    (secs, usecs)
}

fn checked_normalize(secs: i64, usecs: i64) -> Option<Timeval> {
    let secs = secs.checked_add(usecs.div_euclid(MICROS_PER_SEC))?;
    Some(Timeval {
        secs,
        usecs: usecs.rem_euclid(MICROS_PER_SEC) as u32,
    })
}

impl Timeval {
    /// Moves forward by `interval`, or `None` when the result does not fit.
    pub fn checked_add(self, interval: Interval) -> Option<Timeval> {
        checked_normalize(
            self.secs.checked_add(interval.secs)?,
            i64::from(self.usecs) + i64::from(interval.usecs),
        )
    }

    /// Moves back by `interval`, or `None` when the result does not fit.
    pub fn checked_sub(self, interval: Interval) -> Option<Timeval> {
        checked_normalize(
            self.secs.checked_sub(interval.secs)?,
            i64::from(self.usecs) - i64::from(interval.usecs),
        )
    }
}

/// Outcome of resolving a single timestamp expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved {
    Absolute(Timeval),
    Relative(Interval),
}

/// A fixed UTC offset, as given by a `Z` or `±HH[MM]` suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneOffset {
    seconds: i32,
}

impl ZoneOffset {
    pub const UTC: ZoneOffset = ZoneOffset { seconds: 0 };

    pub fn from_seconds(seconds: i32) -> Self {
        Self { seconds }
    }

    pub fn seconds(&self) -> i32 {
        self.seconds
    }
}

impl fmt::Display for ZoneOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.seconds < 0 { '-' } else { '+' };
        let abs = self.seconds.abs();
        write!(f, "{}{:02}{:02}", sign, abs / 3600, (abs % 3600) / 60)
    }
}

/// Packet time bounds: `start` inclusive, `end` exclusive, either open.
///
/// `start <= end` is expected but not checked here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeWindow {
    pub start: Option<Timeval>,
    pub end: Option<Timeval>,
}

impl TimeWindow {
    pub fn new(start: Option<Timeval>, end: Option<Timeval>) -> Self {
        Self { start, end }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    /// True when `ts` falls before the start bound.
    pub fn is_before(&self, ts: Timeval) -> bool {
        self.start.is_some_and(|start| ts < start)
    }

    /// True when `ts` is at or after the end bound.
    pub fn is_past(&self, ts: Timeval) -> bool {
        self.end.is_some_and(|end| ts >= end)
    }

    pub fn contains(&self, ts: Timeval) -> bool {
        !self.is_before(ts) && !self.is_past(ts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_carries_microseconds() {
        let tv = Timeval::new(10, 900_000)
            .checked_add(Interval::new(0, 200_000))
            .unwrap();
        assert_eq!(tv, Timeval::new(11, 100_000));
        assert_eq!(tv.usecs(), 100_000);
    }

    #[test]
    fn sub_borrows_microseconds() {
        let tv = Timeval::new(10, 100_000)
            .checked_sub(Interval::new(1, 200_000))
            .unwrap();
        assert_eq!(tv.secs(), 8);
        assert_eq!(tv.usecs(), 900_000);
    }

    #[test]
    fn arithmetic_overflow_is_none() {
        let far = Interval::from_secs(i64::MAX);
        assert_eq!(Timeval::from_secs(1_700_000_000).checked_add(far), None);
        assert_eq!(Timeval::from_secs(-10).checked_sub(far), None);
        assert_eq!(
            Timeval::new(i64::MAX, 900_000).checked_add(Interval::new(0, 200_000)),
            None
        );
        assert_eq!(
            Timeval::from_secs(0).checked_add(far),
            Some(Timeval::from_secs(i64::MAX))
        );
    }

    #[test]
    fn new_normalizes_out_of_range_micros() {
        assert_eq!(Timeval::new(0, 2_500_000), Timeval::new(2, 500_000));
        assert_eq!(Timeval::new(0, -1), Timeval::new(-1, 999_999));
    }

    #[test]
    fn ordering_is_seconds_then_micros() {
        let mut v = vec![
            Timeval::new(2, 0),
            Timeval::new(1, 999_999),
            Timeval::new(1, 5),
        ];
        v.sort();
        assert_eq!(
            v,
            vec![Timeval::new(1, 5), Timeval::new(1, 999_999), Timeval::new(2, 0)]
        );
    }

    #[test]
    fn window_bounds_are_half_open() {
        let window = TimeWindow::new(Some(Timeval::from_secs(10)), Some(Timeval::from_secs(20)));
        assert!(window.is_before(Timeval::new(9, 999_999)));
        assert!(window.contains(Timeval::from_secs(10)));
        assert!(window.contains(Timeval::new(19, 999_999)));
        assert!(window.is_past(Timeval::from_secs(20)));

        let open = TimeWindow::unbounded();
        assert!(open.contains(Timeval::from_secs(0)));
        assert!(open.contains(Timeval::from_secs(i64::from(i32::MAX))));
    }

    #[test]
    fn zone_offset_display() {
        assert_eq!(ZoneOffset::from_seconds(-6 * 3600).to_string(), "-0600");
        assert_eq!(ZoneOffset::from_seconds(5 * 3600 + 1800).to_string(), "+0530");
        assert_eq!(ZoneOffset::UTC.to_string(), "+0000");
    }
}
