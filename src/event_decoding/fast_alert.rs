use super::protocols::{event_filename, flow_filter, protocol_number};
use super::types::*;
use crate::time_resolver::resolver::{fraction_to_micros, from_local};
use crate::time_resolver::types::Timeval;

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime};
use log::{debug, trace};
use regex::Regex;

/// Decoder for one-line "fast" alerts as written by Snort and Suricata:
///
/// ```text
/// 11/15-22:56:29.943914  [**] [1:498:8] ... [Priority: 2] {TCP} 217.160.51.31:80 -> 172.16.1.11:33189
/// ```
///
/// The flow part (`{PROTO} src[:port] -> dst[:port]`) can appear anywhere in
/// the line; the timestamp must lead it. Suricata adds the year after the day,
/// Snort leaves it out.
pub struct FastAlertDecoder {
    flow_pattern: Regex,
    timestamp_pattern: Regex,
    signature_pattern: Regex,
}

/// Wall-clock fields read from an alert timestamp. `year` is `None` when the
/// alert omits it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertTime {
    pub year: Option<i32>,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub micros: u32,
}

impl AlertTime {
    fn at_year(&self, year: i32) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(year, self.month, self.day)?.and_hms_micro_opt(
            self.hour,
            self.minute,
            self.second,
            self.micros,
        )
    }
}

/// Picks the year for an alert that omitted it: the current year, unless
/// that lands the alert in the future, then the year before.
pub fn guess_year(time: &AlertTime, now: NaiveDateTime) -> i32 {
    match time.at_year(now.year()) {
        Some(candidate) if candidate <= now => now.year(),
        _ => now.year() - 1,
    }
}

impl FastAlertDecoder {
    pub fn new() -> Self {
        Self {
            flow_pattern: Regex::new(r"\{(\d+|\w+)\}\s([\d.]+):?(\d+)?\s..\s([\d.]+):?(\d+)?")
                .expect("static regex"),
            timestamp_pattern: Regex::new(
                r"^(\d\d)/(\d\d)/?(\d{4})?-(\d\d):(\d\d):(\d\d).(\d+)",
            )
            .expect("static regex"),
            signature_pattern: Regex::new(r"\[\d+:(\d+):\d+\]").expect("static regex"),
        }
    }

    /// Extracts the flow filter, or `None` if the line has no flow part or
    /// names a protocol we can't map.
    pub fn decode_flow(&self, text: &str) -> Option<String> {
        let (protocol, source, destination) = self.flow(text)?;
        Some(flow_filter(protocol, &source, &destination))
    }

    /// The `sid` of the `[gid:sid:rev]` tag, if the line has one.
    pub fn signature_id(&self, text: &str) -> Option<u64> {
        self.signature_pattern.captures(text)?[1].parse().ok()
    }

    fn flow(&self, text: &str) -> Option<(u8, Endpoint, Endpoint)> {
        let caps = self.flow_pattern.captures(text)?;

        let protocol = match protocol_number(&caps[1]) {
            Some(number) => number,
            None => {
                debug!("Unknown protocol \"{}\" in fast alert", &caps[1]);
                return None;
            }
        };

        let endpoint = |addr: usize, port: usize| -> Option<Endpoint> {
            let port = match caps.get(port) {
                Some(m) => Some(m.as_str().parse::<u16>().ok()?),
                None => None,
            };
            Some(Endpoint {
                address: caps[addr].to_string(),
                port,
            })
        };

        let source = endpoint(2, 3)?;
        let destination = endpoint(4, 5)?;
        Some((protocol, source, destination))
    }

    pub fn parse_timestamp(&self, text: &str) -> Option<AlertTime> {
        let caps = self.timestamp_pattern.captures(text)?;
        let number = |idx: usize| caps[idx].parse::<u32>().ok();

        Some(AlertTime {
            year: match caps.get(3) {
                Some(m) => Some(m.as_str().parse().ok()?),
                None => None,
            },
            month: number(1)?,
            day: number(2)?,
            hour: number(4)?,
            minute: number(5)?,
            second: number(6)?,
            micros: fraction_to_micros(&caps[7]),
        })
    }

    /// Resolves the alert timestamp in local time, guessing the year from
    /// `now` when needed.
    pub fn decode_timestamp_at(&self, text: &str, now: NaiveDateTime) -> Option<Timeval> {
        let time = self.parse_timestamp(text)?;
        let year = time.year.unwrap_or_else(|| guess_year(&time, now));
        let naive = time.at_year(year)?;
        from_local(naive)
    }
}

impl Default for FastAlertDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl EventDecoder for FastAlertDecoder {
    fn name(&self) -> &'static str {
        "fast-alert"
    }

    fn decode(&self, text: &str) -> Option<CaptureFilter> {
        let (protocol, source, destination) = self.flow(text)?;
        let expression = flow_filter(protocol, &source, &destination);
        let reference = self.decode_timestamp_at(text, Local::now().naive_local());
        trace!("Fast alert decoded to \"{}\" at {:?}", expression, reference);
        let filename = event_filename(
            self.signature_id(text).unwrap_or(0),
            reference,
            &source,
            &destination,
        );
        Some(CaptureFilter::new(expression, reference).with_filename(filename))
    }
}
