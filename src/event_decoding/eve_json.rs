use super::protocols::{event_filename, flow_filter, protocol_number};
use super::types::*;
use crate::time_resolver::resolver::resolve;
use crate::time_resolver::types::{Interval, Resolved, TimeWindow, Timeval};

use log::{debug, warn};
use regex::Regex;
use serde::Deserialize;

/// Slack added on both sides of a flow's recorded lifetime; the first and
/// last packets can fall just outside it.
const FLOW_SLACK_SECS: i64 = 1;
/// Span assumed for a flow record without an end time.
const FLOW_DEFAULT_SECS: i64 = 60;

#[derive(Debug, Deserialize)]
struct EveEvent {
    proto: String,
    src_ip: String,
    src_port: Option<u16>,
    dest_ip: String,
    dest_port: Option<u16>,
    timestamp: Option<String>,
    event_type: Option<String>,
    alert: Option<EveAlert>,
    flow: Option<EveFlow>,
    netflow: Option<EveFlow>,
}

#[derive(Debug, Deserialize)]
struct EveAlert {
    signature_id: u64,
}

#[derive(Debug, Deserialize)]
struct EveFlow {
    start: String,
    end: Option<String>,
}

/// Decoder for Suricata EVE JSON records (one JSON object per event).
pub struct EveJsonDecoder {
    colon_offset: Regex,
}

impl EveJsonDecoder {
    pub fn new() -> Self {
        Self {
            colon_offset: Regex::new(r"([+-]\d{2}):(\d{2})$").expect("static regex"),
        }
    }

    fn resolve_timestamp(&self, timestamp: &str) -> Option<Timeval> {
        let normalized = self.colon_offset.replace(timestamp, "$1$2");
        match resolve(&normalized, None) {
            Ok(Resolved::Absolute(ts)) => Some(ts),
            Ok(Resolved::Relative(_)) => None,
            Err(e) => {
                warn!("Ignoring event timestamp \"{}\": {}", timestamp, e);
                None
            }
        }
    }

    /// Window covering a flow record's lifetime, widened by a second on each
    /// side. Without an end the flow is given a minute.
    fn flow_span(&self, flow: &EveFlow) -> Option<TimeWindow> {
        let slack = Interval::from_secs(FLOW_SLACK_SECS);
        let start = self.resolve_timestamp(&flow.start)?.checked_sub(slack)?;
        let end = match flow.end.as_deref().and_then(|end| self.resolve_timestamp(end)) {
            Some(end) => end.checked_add(slack)?,
            None => start.checked_add(Interval::from_secs(FLOW_DEFAULT_SECS))?,
        };
        Some(TimeWindow::new(Some(start), Some(end)))
    }
}

impl Default for EveJsonDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl EventDecoder for EveJsonDecoder {
    fn name(&self) -> &'static str {
        "eve-json"
    }

    fn decode(&self, text: &str) -> Option<CaptureFilter> {
        let text = text.trim();
        if !text.starts_with('{') {
            return None;
        }
        let event: EveEvent = match serde_json::from_str(text) {
            Ok(event) => event,
            Err(e) => {
                debug!("Not an EVE event: {}", e);
                return None;
            }
        };

        let protocol = protocol_number(&event.proto)?;
        let source = Endpoint {
            address: event.src_ip,
            port: event.src_port,
        };
        let destination = Endpoint {
            address: event.dest_ip,
            port: event.dest_port,
        };
        let reference = event
            .timestamp
            .as_deref()
            .and_then(|ts| self.resolve_timestamp(ts));
        let flow = match event.event_type.as_deref() {
            Some("flow") => event.flow.as_ref(),
            Some("netflow") => event.netflow.as_ref(),
            _ => None,
        };
        let span = flow.and_then(|flow| self.flow_span(flow));

        let filename = event_filename(
            event.alert.map_or(0, |alert| alert.signature_id),
            span.and_then(|span| span.start).or(reference),
            &source,
            &destination,
        );
        Some(
            CaptureFilter::new(flow_filter(protocol, &source, &destination), reference)
                .with_span(span)
                .with_filename(filename),
        )
    }
}
