use crate::time_resolver::types::{TimeWindow, Timeval};

/// A capture filter expression plus what the event it was derived from says
/// about time: the event's own timestamp and, for flow records, the span the
/// flow was active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureFilter {
    pub expression: String,
    pub reference: Option<Timeval>,
    /// Window implied by the event, used when no bounds are given.
    pub span: Option<TimeWindow>,
    /// Suggested download name for the extracted packets.
    pub filename: Option<String>,
}

impl CaptureFilter {
    pub fn new(expression: impl Into<String>, reference: Option<Timeval>) -> Self {
        Self {
            expression: expression.into(),
            reference,
            span: None,
            filename: None,
        }
    }

    pub fn with_span(mut self, span: Option<TimeWindow>) -> Self {
        self.span = span;
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }
}

/// One endpoint of a flow, as printed in an alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub address: String,
    pub port: Option<u16>,
}

/// Recognizes one event text format.
///
/// Returning `None` means "not mine", letting the next decoder in the chain
/// have a go.
pub trait EventDecoder: Send + Sync {
    fn name(&self) -> &'static str;

    fn decode(&self, text: &str) -> Option<CaptureFilter>;
}
