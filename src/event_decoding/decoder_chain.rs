use super::eve_json::EveJsonDecoder;
use super::fast_alert::FastAlertDecoder;
use super::types::*;

use log::debug;

/// Ordered list of event decoders. The first decoder that recognizes the
/// text wins; text nobody recognizes is taken as a raw capture filter.
pub struct DecoderChain {
    decoders: Vec<Box<dyn EventDecoder>>,
}

impl DecoderChain {
    pub fn new(decoders: Vec<Box<dyn EventDecoder>>) -> Self {
        Self { decoders }
    }

    pub fn decode(&self, text: &str) -> CaptureFilter {
        for decoder in &self.decoders {
            if let Some(filter) = decoder.decode(text) {
                debug!("Event decoded by {} decoder", decoder.name());
                return filter;
            }
        }
        debug!("No decoder recognized the event, using it as a filter");
        CaptureFilter::new(text, None)
    }
}

impl Default for DecoderChain {
    fn default() -> Self {
        Self::new(vec![
            Box::new(FastAlertDecoder::new()),
            Box::new(EveJsonDecoder::new()),
        ])
    }
}
