use super::types::ExtractSummary;
use crate::capture_library::capture_trait::{CaptureLibrary, PacketReader, PacketWriter};
use crate::capture_library::types::OutputTarget;
use crate::error_handling::types::ExtractError;
use crate::spool::types::SpoolEntry;
use crate::time_resolver::types::TimeWindow;

use log::{debug, info, trace};

/// Copies the packets of a run of capture files that fall inside a time
/// window (and match an optional filter) into a single output.
///
/// Files are walked one packet at a time, so memory use doesn't depend on
/// the size of the spool or of the result. The output is only created once
/// the first packet passes, using the format of the file that packet came
/// from.
pub struct Extractor<'a, L: CaptureLibrary> {
    library: &'a L,
    empty_stream_header: bool,
}

impl<'a, L: CaptureLibrary> Extractor<'a, L> {
    pub fn new(library: &'a L) -> Self {
        Self {
            library,
            empty_stream_header: true,
        }
    }

    /// Controls whether a stream target still gets a capture header when no
    /// packet matched. Callers that need to tell "no packets" apart from an
    /// empty capture turn this off.
    pub fn with_empty_stream_header(mut self, enabled: bool) -> Self {
        self.empty_stream_header = enabled;
        self
    }

    pub fn extract(
        &self,
        files: &[SpoolEntry],
        window: &TimeWindow,
        filter: Option<&str>,
        target: &OutputTarget,
    ) -> Result<ExtractSummary, ExtractError> {
        let mut sink: Option<L::Writer> = None;
        let mut summary = ExtractSummary::default();

        for entry in files {
            debug!("Processing file {}", entry.path.display());
            let mut reader = self.library.open(&entry.path)?;
            if let Some(expression) = filter {
                reader.install_filter(expression)?;
            }
            summary.files_processed += 1;

            while let Some(packet) = reader.next_packet()? {
                if window.is_before(packet.timestamp) {
                    continue;
                }
                if window.is_past(packet.timestamp) {
                    trace!(
                        "Reached end of window at {} in {}",
                        packet.timestamp,
                        entry.path.display()
                    );
                    break;
                }

                if sink.is_none() {
                    info!("First match in {}, creating {}", entry.path.display(), target);
                    sink = Some(self.library.create_output(&reader, target)?);
                }
                if let Some(writer) = sink.as_mut() {
                    writer.write(&packet)?;
                    if *target == OutputTarget::Stream {
                        writer.flush()?;
                    }
                    summary.packets_written += 1;
                }
            }
        }

        match sink {
            Some(writer) => {
                writer.close()?;
                summary.sink_created = true;
            }
            None => {
                if let Some(first) = files.first() {
                    if *target == OutputTarget::Stream && self.empty_stream_header {
                        debug!("No packets matched, writing an empty capture");
                        let reader = self.library.open(&first.path)?;
                        self.library.create_output(&reader, target)?.close()?;
                        summary.sink_created = true;
                    }
                }
            }
        }

        info!(
            "Wrote {} packets from {} files to {}",
            summary.packets_written, summary.files_processed, target
        );
        Ok(summary)
    }
}
