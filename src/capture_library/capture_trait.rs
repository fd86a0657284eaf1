//! Capture library boundary
//!
//! The extraction pipeline only ever talks to capture files through these
//! traits. The production implementation wraps libpcap; tests use an
//! in-memory library.

use super::types::{CaptureFormat, OutputTarget, PacketRecord};
use crate::error_handling::types::CaptureError;
use std::path::Path;

/// Opens capture files and creates outputs shaped like them.
pub trait CaptureLibrary {
    type Reader: PacketReader;
    type Writer: PacketWriter;

    /// Opens a capture file for sequential reading.
    fn open(&self, path: &Path) -> Result<Self::Reader, CaptureError>;

    /// Creates an output using the format parameters (link type, snap
    /// length) of `reader`. For a file target this is the moment the file
    /// comes into existence.
    fn create_output(
        &self,
        reader: &Self::Reader,
        target: &OutputTarget,
    ) -> Result<Self::Writer, CaptureError>;
}

/// Sequential access to the packets of one open capture file. Dropping the
/// reader closes the file.
pub trait PacketReader {
    /// Compiles and installs a filter expression. Only packets matching it are
    /// returned afterwards.
    fn install_filter(&mut self, expression: &str) -> Result<(), CaptureError>;

    /// Returns the next packet, or `None` at end of file.
    fn next_packet(&mut self) -> Result<Option<PacketRecord>, CaptureError>;

    fn format(&self) -> CaptureFormat;

    fn path(&self) -> &Path;
}

pub trait PacketWriter {
    fn write(&mut self, packet: &PacketRecord) -> Result<(), CaptureError>;

    /// Pushes buffered packets through to the target.
    fn flush(&mut self) -> Result<(), CaptureError>;

    /// Flushes and releases the output. Consumes the writer so it can only
    /// happen once.
    fn close(self) -> Result<(), CaptureError>;
}
