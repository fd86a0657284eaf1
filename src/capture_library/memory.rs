//! In-memory capture library used by the unit tests.
//!
//! Files are registered up front with their packets. A filter expression
//! matches the packets whose payload contains the expression text. Every
//! open and every output is recorded so tests can assert on how the library
//! was driven.

use super::capture_trait::{CaptureLibrary, PacketReader, PacketWriter};
use super::types::{CaptureFormat, OutputTarget, PacketRecord};
use crate::error_handling::types::CaptureError;
use crate::time_resolver::types::Timeval;

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const LINKTYPE_ETHERNET: i32 = 1;

#[derive(Debug, Clone)]
struct MemFile {
    format: CaptureFormat,
    packets: Vec<PacketRecord>,
}

/// Everything written to one output.
#[derive(Debug, Clone, PartialEq)]
pub struct MemOutput {
    pub target: OutputTarget,
    pub format: CaptureFormat,
    pub packets: Vec<PacketRecord>,
    pub flushes: usize,
    pub closed: bool,
}

#[derive(Debug, Default)]
struct Journal {
    opens: Vec<PathBuf>,
    outputs: Vec<MemOutput>,
}

#[derive(Clone, Default)]
pub struct MemoryLibrary {
    files: HashMap<PathBuf, MemFile>,
    broken: HashSet<PathBuf>,
    bad_filters: HashSet<String>,
    journal: Arc<Mutex<Journal>>,
}

impl MemoryLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a file whose packets carry the given timestamps and payloads.
    pub fn add_file(&mut self, path: impl Into<PathBuf>, packets: &[(Timeval, &str)]) {
        self.add_file_with_linktype(path, LINKTYPE_ETHERNET, packets);
    }

    pub fn add_file_with_linktype(
        &mut self,
        path: impl Into<PathBuf>,
        linktype: i32,
        packets: &[(Timeval, &str)],
    ) {
        let packets = packets
            .iter()
            .map(|(ts, payload)| PacketRecord::new(*ts, payload.as_bytes().to_vec()))
            .collect();
        self.files.insert(
            path.into(),
            MemFile {
                format: CaptureFormat { linktype },
                packets,
            },
        );
    }

    /// Makes opening `path` fail.
    pub fn break_file(&mut self, path: impl Into<PathBuf>) {
        self.broken.insert(path.into());
    }

    /// Makes `expression` fail to compile.
    pub fn reject_filter(&mut self, expression: &str) {
        self.bad_filters.insert(expression.to_string());
    }

    pub fn opens(&self) -> Vec<PathBuf> {
        self.journal.lock().unwrap().opens.clone()
    }

    pub fn outputs(&self) -> Vec<MemOutput> {
        self.journal.lock().unwrap().outputs.clone()
    }
}

pub struct MemReader {
    path: PathBuf,
    file: MemFile,
    position: usize,
    filter: Option<String>,
    bad_filters: HashSet<String>,
}

pub struct MemWriter {
    index: usize,
    journal: Arc<Mutex<Journal>>,
}

impl CaptureLibrary for MemoryLibrary {
    type Reader = MemReader;
    type Writer = MemWriter;

    fn open(&self, path: &Path) -> Result<MemReader, CaptureError> {
        self.journal.lock().unwrap().opens.push(path.to_path_buf());
        let file = match self.files.get(path) {
            Some(file) if !self.broken.contains(path) => file.clone(),
            _ => {
                return Err(CaptureError::OpenFailed {
                    path: path.to_path_buf(),
                    reason: "unknown file format".to_string(),
                })
            }
        };
        Ok(MemReader {
            path: path.to_path_buf(),
            file,
            position: 0,
            filter: None,
            bad_filters: self.bad_filters.clone(),
        })
    }

    fn create_output(
        &self,
        reader: &MemReader,
        target: &OutputTarget,
    ) -> Result<MemWriter, CaptureError> {
        let mut journal = self.journal.lock().unwrap();
        journal.outputs.push(MemOutput {
            target: target.clone(),
            format: reader.format(),
            packets: Vec::new(),
            flushes: 0,
            closed: false,
        });
        Ok(MemWriter {
            index: journal.outputs.len() - 1,
            journal: self.journal.clone(),
        })
    }
}

impl PacketReader for MemReader {
    fn install_filter(&mut self, expression: &str) -> Result<(), CaptureError> {
        if self.bad_filters.contains(expression) {
            return Err(CaptureError::FilterCompilation {
                expression: expression.to_string(),
                reason: "syntax error".to_string(),
            });
        }
        self.filter = Some(expression.to_string());
        Ok(())
    }

    fn next_packet(&mut self) -> Result<Option<PacketRecord>, CaptureError> {
        while let Some(packet) = self.file.packets.get(self.position) {
            self.position += 1;
            let matched = match &self.filter {
                Some(filter) => String::from_utf8_lossy(&packet.payload).contains(filter.as_str()),
                None => true,
            };
            if matched {
                return Ok(Some(packet.clone()));
            }
        }
        Ok(None)
    }

    fn format(&self) -> CaptureFormat {
        self.file.format
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl PacketWriter for MemWriter {
    fn write(&mut self, packet: &PacketRecord) -> Result<(), CaptureError> {
        let mut journal = self.journal.lock().unwrap();
        let output = &mut journal.outputs[self.index];
        assert!(!output.closed, "write after close");
        output.packets.push(packet.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), CaptureError> {
        self.journal.lock().unwrap().outputs[self.index].flushes += 1;
        Ok(())
    }

    fn close(self) -> Result<(), CaptureError> {
        let mut journal = self.journal.lock().unwrap();
        let output = &mut journal.outputs[self.index];
        assert!(!output.closed, "output closed twice");
        output.closed = true;
        Ok(())
    }
}
