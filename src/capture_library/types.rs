use std::fmt;
use std::path::PathBuf;

use crate::time_resolver::types::Timeval;

/// A single packet lifted out of a capture file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketRecord {
    pub timestamp: Timeval,
    pub captured_length: u32,
    pub original_length: u32,
    pub payload: Vec<u8>,
}

impl PacketRecord {
    pub fn new(timestamp: Timeval, payload: Vec<u8>) -> Self {
        let len = payload.len() as u32;
        Self {
            timestamp,
            captured_length: len,
            original_length: len,
            payload,
        }
    }
}

/// Format parameters of a capture file. Outputs created from a reader
/// inherit its link type and snap length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureFormat {
    pub linktype: i32,
}

/// Where extracted packets go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    File(PathBuf),
    Stream,
}

impl OutputTarget {
    /// `-` selects standard output, anything else is a file path.
    pub fn from_arg(arg: &str) -> Self {
        match arg {
            "-" => OutputTarget::Stream,
            path => OutputTarget::File(PathBuf::from(path)),
        }
    }
}

impl fmt::Display for OutputTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputTarget::File(path) => write!(f, "{}", path.display()),
            OutputTarget::Stream => write!(f, "<stdout>"),
        }
    }
}
