use std::path::PathBuf;

use crate::time_resolver::types::Timeval;

/// A capture file in the spool together with the timestamp of its first
/// packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpoolEntry {
    pub path: PathBuf,
    pub start_time: Timeval,
}
