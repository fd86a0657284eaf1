use std::path::PathBuf;

use crate::capture_library::types::OutputTarget;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_NO_FILES: i32 = 2;
pub const EXIT_NO_FILES_IN_RANGE: i32 = 3;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExtractSummary {
    pub files_processed: usize,
    pub packets_written: u64,
    pub sink_created: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractOutcome {
    Extracted(ExtractSummary),
    NoFilesFound,
    NoPacketsInRange,
}

impl ExtractOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            ExtractOutcome::Extracted(_) => EXIT_SUCCESS,
            ExtractOutcome::NoFilesFound => EXIT_NO_FILES,
            ExtractOutcome::NoPacketsInRange => EXIT_NO_FILES_IN_RANGE,
        }
    }
}

/// Everything needed to run one extraction, as given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractRequest {
    pub directory: PathBuf,
    pub prefix: String,
    pub start: Option<String>,
    pub end: Option<String>,
    pub tz_offset: Option<String>,
    /// Alert line, EVE record or raw capture filter.
    pub event: Option<String>,
    pub target: OutputTarget,
    /// Write an empty capture header to a stream target when nothing matched.
    pub empty_stream_header: bool,
}
