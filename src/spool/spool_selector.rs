use super::types::SpoolEntry;
use crate::capture_library::capture_trait::{CaptureLibrary, PacketReader};
use crate::error_handling::types::SpoolError;
use crate::time_resolver::types::TimeWindow;

use log::{debug, trace};
use std::fs;
use std::path::Path;

/// Lists the capture files in `directory` whose name starts with `prefix`,
/// ordered by the timestamp of their first packet.
///
/// Each file is opened exactly once to read that first packet. Files holding
/// no packets at all are left out. A file that can't be opened or read fails
/// the whole listing.
pub fn list_candidates<L: CaptureLibrary>(
    library: &L,
    directory: &Path,
    prefix: &str,
) -> Result<Vec<SpoolEntry>, SpoolError> {
    let unreadable = |e: std::io::Error| SpoolError::DirectoryUnreadable(directory.to_path_buf(), e);

    let mut entries = Vec::new();
    for entry in fs::read_dir(directory).map_err(unreadable)? {
        let entry = entry.map_err(unreadable)?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }
        let matches_prefix = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(prefix));
        if !matches_prefix {
            trace!("Skipping {}", path.display());
            continue;
        }

        let mut reader = library.open(&path)?;
        match reader.next_packet()? {
            Some(packet) => {
                trace!("{} starts at {}", path.display(), packet.timestamp);
                entries.push(SpoolEntry {
                    path,
                    start_time: packet.timestamp,
                });
            }
            None => debug!("Ignoring {}, it holds no packets", path.display()),
        }
    }

    entries.sort_by(|a, b| {
        a.start_time
            .cmp(&b.start_time)
            .then_with(|| a.path.cmp(&b.path))
    });
    debug!(
        "Found {} candidate files in {} with prefix \"{}\"",
        entries.len(),
        directory.display(),
        prefix
    );
    Ok(entries)
}

/// Narrows an ordered file list to the files that can hold packets inside
/// `window`.
///
/// With an end bound, the leading run of files starting before it is kept.
/// With a start bound, files are kept scanning back from the newest one,
/// down to and including the first file that starts before it: that file
/// may still hold in-window packets near its tail.
///
/// Works at file granularity, so the last file kept may turn out to hold no
/// matching packets.
pub fn narrow(entries: Vec<SpoolEntry>, window: &TimeWindow) -> Vec<SpoolEntry> {
    let mut entries = entries;

    if let Some(end) = window.end {
        let keep = entries
            .iter()
            .take_while(|entry| entry.start_time < end)
            .count();
        entries.truncate(keep);
    }

    if let Some(start) = window.start {
        let first = entries
            .iter()
            .rposition(|entry| entry.start_time < start)
            .unwrap_or(0);
        entries.drain(..first);
    }

    debug!("{} files intersect the time window", entries.len());
    entries
}
