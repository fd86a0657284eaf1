//! Spool retention.
//!
//! Capture files are ranked newest first by modification time. Everything
//! past the newest `N` files, or past a total size budget, is selected for
//! deletion. Nothing is removed unless `force` is set.

use crate::error_handling::types::PurgeError;

use log::{error, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

const CAPTURE_EXTENSIONS: [&str; 3] = [".pcap", ".pcapng", ".cap"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPolicy {
    KeepFiles(usize),
    MaxSize(u64),
}

#[derive(Debug, Clone)]
pub struct PurgeOptions {
    pub directory: PathBuf,
    pub prefix: Option<String>,
    pub policy: RetentionPolicy,
    pub force: bool,
}

#[derive(Debug, Clone)]
pub struct FileInfo {
    pub path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
}

/// What a purge pass selected and what it managed to delete.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PurgeReport {
    pub selected: Vec<PathBuf>,
    pub selected_bytes: u64,
    pub deleted: usize,
    pub failed: usize,
}

impl RetentionPolicy {
    /// Builds the policy from the two mutually exclusive command line options.
    pub fn from_options(
        keep_files: Option<usize>,
        max_size: Option<&str>,
    ) -> Result<RetentionPolicy, PurgeError> {
        match (keep_files, max_size) {
            (Some(count), _) => Ok(RetentionPolicy::KeepFiles(count)),
            (None, Some(size)) => Ok(RetentionPolicy::MaxSize(parse_size(size)?)),
            (None, None) => Err(PurgeError::NoPolicy),
        }
    }
}

/// Parses a size such as `10G`, `500M`, `4k` or a plain byte count. Units
/// are powers of 1024 and may carry a fraction (`1.5G`).
pub fn parse_size(text: &str) -> Result<u64, PurgeError> {
    let normalized = text.trim().to_uppercase();
    let bad = || PurgeError::BadSize(text.to_string());

    let (number, multiplier) = match normalized.chars().last() {
        Some('G') => (&normalized[..normalized.len() - 1], 1024.0 * 1024.0 * 1024.0),
        Some('M') => (&normalized[..normalized.len() - 1], 1024.0 * 1024.0),
        Some('K') => (&normalized[..normalized.len() - 1], 1024.0),
        _ => return normalized.parse::<u64>().map_err(|_| bad()),
    };

    let value: f64 = number.trim().parse().map_err(|_| bad())?;
    if !value.is_finite() || value < 0.0 {
        return Err(bad());
    }
    Ok((value * multiplier) as u64)
}

fn is_capture_file(name: &str) -> bool {
    CAPTURE_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

/// Lists capture files in `directory`, newest first. Symlinks are not
/// followed.
pub fn collect_capture_files(
    directory: &Path,
    prefix: Option<&str>,
) -> Result<Vec<FileInfo>, PurgeError> {
    if !directory.exists() {
        return Err(PurgeError::DirectoryDoesNotExist(
            directory.display().to_string(),
        ));
    }
    if !directory.is_dir() {
        return Err(PurgeError::NotADirectory(directory.display().to_string()));
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !is_capture_file(name) {
            continue;
        }
        if prefix.is_some_and(|prefix| !name.starts_with(prefix)) {
            continue;
        }

        let metadata = entry.metadata()?;
        files.push(FileInfo {
            path: entry.path(),
            size: metadata.len(),
            modified: metadata.modified()?,
        });
    }

    files.sort_by(|a, b| b.modified.cmp(&a.modified));
    Ok(files)
}

/// Selects every file after the newest `keep`.
pub fn select_by_count(files: &[FileInfo], keep: usize) -> Vec<&FileInfo> {
    files.iter().skip(keep).collect()
}

/// Keeps the newest files while they fit in `max_bytes`; the first file that
/// doesn't fit and everything older is selected.
pub fn select_by_size(files: &[FileInfo], max_bytes: u64) -> Vec<&FileInfo> {
    let mut total = 0u64;
    let keep = files
        .iter()
        .take_while(|file| {
            total = total.saturating_add(file.size);
            total <= max_bytes
        })
        .count();
    files[keep..].iter().collect()
}

/// Runs a single purge pass.
pub fn run_once(options: &PurgeOptions) -> Result<PurgeReport, PurgeError> {
    let files = collect_capture_files(&options.directory, options.prefix.as_deref())?;
    if files.is_empty() {
        info!(
            "No capture files found in {}",
            options.directory.display()
        );
        return Ok(PurgeReport::default());
    }

    let selected = match options.policy {
        RetentionPolicy::KeepFiles(keep) => select_by_count(&files, keep),
        RetentionPolicy::MaxSize(max_bytes) => select_by_size(&files, max_bytes),
    };

    let mut report = PurgeReport {
        selected: selected.iter().map(|f| f.path.clone()).collect(),
        selected_bytes: selected.iter().map(|f| f.size).sum(),
        ..PurgeReport::default()
    };

    if selected.is_empty() {
        info!("No files need to be deleted");
        return Ok(report);
    }

    let megabytes = report.selected_bytes as f64 / 1024.0 / 1024.0;
    if !options.force {
        info!("Would delete {} files ({:.2} MB)", selected.len(), megabytes);
        for file in &selected {
            info!("  {}", file.path.display());
        }
        warn!("To actually delete these files, run with --force");
        return Ok(report);
    }

    info!("Deleting {} files ({:.2} MB)", selected.len(), megabytes);
    for file in &selected {
        match fs::remove_file(&file.path) {
            Ok(()) => {
                report.deleted += 1;
                info!("Deleted: {}", file.path.display());
            }
            Err(e) => {
                report.failed += 1;
                error!("Failed to delete {}: {}", file.path.display(), e);
            }
        }
    }
    info!(
        "Deleted {} files successfully, {} errors",
        report.deleted, report.failed
    );
    Ok(report)
}

/// Repeats the purge every `interval_minutes` until the task is dropped.
/// Failed passes are logged and retried on the next tick.
pub async fn run_periodic(options: PurgeOptions, interval_minutes: u64) {
    info!("Starting purge with {}-minute interval", interval_minutes);
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_minutes.max(1) * 60));
    loop {
        ticker.tick().await;
        let pass = options.clone();
        match tokio::task::spawn_blocking(move || run_once(&pass)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => error!("Purge failed: {}", e),
            Err(e) => error!("Purge task panicked: {}", e),
        }
        info!("Sleeping for {} minutes", interval_minutes);
    }
}
