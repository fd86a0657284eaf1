use super::engine::Extractor;
use super::types::*;
use crate::capture_library::capture_trait::CaptureLibrary;
use crate::error_handling::types::ExtractError;
use crate::event_decoding::decoder_chain::DecoderChain;
use crate::spool::spool_selector::{list_candidates, narrow};
use crate::time_resolver::resolver::resolve_window;
use crate::time_resolver::types::Timeval;

use log::{debug, info, warn};

/// Runs one extraction from request to output.
///
/// The event is decoded and the time window resolved before the spool is
/// touched, so a malformed timestamp never costs any file I/O. Running out
/// of candidate files is reported as an outcome rather than an error.
pub fn run_request<L: CaptureLibrary>(
    library: &L,
    decoders: &DecoderChain,
    request: &ExtractRequest,
    now: Timeval,
) -> Result<ExtractOutcome, ExtractError> {
    let filter = request
        .event
        .as_deref()
        .map(str::trim)
        .filter(|event| !event.is_empty())
        .map(|event| decoders.decode(event));
    if let Some(filter) = &filter {
        info!("Using filter \"{}\"", filter.expression);
    }

    let mut window = resolve_window(
        request.start.as_deref(),
        request.end.as_deref(),
        request.tz_offset.as_deref(),
        filter.as_ref().and_then(|f| f.reference),
        now,
    )?;
    // a flow record brings its own window when none was asked for
    if request.start.is_none() && request.end.is_none() {
        if let Some(span) = filter.as_ref().and_then(|f| f.span) {
            window = span;
        }
    }
    info!(
        "Time window: {} to {}",
        window.start.map_or("-".to_string(), |ts| ts.to_string()),
        window.end.map_or("-".to_string(), |ts| ts.to_string())
    );

    let candidates = list_candidates(library, &request.directory, &request.prefix)?;
    if candidates.is_empty() {
        warn!(
            "No files found in {} with prefix \"{}\"",
            request.directory.display(),
            request.prefix
        );
        return Ok(ExtractOutcome::NoFilesFound);
    }

    let files = narrow(candidates, &window);
    if files.is_empty() {
        warn!("No files found within the requested time range");
        return Ok(ExtractOutcome::NoPacketsInRange);
    }
    for file in &files {
        debug!("Selected {} (starts {})", file.path.display(), file.start_time);
    }

    let summary = Extractor::new(library)
        .with_empty_stream_header(request.empty_stream_header)
        .extract(
            &files,
            &window,
            filter.as_ref().map(|f| f.expression.as_str()),
            &request.target,
        )?;
    Ok(ExtractOutcome::Extracted(summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture_library::memory::MemoryLibrary;
    use crate::capture_library::types::OutputTarget;
    use crate::error_handling::types::{SpoolError, TimeError};
    use std::fs::File;
    use std::path::Path;
    use tempfile::TempDir;

    fn ts(secs: i64) -> Timeval {
        Timeval::from_secs(secs)
    }

    fn request(dir: &Path) -> ExtractRequest {
        ExtractRequest {
            directory: dir.to_path_buf(),
            prefix: "log.pcap".to_string(),
            start: None,
            end: None,
            tz_offset: None,
            event: None,
            target: OutputTarget::Stream,
            empty_stream_header: false,
        }
    }

    fn spool(dir: &TempDir) -> MemoryLibrary {
        let mut library = MemoryLibrary::new();
        for (name, packets) in [
            ("log.pcap.1", vec![(ts(1000), "tcp 1"), (ts(1010), "udp 2")]),
            ("log.pcap.2", vec![(ts(2000), "tcp 3"), (ts(2010), "udp 4")]),
        ] {
            let path = dir.path().join(name);
            File::create(&path).unwrap();
            library.add_file(path, &packets);
        }
        library
    }

    #[test]
    fn extracts_within_window() {
        let dir = TempDir::new().unwrap();
        let library = spool(&dir);
        let mut req = request(dir.path());
        req.start = Some("1970-01-01T00:16:45Z".to_string());
        req.end = Some("1h".to_string());

        let outcome = run_request(&library, &DecoderChain::default(), &req, ts(5000)).unwrap();
        match outcome {
            ExtractOutcome::Extracted(summary) => assert_eq!(summary.packets_written, 3),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(outcome.exit_code(), EXIT_SUCCESS);
    }

    #[test]
    fn raw_filter_passes_through() {
        let dir = TempDir::new().unwrap();
        let library = spool(&dir);
        let mut req = request(dir.path());
        req.event = Some("udp".to_string());

        run_request(&library, &DecoderChain::default(), &req, ts(5000)).unwrap();
        assert_eq!(library.outputs()[0].packets.len(), 2);
    }

    #[test]
    fn flow_event_span_is_the_default_window() {
        let flow = r#"{"event_type":"flow","src_ip":"10.0.0.1","dest_ip":"10.0.0.2","proto":"TCP","flow":{"start":"1970-01-01T00:16:50Z","end":"1970-01-01T00:33:20Z"}}"#;
        let expression = "proto 6 and ((host 10.0.0.1) and (host 10.0.0.2))";
        let dir = TempDir::new().unwrap();
        let mut library = MemoryLibrary::new();
        for (name, first) in [("log.pcap.1", 1000), ("log.pcap.2", 2000)] {
            let path = dir.path().join(name);
            File::create(&path).unwrap();
            library.add_file(path, &[(ts(first), expression), (ts(first + 10), expression)]);
        }

        // the flow spans [1009, 2001)
        let mut req = request(dir.path());
        req.event = Some(flow.to_string());
        run_request(&library, &DecoderChain::default(), &req, ts(5000)).unwrap();
        let times: Vec<i64> = library.outputs()[0]
            .packets
            .iter()
            .map(|p| p.timestamp.secs())
            .collect();
        assert_eq!(times, vec![1010, 2000]);

        // explicit bounds win over the span
        req.start = Some("1970-01-01T00:00:00Z".to_string());
        run_request(&library, &DecoderChain::default(), &req, ts(5000)).unwrap();
        assert_eq!(library.outputs()[1].packets.len(), 4);
    }

    #[test]
    fn no_files_found() {
        let dir = TempDir::new().unwrap();
        let library = spool(&dir);
        let mut req = request(dir.path());
        req.prefix = "nothing".to_string();

        let outcome = run_request(&library, &DecoderChain::default(), &req, ts(5000)).unwrap();
        assert_eq!(outcome, ExtractOutcome::NoFilesFound);
        assert_eq!(outcome.exit_code(), EXIT_NO_FILES);
    }

    #[test]
    fn no_files_in_range() {
        let dir = TempDir::new().unwrap();
        let library = spool(&dir);
        let mut req = request(dir.path());
        req.end = Some("1970-01-01T00:00:10Z".to_string());

        let outcome = run_request(&library, &DecoderChain::default(), &req, ts(5000)).unwrap();
        assert_eq!(outcome, ExtractOutcome::NoPacketsInRange);
        assert_eq!(outcome.exit_code(), EXIT_NO_FILES_IN_RANGE);
    }

    #[test]
    fn bad_timestamp_fails_before_io() {
        let dir = TempDir::new().unwrap();
        let library = spool(&dir);
        let mut req = request(dir.path());
        req.start = Some("2012-13-45".to_string());

        let err = run_request(&library, &DecoderChain::default(), &req, ts(5000)).unwrap_err();
        assert!(matches!(err, ExtractError::Time(TimeError::InvalidTimestamp(_))));
        assert!(library.opens().is_empty());

        let mut req = request(dir.path());
        req.tz_offset = Some("+1".to_string());
        let err = run_request(&library, &DecoderChain::default(), &req, ts(5000)).unwrap_err();
        assert!(matches!(err, ExtractError::Time(TimeError::InvalidTimezoneOffset(_))));
        assert!(library.opens().is_empty());
    }

    #[test]
    fn missing_directory_is_fatal() {
        let library = MemoryLibrary::new();
        let req = request(Path::new("/nonexistent/spool"));
        let err = run_request(&library, &DecoderChain::default(), &req, ts(0)).unwrap_err();
        assert!(matches!(err, ExtractError::Spool(SpoolError::DirectoryUnreadable(..))));
    }
}
