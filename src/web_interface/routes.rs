use bytes::Bytes;
use log::{error, info, warn};
use rust_embed::RustEmbed;
use std::convert::Infallible;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use uuid::Uuid;
use warp::hyper::Body;
use warp::path::Tail;
use warp::reply::Response;
use warp::{http::StatusCode, reply, Filter, Rejection, Reply};

use super::types::{ApiError, FetchParams, SpoolResponse};
use crate::configuration::types::{FetchSection, SpoolSection};
use crate::event_decoding::decoder_chain::DecoderChain;
use crate::extraction::types::{EXIT_NO_FILES, EXIT_NO_FILES_IN_RANGE};
use crate::streaming::consumer::{self, drain};
use crate::streaming::job::{ChildJob, ExtractCommand, ExtractionJob};
use crate::streaming::types::{DrainOutcome, Message};
use crate::time_resolver::resolver::resolve;
use crate::time_resolver::types::Resolved;

const FORM_LIMIT: u64 = 64 * 1024;
const PCAP_CONTENT_TYPE: &str = "application/vnd.tcpdump.pcap";
const NO_PACKETS: &str = "No packets matched filter and/or time range.";
const DEFAULT_DURATION: &str = "1m";

#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/www/"]
struct Asset;

/// Starts an extraction job for a prepared command line.
pub type Launcher = dyn Fn(&ExtractCommand) -> io::Result<ChildJob> + Send + Sync;

/// A fetch request checked and turned into an extractor command line.
#[derive(Debug)]
pub struct PreparedFetch {
    pub command: ExtractCommand,
    pub filename: String,
}

/// Everything a request handler needs, shared read-only between requests.
pub struct FetchContext {
    pub spools: Vec<SpoolSection>,
    pub fetch: FetchSection,
    pub program: PathBuf,
    decoders: DecoderChain,
    launcher: Box<Launcher>,
}

impl FetchContext {
    pub fn new(spools: Vec<SpoolSection>, fetch: FetchSection, program: PathBuf) -> Self {
        Self::with_launcher(spools, fetch, program, Box::new(ExtractCommand::spawn))
    }

    pub fn with_launcher(
        spools: Vec<SpoolSection>,
        fetch: FetchSection,
        program: PathBuf,
        launcher: Box<Launcher>,
    ) -> Self {
        Self {
            spools,
            fetch,
            program,
            decoders: DecoderChain::default(),
            launcher,
        }
    }

    /// The named spool, or the first configured one when no name is given.
    pub fn spool(&self, name: Option<&str>) -> Result<&SpoolSection, String> {
        match name {
            Some(name) => self
                .spools
                .iter()
                .find(|spool| spool.name == name)
                .ok_or_else(|| format!("spool {} not configured", name)),
            None => self
                .spools
                .first()
                .ok_or_else(|| "no spools configured".to_string()),
        }
    }

    /// Picks the spool and fills in what the request leaves out: the zone
    /// offset from the configuration, and for an event with a timestamp but
    /// no span of its own, a window of `duration-before`/`duration-after`
    /// around that timestamp.
    pub fn prepare(&self, params: FetchParams) -> Result<PreparedFetch, String> {
        let spool = self.spool(non_blank(params.spool).as_deref())?;
        let query = non_blank(params.query);
        let filter = query.as_deref().map(|text| self.decoders.decode(text));
        let tz_offset = non_blank(params.tzoffset).or_else(|| self.fetch.tz_offset.clone());

        let mut start = non_blank(params.start_time);
        let mut end = non_blank(params.end_time);
        let around_event = filter
            .as_ref()
            .is_some_and(|f| f.reference.is_some() && f.span.is_none());
        if start.is_none() && end.is_none() && around_event {
            start = Some(relative_duration("duration-before", params.duration_before)?);
            end = Some(relative_duration("duration-after", params.duration_after)?);
        }

        let filename = filter
            .and_then(|f| f.filename)
            .unwrap_or_else(|| self.fetch.filename.clone());
        let command = ExtractCommand::new(&self.program, &spool.directory, &spool.prefix)
            .start(start)
            .end(end)
            .tz_offset(tz_offset)
            .event(query);
        Ok(PreparedFetch { command, filename })
    }
}

/// A relative duration such as `5m`, defaulting to one minute.
fn relative_duration(param: &str, value: Option<String>) -> Result<String, String> {
    let text = non_blank(value).unwrap_or_else(|| DEFAULT_DURATION.to_string());
    match resolve(&text, None) {
        Ok(Resolved::Relative(_)) => Ok(text),
        _ => Err(format!("invalid {}: {}", param, text)),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn with_context(
    context: Arc<FetchContext>,
) -> impl Filter<Extract = (Arc<FetchContext>,), Error = Infallible> + Clone {
    warp::any().map(move || context.clone())
}

/// All routes of the web interface.
pub fn routes(
    context: Arc<FetchContext>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    fetch_route(context.clone())
        .or(spools_route(context))
        .or(static_route())
        .with(warp::log("spoolslice::web"))
}

/// GET|POST /fetch
pub fn fetch_route(
    context: Arc<FetchContext>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let get = warp::get().and(warp::query::<FetchParams>());
    let post = warp::post()
        .and(warp::body::content_length_limit(FORM_LIMIT))
        .and(warp::body::form::<FetchParams>());

    warp::path("fetch")
        .and(warp::path::end())
        .and(get.or(post).unify())
        .and(warp::header::optional::<String>("accept"))
        .and(with_context(context))
        .and_then(fetch_handler)
}

/// GET /api/spools
pub fn spools_route(
    context: Arc<FetchContext>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "spools")
        .and(warp::get())
        .and(with_context(context))
        .map(|context: Arc<FetchContext>| {
            let spools: Vec<SpoolResponse> = context
                .spools
                .iter()
                .map(|spool| SpoolResponse {
                    name: spool.name.clone(),
                    directory: spool.directory.clone(),
                    prefix: spool.prefix.clone(),
                })
                .collect();
            reply::json(&spools)
        })
}

/// GET /* from the embedded web assets
pub fn static_route() -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::get()
        .and(warp::path::tail())
        .map(|tail: Tail| serve_asset(tail.as_str()))
}

async fn fetch_handler(
    params: FetchParams,
    accept: Option<String>,
    context: Arc<FetchContext>,
) -> Result<Response, Rejection> {
    let request_id = Uuid::new_v4().to_string();
    info!("[{}] Fetch request: {:?}", request_id, params);
    let wants_html = accept.is_some_and(|a| a.contains("html"));

    let prepared = match context.prepare(params) {
        Ok(prepared) => prepared,
        Err(message) => {
            warn!("[{}] Rejected fetch request: {}", request_id, message);
            return Ok(bad_request(&message, wants_html));
        }
    };
    let mut job = match (context.launcher)(&prepared.command) {
        Ok(job) => job,
        Err(e) => {
            error!("[{}] Failed to start extraction: {}", request_id, e);
            return Ok(text_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to start extraction",
            ));
        }
    };
    let Some((data, diag)) = job.take_channels() else {
        error!("[{}] Extraction started without output channels", request_id);
        return Ok(text_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to start extraction",
        ));
    };

    let (tx, mut rx) = consumer::channel();
    let drain_id = request_id.clone();
    tokio::spawn(async move {
        drain(&mut job, data, diag, tx, &drain_id).await;
    });

    // the status line waits for the first message, so "no packets" and
    // errors can still be reported with a proper status code
    let response = match rx.recv().await {
        Some(Message::Chunk(first)) => {
            info!("[{}] Streaming capture data", request_id);
            stream_response(first, rx, &prepared.filename, request_id)
        }
        Some(Message::Finished(outcome)) => finished_response(&outcome, wants_html),
        None => {
            error!("[{}] Extraction ended without a result", request_id);
            text_response(StatusCode::INTERNAL_SERVER_ERROR, "Extraction failed")
        }
    };
    Ok(response)
}

fn stream_response(
    first: Bytes,
    rx: mpsc::Receiver<Message>,
    filename: &str,
    request_id: String,
) -> Response {
    let body = Body::wrap_stream(body_stream(first, rx, request_id));
    let response = warp::http::Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", PCAP_CONTENT_TYPE)
        .header(
            "Content-Disposition",
            format!("attachment; filename={}", filename),
        )
        .body(body);
    match response {
        Ok(response) => response,
        Err(e) => {
            error!("Failed to build response: {}", e);
            text_response(StatusCode::INTERNAL_SERVER_ERROR, "Extraction failed")
        }
    }
}

/// Chunks become body data. A failure after data has been sent can only
/// abort the body.
fn body_stream(
    first: Bytes,
    rx: mpsc::Receiver<Message>,
    request_id: String,
) -> impl Stream<Item = Result<Bytes, io::Error>> + Send + 'static {
    tokio_stream::once(Message::Chunk(first))
        .chain(ReceiverStream::new(rx))
        .filter_map(move |message| match message {
            Message::Chunk(chunk) => Some(Ok(chunk)),
            Message::Finished(DrainOutcome::Failure {
                status,
                diagnostics,
                ..
            }) => {
                warn!(
                    "[{}] Extraction failed mid-stream with status {}: {}",
                    request_id, status, diagnostics
                );
                Some(Err(io::Error::other(format!(
                    "extraction exited with status {}",
                    status
                ))))
            }
            Message::Finished(_) => None,
        })
}

/// Maps an extraction that finished before sending any data to a response.
pub fn finished_response(outcome: &DrainOutcome, wants_html: bool) -> Response {
    match outcome {
        DrainOutcome::NoData => text_response(StatusCode::NOT_FOUND, NO_PACKETS),
        DrainOutcome::Failure {
            status, bytes: 0, ..
        } if *status == EXIT_NO_FILES || *status == EXIT_NO_FILES_IN_RANGE => {
            text_response(StatusCode::NOT_FOUND, NO_PACKETS)
        }
        DrainOutcome::Failure { diagnostics, .. } => bad_request(diagnostics, wants_html),
        DrainOutcome::Data { .. } | DrainOutcome::Disconnected => {
            text_response(StatusCode::INTERNAL_SERVER_ERROR, "Extraction failed")
        }
    }
}

fn bad_request(message: &str, wants_html: bool) -> Response {
    if wants_html {
        reply::with_status(reply::html(error_page(message)), StatusCode::BAD_REQUEST)
            .into_response()
    } else {
        text_response(StatusCode::BAD_REQUEST, message)
    }
}

fn text_response(status: StatusCode, message: &str) -> Response {
    reply::with_status(message.to_string(), status).into_response()
}

fn error_page(diagnostics: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html><head><title>Extraction failed</title></head>\n\
         <body><h1>Extraction failed</h1>\n<pre>{}</pre>\n<p><a href=\"/\">Back</a></p></body></html>\n",
        escape_html(diagnostics)
    )
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn serve_asset(path: &str) -> Response {
    let path = if path.is_empty() { "index.html" } else { path };
    match Asset::get(path) {
        Some(file) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            reply::with_header(file.data.into_owned(), "Content-Type", mime.as_ref())
                .into_response()
        }
        None => reply::with_status(
            reply::json(&ApiError {
                message: format!("No resource at path: {}", path),
            }),
            StatusCode::NOT_FOUND,
        )
        .into_response(),
    }
}
