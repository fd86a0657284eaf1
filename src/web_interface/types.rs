use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Parameters of a `/fetch` request, from the query string or a form body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FetchParams {
    /// Event text or a raw capture filter.
    pub query: Option<String>,
    #[serde(rename = "start-time")]
    pub start_time: Option<String>,
    #[serde(rename = "end-time")]
    pub end_time: Option<String>,
    pub tzoffset: Option<String>,
    /// Window around an event's timestamp, used when neither bound is given.
    #[serde(rename = "duration-before")]
    pub duration_before: Option<String>,
    #[serde(rename = "duration-after")]
    pub duration_after: Option<String>,
    /// Name of the spool to extract from; the first configured one otherwise.
    pub spool: Option<String>,
}

/// API error payload
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub message: String,
}

/// One entry of `/api/spools`.
#[derive(Debug, Serialize)]
pub struct SpoolResponse {
    pub name: String,
    pub directory: PathBuf,
    pub prefix: String,
}
