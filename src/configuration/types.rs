use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_bind() -> String {
    String::from("127.0.0.1")
}

fn default_port() -> u16 {
    7000
}

fn default_spool_name() -> String {
    String::from("default")
}

fn default_filename() -> String {
    String::from("spoolslice.pcap")
}

/// `[server]` table: where the HTTP interface listens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

/// One `[[spool]]` table: a named directory of rotating capture files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpoolSection {
    #[serde(default = "default_spool_name")]
    pub name: String,
    pub directory: PathBuf,
    pub prefix: String,
}

/// `[fetch]` table: defaults applied to fetch requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchSection {
    /// Zone offset used for timestamps that carry none, e.g. `-0600`.
    #[serde(default)]
    pub tz_offset: Option<String>,
    /// Suggested file name for downloads.
    #[serde(default = "default_filename")]
    pub filename: String,
}

impl Default for FetchSection {
    fn default() -> Self {
        Self {
            tz_offset: None,
            filename: default_filename(),
        }
    }
}
