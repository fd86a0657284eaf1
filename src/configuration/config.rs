use super::types::*;
use crate::error_handling::types::ConfigError;
use crate::time_resolver::resolver::parse_zone_offset;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;

/// Server configuration, read from a TOML file.
///
/// # Examples
///
/// ```toml
/// [server]
/// bind = "0.0.0.0"
/// port = 7000
///
/// [[spool]]
/// name = "sensor1"
/// directory = "/var/log/capture"
/// prefix = "log.pcap"
///
/// [[spool]]
/// name = "sensor2"
/// directory = "/var/log/capture2"
/// prefix = "eth1.pcap"
///
/// [fetch]
/// tz_offset = "-0600"
/// ```
///
/// At least one `[[spool]]` is required, and the first one serves requests
/// that don't name a spool. `[server]` defaults to `127.0.0.1:7000` and
/// `[fetch]` to no default zone offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(rename = "spool", default)]
    pub spools: Vec<SpoolSection>,
    #[serde(default)]
    pub fetch: FetchSection,
}

impl ServerConfig {
    /// Reads and validates the configuration file at `path`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!("Loading configuration from {}", path.display());
        let text = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        info!(
            "Loaded configuration from {} with {} spools",
            path.display(),
            config.spools.len()
        );
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig =
            toml::from_str(text).map_err(|e| ConfigError::TomlError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks what can be checked before serving: spools are present, named
    /// uniquely and point at existing directories; the bind address parses
    /// and the default zone offset is well formed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.spools.is_empty() {
            return Err(ConfigError::NoSpools);
        }
        let mut names = HashSet::new();
        for spool in &self.spools {
            if !names.insert(spool.name.as_str()) {
                return Err(ConfigError::DuplicateSpool(spool.name.clone()));
            }
            if !spool.directory.is_dir() {
                return Err(ConfigError::DirectoryDoesNotExist(
                    spool.directory.display().to_string(),
                ));
            }
        }
        self.socket_addr()?;
        if let Some(offset) = &self.fetch.tz_offset {
            parse_zone_offset(offset)
                .map_err(|e| ConfigError::InvalidTimezoneOffset(e.to_string()))?;
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .server
            .bind
            .parse()
            .map_err(|_| ConfigError::BadBindAddress(self.server.bind.clone()))?;
        Ok(SocketAddr::new(ip, self.server.port))
    }

    /// Replaces the configured port, as done by `--port` on the command line.
    pub fn with_port(mut self, port: Option<u16>) -> Self {
        if let Some(port) = port {
            self.server.port = port;
        }
        self
    }
}
