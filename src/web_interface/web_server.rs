use std::net::SocketAddr;
use std::sync::Arc;

use log::info;

use super::routes::{routes, FetchContext};
use crate::configuration::ServerConfig;
use crate::error_handling::types::{ConfigError, WebError};

/// HTTP front end serving extractions from the configured spools.
pub struct WebServer {
    addr: SocketAddr,
    context: Arc<FetchContext>,
}

impl WebServer {
    /// Creates a server whose extractions run the current executable.
    pub fn new(config: ServerConfig) -> Result<Self, WebError> {
        let program = std::env::current_exe().map_err(WebError::SpawnFailed)?;
        let addr = config
            .socket_addr()
            .map_err(|e: ConfigError| WebError::BindFailed(e.to_string()))?;
        Ok(Self {
            addr,
            context: Arc::new(FetchContext::new(config.spools, config.fetch, program)),
        })
    }

    /// Serves until interrupted with Ctrl-C.
    pub async fn start(self) -> Result<(), WebError> {
        let shutdown = async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupted, shutting down");
            }
        };
        let (addr, server) = warp::serve(routes(self.context.clone()))
            .try_bind_with_graceful_shutdown(self.addr, shutdown)
            .map_err(|e| WebError::BindFailed(format!("{}: {}", self.addr, e)))?;
        for spool in &self.context.spools {
            info!(
                "Serving spool \"{}\" from {} (prefix \"{}\")",
                spool.name,
                spool.directory.display(),
                spool.prefix
            );
        }
        info!("Listening on http://{}", addr);
        server.await;
        Ok(())
    }
}
