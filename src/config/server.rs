//! Diagnostics server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

use super::parse::Env;
use super::ConfigError;

/// Where the diagnostics server listens and what it reports about itself.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Server listen address.
    pub listen_addr: SocketAddr,
    /// Reported as `server_name`.
    pub server_name: String,
    /// Reported as `document_root` when set.
    pub document_root: Option<PathBuf>,
}

impl ServerConfig {
    pub(crate) fn load(env: &Env<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            listen_addr: env.parse("LISTEN_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?,
            server_name: env.or("SERVER_NAME", "localhost"),
            document_root: env.opt("DOCUMENT_ROOT").map(PathBuf::from),
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            server_name: "localhost".to_string(),
            document_root: None,
        }
    }
}
