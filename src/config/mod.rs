//! Configuration module for request_diagnostics.
//!
//! This module provides centralized configuration loading from environment variables.
//!
//! # Example
//!
//! ```rust,ignore
//! use request_diagnostics::config::Config;
//!
//! let config = Config::from_env()?;
//! println!("Listen address: {}", config.server.listen_addr);
//! println!("Load threshold: {}", config.diagnostics.load_threshold);
//! ```

mod diagnostics;
mod error;
mod logging;
mod parse;
mod server;

pub use diagnostics::DiagnosticsConfig;
pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use server::ServerConfig;

use parse::Env;

/// Complete application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Report generation settings.
    pub diagnostics: DiagnosticsConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&parse::process_env)
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env::new(lookup);
        Ok(Self {
            server: ServerConfig::load(&env)?,
            diagnostics: DiagnosticsConfig::load(&env)?,
            logging: LoggingConfig::load(&env)?,
        })
    }

    /// Print configuration summary to log.
    pub fn log_summary(&self) {
        use tracing::info;

        info!("Configuration loaded:");
        info!("  Listen: {}", self.server.listen_addr);
        info!("  Server name: {}", self.server.server_name);
        if let Some(ref root) = self.server.document_root {
            info!("  Document root: {}", root.display());
        }
        info!("  Load threshold: {}", self.diagnostics.load_threshold);
        info!(
            "  Bytecode cache: {}",
            if self.diagnostics.bytecode_cache { "enabled" } else { "disabled" }
        );
        info!("  Workload iterations: {}", self.diagnostics.workload_iterations);

        if self.diagnostics.bench_iterations > 0 {
            info!("  Benchmark iterations: {}", self.diagnostics.bench_iterations);
        } else {
            info!("  Benchmark: disabled");
        }

        info!("  Log filter: {}", self.logging.filter);
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            diagnostics: DiagnosticsConfig::default(),
            logging: LoggingConfig {
                filter: "request_diagnostics=info".to_string(),
                service_name: "request_diagnostics".to_string(),
                format: LogFormat::Json,
            },
        }
    }
}
