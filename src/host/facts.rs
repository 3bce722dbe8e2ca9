//! Request facts from the HTTP layer.

use std::net::SocketAddr;
use std::path::PathBuf;

use http::request::Parts;
use http::Version;

use crate::config::{DiagnosticsConfig, ServerConfig};
use crate::diagnostics::{fields, RawFacts};

/// Handler mode reported for requests served in-process.
pub const EMBEDDED_HANDLER: &str = "embedded";

/// Facts about the serving process that do not change per request.
#[derive(Debug, Clone)]
pub struct RuntimeFacts {
    pub interpreter_version: String,
    pub handler: String,
    pub bytecode_cache: bool,
    pub server_software: String,
    pub server_name: String,
    pub document_root: Option<PathBuf>,
}

impl RuntimeFacts {
    pub fn from_config(server: &ServerConfig, diagnostics: &DiagnosticsConfig) -> Self {
        Self {
            interpreter_version: crate::VERSION.to_string(),
            handler: EMBEDDED_HANDLER.to_string(),
            bytecode_cache: diagnostics.bytecode_cache,
            server_software: format!("request_diagnostics/{}", crate::PKG_VERSION),
            server_name: server.server_name.clone(),
            document_root: server.document_root.clone(),
        }
    }
}

/// Protocol version as it appears on a request line.
pub fn protocol_version(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_11 => "HTTP/1.1",
        Version::HTTP_2 => "HTTP/2.0",
        Version::HTTP_3 => "HTTP/3.0",
        _ => "HTTP/?",
    }
}

/// Turn request head, socket endpoints and process facts into [`RawFacts`].
///
/// Only headers of interest are forwarded; values that are not valid
/// visible ASCII are skipped.
pub fn collect(
    parts: &Parts,
    client: SocketAddr,
    server: SocketAddr,
    runtime: &RuntimeFacts,
) -> RawFacts {
    let mut facts = RawFacts::new();

    facts
        .insert(fields::CLIENT_ADDR, client.ip().to_string())
        .insert(fields::CLIENT_PORT, client.port())
        .insert(fields::SERVER_ADDR, server.ip().to_string())
        .insert(fields::SERVER_PORT, server.port());

    let uri = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    facts
        .insert(fields::METHOD, parts.method.as_str())
        .insert(fields::URI, uri)
        .insert(fields::PROTOCOL_VERSION, protocol_version(parts.version));

    for key in fields::HEADERS_OF_INTEREST {
        let name = &key[fields::HEADER_PREFIX.len()..];
        if let Some(value) = parts.headers.get(name).and_then(|v| v.to_str().ok()) {
            facts.insert(key, value);
        }
    }

    // HTTP/2 carries the host in the :authority pseudo-header.
    if facts.get(fields::HEADER_HOST).is_none() {
        if let Some(authority) = parts.uri.authority() {
            facts.insert(fields::HEADER_HOST, authority.as_str());
        }
    }

    facts
        .insert(fields::INTERPRETER_VERSION, runtime.interpreter_version.as_str())
        .insert(fields::HANDLER, runtime.handler.as_str())
        .insert(fields::BYTECODE_CACHE, runtime.bytecode_cache)
        .insert(fields::SERVER_SOFTWARE, runtime.server_software.as_str())
        .insert(fields::SERVER_NAME, runtime.server_name.as_str());

    let path = parts.uri.path();
    facts.insert(fields::SCRIPT_NAME, path);
    if let Some(ref root) = runtime.document_root {
        facts.insert(fields::DOCUMENT_ROOT, root.display().to_string());
        facts.insert(
            fields::SCRIPT_FILENAME,
            root.join(path.trim_start_matches('/')).display().to_string(),
        );
    }

    facts
}
