//! Snapshot field names and their categories.
//!
//! Field names are plain lowercase keys. Request headers live under
//! `header.<lowercase-name>`.

use serde::Serialize;

// Connection
pub const CLIENT_ADDR: &str = "client_addr";
pub const CLIENT_PORT: &str = "client_port";
pub const SERVER_ADDR: &str = "server_addr";
pub const SERVER_PORT: &str = "server_port";

// Protocol
pub const METHOD: &str = "method";
pub const URI: &str = "uri";
pub const PROTOCOL_VERSION: &str = "protocol_version";
pub const HEADER_PREFIX: &str = "header.";
pub const HEADER_CONNECTION: &str = "header.connection";
pub const HEADER_ACCEPT_ENCODING: &str = "header.accept-encoding";
pub const HEADER_CONTENT_TYPE: &str = "header.content-type";
pub const HEADER_USER_AGENT: &str = "header.user-agent";
pub const HEADER_HOST: &str = "header.host";

// Runtime
pub const INTERPRETER_VERSION: &str = "interpreter_version";
pub const HANDLER: &str = "handler";
pub const MEMORY_USAGE_BYTES: &str = "memory_usage_bytes";
pub const MEMORY_PEAK_BYTES: &str = "memory_peak_bytes";
pub const MEMORY_LIMIT: &str = "memory_limit";
pub const BYTECODE_CACHE: &str = "bytecode_cache";
pub const LOAD_AVERAGE: &str = "load_average";
pub const CPU_COUNT: &str = "cpu_count";

// Timing
pub const REQUEST_RECEIVED: &str = "request_received";

// Server
pub const SERVER_SOFTWARE: &str = "server_software";
pub const SERVER_NAME: &str = "server_name";
pub const DOCUMENT_ROOT: &str = "document_root";
pub const SCRIPT_NAME: &str = "script_name";
pub const SCRIPT_FILENAME: &str = "script_filename";
/// Correlation id the host assigned to the request.
pub const REQUEST_ID: &str = "request_id";

/// Fields a snapshot cannot be built without, in the order they are checked.
pub const REQUIRED: [&str; 3] = [METHOD, URI, PROTOCOL_VERSION];

/// Headers the host is expected to forward.
pub const HEADERS_OF_INTEREST: [&str; 5] = [
    HEADER_CONNECTION,
    HEADER_ACCEPT_ENCODING,
    HEADER_CONTENT_TYPE,
    HEADER_USER_AGENT,
    HEADER_HOST,
];

/// Build the snapshot key for a request header.
pub fn header_key(name: &str) -> String {
    let mut key = String::with_capacity(HEADER_PREFIX.len() + name.len());
    key.push_str(HEADER_PREFIX);
    key.push_str(&name.to_ascii_lowercase());
    key
}

/// Group a snapshot field belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Connection,
    Protocol,
    Runtime,
    Timing,
    Server,
    /// Host-supplied facts with no well-known name.
    Extra,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Connection,
        Category::Protocol,
        Category::Runtime,
        Category::Timing,
        Category::Server,
        Category::Extra,
    ];

    /// Classify a field name.
    pub fn of(name: &str) -> Self {
        match name {
            CLIENT_ADDR | CLIENT_PORT | SERVER_ADDR | SERVER_PORT => Category::Connection,
            METHOD | URI | PROTOCOL_VERSION => Category::Protocol,
            INTERPRETER_VERSION | HANDLER | MEMORY_USAGE_BYTES | MEMORY_PEAK_BYTES
            | MEMORY_LIMIT | BYTECODE_CACHE | LOAD_AVERAGE | CPU_COUNT => Category::Runtime,
            REQUEST_RECEIVED => Category::Timing,
            SERVER_SOFTWARE | SERVER_NAME | DOCUMENT_ROOT | SCRIPT_NAME | SCRIPT_FILENAME
            | REQUEST_ID => Category::Server,
            _ if name.starts_with(HEADER_PREFIX) => Category::Protocol,
            _ => Category::Extra,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Connection => "connection",
            Category::Protocol => "protocol",
            Category::Runtime => "runtime",
            Category::Timing => "timing",
            Category::Server => "server",
            Category::Extra => "extra",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
