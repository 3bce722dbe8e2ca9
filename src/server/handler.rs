//! Routing and the per-request diagnostic flow.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use http::header::{self, HeaderName, HeaderValue};
use http::request::Parts;
use http_body_util::Full;
use hyper::body::Incoming as IncomingBody;
use hyper::{Request, Response, StatusCode};
use tracing::{error, info};

use super::render;
use crate::config::Config;
use crate::core::Error;
use crate::diagnostics::{
    self, fields, BenchResult, Report, ReportBuilder, RequestSnapshot, RuleSet, StageClock,
};
use crate::host::{self, RuntimeFacts, SystemFacts};
use crate::logging::ACCESS_TARGET;

pub(crate) static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
pub(crate) static SERVER_TIMING: HeaderName = HeaderName::from_static("server-timing");

static APPLICATION_JSON: HeaderValue = HeaderValue::from_static("application/json");
static TEXT_PLAIN_UTF8: HeaderValue = HeaderValue::from_static("text/plain; charset=utf-8");
static TEXT_HTML_UTF8: HeaderValue = HeaderValue::from_static("text/html; charset=utf-8");

/// Longest client-supplied request id that is echoed back.
const MAX_REQUEST_ID_LEN: usize = 128;

/// Shared, read-only state for every request.
pub struct AppState {
    runtime: RuntimeFacts,
    builder: ReportBuilder,
    workload_iterations: u64,
    bench_iterations: u64,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        let builder = ReportBuilder::new(RuleSet::with_load_threshold(
            config.diagnostics.load_threshold,
        ))
        .span("facts", "start", "handler_called")
        .span("handler", "handler_called", "end");

        Self {
            runtime: RuntimeFacts::from_config(&config.server, &config.diagnostics),
            builder,
            workload_iterations: config.diagnostics.workload_iterations,
            bench_iterations: config.diagnostics.bench_iterations,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Html,
    Json,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Report(Format),
    Health,
    NotFound,
}

fn route(path: &str) -> Route {
    match path {
        "/" | "/report" => Route::Report(Format::Html),
        "/report.json" => Route::Report(Format::Json),
        "/report.txt" => Route::Report(Format::Text),
        "/health" => Route::Health,
        _ => Route::NotFound,
    }
}

/// Socket endpoints of the connection a request came in on.
#[derive(Debug, Clone, Copy)]
pub struct ConnInfo {
    pub client: SocketAddr,
    pub server: SocketAddr,
}

/// Outcome of one diagnostic run.
pub struct Diagnosis {
    pub report: Report,
    pub bench: Option<BenchResult>,
}

/// Handle one request. Never fails; errors become 500 responses.
pub async fn handle_request(
    state: &AppState,
    req: Request<IncomingBody>,
    conn: ConnInfo,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let received = SystemTime::now();
    let request_start = Instant::now();

    let (parts, _body) = req.into_parts();
    let request_id = request_id(&parts);

    let mut response = match route(parts.uri.path()) {
        Route::Report(format) => report_response(state, &parts, conn, &request_id, received, format),
        Route::Health => health_response(),
        Route::NotFound => plain(StatusCode::NOT_FOUND, "404 Not Found"),
    };

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(X_REQUEST_ID.clone(), value);
    }

    info!(
        target: ACCESS_TARGET,
        request_id = %request_id,
        method = %parts.method,
        path = parts.uri.path(),
        http = host::protocol_version(parts.version),
        status = response.status().as_u16() as u64,
        ip = %conn.client.ip(),
        duration_ms = request_start.elapsed().as_secs_f64() * 1000.0,
    );

    Ok(response)
}

/// Client-supplied `X-Request-Id` when usable, otherwise a fresh UUID v4.
fn request_id(parts: &Parts) -> String {
    parts
        .headers
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty() && id.len() <= MAX_REQUEST_ID_LEN)
        .map(str::to_owned)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// Run the diagnostic flow for one request.
///
/// Stages: `start` (clock creation), `handler_called` (facts captured),
/// `end` (sample workload done). The benchmark runs after `end`.
pub fn diagnose(
    state: &AppState,
    parts: &Parts,
    conn: ConnInfo,
    request_id: &str,
    received: SystemTime,
) -> crate::core::Result<Diagnosis> {
    let mut clock = StageClock::new();
    clock.mark("start")?;

    let mut facts = host::collect(parts, conn.client, conn.server, &state.runtime);
    SystemFacts::read().apply(&mut facts);
    if let Ok(since_epoch) = received.duration_since(UNIX_EPOCH) {
        facts.insert(fields::REQUEST_RECEIVED, since_epoch.as_secs_f64());
    }
    facts.insert(fields::REQUEST_ID, request_id);
    let snapshot = RequestSnapshot::from_facts(facts)?;

    clock.mark("handler_called")?;
    workload(state.workload_iterations);
    clock.mark("end")?;

    let bench = (state.bench_iterations > 0).then(|| {
        diagnostics::bench::run(state.bench_iterations, || {
            std::hint::black_box("A".repeat(1000));
        })
    });

    let report = state.builder.build(clock, &snapshot)?;
    Ok(Diagnosis { report, bench })
}

/// Sample application work: fill and sum a buffer.
fn workload(iterations: u64) -> u64 {
    let data: Vec<u64> = (0..iterations).map(|i| i.wrapping_mul(i)).collect();
    std::hint::black_box(data.iter().fold(0u64, |acc, v| acc.wrapping_add(*v)))
}

fn report_response(
    state: &AppState,
    parts: &Parts,
    conn: ConnInfo,
    request_id: &str,
    received: SystemTime,
    format: Format,
) -> Response<Full<Bytes>> {
    let diagnosis = match diagnose(state, parts, conn, request_id, received) {
        Ok(diagnosis) => diagnosis,
        Err(err) => {
            error!(request_id = %request_id, kind = err.kind(), error = %err, "diagnostics failed");
            return error_response(&err);
        }
    };
    let report = &diagnosis.report;
    let bench = diagnosis.bench.as_ref();

    let (content_type, body) = match format {
        Format::Html => (TEXT_HTML_UTF8.clone(), render::html(request_id, report, bench)),
        Format::Text => (TEXT_PLAIN_UTF8.clone(), render::text(request_id, report, bench)),
        Format::Json => match render::json(request_id, report, bench) {
            Ok(body) => (APPLICATION_JSON.clone(), body),
            Err(err) => {
                error!(request_id = %request_id, error = %err, "report serialization failed");
                return json_error(StatusCode::INTERNAL_SERVER_ERROR, "serialization", &err.to_string());
            }
        },
    };

    let mut response = Response::new(Full::new(Bytes::from(body)));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    if let Ok(value) = HeaderValue::from_str(&render::server_timing(report)) {
        headers.insert(SERVER_TIMING.clone(), value);
    }
    response
}

fn error_response(err: &Error) -> Response<Full<Bytes>> {
    json_error(StatusCode::INTERNAL_SERVER_ERROR, err.kind(), &err.to_string())
}

fn json_error(status: StatusCode, kind: &str, message: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({ "error": kind, "message": message }).to_string();
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, APPLICATION_JSON.clone());
    response
}

fn health_response() -> Response<Full<Bytes>> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let body = format!(r#"{{"status":"ok","timestamp":{}}}"#, now.as_secs());
    let mut response = Response::new(Full::new(Bytes::from(body)));
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, APPLICATION_JSON.clone());
    response
}

fn plain(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, TEXT_PLAIN_UTF8.clone());
    response
}
