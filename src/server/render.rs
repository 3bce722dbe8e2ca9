//! Report rendering: JSON, plain text, HTML and the `Server-Timing` header.

use std::fmt::Write;
use std::time::Duration;

use serde::Serialize;

use crate::diagnostics::{BenchResult, Category, Report, TimingFigure};

/// Body of `/report.json`.
#[derive(Serialize)]
struct JsonBody<'a> {
    request_id: &'a str,
    report: &'a Report,
    #[serde(skip_serializing_if = "Option::is_none")]
    benchmark: Option<&'a BenchResult>,
}

pub fn json(
    request_id: &str,
    report: &Report,
    bench: Option<&BenchResult>,
) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&JsonBody {
        request_id,
        report,
        benchmark: bench,
    })
}

fn ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

fn pre_handler_label(figure: TimingFigure) -> String {
    match figure {
        TimingFigure::Estimated { value } => format!("~{:.3} ms (estimated)", ms(value)),
        TimingFigure::Unknown => "unknown".to_string(),
    }
}

pub fn text(request_id: &str, report: &Report, bench: Option<&BenchResult>) -> String {
    let mut out = String::with_capacity(1024);

    let _ = writeln!(out, "Request diagnostics {}", request_id);
    let _ = writeln!(out, "Generated at: {}", report.generated_at());
    let _ = writeln!(out);

    let _ = writeln!(out, "[timing]");
    for stage in report.stages() {
        let _ = writeln!(out, "  {:<20} {:>10.3} ms", stage.name, ms(stage.elapsed));
    }
    for span in report.spans() {
        let _ = writeln!(
            out,
            "  {:<20} {:>10.3} ms  ({} -> {})",
            span.label,
            ms(span.elapsed),
            span.from,
            span.to
        );
    }
    let _ = writeln!(out, "  {:<20} {:>10.3} ms", "total", ms(report.total()));
    let _ = writeln!(out, "  {:<20} {}", "pre_handler", pre_handler_label(report.pre_handler()));

    let snapshot = report.snapshot();
    for category in Category::ALL {
        let mut fields = snapshot.fields_in(category).peekable();
        if fields.peek().is_none() {
            continue;
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "[{}]", category);
        for (name, value) in fields {
            let _ = writeln!(out, "  {:<24} {}", name, value);
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "[recommendations]");
    if report.recommendations().is_empty() {
        let _ = writeln!(out, "  none");
    }
    for rec in report.recommendations() {
        let _ = writeln!(out, "  {:<8} {}: {}", rec.severity, rec.code, rec.message);
    }

    if let Some(bench) = bench {
        let _ = writeln!(out);
        let _ = writeln!(out, "[benchmark]");
        let _ = writeln!(out, "  iterations {}", bench.iterations);
        let _ = writeln!(out, "  avg        {:.6} ms", ms(bench.avg_per_iteration));
        let _ = writeln!(out, "  throughput {:.0} ops/sec", bench.ops_per_sec);
    }

    out
}

pub fn html(request_id: &str, report: &Report, bench: Option<&BenchResult>) -> String {
    let mut out = String::with_capacity(4096);

    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str("<title>Request diagnostics</title>\n</head>\n<body>\n");
    let _ = writeln!(out, "<h1>Request diagnostics</h1>");
    let _ = writeln!(
        out,
        "<p>Request <code>{}</code> at {}</p>",
        escape(request_id),
        report.generated_at()
    );

    out.push_str("<h2>Timing</h2>\n<table>\n");
    for stage in report.stages() {
        let _ = writeln!(
            out,
            "<tr><th>{}</th><td>{:.3} ms</td></tr>",
            escape(&stage.name),
            ms(stage.elapsed)
        );
    }
    for span in report.spans() {
        let _ = writeln!(
            out,
            "<tr><th>{}</th><td>{:.3} ms</td></tr>",
            escape(&span.label),
            ms(span.elapsed)
        );
    }
    let _ = writeln!(
        out,
        "<tr><th>total</th><td>{:.3} ms</td></tr>",
        ms(report.total())
    );
    let _ = writeln!(
        out,
        "<tr><th>pre_handler</th><td>{}</td></tr>",
        pre_handler_label(report.pre_handler())
    );
    out.push_str("</table>\n");

    let snapshot = report.snapshot();
    for category in Category::ALL {
        let mut fields = snapshot.fields_in(category).peekable();
        if fields.peek().is_none() {
            continue;
        }
        let _ = writeln!(out, "<h2>{}</h2>\n<table>", category);
        for (name, value) in fields {
            let _ = writeln!(
                out,
                "<tr><th>{}</th><td>{}</td></tr>",
                escape(name),
                escape(&value.to_string())
            );
        }
        out.push_str("</table>\n");
    }

    out.push_str("<h2>Recommendations</h2>\n");
    if report.recommendations().is_empty() {
        out.push_str("<p>None.</p>\n");
    } else {
        out.push_str("<ul>\n");
        for rec in report.recommendations() {
            let _ = writeln!(
                out,
                "<li class=\"{}\"><strong>{}</strong> {}</li>",
                rec.severity,
                rec.severity,
                escape(&rec.message)
            );
        }
        out.push_str("</ul>\n");
    }

    if let Some(bench) = bench {
        let _ = writeln!(
            out,
            "<h2>Benchmark</h2>\n<p>{} iterations, {:.6} ms avg, {:.0} ops/sec</p>",
            bench.iterations,
            ms(bench.avg_per_iteration),
            bench.ops_per_sec
        );
    }

    out.push_str("</body>\n</html>\n");
    out
}

/// `Server-Timing` value: one entry per stage plus `total`.
///
/// Stage names are reduced to token characters.
pub fn server_timing(report: &Report) -> String {
    let mut out = String::new();
    for stage in report.stages() {
        let _ = write!(out, "{};dur={:.3}, ", token(&stage.name), ms(stage.elapsed));
    }
    let _ = write!(out, "total;dur={:.3}", ms(report.total()));
    out
}

fn token(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Minimal HTML escaping for text and attribute content.
fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
