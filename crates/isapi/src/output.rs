//! Output formatting: JSON, compact JSON, text.
//!
//! Converted device documents serialize through serde; `text` renders the
//! same tree as indented `key: value` lines.

use std::fmt::Write as _;
use std::io::{self, Write};

use isapi_api::Value;

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Render one converted document.
pub fn render_value(format: OutputFormat, value: &Value) -> Result<String, CliError> {
    match format {
        OutputFormat::Json => render_json(value, false),
        OutputFormat::JsonCompact => render_json(value, true),
        OutputFormat::Text => {
            let mut out = String::new();
            write_text(&mut out, value, 0);
            Ok(out.trim_end().to_owned())
        }
    }
}

/// Render a sequence of documents, e.g. stream events.
///
/// `json-compact` emits one document per line so output can be piped into
/// line-oriented tools.
pub fn render_values(format: OutputFormat, values: &[Value]) -> Result<String, CliError> {
    match format {
        OutputFormat::Json => render_json(values, false),
        OutputFormat::JsonCompact => values
            .iter()
            .map(|v| render_json(v, true))
            .collect::<Result<Vec<_>, _>>()
            .map(|lines| lines.join("\n")),
        OutputFormat::Text => values
            .iter()
            .map(|v| render_value(format, v))
            .collect::<Result<Vec<_>, _>>()
            .map(|docs| docs.join("\n\n")),
    }
}

/// Serialize any report as JSON; `text` falls back to pretty JSON.
pub fn render_json<T: serde::Serialize + ?Sized>(
    data: &T,
    compact: bool,
) -> Result<String, CliError> {
    let rendered = if compact {
        serde_json::to_string(data)
    } else {
        serde_json::to_string_pretty(data)
    };
    rendered.map_err(|e| CliError::Serialize(e.to_string()))
}

/// Print the rendered output to stdout.
pub fn print_output(output: &str) {
    if output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

fn write_text(out: &mut String, value: &Value, depth: usize) {
    let indent = "  ".repeat(depth);
    match value {
        Value::Scalar(s) => {
            let _ = writeln!(out, "{indent}{s}");
        }
        Value::Map(map) => {
            for (key, child) in map {
                match child {
                    Value::Scalar(s) => {
                        let _ = writeln!(out, "{indent}{key}: {s}");
                    }
                    Value::List(items) => {
                        for item in items {
                            write_entry(out, key, item, depth);
                        }
                    }
                    Value::Map(_) => write_entry(out, key, child, depth),
                }
            }
        }
        Value::List(items) => {
            for item in items {
                let _ = writeln!(out, "{indent}-");
                write_text(out, item, depth + 1);
            }
        }
    }
}

fn write_entry(out: &mut String, key: &str, value: &Value, depth: usize) {
    let indent = "  ".repeat(depth);
    if let Value::Scalar(s) = value {
        let _ = writeln!(out, "{indent}{key}: {s}");
    } else {
        let _ = writeln!(out, "{indent}{key}:");
        write_text(out, value, depth + 1);
    }
}
