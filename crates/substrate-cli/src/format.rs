// SPDX-License-Identifier: MIT OR Apache-2.0
//! Output formatting utilities for the substrate CLI.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use substrate_backend::{DeleteOutcome, HealthOutcome, ListResult, ReadOutcome, ReceiveOutcome};
use substrate_core::record::PayloadValue;

/// Supported output formats for CLI display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Compact JSON (single line).
    Json,
    /// Pretty-printed JSON.
    JsonPretty,
    /// Human-readable multi-line text.
    Text,
    /// Key-value aligned table.
    Table,
    /// Single-line summary.
    Compact,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Json => "json",
            Self::JsonPretty => "json-pretty",
            Self::Text => "text",
            Self::Table => "table",
            Self::Compact => "compact",
        };
        f.write_str(s)
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "json-pretty" | "json_pretty" | "jsonpretty" => Ok(Self::JsonPretty),
            "text" => Ok(Self::Text),
            "table" => Ok(Self::Table),
            "compact" => Ok(Self::Compact),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

/// Formats protocol outcomes for CLI output.
#[derive(Debug, Clone)]
pub struct Formatter {
    format: OutputFormat,
}

impl Formatter {
    /// Create a new formatter with the given output format.
    #[must_use]
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Format a [`ReceiveOutcome`] according to the configured output format.
    #[must_use]
    pub fn format_receive(&self, outcome: &ReceiveOutcome) -> String {
        match &self.format {
            OutputFormat::Json => serde_json::to_string(outcome).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(outcome).unwrap_or_default(),
            OutputFormat::Text => format_receive_text(outcome),
            OutputFormat::Table => format_receive_table(outcome),
            OutputFormat::Compact => format_receive_compact(outcome),
        }
    }

    /// Format a [`ReadOutcome`] according to the configured output format.
    #[must_use]
    pub fn format_read(&self, outcome: &ReadOutcome) -> String {
        match &self.format {
            OutputFormat::Json => serde_json::to_string(outcome).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(outcome).unwrap_or_default(),
            OutputFormat::Text => format_read_text(outcome),
            OutputFormat::Table => format_read_table(outcome),
            OutputFormat::Compact => format_read_compact(outcome),
        }
    }

    /// Format a [`ListResult`] according to the configured output format.
    #[must_use]
    pub fn format_list(&self, result: &ListResult) -> String {
        match &self.format {
            OutputFormat::Json => serde_json::to_string(result).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(result).unwrap_or_default(),
            OutputFormat::Text | OutputFormat::Table => format_list_table(result),
            OutputFormat::Compact => format_list_compact(result),
        }
    }

    /// Format a [`DeleteOutcome`] according to the configured output format.
    #[must_use]
    pub fn format_delete(&self, outcome: &DeleteOutcome) -> String {
        match &self.format {
            OutputFormat::Json | OutputFormat::JsonPretty => {
                serde_json::to_string(outcome).unwrap_or_default()
            }
            OutputFormat::Text | OutputFormat::Table => {
                format!("deleted: {}", outcome.success)
            }
            OutputFormat::Compact => format!("[delete] success={}", outcome.success),
        }
    }

    /// Format a [`HealthOutcome`] according to the configured output format.
    #[must_use]
    pub fn format_health(&self, outcome: &HealthOutcome) -> String {
        match &self.format {
            OutputFormat::Json => serde_json::to_string(outcome).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(outcome).unwrap_or_default(),
            OutputFormat::Text | OutputFormat::Table => format!(
                "status: {:?}{}",
                outcome.status,
                outcome
                    .message
                    .as_deref()
                    .map(|m| format!("\nmessage: {m}"))
                    .unwrap_or_default()
            ),
            OutputFormat::Compact => format!("[health] {:?}", outcome.status),
        }
    }

    /// Format an error message according to the configured output format.
    #[must_use]
    pub fn format_error(&self, err: &str) -> String {
        match &self.format {
            OutputFormat::Json | OutputFormat::JsonPretty => {
                serde_json::json!({"error": err}).to_string()
            }
            OutputFormat::Text => format!("Error: {err}"),
            OutputFormat::Table => format!("error  {err}"),
            OutputFormat::Compact => format!("[error] {err}"),
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        format!("{}…", &s[..max])
    }
}

fn payload_brief(data: &PayloadValue) -> String {
    match data {
        PayloadValue::Json(v) => truncate(&v.to_string(), 80),
        PayloadValue::Binary(bytes) => format!("<{} bytes binary>", bytes.len()),
    }
}

// ── receive ─────────────────────────────────────────────────────────

fn format_receive_text(o: &ReceiveOutcome) -> String {
    if o.accepted {
        if o.duplicate {
            "accepted (duplicate)".to_string()
        } else {
            "accepted".to_string()
        }
    } else {
        format!(
            "rejected: {}",
            o.error.as_deref().unwrap_or("unknown error")
        )
    }
}

fn format_receive_table(o: &ReceiveOutcome) -> String {
    let mut lines = vec![format!("{:<12} {}", "accepted", o.accepted)];
    if o.duplicate {
        lines.push(format!("{:<12} {}", "duplicate", true));
    }
    if let Some(ref err) = o.error {
        lines.push(format!("{:<12} {}", "error", err));
    }
    lines.join("\n")
}

fn format_receive_compact(o: &ReceiveOutcome) -> String {
    if o.accepted {
        format!("[accepted]{}", if o.duplicate { " duplicate" } else { "" })
    } else {
        format!("[rejected] {}", o.error.as_deref().unwrap_or(""))
    }
}

// ── read ────────────────────────────────────────────────────────────

fn format_read_text(o: &ReadOutcome) -> String {
    match &o.record {
        Some(r) => format!("ts: {}\ndata: {}", r.ts.to_rfc3339(), payload_brief(&r.data)),
        None => format!("not found: {}", o.error.as_deref().unwrap_or("")),
    }
}

fn format_read_table(o: &ReadOutcome) -> String {
    match &o.record {
        Some(r) => format!(
            "{:<12} {}\n{:<12} {}",
            "ts",
            r.ts.to_rfc3339(),
            "data",
            payload_brief(&r.data)
        ),
        None => format!("{:<12} {}", "error", o.error.as_deref().unwrap_or("")),
    }
}

fn format_read_compact(o: &ReadOutcome) -> String {
    match &o.record {
        Some(r) => format!("[found] {}", payload_brief(&r.data)),
        None => format!("[not-found] {}", o.error.as_deref().unwrap_or("")),
    }
}

// ── list ────────────────────────────────────────────────────────────

fn format_list_table(r: &ListResult) -> String {
    let mut lines = Vec::with_capacity(r.data.len() + 1);
    for entry in &r.data {
        lines.push(entry.uri.clone());
    }
    lines.push(format!(
        "-- page {} of {} (limit {}) --",
        r.pagination.page,
        r.pagination.total.div_ceil(r.pagination.limit.max(1) as usize),
        r.pagination.limit
    ));
    lines.join("\n")
}

fn format_list_compact(r: &ListResult) -> String {
    format!(
        "[list] page={} total={} shown={}",
        r.pagination.page,
        r.pagination.total,
        r.data.len()
    )
}
