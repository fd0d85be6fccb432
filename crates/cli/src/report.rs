//! Per-request report rows

use exclusive_core::domain::{FetchMethod, FetchResponse};
use exclusive_core::port::FetchError;
use serde::Serialize;
use std::time::Duration;
use tabled::{Table, Tabled};

/// One fetched URL, as printed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Tabled)]
pub struct FetchRow {
    pub seq: usize,
    pub method: String,
    pub url: String,
    pub status: String,
    /// Offset from the first submission
    pub start_ms: u128,
    pub duration_ms: u128,
    pub bytes: usize,
    #[tabled(display_with = "display_error")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn display_error(error: &Option<String>) -> String {
    error.clone().unwrap_or_default()
}

impl FetchRow {
    pub fn new(
        seq: usize,
        method: FetchMethod,
        url: &str,
        started: Duration,
        finished: Duration,
        outcome: &Result<FetchResponse, FetchError>,
    ) -> Self {
        let (status, bytes, error) = match outcome {
            Ok(response) => (response.status.to_string(), response.body.len(), None),
            Err(e) => ("ERR".to_string(), 0, Some(e.to_string())),
        };

        Self {
            seq,
            method: method.to_string(),
            url: url.to_string(),
            status,
            start_ms: started.as_millis(),
            duration_ms: finished.saturating_sub(started).as_millis(),
            bytes,
            error,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

pub fn render_table(rows: &[FetchRow]) -> String {
    Table::new(rows).to_string()
}

pub fn render_json_lines(rows: &[FetchRow]) -> serde_json::Result<String> {
    let lines = rows
        .iter()
        .map(serde_json::to_string)
        .collect::<serde_json::Result<Vec<_>>>()?;
    Ok(lines.join("\n"))
}
