//! JSON output formatting.

use crate::types::{InventoryRow, ScanReport};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::{self, Write};

/// The JSON document handed to downstream consumers.
#[derive(Debug, Serialize)]
pub struct JsonReport {
    pub scan_id: String,
    pub range: String,
    pub complete: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub devices: Vec<InventoryRow>,
}

impl From<&ScanReport> for JsonReport {
    fn from(report: &ScanReport) -> Self {
        Self {
            scan_id: report.id.to_string(),
            range: report.range.clone(),
            complete: report.complete,
            started_at: report.started_at,
            completed_at: report.completed_at,
            duration_ms: report.duration_ms(),
            devices: report.rows(),
        }
    }
}

/// Write the report as pretty-printed JSON.
pub fn write_json<W: Write>(mut out: W, report: &ScanReport) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut out, &JsonReport::from(report))?;
    writeln!(out)
}
