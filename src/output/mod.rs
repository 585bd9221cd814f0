//! Output formatting module.
//!
//! Renders a [`ScanReport`] as plain text, JSON, or CSV to any writer.

mod csv_format;
mod json_format;
mod plain;

pub use csv_format::write_csv;
pub use json_format::{write_json, JsonReport};
pub use plain::{print_error, print_info, print_success, print_warning, write_plain};

use crate::types::ScanReport;
use clap::ValueEnum;
use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

/// Output format for scan reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Plain,
    /// JSON document
    Json,
    /// One CSV row per host
    Csv,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain => write!(f, "plain"),
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as ValueEnum>::from_str(s, true)
    }
}

/// Render `report` in `format` to `out`.
pub fn write_report<W: Write>(out: W, report: &ScanReport, format: OutputFormat) -> io::Result<()> {
    match format {
        OutputFormat::Plain => write_plain(out, report),
        OutputFormat::Json => write_json(out, report),
        OutputFormat::Csv => write_csv(out, report),
    }
}

/// Render `report` to stdout.
pub fn print_report(report: &ScanReport, format: OutputFormat) -> io::Result<()> {
    let stdout = io::stdout();
    write_report(stdout.lock(), report, format)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::types::{
        DiscoveredHost, Port, PortScanResult, ReportEntry, ScanId, ScanReport,
    };
    use chrono::{TimeZone, Utc};
    use std::net::Ipv4Addr;

    /// Two hosts: a named router with open ports and an unnamed, cut-short host.
    pub fn sample_report() -> ScanReport {
        let started_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let router = Ipv4Addr::new(192, 168, 1, 1);
        let phone = Ipv4Addr::new(192, 168, 1, 23);

        ScanReport {
            id: ScanId::new(),
            range: "192.168.1.0/24".to_string(),
            started_at,
            completed_at: started_at + chrono::Duration::milliseconds(2350),
            complete: false,
            entries: vec![
                ReportEntry {
                    host: DiscoveredHost::new(router, Some("a4:2b:b0:11:22:33".to_string()))
                        .with_hostname("router.lan"),
                    ports: PortScanResult::completed(
                        router,
                        vec![Port::new(443).unwrap(), Port::new(53).unwrap(), Port::new(80).unwrap()],
                    ),
                },
                ReportEntry {
                    host: DiscoveredHost::new(phone, None),
                    ports: PortScanResult::incomplete(phone, "resource exhaustion"),
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parse() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("CSV".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert!("xml".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::default().to_string(), "plain");
    }

    #[test]
    fn test_write_report_dispatch() {
        let report = fixtures::sample_report();
        let mut buf = Vec::new();
        write_report(&mut buf, &report, OutputFormat::Csv).unwrap();
        assert!(String::from_utf8(buf).unwrap().starts_with("ip,mac,hostname"));
    }
}
