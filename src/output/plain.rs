//! Plain text output formatting.
//!
//! Produces human-readable output with colors and formatting.

use crate::services::service_label;
use crate::types::{HostScanStatus, ReportEntry, ScanReport};
use console::style;
use std::io::{self, Write};

const RULE: &str = "═══════════════════════════════════════════════════════════════";
const THIN_RULE: &str = "───────────────────────────────────────────────────────────────";

/// Write the report as a host table.
pub fn write_plain<W: Write>(mut out: W, report: &ScanReport) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(out, "                   {} Scan Results", style("netsweep").cyan().bold())?;
    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(out)?;

    writeln!(out, "  {} {}", style("Range:").bold(), report.range)?;
    writeln!(out, "  {} {}", style("Scan ID:").bold(), style(report.id.short()).dim())?;
    writeln!(
        out,
        "  {} {} hosts, {} open ports in {:.2}s",
        style("Found:").bold(),
        style(report.hosts_found()).green().bold(),
        style(report.total_open_ports()).green(),
        report.duration_ms() as f64 / 1000.0
    )?;
    if !report.complete {
        writeln!(
            out,
            "  {}",
            style("Some hosts could not be fully scanned; their port lists are partial.").yellow()
        )?;
    }
    writeln!(out)?;

    if report.entries.is_empty() {
        writeln!(out, "  {}", style("No hosts responded.").dim())?;
    } else {
        writeln!(out, "  {}", style(THIN_RULE).dim())?;
        writeln!(
            out,
            "  {:<15}  {:<17}  {:<24}  {}",
            style("IP").bold(),
            style("MAC").bold(),
            style("HOSTNAME").bold(),
            style("OPEN PORTS").bold()
        )?;
        writeln!(out, "  {}", style(THIN_RULE).dim())?;

        for entry in &report.entries {
            write_entry(&mut out, entry)?;
        }

        writeln!(out, "  {}", style(THIN_RULE).dim())?;
    }

    writeln!(out)?;
    writeln!(out, "{}", style(RULE).cyan())?;
    writeln!(out)?;

    Ok(())
}

fn write_entry<W: Write>(out: &mut W, entry: &ReportEntry) -> io::Result<()> {
    let mac = entry.host.hardware_address.as_deref().unwrap_or("-");
    let ports = match &entry.ports.status {
        HostScanStatus::Incomplete { reason } => {
            style(format!("incomplete: {}", reason)).yellow().to_string()
        }
        HostScanStatus::Completed if entry.ports.open_ports.is_empty() => {
            style("none").dim().to_string()
        }
        HostScanStatus::Completed => entry
            .ports
            .open_ports
            .iter()
            .map(|p| format!("{}/{}", style(p).green().bold(), service_label(p.as_u16())))
            .collect::<Vec<_>>()
            .join(", "),
    };

    writeln!(
        out,
        "  {:<15}  {:<17}  {:<24}  {}",
        entry.host.ip.to_string(),
        mac,
        truncate_string(&entry.host.hostname, 24),
        ports
    )
}

/// Print an error message.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", style("Error:").red().bold(), msg);
}

/// Print a warning message.
pub fn print_warning(msg: &str) {
    eprintln!("{} {}", style("Warning:").yellow().bold(), msg);
}

/// Print a success message.
pub fn print_success(msg: &str) {
    println!("{} {}", style("✓").green().bold(), msg);
}

/// Print an info message.
pub fn print_info(msg: &str) {
    println!("{} {}", style("ℹ").blue().bold(), msg);
}

/// Truncate to `max_len` characters, adding an ellipsis if cut.
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
