//! CSV output formatting.

use crate::types::ScanReport;
use std::io::{self, Write};

/// One row per discovered host, in discovery order.
///
/// Open ports share a single column, separated by `;`.
pub fn write_csv<W: Write>(out: W, report: &ScanReport) -> io::Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(["ip", "mac", "hostname", "open_ports", "status"])?;

    for row in report.rows() {
        let ports = row
            .open_ports
            .iter()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join(";");
        wtr.write_record([
            row.ip.as_str(),
            row.mac.as_deref().unwrap_or(""),
            row.hostname.as_str(),
            ports.as_str(),
            row.status.as_str(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::fixtures::sample_report;

    #[test]
    fn test_rows_in_discovery_order() {
        let mut buf = Vec::new();
        write_csv(&mut buf, &sample_report()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "ip,mac,hostname,open_ports,status");
        assert_eq!(lines[1], "192.168.1.1,a4:2b:b0:11:22:33,router.lan,53;80;443,completed");
        assert_eq!(lines[2], "192.168.1.23,,unknown,,incomplete");
        assert_eq!(lines.len(), 3);
    }
}
