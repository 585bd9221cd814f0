//! The engine's final output.

use super::{DiscoveredHost, PortScanResult, ScanId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::Ipv4Addr;

/// One discovered host paired with its port scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub host: DiscoveredHost,
    pub ports: PortScanResult,
}

/// A flat inventory row, the shape dashboards and tabular reports consume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRow {
    pub ip: String,
    pub mac: Option<String>,
    pub hostname: String,
    pub open_ports: Vec<u16>,
    pub status: String,
}

impl From<&ReportEntry> for InventoryRow {
    fn from(entry: &ReportEntry) -> Self {
        Self {
            ip: entry.host.ip.to_string(),
            mac: entry.host.hardware_address.clone(),
            hostname: entry.host.hostname.clone(),
            open_ports: entry.ports.open_port_numbers(),
            status: entry.ports.status.to_string(),
        }
    }
}

/// Result of one scan over an address range.
///
/// Entries are in discovery order: the order responses arrived, not address
/// order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub id: ScanId,
    pub range: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// False when any host's port scan was cut short.
    pub complete: bool,
    pub entries: Vec<ReportEntry>,
}

impl ScanReport {
    pub fn hosts_found(&self) -> usize {
        self.entries.len()
    }

    pub fn total_open_ports(&self) -> usize {
        self.entries.iter().map(|e| e.ports.open_ports.len()).sum()
    }

    pub fn duration_ms(&self) -> i64 {
        (self.completed_at - self.started_at).num_milliseconds()
    }

    pub fn entry(&self, ip: Ipv4Addr) -> Option<&ReportEntry> {
        self.entries.iter().find(|e| e.host.ip == ip)
    }

    pub fn rows(&self) -> Vec<InventoryRow> {
        self.entries.iter().map(InventoryRow::from).collect()
    }

    /// Compare against the hosts a caller previously considered active.
    ///
    /// The engine keeps no state between scans; callers apply the result to
    /// their own store (for example marking `gone` hosts inactive).
    pub fn reconcile<I>(&self, previously_active: I) -> Reconciliation
    where
        I: IntoIterator<Item = Ipv4Addr>,
    {
        let previous: HashSet<Ipv4Addr> = previously_active.into_iter().collect();
        let current: HashSet<Ipv4Addr> = self.entries.iter().map(|e| e.host.ip).collect();

        let mut reconciliation = Reconciliation::default();
        for entry in &self.entries {
            if previous.contains(&entry.host.ip) {
                reconciliation.still_active.push(entry.host.ip);
            } else {
                reconciliation.newly_seen.push(entry.host.ip);
            }
        }
        reconciliation.gone = previous.difference(&current).copied().collect();
        reconciliation.gone.sort_unstable();
        reconciliation
    }
}

/// Outcome of [`ScanReport::reconcile`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Seen before and now, in discovery order.
    pub still_active: Vec<Ipv4Addr>,
    /// Seen now only, in discovery order.
    pub newly_seen: Vec<Ipv4Addr>,
    /// Seen before but not now, ascending.
    pub gone: Vec<Ipv4Addr>,
}
