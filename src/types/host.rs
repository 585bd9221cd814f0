//! Hosts found by discovery and their per-host port results.

use super::Port;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// Hostname reported when reverse resolution yields nothing.
pub const UNKNOWN_HOSTNAME: &str = "unknown";

/// A host that answered an address-resolution probe.
///
/// Uniqueness key is `ip`; one value is created per responder per scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredHost {
    pub ip: Ipv4Addr,
    /// Link-layer address as `aa:bb:cc:dd:ee:ff`.
    #[serde(rename = "mac")]
    pub hardware_address: Option<String>,
    pub hostname: String,
}

impl DiscoveredHost {
    /// A host whose name has not been resolved.
    pub fn new(ip: Ipv4Addr, hardware_address: Option<String>) -> Self {
        Self {
            ip,
            hardware_address,
            hostname: UNKNOWN_HOSTNAME.to_string(),
        }
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        let hostname = hostname.into();
        if !hostname.trim().is_empty() {
            self.hostname = hostname;
        }
        self
    }

    pub fn has_hostname(&self) -> bool {
        self.hostname != UNKNOWN_HOSTNAME
    }
}

impl fmt::Display for DiscoveredHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.hardware_address {
            Some(mac) => write!(f, "{} [{}] ({})", self.ip, mac, self.hostname),
            None => write!(f, "{} ({})", self.ip, self.hostname),
        }
    }
}

/// Whether a host's port scan ran to completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum HostScanStatus {
    Completed,
    /// The scan was cut short; `open_ports` is not authoritative.
    Incomplete { reason: String },
}

impl fmt::Display for HostScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Incomplete { .. } => write!(f, "incomplete"),
        }
    }
}

/// Open TCP ports found on one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortScanResult {
    pub host: Ipv4Addr,
    /// Ascending, no duplicates.
    pub open_ports: Vec<Port>,
    pub scanned_at: DateTime<Utc>,
    pub status: HostScanStatus,
}

impl PortScanResult {
    pub fn completed(host: Ipv4Addr, mut open_ports: Vec<Port>) -> Self {
        open_ports.sort_unstable();
        open_ports.dedup();
        Self {
            host,
            open_ports,
            scanned_at: Utc::now(),
            status: HostScanStatus::Completed,
        }
    }

    pub fn incomplete(host: Ipv4Addr, reason: impl Into<String>) -> Self {
        Self {
            host,
            open_ports: Vec::new(),
            scanned_at: Utc::now(),
            status: HostScanStatus::Incomplete {
                reason: reason.into(),
            },
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status == HostScanStatus::Completed
    }

    pub fn open_port_numbers(&self) -> Vec<u16> {
        self.open_ports.iter().map(|p| p.as_u16()).collect()
    }
}
