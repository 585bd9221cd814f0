//! Core type definitions using newtype patterns for type safety.
//!
//! Address ranges and port sets are validated at construction, so a malformed
//! range never reaches the discovery engine.

mod host;
mod port;
mod range;
mod report;
mod scan_id;

pub use host::{DiscoveredHost, HostScanStatus, PortScanResult, UNKNOWN_HOSTNAME};
pub use port::{Port, PortError, PortRange, PortSet};
pub use range::{AddressRange, RangeError};
pub use report::{InventoryRow, Reconciliation, ReportEntry, ScanReport};
pub use scan_id::ScanId;
