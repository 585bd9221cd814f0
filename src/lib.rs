//! # netsweep - LAN Host Discovery and Port Scanning
//!
//! netsweep finds live hosts on a local subnet by broadcasting ARP requests,
//! resolves their names with reverse DNS, and checks each one for open TCP
//! ports with bounded parallelism.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use netsweep::orchestrator::{EngineConfig, ScanOrchestrator};
//! use netsweep::types::AddressRange;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let range: AddressRange = "192.168.1.0/24".parse()?;
//!     let orchestrator = ScanOrchestrator::from_config(EngineConfig::default(), Some(&range))?;
//!
//!     let report = orchestrator.run_scan(&range, None).await?;
//!     for row in report.rows() {
//!         println!("{} {:?} {} {:?}", row.ip, row.mac, row.hostname, row.open_ports);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`types`] - Address ranges, port sets and the report model
//! - [`discovery`] - ARP discovery, probing substrate, reverse DNS
//! - [`scanner`] - TCP connect probe and the bounded per-host scanner
//! - [`orchestrator`] - Discovery followed by port scans, as one phase machine
//! - [`config`] - Persisted settings
//! - [`output`] - Plain, JSON and CSV renderers
//! - [`error`] - Error types

pub mod cli;
pub mod config;
pub mod discovery;
pub mod error;
pub mod orchestrator;
pub mod output;
pub mod scanner;
pub mod services;
pub mod types;

pub use discovery::{ArpDiscoverer, HostDiscovery, HostResolver, ProbeSubstrate};
pub use error::{CapabilityReason, DiscoveryError, DiscoveryErrorKind, ScanError};
pub use orchestrator::{EngineConfig, ScanOrchestrator, ScanPhase};
pub use scanner::{PortProbe, PortScanner, TcpConnectProbe};
pub use types::{AddressRange, DiscoveredHost, Port, PortScanResult, PortSet, ScanReport};
