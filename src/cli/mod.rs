//! CLI subcommand definitions and handlers.
//!
//! - `netsweep scan [RANGE]` - Discover hosts and scan their ports
//! - `netsweep mac <IP>` - Look up one host's hardware address
//! - `netsweep config show|init` - Inspect or create the settings file

mod config;
mod mac;
mod scan;

pub use config::{ConfigAction, ConfigCommand};
pub use mac::MacCommand;
pub use scan::ScanCommand;

use crate::config::AppSettings;
use crate::error::{CapabilityReason, DiscoveryError, ScanError};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// netsweep - LAN host discovery and port scanning.
///
/// Finds live hosts on a local subnet with ARP, resolves their names, and
/// checks each for open TCP ports.
#[derive(Parser, Debug)]
#[command(name = "netsweep")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Discover LAN hosts and their open ports", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a settings file instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Settings from `--config`, or the default location. Missing files
    /// yield defaults.
    pub fn load_settings(&self) -> crate::error::ConfigResult<AppSettings> {
        match &self.config {
            Some(path) if path.exists() => AppSettings::load_from(path),
            Some(_) => Ok(AppSettings::default()),
            None => AppSettings::load(),
        }
    }

    /// Default log filter for the `-v` count.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Discover hosts in a range and scan their ports
    #[command(alias = "s")]
    Scan(ScanCommand),

    /// Look up the hardware address of a single host
    Mac(MacCommand),

    /// Show or initialise settings
    Config(ConfigCommand),
}

/// User-facing explanation for a discovery that could not run.
pub fn capability_message(err: &ScanError) -> Option<String> {
    let ScanError::Discovery(DiscoveryError::CapabilityUnavailable { reason, detail }) = err else {
        return None;
    };

    let hint = match reason {
        CapabilityReason::PermissionDenied | CapabilityReason::TransportOnly if !is_root() => {
            "ARP discovery needs raw-packet access. Re-run with sudo, or grant the binary \
             CAP_NET_RAW (sudo setcap cap_net_raw,cap_net_admin=eip $(which netsweep))."
        }
        CapabilityReason::NoSuitableInterface => {
            "No Ethernet-like interface with an IPv4 address was found. Pick one with --interface."
        }
        CapabilityReason::UnsupportedChannel => {
            "The selected interface does not support raw Ethernet frames. Try another with --interface."
        }
        _ => "Raw-packet capability is unavailable on this host.",
    };
    Some(format!("host discovery unavailable ({reason}): {detail}\n{hint}"))
}

/// Check if running with root privileges.
pub(crate) fn is_root() -> bool {
    #[cfg(unix)]
    {
        // SAFETY: geteuid has no preconditions and cannot fail.
        unsafe { libc::geteuid() == 0 }
    }
    #[cfg(not(unix))]
    {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity_levels() {
        let cli = Cli::parse_from(["netsweep", "-vv", "config", "show"]);
        assert_eq!(cli.log_level(), "debug");
        let cli = Cli::parse_from(["netsweep", "config", "show"]);
        assert_eq!(cli.log_level(), "warn");
    }

    #[test]
    fn test_capability_message() {
        let err = ScanError::from(DiscoveryError::capability(
            CapabilityReason::NoSuitableInterface,
            "no interface covers 10.9.0.0/24",
        ));
        let msg = capability_message(&err).unwrap();
        assert!(msg.contains("--interface"));
        assert!(msg.contains("10.9.0.0/24"));

        assert!(capability_message(&ScanError::InvalidConfig("x".into())).is_none());
    }
}
