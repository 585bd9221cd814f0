//! Mac subcommand implementation.

use crate::config::AppSettings;
use crate::discovery::{ArpDiscoverer, NoopResolver, ProbeSubstrate};
use crate::error::ScanError;
use crate::output;
use crate::types::AddressRange;
use clap::Parser;
use std::net::Ipv4Addr;
use std::time::Duration;

/// Look up the hardware address of a single host.
#[derive(Parser, Debug)]
pub struct MacCommand {
    /// IPv4 address to resolve
    #[arg(value_name = "IP")]
    pub ip: Ipv4Addr,

    /// How long to wait for a reply, in milliseconds
    #[arg(short = 't', long = "timeout", value_name = "MS", default_value = "1000")]
    pub timeout_ms: u64,

    /// Network interface used for ARP
    #[arg(short = 'i', long)]
    pub interface: Option<String>,
}

impl MacCommand {
    pub async fn execute(&self, settings: &AppSettings, quiet: bool) -> anyhow::Result<()> {
        let interface = self.interface.as_deref().or(settings.interface.as_deref());
        let target = AddressRange::span(self.ip, self.ip).map_err(ScanError::from)?;

        let substrate = ProbeSubstrate::detect(interface, Some(&target));
        let discoverer = ArpDiscoverer::new(substrate, NoopResolver);
        let mac = discoverer
            .lookup_mac(self.ip, Duration::from_millis(self.timeout_ms))
            .await
            .map_err(ScanError::from)?;

        match mac {
            Some(mac) => println!("{}", mac),
            None if quiet => {}
            None => output::print_warning(&format!("{} did not answer", self.ip)),
        }
        Ok(())
    }
}
