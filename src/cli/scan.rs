//! Scan subcommand implementation.
//!
//! Handles `netsweep scan [RANGE]`: discovery plus per-host port scans.

use crate::config::AppSettings;
use crate::discovery::local_network;
use crate::error::ScanError;
use crate::orchestrator::{EngineConfig, ScanOrchestrator, ScanPhase};
use crate::output::{self, OutputFormat};
use crate::types::{AddressRange, PortSet};
use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::warn;

/// Discover hosts in a range and scan their ports.
#[derive(Parser, Debug)]
pub struct ScanCommand {
    /// Address range to sweep
    ///
    /// Examples:
    ///   192.168.1.0/24           CIDR block
    ///   10.0.0.5                 Single address
    ///   10.0.0.5-10.0.0.40       Address span
    ///   10.0.0.5-40              Short span
    #[arg(value_name = "RANGE", conflicts_with = "local")]
    pub range: Option<String>,

    /// Sweep the subnet of the selected interface
    #[arg(long)]
    pub local: bool,

    /// Ports to probe ("22,80,443", "1-1024", "common", "well-known", "all")
    #[arg(short, long)]
    pub ports: Option<String>,

    /// Simultaneous probes per host
    #[arg(short = 'c', long)]
    pub concurrency: Option<usize>,

    /// Per-port connect timeout in milliseconds
    #[arg(short = 't', long = "timeout", value_name = "MS")]
    pub probe_timeout: Option<u64>,

    /// ARP listening window in milliseconds
    #[arg(long, value_name = "MS")]
    pub discovery_timeout: Option<u64>,

    /// Reverse DNS budget per host in milliseconds
    #[arg(long, value_name = "MS")]
    pub resolve_timeout: Option<u64>,

    /// Hosts to port-scan at once
    #[arg(long = "hosts", value_name = "N")]
    pub host_parallelism: Option<usize>,

    /// Probes per second (0 = unlimited)
    #[arg(short = 'r', long = "rate")]
    pub rate_limit: Option<u32>,

    /// Network interface used for ARP
    #[arg(short = 'i', long)]
    pub interface: Option<String>,

    /// Output format for results
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,
}

impl ScanCommand {
    /// Execute the scan command.
    pub async fn execute(&self, settings: &AppSettings, quiet: bool) -> anyhow::Result<()> {
        let settings = self.apply_overrides(settings);
        let format = self.output_format(&settings);

        let mut config = EngineConfig::try_from(&settings)?;
        if let Some(spec) = &self.ports {
            config.ports = spec
                .parse::<PortSet>()
                .map_err(ScanError::from)
                .with_context(|| format!("invalid port list '{}'", spec))?;
        }

        let range = self.resolve_range(&settings)?;
        if self.local && !quiet && format == OutputFormat::Plain {
            output::print_info(&format!("Local network: {} ({} addresses)", range, range.len()));
        }
        let orchestrator = ScanOrchestrator::from_config(config, Some(&range))?;

        let spinner = (!quiet && format == OutputFormat::Plain).then(|| {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::with_template("{spinner:.green} [{elapsed}] {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        });

        let progress = spinner.clone();
        let target = range.to_string();
        let result = orchestrator
            .run_scan_observed(&range, None, move |phase| {
                if let Some(pb) = &progress {
                    pb.set_message(phase_message(phase, &target));
                }
            })
            .await;

        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }
        let report = result?;

        output::print_report(&report, format).context("failed to write report")?;
        if !report.complete && !quiet {
            output::print_warning("some hosts were only partially scanned");
        }

        Ok(())
    }

    fn apply_overrides(&self, settings: &AppSettings) -> AppSettings {
        let mut settings = settings.clone();
        if let Some(c) = self.concurrency {
            settings.concurrency = c;
        }
        if let Some(ms) = self.probe_timeout {
            settings.probe_timeout_ms = ms;
        }
        if let Some(ms) = self.discovery_timeout {
            settings.discovery_timeout_ms = ms;
        }
        if let Some(ms) = self.resolve_timeout {
            settings.resolve_timeout_ms = ms;
        }
        if let Some(n) = self.host_parallelism {
            settings.host_parallelism = n;
        }
        if let Some(rate) = self.rate_limit {
            settings.rate_limit = rate;
        }
        if self.interface.is_some() {
            settings.interface = self.interface.clone();
        }
        settings
    }

    fn output_format(&self, settings: &AppSettings) -> OutputFormat {
        self.output.unwrap_or_else(|| {
            settings.default_output_format.parse().unwrap_or_else(|_| {
                warn!(
                    format = %settings.default_output_format,
                    "unknown default output format, using plain"
                );
                OutputFormat::Plain
            })
        })
    }

    fn resolve_range(&self, settings: &AppSettings) -> anyhow::Result<AddressRange> {
        if self.local {
            let network = local_network(settings.interface.as_deref()).map_err(ScanError::from)?;
            return Ok(AddressRange::from_network(network).map_err(ScanError::from)?);
        }

        let text = self.range.as_deref().unwrap_or(&settings.default_range);
        AddressRange::parse(text)
            .map_err(ScanError::from)
            .with_context(|| format!("invalid address range '{}'", text))
    }
}

fn phase_message(phase: ScanPhase, target: &str) -> String {
    match phase {
        ScanPhase::Discovering => format!("Discovering hosts in {}...", target),
        ScanPhase::PortScanning => "Scanning ports...".to_string(),
        other => other.to_string(),
    }
}
