//! Scan orchestration: discovery followed by per-host port scans.
//!
//! Each call to [`ScanOrchestrator::run_scan`] walks the phase machine
//! `Idle → Discovering → PortScanning → Completed`, or ends in `Errored`
//! when discovery cannot run or a host's scan exhausts local resources.
//! Other per-host failures only mark that host incomplete.
//! Nothing is carried over between calls.

use crate::config::AppSettings;
use crate::discovery::{ArpDiscoverer, DnsHostResolver, HostDiscovery, ProbeSubstrate};
use crate::error::{ScanError, ScanResult};
use crate::scanner::{PortProbe, PortScanner, TcpConnectProbe, DEFAULT_CONCURRENCY};
use crate::types::{
    AddressRange, DiscoveredHost, PortScanResult, PortSet, ReportEntry, ScanId, ScanReport,
};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::fmt;
use std::net::IpAddr;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Validated engine settings for one orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub discovery_timeout: Duration,
    pub probe_timeout: Duration,
    pub resolve_timeout: Duration,
    /// Simultaneous probes per host.
    pub concurrency: usize,
    /// Hosts scanned at once. Report order is discovery order regardless.
    pub host_parallelism: usize,
    /// Probes per second, 0 for unlimited.
    pub rate_limit: u32,
    /// Ports used when the caller supplies none.
    pub ports: PortSet,
    pub interface: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            discovery_timeout: Duration::from_secs(2),
            probe_timeout: TcpConnectProbe::DEFAULT_TIMEOUT,
            resolve_timeout: DnsHostResolver::DEFAULT_TIMEOUT,
            concurrency: DEFAULT_CONCURRENCY,
            host_parallelism: 1,
            rate_limit: 0,
            ports: PortSet::common_services(),
            interface: None,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> ScanResult<()> {
        if self.concurrency == 0 {
            return Err(ScanError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.host_parallelism == 0 {
            return Err(ScanError::InvalidConfig(
                "host parallelism must be at least 1".to_string(),
            ));
        }
        if self.ports.is_empty() {
            return Err(ScanError::InvalidConfig("port set is empty".to_string()));
        }
        Ok(())
    }
}

impl TryFrom<&AppSettings> for EngineConfig {
    type Error = ScanError;

    fn try_from(settings: &AppSettings) -> Result<Self, Self::Error> {
        let config = Self {
            discovery_timeout: Duration::from_millis(settings.discovery_timeout_ms),
            probe_timeout: Duration::from_millis(settings.probe_timeout_ms),
            resolve_timeout: Duration::from_millis(settings.resolve_timeout_ms),
            concurrency: settings.concurrency,
            host_parallelism: settings.host_parallelism,
            rate_limit: settings.rate_limit,
            ports: PortSet::common_services(),
            interface: settings.interface.clone(),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Lifecycle of a single scan invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanPhase {
    Idle,
    Discovering,
    PortScanning,
    Completed,
    Errored,
}

impl ScanPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Errored)
    }

    pub fn can_transition_to(self, next: ScanPhase) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Discovering)
                | (Self::Discovering, Self::PortScanning)
                | (Self::Discovering, Self::Errored)
                | (Self::PortScanning, Self::Completed)
                | (Self::PortScanning, Self::Errored)
        )
    }
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Discovering => "discovering",
            Self::PortScanning => "port-scanning",
            Self::Completed => "completed",
            Self::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// Tracks the current phase and reports each transition.
struct PhaseTracker<F> {
    phase: ScanPhase,
    observer: F,
}

impl<F: FnMut(ScanPhase)> PhaseTracker<F> {
    fn new(observer: F) -> Self {
        Self {
            phase: ScanPhase::Idle,
            observer,
        }
    }

    fn advance(&mut self, next: ScanPhase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "illegal phase transition {} -> {}",
            self.phase,
            next
        );
        debug!(from = %self.phase, phase = %next, "scan phase");
        self.phase = next;
        (self.observer)(next);
    }
}

/// Top-level entry point of the engine.
pub struct ScanOrchestrator<D, P> {
    discovery: D,
    scanner: PortScanner<P>,
    config: EngineConfig,
}

impl ScanOrchestrator<ArpDiscoverer<DnsHostResolver>, TcpConnectProbe> {
    /// Wire up ARP discovery, reverse DNS and connect probing for this host.
    ///
    /// The probing substrate is detected here. When no raw channel is
    /// available the orchestrator is still built; the first scan reports
    /// the capability error.
    pub fn from_config(config: EngineConfig, range: Option<&AddressRange>) -> ScanResult<Self> {
        let substrate = ProbeSubstrate::detect(config.interface.as_deref(), range);
        info!(substrate = %substrate.kind(), interface = substrate.name(), "probing substrate selected");

        let discovery = ArpDiscoverer::new(substrate, DnsHostResolver::new(config.resolve_timeout));
        let probe = TcpConnectProbe::new(config.probe_timeout);
        Self::new(discovery, probe, config)
    }
}

impl<D: HostDiscovery, P: PortProbe + 'static> ScanOrchestrator<D, P> {
    pub fn new(discovery: D, probe: P, config: EngineConfig) -> ScanResult<Self> {
        config.validate()?;
        let scanner = PortScanner::new(probe).with_rate_limit(config.rate_limit);
        Ok(Self {
            discovery,
            scanner,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn discovery(&self) -> &D {
        &self.discovery
    }

    /// Discover hosts in `range` and scan each for open ports.
    ///
    /// `ports` defaults to the configured set (the ten common services unless
    /// changed).
    pub async fn run_scan(&self, range: &AddressRange, ports: Option<&PortSet>) -> ScanResult<ScanReport> {
        self.run_scan_observed(range, ports, |_| {}).await
    }

    /// [`run_scan`](Self::run_scan), calling `observer` on every phase change.
    pub async fn run_scan_observed<F>(
        &self,
        range: &AddressRange,
        ports: Option<&PortSet>,
        observer: F,
    ) -> ScanResult<ScanReport>
    where
        F: FnMut(ScanPhase) + Send,
    {
        let ports = ports.unwrap_or(&self.config.ports);
        let mut phases = PhaseTracker::new(observer);
        let started_at = Utc::now();
        let clock = Instant::now();

        info!(%range, addresses = range.len(), ports = ports.count(), "scan started");
        phases.advance(ScanPhase::Discovering);

        let hosts = match self.discovery.discover(range, self.config.discovery_timeout).await {
            Ok(hosts) => hosts,
            Err(e) => {
                warn!(%range, error = %e, "discovery failed");
                phases.advance(ScanPhase::Errored);
                return Err(e.into());
            }
        };

        phases.advance(ScanPhase::PortScanning);
        info!(responders = hosts.len(), "discovery finished");

        // `buffered` yields in input order, so discovery order survives any
        // amount of cross-host parallelism.
        let scanned: Vec<(ReportEntry, bool)> = stream::iter(hosts)
            .map(|host| self.scan_host(host, ports))
            .buffered(self.config.host_parallelism)
            .collect()
            .await;

        // Only resource exhaustion is fatal to the run; any other host
        // failure is confined to that host's entry.
        let exhausted = scanned.iter().any(|(_, exhausted)| *exhausted);
        let entries: Vec<ReportEntry> = scanned.into_iter().map(|(entry, _)| entry).collect();
        let complete = entries.iter().all(|entry| entry.ports.is_complete());
        phases.advance(if exhausted {
            ScanPhase::Errored
        } else {
            ScanPhase::Completed
        });

        let report = ScanReport {
            id: ScanId::new(),
            range: range.to_string(),
            started_at,
            completed_at: Utc::now(),
            complete,
            entries,
        };
        info!(
            scan_id = %report.id.short(),
            hosts = report.hosts_found(),
            open_ports = report.total_open_ports(),
            complete,
            elapsed_ms = clock.elapsed().as_millis() as u64,
            "scan finished"
        );
        Ok(report)
    }

    /// Scan one host; the flag is set when the scan hit resource exhaustion.
    async fn scan_host(&self, host: DiscoveredHost, ports: &PortSet) -> (ReportEntry, bool) {
        let ip = IpAddr::V4(host.ip);
        let (result, exhausted) = match self.scanner.scan(ip, ports, self.config.concurrency).await {
            Ok(open) => (PortScanResult::completed(host.ip, open), false),
            Err(e) => {
                warn!(host = %ip, error = %e, "host scan incomplete");
                let exhausted = matches!(e, ScanError::ResourceExhausted { .. });
                (PortScanResult::incomplete(host.ip, e.to_string()), exhausted)
            }
        };
        let entry = ReportEntry {
            host,
            ports: result,
        };
        (entry, exhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CapabilityReason, DiscoveryError, DiscoveryErrorKind, DiscoveryResult};
    use crate::types::{HostScanStatus, Port};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::io;
    use std::net::Ipv4Addr;
    use std::sync::Mutex;
    use tokio::net::TcpListener;
    use tokio_test::{assert_err, assert_ok};

    struct StaticDiscovery {
        hosts: Vec<DiscoveredHost>,
    }

    impl StaticDiscovery {
        fn new(ips: &[Ipv4Addr]) -> Self {
            Self {
                hosts: ips
                    .iter()
                    .map(|ip| DiscoveredHost::new(*ip, Some("aa:bb:cc:dd:ee:ff".to_string())))
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl HostDiscovery for StaticDiscovery {
        async fn discover(
            &self,
            _range: &AddressRange,
            _timeout: Duration,
        ) -> DiscoveryResult<Vec<DiscoveredHost>> {
            Ok(self.hosts.clone())
        }
    }

    struct FailingDiscovery;

    #[async_trait]
    impl HostDiscovery for FailingDiscovery {
        async fn discover(
            &self,
            _range: &AddressRange,
            _timeout: Duration,
        ) -> DiscoveryResult<Vec<DiscoveredHost>> {
            Err(DiscoveryError::capability(
                CapabilityReason::PermissionDenied,
                "raw sockets need elevated privileges",
            ))
        }
    }

    /// Open ports per host; optional per-host delay; one host may exhaust
    /// and one may panic.
    #[derive(Default)]
    struct StubProbe {
        open: HashSet<(IpAddr, u16)>,
        slow: HashSet<IpAddr>,
        exhaust: Option<IpAddr>,
        panics: Option<IpAddr>,
    }

    #[async_trait]
    impl PortProbe for StubProbe {
        async fn probe(&self, host: IpAddr, port: Port) -> ScanResult<bool> {
            if self.exhaust == Some(host) {
                return Err(ScanError::ResourceExhausted {
                    host,
                    port: port.as_u16(),
                    source: io::Error::from_raw_os_error(24),
                });
            }
            if self.panics == Some(host) {
                panic!("probe task crashed on {host}");
            }
            if self.slow.contains(&host) {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            Ok(self.open.contains(&(host, port.as_u16())))
        }
    }

    fn ip(last: u8) -> Ipv4Addr {
        Ipv4Addr::new(192, 168, 1, last)
    }

    fn range() -> AddressRange {
        "192.168.1.0/24".parse().unwrap()
    }

    fn recording() -> (std::sync::Arc<Mutex<Vec<ScanPhase>>>, impl FnMut(ScanPhase) + Send) {
        let seen = std::sync::Arc::new(Mutex::new(Vec::new()));
        let sink = std::sync::Arc::clone(&seen);
        (seen, move |phase| sink.lock().unwrap().push(phase))
    }

    #[tokio::test]
    async fn test_scan_scenario_open_ports() {
        let host = IpAddr::V4(ip(10));
        let probe = StubProbe {
            open: [(host, 80), (host, 443)].into_iter().collect(),
            ..Default::default()
        };
        let orchestrator =
            ScanOrchestrator::new(StaticDiscovery::new(&[ip(10)]), probe, EngineConfig::default())
                .unwrap();

        let ports = PortSet::from_numbers(&[22, 80, 443, 8080]).unwrap();
        let report = assert_ok!(orchestrator.run_scan(&range(), Some(&ports)).await);

        assert!(report.complete);
        assert_eq!(report.hosts_found(), 1);
        assert_eq!(report.entries[0].ports.open_port_numbers(), vec![80, 443]);
        assert_eq!(report.range, "192.168.1.0/24");
    }

    #[tokio::test]
    async fn test_default_port_set_used() {
        let host = IpAddr::V4(ip(2));
        let probe = StubProbe {
            open: [(host, 22), (host, 9999), (host, 3306)].into_iter().collect(),
            ..Default::default()
        };
        let orchestrator =
            ScanOrchestrator::new(StaticDiscovery::new(&[ip(2)]), probe, EngineConfig::default())
                .unwrap();

        let report = assert_ok!(orchestrator.run_scan(&range(), None).await);
        // 9999 is not in the common-services set.
        assert_eq!(report.entries[0].ports.open_port_numbers(), vec![22, 3306]);
    }

    #[tokio::test]
    async fn test_phases_on_success() {
        let orchestrator = ScanOrchestrator::new(
            StaticDiscovery::new(&[ip(3)]),
            StubProbe::default(),
            EngineConfig::default(),
        )
        .unwrap();

        let (seen, observer) = recording();
        assert_ok!(orchestrator.run_scan_observed(&range(), None, observer).await);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                ScanPhase::Discovering,
                ScanPhase::PortScanning,
                ScanPhase::Completed
            ]
        );
    }

    #[tokio::test]
    async fn test_capability_error_aborts_without_report() {
        let orchestrator =
            ScanOrchestrator::new(FailingDiscovery, StubProbe::default(), EngineConfig::default())
                .unwrap();

        let (seen, observer) = recording();
        let err = assert_err!(orchestrator.run_scan_observed(&range(), None, observer).await);

        assert!(err.is_capability_unavailable());
        match &err {
            ScanError::Discovery(e) => {
                assert_eq!(e.kind(), DiscoveryErrorKind::CapabilityUnavailable)
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(
            *seen.lock().unwrap(),
            vec![ScanPhase::Discovering, ScanPhase::Errored]
        );
    }

    #[tokio::test]
    async fn test_empty_discovery_is_a_successful_empty_report() {
        let orchestrator = ScanOrchestrator::new(
            StaticDiscovery::new(&[]),
            StubProbe::default(),
            EngineConfig::default(),
        )
        .unwrap();

        let report = assert_ok!(orchestrator.run_scan(&range(), None).await);
        assert!(report.complete);
        assert!(report.entries.is_empty());
    }

    #[tokio::test]
    async fn test_exhaustion_flags_host_and_keeps_others() {
        let bad = IpAddr::V4(ip(5));
        let good = IpAddr::V4(ip(6));
        let probe = StubProbe {
            open: [(good, 80)].into_iter().collect(),
            exhaust: Some(bad),
            ..Default::default()
        };
        let orchestrator = ScanOrchestrator::new(
            StaticDiscovery::new(&[ip(5), ip(6)]),
            probe,
            EngineConfig::default(),
        )
        .unwrap();

        let (seen, observer) = recording();
        let report = assert_ok!(orchestrator.run_scan_observed(&range(), None, observer).await);

        assert!(!report.complete);
        assert!(matches!(
            report.entry(ip(5)).unwrap().ports.status,
            HostScanStatus::Incomplete { .. }
        ));
        let healthy = report.entry(ip(6)).unwrap();
        assert!(healthy.ports.is_complete());
        assert_eq!(healthy.ports.open_port_numbers(), vec![80]);
        assert_eq!(seen.lock().unwrap().last(), Some(&ScanPhase::Errored));
    }

    #[tokio::test]
    async fn test_crashed_worker_is_not_fatal_to_the_run() {
        let crashed = IpAddr::V4(ip(7));
        let good = IpAddr::V4(ip(8));
        let probe = StubProbe {
            open: [(good, 22)].into_iter().collect(),
            panics: Some(crashed),
            ..Default::default()
        };
        let orchestrator = ScanOrchestrator::new(
            StaticDiscovery::new(&[ip(7), ip(8)]),
            probe,
            EngineConfig::default(),
        )
        .unwrap();

        let (seen, observer) = recording();
        let report = assert_ok!(orchestrator.run_scan_observed(&range(), None, observer).await);

        assert!(!report.complete);
        assert!(!report.entry(ip(7)).unwrap().ports.is_complete());
        assert_eq!(report.entry(ip(8)).unwrap().ports.open_port_numbers(), vec![22]);
        assert_eq!(seen.lock().unwrap().last(), Some(&ScanPhase::Completed));
    }

    #[tokio::test]
    async fn test_parallel_hosts_keep_discovery_order() {
        let first = IpAddr::V4(ip(50));
        let probe = StubProbe {
            slow: [first].into_iter().collect(),
            ..Default::default()
        };
        let config = EngineConfig {
            host_parallelism: 3,
            ..EngineConfig::default()
        };
        let order = [ip(50), ip(4), ip(20)];
        let orchestrator =
            ScanOrchestrator::new(StaticDiscovery::new(&order), probe, config).unwrap();

        let report = assert_ok!(orchestrator.run_scan(&range(), None).await);
        let ips: Vec<Ipv4Addr> = report.entries.iter().map(|e| e.host.ip).collect();
        assert_eq!(ips, order);
    }

    #[tokio::test]
    async fn test_loopback_host_scan() {
        let http = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let https = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let closed = {
            let tmp = TcpListener::bind("127.0.0.1:0").await.unwrap();
            tmp.local_addr().unwrap().port()
        };
        let a = http.local_addr().unwrap().port();
        let b = https.local_addr().unwrap().port();

        let config = EngineConfig {
            probe_timeout: Duration::from_millis(300),
            ..EngineConfig::default()
        };
        let orchestrator = ScanOrchestrator::new(
            StaticDiscovery::new(&[Ipv4Addr::LOCALHOST]),
            TcpConnectProbe::new(config.probe_timeout),
            config,
        )
        .unwrap();

        let ports = PortSet::from_numbers(&[closed, a, b]).unwrap();
        let loopback: AddressRange = "127.0.0.1".parse().unwrap();
        let report = assert_ok!(orchestrator.run_scan(&loopback, Some(&ports)).await);

        let mut expected = vec![a, b];
        expected.sort_unstable();
        assert_eq!(report.entries[0].ports.open_port_numbers(), expected);
    }

    #[test]
    fn test_config_validation() {
        assert!(EngineConfig::default().validate().is_ok());

        let zero = EngineConfig {
            concurrency: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(zero.validate(), Err(ScanError::InvalidConfig(_))));

        let no_hosts = EngineConfig {
            host_parallelism: 0,
            ..EngineConfig::default()
        };
        assert!(ScanOrchestrator::new(FailingDiscovery, StubProbe::default(), no_hosts).is_err());
    }

    #[test]
    fn test_config_from_settings() {
        let settings = AppSettings {
            probe_timeout_ms: 250,
            host_parallelism: 4,
            interface: Some("en0".to_string()),
            ..AppSettings::default()
        };
        let config = EngineConfig::try_from(&settings).unwrap();
        assert_eq!(config.probe_timeout, Duration::from_millis(250));
        assert_eq!(config.discovery_timeout, Duration::from_secs(2));
        assert_eq!(config.host_parallelism, 4);
        assert_eq!(config.interface.as_deref(), Some("en0"));

        let bad = AppSettings {
            concurrency: 0,
            ..AppSettings::default()
        };
        assert!(EngineConfig::try_from(&bad).is_err());
    }

    #[test]
    fn test_phase_transitions() {
        assert!(ScanPhase::Idle.can_transition_to(ScanPhase::Discovering));
        assert!(ScanPhase::Discovering.can_transition_to(ScanPhase::Errored));
        assert!(!ScanPhase::Idle.can_transition_to(ScanPhase::Completed));
        assert!(!ScanPhase::Completed.can_transition_to(ScanPhase::Discovering));
        assert!(ScanPhase::Errored.is_terminal());
        assert_eq!(ScanPhase::PortScanning.to_string(), "port-scanning");
    }
}
