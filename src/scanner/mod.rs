//! Per-host port scanning.
//!
//! [`PortScanner::scan`] probes every port of a [`PortSet`] against one host
//! with at most `concurrency` probes in flight. The worker set lives exactly
//! as long as one call; nothing is pooled across hosts.

pub mod probe;
pub mod rate_limiter;

use crate::error::{ScanError, ScanResult};
use crate::types::{Port, PortSet};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, warn};

pub use probe::{PortProbe, TcpConnectProbe};
pub use rate_limiter::RateLimiter;

/// Simultaneous probes per host when nothing else is configured.
pub const DEFAULT_CONCURRENCY: usize = 100;

/// Runs a [`PortProbe`] across a port set with bounded parallelism.
pub struct PortScanner<P> {
    probe: Arc<P>,
    rate_limiter: Option<RateLimiter>,
}

impl<P> Clone for PortScanner<P> {
    fn clone(&self) -> Self {
        Self {
            probe: Arc::clone(&self.probe),
            rate_limiter: self.rate_limiter.clone(),
        }
    }
}

impl<P: PortProbe + 'static> PortScanner<P> {
    pub fn new(probe: P) -> Self {
        Self::from_shared(Arc::new(probe))
    }

    pub fn from_shared(probe: Arc<P>) -> Self {
        Self {
            probe,
            rate_limiter: None,
        }
    }

    /// Pace probes to `per_second`; 0 leaves them unpaced.
    pub fn with_rate_limit(mut self, per_second: u32) -> Self {
        self.rate_limiter = RateLimiter::per_second(per_second);
        self
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    /// Probe every port in `ports` once and return the open ones ascending.
    ///
    /// Closed, filtered and timed-out ports are simply absent. A probe that
    /// reports resource exhaustion stops new probes from being started; the
    /// ones already in flight are awaited and the error is returned.
    pub async fn scan(&self, host: IpAddr, ports: &PortSet, concurrency: usize) -> ScanResult<Vec<Port>> {
        if concurrency == 0 {
            return Err(ScanError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }

        let started = Instant::now();
        let targets = ports.to_ports();
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut tasks = JoinSet::new();
        let mut tally = Tally::default();

        for port in targets.iter().copied() {
            while let Some(joined) = tasks.try_join_next() {
                tally.record(joined);
            }
            if tally.failure.is_some() {
                break;
            }

            // Acquire before spawning so the number of live tasks, not just
            // running probes, stays within the bound.
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| ScanError::Worker(e.to_string()))?;
            let probe = Arc::clone(&self.probe);
            let limiter = self.rate_limiter.clone();

            tasks.spawn(async move {
                let _permit = permit;
                if let Some(limiter) = limiter {
                    limiter.wait().await;
                }
                probe.probe(host, port).await.map(|open| (port, open))
            });
        }

        while let Some(joined) = tasks.join_next().await {
            tally.record(joined);
        }

        if let Some(err) = tally.failure {
            warn!(%host, error = %err, "port scan aborted");
            return Err(err);
        }

        let mut open = tally.open;
        open.sort_unstable();
        open.dedup();
        debug!(
            %host,
            ports = targets.len(),
            open = open.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "port scan finished"
        );
        Ok(open)
    }
}

/// Aggregation point for probe outcomes.
#[derive(Default)]
struct Tally {
    open: Vec<Port>,
    failure: Option<ScanError>,
}

impl Tally {
    fn record(&mut self, joined: Result<ScanResult<(Port, bool)>, JoinError>) {
        match joined {
            Ok(Ok((port, true))) => self.open.push(port),
            Ok(Ok((_, false))) => {}
            Ok(Err(e)) => {
                self.failure.get_or_insert(e);
            }
            Err(e) => {
                self.failure.get_or_insert(ScanError::Worker(e.to_string()));
            }
        }
    }
}
