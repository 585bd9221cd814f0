//! Best-effort reverse DNS for discovered hosts.
//!
//! Resolution never fails from the caller's point of view: NXDOMAIN, timeouts
//! and malformed answers all collapse to [`UNKNOWN_HOSTNAME`].

use crate::types::UNKNOWN_HOSTNAME;
use async_trait::async_trait;
use std::net::IpAddr;
use std::time::Duration;
use tracing::{debug, trace};
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::system_conf::read_system_conf;
use trust_dns_resolver::TokioAsyncResolver;

/// Maps an address to a hostname or the "unknown" sentinel.
#[async_trait]
pub trait HostResolver: Send + Sync {
    async fn resolve(&self, ip: IpAddr) -> String;
}

/// Reverse (PTR) lookups through the system's configured nameservers.
pub struct DnsHostResolver {
    resolver: TokioAsyncResolver,
    timeout: Duration,
}

impl DnsHostResolver {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

    /// Build a resolver bounded by `timeout` per lookup.
    ///
    /// LAN names usually live on the local router, so the system
    /// configuration is preferred over public defaults.
    pub fn new(timeout: Duration) -> Self {
        let (config, mut opts) = read_system_conf().unwrap_or_else(|e| {
            debug!(error = %e, "system resolver config unavailable, using defaults");
            (ResolverConfig::default(), ResolverOpts::default())
        });
        opts.timeout = timeout;
        opts.attempts = 1;

        Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
            timeout,
        }
    }
}

impl Default for DnsHostResolver {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl HostResolver for DnsHostResolver {
    async fn resolve(&self, ip: IpAddr) -> String {
        match tokio::time::timeout(self.timeout, self.resolver.reverse_lookup(ip)).await {
            Ok(Ok(lookup)) => lookup
                .iter()
                .map(|name| normalize(&name.to_string()))
                .find(|name| !name.is_empty())
                .unwrap_or_else(|| UNKNOWN_HOSTNAME.to_string()),
            Ok(Err(e)) => {
                trace!(%ip, error = %e, "reverse lookup failed");
                UNKNOWN_HOSTNAME.to_string()
            }
            Err(_) => {
                debug!(%ip, timeout_ms = self.timeout.as_millis() as u64, "reverse lookup timed out");
                UNKNOWN_HOSTNAME.to_string()
            }
        }
    }
}

/// Skips resolution entirely.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopResolver;

#[async_trait]
impl HostResolver for NoopResolver {
    async fn resolve(&self, _ip: IpAddr) -> String {
        UNKNOWN_HOSTNAME.to_string()
    }
}

/// Strip the root label from a fully qualified name.
fn normalize(name: &str) -> String {
    name.trim().trim_end_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("router.lan."), "router.lan");
        assert_eq!(normalize("host"), "host");
        assert_eq!(normalize("."), "");
    }

    #[tokio::test]
    async fn test_noop_resolver() {
        let name = NoopResolver.resolve(IpAddr::V4(Ipv4Addr::LOCALHOST)).await;
        assert_eq!(name, UNKNOWN_HOSTNAME);
    }

    #[tokio::test]
    async fn test_lookup_bounded_by_timeout() {
        // TEST-NET-1 has no PTR records and a 1ms budget cannot complete anyway.
        let resolver = DnsHostResolver::new(Duration::from_millis(1));
        let started = std::time::Instant::now();
        let name = resolver.resolve(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1))).await;
        assert_eq!(name, UNKNOWN_HOSTNAME);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_resolve_returns_name_or_sentinel() {
        let resolver = DnsHostResolver::new(Duration::from_millis(200));
        let name = resolver.resolve(IpAddr::V4(Ipv4Addr::LOCALHOST)).await;
        assert!(!name.is_empty());
    }
}
