//! Subnet host discovery over ARP.
//!
//! One broadcast request goes out per address in the range while a blocking
//! listener collects replies until the discovery window closes. Replies are
//! deduplicated by IP (first one wins) and kept in arrival order, then each
//! responder's hostname is resolved.

pub mod arp;
pub mod resolver;
pub mod substrate;

pub use resolver::{DnsHostResolver, HostResolver, NoopResolver};
pub use substrate::{
    local_network, FrameReceiver, FrameSender, LinkChannel, LinkLayer, LocalEndpoint,
    PnetLinkLayer, ProbeSubstrate, SubstrateKind,
};

use crate::error::{DiscoveryError, DiscoveryResult};
use crate::types::{AddressRange, DiscoveredHost};
use arp::ArpReply;
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task;
use tracing::{debug, info, trace, warn};

/// Backoff after a receive error so a broken channel does not spin.
const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// Finds live hosts in an address range.
#[async_trait]
pub trait HostDiscovery: Send + Sync {
    /// Hosts that answered within `timeout`, in the order they answered.
    ///
    /// No answers is `Ok(vec![])`; only an unusable probing substrate is an
    /// error.
    async fn discover(
        &self,
        range: &AddressRange,
        timeout: Duration,
    ) -> DiscoveryResult<Vec<DiscoveredHost>>;
}

/// ARP-based discoverer over a [`ProbeSubstrate`].
pub struct ArpDiscoverer<R = DnsHostResolver> {
    substrate: ProbeSubstrate,
    resolver: Arc<R>,
}

impl<R: HostResolver + 'static> ArpDiscoverer<R> {
    pub fn new(substrate: ProbeSubstrate, resolver: R) -> Self {
        Self {
            substrate,
            resolver: Arc::new(resolver),
        }
    }

    pub fn substrate_kind(&self) -> SubstrateKind {
        self.substrate.kind()
    }

    /// Hardware address of a single host, if it answers within `timeout`.
    pub async fn lookup_mac(
        &self,
        ip: Ipv4Addr,
        timeout: Duration,
    ) -> DiscoveryResult<Option<String>> {
        let replies = self.collect_replies(vec![ip], timeout).await?;
        Ok(replies.first().map(|reply| reply.mac.to_string()))
    }

    /// Broadcast one request per target and gather unique replies.
    async fn collect_replies(
        &self,
        targets: Vec<Ipv4Addr>,
        window: Duration,
    ) -> DiscoveryResult<Vec<ArpReply>> {
        let LinkChannel {
            local,
            sender,
            receiver,
        } = self.substrate.open()?;

        let frames = targets
            .iter()
            .map(|&target| arp::build_request(local.mac, local.ip, target))
            .collect::<DiscoveryResult<Vec<_>>>()?;
        let wanted: HashSet<Ipv4Addr> = targets.into_iter().collect();

        let deadline = Instant::now() + window;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let listener = task::spawn_blocking(move || listen(receiver, deadline, tx));
        let broadcast = task::spawn_blocking(move || send_requests(sender, frames));

        let mut seen = HashSet::new();
        let mut replies = Vec::new();
        while let Some(reply) = rx.recv().await {
            if !wanted.contains(&reply.ip) {
                trace!(ip = %reply.ip, "ignoring reply outside range");
                continue;
            }
            if seen.insert(reply.ip) {
                debug!(ip = %reply.ip, mac = %reply.mac, "host answered");
                replies.push(reply);
            } else {
                trace!(ip = %reply.ip, "duplicate reply dropped");
            }
        }

        listener
            .await
            .map_err(|e| DiscoveryError::Worker(e.to_string()))?;
        let summary = broadcast
            .await
            .map_err(|e| DiscoveryError::Worker(e.to_string()))?;
        debug!(sent = summary.sent, failed = summary.failed, "ARP requests sent");

        // Send failures on an open channel are transient; only a broadcast
        // where nothing went out and nothing came back is reported.
        if let Some(source) = summary.last_error {
            warn!(
                interface = self.substrate.name(),
                failed = summary.failed,
                error = %source,
                "some ARP requests could not be sent"
            );
            if summary.sent == 0 && replies.is_empty() {
                return Err(DiscoveryError::Link {
                    interface: self.substrate.name().to_string(),
                    source,
                });
            }
        }

        Ok(replies)
    }
}

#[async_trait]
impl<R: HostResolver + 'static> HostDiscovery for ArpDiscoverer<R> {
    async fn discover(
        &self,
        range: &AddressRange,
        timeout: Duration,
    ) -> DiscoveryResult<Vec<DiscoveredHost>> {
        let started = Instant::now();
        let replies = self.collect_replies(range.addresses().collect(), timeout).await?;

        let names = join_all(
            replies
                .iter()
                .map(|reply| self.resolver.resolve(IpAddr::V4(reply.ip))),
        )
        .await;

        let hosts: Vec<DiscoveredHost> = replies
            .into_iter()
            .zip(names)
            .map(|(reply, name)| {
                DiscoveredHost::new(reply.ip, Some(reply.mac.to_string())).with_hostname(name)
            })
            .collect();

        info!(
            range = %range,
            responders = hosts.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "discovery complete"
        );
        Ok(hosts)
    }
}

/// Forward ARP replies until `deadline`.
fn listen(
    mut receiver: Box<dyn FrameReceiver>,
    deadline: Instant,
    replies: mpsc::UnboundedSender<ArpReply>,
) {
    while Instant::now() < deadline {
        match receiver.next_frame() {
            Ok(Some(frame)) => {
                if let Some(reply) = arp::parse_reply(&frame) {
                    if replies.send(reply).is_err() {
                        break;
                    }
                }
            }
            Ok(None) => {}
            Err(e) => {
                debug!(error = %e, "link receive error");
                std::thread::sleep(RECEIVE_ERROR_BACKOFF);
            }
        }
    }
}

#[derive(Debug, Default)]
struct SendSummary {
    sent: usize,
    failed: usize,
    last_error: Option<std::io::Error>,
}

/// Send every frame once. A failed frame is skipped, not retried.
fn send_requests(mut sender: Box<dyn FrameSender>, frames: Vec<Vec<u8>>) -> SendSummary {
    let mut summary = SendSummary::default();
    for frame in &frames {
        match sender.send_frame(frame) {
            Ok(()) => summary.sent += 1,
            Err(e) => {
                trace!(error = %e, "ARP request dropped");
                summary.failed += 1;
                summary.last_error = Some(e);
            }
        }
    }
    summary
}
