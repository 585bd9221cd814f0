//! Probing substrate: the privileged link-layer channel ARP discovery needs.
//!
//! Capability is decided once, when the substrate is detected. A host that
//! cannot open a raw Ethernet channel gets [`ProbeSubstrate::Transport`], and
//! discovery over it fails with a tagged `CapabilityUnavailable` error.

use crate::error::{CapabilityReason, DiscoveryError, DiscoveryResult};
use crate::types::AddressRange;
use ipnetwork::{IpNetwork, Ipv4Network};
use pnet::datalink::{self, Channel, Config, DataLinkReceiver, DataLinkSender, NetworkInterface};
use pnet::util::MacAddr;
use std::fmt;
use std::io;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Poll interval of the raw receiver; bounds how late the listener notices
/// its deadline.
const READ_TIMEOUT: Duration = Duration::from_millis(50);

/// Our own addresses on the probed link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalEndpoint {
    pub mac: MacAddr,
    pub ip: Ipv4Addr,
}

/// Sending half of a link-layer channel.
pub trait FrameSender: Send {
    fn send_frame(&mut self, frame: &[u8]) -> io::Result<()>;
}

/// Receiving half of a link-layer channel.
pub trait FrameReceiver: Send {
    /// Next frame, or `None` if the read timed out with nothing to deliver.
    fn next_frame(&mut self) -> io::Result<Option<Vec<u8>>>;
}

/// An open link-layer channel.
pub struct LinkChannel {
    pub local: LocalEndpoint,
    pub sender: Box<dyn FrameSender>,
    pub receiver: Box<dyn FrameReceiver>,
}

/// Something that can open a raw Ethernet channel.
pub trait LinkLayer: Send + Sync {
    /// Interface name, for logs and error messages.
    fn name(&self) -> &str;

    fn open(&self) -> DiscoveryResult<LinkChannel>;
}

/// The two probing capabilities a host can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubstrateKind {
    /// Raw link-layer access: ARP broadcast discovery works.
    LinkLayerProbe,
    /// Plain connect-based probing only.
    TransportProbe,
}

impl fmt::Display for SubstrateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LinkLayerProbe => write!(f, "link-layer"),
            Self::TransportProbe => write!(f, "transport"),
        }
    }
}

/// The probing substrate selected for this process.
#[derive(Clone)]
pub enum ProbeSubstrate {
    LinkLayer(Arc<dyn LinkLayer>),
    Transport {
        reason: CapabilityReason,
        detail: String,
    },
}

impl ProbeSubstrate {
    /// Pick the substrate this host supports.
    ///
    /// Chooses the named interface, or one whose subnet covers `range`, or
    /// the first usable one, then checks that a raw channel can be opened.
    pub fn detect(interface: Option<&str>, range: Option<&AddressRange>) -> Self {
        let link = match select_interface(interface, range).and_then(PnetLinkLayer::new) {
            Ok(link) => link,
            Err(e) => return Self::from_error(e),
        };

        match link.open() {
            Ok(_) => {
                info!(interface = link.name(), "link-layer probing available");
                Self::LinkLayer(Arc::new(link))
            }
            Err(e) => Self::from_error(e),
        }
    }

    pub fn link_layer(link: impl LinkLayer + 'static) -> Self {
        Self::LinkLayer(Arc::new(link))
    }

    fn from_error(err: DiscoveryError) -> Self {
        debug!(error = %err, "falling back to transport-level probing");
        match err {
            DiscoveryError::CapabilityUnavailable { reason, detail } => {
                Self::Transport { reason, detail }
            }
            other => Self::Transport {
                reason: CapabilityReason::ChannelUnavailable,
                detail: other.to_string(),
            },
        }
    }

    /// Interface name, or "transport" when there is no link-layer access.
    pub fn name(&self) -> &str {
        match self {
            Self::LinkLayer(link) => link.name(),
            Self::Transport { .. } => "transport",
        }
    }

    pub fn kind(&self) -> SubstrateKind {
        match self {
            Self::LinkLayer(_) => SubstrateKind::LinkLayerProbe,
            Self::Transport { .. } => SubstrateKind::TransportProbe,
        }
    }

    /// Open a channel for one discovery run.
    pub(crate) fn open(&self) -> DiscoveryResult<LinkChannel> {
        match self {
            Self::LinkLayer(link) => link.open(),
            Self::Transport { reason, detail } => Err(DiscoveryError::capability(
                CapabilityReason::TransportOnly,
                format!("ARP discovery needs raw link-layer access ({}: {})", reason, detail),
            )),
        }
    }
}

impl fmt::Debug for ProbeSubstrate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LinkLayer(link) => f.debug_tuple("LinkLayer").field(&link.name()).finish(),
            Self::Transport { reason, detail } => f
                .debug_struct("Transport")
                .field("reason", reason)
                .field("detail", detail)
                .finish(),
        }
    }
}

/// Raw Ethernet access through pnet's datalink layer.
pub struct PnetLinkLayer {
    interface: NetworkInterface,
    local: LocalEndpoint,
}

impl PnetLinkLayer {
    pub fn new(interface: NetworkInterface) -> DiscoveryResult<Self> {
        let mac = interface
            .mac
            .filter(|mac| *mac != MacAddr::zero())
            .ok_or_else(|| {
                DiscoveryError::capability(
                    CapabilityReason::NoSuitableInterface,
                    format!("interface {} has no hardware address", interface.name),
                )
            })?;
        let ip = interface_ipv4(&interface)
            .map(|net| net.ip())
            .ok_or_else(|| {
                DiscoveryError::capability(
                    CapabilityReason::NoSuitableInterface,
                    format!("interface {} has no IPv4 address", interface.name),
                )
            })?;

        Ok(Self {
            interface,
            local: LocalEndpoint { mac, ip },
        })
    }
}

impl LinkLayer for PnetLinkLayer {
    fn name(&self) -> &str {
        &self.interface.name
    }

    fn open(&self) -> DiscoveryResult<LinkChannel> {
        let config = Config {
            read_timeout: Some(READ_TIMEOUT),
            ..Default::default()
        };

        match datalink::channel(&self.interface, config) {
            Ok(Channel::Ethernet(tx, rx)) => Ok(LinkChannel {
                local: self.local,
                sender: Box::new(PnetSender(tx)),
                receiver: Box::new(PnetReceiver(rx)),
            }),
            Ok(_) => Err(DiscoveryError::capability(
                CapabilityReason::UnsupportedChannel,
                format!("interface {} is not Ethernet framed", self.interface.name),
            )),
            Err(e) => Err(DiscoveryError::from_channel_error(&e, &self.interface.name)),
        }
    }
}

struct PnetSender(Box<dyn DataLinkSender>);

impl FrameSender for PnetSender {
    fn send_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        self.0
            .send_to(frame, None)
            .unwrap_or_else(|| Err(io::Error::new(io::ErrorKind::Other, "send buffer unavailable")))
    }
}

struct PnetReceiver(Box<dyn DataLinkReceiver>);

impl FrameReceiver for PnetReceiver {
    fn next_frame(&mut self) -> io::Result<Option<Vec<u8>>> {
        match self.0.next() {
            Ok(frame) => Ok(Some(frame.to_vec())),
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

fn interface_ipv4(interface: &NetworkInterface) -> Option<Ipv4Network> {
    interface.ips.iter().find_map(|ip| match ip {
        IpNetwork::V4(net) if !net.ip().is_loopback() => Some(*net),
        _ => None,
    })
}

fn is_usable(interface: &NetworkInterface) -> bool {
    interface.is_up()
        && !interface.is_loopback()
        && interface.mac.is_some_and(|mac| mac != MacAddr::zero())
        && interface_ipv4(interface).is_some()
}

/// Find the interface to probe from.
fn select_interface(
    name: Option<&str>,
    range: Option<&AddressRange>,
) -> DiscoveryResult<NetworkInterface> {
    let interfaces = datalink::interfaces();

    if let Some(name) = name {
        return interfaces
            .into_iter()
            .find(|iface| iface.name == name)
            .ok_or_else(|| {
                DiscoveryError::capability(
                    CapabilityReason::NoSuitableInterface,
                    format!("interface {} not found", name),
                )
            });
    }

    let mut usable: Vec<NetworkInterface> = interfaces.into_iter().filter(is_usable).collect();

    if let Some(range) = range {
        let covering = usable.iter().position(|iface| {
            interface_ipv4(iface)
                .is_some_and(|net| range.addresses().next().is_some_and(|a| net.contains(a)))
        });
        if let Some(index) = covering {
            return Ok(usable.swap_remove(index));
        }
    }

    usable.into_iter().next().ok_or_else(|| {
        DiscoveryError::capability(
            CapabilityReason::NoSuitableInterface,
            "no up, non-loopback interface with a hardware and IPv4 address",
        )
    })
}

/// The IPv4 network of the interface discovery would use.
pub fn local_network(interface: Option<&str>) -> DiscoveryResult<Ipv4Network> {
    let iface = select_interface(interface, None)?;
    let net = interface_ipv4(&iface).ok_or_else(|| {
        DiscoveryError::capability(
            CapabilityReason::NoSuitableInterface,
            format!("interface {} has no IPv4 address", iface.name),
        )
    })?;
    Ipv4Network::new(net.network(), net.prefix()).map_err(|e| {
        DiscoveryError::capability(CapabilityReason::NoSuitableInterface, e.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct DeniedLink;

    impl LinkLayer for DeniedLink {
        fn name(&self) -> &str {
            "denied0"
        }

        fn open(&self) -> DiscoveryResult<LinkChannel> {
            Err(DiscoveryError::from_channel_error(
                &io::Error::from(io::ErrorKind::PermissionDenied),
                self.name(),
            ))
        }
    }

    #[test]
    fn test_transport_substrate_refuses_to_open() {
        let substrate = ProbeSubstrate::Transport {
            reason: CapabilityReason::PermissionDenied,
            detail: "operation not permitted".to_string(),
        };
        assert_eq!(substrate.kind(), SubstrateKind::TransportProbe);

        let err = substrate.open().err().unwrap();
        assert_eq!(err.capability_reason(), Some(CapabilityReason::TransportOnly));
        assert!(err.to_string().contains("permission denied"));
    }

    #[test]
    fn test_link_layer_errors_pass_through() {
        let substrate = ProbeSubstrate::link_layer(DeniedLink);
        assert_eq!(substrate.kind(), SubstrateKind::LinkLayerProbe);
        let err = substrate.open().err().unwrap();
        assert_eq!(err.capability_reason(), Some(CapabilityReason::PermissionDenied));
    }

    #[test]
    fn test_from_error_keeps_reason() {
        let substrate = ProbeSubstrate::from_error(DiscoveryError::capability(
            CapabilityReason::NoSuitableInterface,
            "nothing up",
        ));
        assert!(matches!(
            substrate,
            ProbeSubstrate::Transport {
                reason: CapabilityReason::NoSuitableInterface,
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_interface_name() {
        let err = select_interface(Some("does-not-exist0"), None).unwrap_err();
        assert_eq!(err.capability_reason(), Some(CapabilityReason::NoSuitableInterface));
    }

    #[test]
    fn test_detect_never_panics() {
        // Whatever this machine offers, detection resolves to one of the two kinds.
        let substrate = ProbeSubstrate::detect(None, None);
        assert!(matches!(
            substrate.kind(),
            SubstrateKind::LinkLayerProbe | SubstrateKind::TransportProbe
        ));
    }
}
