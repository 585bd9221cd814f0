//! Error types for netsweep.
//!
//! Uses `thiserror` for ergonomic error definitions. Discovery failures carry a
//! structured [`CapabilityReason`] so callers never need to inspect message
//! text to tell "discovery could not run" apart from "no hosts answered".

use crate::types::{PortError, RangeError};
use std::fmt;
use std::io;
use std::net::IpAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Why the link-layer probing substrate cannot be used on this host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityReason {
    /// Opening a raw link-layer channel was refused (missing root / CAP_NET_RAW).
    PermissionDenied,
    /// No up, non-loopback interface with both a hardware and an IPv4 address.
    NoSuitableInterface,
    /// The interface exposes a channel that is not Ethernet framed.
    UnsupportedChannel,
    /// The channel could not be opened or stopped working for another reason.
    ChannelUnavailable,
    /// Only transport-level probing is available, which cannot do ARP discovery.
    TransportOnly,
}

impl fmt::Display for CapabilityReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PermissionDenied => write!(f, "permission denied"),
            Self::NoSuitableInterface => write!(f, "no suitable interface"),
            Self::UnsupportedChannel => write!(f, "unsupported channel type"),
            Self::ChannelUnavailable => write!(f, "channel unavailable"),
            Self::TransportOnly => write!(f, "transport-level probing only"),
        }
    }
}

/// Coarse classification of a [`DiscoveryError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryErrorKind {
    CapabilityUnavailable,
    Internal,
}

/// Errors raised by host discovery.
///
/// An empty discovery window is not an error: it resolves to an empty host list.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("raw-packet capability unavailable on this host ({reason}): {detail}")]
    CapabilityUnavailable {
        reason: CapabilityReason,
        detail: String,
    },

    #[error("failed to build ARP frame: {0}")]
    Packet(String),

    /// No request could be put on a channel that opened fine.
    #[error("no ARP request could be sent on {interface}: {source}")]
    Link {
        interface: String,
        #[source]
        source: io::Error,
    },

    #[error("discovery worker failed: {0}")]
    Worker(String),
}

impl DiscoveryError {
    /// Shorthand for a capability failure.
    pub fn capability(reason: CapabilityReason, detail: impl Into<String>) -> Self {
        Self::CapabilityUnavailable {
            reason,
            detail: detail.into(),
        }
    }

    /// Classify an I/O failure of the link-layer channel by its error kind.
    pub fn from_channel_error(err: &io::Error, interface: &str) -> Self {
        let reason = match err.kind() {
            io::ErrorKind::PermissionDenied => CapabilityReason::PermissionDenied,
            _ => CapabilityReason::ChannelUnavailable,
        };
        Self::capability(reason, format!("{} on interface {}", err, interface))
    }

    pub fn kind(&self) -> DiscoveryErrorKind {
        match self {
            Self::CapabilityUnavailable { .. } => DiscoveryErrorKind::CapabilityUnavailable,
            Self::Packet(_) | Self::Link { .. } | Self::Worker(_) => DiscoveryErrorKind::Internal,
        }
    }

    /// The capability tag, if this is a capability failure.
    pub fn capability_reason(&self) -> Option<CapabilityReason> {
        match self {
            Self::CapabilityUnavailable { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

/// Main error type for scanning operations.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("resource exhaustion while probing {host}:{port}: {source}")]
    ResourceExhausted {
        host: IpAddr,
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Range(#[from] RangeError),

    #[error(transparent)]
    Ports(#[from] PortError),

    #[error("scan worker failed: {0}")]
    Worker(String),
}

impl ScanError {
    /// True when discovery could not run at all on this host.
    pub fn is_capability_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Discovery(e) if e.kind() == DiscoveryErrorKind::CapabilityUnavailable
        )
    }
}

/// Errors while loading or saving settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine a configuration directory")]
    DirectoryNotFound,

    #[error("failed to read {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("failed to write {path}: {reason}")]
    WriteFailed { path: PathBuf, reason: String },

    #[error("invalid settings format: {0}")]
    InvalidFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for scan operations.
pub type ScanResult<T> = Result<T, ScanError>;

/// Result type alias for discovery operations.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
