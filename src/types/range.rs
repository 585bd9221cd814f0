//! IPv4 address ranges for subnet discovery.
//!
//! Accepted forms:
//! - CIDR: "192.168.1.0/24"
//! - Single address: "192.168.1.20"
//! - Dotted span: "10.0.0.5-10.0.0.20"
//! - Short span: "10.0.0.5-20" (last octet only)

use ipnetwork::Ipv4Network;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Error type for address range parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    #[error("empty address range")]
    Empty,
    #[error("invalid IPv4 address: {0}")]
    InvalidAddress(String),
    #[error("invalid CIDR notation: {0}")]
    InvalidCidr(String),
    #[error("invalid address span: {start} is after {end}")]
    InvalidSpan { start: Ipv4Addr, end: Ipv4Addr },
    #[error("address range too large: {0} addresses (max: {1})")]
    TooLarge(u64, u64),
    #[error("IPv6 ranges are not supported for ARP discovery: {0}")]
    Ipv6Unsupported(String),
}

/// A validated block of IPv4 addresses to probe.
///
/// Always denotes at least one host address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressRange {
    /// A CIDR network. Network and broadcast addresses are skipped below /31.
    Network(Ipv4Network),
    /// An inclusive span of addresses.
    Span { start: Ipv4Addr, end: Ipv4Addr },
}

impl AddressRange {
    /// Upper bound on addresses in one range (a /16).
    pub const MAX_ADDRESSES: u64 = 65536;

    pub fn parse(s: &str) -> Result<Self, RangeError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(RangeError::Empty);
        }

        if s.contains(':') {
            return Err(RangeError::Ipv6Unsupported(s.to_string()));
        }

        if s.contains('/') {
            let network: Ipv4Network = s
                .parse()
                .map_err(|_| RangeError::InvalidCidr(s.to_string()))?;
            return Self::from_network(network);
        }

        if let Some((lo, hi)) = s.split_once('-') {
            let start = parse_addr(lo)?;
            let hi = hi.trim();
            let end = match hi.parse::<u8>() {
                Ok(last) => {
                    let [a, b, c, _] = start.octets();
                    Ipv4Addr::new(a, b, c, last)
                }
                Err(_) => parse_addr(hi)?,
            };
            return Self::span(start, end);
        }

        let addr = parse_addr(s)?;
        Ok(Self::Span {
            start: addr,
            end: addr,
        })
    }

    /// Wrap a CIDR network, enforcing the size cap.
    pub fn from_network(network: Ipv4Network) -> Result<Self, RangeError> {
        let size = 1u64 << (32 - u32::from(network.prefix()));
        if size > Self::MAX_ADDRESSES {
            return Err(RangeError::TooLarge(size, Self::MAX_ADDRESSES));
        }
        Ok(Self::Network(network))
    }

    pub fn span(start: Ipv4Addr, end: Ipv4Addr) -> Result<Self, RangeError> {
        if start > end {
            return Err(RangeError::InvalidSpan { start, end });
        }
        let size = u64::from(u32::from(end)) - u64::from(u32::from(start)) + 1;
        if size > Self::MAX_ADDRESSES {
            return Err(RangeError::TooLarge(size, Self::MAX_ADDRESSES));
        }
        Ok(Self::Span { start, end })
    }

    /// First and last probed address, inclusive.
    fn bounds(&self) -> (u32, u32) {
        match *self {
            Self::Network(net) => {
                let first = u32::from(net.network());
                let last = u32::from(net.broadcast());
                if net.prefix() < 31 {
                    (first + 1, last - 1)
                } else {
                    (first, last)
                }
            }
            Self::Span { start, end } => (u32::from(start), u32::from(end)),
        }
    }

    /// Every host address in the range, ascending.
    pub fn addresses(&self) -> impl Iterator<Item = Ipv4Addr> {
        let (first, last) = self.bounds();
        (first..=last).map(Ipv4Addr::from)
    }

    /// Number of host addresses.
    pub fn len(&self) -> usize {
        let (first, last) = self.bounds();
        (last - first) as usize + 1
    }

    /// Never true for a constructed range.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let (first, last) = self.bounds();
        (first..=last).contains(&u32::from(addr))
    }
}

fn parse_addr(s: &str) -> Result<Ipv4Addr, RangeError> {
    let s = s.trim();
    s.parse()
        .map_err(|_| RangeError::InvalidAddress(s.to_string()))
}

impl FromStr for AddressRange {
    type Err = RangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(net) => write!(f, "{}", net),
            Self::Span { start, end } if start == end => write!(f, "{}", start),
            Self::Span { start, end } => write!(f, "{}-{}", start, end),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cidr_skips_network_and_broadcast() {
        let range = AddressRange::parse("192.168.1.0/24").unwrap();
        assert_eq!(range.len(), 254);
        let addrs: Vec<Ipv4Addr> = range.addresses().collect();
        assert_eq!(addrs.first(), Some(&Ipv4Addr::new(192, 168, 1, 1)));
        assert_eq!(addrs.last(), Some(&Ipv4Addr::new(192, 168, 1, 254)));
        assert!(!range.contains(Ipv4Addr::new(192, 168, 1, 255)));
    }

    #[test]
    fn test_parse_small_prefixes_keep_all_addresses() {
        assert_eq!(AddressRange::parse("10.0.0.4/31").unwrap().len(), 2);
        let single = AddressRange::parse("10.0.0.7/32").unwrap();
        assert_eq!(single.addresses().collect::<Vec<_>>(), vec![Ipv4Addr::new(10, 0, 0, 7)]);
    }

    #[test]
    fn test_parse_single_address() {
        let range = AddressRange::parse("127.0.0.1").unwrap();
        assert_eq!(range.len(), 1);
        assert!(range.contains(Ipv4Addr::LOCALHOST));
        assert_eq!(range.to_string(), "127.0.0.1");
    }

    #[test]
    fn test_parse_spans() {
        let dotted = AddressRange::parse("10.0.0.5-10.0.0.20").unwrap();
        let short = AddressRange::parse("10.0.0.5-20").unwrap();
        assert_eq!(dotted, short);
        assert_eq!(short.len(), 16);
        assert_eq!(short.to_string(), "10.0.0.5-10.0.0.20");
    }

    #[test]
    fn test_malformed_input_rejected_at_construction() {
        assert_eq!(AddressRange::parse("  "), Err(RangeError::Empty));
        assert!(matches!(
            AddressRange::parse("192.168.1.0/33"),
            Err(RangeError::InvalidCidr(_))
        ));
        assert!(matches!(
            AddressRange::parse("192.168.300.1"),
            Err(RangeError::InvalidAddress(_))
        ));
        assert!(matches!(
            AddressRange::parse("10.0.0.20-10.0.0.5"),
            Err(RangeError::InvalidSpan { .. })
        ));
        assert!(matches!(
            AddressRange::parse("fe80::/64"),
            Err(RangeError::Ipv6Unsupported(_))
        ));
    }

    #[test]
    fn test_too_large() {
        assert_eq!(
            AddressRange::parse("10.0.0.0/8"),
            Err(RangeError::TooLarge(1 << 24, AddressRange::MAX_ADDRESSES))
        );
        assert!(AddressRange::parse("10.0.0.0/16").is_ok());
        assert!(AddressRange::parse("0.0.0.0/0").is_err());
    }
}
