//! Port types with validation and parsing.
//!
//! The `Port` newtype ensures values are always valid port numbers (1-65535).
//! `PortSet` is the set of ports a host scan attempts, built from ranges,
//! presets, or text such as `"22,80,8000-8100"`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A validated TCP port number (1-65535).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct Port(u16);

impl Port {
    /// Minimum valid port number.
    pub const MIN: u16 = 1;
    /// Maximum valid port number.
    pub const MAX: u16 = 65535;

    /// Create a new Port from a u16, returning None for 0.
    #[inline]
    pub const fn new(port: u16) -> Option<Self> {
        if port >= Self::MIN {
            Some(Self(port))
        } else {
            None
        }
    }

    /// Get the raw port number.
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u16> for Port {
    type Error = PortError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(PortError::OutOfRange(value))
    }
}

impl From<Port> for u16 {
    fn from(port: Port) -> Self {
        port.0
    }
}

/// Error type for port parsing and validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("port {0} is out of valid range (1-65535)")]
    OutOfRange(u16),
    #[error("invalid port number: {0}")]
    InvalidFormat(String),
    #[error("invalid port range: start ({0}) > end ({1})")]
    InvalidRange(u16, u16),
    #[error("empty port specification")]
    Empty,
}

/// An inclusive range of ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    start: Port,
    end: Port,
}

impl PortRange {
    pub fn new(start: Port, end: Port) -> Result<Self, PortError> {
        if start > end {
            Err(PortError::InvalidRange(start.0, end.0))
        } else {
            Ok(Self { start, end })
        }
    }

    pub const fn single(port: Port) -> Self {
        Self {
            start: port,
            end: port,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Port> {
        (self.start.0..=self.end.0).map(Port)
    }

    fn contains(&self, port: Port) -> bool {
        self.start <= port && port <= self.end
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// The set of ports probed on each host.
///
/// Stored as ranges so a full 1-65535 sweep stays small; [`PortSet::to_ports`]
/// expands it into a sorted, duplicate-free list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSet {
    ranges: Vec<PortRange>,
}

impl PortSet {
    /// The common-services set probed when the caller supplies none.
    pub const COMMON_SERVICES: [u16; 10] = [21, 22, 23, 25, 53, 80, 110, 443, 3306, 8080];

    pub const fn new() -> Self {
        Self { ranges: Vec::new() }
    }

    pub fn add_range(&mut self, range: PortRange) {
        self.ranges.push(range);
    }

    pub fn add_port(&mut self, port: Port) {
        self.ranges.push(PortRange::single(port));
    }

    /// Build a set from raw numbers, rejecting port 0.
    pub fn from_numbers(numbers: &[u16]) -> Result<Self, PortError> {
        let mut set = Self::new();
        for &n in numbers {
            set.add_port(Port::try_from(n)?);
        }
        if set.is_empty() {
            return Err(PortError::Empty);
        }
        Ok(set)
    }

    /// All ports as a sorted, deduplicated vector.
    pub fn to_ports(&self) -> Vec<Port> {
        let mut ports: Vec<Port> = self.ranges.iter().flat_map(|r| r.iter()).collect();
        ports.sort_unstable();
        ports.dedup();
        ports
    }

    /// Number of unique ports.
    pub fn count(&self) -> usize {
        self.to_ports().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn contains(&self, port: Port) -> bool {
        self.ranges.iter().any(|r| r.contains(port))
    }

    /// FTP, SSH, Telnet, SMTP, DNS, HTTP, POP3, HTTPS, MySQL and HTTP-alt.
    pub fn common_services() -> Self {
        let mut set = Self::new();
        for &n in &Self::COMMON_SERVICES {
            set.add_port(Port(n));
        }
        set
    }

    /// Ports 1-1024.
    pub fn well_known() -> Self {
        Self {
            ranges: vec![PortRange {
                start: Port(1),
                end: Port(1024),
            }],
        }
    }

    /// Every port, 1-65535.
    pub fn full() -> Self {
        Self {
            ranges: vec![PortRange {
                start: Port(Port::MIN),
                end: Port(Port::MAX),
            }],
        }
    }
}

impl Default for PortSet {
    fn default() -> Self {
        Self::common_services()
    }
}

impl FromIterator<Port> for PortSet {
    fn from_iter<I: IntoIterator<Item = Port>>(iter: I) -> Self {
        Self {
            ranges: iter.into_iter().map(PortRange::single).collect(),
        }
    }
}

impl FromStr for PortSet {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "" => return Err(PortError::Empty),
            "common" => return Ok(Self::common_services()),
            "well-known" => return Ok(Self::well_known()),
            "all" | "-" => return Ok(Self::full()),
            _ => {}
        }

        let mut set = Self::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part.split_once('-') {
                Some((lo, hi)) => {
                    let start = parse_port(lo)?;
                    let end = parse_port(hi)?;
                    set.add_range(PortRange::new(start, end)?);
                }
                None => set.add_port(parse_port(part)?),
            }
        }

        if set.is_empty() {
            return Err(PortError::Empty);
        }
        Ok(set)
    }
}

fn parse_port(s: &str) -> Result<Port, PortError> {
    let s = s.trim();
    let n: u16 = s
        .parse()
        .map_err(|_| PortError::InvalidFormat(s.to_string()))?;
    Port::try_from(n)
}

impl fmt::Display for PortSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.ranges.iter().map(|r| r.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(set: &PortSet) -> Vec<u16> {
        set.to_ports().into_iter().map(u16::from).collect()
    }

    #[test]
    fn test_port_validation() {
        assert!(Port::new(0).is_none());
        assert!(Port::new(1).is_some());
        assert!(Port::new(65535).is_some());
        assert_eq!(Port::try_from(0), Err(PortError::OutOfRange(0)));
    }

    #[test]
    fn test_common_services_default() {
        let set = PortSet::default();
        assert_eq!(
            numbers(&set),
            vec![21, 22, 23, 25, 53, 80, 110, 443, 3306, 8080]
        );
    }

    #[test]
    fn test_presets() {
        assert_eq!(PortSet::well_known().count(), 1024);
        assert_eq!(PortSet::full().count(), 65535);
        assert_eq!("common".parse::<PortSet>().unwrap(), PortSet::common_services());
    }

    #[test]
    fn test_parse_mixed_list() {
        let set: PortSet = "443, 22,80,8000-8003".parse().unwrap();
        assert_eq!(numbers(&set), vec![22, 80, 443, 8000, 8001, 8002, 8003]);
        assert!(set.contains(Port::new(8002).unwrap()));
        assert!(!set.contains(Port::new(8004).unwrap()));
    }

    #[test]
    fn test_parse_dedup() {
        let set: PortSet = "80,80,443,80,70-90".parse().unwrap();
        assert_eq!(set.count(), 22);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<PortSet>(), Err(PortError::Empty));
        assert_eq!("0".parse::<PortSet>(), Err(PortError::OutOfRange(0)));
        assert_eq!("90-80".parse::<PortSet>(), Err(PortError::InvalidRange(90, 80)));
        assert!(matches!(
            "http".parse::<PortSet>(),
            Err(PortError::InvalidFormat(_))
        ));
        assert!(matches!(
            "70000".parse::<PortSet>(),
            Err(PortError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_port_serializes_as_number() {
        let port = Port::new(8080).unwrap();
        assert_eq!(serde_json::to_string(&port).unwrap(), "8080");
        assert!(serde_json::from_str::<Port>("0").is_err());
    }
}
