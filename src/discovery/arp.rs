//! ARP frame construction and parsing.

use crate::error::{DiscoveryError, DiscoveryResult};
use pnet::packet::arp::{ArpHardwareTypes, ArpOperations, ArpPacket, MutableArpPacket};
use pnet::packet::ethernet::{EtherTypes, EthernetPacket, MutableEthernetPacket};
use pnet::packet::Packet;
use pnet::util::MacAddr;
use std::net::Ipv4Addr;

const ETHERNET_HEADER_LEN: usize = 14;
const ARP_PACKET_LEN: usize = 28;
/// Minimum Ethernet frame without FCS; shorter frames are padded.
const MIN_FRAME_LEN: usize = 60;

/// An ARP reply: who answered and with which hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpReply {
    pub ip: Ipv4Addr,
    pub mac: MacAddr,
}

/// Build a broadcast "who-has `target`" request.
pub fn build_request(
    src_mac: MacAddr,
    src_ip: Ipv4Addr,
    target: Ipv4Addr,
) -> DiscoveryResult<Vec<u8>> {
    let mut buffer = vec![0u8; MIN_FRAME_LEN];

    {
        let mut ethernet = MutableEthernetPacket::new(&mut buffer)
            .ok_or_else(|| DiscoveryError::Packet("ethernet header".to_string()))?;
        ethernet.set_destination(MacAddr::broadcast());
        ethernet.set_source(src_mac);
        ethernet.set_ethertype(EtherTypes::Arp);
    }

    let mut arp = MutableArpPacket::new(
        &mut buffer[ETHERNET_HEADER_LEN..ETHERNET_HEADER_LEN + ARP_PACKET_LEN],
    )
    .ok_or_else(|| DiscoveryError::Packet("arp payload".to_string()))?;
    arp.set_hardware_type(ArpHardwareTypes::Ethernet);
    arp.set_protocol_type(EtherTypes::Ipv4);
    arp.set_hw_addr_len(6);
    arp.set_proto_addr_len(4);
    arp.set_operation(ArpOperations::Request);
    arp.set_sender_hw_addr(src_mac);
    arp.set_sender_proto_addr(src_ip);
    arp.set_target_hw_addr(MacAddr::zero());
    arp.set_target_proto_addr(target);

    Ok(buffer)
}

/// Extract the sender of an ARP reply. Anything else yields `None`.
pub fn parse_reply(frame: &[u8]) -> Option<ArpReply> {
    let ethernet = EthernetPacket::new(frame)?;
    if ethernet.get_ethertype() != EtherTypes::Arp {
        return None;
    }

    let arp = ArpPacket::new(ethernet.payload())?;
    if arp.get_operation() != ArpOperations::Reply {
        return None;
    }

    Some(ArpReply {
        ip: arp.get_sender_proto_addr(),
        mac: arp.get_sender_hw_addr(),
    })
}

/// Build the reply `responder` would send back to `requester`.
///
/// Used by in-memory link layers in tests.
#[cfg(test)]
pub(crate) fn build_reply(
    responder: ArpReply,
    requester_mac: MacAddr,
    requester_ip: Ipv4Addr,
) -> Vec<u8> {
    let mut buffer = vec![0u8; MIN_FRAME_LEN];
    {
        let mut ethernet = MutableEthernetPacket::new(&mut buffer).unwrap();
        ethernet.set_destination(requester_mac);
        ethernet.set_source(responder.mac);
        ethernet.set_ethertype(EtherTypes::Arp);
    }
    let mut arp = MutableArpPacket::new(
        &mut buffer[ETHERNET_HEADER_LEN..ETHERNET_HEADER_LEN + ARP_PACKET_LEN],
    )
    .unwrap();
    arp.set_hardware_type(ArpHardwareTypes::Ethernet);
    arp.set_protocol_type(EtherTypes::Ipv4);
    arp.set_hw_addr_len(6);
    arp.set_proto_addr_len(4);
    arp.set_operation(ArpOperations::Reply);
    arp.set_sender_hw_addr(responder.mac);
    arp.set_sender_proto_addr(responder.ip);
    arp.set_target_hw_addr(requester_mac);
    arp.set_target_proto_addr(requester_ip);
    buffer
}

/// Target address of a request frame, if it is one.
#[cfg(test)]
pub(crate) fn request_target(frame: &[u8]) -> Option<Ipv4Addr> {
    let ethernet = EthernetPacket::new(frame)?;
    let arp = ArpPacket::new(ethernet.payload())?;
    (arp.get_operation() == ArpOperations::Request).then(|| arp.get_target_proto_addr())
}
