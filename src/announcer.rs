use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use bytes::{BufMut, BytesMut};
use pnet::datalink::NetworkInterface;
use pnet::packet::arp::{ArpHardwareTypes, ArpOperations, MutableArpPacket};
use pnet::packet::ethernet::{EtherTypes, MutableEthernetPacket};
use pnet::packet::MutablePacket;
use pnet::util::MacAddr;

use crate::{
    checksum,
    defaults::VRRP_TTL,
    error::{NetError, NetResult},
    general::create_datalink_channel,
    network::AddrAnnouncer,
    packet::PseudoHeader,
};

const ETHERNET_HEADER_LEN: usize = 14;
const ARP_PACKET_LEN: usize = 28;
const IPV6_HEADER_LEN: usize = 40;
// type, code, checksum, flags, target and one link-layer address option
const NEIGHBOR_ADVERT_LEN: usize = 32;

const ICMPV6_PROTOCOL_NUMBER: u8 = 58;
const ICMPV6_NEIGHBOR_ADVERT: u8 = 136;
const NDP_TARGET_LINK_LAYER_ADDRESS: u8 = 2;
const NA_FLAG_ROUTER: u32 = 0x8000_0000;
const NA_FLAG_OVERRIDE: u32 = 0x2000_0000;

const ALL_NODES: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 1);
const ALL_NODES_MAC: MacAddr = MacAddr(0x33, 0x33, 0, 0, 0, 1);

/// Announces protected addresses on the instance's interface with the
/// interface's own MAC: gratuitous ARP for IPv4, unsolicited Neighbor
/// Advertisements for IPv6.
#[derive(Debug, Clone)]
pub struct LinkAnnouncer {
    interface: NetworkInterface,
    source: IpAddr,
}

impl LinkAnnouncer {
    pub fn new(interface: NetworkInterface, source: IpAddr) -> Self {
        Self { interface, source }
    }

    fn frame_for(&self, mac: MacAddr, address: &IpAddr) -> NetResult<Vec<u8>> {
        match address {
            IpAddr::V4(v4) => gratuitous_arp(mac, *v4),
            IpAddr::V6(v6) => {
                let source = match self.source {
                    IpAddr::V6(source) => source,
                    IpAddr::V4(_) => *v6,
                };
                Ok(unsolicited_na(mac, source, *v6))
            }
        }
    }
}

impl AddrAnnouncer for LinkAnnouncer {
    fn announce_all(&self, addresses: &[IpAddr]) -> NetResult<()> {
        let mac = self.interface.mac.ok_or_else(|| {
            NetError::Other(format!("interface {} has no MAC address", self.interface.name))
        })?;
        let (mut sender, _) = create_datalink_channel(&self.interface)?;

        for address in addresses {
            let frame = self.frame_for(mac, address)?;
            match sender.send_to(&frame, None) {
                Some(Ok(())) => log::debug!("announced {address} on {}", self.interface.name),
                Some(Err(err)) => return Err(err.into()),
                None => return Err(NetError::Other("datalink sender unavailable".to_string())),
            }
        }
        Ok(())
    }
}

/// Broadcast ARP reply mapping `address` to `mac`.
pub fn gratuitous_arp(mac: MacAddr, address: Ipv4Addr) -> NetResult<Vec<u8>> {
    let mut frame = vec![0u8; ETHERNET_HEADER_LEN + ARP_PACKET_LEN];
    let short = || NetError::Other("ARP frame buffer too small".to_string());

    let mut eth_pkt = MutableEthernetPacket::new(&mut frame).ok_or_else(short)?;
    eth_pkt.set_destination(MacAddr::broadcast());
    eth_pkt.set_source(mac);
    eth_pkt.set_ethertype(EtherTypes::Arp);

    let mut arp_pkt = MutableArpPacket::new(eth_pkt.payload_mut()).ok_or_else(short)?;
    arp_pkt.set_hardware_type(ArpHardwareTypes::Ethernet);
    arp_pkt.set_protocol_type(EtherTypes::Ipv4);
    arp_pkt.set_hw_addr_len(6);
    arp_pkt.set_proto_addr_len(4);
    arp_pkt.set_operation(ArpOperations::Reply);
    arp_pkt.set_sender_hw_addr(mac);
    arp_pkt.set_sender_proto_addr(address);
    arp_pkt.set_target_hw_addr(MacAddr::broadcast());
    arp_pkt.set_target_proto_addr(address);

    Ok(frame)
}

/// Unsolicited Neighbor Advertisement for `target` to all nodes, with the
/// Router and Override flags and a target link-layer address option.
pub fn unsolicited_na(mac: MacAddr, source: Ipv6Addr, target: Ipv6Addr) -> Vec<u8> {
    let mut icmp = BytesMut::with_capacity(NEIGHBOR_ADVERT_LEN);
    icmp.put_u8(ICMPV6_NEIGHBOR_ADVERT);
    icmp.put_u8(0);
    icmp.put_u16(0);
    icmp.put_u32(NA_FLAG_ROUTER | NA_FLAG_OVERRIDE);
    icmp.put_slice(&target.octets());
    icmp.put_u8(NDP_TARGET_LINK_LAYER_ADDRESS);
    icmp.put_u8(1);
    icmp.put_slice(&mac.octets());

    let mut pseudo = PseudoHeader::new(
        IpAddr::V6(source),
        IpAddr::V6(ALL_NODES),
        NEIGHBOR_ADVERT_LEN as u16,
    );
    pseudo.protocol = ICMPV6_PROTOCOL_NUMBER;
    let check = checksum::calculate(&pseudo, &icmp);
    icmp[2..4].copy_from_slice(&check.to_be_bytes());

    let mut frame =
        BytesMut::with_capacity(ETHERNET_HEADER_LEN + IPV6_HEADER_LEN + NEIGHBOR_ADVERT_LEN);
    frame.put_slice(&ALL_NODES_MAC.octets());
    frame.put_slice(&mac.octets());
    frame.put_u16(EtherTypes::Ipv6.0);

    frame.put_u32(6 << 28);
    frame.put_u16(NEIGHBOR_ADVERT_LEN as u16);
    frame.put_u8(ICMPV6_PROTOCOL_NUMBER);
    frame.put_u8(VRRP_TTL);
    frame.put_slice(&source.octets());
    frame.put_slice(&ALL_NODES.octets());

    frame.put_slice(&icmp);
    frame.to_vec()
}
