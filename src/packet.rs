use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::checksum;
use crate::defaults::{
    DESTINATION_MULTICAST_IPV4_ADDRESS, DESTINATION_MULTICAST_IPV6_ADDRESS, VRRP_ADVERTISEMENT,
    VRRP_PROTOCOL_NUMBER, VRRP_VERSION,
};
use crate::error::PacketError;

/// IP family a virtual router runs on. Decides address width on the wire
/// and the multicast group advertisements go to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpVersion {
    V4,
    V6,
}

impl IpVersion {
    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => IpVersion::V4,
            IpAddr::V6(_) => IpVersion::V6,
        }
    }

    pub fn number(&self) -> u8 {
        match self {
            IpVersion::V4 => 4,
            IpVersion::V6 => 6,
        }
    }

    pub fn multicast_address(&self) -> IpAddr {
        match self {
            IpVersion::V4 => IpAddr::V4(DESTINATION_MULTICAST_IPV4_ADDRESS),
            IpVersion::V6 => IpAddr::V6(DESTINATION_MULTICAST_IPV6_ADDRESS),
        }
    }

    /// bytes taken by one address in the address table
    pub fn address_len(&self) -> usize {
        match self {
            IpVersion::V4 => 4,
            IpVersion::V6 => 16,
        }
    }

    pub fn matches(&self, addr: &IpAddr) -> bool {
        IpVersion::of(addr) == *self
    }
}

impl TryFrom<u8> for IpVersion {
    type Error = PacketError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            4 => Ok(IpVersion::V4),
            6 => Ok(IpVersion::V6),
            other => Err(PacketError::UnsupportedIpVersion(other)),
        }
    }
}

impl fmt::Display for IpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IPv{}", self.number())
    }
}

//
// VRRP Packet Format (RFC 5798 section 5.1).
//
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |Version| Type  | Virtual Rtr ID|   Priority    |Count IPvX Addr|
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |(rsvd) |     Max Adver Int     |          Checksum             |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |                                                               |
// +                                                               +
// |                       IPvX Address(es)                        |
// +                                                               +
// +                                                               +
// +                                                               +
// +                                                               +
// |                                                               |
// +                                                               +
// |                                                               |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VrrpPacket {
    pub version: u8,
    pub hdr_type: u8,
    pub vrid: u8,
    pub priority: u8,
    pub count_ip: u8,
    /// centiseconds, 12 bits on the wire
    pub adver_int: u16,
    pub checksum: u16,
    pub ip_addresses: Vec<IpAddr>,
}

impl VrrpPacket {
    pub const HEADER_LENGTH: usize = 8;
    const CHECKSUM_OFFSET: usize = 6;
    const ADVER_INT_MASK: u16 = 0x0fff;

    /// Fresh VRRPv3 ADVERTISEMENT with a zero checksum.
    pub fn advertisement(vrid: u8, priority: u8, adver_int: u16, ip_addresses: Vec<IpAddr>) -> Self {
        Self {
            version: VRRP_VERSION,
            hdr_type: VRRP_ADVERTISEMENT,
            vrid,
            priority,
            count_ip: ip_addresses.len() as u8,
            adver_int: adver_int & Self::ADVER_INT_MASK,
            checksum: 0,
            ip_addresses,
        }
    }

    pub fn len(&self) -> usize {
        let table: usize = self
            .ip_addresses
            .iter()
            .map(|addr| IpVersion::of(addr).address_len())
            .sum();
        Self::HEADER_LENGTH + table
    }

    // Encodes VRRP packet into a bytes buffer.
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.len());
        buf.put_u8((self.version << 4) | (self.hdr_type & 0x0f));
        buf.put_u8(self.vrid);
        buf.put_u8(self.priority);
        buf.put_u8(self.count_ip);
        buf.put_u16(self.adver_int & Self::ADVER_INT_MASK);
        buf.put_u16(self.checksum);
        for addr in &self.ip_addresses {
            match addr {
                IpAddr::V4(v4) => buf.put_slice(&v4.octets()),
                IpAddr::V6(v6) => buf.put_slice(&v6.octets()),
            }
        }
        buf
    }

    /// Decodes the VRRP part of a datagram. `ip_version` is the family of the
    /// IP datagram that carried it (4 or 6). Trailing bytes past the address
    /// table (VRRPv2 authentication data) are ignored.
    pub fn decode(data: &[u8], ip_version: u8) -> Result<Self, PacketError> {
        if data.len() < Self::HEADER_LENGTH {
            return Err(PacketError::TooShort(data.len()));
        }
        let ip_version = IpVersion::try_from(ip_version)?;

        let mut buf = Bytes::copy_from_slice(data);
        let ver_type = buf.get_u8();
        let vrid = buf.get_u8();
        let priority = buf.get_u8();
        let count_ip = buf.get_u8();
        let adver_int = buf.get_u16() & Self::ADVER_INT_MASK;
        let checksum = buf.get_u16();

        let table_len = count_ip as usize * ip_version.address_len();
        if data.len() < Self::HEADER_LENGTH + table_len {
            return Err(PacketError::LengthMismatch {
                expected: Self::HEADER_LENGTH + table_len,
                actual: data.len(),
            });
        }

        let mut ip_addresses = Vec::with_capacity(count_ip as usize);
        for _ in 0..count_ip {
            let addr = match ip_version {
                IpVersion::V4 => IpAddr::V4(Ipv4Addr::from(buf.get_u32())),
                IpVersion::V6 => IpAddr::V6(Ipv6Addr::from(buf.get_u128())),
            };
            ip_addresses.push(addr);
        }

        Ok(Self {
            version: ver_type >> 4,
            hdr_type: ver_type & 0x0f,
            vrid,
            priority,
            count_ip,
            adver_int,
            checksum,
            ip_addresses,
        })
    }

    /// Rejects anything that is not a VRRPv3 ADVERTISEMENT.
    pub fn validate(&self) -> Result<(), PacketError> {
        if self.version != VRRP_VERSION {
            return Err(PacketError::BadVersion(self.version));
        }
        if self.hdr_type != VRRP_ADVERTISEMENT {
            return Err(PacketError::BadType(self.hdr_type));
        }
        Ok(())
    }

    /// Computes the checksum over `pseudo` and this packet and stores it.
    pub fn set_checksum(&mut self, pseudo: &PseudoHeader) {
        self.checksum = 0;
        let mut bytes = self.encode();
        bytes[Self::CHECKSUM_OFFSET..Self::CHECKSUM_OFFSET + 2].fill(0);
        self.checksum = checksum::calculate(pseudo, &bytes);
    }

    pub fn verify_checksum(&self, pseudo: &PseudoHeader) -> bool {
        checksum::confirm(pseudo, &self.encode())
    }
}

/// Pseudo-header covered by the VRRP checksum. Never transmitted.
///
/// Serialized on 36 bytes: source[16] destination[16] zero protocol length[2].
/// IPv4 addresses take their IPv4-mapped IPv6 form; the extra all-ones word is
/// a no-op in one's complement arithmetic, so the sum matches the 12 byte IPv4
/// pseudo-header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PseudoHeader {
    pub source: IpAddr,
    pub destination: IpAddr,
    pub protocol: u8,
    pub length: u16,
}

impl PseudoHeader {
    pub const LENGTH: usize = 36;

    pub fn new(source: IpAddr, destination: IpAddr, length: u16) -> Self {
        Self {
            source,
            destination,
            protocol: VRRP_PROTOCOL_NUMBER,
            length,
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::LENGTH] {
        let mut octets = [0u8; Self::LENGTH];
        octets[..16].copy_from_slice(&wide_octets(&self.source));
        octets[16..32].copy_from_slice(&wide_octets(&self.destination));
        octets[33] = self.protocol;
        octets[34..].copy_from_slice(&self.length.to_be_bytes());
        octets
    }
}

fn wide_octets(addr: &IpAddr) -> [u8; 16] {
    match addr {
        IpAddr::V4(v4) => v4.to_ipv6_mapped().octets(),
        IpAddr::V6(v6) => v6.octets(),
    }
}

/// An accepted inbound advertisement together with the pseudo-header it was
/// validated against. The FSM needs the sender address for tie-breaks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Advertisement {
    pub packet: VrrpPacket,
    pub pseudo_header: PseudoHeader,
}

impl Advertisement {
    pub fn source(&self) -> IpAddr {
        self.pseudo_header.source
    }
}
