//! Seams between the protocol engine and the host network stack.
//!
//! The decision loop only talks to an [`IpLayer`] and an [`AddrAnnouncer`].
//! [`crate::socket::VrrpSocket`] and [`crate::announcer::LinkAnnouncer`] are
//! the Linux implementations used by the daemon.

use std::net::IpAddr;
use std::sync::Arc;

use crate::{
    checksum,
    defaults::VRRP_TTL,
    error::{NetError, NetResult},
    packet::{Advertisement, IpVersion, PseudoHeader, VrrpPacket},
};

/// Sends and receives VRRP messages for one group.
pub trait IpLayer: Send + Sync {
    /// Sends one encoded VRRP message to the group's multicast address.
    fn send(&self, packet: &[u8]) -> NetResult<()>;

    /// Blocks until an advertisement passed [`accept_advertisement`] or the
    /// receive timeout elapsed, in which case [`NetError::Timeout`] is
    /// returned.
    fn receive(&self) -> NetResult<Advertisement>;

    /// Releases group membership and sockets. Called once, after the
    /// receiver stopped.
    fn close(&self) {}
}

/// Refreshes neighbour caches for addresses this node just took over.
pub trait AddrAnnouncer: Send + Sync {
    fn announce_all(&self, addresses: &[IpAddr]) -> NetResult<()>;
}

/// Collaborators handed to a running virtual router.
#[derive(Clone)]
pub struct Link {
    pub ip: Arc<dyn IpLayer>,
    pub announcer: Arc<dyn AddrAnnouncer>,
}

impl Link {
    pub fn new(ip: impl IpLayer + 'static, announcer: impl AddrAnnouncer + 'static) -> Self {
        Self {
            ip: Arc::new(ip),
            announcer: Arc::new(announcer),
        }
    }
}

/// Inbound checks every datagram goes through before it may reach the
/// decision loop: TTL/hop limit of 255, a VRRPv3 ADVERTISEMENT and a valid
/// checksum over the bytes as received.
pub fn accept_advertisement(
    ip_version: IpVersion,
    payload: &[u8],
    source: IpAddr,
    destination: IpAddr,
    hop_limit: u8,
) -> NetResult<Advertisement> {
    if hop_limit != VRRP_TTL {
        return Err(NetError::HopLimit(hop_limit));
    }

    let packet = VrrpPacket::decode(payload, ip_version.number())?;
    packet.validate()?;

    let pseudo_header = PseudoHeader::new(source, destination, payload.len() as u16);
    if !checksum::confirm(&pseudo_header, payload) {
        return Err(NetError::Checksum(source));
    }

    Ok(Advertisement {
        packet,
        pseudo_header,
    })
}
