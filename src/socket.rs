//! Raw IP sockets carrying VRRP (IP protocol 112).
//!
//! Each instance owns a send socket bound to its preferred source address
//! and a receive socket joined to the group. Both are bound to the
//! instance's interface.

use std::io::{self, ErrorKind, Read};
use std::mem;
use std::net::{IpAddr, Ipv6Addr, SocketAddr, SocketAddrV6};
use std::os::fd::AsRawFd;
use std::ptr;

use libc::{c_int, c_void, socklen_t};
use pnet::datalink::NetworkInterface;
use pnet::packet::ipv4::Ipv4Packet;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use crate::{
    defaults::{
        DESTINATION_MULTICAST_IPV4_ADDRESS, DESTINATION_MULTICAST_IPV6_ADDRESS, RECEIVE_TIMEOUT,
        VRRP_PROTOCOL_NUMBER, VRRP_TTL,
    },
    error::{NetError, NetResult, PacketError},
    network::{accept_advertisement, IpLayer},
    packet::{Advertisement, IpVersion},
};

// largest IPv4 header and an address table of 255 IPv6 addresses fit
const RECEIVE_BUFFER_SIZE: usize = 4224;

pub struct VrrpSocket {
    interface: String,
    ifindex: u32,
    ip_version: IpVersion,
    source: IpAddr,
    destination: SockAddr,
    tx: Socket,
    rx: Socket,
}

impl VrrpSocket {
    /// Opens both sockets of an instance on `interface`. Needs CAP_NET_RAW.
    pub fn open(interface: &NetworkInterface, source: IpAddr) -> io::Result<Self> {
        let ip_version = IpVersion::of(&source);
        let device = interface.name.as_bytes();
        let tx = raw_socket(ip_version)?;
        let rx = raw_socket(ip_version)?;
        tx.bind_device(Some(device))?;
        rx.bind_device(Some(device))?;
        rx.set_read_timeout(Some(RECEIVE_TIMEOUT))?;

        let destination = match source {
            IpAddr::V4(v4) => {
                tx.bind(&SockAddr::from(SocketAddr::new(source, 0)))?;
                tx.set_ttl(VRRP_TTL as u32)?;
                tx.set_multicast_ttl_v4(VRRP_TTL as u32)?;
                tx.set_multicast_loop_v4(false)?;
                tx.set_multicast_if_v4(&v4)?;
                rx.join_multicast_v4(&DESTINATION_MULTICAST_IPV4_ADDRESS, &v4)?;
                SockAddr::from(SocketAddr::new(IpAddr::V4(DESTINATION_MULTICAST_IPV4_ADDRESS), 0))
            }
            IpAddr::V6(v6) => {
                tx.bind(&SockAddr::from(SocketAddrV6::new(v6, 0, 0, interface.index)))?;
                tx.set_unicast_hops_v6(VRRP_TTL as u32)?;
                tx.set_multicast_hops_v6(VRRP_TTL as u32)?;
                tx.set_multicast_loop_v6(false)?;
                tx.set_multicast_if_v6(interface.index)?;
                rx.join_multicast_v6(&DESTINATION_MULTICAST_IPV6_ADDRESS, interface.index)?;
                set_int_option(&rx, libc::IPPROTO_IPV6, libc::IPV6_RECVHOPLIMIT, 1)?;
                set_int_option(&rx, libc::IPPROTO_IPV6, libc::IPV6_RECVPKTINFO, 1)?;
                SockAddr::from(SocketAddrV6::new(
                    DESTINATION_MULTICAST_IPV6_ADDRESS,
                    0,
                    0,
                    interface.index,
                ))
            }
        };

        log::debug!(
            "opened {} VRRP sockets on {} from {source}",
            ip_version,
            interface.name
        );
        Ok(Self {
            interface: interface.name.clone(),
            ifindex: interface.index,
            ip_version,
            source,
            destination,
            tx,
            rx,
        })
    }

    fn receive_v4(&self) -> NetResult<Advertisement> {
        let mut buf = [0u8; RECEIVE_BUFFER_SIZE];
        let len = (&self.rx).read(&mut buf).map_err(receive_error)?;

        // raw IPv4 sockets hand over the IP header too
        let ip_pkt = Ipv4Packet::new(&buf[..len]).ok_or(PacketError::TooShort(len))?;
        let header_len = ip_pkt.get_header_length() as usize * 4;
        if len < header_len {
            return Err(PacketError::TooShort(len).into());
        }

        accept_advertisement(
            IpVersion::V4,
            &buf[header_len..len],
            IpAddr::V4(ip_pkt.get_source()),
            IpAddr::V4(ip_pkt.get_destination()),
            ip_pkt.get_ttl(),
        )
    }

    fn receive_v6(&self) -> NetResult<Advertisement> {
        let mut buf = [0u8; RECEIVE_BUFFER_SIZE];
        // u64 keeps the control buffer aligned for cmsghdr
        let mut control = [0u64; 16];
        let mut name: libc::sockaddr_in6 = unsafe { mem::zeroed() };
        let mut iov = libc::iovec {
            iov_base: buf.as_mut_ptr() as *mut c_void,
            iov_len: buf.len(),
        };

        let mut msg: libc::msghdr = unsafe { mem::zeroed() };
        msg.msg_name = &mut name as *mut libc::sockaddr_in6 as *mut c_void;
        msg.msg_namelen = mem::size_of::<libc::sockaddr_in6>() as socklen_t;
        msg.msg_iov = &mut iov;
        msg.msg_iovlen = 1;
        msg.msg_control = control.as_mut_ptr() as *mut c_void;
        msg.msg_controllen = mem::size_of_val(&control) as _;

        let len = unsafe { libc::recvmsg(self.rx.as_raw_fd(), &mut msg, 0) };
        if len < 0 {
            return Err(receive_error(io::Error::last_os_error()));
        }
        let len = len as usize;

        let mut hop_limit = 0u8;
        let mut destination = IpAddr::V6(DESTINATION_MULTICAST_IPV6_ADDRESS);
        unsafe {
            let mut cmsg = libc::CMSG_FIRSTHDR(&msg);
            while !cmsg.is_null() {
                let hdr = &*cmsg;
                if hdr.cmsg_level == libc::IPPROTO_IPV6 {
                    match hdr.cmsg_type {
                        libc::IPV6_HOPLIMIT => {
                            let value = ptr::read_unaligned(libc::CMSG_DATA(cmsg) as *const c_int);
                            hop_limit = value.clamp(0, u8::MAX as c_int) as u8;
                        }
                        libc::IPV6_PKTINFO => {
                            let info = ptr::read_unaligned(
                                libc::CMSG_DATA(cmsg) as *const libc::in6_pktinfo,
                            );
                            destination = IpAddr::V6(Ipv6Addr::from(info.ipi6_addr.s6_addr));
                        }
                        _ => {}
                    }
                }
                cmsg = libc::CMSG_NXTHDR(&msg, cmsg);
            }
        }

        let source = IpAddr::V6(Ipv6Addr::from(name.sin6_addr.s6_addr));
        accept_advertisement(IpVersion::V6, &buf[..len], source, destination, hop_limit)
    }
}

impl IpLayer for VrrpSocket {
    fn send(&self, packet: &[u8]) -> NetResult<()> {
        self.tx.send_to(packet, &self.destination)?;
        Ok(())
    }

    fn receive(&self) -> NetResult<Advertisement> {
        match self.ip_version {
            IpVersion::V4 => self.receive_v4(),
            IpVersion::V6 => self.receive_v6(),
        }
    }

    fn close(&self) {
        let left = match self.source {
            IpAddr::V4(v4) => self
                .rx
                .leave_multicast_v4(&DESTINATION_MULTICAST_IPV4_ADDRESS, &v4),
            IpAddr::V6(_) => self
                .rx
                .leave_multicast_v6(&DESTINATION_MULTICAST_IPV6_ADDRESS, self.ifindex),
        };
        if let Err(err) = left {
            log::warn!("unable to leave VRRP group on {}: {err}", self.interface);
        }
    }
}

fn raw_socket(ip_version: IpVersion) -> io::Result<Socket> {
    let domain = match ip_version {
        IpVersion::V4 => Domain::IPV4,
        IpVersion::V6 => Domain::IPV6,
    };
    Socket::new(
        domain,
        Type::RAW,
        Some(Protocol::from(VRRP_PROTOCOL_NUMBER as c_int)),
    )
}

fn set_int_option(socket: &Socket, level: c_int, name: c_int, value: c_int) -> io::Result<()> {
    let rc = unsafe {
        libc::setsockopt(
            socket.as_raw_fd(),
            level,
            name,
            &value as *const c_int as *const c_void,
            mem::size_of::<c_int>() as socklen_t,
        )
    };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn receive_error(err: io::Error) -> NetError {
    match err.kind() {
        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted => NetError::Timeout,
        _ => NetError::Io(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeouts_are_not_io_errors() {
        assert!(matches!(
            receive_error(io::Error::from(ErrorKind::WouldBlock)),
            NetError::Timeout
        ));
        assert!(matches!(
            receive_error(io::Error::from(ErrorKind::TimedOut)),
            NetError::Timeout
        ));
        assert!(matches!(
            receive_error(io::Error::from(ErrorKind::PermissionDenied)),
            NetError::Io(_)
        ));
    }

    #[test]
    fn test_receive_buffer_fits_largest_advertisement() {
        let largest = 60 + 8 + 255 * IpVersion::V6.address_len();
        assert!(RECEIVE_BUFFER_SIZE >= largest);
    }
}
