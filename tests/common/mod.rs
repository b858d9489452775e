#![allow(dead_code)]

use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use vrrp_failover::{
    packet::{Advertisement, IpVersion, PseudoHeader, VrrpPacket},
    AddrAnnouncer, IpLayer, Link, NetError, NetResult, RouterHandle, States, VirtualRouter,
};

pub const VRID: u8 = 51;

/// Records everything an instance sends and lets the test feed it
/// advertisements.
pub struct MockIp {
    sent: Arc<Mutex<Vec<VrrpPacket>>>,
    inbound: Mutex<Receiver<Advertisement>>,
    closed: Arc<AtomicBool>,
    receives: Arc<AtomicUsize>,
}

impl IpLayer for MockIp {
    fn send(&self, packet: &[u8]) -> NetResult<()> {
        let pkt = VrrpPacket::decode(packet, 4)?;
        self.sent.lock().unwrap().push(pkt);
        Ok(())
    }

    fn receive(&self) -> NetResult<Advertisement> {
        self.receives.fetch_add(1, Ordering::SeqCst);
        let inbound = self.inbound.lock().unwrap();
        match inbound.recv_timeout(Duration::from_millis(20)) {
            Ok(advert) => Ok(advert),
            Err(RecvTimeoutError::Timeout) => Err(NetError::Timeout),
            Err(RecvTimeoutError::Disconnected) => {
                std::thread::sleep(Duration::from_millis(20));
                Err(NetError::Timeout)
            }
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

pub struct MockAnnouncer {
    announced: Arc<Mutex<Vec<Vec<IpAddr>>>>,
}

impl AddrAnnouncer for MockAnnouncer {
    fn announce_all(&self, addresses: &[IpAddr]) -> NetResult<()> {
        self.announced.lock().unwrap().push(addresses.to_vec());
        Ok(())
    }
}

pub struct Harness {
    pub link: Link,
    pub sent: Arc<Mutex<Vec<VrrpPacket>>>,
    pub announced: Arc<Mutex<Vec<Vec<IpAddr>>>>,
    pub closed: Arc<AtomicBool>,
    pub receives: Arc<AtomicUsize>,
    pub inject: Sender<Advertisement>,
}

impl Harness {
    pub fn new() -> Self {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let announced = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let receives = Arc::new(AtomicUsize::new(0));
        let (inject, inbound) = mpsc::channel();

        let ip = MockIp {
            sent: sent.clone(),
            inbound: Mutex::new(inbound),
            closed: closed.clone(),
            receives: receives.clone(),
        };
        let announcer = MockAnnouncer {
            announced: announced.clone(),
        };

        Self {
            link: Link::new(ip, announcer),
            sent,
            announced,
            closed,
            receives,
            inject,
        }
    }

    pub fn sent(&self) -> Vec<VrrpPacket> {
        self.sent.lock().unwrap().clone()
    }

    pub fn announcements(&self) -> usize {
        self.announced.lock().unwrap().len()
    }

    pub fn receives(&self) -> usize {
        self.receives.load(Ordering::SeqCst)
    }

    pub async fn wait_closed(&self, within: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + within;
        while tokio::time::Instant::now() < deadline {
            if self.closed.load(Ordering::SeqCst) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.closed.load(Ordering::SeqCst)
    }
}

pub fn v4(last: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(192, 168, 100, last))
}

/// Router with source 192.168.100.10 protecting 192.168.100.100, advertising
/// every `interval` centiseconds.
pub fn router(owner: bool, priority: u8, interval: u16) -> VirtualRouter {
    let mut vrouter = VirtualRouter::new("VR_test", VRID, "eth0", v4(10), owner);
    vrouter.set_priority(priority);
    vrouter
        .set_advert_interval(Duration::from_millis(interval as u64 * 10))
        .unwrap();
    vrouter.add_ip_address(v4(100)).unwrap();
    vrouter
}

pub fn advert_from(source: IpAddr, vrid: u8, priority: u8, interval: u16) -> Advertisement {
    let mut packet = VrrpPacket::advertisement(vrid, priority, interval, vec![v4(100)]);
    let pseudo_header = PseudoHeader::new(
        source,
        IpVersion::V4.multicast_address(),
        packet.len() as u16,
    );
    packet.set_checksum(&pseudo_header);
    Advertisement {
        packet,
        pseudo_header,
    }
}

pub async fn wait_for_state(handle: &RouterHandle, state: States, within: Duration) -> bool {
    let mut rx = handle.subscribe();
    let reached = match tokio::time::timeout(within, rx.wait_for(|current| *current == state)).await {
        Ok(res) => res.is_ok(),
        Err(_) => false,
    };
    reached
}
