use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;

pub fn priority() -> u8 { 100 }
pub fn advert_int() -> u16 { 100 }
pub fn preempt_mode() -> bool { true }

pub const VRRP_VERSION: u8 = 3;
pub const VRRP_ADVERTISEMENT: u8 = 1;
pub const VRRP_PROTOCOL_NUMBER: u8 = 112;
pub const VRRP_TTL: u8 = 255;
pub const OWNER_PRIORITY: u8 = 255;

pub const DESTINATION_MULTICAST_IPV4_ADDRESS: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 18);
pub const DESTINATION_MULTICAST_IPV6_ADDRESS: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 0x12);

// the advertisement interval is carried in 12 bits
pub const MIN_ADVERT_INTERVAL: u16 = 1;
pub const MAX_ADVERT_INTERVAL: u16 = 0x0fff;

pub const PACKET_QUEUE_SIZE: usize = 1000;
pub const EVENT_CHANNEL_SIZE: usize = 1;
pub const RECEIVE_TIMEOUT: Duration = Duration::from_secs(1);

pub const DEFAULT_CONFIG_DIR: &str = "/etc/failover/";
pub const CONFIG_FILE_NAME: &str = "vrrp-config.json";
