use std::collections::HashSet;
use std::net::IpAddr;
use std::time::Duration;

use crate::core_tasks::{self, RouterHandle};
use crate::defaults::{self, MAX_ADVERT_INTERVAL, MIN_ADVERT_INTERVAL, OWNER_PRIORITY};
use crate::error::ConfigError;
use crate::hooks::{Hook, Transition, TransitionHooks};
use crate::network::Link;
use crate::packet::{IpVersion, PseudoHeader, VrrpPacket};
use crate::state_machine::{States, VirtualRouterMachine};
use crate::timers::{derive_failover_timers, duration_to_centis};

/// One VRRP group on one interface.
///
/// All time values are in centiseconds, the unit of the wire format.
/// Setters are only reachable before [`VirtualRouter::start`], which hands
/// the router over to its decision loop.
#[derive(Debug)]
pub struct VirtualRouter {
    pub name: String,
    pub vrid: u8,
    pub network_interface: String,
    priority: u8,
    owner: bool,
    advert_interval: u16,
    pub(crate) master_adver_interval: u16,
    pub(crate) skew_time: u16,
    pub(crate) master_down_interval: u16,
    preempt_mode: bool,
    ip_version: IpVersion,
    source_address: IpAddr,
    ip_addresses: HashSet<IpAddr>,
    pub fsm: VirtualRouterMachine,
    hooks: TransitionHooks,
}

impl VirtualRouter {
    /// The IP version of the instance follows `source_address`.
    pub fn new(
        name: &str,
        vrid: u8,
        network_interface: &str,
        source_address: IpAddr,
        owner: bool,
    ) -> Self {
        let priority = if owner {
            OWNER_PRIORITY
        } else {
            defaults::priority()
        };
        let mut vrouter = Self {
            name: name.to_string(),
            vrid,
            network_interface: network_interface.to_string(),
            priority,
            owner,
            advert_interval: defaults::advert_int(),
            master_adver_interval: defaults::advert_int(),
            skew_time: 0,
            master_down_interval: 0,
            preempt_mode: defaults::preempt_mode(),
            ip_version: IpVersion::of(&source_address),
            source_address,
            ip_addresses: HashSet::new(),
            fsm: VirtualRouterMachine::default(),
            hooks: TransitionHooks::default(),
        };
        vrouter.set_master_adver_interval(vrouter.advert_interval);
        vrouter
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn is_owner(&self) -> bool {
        self.owner
    }

    pub fn advert_interval(&self) -> u16 {
        self.advert_interval
    }

    pub fn master_adver_interval(&self) -> u16 {
        self.master_adver_interval
    }

    pub fn skew_time(&self) -> u16 {
        self.skew_time
    }

    pub fn master_down_interval(&self) -> u16 {
        self.master_down_interval
    }

    pub fn preempt_mode(&self) -> bool {
        self.preempt_mode
    }

    pub fn ip_version(&self) -> IpVersion {
        self.ip_version
    }

    pub fn source_address(&self) -> IpAddr {
        self.source_address
    }

    pub fn state(&self) -> States {
        self.fsm.state
    }

    /// Owners stay at 255 and 0 is reserved for resignation. Both are
    /// logged and ignored. Returns whether the priority changed.
    pub fn set_priority(&mut self, priority: u8) -> bool {
        if self.owner {
            log::warn!(
                "({}) address owner keeps priority {OWNER_PRIORITY}, ignoring {priority}",
                self.name
            );
            return false;
        }
        if priority == 0 {
            log::warn!("({}) priority 0 is reserved, ignoring", self.name);
            return false;
        }
        self.priority = priority;
        self.set_master_adver_interval(self.master_adver_interval);
        true
    }

    /// Sets the advertisement interval. It must fall between 10ms and 40.95s,
    /// and is truncated to whole centiseconds.
    pub fn set_advert_interval(&mut self, interval: Duration) -> Result<(), ConfigError> {
        let centis = duration_to_centis(interval);
        if centis < MIN_ADVERT_INTERVAL as u128 || centis > MAX_ADVERT_INTERVAL as u128 {
            return Err(ConfigError::InvalidInterval(centis));
        }
        self.advert_interval = centis as u16;
        self.set_master_adver_interval(self.advert_interval);
        Ok(())
    }

    pub fn set_preempt_mode(&mut self, preempt_mode: bool) {
        self.preempt_mode = preempt_mode;
    }

    /// Adopts the interval a Master advertises and derives Skew_Time and
    /// Master_Down_Interval from it.
    pub(crate) fn set_master_adver_interval(&mut self, centis: u16) {
        // an interval of 0 would make the master down timer fire at once
        let centis = centis.max(MIN_ADVERT_INTERVAL);
        let timers = derive_failover_timers(self.priority, centis);
        self.master_adver_interval = centis;
        self.skew_time = timers.skew_time;
        self.master_down_interval = timers.master_down_interval;
    }

    /// Adds a protected address. Returns `false` when it was already present.
    pub fn add_ip_address(&mut self, address: IpAddr) -> Result<bool, ConfigError> {
        if !self.ip_version.matches(&address) {
            return Err(ConfigError::AddressFamily {
                address,
                version: self.ip_version.number(),
            });
        }
        if self.ip_addresses.contains(&address) {
            log::info!("({}) {address} already protected", self.name);
            return Ok(false);
        }
        if self.ip_addresses.len() >= u8::MAX as usize {
            return Err(ConfigError::TooManyAddresses);
        }
        self.ip_addresses.insert(address);
        Ok(true)
    }

    pub fn remove_ip_address(&mut self, address: &IpAddr) -> bool {
        let removed = self.ip_addresses.remove(address);
        if !removed {
            log::info!("({}) {address} is not protected, nothing to remove", self.name);
        }
        removed
    }

    /// Protected addresses in ascending order.
    pub fn ip_addresses(&self) -> Vec<IpAddr> {
        let mut addresses: Vec<IpAddr> = self.ip_addresses.iter().copied().collect();
        addresses.sort();
        addresses
    }

    pub fn enroll(&mut self, transition: Transition, hook: Hook) -> bool {
        self.hooks.enroll(transition, hook)
    }

    /// Builds an advertisement for this group carrying `priority`, with
    /// its checksum embedded.
    pub fn advertisement(&self, priority: u8) -> VrrpPacket {
        let mut pkt = VrrpPacket::advertisement(
            self.vrid,
            priority,
            self.advert_interval,
            self.ip_addresses(),
        );
        let pseudo = PseudoHeader::new(
            self.source_address,
            self.ip_version.multicast_address(),
            pkt.len() as u16,
        );
        pkt.set_checksum(&pseudo);
        pkt
    }

    /// Whether `other` wins a priority tie against our own source address.
    pub fn loses_tie_to(&self, other: &IpAddr) -> bool {
        match larger_than(other, &self.source_address) {
            Some(larger) => larger,
            None => {
                log::warn!(
                    "({}) cannot compare {other} with {}, treating as not greater",
                    self.name,
                    self.source_address
                );
                false
            }
        }
    }

    /// Moves to `to`, logs the change and runs the enrolled hook.
    pub(crate) fn transition_to(&mut self, to: States) {
        let from = self.fsm.state;
        self.fsm.state = to;
        if let Some(transition) = Transition::between(from, to) {
            log::info!(
                "({}) transitioned to {to} ({})",
                self.name,
                from.to_string().to_lowercase()
            );
            self.hooks.run(transition);
        }
    }

    /// Spawns the packet receiver and decision loop onto the current tokio
    /// runtime and injects the startup event.
    pub fn start(self, link: Link) -> RouterHandle {
        core_tasks::start(self, link)
    }
}

/// Byte-wise comparison in network order. Addresses of different families
/// are not comparable.
pub(crate) fn larger_than(a: &IpAddr, b: &IpAddr) -> Option<bool> {
    match (a, b) {
        (IpAddr::V4(a), IpAddr::V4(b)) => Some(a.octets() > b.octets()),
        (IpAddr::V6(a), IpAddr::V6(b)) => Some(a.octets() > b.octets()),
        _ => None,
    }
}
