use std::net::IpAddr;
use std::process::Command;
use std::str::FromStr;

use ipnet::IpNet;
use pnet::datalink::{self, Channel, DataLinkReceiver, DataLinkSender, NetworkInterface};
use rand::{distributions::Alphanumeric, Rng};

use crate::{
    announcer::LinkAnnouncer,
    config::VrrpConfig,
    error::{ConfigError, NetError, NetResult},
    hooks::Transition,
    network::Link,
    packet::IpVersion,
    router::VirtualRouter,
    socket::VrrpSocket,
    timers::centis_to_duration,
};

pub fn get_interface(name: &str) -> Result<NetworkInterface, ConfigError> {
    let interface_names_match = |iface: &NetworkInterface| iface.name == name;
    let interfaces = datalink::linux::interfaces();

    interfaces
        .into_iter()
        .find(interface_names_match)
        .ok_or_else(|| ConfigError::InterfaceNotFound(name.to_string()))
}

pub(crate) fn create_datalink_channel(
    interface: &NetworkInterface,
) -> NetResult<(Box<dyn DataLinkSender>, Box<dyn DataLinkReceiver>)> {
    match datalink::channel(interface, Default::default()) {
        Ok(Channel::Ethernet(tx, rx)) => Ok((tx, rx)),
        Ok(_) => Err(NetError::Other("unknown channel type".to_string())),
        Err(err) => {
            log::error!("problem creating datalink channel on {}", interface.name);
            Err(NetError::Io(err))
        }
    }
}

/// Preferred source address of `interface` for `ip_version`: the first
/// global unicast IPv4 address, or the first IPv6 link-local address.
pub fn find_source_address(
    interface: &NetworkInterface,
    ip_version: IpVersion,
) -> Result<IpAddr, ConfigError> {
    interface
        .ips
        .iter()
        .map(|network| network.ip())
        .find(|addr| ip_version.matches(addr) && is_usable_source(addr))
        .ok_or_else(|| ConfigError::NoSourceAddress {
            interface: interface.name.clone(),
            version: ip_version.number(),
        })
}

pub(crate) fn is_usable_source(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => {
            !(v4.is_loopback() || v4.is_link_local() || v4.is_unspecified() || v4.is_multicast())
        }
        IpAddr::V6(v6) => (v6.segments()[0] & 0xffc0) == 0xfe80,
    }
}

/// Accepts `a.b.c.d/nn`, `x::y/nn` or a bare address.
pub fn parse_address(address: &str) -> Result<IpAddr, ConfigError> {
    IpNet::from_str(address)
        .map(|net| net.addr())
        .or_else(|_| IpAddr::from_str(address))
        .map_err(|_| ConfigError::InvalidAddress(address.to_string()))
}

/// Protected addresses of `conf`. There must be between 1 and 255 of them,
/// all of one family.
pub fn protected_addresses(conf: &VrrpConfig) -> Result<Vec<IpAddr>, ConfigError> {
    let addresses = conf
        .ip_addresses
        .iter()
        .map(|addr| parse_address(addr))
        .collect::<Result<Vec<_>, _>>()?;

    let first = addresses
        .first()
        .ok_or_else(|| ConfigError::MissingAddresses(conf.vrid.to_string()))?;
    let ip_version = IpVersion::of(first);
    if let Some(stray) = addresses.iter().find(|addr| !ip_version.matches(addr)) {
        return Err(ConfigError::AddressFamily {
            address: *stray,
            version: ip_version.number(),
        });
    }
    if addresses.len() > u8::MAX as usize {
        return Err(ConfigError::TooManyAddresses);
    }
    Ok(addresses)
}

/// Builds the virtual router described by `conf` around `source`, without
/// touching the network.
pub fn build_router(conf: &VrrpConfig, source: IpAddr) -> Result<VirtualRouter, ConfigError> {
    let addresses = protected_addresses(conf)?;
    let name = conf.name.clone().unwrap_or_else(random_vr_name);

    let mut vrouter =
        VirtualRouter::new(&name, conf.vrid, &conf.interface_name, source, conf.owner);
    if !conf.owner {
        vrouter.set_priority(conf.priority);
    }
    vrouter.set_advert_interval(centis_to_duration(conf.advert_interval))?;
    vrouter.set_preempt_mode(conf.preempt_mode);
    for address in addresses {
        vrouter.add_ip_address(address)?;
    }
    log::info!("({}) configured for VRID {}", vrouter.name, vrouter.vrid);
    Ok(vrouter)
}

// takes the configs that have been received and converts them
// into a virtual router instance and the sockets it runs on.
pub fn config_to_vr(conf: &VrrpConfig) -> Result<(VirtualRouter, Link), ConfigError> {
    let interface = get_interface(&conf.interface_name)?;
    let addresses = protected_addresses(conf)?;
    let ip_version = addresses
        .first()
        .map(IpVersion::of)
        .ok_or_else(|| ConfigError::MissingAddresses(conf.vrid.to_string()))?;

    let source = match conf.source_address {
        Some(source) => source,
        None => find_source_address(&interface, ip_version)?,
    };

    let vrouter = build_router(conf, source)?;
    let socket = VrrpSocket::open(&interface, source)?;
    let link = Link::new(socket, LinkAnnouncer::new(interface, source));
    Ok((vrouter, link))
}

/// Adds the configured addresses to the interface while the router is
/// Master and removes them whenever it is not.
pub fn enroll_address_hooks(vrouter: &mut VirtualRouter, addresses: &[String]) {
    let add = [Transition::Init2Master, Transition::Backup2Master];
    let delete = [
        Transition::Init2Backup,
        Transition::Master2Backup,
        Transition::Master2Init,
    ];

    for (action, transitions) in [("add", &add[..]), ("delete", &delete[..])] {
        for transition in transitions {
            let addresses = addresses.to_vec();
            let interface = vrouter.network_interface.clone();
            vrouter.enroll(
                *transition,
                Box::new(move || virtual_address_action(action, &addresses, &interface)),
            );
        }
    }
}

pub fn virtual_address_action(action: &str, addresses: &[String], interface_name: &str) {
    for addr in addresses {
        let cmd_args = ["address", action, addr, "dev", interface_name];
        match Command::new("ip").args(cmd_args).output() {
            Ok(output) if output.status.success() => {
                log::debug!("ip address {action} {addr} dev {interface_name}");
            }
            Ok(output) => log::warn!(
                "ip address {action} {addr} dev {interface_name} failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ),
            Err(err) => log::warn!("unable to run ip address {action} {addr}: {err}"),
        }
    }
}

pub(crate) fn random_vr_name() -> String {
    let val: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(10)
        .map(char::from)
        .collect();

    log::info!("Name for Virtual Router not given. generated name VR_{val}");
    format!("VR_{val}")
}
