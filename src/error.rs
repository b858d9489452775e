use std::net::IpAddr;

/// Structural problems found while decoding a VRRP message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PacketError {
    #[error("packet too short: {0} bytes")]
    TooShort(usize),

    #[error("unsupported IP version {0}")]
    UnsupportedIpVersion(u8),

    #[error("address table needs {expected} bytes, packet carries {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("unsupported VRRP version {0}")]
    BadVersion(u8),

    #[error("unsupported VRRP message type {0}")]
    BadType(u8),
}

/// Transient I/O and integrity failures. None of these stop a running router.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed packet: {0}")]
    Packet(#[from] PacketError),

    #[error("invalid checksum from {0}")]
    Checksum(IpAddr),

    #[error("TTL/hop limit {0} of incoming VRRP packet != 255")]
    HopLimit(u8),

    #[error("receive timed out")]
    Timeout,

    #[error("virtual router already stopped")]
    Stopped,

    #[error("{0}")]
    Other(String),
}

pub type NetResult<T> = Result<T, NetError>;

/// Problems with the static configuration of a virtual router. These are
/// fatal: the instance is never created.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unable to find interface with name {0}")]
    InterfaceNotFound(String),

    #[error("no usable IPv{version} source address on {interface}")]
    NoSourceAddress { interface: String, version: u8 },

    #[error("advertisement interval of {0} centiseconds is outside 1..=4095")]
    InvalidInterval(u128),

    #[error("address '{0}' not in the correct format")]
    InvalidAddress(String),

    #[error("address {address} does not belong to IPv{version}")]
    AddressFamily { address: IpAddr, version: u8 },

    #[error("more than 255 protected addresses configured")]
    TooManyAddresses,

    #[error("virtual router {0} has no protected address")]
    MissingAddresses(String),

    #[error("unable to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("unable to parse config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unable to set up logging: {0}")]
    Logging(String),
}
