//! VRRPv3 (RFC 5798) virtual routers.
//!
//! A [`router::VirtualRouter`] is configured, then started on a
//! [`network::Link`], which hands it to its own decision loop and packet
//! receiver. [`core_tasks::RouterHandle`] controls the running instance.

pub mod announcer;
pub mod checksum;
pub mod config;
pub mod core_tasks;
pub mod defaults;
pub mod error;
pub mod general;
pub mod hooks;
pub mod logging;
pub mod network;
pub mod packet;
pub mod queue;
pub mod router;
pub mod socket;
pub mod state_machine;
pub mod timers;

mod observer;

pub use core_tasks::{run, RouterHandle};
pub use error::{ConfigError, NetError, NetResult, PacketError};
pub use hooks::{Hook, Transition};
pub use network::{AddrAnnouncer, IpLayer, Link};
pub use router::VirtualRouter;
pub use state_machine::States;
