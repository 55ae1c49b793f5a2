//! # dns-topology
//!
//! Turn parsed DNS server blocks into a set of listeners ready to serve.
//!
//! A DNS server configuration is a list of server blocks, each naming one or more
//! zones (`example.org:53`) and the middleware that answers for them. This crate:
//!
//! - canonicalizes zone keys and rejects a zone declared twice, on any port,
//! - resolves each zone's bind address, filling in the default port,
//! - groups zones sharing an address so one listener serves them all,
//! - claims listening sockets inherited from a supervisor (socket activation),
//!   so a restarted instance takes over without refusing connections.
//!
//! Building the servers themselves is left to a [`ServerFactory`].
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use dns_topology::{ListenerGroup, Options, Topology};
//!
//! let mut topology = Topology::new(Options::from_env());
//! let blocks = topology.inspect_server_blocks(parse_corefile()?)?;
//! // ... execute directives against topology.registry_mut() ...
//! let servers = topology.make_servers(|group: ListenerGroup<'_>| MyServer::new(group))?;
//! ```
//!
//! ## Socket activation
//!
//! A key whose port is `sa` (see [`Options::activation_sentinel`]) is served on
//! the stream listener and datagram socket passed in with the systemd
//! `LISTEN_PID`/`LISTEN_FDS` convention. The sockets are claimed once per process
//! and shared by every group that asks for them.

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod activation;
pub mod config;
pub mod error;
pub mod group;
pub mod registry;
pub mod topology;
pub mod zone;

pub use activation::{ActivatedSockets, InheritedSocket, ListenFds, SocketActivation, SocketSource};
pub use config::{Directive, Options, ServerBlock, ZoneConfig};
pub use error::{BoxError, Result, TopologyError};
pub use group::{ListenerGroup, group_by_listen_addr};
pub use registry::Registry;
pub use topology::{ServerFactory, Topology};
pub use zone::{ZoneAddress, normalize};
