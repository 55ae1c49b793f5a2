//! Clustering configurations by bind address.

use crate::activation::{ActivatedSockets, SocketActivation};
use crate::config::{Options, ZoneConfig};
use crate::error::{Result, TopologyError};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::sync::Arc;

/// Configurations served by one physical listener.
#[derive(Debug)]
pub struct ListenerGroup<'a> {
    /// Canonical bind address, e.g. `:53` or `127.0.0.1:53`.
    pub address: String,

    /// Members in declaration order.
    pub configs: Vec<&'a ZoneConfig>,

    /// Inherited sockets, when a member is socket-activated.
    pub sockets: Option<Arc<ActivatedSockets>>,
}

impl ListenerGroup<'_> {
    /// Returns the zones served by this group.
    #[must_use]
    pub fn zones(&self) -> Vec<&str> {
        self.configs.iter().map(|c| c.zone.as_str()).collect()
    }
}

/// Resolves each configuration's bind address and partitions the configurations
/// by it.
///
/// Empty ports get `options.default_port`; ports equal to
/// `options.activation_sentinel` get the inherited listener's port. Groups are
/// returned in the order their address was first seen, members in input order.
/// Configurations sharing an address are not checked for compatibility.
///
/// # Errors
///
/// Returns [`TopologyError::SocketActivation`] if an activated port cannot be
/// resolved, or [`TopologyError::AddressResolution`] for a bad host or port. No
/// groups are returned on error.
pub fn group_by_listen_addr<'a>(
    configs: &'a mut [ZoneConfig],
    options: &Options,
    activation: &SocketActivation,
) -> Result<Vec<ListenerGroup<'a>>> {
    let mut addresses = Vec::with_capacity(configs.len());
    for config in configs.iter_mut() {
        if config.port.is_empty() {
            config.port.clone_from(&options.default_port);
        }
        if config.port == options.activation_sentinel {
            let port = activation
                .resolve_port()
                .map_err(|e| TopologyError::SocketActivation(Box::new(e)))?;
            tracing::debug!(zone = %config.zone, port = %port, "Using socket-activated port");
            config.port = port;
            config.socket_activated = true;
        }
        addresses.push(resolve_listen_addr(&config.listen_host, &config.port)?);
    }

    let configs: &'a [ZoneConfig] = configs;
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<ListenerGroup<'a>> = Vec::new();
    for (config, address) in configs.iter().zip(addresses) {
        let i = if let Some(&i) = index.get(&address) {
            i
        } else {
            index.insert(address.clone(), groups.len());
            groups.push(ListenerGroup {
                address,
                configs: Vec::new(),
                sockets: None,
            });
            groups.len() - 1
        };

        let group = &mut groups[i];
        if config.socket_activated && group.sockets.is_none() {
            group.sockets = activation.sockets();
        }
        group.configs.push(config);
    }
    Ok(groups)
}

/// Turns `host` and `port` into a canonical bind address string.
///
/// An empty host binds all interfaces and renders as `:<port>`. Hostnames are
/// resolved and the first address is used.
///
/// # Errors
///
/// Returns [`TopologyError::AddressResolution`] if the port is not numeric or the
/// host does not resolve.
pub fn resolve_listen_addr(host: &str, port: &str) -> Result<String> {
    let address = if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    };
    let fail = |reason: String| TopologyError::AddressResolution {
        address: address.clone(),
        reason,
    };

    let port: u16 = port
        .parse()
        .map_err(|e| fail(format!("invalid port {port:?}: {e}")))?;
    if host.is_empty() {
        return Ok(format!(":{port}"));
    }

    let bare = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = bare.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port).to_string());
    }

    (bare, port)
        .to_socket_addrs()
        .map_err(|e| fail(e.to_string()))?
        .next()
        .map(|addr| addr.to_string())
        .ok_or_else(|| fail("no addresses found".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::InheritedSocket;
    use std::net::{TcpListener, UdpSocket};

    fn no_sockets() -> SocketActivation {
        SocketActivation::new(|| -> std::io::Result<Vec<InheritedSocket>> { Ok(Vec::new()) })
    }

    fn inherited() -> SocketActivation {
        SocketActivation::new(|| -> std::io::Result<Vec<InheritedSocket>> {
            Ok(vec![
                InheritedSocket::Listener(TcpListener::bind("127.0.0.1:0")?),
                InheritedSocket::PacketConn(UdpSocket::bind("127.0.0.1:0")?),
            ])
        })
    }

    fn config(zone: &str, host: &str, port: &str) -> ZoneConfig {
        let mut c = ZoneConfig::new(zone, port);
        c.set_listen_host(host);
        c
    }

    #[test]
    fn empty_port_gets_default() {
        let mut configs = vec![config("x.example.", "", "")];
        let options = Options::default();
        let groups = group_by_listen_addr(&mut configs, &options, &no_sockets()).unwrap();

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].address, ":2053");
        assert_eq!(groups[0].configs[0].port, "2053");
    }

    #[test]
    fn shared_address_forms_one_group_in_order() {
        let mut configs = vec![
            config("b.example.", "", "53"),
            config("a.example.", "", "53"),
            config("c.example.", "127.0.0.1", "53"),
            config("d.example.", "", "53"),
        ];
        let groups =
            group_by_listen_addr(&mut configs, &Options::default(), &no_sockets()).unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].address, ":53");
        assert_eq!(
            groups[0].zones(),
            vec!["b.example.", "a.example.", "d.example."]
        );
        assert_eq!(groups[1].address, "127.0.0.1:53");
        assert_eq!(groups[1].zones(), vec!["c.example."]);
    }

    #[test]
    fn grouping_is_a_partition() {
        let mut configs: Vec<ZoneConfig> = (0..12)
            .map(|i| {
                let host = if i % 3 == 0 { "127.0.0.1" } else { "" };
                let port = if i % 2 == 0 { "53" } else { "1053" };
                config(&format!("z{i}.example."), host, port)
            })
            .collect();
        let groups =
            group_by_listen_addr(&mut configs, &Options::default(), &no_sockets()).unwrap();

        let total: usize = groups.iter().map(|g| g.configs.len()).sum();
        assert_eq!(total, 12);
        for g in &groups {
            for c in &g.configs {
                assert_eq!(resolve_listen_addr(&c.listen_host, &c.port).unwrap(), g.address);
            }
        }
        let mut addresses: Vec<_> = groups.iter().map(|g| g.address.as_str()).collect();
        addresses.sort_unstable();
        addresses.dedup();
        assert_eq!(addresses.len(), groups.len());
    }

    #[test]
    fn sentinel_port_uses_inherited_listener() {
        let activation = inherited();
        let mut configs = vec![
            config("x.example.", "", "sa"),
            config("y.example.", "", "53"),
        ];
        let groups = group_by_listen_addr(&mut configs, &Options::default(), &activation).unwrap();

        let port = activation.resolve_port().unwrap();
        assert_eq!(groups[0].address, format!(":{port}"));
        assert!(groups[0].configs[0].is_socket_activated());
        assert!(groups[0].sockets.is_some());
        assert!(!groups[1].configs[0].is_socket_activated());
        assert!(groups[1].sockets.is_none());
    }

    #[test]
    fn custom_sentinel() {
        let options = Options::default().with_activation_sentinel("inherit");
        let mut configs = vec![config("x.example.", "", "sa")];
        let err = group_by_listen_addr(&mut configs, &options, &inherited()).unwrap_err();
        assert!(matches!(err, TopologyError::AddressResolution { .. }));
    }

    #[test]
    fn activation_failure_aborts() {
        let mut configs = vec![
            config("a.example.", "", "53"),
            config("x.example.", "", "sa"),
        ];
        let err =
            group_by_listen_addr(&mut configs, &Options::default(), &no_sockets()).unwrap_err();
        assert!(err.is_activation());
        assert!(!configs[1].is_socket_activated());
    }

    #[test]
    fn resolves_literals() {
        assert_eq!(resolve_listen_addr("", "53").unwrap(), ":53");
        assert_eq!(resolve_listen_addr("10.0.0.1", "53").unwrap(), "10.0.0.1:53");
        assert_eq!(resolve_listen_addr("::1", "53").unwrap(), "[::1]:53");
        assert_eq!(resolve_listen_addr("[::1]", "53").unwrap(), "[::1]:53");
    }

    #[test]
    fn rejects_bad_ports() {
        for port in ["", "dns", "65536", "-1"] {
            match resolve_listen_addr("127.0.0.1", port).unwrap_err() {
                TopologyError::AddressResolution { address, .. } => {
                    assert_eq!(address, format!("127.0.0.1:{port}"));
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }
}
