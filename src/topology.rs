//! Two-phase build: inspect server blocks, then materialize one server per
//! listen address.

use crate::activation::SocketActivation;
use crate::config::{Options, ServerBlock};
use crate::error::{BoxError, Result, TopologyError};
use crate::group::{ListenerGroup, group_by_listen_addr};
use crate::registry::Registry;

/// Creates a runnable server for one listener group.
///
/// Implemented for closures taking a [`ListenerGroup`]; annotate the argument
/// (`|group: ListenerGroup<'_>| ...`) so the closure accepts any lifetime.
pub trait ServerFactory {
    /// The server instance produced.
    type Server;

    /// Builds the server for `group`.
    ///
    /// # Errors
    ///
    /// Any error aborts materialization.
    fn new_server(&mut self, group: ListenerGroup<'_>) -> std::result::Result<Self::Server, BoxError>;
}

impl<F, S, E> ServerFactory for F
where
    F: FnMut(ListenerGroup<'_>) -> std::result::Result<S, E>,
    E: Into<BoxError>,
{
    type Server = S;

    fn new_server(&mut self, group: ListenerGroup<'_>) -> std::result::Result<S, BoxError> {
        self(group).map_err(Into::into)
    }
}

/// Accumulates zone configurations and turns them into servers.
///
/// # Lifecycle
///
/// 1. [`inspect_server_blocks`](Self::inspect_server_blocks) validates and registers
///    every zone key.
/// 2. The directive layer fills in middleware and hosts through
///    [`registry_mut`](Self::registry_mut).
/// 3. [`make_servers`](Self::make_servers) groups configurations by bind address and
///    calls the factory once per group.
///
/// Any error aborts the phase; a caller that sees one must not serve anything.
///
/// # Example
///
/// ```
/// use dns_topology::{ListenerGroup, Options, ServerBlock, Topology};
///
/// let mut topology = Topology::new(Options::default());
/// topology.inspect_server_blocks(vec![
///     ServerBlock::new(["a.example.:53"]),
///     ServerBlock::new(["b.example.:53"]),
/// ])?;
///
/// let servers = topology.make_servers(|group: ListenerGroup<'_>| {
///     Ok::<_, std::io::Error>((group.address.clone(), group.configs.len()))
/// })?;
/// assert_eq!(servers, vec![(":53".to_string(), 2)]);
/// # Ok::<(), dns_topology::TopologyError>(())
/// ```
#[derive(Debug)]
pub struct Topology<'s> {
    options: Options,
    registry: Registry,
    activation: &'s SocketActivation,
}

impl Topology<'static> {
    /// Creates a topology using the process-wide socket activation.
    #[must_use]
    pub fn new(options: Options) -> Self {
        Self::with_activation(options, SocketActivation::global())
    }
}

impl<'s> Topology<'s> {
    /// Creates a topology that claims inherited sockets through `activation`.
    #[must_use]
    pub fn with_activation(options: Options, activation: &'s SocketActivation) -> Self {
        Self {
            options,
            registry: Registry::new(),
            activation,
        }
    }

    /// The options in effect.
    #[must_use]
    pub const fn options(&self) -> &Options {
        &self.options
    }

    /// The registered configurations.
    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Mutable access for the directive layer.
    pub const fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// The block to inspect when no configuration input exists.
    #[must_use]
    pub fn default_input(&self) -> ServerBlock {
        ServerBlock::default_input(&self.options.default_port)
    }

    /// Normalizes keys, rejects duplicate zones, and registers one configuration per
    /// key. Returns the blocks with canonical keys.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::InvalidZone`] or [`TopologyError::DuplicateZone`];
    /// nothing is registered in that case.
    pub fn inspect_server_blocks(&mut self, blocks: Vec<ServerBlock>) -> Result<Vec<ServerBlock>> {
        self.registry.inspect(blocks)
    }

    /// Groups all configurations by bind address and builds one server per group,
    /// in the order addresses were first declared.
    ///
    /// # Errors
    ///
    /// Returns the grouping error, or [`TopologyError::Factory`] for the first group
    /// the factory rejects. No servers are returned on error.
    pub fn make_servers<F: ServerFactory>(&mut self, mut factory: F) -> Result<Vec<F::Server>> {
        let groups = group_by_listen_addr(self.registry.configs_mut(), &self.options, self.activation)?;

        let mut servers = Vec::with_capacity(groups.len());
        for group in groups {
            let address = group.address.clone();
            if self.options.quiet {
                tracing::debug!(address = %address, zones = ?group.zones(), "Creating server");
            } else {
                tracing::info!(address = %address, zones = ?group.zones(), "Creating server");
            }

            let server = factory
                .new_server(group)
                .map_err(|source| TopologyError::Factory { address, source })?;
            servers.push(server);
        }
        Ok(servers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::InheritedSocket;

    fn no_sockets() -> SocketActivation {
        SocketActivation::new(|| -> std::io::Result<Vec<InheritedSocket>> { Ok(Vec::new()) })
    }

    #[test]
    fn factory_called_once_per_address() {
        let activation = no_sockets();
        let mut t = Topology::with_activation(Options::default(), &activation);
        t.inspect_server_blocks(vec![
            ServerBlock::new(["a.example.:53"]),
            ServerBlock::new(["b.example.:1053", "c.example.:53"]),
        ])
        .unwrap();

        let mut calls = 0;
        let servers = t
            .make_servers(|group: ListenerGroup<'_>| {
                calls += 1;
                Ok::<_, BoxError>((group.address.clone(), group.zones().join(",")))
            })
            .unwrap();

        assert_eq!(calls, 2);
        assert_eq!(
            servers,
            vec![
                (":53".to_string(), "a.example.,c.example.".to_string()),
                (":1053".to_string(), "b.example.".to_string()),
            ]
        );
    }

    #[test]
    fn factory_error_carries_address() {
        let activation = no_sockets();
        let mut t = Topology::with_activation(Options::default(), &activation);
        t.inspect_server_blocks(vec![ServerBlock::new(["a.example.:53"])])
            .unwrap();

        let err = t
            .make_servers(|_: ListenerGroup<'_>| {
                Err::<(), _>(std::io::Error::other("address in use"))
            })
            .unwrap_err();

        match err {
            TopologyError::Factory { address, source } => {
                assert_eq!(address, ":53");
                assert_eq!(source.to_string(), "address in use");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn quiet_mode_still_builds() {
        let activation = no_sockets();
        let options = Options::default().with_quiet(true);
        let mut t = Topology::with_activation(options, &activation);
        let block = t.default_input();
        t.inspect_server_blocks(vec![block]).unwrap();

        let servers = t
            .make_servers(|g: ListenerGroup<'_>| Ok::<_, BoxError>(g.address))
            .unwrap();
        assert_eq!(servers, vec![":2053".to_string()]);
        assert_eq!(t.registry().configs()[0].middleware[0].name, "whoami");
    }
}
