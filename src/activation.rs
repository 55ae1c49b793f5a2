//! Socket activation: claiming listening sockets handed over by a supervisor.
//!
//! A supervising process (systemd, or a predecessor instance during a restart) opens
//! the listening sockets itself and passes them to the new process as inherited
//! descriptors. Claiming them instead of binding lets the new instance take over
//! without a window in which connections are refused.
//!
//! [`SocketActivation`] claims exactly one stream listener and one datagram socket,
//! once per process, and reports the port they are bound to.

use crate::error::{Result, TopologyError};
use listenfd::ListenFd;
use std::net::{TcpListener, UdpSocket};
use std::sync::{Arc, LazyLock, Mutex, PoisonError};

/// A usable socket found among the inherited descriptors.
#[derive(Debug)]
pub enum InheritedSocket {
    /// A listening stream socket.
    Listener(TcpListener),
    /// A datagram socket.
    PacketConn(UdpSocket),
}

/// Where inherited sockets come from.
pub trait SocketSource: Send + Sync {
    /// Enumerates the sockets passed to this process.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the environment is malformed or a descriptor cannot
    /// be inspected.
    fn discover(&self) -> std::io::Result<Vec<InheritedSocket>>;
}

impl<F> SocketSource for F
where
    F: Fn() -> std::io::Result<Vec<InheritedSocket>> + Send + Sync,
{
    fn discover(&self) -> std::io::Result<Vec<InheritedSocket>> {
        self()
    }
}

/// Reads sockets passed with the systemd `LISTEN_PID`/`LISTEN_FDS` convention.
///
/// The environment is read on first discovery. The first TCP listener and the first
/// UDP socket taken are kept inside the source until both are present, so a failed
/// claim never closes an inherited socket; until then discovery hands out
/// duplicates of whatever has been taken.
#[derive(Default)]
pub struct ListenFds {
    claim: Mutex<Option<Claim>>,
}

struct Claim {
    fds: ListenFd,
    listener: Option<TcpListener>,
    packet_conn: Option<UdpSocket>,
}

impl Claim {
    fn take_missing(&mut self) {
        for idx in 0..self.fds.len() {
            if self.listener.is_none() {
                match self.fds.take_tcp_listener(idx) {
                    Ok(Some(listener)) => {
                        tracing::debug!(idx, "Took inherited TCP listener");
                        self.listener = Some(listener);
                        continue;
                    }
                    Ok(None) => continue,
                    Err(e) => tracing::trace!(idx, error = %e, "Inherited fd is not a TCP listener"),
                }
            }
            if self.packet_conn.is_none() {
                match self.fds.take_udp_socket(idx) {
                    Ok(Some(socket)) => {
                        tracing::debug!(idx, "Took inherited UDP socket");
                        self.packet_conn = Some(socket);
                    }
                    Ok(None) => {}
                    Err(e) => tracing::trace!(idx, error = %e, "Inherited fd is not a UDP socket"),
                }
            }
        }
    }
}

impl ListenFds {
    /// Creates a source reading the process environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SocketSource for ListenFds {
    fn discover(&self) -> std::io::Result<Vec<InheritedSocket>> {
        let mut slot = self.claim.lock().unwrap_or_else(PoisonError::into_inner);
        let claim = slot.get_or_insert_with(|| Claim {
            fds: ListenFd::from_env(),
            listener: None,
            packet_conn: None,
        });
        claim.take_missing();

        if claim.listener.is_some() && claim.packet_conn.is_some() {
            let mut sockets = Vec::with_capacity(2);
            sockets.extend(claim.listener.take().map(InheritedSocket::Listener));
            sockets.extend(claim.packet_conn.take().map(InheritedSocket::PacketConn));
            return Ok(sockets);
        }

        let mut sockets = Vec::new();
        if let Some(listener) = &claim.listener {
            sockets.push(InheritedSocket::Listener(listener.try_clone()?));
        }
        if let Some(socket) = &claim.packet_conn {
            sockets.push(InheritedSocket::PacketConn(socket.try_clone()?));
        }
        Ok(sockets)
    }
}

impl std::fmt::Debug for ListenFds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenFds").finish_non_exhaustive()
    }
}

/// The claimed listener and packet socket.
#[derive(Debug)]
pub struct ActivatedSockets {
    listener: TcpListener,
    packet_conn: UdpSocket,
    port: u16,
}

impl ActivatedSockets {
    /// The inherited stream listener.
    #[must_use]
    pub const fn listener(&self) -> &TcpListener {
        &self.listener
    }

    /// The inherited datagram socket.
    #[must_use]
    pub const fn packet_conn(&self) -> &UdpSocket {
        &self.packet_conn
    }

    /// TCP port the listener is bound to.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }
}

/// Claims inherited sockets once and shares them afterwards.
///
/// # Example
///
/// ```rust,ignore
/// use dns_topology::SocketActivation;
///
/// // Under systemd with ListenStream=/ListenDatagram= units:
/// let port = SocketActivation::global().resolve_port()?;
/// ```
pub struct SocketActivation {
    source: Box<dyn SocketSource>,
    sockets: Mutex<Option<Arc<ActivatedSockets>>>,
}

impl SocketActivation {
    /// Creates a resolver over `source`.
    #[must_use]
    pub fn new(source: impl SocketSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            sockets: Mutex::new(None),
        }
    }

    /// Creates a resolver reading the systemd environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(ListenFds::new())
    }

    /// The process-wide resolver.
    #[must_use]
    pub fn global() -> &'static Self {
        static GLOBAL: LazyLock<SocketActivation> = LazyLock::new(SocketActivation::from_env);
        &GLOBAL
    }

    /// Returns the port of the inherited listener as a decimal string.
    ///
    /// # Errors
    ///
    /// See [`activate`](Self::activate).
    pub fn resolve_port(&self) -> Result<String> {
        Ok(self.activate()?.port().to_string())
    }

    /// Claims the inherited sockets on first use; returns the stored ones afterwards.
    ///
    /// The first listener and the first packet socket found are kept; any surplus
    /// sockets are closed. A failed attempt stores nothing.
    ///
    /// # Errors
    ///
    /// Returns [`TopologyError::NoListener`] or [`TopologyError::NoPacketConn`] if
    /// either kind is missing, or [`TopologyError::Activation`] if discovery fails.
    pub fn activate(&self) -> Result<Arc<ActivatedSockets>> {
        let mut slot = self.sockets.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sockets) = slot.as_ref() {
            return Ok(Arc::clone(sockets));
        }

        let mut listener = None;
        let mut packet_conn = None;
        for socket in self.source.discover().map_err(TopologyError::Activation)? {
            match socket {
                InheritedSocket::Listener(l) if listener.is_none() => listener = Some(l),
                InheritedSocket::PacketConn(p) if packet_conn.is_none() => packet_conn = Some(p),
                surplus => tracing::debug!(socket = ?surplus, "Closing surplus inherited socket"),
            }
        }

        let listener = listener.ok_or(TopologyError::NoListener)?;
        let packet_conn = packet_conn.ok_or(TopologyError::NoPacketConn)?;
        let port = listener.local_addr().map_err(TopologyError::Activation)?.port();

        tracing::info!(port, "Claimed socket-activated listener and packet connection");
        let sockets = Arc::new(ActivatedSockets {
            listener,
            packet_conn,
            port,
        });
        *slot = Some(Arc::clone(&sockets));
        Ok(sockets)
    }

    /// The claimed sockets, if activation has succeeded.
    #[must_use]
    pub fn sockets(&self) -> Option<Arc<ActivatedSockets>> {
        self.sockets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl std::fmt::Debug for SocketActivation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketActivation")
            .field("sockets", &self.sockets)
            .finish_non_exhaustive()
    }
}
