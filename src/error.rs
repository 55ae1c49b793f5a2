//! Error types.

use thiserror::Error;

/// Result alias for topology operations.
pub type Result<T> = std::result::Result<T, TopologyError>;

/// Boxed error produced by a [`ServerFactory`](crate::ServerFactory).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned while inspecting server blocks or materializing servers.
#[derive(Debug, Error)]
pub enum TopologyError {
    /// A server-block key does not name a valid zone.
    #[error("not a valid zone key {key:?}: {reason}")]
    InvalidZone {
        /// The raw key as written.
        key: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Two keys claim the same zone.
    #[error("cannot serve {key} - zone already defined for {existing}")]
    DuplicateZone {
        /// Canonical key that lost.
        key: String,
        /// Canonical key that claimed the zone first.
        existing: String,
    },

    /// No inherited stream listener was found.
    #[error("no listeners")]
    NoListener,

    /// No inherited datagram socket was found.
    #[error("no packet connections")]
    NoPacketConn,

    /// Inspecting the inherited descriptors failed.
    #[error("socket activation: {0}")]
    Activation(#[source] std::io::Error),

    /// A configuration requested socket activation and it could not be set up.
    #[error("can't setup socket activation: {0}")]
    SocketActivation(#[source] Box<TopologyError>),

    /// A `host:port` pair could not be turned into a bind address.
    #[error("cannot resolve listen address {address}: {reason}")]
    AddressResolution {
        /// The joined `host:port` string.
        address: String,
        /// Why resolution failed.
        reason: String,
    },

    /// The server factory rejected a listener group.
    #[error("cannot create server for {address}: {source}")]
    Factory {
        /// Bind address of the group.
        address: String,
        /// Error from the factory.
        #[source]
        source: BoxError,
    },
}

impl TopologyError {
    /// Returns `true` if the error comes from socket activation.
    #[must_use]
    pub fn is_activation(&self) -> bool {
        matches!(
            self,
            Self::NoListener | Self::NoPacketConn | Self::Activation(_) | Self::SocketActivation(_)
        )
    }

    /// Returns the zone a zone-level error is about; the raw key if it did not parse.
    #[must_use]
    pub fn zone(&self) -> Option<&str> {
        match self {
            Self::InvalidZone { key, .. } => Some(key),
            Self::DuplicateZone { key, .. } => key.rsplit_once(':').map(|(zone, _)| zone),
            _ => None,
        }
    }
}
