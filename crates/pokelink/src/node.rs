//! `PeerBuilder` and the running `Peer`.
//!
//! This is the entry point for running a Pokelink node. It ties together
//! all the layers: datagram → reliable transport → codec → state machine.

use std::net::SocketAddr;
use std::sync::Arc;

use pokelink_battle::{spawn_peer, PeerConfig, PeerEvent, PeerHandle};
use pokelink_engine::{Roster, StaticRoster};
use pokelink_session::{Role, SessionConfig};
use pokelink_transport::{
    Datagram, MemoryNetwork, ReliableTransport, TransportConfig, UdpDatagram,
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::PokelinkError;

/// Every tunable of a node in one place, for loading from a file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PokelinkConfig {
    pub peer: PeerConfig,
    pub transport: TransportConfig,
    pub session: SessionConfig,
}

/// Builder for configuring and starting a peer.
///
/// # Example
///
/// ```rust,no_run
/// use pokelink::prelude::*;
///
/// # async fn run() -> Result<(), PokelinkError> {
/// let mut host = PeerBuilder::new(Role::Host).build().await?;
/// while let Some(event) = host.next_event().await {
///     println!("{event:?}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct PeerBuilder {
    config: PokelinkConfig,
    roster: Option<Arc<dyn Roster>>,
}

impl PeerBuilder {
    /// A builder with the defaults for `role`.
    pub fn new(role: Role) -> Self {
        Self::from_config(PokelinkConfig {
            peer: PeerConfig::for_role(role),
            ..PokelinkConfig::default()
        })
    }

    pub fn from_config(config: PokelinkConfig) -> Self {
        Self {
            config,
            roster: None,
        }
    }

    /// Sets the local address. Port `0` picks an ephemeral port.
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.config.peer.bind_addr = addr;
        self
    }

    /// Sets the name on outgoing chat messages.
    pub fn sender_name(mut self, name: impl Into<String>) -> Self {
        self.config.peer.sender_name = name.into();
        self
    }

    /// Sets the roster. Defaults to [`StaticRoster::builtin`].
    pub fn roster(mut self, roster: impl Roster) -> Self {
        self.roster = Some(Arc::new(roster));
        self
    }

    /// Shares a roster with other peers in the same process.
    pub fn shared_roster(mut self, roster: Arc<dyn Roster>) -> Self {
        self.roster = Some(roster);
        self
    }

    pub fn transport_config(mut self, config: TransportConfig) -> Self {
        self.config.transport = config;
        self
    }

    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.config.session = config;
        self
    }

    /// Binds a UDP socket and starts the peer.
    pub async fn build(self) -> Result<Peer, PokelinkError> {
        let socket = UdpDatagram::bind(self.config.peer.bind_addr).await?;
        self.build_with(socket)
    }

    /// Starts the peer on an in-memory network. A bind address with port
    /// `0` takes the next free address on the network.
    pub async fn build_on(self, network: &MemoryNetwork) -> Result<Peer, PokelinkError> {
        let socket = if self.config.peer.bind_addr.port() == 0 {
            network.bind_any().await?
        } else {
            network.bind(self.config.peer.bind_addr).await?
        };
        self.build_with(socket)
    }

    /// Starts the peer over any datagram endpoint.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn build_with<D: Datagram>(self, socket: D) -> Result<Peer, PokelinkError> {
        let roster = self
            .roster
            .unwrap_or_else(|| Arc::new(StaticRoster::builtin()));
        let transport = Arc::new(ReliableTransport::new(socket, self.config.transport));
        let (handle, events) =
            spawn_peer(self.config.peer, self.config.session, transport, roster)?;
        tracing::info!(role = %handle.role(), addr = %handle.local_addr(), "peer ready");
        Ok(Peer { handle, events })
    }
}

/// A running peer: the handle to drive it and the events it reports.
pub struct Peer {
    handle: PeerHandle,
    events: mpsc::UnboundedReceiver<PeerEvent>,
}

impl Peer {
    /// The handle for issuing commands. Clone it to share.
    pub fn handle(&self) -> &PeerHandle {
        &self.handle
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.handle.local_addr()
    }

    /// Waits for the next event. `None` once the peer has stopped.
    pub async fn next_event(&mut self) -> Option<PeerEvent> {
        self.events.recv().await
    }

    /// Returns an event if one is already queued.
    pub fn try_next_event(&mut self) -> Option<PeerEvent> {
        self.events.try_recv().ok()
    }

    pub fn into_parts(self) -> (PeerHandle, mpsc::UnboundedReceiver<PeerEvent>) {
        (self.handle, self.events)
    }
}
