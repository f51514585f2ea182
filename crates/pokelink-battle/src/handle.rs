//! The operator's side of a peer: commands in, replies back.

use std::net::SocketAddr;

use pokelink_engine::StatBoosts;
use pokelink_protocol::{ChatContent, CommunicationMode, Envelope};
use pokelink_session::Role;
use tokio::sync::{mpsc, oneshot};

use crate::{BattleError, PeerStatus};

/// Reply channel for a command.
pub(crate) type Reply<T> = oneshot::Sender<Result<T, BattleError>>;

/// Commands sent to a peer actor through its channel.
///
/// Each variant is an operation the operator can request. Most carry a
/// reply channel the caller waits on.
pub(crate) enum PeerCommand {
    Connect {
        host: SocketAddr,
        reply: Reply<u64>,
    },
    Spectate {
        host: SocketAddr,
        reply: Reply<()>,
    },
    Setup {
        pokemon_name: String,
        boosts: StatBoosts,
        mode: CommunicationMode,
        reply: Reply<()>,
    },
    Attack {
        move_name: String,
        reply: Reply<()>,
    },
    Chat {
        content: ChatContent,
        reply: Reply<()>,
    },
    Status {
        reply: oneshot::Sender<PeerStatus>,
    },
    Shutdown,
}

/// A message that came off the network, on its way to the actor.
pub(crate) struct Inbound {
    pub envelope: Envelope,
    pub from: SocketAddr,
}

/// Handle to a running peer actor.
///
/// This is cheap to clone: a channel sender and an address. The actor
/// stops once every handle is dropped.
#[derive(Clone)]
pub struct PeerHandle {
    role: Role,
    local_addr: SocketAddr,
    commands: mpsc::Sender<PeerCommand>,
}

impl PeerHandle {
    pub(crate) fn new(
        role: Role,
        local_addr: SocketAddr,
        commands: mpsc::Sender<PeerCommand>,
    ) -> Self {
        Self {
            role,
            local_addr,
            commands,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// The address this peer's socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Joiner: opens a battle session with `host` and returns the seed.
    ///
    /// Resolves once HANDSHAKE_RESPONSE arrives, or fails when the request
    /// can't be delivered or the handshake times out.
    pub async fn connect(&self, host: SocketAddr) -> Result<u64, BattleError> {
        self.request(|reply| PeerCommand::Connect { host, reply })
            .await
    }

    /// Spectator: registers with `host`.
    pub async fn spectate(&self, host: SocketAddr) -> Result<(), BattleError> {
        self.request(|reply| PeerCommand::Spectate { host, reply })
            .await
    }

    /// Chooses this peer's combatant and sends BATTLE_SETUP. On the Host,
    /// `mode` also decides whether spectators get relays.
    pub async fn setup(
        &self,
        pokemon_name: impl Into<String>,
        boosts: StatBoosts,
        mode: CommunicationMode,
    ) -> Result<(), BattleError> {
        let pokemon_name = pokemon_name.into();
        self.request(|reply| PeerCommand::Setup {
            pokemon_name,
            boosts,
            mode,
            reply,
        })
        .await
    }

    /// Announces a move. Only the turn owner may attack.
    ///
    /// Returns once the opponent has acknowledged the announcement; the
    /// rest of the turn is reported through events.
    pub async fn attack(&self, move_name: impl Into<String>) -> Result<(), BattleError> {
        let move_name = move_name.into();
        self.request(|reply| PeerCommand::Attack { move_name, reply })
            .await
    }

    /// Sends a text chat message.
    pub async fn chat(&self, text: impl Into<String>) -> Result<(), BattleError> {
        let content = ChatContent::Text(text.into());
        self.request(|reply| PeerCommand::Chat { content, reply })
            .await
    }

    /// Sends a sticker (base64 image data, passed through untouched).
    pub async fn sticker(&self, data: impl Into<String>) -> Result<(), BattleError> {
        let content = ChatContent::Sticker(data.into());
        self.request(|reply| PeerCommand::Chat { content, reply })
            .await
    }

    /// Requests a snapshot of the peer.
    pub async fn status(&self) -> Result<PeerStatus, BattleError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(PeerCommand::Status { reply: reply_tx })
            .await
            .map_err(|_| BattleError::Unavailable)?;
        reply_rx.await.map_err(|_| BattleError::Unavailable)
    }

    /// Tells the peer to stop.
    pub async fn shutdown(&self) -> Result<(), BattleError> {
        self.commands
            .send(PeerCommand::Shutdown)
            .await
            .map_err(|_| BattleError::Unavailable)
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> PeerCommand,
    ) -> Result<T, BattleError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(command(reply_tx))
            .await
            .map_err(|_| BattleError::Unavailable)?;
        reply_rx.await.map_err(|_| BattleError::Unavailable)?
    }
}
