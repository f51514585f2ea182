//! Peer configuration and the phase state machine.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use pokelink_session::Role;
use serde::{Deserialize, Serialize};

/// The port a Host listens on unless told otherwise.
pub const DEFAULT_HOST_PORT: u16 = 9002;

// ---------------------------------------------------------------------------
// PeerConfig
// ---------------------------------------------------------------------------

/// Configuration for one peer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerConfig {
    /// Host, Joiner or Spectator.
    pub role: Role,

    /// Local address to bind. Port `0` picks an ephemeral port.
    pub bind_addr: SocketAddr,

    /// Name put on outgoing chat messages.
    pub sender_name: String,

    /// How often the actor checks for handshakes that timed out.
    pub sweep_interval: Duration,

    /// Capacity of the operator command queue.
    pub command_buffer: usize,
}

impl PeerConfig {
    /// Defaults for a role: Hosts bind [`DEFAULT_HOST_PORT`], everyone
    /// else an ephemeral port.
    pub fn for_role(role: Role) -> Self {
        let port = match role {
            Role::Host => DEFAULT_HOST_PORT,
            Role::Joiner | Role::Spectator => 0,
        };
        Self {
            role,
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port),
            sender_name: role.to_string(),
            sweep_interval: Duration::from_secs(1),
            command_buffer: 64,
        }
    }
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self::for_role(Role::Joiner)
    }
}

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Where a battle with one opponent stands.
///
/// ```text
/// Init → HandshakeDone → Ready ⇄ AwaitingDefense/Resolving → GameOver
///                            any battle phase ──→ Abandoned
/// ```
///
/// - **Init**: no opponent yet.
/// - **HandshakeDone**: seed agreed, waiting for both BATTLE_SETUPs.
/// - **Ready**: waiting for the turn owner to attack.
/// - **AwaitingDefense**: we announced an attack and wait for the
///   opponent's DEFENSE_ANNOUNCE.
/// - **Resolving**: damage is being computed and cross-checked.
/// - **GameOver**: someone fainted. Terminal.
/// - **Abandoned**: delivery failed or the peers disagreed on the
///   numbers. Terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Init,
    HandshakeDone,
    Ready,
    AwaitingDefense,
    Resolving,
    GameOver,
    Abandoned,
}

impl Phase {
    /// `true` once nothing more can happen in this battle.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::GameOver | Self::Abandoned)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "Init"),
            Self::HandshakeDone => write!(f, "HandshakeDone"),
            Self::Ready => write!(f, "Ready"),
            Self::AwaitingDefense => write!(f, "AwaitingDefense"),
            Self::Resolving => write!(f, "Resolving"),
            Self::GameOver => write!(f, "GameOver"),
            Self::Abandoned => write!(f, "Abandoned"),
        }
    }
}
