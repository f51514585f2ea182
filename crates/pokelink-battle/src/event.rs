//! What a peer reports to its operator.

use std::net::SocketAddr;

use pokelink_engine::Combatant;
use pokelink_protocol::ChatMessage;
use pokelink_session::Role;

use crate::Phase;

/// Something happened that the operator may want to show.
///
/// Events arrive in the order the actor produced them on an unbounded
/// channel returned by [`spawn_peer`](crate::spawn_peer). Dropping the
/// receiver is fine; the actor keeps running.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerEvent {
    /// A handshake finished and the seed is agreed.
    HandshakeComplete { peer: SocketAddr, seed: u64 },

    /// The Host accepted a spectator.
    SpectatorJoined { peer: SocketAddr },

    /// Both setups are known; the battle starts.
    BattleReady {
        local: Combatant,
        remote: Combatant,
        your_turn: bool,
    },

    /// The opponent (or, for a spectator, either battler) announced a move.
    AttackAnnounced { from: SocketAddr, move_name: String },

    /// A turn was computed. On battlers the numbers are this peer's own;
    /// on spectators they are the relayed report.
    TurnResolved {
        attacker: String,
        move_used: String,
        damage: u32,
        attacker_hp: Option<u32>,
        defender_hp: u32,
        message: Option<String>,
    },

    Chat(ChatMessage),

    GameOver { winner: String, loser: String },

    /// The session was given up: delivery failed or the peers could not
    /// agree on a turn.
    SessionAbandoned { peer: SocketAddr, reason: String },

    HandshakeFailed { peer: SocketAddr, reason: String },
}

/// A snapshot of the peer, returned by
/// [`PeerHandle::status`](crate::PeerHandle::status).
#[derive(Debug, Clone)]
pub struct PeerStatus {
    pub role: Role,
    pub phase: Phase,
    /// The battle opponent (for a spectator: the Host it watches).
    pub opponent: Option<SocketAddr>,
    pub my_turn: bool,
    pub turn_count: u32,
    pub local: Option<Combatant>,
    pub remote: Option<Combatant>,
    /// Established spectators (Host only).
    pub spectators: usize,
}
