//! Session types: what one peer knows about another.
//!
//! A session is keyed by the remote address. It records:
//! - WHO the remote is (its [`Role`] relative to us)
//! - WHERE the handshake stands ([`HandshakeState`])
//! - WHICH inbound sequence numbers have been seen, so retransmitted
//!   duplicates can be dropped

use std::collections::VecDeque;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// How long a session may stay in `AwaitingHandshake` before the sweep
    /// expires it.
    pub handshake_timeout: Duration,

    /// How many recent inbound sequence numbers to remember per peer.
    /// Numbers older than the window are treated as duplicates.
    pub dedup_window: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(5),
            dedup_window: 64,
        }
    }
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// The part a peer plays in a battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Listens on a known port, hands out the seed, moves first.
    Host,
    /// Connects to a Host and battles it.
    Joiner,
    /// Watches a Host's battle. Never battles.
    Spectator,
}

impl Role {
    /// Host or Joiner.
    pub fn is_battler(self) -> bool {
        matches!(self, Self::Host | Self::Joiner)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => write!(f, "Host"),
            Self::Joiner => write!(f, "Joiner"),
            Self::Spectator => write!(f, "Spectator"),
        }
    }
}

// ---------------------------------------------------------------------------
// HandshakeState
// ---------------------------------------------------------------------------

/// ```text
/// AwaitingHandshake ──(response)──→ Established
///        │
///        └──(timeout)──→ Expired ──→ cleanup()
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Request sent or received, not yet completed. `since` is when the
    /// session was created.
    AwaitingHandshake { since: Instant },
    Established,
    /// Timed out; removed by the next cleanup.
    Expired,
}

// ---------------------------------------------------------------------------
// PeerSession
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PeerSession {
    pub addr: SocketAddr,

    /// The remote peer's role.
    pub role: Role,

    /// Highest inbound sequence number accepted from this peer.
    pub sequence_counter: u64,

    /// The shared seed, once the handshake produced one.
    pub handshake_seed: Option<u64>,

    /// Set once a battle with this peer has started.
    pub battle_id: Option<u64>,

    pub state: HandshakeState,

    recent: VecDeque<u64>,
}

impl PeerSession {
    pub(crate) fn new(addr: SocketAddr, role: Role) -> Self {
        Self {
            addr,
            role,
            sequence_counter: 0,
            handshake_seed: None,
            battle_id: None,
            state: HandshakeState::AwaitingHandshake {
                since: Instant::now(),
            },
            recent: VecDeque::new(),
        }
    }

    pub fn is_established(&self) -> bool {
        matches!(self.state, HandshakeState::Established)
    }

    /// Records an inbound sequence number. Returns `false` if it was
    /// already seen (or is too old to tell), meaning the message is a
    /// duplicate and must not be processed again.
    pub(crate) fn accept_sequence(&mut self, seq: u64, window: usize) -> bool {
        if self.recent.contains(&seq) {
            return false;
        }
        let window = window.max(1);
        if self.recent.len() >= window {
            if let Some(oldest) = self.recent.iter().min() {
                if seq < *oldest {
                    return false;
                }
            }
        }

        self.recent.push_back(seq);
        while self.recent.len() > window {
            self.recent.pop_front();
        }
        self.sequence_counter = self.sequence_counter.max(seq);
        true
    }
}
