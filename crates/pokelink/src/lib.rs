//! # Pokelink
//!
//! Peer-to-peer turn-based battles over UDP.
//!
//! Two peers (a Host and a Joiner) agree on a seed, pick their combatants
//! and then take turns: the turn owner computes each attack, the defender
//! recomputes it independently, and the turn only passes once both agree.
//! Any number of Spectators can watch through the Host.
//!
//! The layers, each its own crate:
//!
//! | Layer | Crate | Job |
//! |---|---|---|
//! | Codec | `pokelink-protocol` | `key: value` lines ↔ typed messages |
//! | Transport | `pokelink-transport` | sequence numbers, ACKs, retransmission |
//! | Engine | `pokelink-engine` | type chart, moves, damage |
//! | Sessions | `pokelink-session` | who is who, duplicate suppression |
//! | Battle | `pokelink-battle` | the turn protocol, as an actor |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pokelink::prelude::*;
//!
//! # async fn run() -> Result<(), PokelinkError> {
//! pokelink::init_tracing();
//!
//! let host = PeerBuilder::new(Role::Host).build().await?;
//! let joiner = PeerBuilder::new(Role::Joiner).build().await?;
//!
//! let host_addr = "127.0.0.1:9002".parse().unwrap();
//! joiner.handle().connect(host_addr).await?;
//! host.handle().setup("Pikachu", StatBoosts::default(), CommunicationMode::P2P).await?;
//! joiner.handle().setup("Squirtle", StatBoosts::default(), CommunicationMode::P2P).await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod node;

pub use error::PokelinkError;
pub use node::{Peer, PeerBuilder, PokelinkConfig};

pub use pokelink_battle as battle;
pub use pokelink_engine as engine;
pub use pokelink_protocol as protocol;
pub use pokelink_session as session;
pub use pokelink_transport as transport;

/// Installs a `tracing` subscriber that prints to stderr.
///
/// The filter comes from `RUST_LOG` and defaults to `info`. Calling this
/// more than once is harmless; only the first call installs anything.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// The types most programs need.
pub mod prelude {
    pub use crate::{Peer, PeerBuilder, PokelinkConfig, PokelinkError};
    pub use pokelink_battle::{
        BattleError, PeerConfig, PeerEvent, PeerHandle, PeerStatus, Phase, DEFAULT_HOST_PORT,
    };
    pub use pokelink_engine::{Combatant, Entity, Roster, StatBoosts, StaticRoster, Type};
    pub use pokelink_protocol::{ChatContent, ChatMessage, CommunicationMode};
    pub use pokelink_session::{Role, SessionConfig};
    pub use pokelink_transport::{MemoryNetwork, TransportConfig};
}
