//! Peer session tracking for Pokelink.
//!
//! Every remote address this node talks to gets one [`PeerSession`]:
//!
//! 1. **Handshake**: a session starts out awaiting its handshake and
//!    becomes established once a seed has been agreed
//!    ([`SessionRegistry::seed_for`], [`SessionRegistry::establish`]).
//! 2. **Duplicate suppression**: the reliable transport delivers at least
//!    once, so the same sequence number can arrive twice.
//!    [`SessionRegistry::accept_sequence`] says which copy is new.
//! 3. **Expiry**: handshakes that never complete are swept away
//!    ([`SessionRegistry::expire_stale`]).
//!
//! # How it fits in the stack
//!
//! ```text
//! Battle Layer (above)  ← owns the registry, decides what a message means
//!     ↕
//! Session Layer (this crate)  ← who is who, and what was already seen
//! ```

mod error;
mod registry;
mod session;

pub use error::SessionError;
pub use registry::SessionRegistry;
pub use session::{HandshakeState, PeerSession, Role, SessionConfig};
