//! Unified error type for Pokelink.

use pokelink_battle::BattleError;
use pokelink_protocol::ProtocolError;
use pokelink_session::SessionError;
use pokelink_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `pokelink` meta-crate you deal with this single error
/// type instead of importing one from each layer. The `#[from]` attribute
/// on each variant generates the `From` impls, so `?` converts layer
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum PokelinkError {
    /// Socket binding, sending, or a delivery that was never acknowledged.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A message that could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Session bookkeeping (unknown peer, expired handshake).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The battle state machine refused an operation.
    #[error(transparent)]
    Battle(#[from] BattleError),
}
