//! Error types for the battle layer.

use pokelink_session::{Role, SessionError};
use pokelink_transport::TransportError;

use crate::Phase;

/// Errors that can occur while running a battle.
///
/// Errors from inbound messages never reach the operator; the actor logs
/// them with the source address and drops the message. Errors from
/// operator calls are returned to the caller.
#[derive(Debug, thiserror::Error)]
pub enum BattleError {
    /// The message kind is not one this peer understands.
    #[error("unknown message type `{0}`")]
    UnknownMessageType(String),

    /// A known message arrived in a phase where it makes no sense, such as
    /// a CALCULATION_REPORT while nobody has attacked.
    #[error("unexpected {message_type} in phase {phase}")]
    UnexpectedStateTransition { message_type: String, phase: Phase },

    /// The roster has no entity by this name.
    #[error("unknown entity `{0}`")]
    UnknownEntity(String),

    /// The operator tried to attack out of turn.
    #[error("not your turn")]
    NotYourTurn,

    /// There is no battle (or no peer) for this operation.
    #[error("no active battle")]
    NoBattle,

    /// The operation doesn't apply to this peer's role, such as a Host
    /// calling `connect`.
    #[error("{operation} is not available to a {role}")]
    WrongRole { operation: &'static str, role: Role },

    /// The handshake was refused or never answered.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Session(#[from] SessionError),

    /// The peer actor has stopped.
    #[error("peer is unavailable")]
    Unavailable,
}
