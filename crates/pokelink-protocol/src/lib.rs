//! Wire protocol for Pokelink.
//!
//! This crate defines the "language" that battling peers speak:
//!
//! - **Values** ([`Value`], [`Document`]): the loosely typed `key: value`
//!   fields that travel on the wire, including nested sub-documents.
//! - **Types** ([`Envelope`], [`Message`], payload structs): the typed view
//!   of a message, validated when it is decoded.
//! - **Codec** ([`Codec`] trait, [`LineCodec`]): how envelopes and ACK
//!   frames are converted to/from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! The protocol layer sits below the reliable transport. It doesn't know
//! about sockets, retries, or battles; it only knows how to serialize and
//! deserialize messages.
//!
//! ```text
//! Datagram (bytes) → Protocol (Packet / Envelope) → State machine
//! ```
//!
//! # Wire format
//!
//! ```text
//! message_type: ATTACK_ANNOUNCE
//! move_name: Thunderbolt
//! sequence_number: 7
//! ```
//!
//! An acknowledgment is a single reserved line, `ACK:7`.

mod codec;
mod error;
mod types;
mod value;

pub use codec::{decode_document, Codec, LineCodec, Packet, ACK_PREFIX};
pub use error::ProtocolError;
pub use types::{
    BattleSetup, CalculationReport, ChatContent, ChatMessage,
    CommunicationMode, Envelope, Message, ResolutionRequest,
};
pub use types::{
    ATTACK_ANNOUNCE, BATTLE_SETUP, CALCULATION_CONFIRM, CALCULATION_REPORT,
    CHAT_MESSAGE, DEFENSE_ANNOUNCE, GAME_OVER, HANDSHAKE_REQUEST,
    HANDSHAKE_RESPONSE, RESOLUTION_REQUEST, SPECTATOR_REQUEST,
    SPECTATOR_RESPONSE,
};
pub use value::{Document, Value};
