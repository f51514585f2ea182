//! Turn synchronization for Pokelink.
//!
//! This crate is where two independent peers agree on one battle. Each
//! peer runs a [`spawn_peer`] actor that owns its sessions and its copy of
//! the [`BattleState`], and drives the protocol one message at a time:
//!
//! ```text
//! Host                                  Joiner
//!  │ ←──────── HANDSHAKE_REQUEST ──────── │
//!  │ ──── HANDSHAKE_RESPONSE{seed} ─────→ │
//!  │ ⇄──────────── BATTLE_SETUP ────────⇄ │
//!  │ ──────── ATTACK_ANNOUNCE ──────────→ │   turn owner announces
//!  │ ←─────── DEFENSE_ANNOUNCE ────────── │
//!  │ ──────── CALCULATION_REPORT ───────→ │   owner computes
//!  │ ←─────── CALCULATION_CONFIRM ─────── │   defender recomputes, agrees
//!  │              ... turn passes ...     │
//!  │ ──────────── GAME_OVER ────────────→ │
//! ```
//!
//! Spectators register with SPECTATOR_REQUEST. When the Host's setup chose
//! [`CommunicationMode::Broadcast`](pokelink_protocol::CommunicationMode)
//! they receive its relays of announcements, reports, game over and chat.
//! Under P2P they hear nothing of the battle.
//!
//! # Key types
//!
//! - [`PeerHandle`]: the operator's way in (`connect`, `setup`, `attack`, ...).
//! - [`PeerEvent`]: what the operator hears back.
//! - [`BattleState`] and [`Phase`]: the battle itself, free of any I/O.
//! - [`BattleError`]: what can go wrong.

mod actor;
mod config;
mod error;
mod event;
mod handle;
mod state;

pub use actor::{spawn_peer, SYSTEM_SENDER};
pub use config::{PeerConfig, Phase, DEFAULT_HOST_PORT};
pub use error::BattleError;
pub use event::{PeerEvent, PeerStatus};
pub use handle::PeerHandle;
pub use state::{BattleState, Resolution, Side};
