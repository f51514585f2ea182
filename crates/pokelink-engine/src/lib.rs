//! Battle engine for Pokelink.
//!
//! Pure game rules with no I/O:
//!
//! - [`Type`] and [`TYPE_CHART`]: the 18 elemental types and how they
//!   multiply damage against each other.
//! - [`Move`] and [`lookup_move`]: the static move table.
//! - [`Entity`], [`Combatant`], [`StatBoosts`]: a species' stats and its
//!   live state in a battle.
//! - [`resolve_attack`]: applies one move and reports what happened.
//! - [`Roster`]: where entities are looked up by name.
//!
//! Every peer must compute exactly the same numbers, so nothing here uses
//! randomness or the clock.

mod combatant;
mod moves;
mod resolve;
mod roster;
mod types;

pub use combatant::{Combatant, Entity, StatBoosts};
pub use moves::{lookup_move, Move, MoveCategory, MOVES, STRUGGLE};
pub use resolve::{compute_damage, resolve_attack, AttackOutcome};
pub use roster::{Roster, StaticRoster};
pub use types::{Type, TYPE_CHART};
