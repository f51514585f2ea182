//! Roster entries and their in-battle state.

use serde::{Deserialize, Serialize};

use crate::Type;

/// Static data for one species, as found in a roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub max_hp: u32,
    pub attack: u32,
    pub defense: u32,
    pub special_attack: u32,
    pub special_defense: u32,
    pub type1: Type,
    #[serde(default)]
    pub type2: Option<Type>,
}

/// How many special moves a battler may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatBoosts {
    pub special_attack_uses: u32,
    pub special_defense_uses: u32,
}

impl Default for StatBoosts {
    fn default() -> Self {
        Self {
            special_attack_uses: 5,
            special_defense_uses: 5,
        }
    }
}

/// An entity in a battle: its stats plus the resources it spends.
///
/// `current_hp` is always within `0..=max_hp`; the engine clamps every
/// change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Combatant {
    pub name: String,
    pub max_hp: u32,
    pub current_hp: u32,
    pub attack: u32,
    pub defense: u32,
    pub special_attack: u32,
    pub special_defense: u32,
    pub type1: Type,
    pub type2: Option<Type>,
    pub special_attack_uses: u32,
    pub special_defense_uses: u32,
}

impl Combatant {
    /// Creates a combatant at full health.
    pub fn from_entity(entity: &Entity, boosts: StatBoosts) -> Self {
        Self {
            name: entity.name.clone(),
            max_hp: entity.max_hp,
            current_hp: entity.max_hp,
            attack: entity.attack,
            defense: entity.defense,
            special_attack: entity.special_attack,
            special_defense: entity.special_defense,
            type1: entity.type1,
            type2: entity.type2,
            special_attack_uses: boosts.special_attack_uses,
            special_defense_uses: boosts.special_defense_uses,
        }
    }

    /// The combatant's one or two types.
    pub fn types(&self) -> Vec<Type> {
        std::iter::once(self.type1).chain(self.type2).collect()
    }

    pub fn is_fainted(&self) -> bool {
        self.current_hp == 0
    }
}
