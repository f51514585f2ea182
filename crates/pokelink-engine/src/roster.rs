//! Looking up entities by name.

use std::collections::HashMap;

use crate::{Entity, Type};

/// Where battle peers find the stats for a named entity.
///
/// Both peers must resolve the same name to the same stats, or their
/// damage calculations will disagree.
pub trait Roster: Send + Sync + 'static {
    /// Case-insensitive lookup.
    fn get_entity(&self, name: &str) -> Option<Entity>;
}

/// An in-memory roster keyed by lower-cased name.
#[derive(Debug, Clone, Default)]
pub struct StaticRoster {
    entities: HashMap<String, Entity>,
}

impl StaticRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an entity.
    pub fn insert(&mut self, entity: Entity) {
        self.entities.insert(entity.name.to_lowercase(), entity);
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// A small built-in roster with classic base stats.
    pub fn builtin() -> Self {
        use Type::*;
        let rows: [(&str, u32, u32, u32, u32, u32, Type, Option<Type>); 12] = [
            ("Pikachu", 35, 55, 40, 50, 50, Electric, None),
            ("Charmander", 39, 52, 43, 60, 50, Fire, None),
            ("Squirtle", 44, 48, 65, 50, 64, Water, None),
            ("Bulbasaur", 45, 49, 49, 65, 65, Grass, Some(Poison)),
            ("Gengar", 60, 65, 60, 130, 75, Ghost, Some(Poison)),
            ("Snorlax", 160, 110, 65, 65, 110, Normal, None),
            ("Onix", 35, 45, 160, 30, 45, Rock, Some(Ground)),
            ("Pidgeot", 83, 80, 75, 70, 70, Normal, Some(Flying)),
            ("Eevee", 55, 55, 50, 45, 65, Normal, None),
            ("Jigglypuff", 115, 45, 20, 45, 25, Normal, Some(Fairy)),
            ("Machop", 70, 80, 50, 35, 35, Fighting, None),
            ("Dragonite", 91, 134, 95, 100, 100, Dragon, Some(Flying)),
        ];
        rows.into_iter()
            .map(|(name, hp, atk, def, spa, spd, t1, t2)| Entity {
                name: name.to_string(),
                max_hp: hp,
                attack: atk,
                defense: def,
                special_attack: spa,
                special_defense: spd,
                type1: t1,
                type2: t2,
            })
            .collect()
    }
}

impl FromIterator<Entity> for StaticRoster {
    fn from_iter<I: IntoIterator<Item = Entity>>(iter: I) -> Self {
        let mut roster = Self::new();
        for entity in iter {
            roster.insert(entity);
        }
        roster
    }
}

impl Roster for StaticRoster {
    fn get_entity(&self, name: &str) -> Option<Entity> {
        self.entities.get(&name.trim().to_lowercase()).cloned()
    }
}
