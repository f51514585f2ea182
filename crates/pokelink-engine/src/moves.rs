//! The move table.
//!
//! Both peers must agree on every move's numbers, so the table is static and
//! compiled in. Lookup ignores ASCII case and surrounding whitespace.

use crate::Type;

/// How a move uses the attacker's stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveCategory {
    /// `attack` against `defense`.
    Physical,
    /// `special_attack` against `special_defense`, one special-attack use.
    Special,
    /// Restores the attacker's HP, one special-defense use. No damage.
    Heal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Move {
    pub name: &'static str,
    pub kind: Type,
    pub category: MoveCategory,
    pub power: u32,
}

/// What an unknown move, or a move that can't be used, resolves as.
pub const STRUGGLE: Move = Move {
    name: "Struggle",
    kind: Type::Normal,
    category: MoveCategory::Physical,
    power: 1,
};

const fn physical(name: &'static str, kind: Type, power: u32) -> Move {
    Move {
        name,
        kind,
        category: MoveCategory::Physical,
        power,
    }
}

const fn special(name: &'static str, kind: Type, power: u32) -> Move {
    Move {
        name,
        kind,
        category: MoveCategory::Special,
        power,
    }
}

const fn heal(name: &'static str, kind: Type) -> Move {
    Move {
        name,
        kind,
        category: MoveCategory::Heal,
        power: 0,
    }
}

pub static MOVES: &[Move] = &[
    STRUGGLE,
    physical("Tackle", Type::Normal, 40),
    physical("Scratch", Type::Normal, 40),
    physical("Quick Attack", Type::Normal, 40),
    physical("Body Slam", Type::Normal, 85),
    special("Ember", Type::Fire, 40),
    special("Flamethrower", Type::Fire, 90),
    physical("Fire Punch", Type::Fire, 75),
    special("Water Gun", Type::Water, 40),
    special("Surf", Type::Water, 90),
    physical("Waterfall", Type::Water, 80),
    special("Thunder Shock", Type::Electric, 40),
    special("Thunderbolt", Type::Electric, 90),
    physical("Thunder Punch", Type::Electric, 75),
    physical("Vine Whip", Type::Grass, 45),
    physical("Razor Leaf", Type::Grass, 55),
    special("Energy Ball", Type::Grass, 90),
    special("Ice Beam", Type::Ice, 90),
    physical("Karate Chop", Type::Fighting, 50),
    special("Sludge Bomb", Type::Poison, 90),
    physical("Earthquake", Type::Ground, 100),
    physical("Wing Attack", Type::Flying, 60),
    special("Psychic", Type::Psychic, 90),
    physical("Bug Bite", Type::Bug, 60),
    physical("Rock Slide", Type::Rock, 75),
    physical("Lick", Type::Ghost, 30),
    special("Shadow Ball", Type::Ghost, 80),
    physical("Dragon Claw", Type::Dragon, 80),
    physical("Bite", Type::Dark, 60),
    physical("Iron Tail", Type::Steel, 100),
    special("Moonblast", Type::Fairy, 95),
    heal("Recover", Type::Normal),
    heal("Synthesis", Type::Grass),
];

/// Finds a move by name.
pub fn lookup_move(name: &str) -> Option<&'static Move> {
    let name = name.trim();
    MOVES.iter().find(|m| m.name.eq_ignore_ascii_case(name))
}
