//! Damage engine properties, exercised through the public API.

use pokelink_engine::{
    resolve_attack, Combatant, Entity, MoveCategory, Roster, StatBoosts, StaticRoster, Type, MOVES,
};

fn entity(name: &str, hp: u32, atk: u32, def: u32, type1: Type, type2: Option<Type>) -> Entity {
    Entity {
        name: name.into(),
        max_hp: hp,
        attack: atk,
        defense: def,
        special_attack: atk,
        special_defense: def,
        type1,
        type2,
    }
}

// =========================================================================
// Worked examples
// =========================================================================

#[test]
fn test_resolve_attack_neutral_physical_hit_deals_80() {
    let mut attacker = Combatant::from_entity(
        &entity("Eevee", 100, 50, 30, Type::Normal, None),
        StatBoosts::default(),
    );
    let mut defender = Combatant::from_entity(
        &entity("Ditto", 200, 40, 25, Type::Normal, None),
        StatBoosts::default(),
    );

    let outcome = resolve_attack(&mut attacker, &mut defender, "Tackle");

    assert_eq!(outcome.effectiveness, 1.0);
    assert_eq!(outcome.damage, 80);
    assert_eq!(outcome.defender_hp, 120);
    assert!(!outcome.fainted);
}

#[test]
fn test_resolve_attack_overkill_clamps_to_zero_and_faints() {
    let mut attacker = Combatant::from_entity(
        &entity("Eevee", 100, 50, 30, Type::Normal, None),
        StatBoosts::default(),
    );
    let mut defender = Combatant::from_entity(
        &entity("Ditto", 200, 40, 25, Type::Normal, None),
        StatBoosts::default(),
    );
    defender.current_hp = 10;

    let outcome = resolve_attack(&mut attacker, &mut defender, "Tackle");

    assert_eq!(outcome.damage, 80);
    assert_eq!(defender.current_hp, 0);
    assert_eq!(outcome.defender_hp, 0);
    assert!(outcome.fainted);
    assert!(outcome.message.ends_with("Ditto fainted!"));
}

#[test]
fn test_resolve_attack_into_immunity_deals_one() {
    let mut attacker = Combatant::from_entity(
        &entity("Snorlax", 160, 110, 65, Type::Normal, None),
        StatBoosts::default(),
    );
    let mut defender = Combatant::from_entity(
        &entity("Gengar", 60, 65, 60, Type::Ghost, Some(Type::Poison)),
        StatBoosts::default(),
    );

    let outcome = resolve_attack(&mut attacker, &mut defender, "Body Slam");

    assert_eq!(outcome.effectiveness, 0.0);
    assert_eq!(outcome.damage, 1);
    assert_eq!(defender.current_hp, 59);
}

// =========================================================================
// Properties
// =========================================================================

#[test]
fn test_every_damaging_move_deals_at_least_one_against_every_type() {
    let attacker_entity = entity("Tester", 100, 1, 1, Type::Normal, None);
    for defending in Type::ALL {
        for mv in MOVES.iter().filter(|m| m.category != MoveCategory::Heal) {
            let mut attacker = Combatant::from_entity(&attacker_entity, StatBoosts::default());
            let mut defender = Combatant::from_entity(
                &entity("Wall", 10_000, 1, 999, defending, None),
                StatBoosts::default(),
            );
            let outcome = resolve_attack(&mut attacker, &mut defender, mv.name);
            assert!(
                outcome.damage >= 1,
                "{} into {defending} dealt {}",
                mv.name,
                outcome.damage
            );
        }
    }
}

#[test]
fn test_repeated_attacks_keep_hp_in_bounds_and_uses_non_negative() {
    let roster = StaticRoster::builtin();
    let mut a = Combatant::from_entity(&roster.get_entity("Gengar").unwrap(), StatBoosts::default());
    let mut b = Combatant::from_entity(&roster.get_entity("Snorlax").unwrap(), StatBoosts::default());
    let moves = ["Shadow Ball", "Recover", "Body Slam", "Recover", "Surf", "Nonsense"];

    for (turn, mv) in moves.iter().cycle().take(60).enumerate() {
        let (attacker, defender) = if turn % 2 == 0 {
            (&mut a, &mut b)
        } else {
            (&mut b, &mut a)
        };
        let outcome = resolve_attack(attacker, defender, mv);

        for c in [&a, &b] {
            assert!(c.current_hp <= c.max_hp, "{} above max hp", c.name);
        }
        assert_eq!(outcome.fainted, outcome.defender_hp == 0);
        if a.is_fainted() || b.is_fainted() {
            break;
        }
    }

    // Uses are u32, so "never negative" means they bottomed out at zero
    // instead of wrapping.
    assert!(a.special_attack_uses <= 5 && a.special_defense_uses <= 5);
    assert!(b.special_attack_uses <= 5 && b.special_defense_uses <= 5);
}

#[test]
fn test_resolve_attack_is_deterministic_across_copies() {
    let roster = StaticRoster::builtin();
    let attacker = Combatant::from_entity(&roster.get_entity("Pikachu").unwrap(), StatBoosts::default());
    let defender = Combatant::from_entity(&roster.get_entity("Squirtle").unwrap(), StatBoosts::default());

    let (mut a1, mut d1) = (attacker.clone(), defender.clone());
    let (mut a2, mut d2) = (attacker, defender);

    let first = resolve_attack(&mut a1, &mut d1, "Thunderbolt");
    let second = resolve_attack(&mut a2, &mut d2, "thunderbolt");

    assert_eq!(first, second);
    assert_eq!((a1, d1), (a2, d2));
}
