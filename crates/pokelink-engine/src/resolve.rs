//! Attack resolution.
//!
//! Both peers run [`resolve_attack`] on their own copy of the battle and
//! compare the results, so it must be a pure function of its inputs: no
//! randomness, no clock, and the same float operations in the same order
//! everywhere.

use crate::moves::{lookup_move, Move, MoveCategory, STRUGGLE};
use crate::Combatant;

/// Everything a resolved move changed, plus a line of narration.
#[derive(Debug, Clone, PartialEq)]
pub struct AttackOutcome {
    /// The move that was actually resolved.
    pub move_used: &'static str,
    /// `true` if the requested move was unknown or unusable and
    /// [`STRUGGLE`] was resolved instead.
    pub fallback: bool,
    pub damage: u32,
    pub healed: u32,
    pub effectiveness: f64,
    pub attacker_hp: u32,
    pub defender_hp: u32,
    /// The defender reached 0 HP.
    pub fainted: bool,
    pub message: String,
}

/// Resolves one move by `attacker` against `defender`, mutating both.
///
/// - **Physical**: `attack` vs `defense`.
/// - **Special**: `special_attack` vs `special_defense`, spending one
///   special-attack use. With none left the move still lands, but with the
///   physical stat pair.
/// - **Heal**: restores `min(special_defense, missing HP)` and spends one
///   special-defense use. With none left it resolves as [`STRUGGLE`].
///
/// Damage is `max(1, floor(atk / max(1, def) * power * effectiveness))`,
/// so a damaging move always does at least 1, even into an immunity.
pub fn resolve_attack(
    attacker: &mut Combatant,
    defender: &mut Combatant,
    move_name: &str,
) -> AttackOutcome {
    let (mv, fallback) = match lookup_move(move_name) {
        Some(mv) => (mv, false),
        None => {
            tracing::debug!(move_name, "unknown move, resolving as Struggle");
            (&STRUGGLE, true)
        }
    };

    if mv.category == MoveCategory::Heal {
        if attacker.special_defense_uses > 0 {
            return heal(attacker, defender, mv);
        }
        tracing::debug!(move_name, "no special defense uses left, resolving as Struggle");
        return strike(attacker, defender, &STRUGGLE, true);
    }

    strike(attacker, defender, mv, fallback)
}

fn heal(attacker: &mut Combatant, defender: &Combatant, mv: &'static Move) -> AttackOutcome {
    let missing = attacker.max_hp.saturating_sub(attacker.current_hp);
    let healed = attacker.special_defense.min(missing);
    attacker.current_hp += healed;
    attacker.special_defense_uses -= 1;

    AttackOutcome {
        move_used: mv.name,
        fallback: false,
        damage: 0,
        healed,
        effectiveness: 1.0,
        attacker_hp: attacker.current_hp,
        defender_hp: defender.current_hp,
        fainted: defender.is_fainted(),
        message: format!("{} used {}! It restored {healed} HP.", attacker.name, mv.name),
    }
}

fn strike(
    attacker: &mut Combatant,
    defender: &mut Combatant,
    mv: &'static Move,
    fallback: bool,
) -> AttackOutcome {
    let (atk, def) = if mv.category == MoveCategory::Special && attacker.special_attack_uses > 0 {
        attacker.special_attack_uses -= 1;
        (attacker.special_attack, defender.special_defense)
    } else {
        (attacker.attack, defender.defense)
    };

    let effectiveness = mv.kind.effectiveness_against(&defender.types());
    let damage = compute_damage(atk, def, mv.power, effectiveness);
    defender.current_hp = defender.current_hp.saturating_sub(damage);

    let mut message = format!("{} used {}!", attacker.name, mv.name);
    if effectiveness == 0.0 {
        message.push_str(&format!(" It barely affected {}...", defender.name));
    } else if effectiveness > 1.0 {
        message.push_str(" It's super effective!");
    } else if effectiveness < 1.0 {
        message.push_str(" It's not very effective...");
    }
    if defender.is_fainted() {
        message.push_str(&format!(" {} fainted!", defender.name));
    }

    AttackOutcome {
        move_used: mv.name,
        fallback,
        damage,
        healed: 0,
        effectiveness,
        attacker_hp: attacker.current_hp,
        defender_hp: defender.current_hp,
        fainted: defender.is_fainted(),
        message,
    }
}

/// The damage formula on its own.
pub fn compute_damage(attack: u32, defense: u32, power: u32, effectiveness: f64) -> u32 {
    let ratio = f64::from(attack) / f64::from(defense.max(1));
    let raw = (ratio * f64::from(power) * effectiveness).floor();
    // `as` saturates, so absurd stats can't wrap.
    (raw as u32).max(1)
}
