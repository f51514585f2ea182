//! The battle itself: two combatants, whose turn it is, and the turn in
//! flight.
//!
//! `BattleState` knows nothing about the network. The actor drives it
//! through one turn at a time:
//!
//! ```text
//! owner:    begin_attack() ─────────────→ preview() → commit() ─→ finish_turn()
//! defender:       receive_attack() → preview() → commit() → finish_turn()
//! ```
//!
//! Both peers hold their own copy and must end every turn with identical
//! numbers. The engine is deterministic, so they do unless a message was
//! tampered with or a peer runs a different rule set.

use pokelink_engine::{resolve_attack, AttackOutcome, Combatant};
use pokelink_protocol::{CalculationReport, ResolutionRequest};
use pokelink_session::Role;
use serde::{Deserialize, Serialize};

use crate::Phase;

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

/// One half of a battle. The Host's combatant is always `A`, and `A`
/// moves first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
}

impl Side {
    /// The side a battler plays. Spectators have none.
    pub fn of(role: Role) -> Option<Self> {
        match role {
            Role::Host => Some(Self::A),
            Role::Joiner => Some(Self::B),
            Role::Spectator => None,
        }
    }

    pub fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }

    fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// A computed turn that has not been applied yet.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub outcome: AttackOutcome,
    after: [Combatant; 2],
}

impl Resolution {
    /// The report the attacker sends for this outcome.
    pub fn report(&self, attacker: &str) -> CalculationReport {
        CalculationReport {
            attacker: attacker.to_string(),
            move_used: self.outcome.move_used.to_string(),
            remaining_health: Some(self.outcome.attacker_hp),
            damage_dealt: self.outcome.damage,
            defender_hp_remaining: self.outcome.defender_hp,
            status_message: Some(self.outcome.message.clone()),
        }
    }

    /// The defender's own figures, sent when they disagree with a report.
    pub fn resolution_request(&self, attacker: &str) -> ResolutionRequest {
        ResolutionRequest {
            attacker: attacker.to_string(),
            move_used: self.outcome.move_used.to_string(),
            damage_dealt: self.outcome.damage,
            defender_hp_remaining: self.outcome.defender_hp,
            remaining_health: Some(self.outcome.attacker_hp),
        }
    }

    /// `true` if a peer's report has the same numbers.
    ///
    /// `remaining_health` is optional on the wire and only compared when
    /// present.
    pub fn agrees_with_report(&self, report: &CalculationReport) -> bool {
        figures_match(
            &self.outcome,
            report.damage_dealt,
            report.defender_hp_remaining,
            report.remaining_health,
        )
    }
}

fn figures_match(
    outcome: &AttackOutcome,
    damage: u32,
    defender_hp: u32,
    attacker_hp: Option<u32>,
) -> bool {
    outcome.damage == damage
        && outcome.defender_hp == defender_hp
        && attacker_hp.is_none_or(|hp| hp == outcome.attacker_hp)
}

// ---------------------------------------------------------------------------
// BattleState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct PendingTurn {
    move_name: String,
    outcome: Option<AttackOutcome>,
}

/// One battle between side A (Host) and side B (Joiner).
///
/// Invariants:
/// - every combatant's HP stays within `0..=max_hp`;
/// - `turn_owner` flips exactly once per finished turn;
/// - once the phase is terminal nothing changes any more.
#[derive(Debug, Clone)]
pub struct BattleState {
    combatants: [Combatant; 2],
    turn_owner: Side,
    turn_count: u32,
    phase: Phase,
    winner: Option<Side>,
    pending: Option<PendingTurn>,
    seed: u64,
}

impl BattleState {
    /// Starts a battle in `Ready` with side A to move.
    pub fn new(a: Combatant, b: Combatant, seed: u64) -> Self {
        Self {
            combatants: [a, b],
            turn_owner: Side::A,
            turn_count: 0,
            phase: Phase::Ready,
            winner: None,
            pending: None,
            seed,
        }
    }

    pub fn combatant(&self, side: Side) -> &Combatant {
        &self.combatants[side.index()]
    }

    pub fn turn_owner(&self) -> Side {
        self.turn_owner
    }

    /// Number of finished turns.
    pub fn turn_count(&self) -> u32 {
        self.turn_count
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Set once the battle is over and the winning side is known.
    pub fn winner(&self) -> Option<Side> {
        self.winner
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// The resolved outcome of the turn in flight, once committed.
    pub fn pending_outcome(&self) -> Option<&AttackOutcome> {
        self.pending.as_ref().and_then(|turn| turn.outcome.as_ref())
    }

    /// Turn owner: whether the defender's resolution request has the same
    /// numbers as the committed outcome. `None` until a turn is committed.
    ///
    /// `remaining_health` is only compared when the request carries it.
    pub fn agrees_with_request(&self, request: &ResolutionRequest) -> Option<bool> {
        self.pending_outcome().map(|outcome| {
            figures_match(
                outcome,
                request.damage_dealt,
                request.defender_hp_remaining,
                request.remaining_health,
            )
        })
    }

    /// Turn owner: the attack has been announced. `Ready → AwaitingDefense`.
    pub fn begin_attack(&mut self, move_name: &str) {
        self.start_turn(move_name, Phase::AwaitingDefense);
    }

    /// Defender: the opponent announced an attack. `Ready → Resolving`.
    pub fn receive_attack(&mut self, move_name: &str) {
        self.start_turn(move_name, Phase::Resolving);
    }

    fn start_turn(&mut self, move_name: &str, phase: Phase) {
        self.pending = Some(PendingTurn {
            move_name: move_name.to_string(),
            outcome: None,
        });
        self.phase = phase;
    }

    /// Computes the pending move on copies of both combatants.
    ///
    /// Returns `None` when no turn is in flight.
    pub fn preview(&self) -> Option<Resolution> {
        let turn = self.pending.as_ref()?;
        let mut after = self.combatants.clone();
        let (first, second) = after.split_at_mut(1);
        let (attacker, defender) = match self.turn_owner {
            Side::A => (&mut first[0], &mut second[0]),
            Side::B => (&mut second[0], &mut first[0]),
        };
        let outcome = resolve_attack(attacker, defender, &turn.move_name);
        Some(Resolution { outcome, after })
    }

    /// Applies a previewed resolution and moves to `Resolving`.
    pub fn commit(&mut self, resolution: Resolution) {
        self.combatants = resolution.after;
        if let Some(turn) = self.pending.as_mut() {
            turn.outcome = Some(resolution.outcome);
        }
        self.phase = Phase::Resolving;
    }

    /// Closes the turn in flight.
    ///
    /// If the defender fainted the battle moves to `GameOver` with the turn
    /// owner as winner and `true` is returned. Otherwise the turn passes to
    /// the other side and the phase goes back to `Ready`.
    pub fn finish_turn(&mut self) -> bool {
        self.pending = None;
        if self.combatant(self.turn_owner.other()).is_fainted() {
            self.phase = Phase::GameOver;
            self.winner = Some(self.turn_owner);
            return true;
        }
        self.turn_owner = self.turn_owner.other();
        self.turn_count += 1;
        self.phase = Phase::Ready;
        false
    }

    /// Ends the battle on the opponent's word.
    ///
    /// The winner is the side whose combatant is named `winner` facing one
    /// named `loser`. In a mirror match both sides fit and the turn owner,
    /// who announces the result, is taken. Names that fit neither side
    /// leave the winner unset.
    pub fn declare_over(&mut self, winner: &str, loser: &str) {
        let named = |side: Side| {
            self.combatant(side).name == winner && self.combatant(side.other()).name == loser
        };
        let side = match (named(Side::A), named(Side::B)) {
            (true, false) => Some(Side::A),
            (false, true) => Some(Side::B),
            (true, true) => Some(self.turn_owner),
            (false, false) => None,
        };
        self.pending = None;
        self.phase = Phase::GameOver;
        self.winner = side;
    }

    /// Gives up on the battle.
    pub fn abandon(&mut self) {
        self.pending = None;
        self.phase = Phase::Abandoned;
    }
}

#[cfg(test)]
mod tests {
    use pokelink_engine::{Entity, StatBoosts, Type};

    use super::*;

    fn combatant(name: &str, hp: u32, atk: u32, def: u32, kind: Type) -> Combatant {
        Combatant::from_entity(
            &Entity {
                name: name.into(),
                max_hp: hp,
                attack: atk,
                defense: def,
                special_attack: atk,
                special_defense: def,
                type1: kind,
                type2: None,
            },
            StatBoosts::default(),
        )
    }

    fn battle() -> BattleState {
        BattleState::new(
            combatant("Alpha", 200, 50, 25, Type::Normal),
            combatant("Beta", 200, 50, 25, Type::Normal),
            7,
        )
    }

    #[test]
    fn test_new_host_moves_first() {
        let state = battle();
        assert_eq!(state.turn_owner(), Side::A);
        assert_eq!(state.phase(), Phase::Ready);
        assert_eq!(state.turn_count(), 0);
        assert_eq!(state.seed(), 7);
    }

    #[test]
    fn test_side_of_role() {
        assert_eq!(Side::of(Role::Host), Some(Side::A));
        assert_eq!(Side::of(Role::Joiner), Some(Side::B));
        assert_eq!(Side::of(Role::Spectator), None);
    }

    #[test]
    fn test_preview_leaves_state_untouched() {
        let mut state = battle();
        state.begin_attack("Tackle");
        let resolution = state.preview().unwrap();

        assert_eq!(resolution.outcome.damage, 80);
        assert_eq!(state.combatant(Side::B).current_hp, 200);
        assert_eq!(state.phase(), Phase::AwaitingDefense);
    }

    #[test]
    fn test_preview_without_pending_turn_returns_none() {
        assert!(battle().preview().is_none());
    }

    #[test]
    fn test_commit_applies_damage_to_defender() {
        let mut state = battle();
        state.begin_attack("Tackle");
        let resolution = state.preview().unwrap();
        state.commit(resolution);

        assert_eq!(state.combatant(Side::B).current_hp, 120);
        assert_eq!(state.combatant(Side::A).current_hp, 200);
        assert_eq!(state.phase(), Phase::Resolving);
        assert_eq!(state.pending_outcome().unwrap().damage, 80);
    }

    #[test]
    fn test_finish_turn_flips_owner_and_counts() {
        let mut state = battle();
        state.begin_attack("Tackle");
        let resolution = state.preview().unwrap();
        state.commit(resolution);

        assert!(!state.finish_turn());
        assert_eq!(state.turn_owner(), Side::B);
        assert_eq!(state.turn_count(), 1);
        assert_eq!(state.phase(), Phase::Ready);
        assert!(state.preview().is_none());
    }

    #[test]
    fn test_side_b_attack_hits_side_a() {
        let mut state = battle();
        for _ in 0..2 {
            state.receive_attack("Tackle");
            let resolution = state.preview().unwrap();
            state.commit(resolution);
            state.finish_turn();
        }
        assert_eq!(state.combatant(Side::A).current_hp, 120);
        assert_eq!(state.combatant(Side::B).current_hp, 120);
        assert_eq!(state.turn_owner(), Side::A);
    }

    #[test]
    fn test_finish_turn_defender_fainted_ends_battle() {
        let mut state = BattleState::new(
            combatant("Alpha", 200, 50, 25, Type::Normal),
            combatant("Beta", 10, 50, 25, Type::Normal),
            1,
        );
        state.begin_attack("Tackle");
        let resolution = state.preview().unwrap();
        assert_eq!(resolution.outcome.damage, 80);
        assert!(resolution.outcome.fainted);
        state.commit(resolution);

        assert!(state.finish_turn());
        assert_eq!(state.phase(), Phase::GameOver);
        assert_eq!(state.winner(), Some(Side::A));
        assert_eq!(state.combatant(Side::B).current_hp, 0);
        assert_eq!(state.turn_owner(), Side::A);
    }

    #[test]
    fn test_agrees_with_report_compares_figures() {
        let mut state = battle();
        state.begin_attack("Tackle");
        let resolution = state.preview().unwrap();

        let mut report = resolution.report("Alpha");
        assert!(resolution.agrees_with_report(&report));

        report.remaining_health = None;
        assert!(resolution.agrees_with_report(&report));

        report.damage_dealt += 1;
        assert!(!resolution.agrees_with_report(&report));
    }

    #[test]
    fn test_agrees_with_request_compares_committed_figures() {
        let mut state = battle();
        state.begin_attack("Tackle");
        let resolution = state.preview().unwrap();
        let mut request = resolution.resolution_request("Alpha");
        assert_eq!(request.defender_hp_remaining, 120);
        assert_eq!(state.agrees_with_request(&request), None);

        state.commit(resolution);
        assert_eq!(state.agrees_with_request(&request), Some(true));

        request.remaining_health = None;
        assert_eq!(state.agrees_with_request(&request), Some(true));

        request.defender_hp_remaining = 0;
        assert_eq!(state.agrees_with_request(&request), Some(false));
    }

    #[test]
    fn test_declare_over_names_the_winning_side() {
        let mut state = battle();
        state.declare_over("Beta", "Alpha");
        assert_eq!(state.phase(), Phase::GameOver);
        assert_eq!(state.winner(), Some(Side::B));

        let mut state = battle();
        state.declare_over("Alpha", "Beta");
        assert_eq!(state.winner(), Some(Side::A));
    }

    #[test]
    fn test_declare_over_unknown_names_leave_no_winner() {
        let mut state = battle();
        state.begin_attack("Tackle");
        state.declare_over("Gamma", "Delta");
        assert_eq!(state.phase(), Phase::GameOver);
        assert_eq!(state.winner(), None);
        assert!(state.preview().is_none());
    }

    #[test]
    fn test_declare_over_mirror_match_takes_turn_owner() {
        let mut state = BattleState::new(
            combatant("Alpha", 200, 50, 25, Type::Normal),
            combatant("Alpha", 200, 50, 25, Type::Normal),
            3,
        );
        state.declare_over("Alpha", "Alpha");
        assert_eq!(state.winner(), Some(Side::A));
    }

    #[test]
    fn test_abandon_is_terminal() {
        let mut state = battle();
        state.begin_attack("Tackle");
        state.abandon();
        assert_eq!(state.phase(), Phase::Abandoned);
        assert!(state.phase().is_terminal());
        assert!(state.preview().is_none());
    }
}
