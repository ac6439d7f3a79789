//! Combat state machine: setup, initiative, turn order and rounds.
//!
//! `CombatState` owns every combatant in the encounter plus the grid they
//! stand on. The turn pointer and round counter are private; the only way
//! to move them is [`CombatState::advance_turn`].

use super::combatant::{Combatant, CombatantId, CombatantKind};
use super::resolver::{AttackOutcome, MoveOutcome};
use crate::config::EngineConfig;
use crate::dice::{self, D20Roll};
use crate::error::CombatError;
use crate::grid::{Grid, Position};
use crate::sync::{CombatPatch, SyncError};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Lifecycle of an encounter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Combatants are being added and placed.
    Setup,
    /// Initiative was entered by hand and awaits `begin`.
    InitiativeRolled,
    /// Turns are being taken.
    Active,
    /// Combat is over; the state is read-only.
    Ended,
}

/// One combatant's place in the turn order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiativeEntry {
    pub combatant_id: CombatantId,
    pub name: String,
    pub kind: CombatantKind,
    /// The raw d20.
    pub roll: u32,
    pub modifier: i32,
    pub total: i32,
}

/// What happened when the turn pointer moved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnChange {
    pub round: u32,
    pub turn_index: usize,
    pub current: CombatantId,
    pub current_name: String,
    /// True when this advance wrapped into a new round.
    pub new_round: bool,
    /// Status effects that wore off at the round boundary.
    #[serde(default)]
    pub expired_effects: Vec<(CombatantId, String)>,
}

/// Things worth recording in the combat log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CombatEvent {
    InitiativeRolled { order: Vec<InitiativeEntry> },
    TurnStarted { combatant: CombatantId, name: String },
    Moved(MoveOutcome),
    Attacked(AttackOutcome),
    Healed { combatant: CombatantId, amount: i32, hp: i32 },
    StatusExpired { combatant: CombatantId, effect: String },
    CombatEnded,
}

/// A log line stamped with the round it happened in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatLogEntry {
    pub round: u32,
    #[serde(flatten)]
    pub event: CombatEvent,
}

/// Complete state of one encounter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatState {
    phase: Phase,
    combatants: Vec<Combatant>,
    initiative_order: Vec<InitiativeEntry>,
    current_turn_index: usize,
    round: u32,
    grid: Grid,
    #[serde(default)]
    log: Vec<CombatLogEntry>,
}

impl CombatState {
    pub fn new(grid_width: u32, grid_height: u32) -> Self {
        Self {
            phase: Phase::Setup,
            combatants: Vec::new(),
            initiative_order: Vec::new(),
            current_turn_index: 0,
            round: 1,
            grid: Grid::new(grid_width, grid_height),
            log: Vec::new(),
        }
    }

    /// A state sized by the configured default grid.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.default_grid_width, config.default_grid_height)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn current_turn_index(&self) -> usize {
        self.current_turn_index
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn combatants(&self) -> &[Combatant] {
        &self.combatants
    }

    pub fn initiative_order(&self) -> &[InitiativeEntry] {
        &self.initiative_order
    }

    pub fn log(&self) -> &[CombatLogEntry] {
        &self.log
    }

    pub fn combatant(&self, id: CombatantId) -> Option<&Combatant> {
        self.combatants.iter().find(|c| c.id == id)
    }

    /// First combatant with this name, ignoring case.
    pub fn combatant_named(&self, name: &str) -> Option<&Combatant> {
        self.combatants
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub(crate) fn combatant_mut(
        &mut self,
        id: CombatantId,
    ) -> Result<&mut Combatant, CombatError> {
        self.combatants
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(CombatError::CombatantNotFound(id))
    }

    /// The combatant whose turn it is. `None` unless combat is active.
    pub fn current_combatant(&self) -> Option<&Combatant> {
        if self.phase != Phase::Active {
            return None;
        }
        let entry = self.initiative_order.get(self.current_turn_index)?;
        self.combatant(entry.combatant_id)
    }

    /// Living combatants on one side.
    pub fn living(&self, kind: CombatantKind) -> Vec<&Combatant> {
        self.combatants
            .iter()
            .filter(|c| c.kind == kind && c.is_alive())
            .collect()
    }

    /// True when a side has fighters and all of them are down.
    ///
    /// Combat never ends on its own; callers use this to decide when to
    /// call [`CombatState::end_combat`].
    pub fn is_side_defeated(&self, kind: CombatantKind) -> bool {
        let mut side = self.combatants.iter().filter(|c| c.kind == kind).peekable();
        side.peek().is_some() && side.all(|c| !c.is_alive())
    }

    pub(crate) fn ensure_active(&self) -> Result<(), CombatError> {
        match self.phase {
            Phase::Active => Ok(()),
            Phase::Ended => Err(CombatError::CombatEnded),
            Phase::Setup | Phase::InitiativeRolled => Err(CombatError::NoActiveCombat),
        }
    }

    fn ensure_not_ended(&self) -> Result<(), CombatError> {
        if self.phase == Phase::Ended {
            Err(CombatError::CombatEnded)
        } else {
            Ok(())
        }
    }

    fn ensure_setup(&self) -> Result<(), CombatError> {
        match self.phase {
            Phase::Setup => Ok(()),
            Phase::Ended => Err(CombatError::CombatEnded),
            Phase::InitiativeRolled | Phase::Active => Err(CombatError::AlreadyActive),
        }
    }

    pub(crate) fn record(&mut self, event: CombatEvent) {
        self.log.push(CombatLogEntry {
            round: self.round,
            event,
        });
    }

    /// Add a combatant during setup, placing it if it has a position.
    pub fn add_combatant(&mut self, combatant: Combatant) -> Result<CombatantId, CombatError> {
        self.ensure_setup()?;
        if self.combatant(combatant.id).is_some() {
            return Err(CombatError::InvalidTarget(format!(
                "{} is already in this combat",
                combatant.name
            )));
        }

        if let Some(pos) = combatant.position {
            self.grid.place(combatant.id, pos)?;
        }

        let id = combatant.id;
        self.combatants.push(combatant);
        Ok(id)
    }

    /// Put a combatant on a cell. Returns the cell it left, if any.
    pub fn place_combatant(
        &mut self,
        id: CombatantId,
        pos: Position,
    ) -> Result<Option<Position>, CombatError> {
        self.ensure_not_ended()?;
        if self.combatant(id).is_none() {
            return Err(CombatError::CombatantNotFound(id));
        }
        let previous = self.grid.place(id, pos)?;
        self.combatant_mut(id)?.position = Some(pos);
        Ok(previous)
    }

    /// Take a combatant off the board without removing it from combat.
    pub fn remove_from_grid(&mut self, id: CombatantId) -> Result<Option<Position>, CombatError> {
        self.ensure_not_ended()?;
        self.combatant_mut(id)?.position = None;
        Ok(self.grid.remove(id))
    }

    /// Roll `d20 + initiative modifier` for everyone and start combat.
    pub fn roll_initiative<R: Rng>(
        &mut self,
        rng: &mut R,
    ) -> Result<&[InitiativeEntry], CombatError> {
        self.ensure_setup()?;
        let rolls: HashMap<CombatantId, u32> = self
            .combatants
            .iter()
            .map(|c| (c.id, dice::d20(rng)))
            .collect();
        self.build_order(&rolls)?;
        self.start();
        Ok(&self.initiative_order)
    }

    /// Enter initiative from physical dice. Combat starts on [`begin`].
    ///
    /// Every roll must be a d20 face; anything else is
    /// [`DiceError::InvalidFace`](crate::dice::DiceError::InvalidFace).
    ///
    /// [`begin`]: CombatState::begin
    pub fn set_initiative(
        &mut self,
        rolls: &HashMap<CombatantId, u32>,
    ) -> Result<&[InitiativeEntry], CombatError> {
        self.ensure_setup()?;
        self.build_order(rolls)?;
        self.phase = Phase::InitiativeRolled;
        Ok(&self.initiative_order)
    }

    /// Start combat after [`set_initiative`].
    ///
    /// [`set_initiative`]: CombatState::set_initiative
    pub fn begin(&mut self) -> Result<(), CombatError> {
        match self.phase {
            Phase::InitiativeRolled => {
                self.start();
                Ok(())
            }
            Phase::Setup => Err(CombatError::NoActiveCombat),
            Phase::Active => Err(CombatError::AlreadyActive),
            Phase::Ended => Err(CombatError::CombatEnded),
        }
    }

    fn build_order(&mut self, rolls: &HashMap<CombatantId, u32>) -> Result<(), CombatError> {
        if self.combatants.is_empty() {
            return Err(CombatError::NoCombatants);
        }

        let mut order = Vec::with_capacity(self.combatants.len());
        for combatant in &self.combatants {
            let roll = *rolls
                .get(&combatant.id)
                .ok_or(CombatError::CombatantNotFound(combatant.id))?;
            let face = D20Roll::from_face(roll)?.natural;
            order.push(InitiativeEntry {
                combatant_id: combatant.id,
                name: combatant.name.clone(),
                kind: combatant.kind,
                roll: face,
                modifier: combatant.initiative_modifier,
                total: (face as i32).saturating_add(combatant.initiative_modifier),
            });
        }

        // Stable: equal totals keep the order combatants were added in.
        order.sort_by(|a, b| b.total.cmp(&a.total));
        self.initiative_order = order;
        Ok(())
    }

    fn start(&mut self) {
        self.phase = Phase::Active;
        self.current_turn_index = 0;
        self.round = 1;

        let order = self.initiative_order.clone();
        info!(
            combatants = order.len(),
            first = %order[0].name,
            "combat started"
        );
        self.record(CombatEvent::InitiativeRolled { order });
        let first = &self.initiative_order[0];
        let event = CombatEvent::TurnStarted {
            combatant: first.combatant_id,
            name: first.name.clone(),
        };
        self.record(event);
    }

    /// Move to the next combatant, wrapping into a new round.
    pub fn advance_turn(&mut self) -> Result<TurnChange, CombatError> {
        self.ensure_active()?;

        self.current_turn_index += 1;
        let new_round = self.current_turn_index >= self.initiative_order.len();
        let mut expired_effects = Vec::new();
        if new_round {
            self.current_turn_index = 0;
            self.round += 1;
            for combatant in &mut self.combatants {
                for effect in combatant.tick_status_effects() {
                    expired_effects.push((combatant.id, effect));
                }
            }
            for (combatant, effect) in expired_effects.clone() {
                self.record(CombatEvent::StatusExpired { combatant, effect });
            }
        }

        let entry = &self.initiative_order[self.current_turn_index];
        let change = TurnChange {
            round: self.round,
            turn_index: self.current_turn_index,
            current: entry.combatant_id,
            current_name: entry.name.clone(),
            new_round,
            expired_effects,
        };
        debug!(
            round = change.round,
            turn = change.turn_index,
            combatant = %change.current_name,
            "turn advanced"
        );
        self.record(CombatEvent::TurnStarted {
            combatant: change.current,
            name: change.current_name.clone(),
        });
        Ok(change)
    }

    /// End combat. Initiative entries are discarded.
    pub fn end_combat(&mut self) -> Result<(), CombatError> {
        self.ensure_not_ended()?;
        self.record(CombatEvent::CombatEnded);
        self.phase = Phase::Ended;
        self.initiative_order.clear();
        self.current_turn_index = 0;
        info!(round = self.round, "combat ended");
        Ok(())
    }

    /// Check the cross-field rules a deserialized or patched state can break.
    ///
    /// Combatant ids are unique, every positioned combatant is the grid
    /// occupant of its cell and nobody else is on the board, initiative
    /// entries name known combatants, and an active combat has a turn
    /// pointer inside its order.
    pub fn validate(&self) -> Result<(), String> {
        let mut ids = HashSet::new();
        for combatant in &self.combatants {
            if !ids.insert(combatant.id) {
                return Err(format!("combatant {} appears twice", combatant.id));
            }
            if let Some(pos) = combatant.position {
                if self.grid.occupant(pos) != Some(combatant.id) {
                    return Err(format!(
                        "{} is at {pos} but the grid does not hold it there",
                        combatant.name
                    ));
                }
            }
        }

        for (pos, id) in self.grid.occupied() {
            let placed = self.combatant(id).is_some_and(|c| c.position == Some(pos));
            if !placed {
                return Err(format!("grid cell {pos} holds {id}, which is not placed there"));
            }
        }

        if let Some(entry) = self
            .initiative_order
            .iter()
            .find(|e| !ids.contains(&e.combatant_id))
        {
            return Err(format!("initiative entry {} names no combatant", entry.name));
        }

        if self.phase == Phase::Active && self.current_turn_index >= self.initiative_order.len() {
            return Err(format!(
                "turn index {} is outside an initiative order of {}",
                self.current_turn_index,
                self.initiative_order.len()
            ));
        }
        Ok(())
    }

    /// Merge a stored-document patch. Nothing changes if the merged state
    /// fails [`CombatState::validate`].
    pub(crate) fn apply_patch(&mut self, patch: CombatPatch) -> Result<(), SyncError> {
        let mut next = self.clone();
        if let Some(phase) = patch.phase {
            next.phase = phase;
        }
        if let Some(combatants) = patch.combatants {
            next.combatants = combatants;
        }
        if let Some(order) = patch.initiative_order {
            next.initiative_order = order;
        }
        if let Some(index) = patch.current_turn_index {
            next.current_turn_index = index;
        }
        if let Some(round) = patch.round {
            next.round = round;
        }
        if let Some(grid) = patch.grid {
            next.grid = grid;
        }
        if let Some(log) = patch.log {
            next.log = log;
        }

        next.validate().map_err(SyncError::InvalidPatch)?;
        *self = next;
        Ok(())
    }

    /// Restore HP to a combatant, capped at its maximum.
    pub fn heal(&mut self, id: CombatantId, amount: i32) -> Result<i32, CombatError> {
        self.ensure_not_ended()?;
        let combatant = self.combatant_mut(id)?;
        let healed = combatant.heal(amount);
        let hp = combatant.hp();
        self.record(CombatEvent::Healed {
            combatant: id,
            amount: healed,
            hp,
        });
        Ok(healed)
    }

    /// Attach a status effect, replacing any effect with the same name.
    pub fn apply_status(
        &mut self,
        id: CombatantId,
        effect: super::combatant::StatusEffect,
    ) -> Result<(), CombatError> {
        self.ensure_not_ended()?;
        self.combatant_mut(id)?.add_status(effect);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::AbilityScores;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn hero(name: &str, init: i32) -> Combatant {
        Combatant::player(name, 12, 14, AbilityScores::default()).with_initiative_modifier(init)
    }

    fn state_with(names: &[(&str, i32)]) -> (CombatState, Vec<CombatantId>) {
        let mut state = CombatState::new(10, 10);
        let ids = names
            .iter()
            .map(|(name, init)| state.add_combatant(hero(name, *init)).unwrap())
            .collect();
        (state, ids)
    }

    #[test]
    fn test_new_state_is_setup() {
        let state = CombatState::new(8, 6);
        assert_eq!(state.phase(), Phase::Setup);
        assert_eq!(state.round(), 1);
        assert!(state.current_combatant().is_none());
        assert_eq!(state.grid().width(), 8);
    }

    #[test]
    fn test_roll_initiative_sorts_descending() {
        let (mut state, _) = state_with(&[("A", 0), ("B", 5), ("C", -2), ("D", 3)]);
        let mut rng = StdRng::seed_from_u64(11);
        let order = state.roll_initiative(&mut rng).unwrap().to_vec();

        assert_eq!(order.len(), 4);
        for pair in order.windows(2) {
            assert!(pair[0].total >= pair[1].total);
        }
        for entry in &order {
            assert_eq!(entry.total, entry.roll as i32 + entry.modifier);
            assert!((1..=20).contains(&entry.roll));
        }
        assert_eq!(state.phase(), Phase::Active);
        assert_eq!(state.current_turn_index(), 0);
        assert_eq!(state.round(), 1);
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let (mut state, ids) = state_with(&[("First", 2), ("Second", 2), ("Third", 2)]);
        let rolls = ids.iter().map(|id| (*id, 10)).collect();
        let order = state.set_initiative(&rolls).unwrap();
        let names: Vec<_> = order.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["First", "Second", "Third"]);
        assert_eq!(state.phase(), Phase::InitiativeRolled);

        state.begin().unwrap();
        assert_eq!(state.current_combatant().unwrap().name, "First");
    }

    #[test]
    fn test_set_initiative_requires_every_roll() {
        let (mut state, ids) = state_with(&[("A", 0), ("B", 0)]);
        let rolls = HashMap::from([(ids[0], 12)]);
        assert_eq!(
            state.set_initiative(&rolls).unwrap_err(),
            CombatError::CombatantNotFound(ids[1])
        );
        assert_eq!(state.phase(), Phase::Setup);
    }

    #[test]
    fn test_set_initiative_rejects_impossible_faces() {
        use crate::dice::DiceError;

        for bad in [0, 21, 4_000_000_000] {
            let (mut state, ids) = state_with(&[("A", 0), ("B", 0)]);
            let rolls = HashMap::from([(ids[0], bad), (ids[1], 1)]);
            let err = state.set_initiative(&rolls).unwrap_err();
            assert_eq!(
                err,
                CombatError::InvalidDiceNotation(DiceError::InvalidFace {
                    face: bad,
                    sides: 20
                })
            );
            assert_eq!(state.phase(), Phase::Setup);
            assert!(state.initiative_order().is_empty());
        }
    }

    #[test]
    fn test_validate_catches_grid_disagreement() {
        let mut state = CombatState::new(5, 5);
        let a = state.add_combatant(hero("A", 0).at(Position::new(1, 1))).unwrap();
        assert!(state.validate().is_ok());

        let mut stale = state.clone();
        stale.grid = Grid::new(5, 5);
        assert!(stale.validate().unwrap_err().contains("does not hold it"));

        let mut stray = state.clone();
        stray.combatant_mut(a).unwrap().position = None;
        assert!(stray.validate().unwrap_err().contains("not placed there"));
    }

    #[test]
    fn test_bad_patch_leaves_state_untouched() {
        let mut state = CombatState::new(5, 5);
        state.add_combatant(hero("A", 0).at(Position::new(2, 2))).unwrap();
        let before = state.clone();

        let patch = CombatPatch {
            grid: Some(Grid::new(5, 5)),
            ..CombatPatch::default()
        };
        assert!(matches!(
            state.apply_patch(patch),
            Err(SyncError::InvalidPatch(_))
        ));
        assert_eq!(state, before);
    }

    #[test]
    fn test_turn_wraparound() {
        let (mut state, _) = state_with(&[("A", 1), ("B", 2), ("C", 3)]);
        state.roll_initiative(&mut StdRng::seed_from_u64(5)).unwrap();

        let start_index = state.current_turn_index();
        let start_round = state.round();
        let mut wraps = 0;
        for _ in 0..3 {
            if state.advance_turn().unwrap().new_round {
                wraps += 1;
            }
        }
        assert_eq!(wraps, 1);
        assert_eq!(state.current_turn_index(), start_index);
        assert_eq!(state.round(), start_round + 1);
    }

    #[test]
    fn test_advance_requires_active_combat() {
        let (mut state, _) = state_with(&[("A", 0)]);
        assert_eq!(state.advance_turn().unwrap_err(), CombatError::NoActiveCombat);

        state.roll_initiative(&mut StdRng::seed_from_u64(1)).unwrap();
        state.end_combat().unwrap();
        assert_eq!(state.advance_turn().unwrap_err(), CombatError::CombatEnded);
        assert_eq!(state.end_combat().unwrap_err(), CombatError::CombatEnded);
        assert!(state.initiative_order().is_empty());
        assert!(state.current_combatant().is_none());
    }

    #[test]
    fn test_cannot_reroll_or_join_active_combat() {
        let (mut state, _) = state_with(&[("A", 0)]);
        let mut rng = StdRng::seed_from_u64(9);
        state.roll_initiative(&mut rng).unwrap();
        assert_eq!(
            state.roll_initiative(&mut rng).unwrap_err(),
            CombatError::AlreadyActive
        );
        assert_eq!(
            state.add_combatant(hero("Late", 0)).unwrap_err(),
            CombatError::AlreadyActive
        );
    }

    #[test]
    fn test_empty_combat_cannot_start() {
        let mut state = CombatState::new(5, 5);
        assert_eq!(
            state
                .roll_initiative(&mut StdRng::seed_from_u64(2))
                .unwrap_err(),
            CombatError::NoCombatants
        );
    }

    #[test]
    fn test_add_combatant_places_on_grid() {
        let mut state = CombatState::new(5, 5);
        let a = state.add_combatant(hero("A", 0).at(Position::new(1, 1))).unwrap();
        assert_eq!(state.grid().occupant(Position::new(1, 1)), Some(a));

        let err = state
            .add_combatant(hero("B", 0).at(Position::new(1, 1)))
            .unwrap_err();
        assert!(err.is_placement_error());
        assert_eq!(state.combatants().len(), 1);

        let err = state
            .add_combatant(hero("C", 0).at(Position::new(9, 1)))
            .unwrap_err();
        assert!(matches!(err, CombatError::OutOfBounds { .. }));
    }

    #[test]
    fn test_status_effects_tick_on_new_round() {
        let (mut state, ids) = state_with(&[("A", 0), ("B", 0)]);
        state
            .apply_status(ids[0], crate::combat::StatusEffect::for_rounds("Hasted", 1))
            .unwrap();
        state.roll_initiative(&mut StdRng::seed_from_u64(3)).unwrap();

        assert!(state.advance_turn().unwrap().expired_effects.is_empty());
        let change = state.advance_turn().unwrap();
        assert!(change.new_round);
        assert_eq!(change.expired_effects, vec![(ids[0], "Hasted".to_string())]);
        assert!(!state.combatant(ids[0]).unwrap().has_status("Hasted"));
    }

    #[test]
    fn test_side_defeated() {
        let mut state = CombatState::new(5, 5);
        let goblin = state
            .add_combatant(Combatant::enemy("Goblin", 7, 15, 2, vec![]))
            .unwrap();
        state.add_combatant(hero("A", 0)).unwrap();
        assert!(!state.is_side_defeated(CombatantKind::Enemy));

        state.combatant_mut(goblin).unwrap().take_damage(50);
        assert!(state.is_side_defeated(CombatantKind::Enemy));
        assert!(!state.is_side_defeated(CombatantKind::Player));
        assert_eq!(state.living(CombatantKind::Enemy).len(), 0);
    }

    #[test]
    fn test_heal_is_capped() {
        let mut state = CombatState::new(5, 5);
        let id = state.add_combatant(hero("A", 0).with_hp(4)).unwrap();
        assert_eq!(state.heal(id, 100).unwrap(), 8);
        assert_eq!(state.combatant(id).unwrap().hp(), 12);
    }
}
