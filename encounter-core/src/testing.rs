//! Testing utilities for encounters.
//!
//! - sample characters and monsters
//! - `EncounterHarness` for scripted, seeded combat scenarios
//! - assertion helpers for hit points and turn order

use crate::catalog::MonsterCatalog;
use crate::character::{AbilityScores, Character, CharacterClass};
use crate::combat::{
    ActionOutcome, ActionRequest, CombatEngine, CombatState, Combatant, CombatantId, ExternalRolls,
};
use crate::config::EngineConfig;
use crate::dice::Advantage;
use crate::error::CombatError;
use crate::grid::Position;
use crate::interpret::{ActionInterpreter, InterpretContext};
use crate::skill_check::{SkillCheckResolver, SkillCheckResult};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{HashMap, HashSet};

/// A level 1 fighter: STR 16, DEX 14, CON 14.
pub fn sample_fighter(name: &str) -> Character {
    Character::new(name, CharacterClass::Fighter)
        .with_ability_scores(AbilityScores::new(16, 14, 14, 10, 12, 8))
}

/// A level 5 rogue: DEX 18.
pub fn sample_rogue(name: &str) -> Character {
    Character::new(name, CharacterClass::Rogue)
        .with_level(5)
        .with_ability_scores(AbilityScores::new(10, 18, 12, 13, 12, 14))
}

/// The standard goblin: AC 15, 7 HP, scimitar and shortbow at +4.
pub fn sample_goblin() -> Combatant {
    MonsterCatalog::standard()
        .get("Goblin")
        .map(|m| m.to_combatant())
        .unwrap_or_else(|| Combatant::enemy("Goblin", 7, 15, 2, Vec::new()))
}

/// A scripted encounter with a seeded RNG.
pub struct EncounterHarness {
    pub state: CombatState,
    pub engine: CombatEngine,
    pub interpreter: ActionInterpreter,
    pub checks: SkillCheckResolver,
    pub catalog: MonsterCatalog,
    rng: StdRng,
}

impl EncounterHarness {
    /// A 10x10 board with default rules and seed 0.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default().with_grid(10, 10), 0)
    }

    pub fn with_config(config: EngineConfig, seed: u64) -> Self {
        Self {
            state: CombatState::from_config(&config),
            engine: CombatEngine::new(config.clone()),
            interpreter: ActionInterpreter::with_config(&config),
            checks: SkillCheckResolver::new(config),
            catalog: MonsterCatalog::standard(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Add a player built from a character sheet (12 HP, AC 16).
    pub fn add_player(
        &mut self,
        character: &Character,
        at: Position,
    ) -> Result<CombatantId, CombatError> {
        self.state
            .add_combatant(Combatant::from_character(character, 12, 16).at(at))
    }

    /// Add a monster from the catalog.
    pub fn add_monster(&mut self, name: &str, at: Position) -> Result<CombatantId, CombatError> {
        let monster = self
            .catalog
            .spawn(name, at)
            .ok_or_else(|| CombatError::InvalidTarget(format!("no monster named {name}")))?;
        self.state.add_combatant(monster)
    }

    /// Start combat with a fixed turn order, first id acting first.
    ///
    /// `order` must list every combatant exactly once. On any error the
    /// state is left as it was.
    pub fn start_in_order(&mut self, order: &[CombatantId]) -> Result<(), CombatError> {
        let mut listed = HashSet::new();
        for id in order {
            let combatant = self
                .state
                .combatant(*id)
                .ok_or(CombatError::CombatantNotFound(*id))?;
            if !listed.insert(*id) {
                return Err(CombatError::InvalidTarget(format!(
                    "{} is listed twice",
                    combatant.name
                )));
            }
        }
        if let Some(missing) = self
            .state
            .combatants()
            .iter()
            .find(|c| !listed.contains(&c.id))
        {
            return Err(CombatError::CombatantNotFound(missing.id));
        }

        let snapshot = self.state.clone();
        let result = self.fix_order(order);
        if result.is_err() {
            self.state = snapshot;
        }
        result
    }

    /// Everyone rolls 10; descending modifiers decide the order.
    fn fix_order(&mut self, order: &[CombatantId]) -> Result<(), CombatError> {
        let count = order.len();
        for (i, id) in order.iter().enumerate() {
            self.state.combatant_mut(*id)?.initiative_modifier = (count - i) as i32;
        }
        let rolls: HashMap<CombatantId, u32> = order.iter().map(|id| (*id, 10)).collect();
        self.state.set_initiative(&rolls)?;
        self.state.begin()
    }

    /// Start combat with rolled initiative.
    pub fn start(&mut self) -> Result<(), CombatError> {
        self.state.roll_initiative(&mut self.rng).map(|_| ())
    }

    pub fn act(
        &mut self,
        actor: CombatantId,
        request: ActionRequest,
        external: &ExternalRolls,
    ) -> Result<ActionOutcome, CombatError> {
        self.engine
            .perform_action(&mut self.state, actor, request, external, &mut self.rng)
    }

    /// Attack with a forced total and forced damage dice.
    pub fn forced_attack(
        &mut self,
        actor: CombatantId,
        action: &str,
        target: CombatantId,
        attack_total: i32,
        damage: &[i32],
    ) -> Result<ActionOutcome, CombatError> {
        let external = ExternalRolls::none()
            .with_attack(attack_total)
            .with_damage(damage.iter().copied());
        self.act(actor, ActionRequest::attack(action, target), &external)
    }

    /// Interpret a description and roll a check for every intent.
    pub fn attempt(
        &mut self,
        character: &Character,
        text: &str,
    ) -> Result<Vec<SkillCheckResult>, CombatError> {
        let intents = self
            .interpreter
            .interpret(text, &InterpretContext::new())
            .ensure_possible()?;
        Ok(self
            .checks
            .resolve_intents(character, &intents, None, Advantage::Normal, &mut self.rng))
    }

    pub fn hp(&self, id: CombatantId) -> Option<i32> {
        self.state.combatant(id).map(|c| c.hp())
    }
}

impl Default for EncounterHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Assert a combatant's current HP.
#[track_caller]
pub fn assert_hp(harness: &EncounterHarness, id: CombatantId, expected: i32) {
    let actual = harness.hp(id);
    assert_eq!(actual, Some(expected), "Expected HP {expected}, got {actual:?}");
}

/// Assert whose turn it is.
#[track_caller]
pub fn assert_turn(harness: &EncounterHarness, id: CombatantId) {
    let current = harness.state.current_combatant().map(|c| c.id);
    assert_eq!(current, Some(id), "Expected it to be {id}'s turn");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_harness_turn_order() {
        let mut harness = EncounterHarness::new();
        let hero = harness
            .add_player(&sample_fighter("Ayla"), Position::new(0, 0))
            .unwrap();
        let goblin = harness.add_monster("goblin", Position::new(1, 0)).unwrap();
        harness.start_in_order(&[goblin, hero]).unwrap();
        assert_turn(&harness, goblin);

        harness.state.advance_turn().unwrap();
        assert_turn(&harness, hero);
    }

    #[test]
    fn test_start_in_order_with_many_combatants() {
        let config = EngineConfig::default().with_grid(30, 1);
        let mut harness = EncounterHarness::with_config(config, 0);
        let mut ids: Vec<_> = (0..25)
            .map(|x| harness.add_monster("goblin", Position::new(x, 0)).unwrap())
            .collect();
        ids.reverse();
        harness.start_in_order(&ids).unwrap();

        let order: Vec<_> = harness
            .state
            .initiative_order()
            .iter()
            .map(|e| e.combatant_id)
            .collect();
        assert_eq!(order, ids);
        assert_turn(&harness, ids[0]);
    }

    #[test]
    fn test_start_in_order_rejects_partial_order() {
        let mut harness = EncounterHarness::new();
        let hero = harness
            .add_player(&sample_fighter("Ayla"), Position::new(0, 0))
            .unwrap();
        let goblin = harness.add_monster("goblin", Position::new(1, 0)).unwrap();
        let before = harness.state.clone();

        let err = harness.start_in_order(&[hero]).unwrap_err();
        assert_eq!(err, CombatError::CombatantNotFound(goblin));
        let err = harness.start_in_order(&[hero, goblin, hero]).unwrap_err();
        assert!(matches!(err, CombatError::InvalidTarget(_)));
        assert_eq!(harness.state, before);

        harness.start_in_order(&[goblin, hero]).unwrap();
        let err = harness.start_in_order(&[hero, goblin]).unwrap_err();
        assert_eq!(err, CombatError::AlreadyActive);
        assert_turn(&harness, goblin);
    }

    #[test]
    fn test_unknown_monster() {
        let mut harness = EncounterHarness::new();
        assert!(harness.add_monster("Beholder", Position::new(0, 0)).is_err());
    }

    #[test]
    fn test_sample_goblin_matches_catalog() {
        let goblin = sample_goblin();
        assert_eq!(goblin.armor_class, 15);
        assert_eq!(goblin.max_hp(), 7);
        assert!(goblin.find_action("scimitar").is_some());
    }
}
