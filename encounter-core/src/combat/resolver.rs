//! Attack and movement resolution.
//!
//! `CombatEngine` validates a requested action against the grid and the
//! actor's catalog, resolves it, and applies the result to a [`CombatState`].
//! Dice can be supplied from the table through [`ExternalRolls`]; anything
//! not supplied is rolled with the caller's RNG.

use super::combatant::{CombatAction, Combatant, CombatantId};
use super::state::{CombatEvent, CombatState, TurnChange};
use crate::character::Ability;
use crate::config::EngineConfig;
use crate::dice;
use crate::error::CombatError;
use crate::grid::Position;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Name of the movement action on the wire.
pub const MOVE_ACTION: &str = "Move";

/// What an available action does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    Move,
    Attack(CombatAction),
}

/// An action a combatant may choose this turn, with its reach in squares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableAction {
    pub name: String,
    pub kind: ActionKind,
    pub range: u32,
}

/// Legal targets for an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidTargets {
    Cells(Vec<Position>),
    Combatants(Vec<CombatantId>),
}

impl ValidTargets {
    pub fn is_empty(&self) -> bool {
        match self {
            ValidTargets::Cells(cells) => cells.is_empty(),
            ValidTargets::Combatants(ids) => ids.is_empty(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ValidTargets::Cells(cells) => cells.len(),
            ValidTargets::Combatants(ids) => ids.len(),
        }
    }
}

/// The target half of a wire request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionTarget {
    Cell(Position),
    Combatant(CombatantId),
}

/// A typed action request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionRequest {
    Move { to: Position },
    Attack { action: String, target: CombatantId },
}

impl ActionRequest {
    pub fn move_to(to: Position) -> Self {
        ActionRequest::Move { to }
    }

    pub fn attack(action: impl Into<String>, target: CombatantId) -> Self {
        ActionRequest::Attack {
            action: action.into(),
            target,
        }
    }

    /// Build a request from an action name and a target.
    ///
    /// `"Move"` must target a cell; every other name is an attack and must
    /// target a combatant.
    pub fn from_wire(action_name: &str, target: ActionTarget) -> Result<Self, CombatError> {
        let is_move = action_name == MOVE_ACTION;
        match (is_move, target) {
            (true, ActionTarget::Cell(to)) => Ok(ActionRequest::Move { to }),
            (false, ActionTarget::Combatant(target)) => Ok(ActionRequest::Attack {
                action: action_name.to_string(),
                target,
            }),
            (true, ActionTarget::Combatant(_)) => Err(CombatError::InvalidTarget(
                "Move needs a destination cell".to_string(),
            )),
            (false, ActionTarget::Cell(pos)) => Err(CombatError::InvalidTarget(format!(
                "{action_name} needs a combatant target, not cell {pos}"
            ))),
        }
    }
}

/// Dice rolled at the table instead of by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalRolls {
    /// Total attack roll, bonus included.
    #[serde(default)]
    pub attack: Option<i32>,
    /// The d20 face behind `attack`. A 20 is a critical hit.
    #[serde(default)]
    pub natural: Option<u32>,
    /// Damage dice totals. A critical uses the first two.
    #[serde(default)]
    pub damage: Vec<i32>,
}

impl ExternalRolls {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_attack(mut self, total: i32) -> Self {
        self.attack = Some(total);
        self
    }

    pub fn with_natural(mut self, natural: u32) -> Self {
        self.natural = Some(natural);
        self
    }

    pub fn with_damage(mut self, rolls: impl IntoIterator<Item = i32>) -> Self {
        self.damage = rolls.into_iter().collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveOutcome {
    pub combatant: CombatantId,
    pub name: String,
    /// `None` when the combatant entered the board with this move.
    pub from: Option<Position>,
    pub to: Position,
    pub distance: u32,
}

/// Damage dealt by a hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageBreakdown {
    pub notation: String,
    /// One roll, or two on a critical.
    pub rolls: Vec<i32>,
    pub total: i32,
    pub used_fallback: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackOutcome {
    pub attacker: CombatantId,
    pub attacker_name: String,
    pub target: CombatantId,
    pub target_name: String,
    pub action: String,
    /// The d20 face, when known.
    pub natural: Option<u32>,
    pub attack_bonus: i32,
    pub attack_roll: i32,
    pub armor_class: i32,
    pub is_hit: bool,
    pub is_critical: bool,
    pub damage: Option<DamageBreakdown>,
    pub target_hp: i32,
    pub target_defeated: bool,
}

impl AttackOutcome {
    pub fn damage_dealt(&self) -> i32 {
        self.damage.as_ref().map_or(0, |d| d.total)
    }
}

/// What an action did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ActionResult {
    Moved(MoveOutcome),
    Attack(AttackOutcome),
}

/// An action's result plus the turn change it caused, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub result: ActionResult,
    pub turn: Option<TurnChange>,
}

impl ActionOutcome {
    pub fn as_attack(&self) -> Option<&AttackOutcome> {
        match &self.result {
            ActionResult::Attack(attack) => Some(attack),
            ActionResult::Moved(_) => None,
        }
    }

    pub fn as_move(&self) -> Option<&MoveOutcome> {
        match &self.result {
            ActionResult::Moved(movement) => Some(movement),
            ActionResult::Attack(_) => None,
        }
    }
}

/// Attacks every player can make without a catalog of their own.
pub fn player_basic_actions() -> Vec<CombatAction> {
    vec![
        CombatAction::melee("Basic Attack", "1d8"),
        CombatAction::ranged("Ranged Attack", "1d6"),
    ]
}

/// Resolves moves and attacks.
#[derive(Debug, Clone, Default)]
pub struct CombatEngine {
    config: EngineConfig,
}

impl CombatEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Actions a combatant can choose from. `Move` is always first.
    pub fn available_actions(&self, combatant: &Combatant) -> Vec<AvailableAction> {
        let mut actions = vec![AvailableAction {
            name: MOVE_ACTION.to_string(),
            kind: ActionKind::Move,
            range: self.config.move_range,
        }];
        actions.extend(self.attack_catalog(combatant).into_iter().map(|action| {
            AvailableAction {
                name: action.name.clone(),
                range: action.range_in_squares(&self.config),
                kind: ActionKind::Attack(action),
            }
        }));
        actions
    }

    fn attack_catalog(&self, combatant: &Combatant) -> Vec<CombatAction> {
        let mut catalog = combatant.actions.clone();
        if combatant.is_player() {
            for basic in player_basic_actions() {
                if combatant.find_action(&basic.name).is_none() {
                    catalog.push(basic);
                }
            }
        }
        catalog
    }

    fn find_attack(&self, combatant: &Combatant, name: &str) -> Result<CombatAction, CombatError> {
        self.attack_catalog(combatant)
            .into_iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| CombatError::ActionNotFound {
                combatant: combatant.name.clone(),
                action: name.to_string(),
            })
    }

    /// To-hit bonus: the catalog's explicit bonus, else a player's better
    /// of STR and DEX.
    pub fn attack_bonus(&self, attacker: &Combatant, action: &CombatAction) -> i32 {
        match action.attack_bonus {
            Some(bonus) => bonus,
            None if attacker.is_player() => {
                let scores = &attacker.ability_scores;
                scores
                    .modifier(Ability::Strength)
                    .max(scores.modifier(Ability::Dexterity))
            }
            None => 0,
        }
    }

    /// Cells or combatants the action can currently reach.
    ///
    /// An attacker that is not on the board has no targets.
    pub fn valid_targets(
        &self,
        state: &CombatState,
        attacker_id: CombatantId,
        action_name: &str,
    ) -> Result<ValidTargets, CombatError> {
        let attacker = state
            .combatant(attacker_id)
            .ok_or(CombatError::CombatantNotFound(attacker_id))?;

        if action_name == MOVE_ACTION {
            let cells = attacker
                .position
                .map(|pos| state.grid().valid_moves_from(pos, self.config.move_range))
                .unwrap_or_default();
            return Ok(ValidTargets::Cells(cells));
        }

        let action = self.find_attack(attacker, action_name)?;
        let Some(origin) = attacker.position else {
            return Ok(ValidTargets::Combatants(Vec::new()));
        };
        let range = action.range_in_squares(&self.config);
        let targets = state
            .combatants()
            .iter()
            .filter(|c| c.id != attacker_id && c.is_alive())
            .filter(|c| c.position.is_some_and(|pos| origin.distance_to(pos) <= range))
            .map(|c| c.id)
            .collect();
        Ok(ValidTargets::Combatants(targets))
    }

    /// Resolve one action.
    ///
    /// Whose turn it is gets checked by the caller (see
    /// [`EncounterService`](crate::sync::EncounterService)). After a
    /// player's action the turn advances automatically; enemy turns are
    /// advanced by the caller.
    pub fn perform_action<R: Rng>(
        &self,
        state: &mut CombatState,
        actor_id: CombatantId,
        request: ActionRequest,
        external: &ExternalRolls,
        rng: &mut R,
    ) -> Result<ActionOutcome, CombatError> {
        let result = self
            .resolve(state, actor_id, &request, external, rng)
            .inspect_err(|err| {
                warn!(actor = %actor_id, ?request, error = %err, "action rejected")
            })?;

        let event = match &result {
            ActionResult::Moved(movement) => CombatEvent::Moved(movement.clone()),
            ActionResult::Attack(attack) => CombatEvent::Attacked(attack.clone()),
        };
        state.record(event);

        let is_player = state.combatant(actor_id).is_some_and(|c| c.is_player());
        let turn = if is_player {
            Some(state.advance_turn()?)
        } else {
            None
        };

        Ok(ActionOutcome { result, turn })
    }

    fn resolve<R: Rng>(
        &self,
        state: &mut CombatState,
        actor_id: CombatantId,
        request: &ActionRequest,
        external: &ExternalRolls,
        rng: &mut R,
    ) -> Result<ActionResult, CombatError> {
        state.ensure_active()?;
        let actor = state
            .combatant(actor_id)
            .ok_or(CombatError::CombatantNotFound(actor_id))?;
        if !actor.is_alive() {
            return Err(CombatError::Defeated(actor.name.clone()));
        }

        match request {
            ActionRequest::Move { to } => self
                .resolve_move(state, actor_id, *to)
                .map(ActionResult::Moved),
            ActionRequest::Attack { action, target } => self
                .resolve_attack(state, actor_id, action, *target, external, rng)
                .map(ActionResult::Attack),
        }
    }

    fn resolve_move(
        &self,
        state: &mut CombatState,
        actor_id: CombatantId,
        to: Position,
    ) -> Result<MoveOutcome, CombatError> {
        let grid = state.grid();
        if !grid.in_bounds(to) {
            return Err(CombatError::OutOfBounds {
                position: to,
                width: grid.width(),
                height: grid.height(),
            });
        }

        let (name, from) = state
            .combatant(actor_id)
            .map(|c| (c.name.clone(), c.position))
            .ok_or(CombatError::CombatantNotFound(actor_id))?;

        let distance = match from {
            Some(from) if from == to => {
                return Err(CombatError::InvalidTarget(format!("{name} is already at {to}")));
            }
            Some(from) => from.distance_to(to),
            None => 0,
        };
        if distance > self.config.move_range {
            return Err(CombatError::OutOfRange {
                distance,
                range: self.config.move_range,
            });
        }

        state.place_combatant(actor_id, to)?;
        debug!(combatant = %name, ?from, %to, distance, "combatant moved");

        Ok(MoveOutcome {
            combatant: actor_id,
            name,
            from,
            to,
            distance,
        })
    }

    fn resolve_attack<R: Rng>(
        &self,
        state: &mut CombatState,
        actor_id: CombatantId,
        action_name: &str,
        target_id: CombatantId,
        external: &ExternalRolls,
        rng: &mut R,
    ) -> Result<AttackOutcome, CombatError> {
        let attacker = state
            .combatant(actor_id)
            .ok_or(CombatError::CombatantNotFound(actor_id))?;
        let action = self.find_attack(attacker, action_name)?;

        if target_id == actor_id {
            return Err(CombatError::InvalidTarget(format!(
                "{} cannot target themselves",
                attacker.name
            )));
        }
        let target = state
            .combatant(target_id)
            .ok_or(CombatError::CombatantNotFound(target_id))?;
        if !target.is_alive() {
            return Err(CombatError::InvalidTarget(format!(
                "{} is already defeated",
                target.name
            )));
        }
        let (Some(from), Some(to)) = (attacker.position, target.position) else {
            return Err(CombatError::InvalidTarget(
                "attacker and target must both be on the grid".to_string(),
            ));
        };
        let range = action.range_in_squares(&self.config);
        let distance = from.distance_to(to);
        if distance > range {
            return Err(CombatError::OutOfRange { distance, range });
        }

        let attack_bonus = self.attack_bonus(attacker, &action);
        // A table-reported natural must be a d20 face.
        let reported = external
            .natural
            .map(dice::D20Roll::from_face)
            .transpose()?
            .map(|roll| roll.natural);
        let (natural, attack_roll) = match external.attack {
            Some(total) => (reported, total),
            None => {
                let natural = dice::d20(rng);
                (Some(natural), (natural as i32).saturating_add(attack_bonus))
            }
        };
        let armor_class = target.armor_class;
        let is_hit = attack_roll >= armor_class;
        let is_critical = natural == Some(20);

        let attacker_name = attacker.name.clone();
        let target_name = target.name.clone();

        let damage = if is_hit {
            Some(self.roll_damage(&action, is_critical, external, rng))
        } else {
            None
        };

        let target = state.combatant_mut(target_id)?;
        if let Some(damage) = &damage {
            target.take_damage(damage.total);
        }
        let target_hp = target.hp();
        let target_defeated = !target.is_alive();

        debug!(
            attacker = %attacker_name,
            target = %target_name,
            action = %action.name,
            attack_roll,
            armor_class,
            is_hit,
            is_critical,
            damage = damage.as_ref().map_or(0, |d| d.total),
            "attack resolved"
        );

        Ok(AttackOutcome {
            attacker: actor_id,
            attacker_name,
            target: target_id,
            target_name,
            action: action.name,
            natural,
            attack_bonus,
            attack_roll,
            armor_class,
            is_hit,
            is_critical,
            damage,
            target_hp,
            target_defeated,
        })
    }

    /// One damage roll, or two independent ones summed on a critical.
    fn roll_damage<R: Rng>(
        &self,
        action: &CombatAction,
        is_critical: bool,
        external: &ExternalRolls,
        rng: &mut R,
    ) -> DamageBreakdown {
        let dice_count = if is_critical { 2 } else { 1 };
        let mut notation = action.damage.clone();
        let mut used_fallback = false;
        let mut rolls = Vec::with_capacity(dice_count);

        for i in 0..dice_count {
            let roll = match external.damage.get(i) {
                Some(&forced) => forced.max(0),
                None => {
                    let rolled = dice::roll_damage_notation(
                        &action.damage,
                        &self.config.fallback_damage_die,
                        rng,
                    );
                    if rolled.used_fallback {
                        used_fallback = true;
                        notation = rolled.notation;
                    }
                    rolled.total
                }
            };
            rolls.push(roll);
        }

        DamageBreakdown {
            notation,
            total: rolls.iter().fold(0, |sum: i32, roll| sum.saturating_add(*roll)),
            rolls,
            used_fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::AbilityScores;
    use crate::dice::DiceError;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn goblin() -> Combatant {
        Combatant::enemy(
            "Goblin",
            7,
            15,
            2,
            vec![CombatAction::melee("Scimitar", "1d6+2")
                .with_attack_bonus(4)
                .with_range("reach 5 ft.")],
        )
    }

    fn fighter() -> Combatant {
        Combatant::player("Ayla", 12, 16, AbilityScores::new(16, 12, 14, 10, 10, 10))
    }

    /// Player acts first: rolls are set by hand so the order is fixed.
    fn duel(hero_at: Position, goblin_at: Position) -> (CombatState, CombatantId, CombatantId) {
        let mut state = CombatState::new(10, 10);
        let hero = state.add_combatant(fighter().at(hero_at)).unwrap();
        let gob = state.add_combatant(goblin().at(goblin_at)).unwrap();
        let rolls = [(hero, 20), (gob, 1)].into_iter().collect();
        state.set_initiative(&rolls).unwrap();
        state.begin().unwrap();
        (state, hero, gob)
    }

    #[test]
    fn test_available_actions() {
        let engine = CombatEngine::default();
        let names: Vec<_> = engine
            .available_actions(&fighter())
            .into_iter()
            .map(|a| (a.name, a.range))
            .collect();
        assert_eq!(
            names,
            vec![
                ("Move".to_string(), 6),
                ("Basic Attack".to_string(), 1),
                ("Ranged Attack".to_string(), 3)
            ]
        );

        let goblin_actions = engine.available_actions(&goblin());
        assert_eq!(goblin_actions.len(), 2);
        assert_eq!(goblin_actions[0].kind, ActionKind::Move);
        assert_eq!(goblin_actions[1].name, "Scimitar");
    }

    #[test]
    fn test_from_wire() {
        let id = CombatantId::new();
        assert_eq!(
            ActionRequest::from_wire("Move", ActionTarget::Cell(Position::new(1, 2))).unwrap(),
            ActionRequest::move_to(Position::new(1, 2))
        );
        assert_eq!(
            ActionRequest::from_wire("Scimitar", ActionTarget::Combatant(id)).unwrap(),
            ActionRequest::attack("Scimitar", id)
        );
        assert!(ActionRequest::from_wire("Move", ActionTarget::Combatant(id)).is_err());
        let cell = ActionTarget::Cell(Position::new(0, 0));
        assert!(ActionRequest::from_wire("Scimitar", cell).is_err());
    }

    #[test]
    fn test_basic_attack_hits_goblin() {
        let (mut state, hero, gob) = duel(Position::new(2, 2), Position::new(3, 2));
        let engine = CombatEngine::default();
        let external = ExternalRolls::none().with_attack(18).with_damage([5]);

        let outcome = engine
            .perform_action(
                &mut state,
                hero,
                ActionRequest::attack("Basic Attack", gob),
                &external,
                &mut StdRng::seed_from_u64(1),
            )
            .unwrap();

        let attack = outcome.as_attack().unwrap();
        assert!(attack.is_hit);
        assert!(!attack.is_critical);
        assert_eq!(attack.damage_dealt(), 5);
        assert_eq!(attack.target_hp, 2);
        assert_eq!(state.combatant(gob).unwrap().hp(), 2);

        let turn = outcome.turn.unwrap();
        assert_eq!(turn.current, gob);
        assert_eq!(state.current_combatant().unwrap().id, gob);
    }

    #[test]
    fn test_miss_changes_nothing() {
        let (mut state, hero, gob) = duel(Position::new(2, 2), Position::new(3, 2));
        let engine = CombatEngine::default();
        let external = ExternalRolls::none().with_attack(14).with_damage([5]);

        let outcome = engine
            .perform_action(
                &mut state,
                hero,
                ActionRequest::attack("Basic Attack", gob),
                &external,
                &mut StdRng::seed_from_u64(1),
            )
            .unwrap();
        let attack = outcome.as_attack().unwrap();
        assert!(!attack.is_hit);
        assert!(attack.damage.is_none());
        assert_eq!(state.combatant(gob).unwrap().hp(), 7);
    }

    #[test]
    fn test_critical_sums_two_rolls() {
        let (mut state, hero, gob) = duel(Position::new(2, 2), Position::new(3, 2));
        let engine = CombatEngine::default();
        let external = ExternalRolls::none()
            .with_attack(23)
            .with_natural(20)
            .with_damage([3, 2]);

        let outcome = engine
            .perform_action(
                &mut state,
                hero,
                ActionRequest::attack("Basic Attack", gob),
                &external,
                &mut StdRng::seed_from_u64(1),
            )
            .unwrap();
        let attack = outcome.as_attack().unwrap();
        assert!(attack.is_critical);
        let damage = attack.damage.as_ref().unwrap();
        assert_eq!(damage.rolls, vec![3, 2]);
        assert_eq!(damage.total, 5);
        assert_eq!(attack.target_hp, 2);
    }

    #[test]
    fn test_huge_reported_damage_saturates() {
        let (mut state, hero, gob) = duel(Position::new(2, 2), Position::new(3, 2));
        let external = ExternalRolls::none()
            .with_attack(30)
            .with_natural(20)
            .with_damage([i32::MAX, 1]);

        let outcome = CombatEngine::default()
            .perform_action(
                &mut state,
                hero,
                ActionRequest::attack("Basic Attack", gob),
                &external,
                &mut StdRng::seed_from_u64(1),
            )
            .unwrap();
        let attack = outcome.as_attack().unwrap();
        assert_eq!(attack.damage.as_ref().unwrap().total, i32::MAX);
        assert_eq!(attack.damage_dealt(), i32::MAX);
        assert_eq!(attack.target_hp, 0);
        assert!(attack.target_defeated);
    }

    #[test]
    fn test_reported_natural_must_be_a_d20_face() {
        let (mut state, hero, gob) = duel(Position::new(2, 2), Position::new(3, 2));
        let before = state.clone();
        let engine = CombatEngine::default();

        for bad in [0, 25] {
            let external = ExternalRolls::none().with_attack(18).with_natural(bad);
            let err = engine
                .perform_action(
                    &mut state,
                    hero,
                    ActionRequest::attack("Basic Attack", gob),
                    &external,
                    &mut StdRng::seed_from_u64(1),
                )
                .unwrap_err();
            assert_eq!(
                err,
                CombatError::InvalidDiceNotation(DiceError::InvalidFace {
                    face: bad,
                    sides: 20
                })
            );
            assert_eq!(state, before);
        }
    }

    #[test]
    fn test_attack_out_of_range() {
        let (mut state, hero, gob) = duel(Position::new(0, 0), Position::new(4, 0));
        let engine = CombatEngine::default();
        let err = engine
            .perform_action(
                &mut state,
                hero,
                ActionRequest::attack("Basic Attack", gob),
                &ExternalRolls::none(),
                &mut StdRng::seed_from_u64(1),
            )
            .unwrap_err();
        assert_eq!(err, CombatError::OutOfRange { distance: 4, range: 1 });
        // Rejected actions do not consume the turn.
        assert_eq!(state.current_combatant().unwrap().id, hero);
    }

    #[test]
    fn test_move_within_range() {
        let (mut state, hero, _) = duel(Position::new(0, 0), Position::new(9, 9));
        let engine = CombatEngine::default();
        let outcome = engine
            .perform_action(
                &mut state,
                hero,
                ActionRequest::move_to(Position::new(3, 2)),
                &ExternalRolls::none(),
                &mut StdRng::seed_from_u64(1),
            )
            .unwrap();
        let movement = outcome.as_move().unwrap();
        assert_eq!(movement.distance, 5);
        assert_eq!(state.grid().position_of(hero), Some(Position::new(3, 2)));
        assert_eq!(state.combatant(hero).unwrap().position, Some(Position::new(3, 2)));
        assert!(!state.grid().is_occupied(Position::new(0, 0)));
    }

    #[test]
    fn test_move_too_far_or_blocked() {
        let (mut state, hero, _) = duel(Position::new(0, 0), Position::new(1, 0));
        let engine = CombatEngine::default();
        let mut rng = StdRng::seed_from_u64(1);

        let err = engine
            .perform_action(
                &mut state,
                hero,
                ActionRequest::move_to(Position::new(5, 5)),
                &ExternalRolls::none(),
                &mut rng,
            )
            .unwrap_err();
        assert_eq!(err, CombatError::OutOfRange { distance: 10, range: 6 });

        let err = engine
            .perform_action(
                &mut state,
                hero,
                ActionRequest::move_to(Position::new(1, 0)),
                &ExternalRolls::none(),
                &mut rng,
            )
            .unwrap_err();
        assert!(err.is_placement_error());
        assert_eq!(state.grid().position_of(hero), Some(Position::new(0, 0)));
    }

    #[test]
    fn test_enemy_turn_does_not_auto_advance() {
        let (mut state, hero, gob) = duel(Position::new(2, 2), Position::new(3, 2));
        state.advance_turn().unwrap();
        let engine = CombatEngine::default();

        let outcome = engine
            .perform_action(
                &mut state,
                gob,
                ActionRequest::attack("Scimitar", hero),
                &ExternalRolls::none().with_attack(16).with_damage([4]),
                &mut StdRng::seed_from_u64(2),
            )
            .unwrap();
        assert!(outcome.turn.is_none());
        assert_eq!(state.combatant(hero).unwrap().hp(), 8);
        assert_eq!(state.current_combatant().unwrap().id, gob);
    }

    #[test]
    fn test_valid_targets() {
        let (state, hero, gob) = duel(Position::new(2, 2), Position::new(4, 2));
        let engine = CombatEngine::default();

        let melee = engine.valid_targets(&state, hero, "Basic Attack").unwrap();
        assert!(melee.is_empty());
        let ranged = engine.valid_targets(&state, hero, "Ranged Attack").unwrap();
        assert_eq!(ranged, ValidTargets::Combatants(vec![gob]));

        match engine.valid_targets(&state, hero, "Move").unwrap() {
            ValidTargets::Cells(cells) => {
                assert!(!cells.contains(&Position::new(4, 2)));
                assert!(cells.iter().all(|c| c.distance_to(Position::new(2, 2)) <= 6));
            }
            other => panic!("expected cells, got {other:?}"),
        }

        let err = engine.valid_targets(&state, hero, "Fireball").unwrap_err();
        assert!(matches!(err, CombatError::ActionNotFound { .. }));
    }

    #[test]
    fn test_attack_bonus_from_abilities() {
        let engine = CombatEngine::default();
        let hero = Combatant::player("Vex", 10, 14, AbilityScores::new(8, 18, 10, 10, 10, 10));
        let basic = CombatAction::melee("Basic Attack", "1d8");
        assert_eq!(engine.attack_bonus(&hero, &basic), 4);
        assert_eq!(engine.attack_bonus(&goblin(), &goblin().actions[0]), 4);
    }

    #[test]
    fn test_bad_damage_notation_uses_fallback() {
        let mut state = CombatState::new(5, 5);
        let brute = state
            .add_combatant(
                Combatant::enemy("Brute", 20, 12, 0, vec![CombatAction::melee("Slam", "lots")])
                    .at(Position::new(0, 0)),
            )
            .unwrap();
        let hero = state.add_combatant(fighter().at(Position::new(0, 1))).unwrap();
        let rolls = [(brute, 20), (hero, 1)].into_iter().collect();
        state.set_initiative(&rolls).unwrap();
        state.begin().unwrap();

        let outcome = CombatEngine::default()
            .perform_action(
                &mut state,
                brute,
                ActionRequest::attack("Slam", hero),
                &ExternalRolls::none().with_attack(30).with_natural(15),
                &mut StdRng::seed_from_u64(8),
            )
            .unwrap();
        let damage = outcome.as_attack().unwrap().damage.clone().unwrap();
        assert!(damage.used_fallback);
        assert_eq!(damage.notation, "1d4");
        assert!((1..=4).contains(&damage.total));
    }
}
