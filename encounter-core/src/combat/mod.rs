//! Turn-based grid combat.
//!
//! - [`combatant`]: participants and their attack catalogs
//! - [`state`]: the encounter state machine (initiative, turns, rounds)
//! - [`resolver`]: move and attack resolution against that state

pub mod combatant;
pub mod resolver;
pub mod state;

pub use combatant::{AttackReach, CombatAction, Combatant, CombatantId, CombatantKind, StatusEffect};
pub use resolver::{
    player_basic_actions, ActionKind, ActionOutcome, ActionRequest, ActionResult, ActionTarget,
    AttackOutcome, AvailableAction, CombatEngine, DamageBreakdown, ExternalRolls, MoveOutcome,
    ValidTargets, MOVE_ACTION,
};
pub use state::{CombatEvent, CombatLogEntry, CombatState, InitiativeEntry, Phase, TurnChange};
