//! Turn-based tabletop combat engine.
//!
//! This crate provides:
//! - Dice notation and d20 rolls with advantage
//! - A square grid with orthogonal (Manhattan) movement
//! - Initiative, rounds and turn sequencing
//! - Attack and move resolution against combatant catalogs
//! - A free-text action interpreter feeding skill checks
//! - A store boundary for sharing combat state between participants
//!
//! # Quick Start
//!
//! ```ignore
//! use encounter_core::{ActionRequest, CombatEngine, CombatState, EngineConfig, ExternalRolls};
//!
//! let config = EngineConfig::default();
//! let mut state = CombatState::from_config(&config);
//! let hero = state.add_combatant(hero.at(Position::new(0, 0)))?;
//! let goblin = state.add_combatant(goblin.at(Position::new(1, 0)))?;
//! state.roll_initiative(&mut rng)?;
//!
//! let engine = CombatEngine::new(config);
//! let outcome = engine.perform_action(
//!     &mut state,
//!     hero,
//!     ActionRequest::attack("Basic Attack", goblin),
//!     &ExternalRolls::none(),
//!     &mut rng,
//! )?;
//! ```

pub mod catalog;
pub mod character;
pub mod combat;
pub mod config;
pub mod dice;
pub mod error;
pub mod grid;
pub mod interpret;
pub mod persist;
pub mod skill_check;
pub mod sync;
pub mod testing;

// Primary public API
pub use catalog::{MonsterCatalog, MonsterTemplate};
pub use character::{Ability, AbilityScores, Character, CharacterClass};
pub use combat::{
    ActionOutcome, ActionRequest, ActionResult, AttackOutcome, CombatAction, CombatEngine,
    CombatState, Combatant, CombatantId, CombatantKind, ExternalRolls, MoveOutcome, Phase,
    TurnChange,
};
pub use config::EngineConfig;
pub use dice::{Advantage, D20Roll, DiceError};
pub use error::CombatError;
pub use grid::{Grid, Position};
pub use interpret::{ActionInterpreter, ActionIntent, ActionType, InterpretContext, Interpretation};
pub use persist::{PersistError, SavedEncounter};
pub use skill_check::{Degree, SkillCheckResolver, SkillCheckResult};
pub use sync::{CombatPatch, CombatStore, EncounterService, InMemoryCombatStore, SyncError};
pub use testing::EncounterHarness;
