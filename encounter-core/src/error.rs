//! Engine error taxonomy.
//!
//! These are operation-level failures. In-fiction outcomes (a missed attack,
//! a failed check) are ordinary results, never errors.

use crate::combat::CombatantId;
use crate::dice::DiceError;
use crate::grid::Position;
use thiserror::Error;

/// Errors from combat, grid and interpretation operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CombatError {
    #[error("Position {position} is outside the {width}x{height} grid")]
    OutOfBounds {
        position: Position,
        width: u32,
        height: u32,
    },

    #[error("Cell {position} is occupied by {occupant}")]
    CellOccupied {
        position: Position,
        occupant: CombatantId,
    },

    #[error("No combat is active")]
    NoActiveCombat,

    #[error("Combat has ended")]
    CombatEnded,

    #[error("Combat is already active")]
    AlreadyActive,

    #[error("Combat has no combatants")]
    NoCombatants,

    #[error("Combatant not found: {0}")]
    CombatantNotFound(CombatantId),

    #[error("{combatant} has no action named '{action}'")]
    ActionNotFound { combatant: String, action: String },

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Target is out of range ({distance} squares, range {range})")]
    OutOfRange { distance: u32, range: u32 },

    #[error("It is not {0}'s turn")]
    NotTheirTurn(String),

    #[error("{0} is defeated and cannot act")]
    Defeated(String),

    #[error("Impossible action: {reason}")]
    ImpossibleAction { reason: String },

    #[error("Invalid dice notation: {0}")]
    InvalidDiceNotation(#[from] DiceError),
}

impl CombatError {
    /// Grid violations the caller should answer by choosing another cell.
    pub fn is_placement_error(&self) -> bool {
        matches!(
            self,
            CombatError::OutOfBounds { .. } | CombatError::CellOccupied { .. }
        )
    }

    /// Errors caused by the state machine being in the wrong phase.
    pub fn is_phase_error(&self) -> bool {
        matches!(
            self,
            CombatError::NoActiveCombat | CombatError::CombatEnded | CombatError::AlreadyActive
        )
    }
}
