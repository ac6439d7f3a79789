//! Dice primitives.
//!
//! Parses `NdM+K` notation (with multiple components and keep
//! highest/lowest), rolls it against any `rand::Rng`, and draws d20s with
//! advantage or disadvantage. Everything here is stateless; randomness is
//! always supplied by the caller so encounters can be replayed from a seed.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

/// Error type for dice parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiceError {
    #[error("Invalid dice notation: {0}")]
    InvalidNotation(String),
    #[error("Invalid die size: {0}")]
    InvalidDieSize(u32),
    #[error("No dice specified")]
    NoDice,
    #[error("A d{sides} has no face {face}")]
    InvalidFace { face: u32, sides: u32 },
    #[error("Cannot keep {keep} dice when only rolling {count} (in {notation})")]
    InvalidKeepCount {
        keep: u32,
        count: u32,
        notation: String,
    },
}

/// Advantage state for d20 rolls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Advantage {
    #[default]
    Normal,
    Advantage,
    Disadvantage,
}

impl Advantage {
    /// Combine two advantage states (advantage + disadvantage = normal).
    pub fn combine(self, other: Advantage) -> Advantage {
        match (self, other) {
            (Advantage::Normal, x) | (x, Advantage::Normal) => x,
            (Advantage::Advantage, Advantage::Disadvantage)
            | (Advantage::Disadvantage, Advantage::Advantage) => Advantage::Normal,
            (same, _) => same,
        }
    }
}

/// Standard die sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DieType {
    D4,
    D6,
    D8,
    D10,
    D12,
    D20,
    D100,
}

impl DieType {
    pub fn sides(&self) -> u32 {
        match self {
            DieType::D4 => 4,
            DieType::D6 => 6,
            DieType::D8 => 8,
            DieType::D10 => 10,
            DieType::D12 => 12,
            DieType::D20 => 20,
            DieType::D100 => 100,
        }
    }

    pub fn from_sides(sides: u32) -> Option<DieType> {
        match sides {
            4 => Some(DieType::D4),
            6 => Some(DieType::D6),
            8 => Some(DieType::D8),
            10 => Some(DieType::D10),
            12 => Some(DieType::D12),
            20 => Some(DieType::D20),
            100 => Some(DieType::D100),
            _ => None,
        }
    }
}

impl fmt::Display for DieType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.sides())
    }
}

/// A single die component of a dice expression, e.g. the `2d6` in `2d6+3`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceComponent {
    pub count: u32,
    pub die_type: DieType,
    pub keep_highest: Option<u32>,
    pub keep_lowest: Option<u32>,
}

/// A parsed dice expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceExpression {
    pub components: Vec<DiceComponent>,
    pub modifier: i32,
    pub original: String,
}

impl DiceExpression {
    /// Parse a dice notation string.
    pub fn parse(notation: &str) -> Result<Self, DiceError> {
        let normalized: String = notation
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if normalized.is_empty() {
            return Err(DiceError::NoDice);
        }

        let mut components = Vec::new();
        let mut modifier: i32 = 0;
        let mut term_start = 0;
        let mut sign: i32 = 1;

        for (idx, ch) in normalized.char_indices() {
            if ch == '+' || ch == '-' {
                let term = &normalized[term_start..idx];
                if !term.is_empty() {
                    Self::parse_term(term, sign, &mut components, &mut modifier)?;
                } else if idx != 0 {
                    // Two signs in a row, e.g. "1d6+-2".
                    return Err(DiceError::InvalidNotation(notation.to_string()));
                }
                sign = if ch == '+' { 1 } else { -1 };
                term_start = idx + 1;
            }
        }

        let tail = &normalized[term_start..];
        if tail.is_empty() {
            return Err(DiceError::InvalidNotation(notation.to_string()));
        }
        Self::parse_term(tail, sign, &mut components, &mut modifier)?;

        if components.is_empty() && modifier == 0 {
            return Err(DiceError::NoDice);
        }

        Ok(DiceExpression {
            components,
            modifier,
            original: normalized,
        })
    }

    fn parse_term(
        term: &str,
        sign: i32,
        components: &mut Vec<DiceComponent>,
        modifier: &mut i32,
    ) -> Result<(), DiceError> {
        let invalid = || DiceError::InvalidNotation(term.to_string());

        let Some(d_pos) = term.find('d') else {
            let value: i32 = term.parse().map_err(|_| invalid())?;
            *modifier += sign * value;
            return Ok(());
        };

        // Subtracted dice ("1d20-1d4") are not meaningful for damage.
        if sign < 0 {
            return Err(invalid());
        }

        let count_str = &term[..d_pos];
        let count: u32 = if count_str.is_empty() {
            1
        } else {
            count_str.parse().map_err(|_| invalid())?
        };
        if count == 0 {
            return Err(invalid());
        }

        let rest = &term[d_pos + 1..];
        let (sides_str, keep_highest, keep_lowest) = match (rest.find("kh"), rest.find("kl")) {
            (Some(pos), _) => {
                let keep: u32 = rest[pos + 2..].parse().map_err(|_| invalid())?;
                (&rest[..pos], Some(keep), None)
            }
            (None, Some(pos)) => {
                let keep: u32 = rest[pos + 2..].parse().map_err(|_| invalid())?;
                (&rest[..pos], None, Some(keep))
            }
            (None, None) => (rest, None, None),
        };

        let sides: u32 = sides_str.parse().map_err(|_| invalid())?;
        let die_type = DieType::from_sides(sides).ok_or(DiceError::InvalidDieSize(sides))?;

        if let Some(keep) = keep_highest.or(keep_lowest) {
            if keep > count {
                return Err(DiceError::InvalidKeepCount {
                    keep,
                    count,
                    notation: term.to_string(),
                });
            }
        }

        components.push(DiceComponent {
            count,
            die_type,
            keep_highest,
            keep_lowest,
        });
        Ok(())
    }

    /// Smallest total this expression can produce.
    pub fn min(&self) -> i32 {
        let dice: u32 = self
            .components
            .iter()
            .map(|c| c.keep_highest.or(c.keep_lowest).unwrap_or(c.count))
            .sum();
        dice as i32 + self.modifier
    }

    /// Largest total this expression can produce.
    pub fn max(&self) -> i32 {
        let dice: u32 = self
            .components
            .iter()
            .map(|c| c.keep_highest.or(c.keep_lowest).unwrap_or(c.count) * c.die_type.sides())
            .sum();
        dice as i32 + self.modifier
    }

    /// Roll with a caller-supplied RNG.
    pub fn roll_with_rng<R: Rng>(&self, rng: &mut R) -> RollResult {
        let mut component_results = Vec::with_capacity(self.components.len());

        for component in &self.components {
            let rolls: Vec<u32> = (0..component.count)
                .map(|_| rng.gen_range(1..=component.die_type.sides()))
                .collect();

            let mut kept = rolls.clone();
            if let Some(keep) = component.keep_highest {
                kept.sort_by(|a, b| b.cmp(a));
                kept.truncate(keep as usize);
            } else if let Some(keep) = component.keep_lowest {
                kept.sort();
                kept.truncate(keep as usize);
            }

            let subtotal = kept.iter().sum();
            component_results.push(ComponentResult {
                die_type: component.die_type,
                rolls,
                kept,
                subtotal,
            });
        }

        let dice_total: i32 = component_results.iter().map(|c| c.subtotal as i32).sum();

        // Natural 20/1 only make sense for a lone d20.
        let natural = component_results
            .iter()
            .find(|c| c.die_type == DieType::D20 && c.rolls.len() == 1)
            .and_then(|c| c.rolls.first().copied());

        RollResult {
            notation: self.original.clone(),
            component_results,
            modifier: self.modifier,
            total: dice_total + self.modifier,
            natural_20: natural == Some(20),
            natural_1: natural == Some(1),
        }
    }
}

impl FromStr for DiceExpression {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DiceExpression::parse(s)
    }
}

impl fmt::Display for DiceExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original)
    }
}

/// Result of rolling a single dice component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentResult {
    pub die_type: DieType,
    pub rolls: Vec<u32>,
    pub kept: Vec<u32>,
    pub subtotal: u32,
}

/// Complete result of a dice roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollResult {
    pub notation: String,
    pub component_results: Vec<ComponentResult>,
    pub modifier: i32,
    pub total: i32,
    pub natural_20: bool,
    pub natural_1: bool,
}

/// Roll a single d20.
pub fn d20<R: Rng>(rng: &mut R) -> u32 {
    rng.gen_range(1..=20)
}

/// A d20 draw, possibly with advantage or disadvantage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct D20Roll {
    /// The face that counts.
    pub natural: u32,
    /// Every face drawn (two for advantage/disadvantage).
    pub rolls: Vec<u32>,
    pub advantage: Advantage,
}

impl D20Roll {
    /// Wrap a face read off a physical die.
    pub fn fixed(natural: u32) -> Self {
        Self {
            natural,
            rolls: vec![natural],
            advantage: Advantage::Normal,
        }
    }

    /// Like [`D20Roll::fixed`], rejecting faces a d20 doesn't have.
    pub fn from_face(natural: u32) -> Result<Self, DiceError> {
        if (1..=20).contains(&natural) {
            Ok(Self::fixed(natural))
        } else {
            Err(DiceError::InvalidFace {
                face: natural,
                sides: 20,
            })
        }
    }
}

/// Draw a d20, taking the higher of two on advantage and the lower on
/// disadvantage.
pub fn roll_d20<R: Rng>(advantage: Advantage, rng: &mut R) -> D20Roll {
    match advantage {
        Advantage::Normal => {
            let natural = d20(rng);
            D20Roll {
                natural,
                rolls: vec![natural],
                advantage,
            }
        }
        Advantage::Advantage | Advantage::Disadvantage => {
            let first = d20(rng);
            let second = d20(rng);
            let natural = if advantage == Advantage::Advantage {
                first.max(second)
            } else {
                first.min(second)
            };
            D20Roll {
                natural,
                rolls: vec![first, second],
                advantage,
            }
        }
    }
}

/// A damage roll, noting whether the notation had to be replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageRoll {
    pub notation: String,
    pub total: i32,
    pub used_fallback: bool,
}

/// Roll damage notation from static data.
///
/// Malformed notation is an authoring defect in the action tables: it is
/// logged and the `fallback` die is rolled instead. If the fallback itself
/// is malformed the result is a flat 1.
pub fn roll_damage_notation<R: Rng>(
    notation: &str,
    fallback: &str,
    rng: &mut R,
) -> DamageRoll {
    match DiceExpression::parse(notation) {
        Ok(expr) => DamageRoll {
            notation: expr.original.clone(),
            total: expr.roll_with_rng(rng).total.max(0),
            used_fallback: false,
        },
        Err(err) => {
            warn!(
                notation,
                fallback,
                error = %err,
                "invalid damage notation, rolling fallback die"
            );
            let total = DiceExpression::parse(fallback)
                .map(|expr| expr.roll_with_rng(rng).total.max(0))
                .unwrap_or(1);
            DamageRoll {
                notation: fallback.to_string(),
                total,
                used_fallback: true,
            }
        }
    }
}
