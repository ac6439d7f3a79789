//! Skill checks for interpreted actions.
//!
//! A check is `d20 + primary ability modifier + proficiency + circumstances`
//! against a DC. Each action type has a fixed [`CheckProfile`] naming its
//! base DC, the abilities it leans on and the classes trained in it.

use crate::character::{Ability, Character, CharacterClass};
use crate::config::EngineConfig;
use crate::dice::{self, Advantage, D20Roll, DiceError};
use crate::interpret::{patterns, ActionIntent, ActionType};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// How an action type is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckProfile {
    pub base_dc: i32,
    /// The ability whose modifier is added to the roll.
    pub primary: Ability,
    /// Reported alongside the result; never added.
    pub secondary: Ability,
    pub proficient_classes: &'static [CharacterClass],
}

impl CheckProfile {
    const fn new(
        base_dc: i32,
        primary: Ability,
        secondary: Ability,
        proficient_classes: &'static [CharacterClass],
    ) -> Self {
        Self {
            base_dc,
            primary,
            secondary,
            proficient_classes,
        }
    }

    /// The fixed profile for an action type.
    pub fn for_action(action_type: ActionType) -> Self {
        use Ability::*;
        use CharacterClass::*;

        match action_type {
            ActionType::Attack => {
                Self::new(12, Strength, Dexterity, &[Fighter, Barbarian, Paladin, Ranger, Monk])
            }
            ActionType::Spell => Self::new(
                13,
                Intelligence,
                Wisdom,
                &[Wizard, Sorcerer, Warlock, Cleric, Druid, Bard],
            ),
            ActionType::Dodge => Self::new(12, Dexterity, Wisdom, &[Monk, Rogue, Ranger]),
            ActionType::Parry => Self::new(13, Dexterity, Strength, &[Fighter, Paladin]),
            ActionType::Backflip => Self::new(15, Dexterity, Strength, &[Monk, Rogue]),
            ActionType::Frontflip => Self::new(14, Dexterity, Strength, &[Monk, Rogue]),
            ActionType::Cartwheel => Self::new(12, Dexterity, Strength, &[Monk, Rogue, Bard]),
            ActionType::Somersault => Self::new(13, Dexterity, Constitution, &[Monk, Rogue]),
            ActionType::Handstand => Self::new(11, Strength, Dexterity, &[Monk]),
            ActionType::Run => Self::new(10, Constitution, Dexterity, &[Barbarian, Ranger, Monk]),
            ActionType::Jump => Self::new(12, Strength, Dexterity, &[Barbarian, Fighter, Monk]),
            ActionType::Climb => Self::new(13, Strength, Dexterity, &[Ranger, Barbarian, Rogue]),
            ActionType::Swim => Self::new(12, Strength, Constitution, &[Ranger, Barbarian, Druid]),
            ActionType::Persuade => {
                Self::new(13, Charisma, Wisdom, &[Bard, Paladin, Sorcerer, Warlock])
            }
            ActionType::Intimidate => {
                Self::new(13, Charisma, Strength, &[Barbarian, Fighter, Warlock])
            }
            ActionType::Deceive => Self::new(14, Charisma, Intelligence, &[Rogue, Bard, Warlock]),
            ActionType::Perform => Self::new(12, Charisma, Dexterity, &[Bard]),
            ActionType::Search => Self::new(12, Intelligence, Wisdom, &[Rogue, Wizard, Ranger]),
            ActionType::Listen => Self::new(11, Wisdom, Intelligence, &[Ranger, Druid, Cleric]),
            ActionType::Track => Self::new(14, Wisdom, Intelligence, &[Ranger, Druid]),
            ActionType::Hide => Self::new(13, Dexterity, Wisdom, &[Rogue, Ranger]),
            ActionType::Sneak => Self::new(14, Dexterity, Wisdom, &[Rogue, Ranger, Monk]),
            ActionType::Lockpick => Self::new(15, Dexterity, Intelligence, &[Rogue]),
            ActionType::Grapple => Self::new(13, Strength, Dexterity, &[Fighter, Barbarian, Monk]),
        }
    }
}

/// Signed modifier for a canonical circumstance tag. Unknown tags are 0.
pub fn circumstance_modifier(tag: &str) -> i32 {
    match tag.trim().to_lowercase().as_str() {
        "in darkness" => -2,
        "in dim light" => -1,
        "in bright light" => 1,
        "without tools" => -2,
        "with tools" => 2,
        "while injured" => -2,
        "while fatigued" => -2,
        "in bad weather" => -1,
        "on slippery ground" => -2,
        "with cover" => 2,
        "from high ground" => 1,
        "carefully" => 1,
        "in a hurry" => -2,
        "at night" => -1,
        "with help" => 2,
        "while observed" => -1,
        "in heavy armor" => -2,
        "underwater" => -2,
        "while distracted" => -2,
        "while blinded" => -5,
        "with a running start" => 2,
        "with a rope" => 2,
        "under pressure" => -1,
        _ => 0,
    }
}

/// How well a check went.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Degree {
    CriticalFailure,
    GreatFailure,
    Failure,
    Success,
    GreatSuccess,
    CriticalSuccess,
}

impl Degree {
    /// Bands: ≥10, ≥5, ≥0 succeed; ≤-10, ≤-5 and the rest fail.
    pub fn from_margin(margin: i32) -> Self {
        match margin {
            m if m >= 10 => Degree::CriticalSuccess,
            m if m >= 5 => Degree::GreatSuccess,
            m if m >= 0 => Degree::Success,
            m if m <= -10 => Degree::CriticalFailure,
            m if m <= -5 => Degree::GreatFailure,
            _ => Degree::Failure,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Degree::Success | Degree::GreatSuccess | Degree::CriticalSuccess
        )
    }
}

impl fmt::Display for Degree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Degree::CriticalFailure => "critical failure",
            Degree::GreatFailure => "great failure",
            Degree::Failure => "failure",
            Degree::Success => "success",
            Degree::GreatSuccess => "great success",
            Degree::CriticalSuccess => "critical success",
        };
        f.write_str(text)
    }
}

/// A resolved check. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillCheckResult {
    pub action_type: ActionType,
    /// The d20 face that counted.
    pub roll: u32,
    /// Every d20 drawn.
    pub rolls: Vec<u32>,
    pub advantage: Advantage,
    pub ability: Ability,
    pub ability_modifier: i32,
    pub secondary_ability: Ability,
    pub secondary_modifier: i32,
    /// 0 when not proficient.
    pub proficiency_bonus: i32,
    pub circumstances: Vec<String>,
    pub circumstance_bonus: i32,
    /// Sum of the "while fatigued" tags.
    pub fatigue_penalty: i32,
    /// Extra penalty for later attempts in a series.
    #[serde(default)]
    pub attempt_penalty: i32,
    pub total_roll: i32,
    pub dc: i32,
    pub margin: i32,
    pub degree: Degree,
    pub is_success: bool,
}

impl fmt::Display for SkillCheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} check: {} vs DC {} ({})",
            self.action_type, self.total_roll, self.dc, self.degree
        )
    }
}

/// Aggregate of a run of repeated attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptSeries {
    pub results: Vec<SkillCheckResult>,
    pub successes: u32,
    pub success_rate: f64,
    pub critical_successes: u32,
    pub critical_failures: u32,
    /// Mean of the raw d20 faces.
    pub average_roll: f64,
}

impl AttemptSeries {
    fn from_results(results: Vec<SkillCheckResult>) -> Self {
        let count = |degree: Degree| results.iter().filter(|r| r.degree == degree).count() as u32;
        let successes = results.iter().filter(|r| r.is_success).count() as u32;
        let critical_successes = count(Degree::CriticalSuccess);
        let critical_failures = count(Degree::CriticalFailure);

        let (success_rate, average_roll) = if results.is_empty() {
            (0.0, 0.0)
        } else {
            let n = results.len() as f64;
            let sum: u32 = results.iter().map(|r| r.roll).sum();
            (successes as f64 / n, sum as f64 / n)
        };

        Self {
            results,
            successes,
            success_rate,
            critical_successes,
            critical_failures,
            average_roll,
        }
    }

    pub fn attempts(&self) -> usize {
        self.results.len()
    }
}

/// Resolves skill checks for characters.
#[derive(Debug, Clone, Default)]
pub struct SkillCheckResolver {
    config: EngineConfig,
}

impl SkillCheckResolver {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Whether the character adds proficiency to this action type.
    pub fn is_proficient(&self, character: &Character, action_type: ActionType) -> bool {
        CheckProfile::for_action(action_type)
            .proficient_classes
            .contains(&character.class)
            || character.proficiencies.contains(&action_type)
    }

    /// Roll a check.
    pub fn perform_check<R: Rng>(
        &self,
        character: &Character,
        action_type: ActionType,
        circumstances: &[String],
        dc: Option<i32>,
        advantage: Advantage,
        rng: &mut R,
    ) -> SkillCheckResult {
        let d20 = dice::roll_d20(advantage, rng);
        self.resolve(character, action_type, circumstances, dc, d20, 0)
    }

    /// Resolve a check from a d20 face rolled at the table.
    pub fn check_with_natural(
        &self,
        character: &Character,
        action_type: ActionType,
        circumstances: &[String],
        dc: Option<i32>,
        natural: u32,
    ) -> Result<SkillCheckResult, DiceError> {
        let d20 = D20Roll::from_face(natural)?;
        Ok(self.resolve(character, action_type, circumstances, dc, d20, 0))
    }

    /// Roll the same check several times, each attempt more tiring than the
    /// last.
    #[allow(clippy::too_many_arguments)]
    pub fn perform_attempts<R: Rng>(
        &self,
        character: &Character,
        action_type: ActionType,
        circumstances: &[String],
        dc: Option<i32>,
        attempts: u32,
        advantage: Advantage,
        rng: &mut R,
    ) -> AttemptSeries {
        let results = (0..attempts)
            .map(|index| {
                let d20 = dice::roll_d20(advantage, rng);
                let penalty = index as i32 * self.config.attempt_fatigue_step;
                self.resolve(character, action_type, circumstances, dc, d20, penalty)
            })
            .collect();
        AttemptSeries::from_results(results)
    }

    /// Check every intent with its own circumstances.
    pub fn resolve_intents<R: Rng>(
        &self,
        character: &Character,
        intents: &[ActionIntent],
        dc: Option<i32>,
        advantage: Advantage,
        rng: &mut R,
    ) -> Vec<SkillCheckResult> {
        intents
            .iter()
            .map(|intent| {
                self.perform_check(
                    character,
                    intent.action_type,
                    &intent.circumstances,
                    dc,
                    advantage,
                    rng,
                )
            })
            .collect()
    }

    fn resolve(
        &self,
        character: &Character,
        action_type: ActionType,
        circumstances: &[String],
        dc: Option<i32>,
        d20: D20Roll,
        attempt_penalty: i32,
    ) -> SkillCheckResult {
        let profile = CheckProfile::for_action(action_type);
        let dc = dc.unwrap_or(profile.base_dc);

        let ability_modifier = character.ability_scores.modifier(profile.primary);
        let secondary_modifier = character.ability_scores.modifier(profile.secondary);
        let proficiency_bonus = if self.is_proficient(character, action_type) {
            character.proficiency_bonus()
        } else {
            0
        };

        let mut circumstance_bonus = 0;
        let mut fatigue_penalty = 0;
        for tag in circumstances {
            if tag.trim().eq_ignore_ascii_case(patterns::FATIGUE_TAG) {
                fatigue_penalty -= self.config.fatigue_step;
            } else {
                circumstance_bonus += circumstance_modifier(tag);
            }
        }

        let total_roll = d20.natural as i32
            + ability_modifier
            + proficiency_bonus
            + circumstance_bonus
            + fatigue_penalty
            - attempt_penalty;
        let margin = total_roll - dc;
        let degree = Degree::from_margin(margin);

        debug!(
            character = %character.name,
            action = %action_type,
            roll = d20.natural,
            total_roll,
            dc,
            %degree,
            "skill check"
        );

        SkillCheckResult {
            action_type,
            roll: d20.natural,
            rolls: d20.rolls,
            advantage: d20.advantage,
            ability: profile.primary,
            ability_modifier,
            secondary_ability: profile.secondary,
            secondary_modifier,
            proficiency_bonus,
            circumstances: circumstances.to_vec(),
            circumstance_bonus,
            fatigue_penalty,
            attempt_penalty,
            total_roll,
            dc,
            margin,
            degree,
            is_success: margin >= 0,
        }
    }
}
