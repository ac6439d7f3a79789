//! Combat participants and their action catalogs.

use crate::character::{Ability, AbilityScores, Character};
use crate::config::EngineConfig;
use crate::grid::Position;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a combatant within one combat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CombatantId(pub Uuid);

impl CombatantId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CombatantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CombatantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which side a combatant fights on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombatantKind {
    Player,
    Enemy,
}

/// Melee or ranged, for actions that don't declare an explicit range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttackReach {
    Melee,
    Ranged,
}

lazy_static::lazy_static! {
    static ref RANGE_FEET: Regex =
        Regex::new(r"(?i)(\d+)\s*(?:/\s*\d+\s*)?(?:ft\b|feet\b|foot\b|')")
            .expect("range pattern is valid");
}

/// A named attack from a combatant's catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatAction {
    pub name: String,
    pub reach: AttackReach,
    /// Explicit to-hit bonus. Players without one use their best of STR/DEX.
    #[serde(default)]
    pub attack_bonus: Option<i32>,
    /// Damage notation, e.g. `1d6+2`.
    pub damage: String,
    /// Declared range text, e.g. `reach 5 ft.` or `range 80/320 ft.`.
    #[serde(default)]
    pub range: Option<String>,
}

impl CombatAction {
    pub fn melee(name: impl Into<String>, damage: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reach: AttackReach::Melee,
            attack_bonus: None,
            damage: damage.into(),
            range: None,
        }
    }

    pub fn ranged(name: impl Into<String>, damage: impl Into<String>) -> Self {
        Self {
            reach: AttackReach::Ranged,
            ..Self::melee(name, damage)
        }
    }

    pub fn with_attack_bonus(mut self, bonus: i32) -> Self {
        self.attack_bonus = Some(bonus);
        self
    }

    pub fn with_range(mut self, range: impl Into<String>) -> Self {
        self.range = Some(range.into());
        self
    }

    /// Reach in grid squares.
    ///
    /// A declared range in feet wins (normal range only, at least one
    /// square); otherwise melee and ranged defaults apply.
    pub fn range_in_squares(&self, config: &EngineConfig) -> u32 {
        let declared = self
            .range
            .as_deref()
            .and_then(|text| RANGE_FEET.captures(text))
            .and_then(|caps| caps[1].parse::<u32>().ok());

        match declared {
            Some(feet) => (feet / config.feet_per_square.max(1)).max(1),
            None => match self.reach {
                AttackReach::Melee => config.melee_range,
                AttackReach::Ranged => config.ranged_range,
            },
        }
    }
}

/// A named condition with an optional round countdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEffect {
    pub name: String,
    #[serde(default)]
    pub remaining_rounds: Option<u32>,
}

impl StatusEffect {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            remaining_rounds: None,
        }
    }

    pub fn for_rounds(name: impl Into<String>, rounds: u32) -> Self {
        Self {
            name: name.into(),
            remaining_rounds: Some(rounds),
        }
    }
}

/// A combat participant.
///
/// HP always satisfies `0 <= hp <= max_hp` with `max_hp >= 1`, including
/// for deserialized documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CombatantRecord")]
pub struct Combatant {
    pub id: CombatantId,
    pub name: String,
    pub kind: CombatantKind,
    pub position: Option<Position>,
    hp: i32,
    max_hp: i32,
    pub armor_class: i32,
    pub initiative_modifier: i32,
    pub ability_scores: AbilityScores,
    pub actions: Vec<CombatAction>,
    pub status_effects: Vec<StatusEffect>,
}

/// Wire shape of [`Combatant`] before the HP bounds are checked.
#[derive(Deserialize)]
struct CombatantRecord {
    id: CombatantId,
    name: String,
    kind: CombatantKind,
    #[serde(default)]
    position: Option<Position>,
    hp: i32,
    max_hp: i32,
    armor_class: i32,
    initiative_modifier: i32,
    #[serde(default)]
    ability_scores: AbilityScores,
    #[serde(default)]
    actions: Vec<CombatAction>,
    #[serde(default)]
    status_effects: Vec<StatusEffect>,
}

impl TryFrom<CombatantRecord> for Combatant {
    type Error = String;

    fn try_from(raw: CombatantRecord) -> Result<Self, Self::Error> {
        if raw.max_hp < 1 {
            return Err(format!("{} has max_hp {}", raw.name, raw.max_hp));
        }
        if !(0..=raw.max_hp).contains(&raw.hp) {
            return Err(format!("{} has hp {} outside 0..={}", raw.name, raw.hp, raw.max_hp));
        }

        Ok(Self {
            id: raw.id,
            name: raw.name,
            kind: raw.kind,
            position: raw.position,
            hp: raw.hp,
            max_hp: raw.max_hp,
            armor_class: raw.armor_class,
            initiative_modifier: raw.initiative_modifier,
            ability_scores: raw.ability_scores,
            actions: raw.actions,
            status_effects: raw.status_effects,
        })
    }
}

impl Combatant {
    fn new(name: impl Into<String>, kind: CombatantKind, max_hp: i32, armor_class: i32) -> Self {
        let max_hp = max_hp.max(1);
        Self {
            id: CombatantId::new(),
            name: name.into(),
            kind,
            position: None,
            hp: max_hp,
            max_hp,
            armor_class,
            initiative_modifier: 0,
            ability_scores: AbilityScores::default(),
            actions: Vec::new(),
            status_effects: Vec::new(),
        }
    }

    /// A player combatant at full health. Initiative comes from DEX.
    pub fn player(
        name: impl Into<String>,
        max_hp: i32,
        armor_class: i32,
        ability_scores: AbilityScores,
    ) -> Self {
        let mut combatant = Self::new(name, CombatantKind::Player, max_hp, armor_class);
        combatant.initiative_modifier = ability_scores.modifier(Ability::Dexterity);
        combatant.ability_scores = ability_scores;
        combatant
    }

    /// A player combatant built from a character sheet.
    pub fn from_character(character: &Character, max_hp: i32, armor_class: i32) -> Self {
        Self::player(
            character.name.clone(),
            max_hp,
            armor_class,
            character.ability_scores,
        )
    }

    /// An enemy at full health with its own action catalog.
    pub fn enemy(
        name: impl Into<String>,
        max_hp: i32,
        armor_class: i32,
        initiative_modifier: i32,
        actions: Vec<CombatAction>,
    ) -> Self {
        let mut combatant = Self::new(name, CombatantKind::Enemy, max_hp, armor_class);
        combatant.initiative_modifier = initiative_modifier;
        combatant.actions = actions;
        combatant
    }

    pub fn at(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_id(mut self, id: CombatantId) -> Self {
        self.id = id;
        self
    }

    pub fn with_initiative_modifier(mut self, modifier: i32) -> Self {
        self.initiative_modifier = modifier;
        self
    }

    /// Start below full health. Clamped to `0..=max_hp`.
    pub fn with_hp(mut self, hp: i32) -> Self {
        self.hp = hp.clamp(0, self.max_hp);
        self
    }

    pub fn hp(&self) -> i32 {
        self.hp
    }

    pub fn max_hp(&self) -> i32 {
        self.max_hp
    }

    pub fn is_player(&self) -> bool {
        self.kind == CombatantKind::Player
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// Apply damage, never dropping below 0. Returns HP actually lost.
    pub fn take_damage(&mut self, amount: i32) -> i32 {
        let before = self.hp;
        self.hp = self.hp.saturating_sub(amount.max(0)).max(0);
        before - self.hp
    }

    /// Restore HP, never exceeding the maximum. Returns HP actually gained.
    pub fn heal(&mut self, amount: i32) -> i32 {
        let before = self.hp;
        self.hp = self.hp.saturating_add(amount.max(0)).min(self.max_hp);
        self.hp - before
    }

    pub fn has_status(&self, name: &str) -> bool {
        self.status_effects
            .iter()
            .any(|s| s.name.eq_ignore_ascii_case(name))
    }

    pub fn add_status(&mut self, effect: StatusEffect) {
        self.status_effects.retain(|s| !s.name.eq_ignore_ascii_case(&effect.name));
        self.status_effects.push(effect);
    }

    /// Count down timed effects by one round, dropping the expired ones.
    pub(crate) fn tick_status_effects(&mut self) -> Vec<String> {
        let mut expired = Vec::new();
        self.status_effects.retain_mut(|effect| {
            let Some(rounds) = effect.remaining_rounds.as_mut() else {
                return true;
            };
            if *rounds <= 1 {
                expired.push(effect.name.clone());
                false
            } else {
                *rounds -= 1;
                true
            }
        });
        expired
    }

    /// Look up a catalog action by name, ignoring case.
    pub fn find_action(&self, name: &str) -> Option<&CombatAction> {
        self.actions
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }
}
