//! Monster stat blocks.
//!
//! A `MonsterCatalog` is a read-only table handed to whatever spawns
//! enemies. The engine never reaches for a global: callers either take
//! [`MonsterCatalog::standard`] or load their own from JSON.

use crate::combat::{CombatAction, Combatant};
use crate::grid::Position;
use serde::{Deserialize, Serialize};

/// One monster's combat statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonsterTemplate {
    pub name: String,
    pub max_hp: i32,
    pub armor_class: i32,
    #[serde(default)]
    pub initiative_modifier: i32,
    #[serde(default)]
    pub actions: Vec<CombatAction>,
}

impl MonsterTemplate {
    pub fn new(
        name: impl Into<String>,
        max_hp: i32,
        armor_class: i32,
        initiative_modifier: i32,
    ) -> Self {
        Self {
            name: name.into(),
            max_hp,
            armor_class,
            initiative_modifier,
            actions: Vec::new(),
        }
    }

    pub fn with_action(mut self, action: CombatAction) -> Self {
        self.actions.push(action);
        self
    }

    /// A fresh enemy combatant with its own id and full HP.
    pub fn to_combatant(&self) -> Combatant {
        Combatant::enemy(
            self.name.clone(),
            self.max_hp,
            self.armor_class,
            self.initiative_modifier,
            self.actions.clone(),
        )
    }
}

lazy_static::lazy_static! {
    /// Low-level monsters from the 5e SRD.
    static ref STANDARD_MONSTERS: Vec<MonsterTemplate> = vec![
        MonsterTemplate::new("Goblin", 7, 15, 2)
            .with_action(
                CombatAction::melee("Scimitar", "1d6+2")
                    .with_attack_bonus(4)
                    .with_range("reach 5 ft."),
            )
            .with_action(
                CombatAction::ranged("Shortbow", "1d6+2")
                    .with_attack_bonus(4)
                    .with_range("range 80/320 ft."),
            ),
        MonsterTemplate::new("Orc", 15, 13, 1)
            .with_action(
                CombatAction::melee("Greataxe", "1d12+3")
                    .with_attack_bonus(5)
                    .with_range("reach 5 ft."),
            )
            .with_action(
                CombatAction::ranged("Javelin", "1d6+3")
                    .with_attack_bonus(5)
                    .with_range("range 30/120 ft."),
            ),
        MonsterTemplate::new("Skeleton", 13, 13, 2)
            .with_action(
                CombatAction::melee("Shortsword", "1d6+2")
                    .with_attack_bonus(4)
                    .with_range("reach 5 ft."),
            )
            .with_action(
                CombatAction::ranged("Shortbow", "1d6+2")
                    .with_attack_bonus(4)
                    .with_range("range 80/320 ft."),
            ),
        MonsterTemplate::new("Wolf", 11, 13, 2)
            .with_action(
                CombatAction::melee("Bite", "2d4+2")
                    .with_attack_bonus(4)
                    .with_range("reach 5 ft."),
            ),
        MonsterTemplate::new("Bandit", 11, 12, 1)
            .with_action(
                CombatAction::melee("Scimitar", "1d6+1")
                    .with_attack_bonus(3)
                    .with_range("reach 5 ft."),
            )
            .with_action(
                CombatAction::ranged("Light Crossbow", "1d8+1")
                    .with_attack_bonus(3)
                    .with_range("range 80/320 ft."),
            ),
        MonsterTemplate::new("Kobold", 5, 12, 2)
            .with_action(
                CombatAction::melee("Dagger", "1d4+2")
                    .with_attack_bonus(4)
                    .with_range("reach 5 ft."),
            )
            .with_action(
                CombatAction::ranged("Sling", "1d4+2")
                    .with_attack_bonus(4)
                    .with_range("range 30/120 ft."),
            ),
    ];
}

/// Read-only monster lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonsterCatalog {
    monsters: Vec<MonsterTemplate>,
}

impl MonsterCatalog {
    pub fn new(monsters: Vec<MonsterTemplate>) -> Self {
        Self { monsters }
    }

    /// The built-in SRD monsters.
    pub fn standard() -> Self {
        Self::new(STANDARD_MONSTERS.clone())
    }

    /// Parse a JSON array of stat blocks.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let monsters: Vec<MonsterTemplate> = serde_json::from_str(json)?;
        Ok(Self::new(monsters))
    }

    /// Find a monster by name, ignoring case.
    pub fn get(&self, name: &str) -> Option<&MonsterTemplate> {
        self.monsters
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.monsters.iter().map(|m| m.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.monsters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monsters.is_empty()
    }

    /// Create a positioned enemy from a stat block.
    pub fn spawn(&self, name: &str, position: Position) -> Option<Combatant> {
        self.get(name).map(|m| m.to_combatant().at(position))
    }
}
