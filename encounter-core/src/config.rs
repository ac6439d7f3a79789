//! Engine configuration.
//!
//! All tunables live here so a campaign can override them from a JSON file.
//! Missing fields fall back to the defaults below.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tokio::fs;

/// Errors from loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Tunables for the combat engine, interpreter and check resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Feet represented by one grid square.
    pub feet_per_square: u32,

    /// Reach of melee attacks without a declared range, in squares.
    pub melee_range: u32,

    /// Reach of ranged attacks without a declared range, in squares.
    pub ranged_range: u32,

    /// How far a single Move action may travel, in squares.
    pub move_range: u32,

    /// Die rolled when an action's damage notation is malformed.
    pub fallback_damage_die: String,

    /// Upper bound on a quantity like "50 backflips".
    pub max_quantity: u32,

    /// DC penalty added per extra action in one description.
    pub fatigue_step: i32,

    /// Roll penalty per repeated attempt in a multi-attempt check.
    pub attempt_fatigue_step: i32,

    pub default_grid_width: u32,
    pub default_grid_height: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            feet_per_square: 5,
            melee_range: 1,
            ranged_range: 3,
            move_range: 6,
            fallback_damage_die: "1d4".to_string(),
            max_quantity: 20,
            fatigue_step: 2,
            attempt_fatigue_step: 1,
            default_grid_width: 20,
            default_grid_height: 20,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_move_range(mut self, squares: u32) -> Self {
        self.move_range = squares;
        self
    }

    pub fn with_ranged_range(mut self, squares: u32) -> Self {
        self.ranged_range = squares;
        self
    }

    pub fn with_fallback_damage_die(mut self, notation: impl Into<String>) -> Self {
        self.fallback_damage_die = notation.into();
        self
    }

    pub fn with_max_quantity(mut self, max: u32) -> Self {
        self.max_quantity = max;
        self
    }

    pub fn with_grid(mut self, width: u32, height: u32) -> Self {
        self.default_grid_width = width;
        self.default_grid_height = height;
        self
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feet_per_square == 0 {
            return Err(ConfigError::Invalid("feet_per_square must be positive".into()));
        }
        if self.max_quantity == 0 {
            return Err(ConfigError::Invalid("max_quantity must be positive".into()));
        }
        if self.default_grid_width == 0 || self.default_grid_height == 0 {
            return Err(ConfigError::Invalid("grid dimensions must be positive".into()));
        }
        crate::dice::DiceExpression::parse(&self.fallback_damage_die).map_err(|e| {
            ConfigError::Invalid(format!("fallback_damage_die: {e}"))
        })?;
        Ok(())
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).await?;
        Self::from_json_str(&content)
    }
}
