//! Sharing combat state between participants.
//!
//! The engine itself never touches storage. A [`CombatStore`] keeps one
//! [`CombatState`] document per campaign key and pushes every write to
//! subscribers. [`EncounterService`] is the layer that reads a document,
//! applies one engine operation and writes the changes back.

use crate::combat::{
    ActionOutcome, ActionRequest, CombatEngine, CombatLogEntry, CombatState, Combatant,
    CombatantId, ExternalRolls, InitiativeEntry, Phase, TurnChange,
};
use crate::error::CombatError;
use crate::grid::Grid;
use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

/// Buffered updates per subscriber before it starts lagging.
const CHANNEL_CAPACITY: usize = 64;

/// Errors from the synchronization layer.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("No combat stored under '{0}'")]
    NotFound(String),

    #[error("Patch rejected: {0}")]
    InvalidPatch(String),

    #[error("Store error: {0}")]
    Backend(String),

    #[error(transparent)]
    Combat(#[from] CombatError),
}

/// A partial update to a stored combat. `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub combatants: Option<Vec<Combatant>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initiative_order: Option<Vec<InitiativeEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_turn_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid: Option<Grid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<Vec<CombatLogEntry>>,
}

impl CombatPatch {
    /// A patch that overwrites every field.
    pub fn full(state: &CombatState) -> Self {
        Self {
            phase: Some(state.phase()),
            combatants: Some(state.combatants().to_vec()),
            initiative_order: Some(state.initiative_order().to_vec()),
            current_turn_index: Some(state.current_turn_index()),
            round: Some(state.round()),
            grid: Some(state.grid().clone()),
            log: Some(state.log().to_vec()),
        }
    }

    /// Only the fields that differ between two states.
    pub fn diff(before: &CombatState, after: &CombatState) -> Self {
        fn changed<T: PartialEq + Clone>(a: &T, b: &T) -> Option<T> {
            (a != b).then(|| b.clone())
        }

        Self {
            phase: changed(&before.phase(), &after.phase()),
            combatants: (before.combatants() != after.combatants())
                .then(|| after.combatants().to_vec()),
            initiative_order: (before.initiative_order() != after.initiative_order())
                .then(|| after.initiative_order().to_vec()),
            current_turn_index: changed(&before.current_turn_index(), &after.current_turn_index()),
            round: changed(&before.round(), &after.round()),
            grid: changed(before.grid(), after.grid()),
            log: (before.log() != after.log()).then(|| after.log().to_vec()),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Document store for combat states, keyed by campaign or party id.
#[async_trait]
pub trait CombatStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<CombatState>, SyncError>;

    /// Create or replace a document.
    async fn put(&self, key: &str, state: CombatState) -> Result<(), SyncError> {
        // Publish under the documents guard so subscribers see writes in
        // the order they were stored. `subscribe` never takes `documents`.
        let mut documents = self.documents.write().await;
        documents.insert(key.to_string(), state.clone());
        self.notify(key, &state).await;
        Ok(())
    }

    async fn update(&self, key: &str, patch: CombatPatch) -> Result<CombatState, SyncError> {
        let mut documents = self.documents.write().await;
        let state = documents
            .get_mut(key)
            .ok_or_else(|| SyncError::NotFound(key.to_string()))?;
        state.apply_patch(patch)?;
        let updated = state.clone();
        self.notify(key, &updated).await;
        Ok(updated)
    }

    async fn subscribe(&self, key: &str) -> Result<broadcast::Receiver<CombatState>, SyncError> {
        let mut channels = self.channels.write().await;
        let sender = channels
            .entry(key.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        Ok(sender.subscribe())
    }
}

/// Runs engine operations against stored combats.
///
/// This is the layer that enforces turn ownership: only the combatant
/// whose turn it is may act.
///
/// Each operation loads the document, runs the engine on a copy and writes
/// back the changed fields. There is no version compare, so the last write
/// wins. Callers must not submit a second action for the same actor until
/// the first one returns; a player client should disable its controls while
/// a submission is in flight.
pub struct EncounterService<S: CombatStore> {
    store: S,
    engine: CombatEngine,
}

impl<S: CombatStore> EncounterService<S> {
    pub fn new(store: S, engine: CombatEngine) -> Self {
        Self { store, engine }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn engine(&self) -> &CombatEngine {
        &self.engine
    }

    pub async fn create(&self, key: &str, state: CombatState) -> Result<(), SyncError> {
        self.store.put(key, state).await
    }

    pub async fn load(&self, key: &str) -> Result<CombatState, SyncError> {
        self.store
            .get(key)
            .await?
            .ok_or_else(|| SyncError::NotFound(key.to_string()))
    }

    async fn write_back(
        &self,
        key: &str,
        before: &CombatState,
        after: &CombatState,
    ) -> Result<(), SyncError> {
        let patch = CombatPatch::diff(before, after);
        if !patch.is_empty() {
            self.store.update(key, patch).await?;
        }
        Ok(())
    }

    pub async fn roll_initiative<R: Rng>(
        &self,
        key: &str,
        rng: &mut R,
    ) -> Result<Vec<InitiativeEntry>, SyncError> {
        let before = self.load(key).await?;
        let mut state = before.clone();
        let order = state.roll_initiative(rng)?.to_vec();
        self.write_back(key, &before, &state).await?;
        Ok(order)
    }

    pub async fn advance_turn(&self, key: &str) -> Result<TurnChange, SyncError> {
        let before = self.load(key).await?;
        let mut state = before.clone();
        let change = state.advance_turn()?;
        self.write_back(key, &before, &state).await?;
        Ok(change)
    }

    /// Resolve one action for `actor`.
    ///
    /// Out-of-turn actors get [`CombatError::NotTheirTurn`] and nothing is
    /// written. Once a player's action has been stored the turn has moved
    /// on, so a repeated submission is rejected the same way. Two
    /// submissions racing on the same snapshot are not detected.
    pub async fn perform_action<R: Rng>(
        &self,
        key: &str,
        actor: CombatantId,
        request: ActionRequest,
        external: &ExternalRolls,
        rng: &mut R,
    ) -> Result<ActionOutcome, SyncError> {
        let before = self.load(key).await?;
        if let Some(current) = before.current_combatant() {
            if current.id != actor {
                let name = before
                    .combatant(actor)
                    .map(|c| c.name.clone())
                    .ok_or(CombatError::CombatantNotFound(actor))?;
                return Err(CombatError::NotTheirTurn(name).into());
            }
        }

        let mut state = before.clone();
        let outcome = self
            .engine
            .perform_action(&mut state, actor, request, external, rng)?;
        self.write_back(key, &before, &state).await?;
        Ok(outcome)
    }

    pub async fn end_combat(&self, key: &str) -> Result<(), SyncError> {
        let before = self.load(key).await?;
        let mut state = before.clone();
        state.end_combat()?;
        self.write_back(key, &before, &state).await
    }
}
