//! Free-text action interpretation.
//!
//! Turns a player's description ("I do 6 backflips and then hide in the
//! dark") into structured [`ActionIntent`]s the check resolver can roll.
//! The parsing is a regex heuristic driven by the tables in [`patterns`];
//! nothing downstream depends on it beyond the `ActionIntent` shape.
//!
//! Pipeline, in order:
//! 1. denylist: impossible requests are rejected outright
//! 2. quantities: "6 backflips", "three cartwheels", "jump twice"
//! 3. sequences: different verbs joined by "and" / "then"
//! 4. fallback: any other recognized verb, once per action type
//!
//! Text with no recognized verb is narrative and yields no intents.

pub mod patterns;

use crate::config::EngineConfig;
use crate::error::CombatError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

/// Broad grouping of action types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionCategory {
    Attack,
    Spell,
    Defense,
    Acrobatics,
    Movement,
    Social,
    Perception,
    Utility,
}

/// Every kind of action the interpreter can recognize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Attack,
    Spell,
    Dodge,
    Parry,
    Backflip,
    Frontflip,
    Cartwheel,
    Somersault,
    Handstand,
    Run,
    Jump,
    Climb,
    Swim,
    Persuade,
    Intimidate,
    Deceive,
    Perform,
    Search,
    Listen,
    Track,
    Hide,
    Sneak,
    Lockpick,
    Grapple,
}

impl ActionType {
    pub const ALL: &'static [ActionType] = &[
        ActionType::Attack,
        ActionType::Spell,
        ActionType::Dodge,
        ActionType::Parry,
        ActionType::Backflip,
        ActionType::Frontflip,
        ActionType::Cartwheel,
        ActionType::Somersault,
        ActionType::Handstand,
        ActionType::Run,
        ActionType::Jump,
        ActionType::Climb,
        ActionType::Swim,
        ActionType::Persuade,
        ActionType::Intimidate,
        ActionType::Deceive,
        ActionType::Perform,
        ActionType::Search,
        ActionType::Listen,
        ActionType::Track,
        ActionType::Hide,
        ActionType::Sneak,
        ActionType::Lockpick,
        ActionType::Grapple,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Attack => "attack",
            ActionType::Spell => "spell",
            ActionType::Dodge => "dodge",
            ActionType::Parry => "parry",
            ActionType::Backflip => "backflip",
            ActionType::Frontflip => "frontflip",
            ActionType::Cartwheel => "cartwheel",
            ActionType::Somersault => "somersault",
            ActionType::Handstand => "handstand",
            ActionType::Run => "run",
            ActionType::Jump => "jump",
            ActionType::Climb => "climb",
            ActionType::Swim => "swim",
            ActionType::Persuade => "persuade",
            ActionType::Intimidate => "intimidate",
            ActionType::Deceive => "deceive",
            ActionType::Perform => "perform",
            ActionType::Search => "search",
            ActionType::Listen => "listen",
            ActionType::Track => "track",
            ActionType::Hide => "hide",
            ActionType::Sneak => "sneak",
            ActionType::Lockpick => "lockpick",
            ActionType::Grapple => "grapple",
        }
    }

    pub fn category(&self) -> ActionCategory {
        match self {
            ActionType::Attack => ActionCategory::Attack,
            ActionType::Spell => ActionCategory::Spell,
            ActionType::Dodge | ActionType::Parry => ActionCategory::Defense,
            ActionType::Backflip
            | ActionType::Frontflip
            | ActionType::Cartwheel
            | ActionType::Somersault
            | ActionType::Handstand => ActionCategory::Acrobatics,
            ActionType::Run | ActionType::Jump | ActionType::Climb | ActionType::Swim => {
                ActionCategory::Movement
            }
            ActionType::Persuade
            | ActionType::Intimidate
            | ActionType::Deceive
            | ActionType::Perform => ActionCategory::Social,
            ActionType::Search | ActionType::Listen | ActionType::Track => {
                ActionCategory::Perception
            }
            ActionType::Hide | ActionType::Sneak | ActionType::Lockpick | ActionType::Grapple => {
                ActionCategory::Utility
            }
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown action type: {0}")]
pub struct UnknownActionType(pub String);

impl FromStr for ActionType {
    type Err = UnknownActionType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        ActionType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownActionType(s.to_string()))
    }
}

/// One check-worthy action extracted from a description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionIntent {
    pub action_type: ActionType,
    /// Size of the quantity run this intent belongs to, 1 otherwise.
    pub quantity: u32,
    /// 1-based position within its run or sequence.
    pub sequence_position: u32,
    pub sequence_total: u32,
    /// True when produced by a conjunction chain ("X and then Y").
    pub is_sequence: bool,
    pub circumstances: Vec<String>,
    /// The words this intent was read from.
    pub source_text: String,
}

impl ActionIntent {
    fn single(action_type: ActionType, source_text: &str) -> Self {
        Self {
            action_type,
            quantity: 1,
            sequence_position: 1,
            sequence_total: 1,
            is_sequence: false,
            circumstances: Vec::new(),
            source_text: source_text.to_string(),
        }
    }

    /// How many fatigue tags this intent carries.
    pub fn fatigue_level(&self) -> usize {
        self.circumstances
            .iter()
            .filter(|c| c.as_str() == patterns::FATIGUE_TAG)
            .count()
    }
}

/// Situation the description is read in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpretContext {
    /// Circumstances already known to the caller.
    pub circumstances: Vec<String>,
    /// Features of the scene, e.g. "in the dark" or "slippery floor".
    pub environment_features: Vec<String>,
    /// Names of NPCs who can see the action.
    pub npcs_present: Vec<String>,
}

impl InterpretContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_circumstance(mut self, circumstance: impl Into<String>) -> Self {
        self.circumstances.push(circumstance.into());
        self
    }

    pub fn with_environment(mut self, feature: impl Into<String>) -> Self {
        self.environment_features.push(feature.into());
        self
    }

    pub fn with_npc(mut self, name: impl Into<String>) -> Self {
        self.npcs_present.push(name.into());
        self
    }
}

/// Result of interpreting one description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interpretation {
    pub possible: bool,
    /// Why the action was rejected, when `possible` is false.
    pub rejection: Option<String>,
    pub intents: Vec<ActionIntent>,
    /// Version of the pattern tables that produced this.
    pub pattern_version: u32,
}

impl Interpretation {
    fn rejected(reason: &str) -> Self {
        Self {
            possible: false,
            rejection: Some(reason.to_string()),
            intents: Vec::new(),
            pattern_version: patterns::PATTERN_TABLE_VERSION,
        }
    }

    fn accepted(intents: Vec<ActionIntent>) -> Self {
        Self {
            possible: true,
            rejection: None,
            intents,
            pattern_version: patterns::PATTERN_TABLE_VERSION,
        }
    }

    /// Possible, but nothing to roll.
    pub fn is_narrative(&self) -> bool {
        self.possible && self.intents.is_empty()
    }

    /// The intents, or `ImpossibleAction` if the description was rejected.
    pub fn ensure_possible(self) -> Result<Vec<ActionIntent>, CombatError> {
        if self.possible {
            Ok(self.intents)
        } else {
            Err(CombatError::ImpossibleAction {
                reason: self
                    .rejection
                    .unwrap_or_else(|| "That cannot be done".to_string()),
            })
        }
    }
}

struct CompiledTables {
    denylist: Vec<(Regex, &'static str)>,
    verbs: Vec<(ActionType, Regex)>,
    circumstances: Vec<(Regex, &'static str)>,
    count_prefix: Regex,
    repeat_suffix: Regex,
    conjunction: Regex,
    sentence_break: Regex,
}

fn compile(pattern: &str) -> Regex {
    Regex::new(&format!("(?i){pattern}")).expect("interpreter pattern tables are valid")
}

impl CompiledTables {
    fn build() -> Self {
        let numbers = patterns::NUMBER_WORDS
            .iter()
            .map(|(word, _)| *word)
            .collect::<Vec<_>>()
            .join("|");
        let repeats = patterns::REPEAT_WORDS
            .iter()
            .map(|(word, _)| *word)
            .collect::<Vec<_>>()
            .join("|");

        Self {
            denylist: patterns::DENYLIST
                .iter()
                .map(|(pattern, reason)| (compile(pattern), *reason))
                .collect(),
            verbs: patterns::VERB_PATTERNS
                .iter()
                .map(|(action_type, pattern)| {
                    (*action_type, compile(&format!(r"\b(?:{pattern})\b")))
                })
                .collect(),
            circumstances: patterns::CIRCUMSTANCE_PHRASES
                .iter()
                .map(|(pattern, tag)| (compile(pattern), *tag))
                .collect(),
            // "<N> [adjective] " right before a verb.
            count_prefix: compile(&format!(r"\b(\d+|{numbers})\s+(?:[a-z'-]+\s+)?$")),
            // " twice" or " <N> times" right after a verb.
            repeat_suffix: compile(&format!(r"^\s+(?:({repeats})|(\d+|{numbers})\s+times)\b")),
            conjunction: compile(r"\b(?:and|then)\b"),
            sentence_break: compile(r"[.;!?]"),
        }
    }
}

lazy_static::lazy_static! {
    static ref TABLES: CompiledTables = CompiledTables::build();
}

fn parse_count(word: &str) -> Option<u32> {
    if let Ok(n) = word.parse::<u32>() {
        return Some(n);
    }
    patterns::NUMBER_WORDS
        .iter()
        .chain(patterns::REPEAT_WORDS)
        .find(|(w, _)| w.eq_ignore_ascii_case(word))
        .map(|(_, n)| *n)
}

/// A recognized verb in the text.
#[derive(Debug, Clone, Copy)]
struct VerbHit {
    action_type: ActionType,
    start: usize,
    end: usize,
}

/// Reads free text into action intents.
#[derive(Debug, Clone)]
pub struct ActionInterpreter {
    max_quantity: u32,
}

impl Default for ActionInterpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionInterpreter {
    pub fn new() -> Self {
        Self::with_config(&EngineConfig::default())
    }

    pub fn with_config(config: &EngineConfig) -> Self {
        Self {
            max_quantity: config.max_quantity.max(1),
        }
    }

    pub fn pattern_version(&self) -> u32 {
        patterns::PATTERN_TABLE_VERSION
    }

    /// Interpret one description.
    pub fn interpret(&self, text: &str, context: &InterpretContext) -> Interpretation {
        if let Some(reason) = self.denied(text) {
            warn!(text, reason, "impossible action rejected");
            return Interpretation::rejected(reason);
        }

        let hits = self.verb_hits(text);
        if hits.is_empty() {
            debug!(text, "no recognized actions, treating as narrative");
            return Interpretation::accepted(Vec::new());
        }

        let mut captured = vec![false; hits.len()];
        let mut placed: Vec<(usize, ActionIntent)> = Vec::new();

        self.extract_quantities(text, &hits, &mut captured, &mut placed);
        Self::extract_sequences(text, &hits, &mut captured, &mut placed);
        Self::extract_remaining(text, &hits, &captured, &mut placed);

        // Stable, so runs keep their internal order.
        placed.sort_by_key(|(start, _)| *start);

        let circumstances = self.merged_circumstances(text, context);
        let intents: Vec<ActionIntent> = placed
            .into_iter()
            .enumerate()
            .map(|(i, (_, mut intent))| {
                intent.circumstances = circumstances.clone();
                intent
                    .circumstances
                    .extend(std::iter::repeat(patterns::FATIGUE_TAG.to_string()).take(i));
                intent
            })
            .collect();

        debug!(text, intents = intents.len(), "interpreted action");
        Interpretation::accepted(intents)
    }

    fn denied(&self, text: &str) -> Option<&'static str> {
        TABLES
            .denylist
            .iter()
            .find(|(pattern, _)| pattern.is_match(text))
            .map(|(_, reason)| *reason)
    }

    /// Every verb match in text order, overlaps resolved toward the
    /// earliest, longest match.
    fn verb_hits(&self, text: &str) -> Vec<VerbHit> {
        let mut hits: Vec<VerbHit> = TABLES
            .verbs
            .iter()
            .flat_map(|(action_type, pattern)| {
                pattern.find_iter(text).map(move |m| VerbHit {
                    action_type: *action_type,
                    start: m.start(),
                    end: m.end(),
                })
            })
            .collect();
        hits.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

        let mut resolved: Vec<VerbHit> = Vec::with_capacity(hits.len());
        for hit in hits {
            if resolved.last().is_some_and(|last| hit.start < last.end) {
                continue;
            }
            resolved.push(hit);
        }
        resolved
    }

    fn extract_quantities(
        &self,
        text: &str,
        hits: &[VerbHit],
        captured: &mut [bool],
        placed: &mut Vec<(usize, ActionIntent)>,
    ) {
        for (i, hit) in hits.iter().enumerate() {
            let prefix = TABLES
                .count_prefix
                .captures(&text[..hit.start])
                .and_then(|caps| {
                    let m = caps.get(0)?;
                    Some((m.start(), parse_count(&caps[1])?))
                });
            let suffix = TABLES.repeat_suffix.captures(&text[hit.end..]).and_then(|caps| {
                let m = caps.get(0)?;
                let word = caps.get(1).or_else(|| caps.get(2))?;
                Some((hit.end + m.end(), parse_count(word.as_str())?))
            });

            let (span_start, span_end, count) = match (prefix, suffix) {
                (Some((start, n)), _) => (start, hit.end, n),
                (None, Some((end, n))) => (hit.start, end, n),
                (None, None) => continue,
            };
            // A count of one is an ordinary mention, not a run.
            if count < 2 {
                continue;
            }

            let total = count.min(self.max_quantity);
            let source = &text[span_start..span_end];
            for position in 1..=total {
                let mut intent = ActionIntent::single(hit.action_type, source);
                intent.quantity = total;
                intent.sequence_position = position;
                intent.sequence_total = total;
                placed.push((hit.start, intent));
            }
            captured[i] = true;
        }
    }

    /// Chains of adjacent, uncaptured verbs of different types joined by a
    /// conjunction within one sentence.
    fn extract_sequences(
        text: &str,
        hits: &[VerbHit],
        captured: &mut [bool],
        placed: &mut Vec<(usize, ActionIntent)>,
    ) {
        let linked = |a: usize, b: usize| {
            let gap = &text[hits[a].end..hits[b].start];
            !captured[a]
                && !captured[b]
                && hits[a].action_type != hits[b].action_type
                && TABLES.conjunction.is_match(gap)
                && !TABLES.sentence_break.is_match(gap)
        };

        let mut chains: Vec<Vec<usize>> = Vec::new();
        let mut current: Vec<usize> = Vec::new();
        for i in 0..hits.len() {
            if i > 0 && linked(i - 1, i) {
                if current.is_empty() {
                    current.push(i - 1);
                }
                current.push(i);
            } else if !current.is_empty() {
                chains.push(std::mem::take(&mut current));
            }
        }
        if !current.is_empty() {
            chains.push(current);
        }

        for chain in chains {
            let total = chain.len() as u32;
            for (position, &i) in chain.iter().enumerate() {
                let hit = hits[i];
                let mut intent = ActionIntent::single(hit.action_type, &text[hit.start..hit.end]);
                intent.sequence_position = position as u32 + 1;
                intent.sequence_total = total;
                intent.is_sequence = true;
                placed.push((hit.start, intent));
                captured[i] = true;
            }
        }
    }

    fn extract_remaining(
        text: &str,
        hits: &[VerbHit],
        captured: &[bool],
        placed: &mut Vec<(usize, ActionIntent)>,
    ) {
        for (i, hit) in hits.iter().enumerate() {
            if captured[i] {
                continue;
            }
            if placed
                .iter()
                .any(|(_, intent)| intent.action_type == hit.action_type)
            {
                continue;
            }
            placed.push((
                hit.start,
                ActionIntent::single(hit.action_type, &text[hit.start..hit.end]),
            ));
        }
    }

    /// Canonical tags for every circumstance phrase in `text`.
    pub fn circumstances_in(&self, text: &str) -> Vec<String> {
        TABLES
            .circumstances
            .iter()
            .filter(|(pattern, _)| pattern.is_match(text))
            .map(|(_, tag)| tag.to_string())
            .collect()
    }

    /// Map a caller-supplied circumstance onto the phrase table.
    ///
    /// Unrecognized text is kept as written, trimmed and lowercased.
    pub fn canonical_circumstance(&self, raw: &str) -> String {
        TABLES
            .circumstances
            .iter()
            .find(|(pattern, _)| pattern.is_match(raw))
            .map(|(_, tag)| tag.to_string())
            .unwrap_or_else(|| raw.trim().to_lowercase())
    }

    fn merged_circumstances(&self, text: &str, context: &InterpretContext) -> Vec<String> {
        let mut merged = self.circumstances_in(text);
        merged.extend(
            context
                .circumstances
                .iter()
                .chain(&context.environment_features)
                .filter(|raw| !raw.trim().is_empty())
                .map(|raw| self.canonical_circumstance(raw)),
        );
        if !context.npcs_present.is_empty() {
            merged.push(patterns::OBSERVED_TAG.to_string());
        }

        let mut unique = Vec::with_capacity(merged.len());
        for tag in merged {
            if !unique.contains(&tag) {
                unique.push(tag);
            }
        }
        unique
    }
}
