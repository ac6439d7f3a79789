//! Free-text actions flowing into skill checks.
//!
//! Run with: `cargo test -p encounter-core --test interpreter_checks`

use encounter_core::skill_check::Degree;
use encounter_core::testing::{sample_fighter, sample_rogue, EncounterHarness};
use encounter_core::{
    ActionInterpreter, ActionType, Advantage, CombatError, InterpretContext, SkillCheckResolver,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn interpret(text: &str) -> encounter_core::Interpretation {
    ActionInterpreter::new().interpret(text, &InterpretContext::new())
}

// =============================================================================
// TEST 1: Reading descriptions
// =============================================================================

#[test]
fn test_six_backflips() {
    let interpretation = interpret("I do 6 backflips");
    assert!(interpretation.possible);
    assert_eq!(interpretation.intents.len(), 6);

    for (i, intent) in interpretation.intents.iter().enumerate() {
        assert_eq!(intent.action_type, ActionType::Backflip);
        assert_eq!(intent.quantity, 6);
        assert_eq!(intent.sequence_position, i as u32 + 1);
        assert_eq!(intent.sequence_total, 6);
        assert_eq!(intent.fatigue_level(), i);
    }

    let bare = interpret("6 backflips");
    assert_eq!(bare.intents.len(), 6);
    assert!(bare.intents.iter().all(|i| i.action_type == ActionType::Backflip));
}

#[test]
fn test_fly_to_the_moon_is_impossible() {
    let interpretation = interpret("I fly to the moon");
    assert!(!interpretation.possible);
    assert!(interpretation.intents.is_empty());
    assert!(interpretation.rejection.is_some());

    let err = interpretation.ensure_possible().unwrap_err();
    assert!(matches!(err, CombatError::ImpossibleAction { .. }));
}

#[test]
fn test_plain_talk_is_narrative() {
    let interpretation = interpret("I nod politely at the innkeeper");
    assert!(interpretation.is_narrative());
}

#[test]
fn test_context_circumstances_reach_every_intent() {
    let context = InterpretContext::new()
        .with_circumstance("at night")
        .with_npc("Guard Captain");
    let interpretation =
        ActionInterpreter::new().interpret("I climb the wall, then hide", &context);

    let types: Vec<_> = interpretation.intents.iter().map(|i| i.action_type).collect();
    assert_eq!(types, vec![ActionType::Climb, ActionType::Hide]);
    for intent in &interpretation.intents {
        assert!(intent.circumstances.contains(&"at night".to_string()));
        assert!(intent.circumstances.contains(&"while observed".to_string()));
    }
    assert!(interpretation.intents[1].is_sequence);
}

// =============================================================================
// TEST 2: Rolling the checks
// =============================================================================

#[test]
fn test_degree_bands() {
    let cases = [
        (15, Degree::CriticalSuccess),
        (10, Degree::CriticalSuccess),
        (9, Degree::GreatSuccess),
        (5, Degree::GreatSuccess),
        (4, Degree::Success),
        (0, Degree::Success),
        (-1, Degree::Failure),
        (-4, Degree::Failure),
        (-5, Degree::GreatFailure),
        (-9, Degree::GreatFailure),
        (-10, Degree::CriticalFailure),
        (-20, Degree::CriticalFailure),
    ];
    for (margin, expected) in cases {
        let degree = Degree::from_margin(margin);
        assert_eq!(degree, expected, "margin {margin}");
        assert_eq!(degree.is_success(), margin >= 0);
    }
}

#[test]
fn test_rogue_backflip_from_table_die() {
    // Level 5 rogue: DEX +4, proficiency +3, backflip DC 15.
    let rogue = sample_rogue("Vex");
    let result = SkillCheckResolver::default()
        .check_with_natural(&rogue, ActionType::Backflip, &[], None, 10)
        .expect("10 is a d20 face");
    assert_eq!(result.total_roll, 17);
    assert_eq!(result.dc, 15);
    assert_eq!(result.margin, 2);
    assert_eq!(result.degree, Degree::Success);
}

#[test]
fn test_later_backflips_are_harder() {
    let rogue = sample_rogue("Vex");
    let resolver = SkillCheckResolver::default();
    let intents = interpret("I do 3 backflips").ensure_possible().unwrap();

    let results: Vec<_> = intents
        .iter()
        .map(|intent| {
            resolver
                .check_with_natural(&rogue, intent.action_type, &intent.circumstances, None, 12)
                .unwrap()
        })
        .collect();
    let totals: Vec<_> = results.iter().map(|r| r.total_roll).collect();
    assert_eq!(totals, vec![19, 17, 15]);
    assert_eq!(results[2].fatigue_penalty, -4);
}

#[test]
fn test_harness_attempt_rolls_every_intent() {
    let mut harness = EncounterHarness::new();
    let fighter = sample_fighter("Ayla");
    let results = harness
        .attempt(&fighter, "I jump the gap and then grapple the bandit")
        .expect("possible action");
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].action_type, ActionType::Jump);
    assert_eq!(results[1].action_type, ActionType::Grapple);
    for result in &results {
        assert!((1..=20).contains(&result.roll));
        assert_eq!(result.is_success, result.margin >= 0);
    }

    let err = harness.attempt(&fighter, "I teleport behind him").unwrap_err();
    assert!(matches!(err, CombatError::ImpossibleAction { .. }));
}

#[test]
fn test_attempt_series_with_advantage() {
    let resolver = SkillCheckResolver::default();
    let mut rng = StdRng::seed_from_u64(21);
    let series = resolver.perform_attempts(
        &sample_rogue("Vex"),
        ActionType::Lockpick,
        &[],
        None,
        5,
        Advantage::Advantage,
        &mut rng,
    );
    assert_eq!(series.attempts(), 5);
    assert!(series.results.iter().all(|r| r.rolls.len() == 2));
    assert!(series.successes as usize <= series.attempts());
    assert!((1.0..=20.0).contains(&series.average_roll));
}
