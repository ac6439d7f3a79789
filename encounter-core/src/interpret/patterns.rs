//! Pattern tables for the action interpreter.
//!
//! These are data, not logic: every entry is a case-insensitive regex
//! fragment. Bump [`PATTERN_TABLE_VERSION`] whenever an entry is added,
//! removed or changes meaning, so stored interpretations can be compared
//! against the table that produced them.

use super::ActionType;

pub const PATTERN_TABLE_VERSION: u32 = 2;

/// Tag added once per preceding action in a burst.
pub const FATIGUE_TAG: &str = "while fatigued";

/// Tag added when NPCs are watching.
pub const OBSERVED_TAG: &str = "while observed";

/// Requests that are impossible no matter what the dice say.
pub const DENYLIST: &[(&str, &str)] = &[
    (
        concat!(
            r"\b(?:fly|flies|flying|flew|soar|soars|soaring)(?:\s+(?:up|off|away|high))?",
            r"\s+(?:to|toward|towards|into|through|beyond)\s+(?:the\s+)?(?:\w+\s+)?",
            r"(?:moon|sun|stars|space|heavens)\b",
        ),
        "You cannot fly beyond the sky",
    ),
    (
        r"\b(?:sprout|sprouts|grow|grows)\s+wings\b",
        "You cannot grow wings",
    ),
    (
        r"\b(?:start|starts|begin|begins)\s+(?:to\s+)?fly(?:ing)?\b|\bfly\s+(?:up|away|off)\b",
        "You cannot fly unaided",
    ),
    (
        r"\bteleport(?:s|ed|ing|ation)?\b",
        "Teleportation is beyond your abilities",
    ),
    (
        r"\b(?:dungeon\s+master|game\s+master|the\s+dm|fourth\s+wall|character\s+sheet|this\s+is\s+(?:just\s+)?a\s+game)\b",
        "Characters cannot reach outside the game",
    ),
    (
        r"\b(?:become|becomes|am|ascend\s+to)\s+(?:a\s+)?(?:god|goddess|deity|omnipotent|all[\s-]powerful|immortal)\b",
        "Mortals cannot become gods",
    ),
    (
        r"\b(?:instantly|immediately)\s+(?:kill|kills|slay|slays|destroy|destroys|obliterate|obliterates)\b|\bkill\s+(?:everyone|everything|all\s+(?:the\s+)?enemies)\b",
        "Nothing can be killed outright by declaration",
    ),
    (
        r"\b(?:travel|travels|go|goes|going|went)\s+(?:back\s+)?(?:in|through)\s+time\b|\btime\s+travel|\b(?:rewind|rewinds|reverse|reverses|stop|stops)\s+time\b",
        "Time cannot be altered",
    ),
    (
        r"\b(?:rewrite|rewrites|alter|alters|change|changes|reshape|reshapes)\s+reality\b|\binfinite\s+(?:gold|money|power|wishes)\b",
        "Reality cannot be rewritten",
    ),
];

/// Verb forms recognized for each action type.
pub const VERB_PATTERNS: &[(ActionType, &str)] = &[
    (
        ActionType::Attack,
        r"attack(?:s|ed|ing)?|strike(?:s)?|struck|hit(?:s)?|slash(?:es|ed)?|stab(?:s|bed)?|punch(?:es|ed)?|kick(?:s|ed)?",
    ),
    (ActionType::Spell, r"cast(?:s|ing)?|spell(?:s)?"),
    (ActionType::Dodge, r"dodg(?:e|es|ed|ing)|evad(?:e|es|ed|ing)|duck(?:s|ed)?"),
    (ActionType::Parry, r"parr(?:y|ies|ied|ying)|block(?:s|ed|ing)?|deflect(?:s|ed|ing)?"),
    (ActionType::Backflip, r"back[\s-]?flip(?:s|ped|ping)?"),
    (ActionType::Frontflip, r"front[\s-]?flip(?:s|ped|ping)?"),
    (ActionType::Cartwheel, r"cartwheel(?:s|ed|ing)?"),
    (ActionType::Somersault, r"somersault(?:s|ed|ing)?"),
    (ActionType::Handstand, r"handstand(?:s)?"),
    (ActionType::Run, r"run(?:s)?|ran|sprint(?:s|ed|ing)?|dash(?:es|ed)?"),
    (ActionType::Jump, r"jump(?:s|ed|ing)?|leap(?:s|ed|ing|t)?|vault(?:s|ed|ing)?"),
    (ActionType::Climb, r"climb(?:s|ed|ing)?"),
    (ActionType::Swim, r"swim(?:s|ming)?|swam"),
    (
        ActionType::Persuade,
        r"persuad(?:e|es|ed|ing)|convinc(?:e|es|ed|ing)|negotiat(?:e|es|ed|ing)",
    ),
    (
        ActionType::Intimidate,
        r"intimidat(?:e|es|ed|ing)|threaten(?:s|ed|ing)?",
    ),
    (
        ActionType::Deceive,
        r"deceiv(?:e|es|ed|ing)|lie\s+to|lies\s+to|lying\s+to|bluff(?:s|ed|ing)?",
    ),
    (
        ActionType::Perform,
        r"sing(?:s|ing)?|sang|danc(?:e|es|ed|ing)|entertain(?:s|ed|ing)?|serenad(?:e|es|ed|ing)",
    ),
    (
        ActionType::Search,
        r"search(?:es|ed|ing)?|investigat(?:e|es|ed|ing)|examin(?:e|es|ed|ing)|look(?:s|ed|ing)?\s+(?:for|around)",
    ),
    (ActionType::Listen, r"listen(?:s|ed|ing)?|eavesdrop(?:s|ped|ping)?"),
    (
        ActionType::Track,
        r"track(?:s|ed|ing)?|follow(?:s|ed|ing)?\s+the\s+(?:trail|tracks)",
    ),
    (ActionType::Hide, r"hide|hides|hiding|hid"),
    (ActionType::Sneak, r"sneak(?:s|ed|ing)?|snuck|creep(?:s|ing)?|crept|tiptoe(?:s|d)?"),
    (
        ActionType::Lockpick,
        r"lock[\s-]?pick(?:s|ed|ing)?|pick(?:s|ed|ing)?\s+(?:the|a)\s+lock",
    ),
    (
        ActionType::Grapple,
        r"grappl(?:e|es|ed|ing)|grab(?:s|bed|bing)?|wrestl(?:e|es|ed|ing)|tackl(?:e|es|ed|ing)",
    ),
];

/// Spelled-out counts for phrases like "three cartwheels".
pub const NUMBER_WORDS: &[(&str, u32)] = &[
    ("one", 1),
    ("two", 2),
    ("three", 3),
    ("four", 4),
    ("five", 5),
    ("six", 6),
    ("seven", 7),
    ("eight", 8),
    ("nine", 9),
    ("ten", 10),
    ("eleven", 11),
    ("twelve", 12),
    ("thirteen", 13),
    ("fourteen", 14),
    ("fifteen", 15),
    ("sixteen", 16),
    ("seventeen", 17),
    ("eighteen", 18),
    ("nineteen", 19),
    ("twenty", 20),
];

/// Repetition adverbs for phrases like "jump twice".
pub const REPEAT_WORDS: &[(&str, u32)] = &[("twice", 2), ("thrice", 3)];

/// Raw-text phrases and the canonical circumstance tag each maps to.
pub const CIRCUMSTANCE_PHRASES: &[(&str, &str)] = &[
    (
        r"\bin\s+(?:the\s+)?(?:dark|darkness)\b|\bpitch\s+black\b|\bwithout\s+(?:a\s+)?light\b",
        "in darkness",
    ),
    (r"\bdim\s+light\b|\bdimly\s+lit\b|\btwilight\b", "in dim light"),
    (r"\bbright\s+light\b|\bbroad\s+daylight\b|\bin\s+daylight\b", "in bright light"),
    (
        r"\bwithout\s+(?:any\s+)?(?:tools|equipment|gear)\b|\bbare[\s-]?handed\b|\bempty[\s-]handed\b",
        "without tools",
    ),
    (
        r"\bwith\s+(?:proper|the\s+right|good|my|thieves'?)\s+tools\b|\busing\s+(?:my\s+)?tools\b",
        "with tools",
    ),
    (
        r"\bwhile\s+injured\b|\bwounded\b|\bbleeding\b|\bbadly\s+hurt\b",
        "while injured",
    ),
    (r"\bexhausted\b|\btired\b|\bfatigued\b", FATIGUE_TAG),
    (
        r"\bin\s+(?:the\s+)?rain\b|\b(?:in|during)\s+(?:a|the)\s+storm\b",
        "in bad weather",
    ),
    (r"\bslippery\b|\bon\s+ice\b|\bicy\b", "on slippery ground"),
    (
        r"\b(?:with|behind|from)\s+cover\b|\bbehind\s+(?:a|the)\s+(?:wall|tree|rock|crate|barrel)\b",
        "with cover",
    ),
    (
        r"\bfrom\s+(?:the\s+)?(?:higher|high)\s+ground\b|\bfrom\s+above\b",
        "from high ground",
    ),
    (r"\bquietly\b|\bsilently\b|\bcarefully\b|\bcautiously\b", "carefully"),
    (r"\bquickly\b|\bhastily\b|\bin\s+a\s+hurry\b|\brush(?:ed|ing)\b", "in a hurry"),
    (r"\bat\s+(?:mid)?night\b|\bin\s+the\s+night\b", "at night"),
    (
        r"\bwith\s+(?:some\s+)?help\b|\bwith\s+(?:an?\s+)?ally\b|\bwith\s+assistance\b",
        "with help",
    ),
    (
        r"\bin\s+front\s+of\s+(?:a\s+|the\s+)?crowd\b|\bin\s+public\b|\bwhile\s+(?:being\s+)?watched\b|\bobserved\b",
        OBSERVED_TAG,
    ),
    (
        r"\b(?:in|wearing)\s+(?:heavy\s+)?armou?r\b|\bheavy\s+armou?r\b",
        "in heavy armor",
    ),
    (r"\bunder\s*water\b", "underwater"),
    (r"\bdistracted\b", "while distracted"),
    (r"\bblindfolded\b|\bwith\s+(?:my\s+)?eyes\s+closed\b", "while blinded"),
    (r"\bwith\s+a\s+running\s+start\b", "with a running start"),
    (r"\b(?:with|using)\s+(?:a\s+)?rope\b", "with a rope"),
    (r"\bunder\s+(?:fire|attack)\b|\bin\s+the\s+heat\s+of\s+battle\b", "under pressure"),
];

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn test_every_pattern_compiles() {
        for (pattern, _) in DENYLIST.iter().chain(CIRCUMSTANCE_PHRASES) {
            assert!(Regex::new(pattern).is_ok(), "{pattern}");
        }
        for (_, pattern) in VERB_PATTERNS {
            assert!(Regex::new(pattern).is_ok(), "{pattern}");
        }
    }

    #[test]
    fn test_every_action_type_has_verbs() {
        for action_type in ActionType::ALL {
            assert!(
                VERB_PATTERNS.iter().any(|(t, _)| t == action_type),
                "{action_type} has no verb pattern"
            );
        }
    }
}
