//! Heuristic text detectors
//!
//! Pure, deterministic classifiers that gate LLM calls and back them up when
//! they fail. All matching is case-insensitive substring containment over
//! fixed phrase lists.

/// Goal-phrased markers ("I want to...") as opposed to problem statements.
const GOAL_MARKERS: &[&str] = &[
    "want to",
    "wanna",
    "like to",
    "hope to",
    "aim to",
    "need to",
    "my goal is",
    "i wish",
    "i would like",
    "i need",
    "i want",
    "can i",
    "how to",
    "how do i",
    "how can i",
    "trying to",
    "would love to",
    "looking to",
    "seeking to",
    "planning to",
];

const UNCERTAINTY_MARKERS: &[&str] = &[
    "i'm not sure",
    "im not sure",
    "not sure",
    "don't know",
    "dont know",
    "no idea",
    "i don't know",
    "i dont know",
    "unsure",
    "skip",
    "pass",
    "i guess",
    "maybe",
    "i think maybe",
    "not really sure",
    "hard to say",
    "i'm stuck",
    "im stuck",
    "can't think",
    "cant think",
    "no clue",
];

const UNKNOWN_ASSUMPTION_MARKERS: &[&str] = &[
    "i don't know",
    "i dont know",
    "not sure",
    "no idea",
    "don't know",
    "dont know",
    "unsure",
    "no assumptions",
];

/// Dismissals short enough that substring matching would misfire.
const UNKNOWN_ASSUMPTION_EXACT: &[&str] = &["none", "n/a", "na", "no"];

const VAGUE_MARKERS: &[&str] = &[
    "i don't know",
    "not sure",
    "no idea",
    "i'm not sure",
    "don't know",
    "maybe",
    "i guess",
    "probably",
    "i need to",
    "i want to",
    "i should",
    "i have to",
    "just",
    "simply",
    "basic",
    "general",
    "normal",
    "something",
    "anything",
    "whatever",
    "somehow",
];

const INTENT_GOAL_MARKERS: &[&str] =
    &["want to", "need to", "should", "have to", "trying to", "hope to"];

const INTENT_ACTION_MARKERS: &[&str] = &[
    "will", "plan to", "going to", "schedule", "set up", "create", "start", "begin",
];

const SELF_AWARENESS_MARKERS: &[&str] = &[
    "i procrastinate",
    "i avoid",
    "i get defensive",
    "i have a habit of",
    "i need to stop",
    "i always do",
    "i never do",
    "i react",
    "i choose to",
    "i keep doing",
    "i tend to",
    "i usually",
    "i often",
    "my behavior",
    "i don't communicate",
    "i shut down",
    "i get angry",
    "i assume",
];

const SELF_ACTION_PATTERNS: &[&str] = &[
    "i do ",
    "i don't ",
    "i always ",
    "i never ",
    "i tend to ",
    "i have a habit",
];

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// True if the input is framed as a goal rather than a problem.
pub fn is_goal_oriented(text: &str) -> bool {
    let trimmed = text.trim().to_lowercase();
    contains_any(&trimmed, GOAL_MARKERS)
}

/// True if a user response signals uncertainty or being stuck. Blank input
/// counts as uncertain; so do very short hedged answers.
pub fn is_uncertain(response: &str) -> bool {
    let trimmed = response.trim();
    if trimmed.is_empty() {
        return true;
    }
    let lower = trimmed.to_lowercase();
    if contains_any(&lower, UNCERTAINTY_MARKERS) {
        return true;
    }
    trimmed.split_whitespace().count() <= 3
        && ["maybe", "sure", "guess"].iter().any(|w| lower.contains(w))
}

/// True if assumption-stage input is empty, a "don't know", too short, or
/// shares no meaningful vocabulary with the stated causes. Fires the
/// redirect to the discovery template.
pub fn is_assumption_irrelevant(user_input: &str, causes: &[String]) -> bool {
    let trimmed = user_input.trim().to_lowercase();
    if trimmed.is_empty() {
        return true;
    }
    if contains_any(&trimmed, UNKNOWN_ASSUMPTION_MARKERS)
        || UNKNOWN_ASSUMPTION_EXACT.contains(&trimmed.as_str())
    {
        return true;
    }
    if trimmed.len() < 10 {
        return true;
    }

    if !causes.is_empty() {
        let causes_text = causes.join(" ").to_lowercase();
        let cause_words: Vec<&str> = causes_text.split_whitespace().collect();
        let input_words: Vec<&str> = trimmed.split_whitespace().collect();

        // Overlap = words longer than 3 chars contained (either direction)
        // in some cause word.
        let common = input_words
            .iter()
            .filter(|w| w.len() > 3)
            .filter(|w| cause_words.iter().any(|c| c.contains(*w) || w.contains(c)))
            .count();

        if common == 0 && input_words.len() > 2 {
            return true;
        }
    }

    false
}

/// True if action-planning responses are too vague to turn into concrete
/// plans: brief answers, hedge words, or goal-heavy rather than committed
/// action phrasing.
pub fn is_vague_action_input(user_responses: &[String]) -> bool {
    if user_responses.is_empty() {
        return true;
    }

    let combined = user_responses.join(" ").trim().to_lowercase();
    let total_words = combined.split_whitespace().count();
    let avg_words = total_words as f64 / user_responses.len() as f64;
    if avg_words < 8.0 {
        return true;
    }

    if contains_any(&combined, VAGUE_MARKERS) {
        return true;
    }

    let goal_count = INTENT_GOAL_MARKERS
        .iter()
        .filter(|m| combined.contains(*m))
        .count();
    let action_count = INTENT_ACTION_MARKERS
        .iter()
        .filter(|m| combined.contains(*m))
        .count();
    goal_count > action_count && goal_count > 0
}

/// Keyword fallback for self-awareness analysis: first-person action or
/// habit phrasing in the stated causes.
pub fn shows_self_awareness(causes_text: &str) -> bool {
    let lower = causes_text.to_lowercase();
    contains_any(&lower, SELF_AWARENESS_MARKERS) || contains_any(&lower, SELF_ACTION_PATTERNS)
}
