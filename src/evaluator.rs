//! Depth evaluation
//!
//! LLM-graded rubric scoring over user statements, with deterministic
//! heuristic fallbacks so a provider outage degrades to "keep probing"
//! rather than a hard failure. The two-axis rubric (foundational depth,
//! causal power) decides when a cause-analysis conversation has reached a
//! real root cause.

use crate::detectors;
use crate::gateway::LlmGateway;
use crate::jsonx;
use crate::types::{DepthEvaluation, FollowUpAxis};
use serde_json::Value;

const FOUNDATIONAL_BELIEF_MARKERS: &[&str] =
    &["i believe", "i think", "i feel like", "i assume", "i need to be"];

const FOUNDATIONAL_CORE_MARKERS: &[&str] = &[
    "i must",
    "i have to",
    "i should always",
    "i'm not good enough",
    "i don't deserve",
    "core belief",
    "fundamental",
];

const FOUNDATIONAL_PATTERN_MARKERS: &[&str] =
    &["i always", "i never", "i tend to", "i have a pattern of"];

const CAUSAL_LINK_MARKERS: &[&str] =
    &["because", "so i", "which makes me", "that's why", "leads me to"];

const CAUSAL_DRIVER_MARKERS: &[&str] = &[
    "drives me to",
    "compels me",
    "forces me to",
    "that's the root of",
    "explains why i",
];

const CAUSAL_SPREAD_MARKERS: &[&str] =
    &["affects everything", "impacts all", "causes me to also", "leads to other"];

/// Scores statements against the root-cause rubric.
pub struct DepthEvaluator<'a> {
    gateway: &'a LlmGateway,
}

impl<'a> DepthEvaluator<'a> {
    pub fn new(gateway: &'a LlmGateway) -> Self {
        Self { gateway }
    }

    /// Evaluate the latest user response (or the cause itself when no
    /// response is given) for foundational depth and causal power.
    ///
    /// Never errors: a failed call or unparseable reply yields a heuristic
    /// evaluation marked `success=false`.
    pub async fn evaluate(
        &self,
        cause_text: &str,
        user_response: Option<&str>,
    ) -> DepthEvaluation {
        let analyzed = user_response.unwrap_or(cause_text);

        let prompt = format!(
            "You are an expert in root cause analysis. Evaluate this statement for \
depth and causal power.\n\n\
Statement: \"{analyzed}\"\n\n\
Score on two dimensions (0-3 points each):\n\n\
FOUNDATIONAL DEPTH (How deep is this cause?):\n\
- 3: Core belief/fundamental need - reveals deep psychological drivers, unmet needs, or foundational assumptions about self/world\n\
- 2: Significant behavioral pattern - consistent habits or reactions that show deeper themes\n\
- 1: Surface pattern - observable behaviors without deeper insight\n\
- 0: Just a symptom - feelings or situations without revealing underlying causes\n\n\
CAUSAL POWER (Does this drive other problems?):\n\
- 3: Explains multiple symptoms - connects to and drives several other issues or behaviors\n\
- 2: Drives some behaviors - clear connections to 1-2 other problems or patterns\n\
- 1: Minor influence - weak connections to other issues\n\
- 0: No clear influence - isolated issue with no apparent broader impact\n\n\
CRITICAL: Respond with ONLY this JSON format, no other text:\n\
{{\n\
  \"total_score\": 0,\n\
  \"foundational_score\": 0,\n\
  \"causal_score\": 0,\n\
  \"is_root_cause\": false,\n\
  \"reasoning\": \"Brief analysis\",\n\
  \"suggested_follow_up\": \"foundational\"\n\
}}\n\n\
Set is_root_cause to true if total_score >= 5. Set suggested_follow_up to \
the lowest-scoring dimension."
        );

        let completion = match self
            .gateway
            .complete_default(&prompt, crate::templates::GUIDANCE_SYSTEM_PROMPT)
            .await
        {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "depth evaluation call failed");
                return heuristic_evaluation(analyzed, "Evaluation service unavailable");
            }
        };

        match jsonx::extract_json(&completion.text) {
            Ok(value) => parse_evaluation(&value),
            Err(e) => {
                tracing::warn!(error = %e, "depth evaluation returned invalid JSON");
                heuristic_evaluation(analyzed, "Evaluation output unparseable")
            }
        }
    }
}

fn parse_evaluation(value: &Value) -> DepthEvaluation {
    let axis = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_u64)
            .map(|v| v.min(3) as u8)
            .unwrap_or(0)
    };
    let foundational_score = axis("foundational_score");
    let causal_score = axis("causal_score");

    let suggested_follow_up = value
        .get("suggested_follow_up")
        .cloned()
        .map(serde_json::from_value)
        .and_then(Result::ok)
        .unwrap_or_default();

    DepthEvaluation {
        success: true,
        // Recomputed rather than trusted; models occasionally mis-add.
        total_score: foundational_score + causal_score,
        foundational_score,
        causal_score,
        is_root_cause: value
            .get("is_root_cause")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        reasoning: value
            .get("reasoning")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        suggested_follow_up,
    }
}

fn heuristic_evaluation(text: &str, reason: &str) -> DepthEvaluation {
    let (foundational_score, causal_score) = heuristic_depth_scores(text);
    let total_score = foundational_score + causal_score;
    let suggested_follow_up = if causal_score < foundational_score {
        FollowUpAxis::Causal
    } else {
        FollowUpAxis::Foundational
    };
    DepthEvaluation {
        success: false,
        total_score,
        foundational_score,
        causal_score,
        is_root_cause: total_score >= 5,
        reasoning: format!("{}, using heuristic analysis", reason),
        suggested_follow_up,
    }
}

/// Keyword scoring of the two rubric axes. Both start at 1: an unmarked
/// statement is a surface pattern, not a symptom.
pub fn heuristic_depth_scores(text: &str) -> (u8, u8) {
    let lower = text.trim().to_lowercase();
    let has = |markers: &[&str]| markers.iter().any(|m| lower.contains(m));

    let mut foundational = 1u8;
    if has(FOUNDATIONAL_BELIEF_MARKERS) {
        foundational = 2;
    }
    if has(FOUNDATIONAL_CORE_MARKERS) {
        foundational = 3;
    }
    if has(FOUNDATIONAL_PATTERN_MARKERS) {
        foundational = foundational.max(2);
    }

    let mut causal = 1u8;
    if has(CAUSAL_LINK_MARKERS) {
        causal = 2;
    }
    if has(CAUSAL_DRIVER_MARKERS) {
        causal = 3;
    }
    if has(CAUSAL_SPREAD_MARKERS) {
        causal = causal.max(2);
    }

    (foundational, causal)
}

/// Judge whether a problem statement has enough substance to work with:
/// two of three elements (problem description, context, impact).
///
/// Degrades twice: unparseable JSON falls back to substring sniffing of the
/// reply, a failed call falls back to a word count.
pub async fn validate_problem_statement(gateway: &LlmGateway, statement: &str) -> bool {
    let trimmed = statement.trim();
    if trimmed.is_empty() {
        return false;
    }

    let prompt = format!(
        "You are a problem statement evaluator. Determine if the following problem \
statement contains enough substance to begin meaningful problem-solving \
work.\n\n\
A problem statement is VALID if it contains at least TWO of these three \
elements:\n\
1. Clear problem description: what is the core issue or challenge?\n\
2. Contextual details: when, where, how, or under what circumstances does this occur?\n\
3. Impact or consequences: what are the effects or results of this problem?\n\n\
A problem statement is SIMPLISTIC only if it is extremely vague with no \
identifiable problem, contains no context, impact, or actionable \
information, or is purely a goal statement without describing any \
underlying problem.\n\n\
IMPORTANT: Lean towards approving statements that contain enough substance \
to work with, even if they are concise.\n\n\
Problem statement to evaluate: \"{trimmed}\"\n\n\
Respond with a JSON object in this exact format:\n\
{{\n\
  \"isValid\": true/false,\n\
  \"reason\": \"Brief explanation of your evaluation\"\n\
}}\n\n\
Your response must be valid JSON only, no other text."
    );

    match gateway
        .complete_default(&prompt, crate::templates::GUIDANCE_SYSTEM_PROMPT)
        .await
    {
        Ok(completion) => match jsonx::extract_json(&completion.text) {
            Ok(value) => value
                .get("isValid")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            Err(_) => {
                let lower = completion.text.to_lowercase();
                lower.contains("true") || lower.contains("valid")
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "problem statement validation call failed");
            trimmed.split_whitespace().count() >= 8
        }
    }
}

/// Judge whether the stated causes show ownership of the user's own role.
/// A failed call or bad JSON falls back to the keyword detector.
pub async fn analyze_self_awareness(gateway: &LlmGateway, causes: &[String]) -> bool {
    if causes.is_empty() {
        return false;
    }
    let causes_text = causes.join(", ");

    let prompt = format!(
        "You are an expert in psychological analysis. Determine if a person has \
demonstrated self-awareness of their own role in a problem by analyzing \
their stated causes.\n\n\
True self-awareness means they explicitly acknowledge their own actions, \
behaviors, or mindset as a contributing cause: \"I\" statements describing \
their own actions, ownership of habits or patterns, or identification of \
their own limiting beliefs.\n\n\
Self-awareness is NOT demonstrated when causes focus exclusively on \
external factors, blame others entirely, or describe feelings as a passive \
experience without acknowledging their role in them.\n\n\
Analyze each cause individually for internal versus external focus, then \
synthesize whether the causes show a pattern of self-awareness.\n\n\
Submitted causes: \"{causes_text}\"\n\n\
Respond with a JSON object in this exact format:\n\
{{\n\
  \"selfAwarenessDetected\": true/false,\n\
  \"reason\": \"Brief explanation of your analysis\"\n\
}}\n\n\
Your response must be valid JSON only, no other text."
    );

    match gateway
        .complete_default(&prompt, crate::templates::GUIDANCE_SYSTEM_PROMPT)
        .await
    {
        Ok(completion) => match jsonx::extract_json(&completion.text) {
            Ok(value) => value
                .get("selfAwarenessDetected")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            Err(_) => detectors::shows_self_awareness(&causes_text),
        },
        Err(e) => {
            tracing::warn!(error = %e, "self-awareness analysis call failed");
            detectors::shows_self_awareness(&causes_text)
        }
    }
}
