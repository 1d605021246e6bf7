//! Session summary
//!
//! Structured end-of-session summary types plus the adaptive
//! interaction-analysis text that steers the summary prompt's feedback
//! sections based on which stages the user leaned on during the session.

use crate::types::InteractionRecord;
use serde::{Deserialize, Serialize};

/// Text blocks interpolated into the summary prompt. The strengths and
/// growth blocks are themselves instructions to the model, adapted to
/// which stages appear in the interaction log.
#[derive(Debug, Clone)]
pub struct InteractionAnalysis {
    pub ai_interaction_analysis: String,
    pub feedback_strengths: String,
    pub feedback_growth: String,
}

const STRENGTHS_CLOSING: &str = "Select the 1-2 dimensions where the user showed the most \
strength and provide specific examples from their session inputs.";

const GROWTH_CLOSING: &str = "Select the 1-2 dimensions with the most opportunity for \
growth and provide specific, implementable recommendations.";

/// Build the feedback instructions from the session's interaction log.
/// Each rubric dimension gains an extra sentence when the log shows the
/// user actually used assistance on that stage.
pub fn analyze_interactions(log: &[InteractionRecord]) -> InteractionAnalysis {
    if log.is_empty() {
        return InteractionAnalysis {
            ai_interaction_analysis: "No AI interactions were recorded during this session."
                .to_string(),
            feedback_strengths: format!(
                "Provide a concise analysis of where the user's thinking was most \
effective. Your analysis must specifically evaluate their performance on \
the following four dimensions: 1. Root Cause Identification: Did they \
distinguish between symptoms and true root causes? 2. Assumption \
Surfacing: Did they uncover non-obvious or deeply held assumptions? 3. \
Self-Awareness (from Perpetuations): Did they identify specific, plausible \
actions that could perpetuate the problem and acknowledge their own role? \
4. Action Plan Quality: Is their action plan specific, measurable, and \
directly linked to the root causes? {STRENGTHS_CLOSING}"
            ),
            feedback_growth: format!(
                "Provide specific, actionable recommendations for improvement. Your \
analysis must evaluate their performance on the same four dimensions and \
provide concrete next steps: 1. Root Cause Identification: If they \
mistook symptoms for root causes, explain why and suggest deeper causes \
to explore. 2. Assumption Surfacing: If their assumptions were \
surface-level, suggest specific deeper beliefs to examine. 3. \
Self-Awareness (from Perpetuations): If they struggled to see their own \
role, provide specific behaviors to watch for. 4. Action Plan Quality: If \
their plan was vague, provide specific ways to make it more actionable. \
{GROWTH_CLOSING}"
            ),
        };
    }

    let stages: Vec<&str> = log.iter().map(|r| r.stage.as_str()).collect();
    let has = |stage: &str| stages.contains(&stage);
    let has_root_cause = has("root_cause");
    let has_assumptions = has("identify_assumptions");
    let has_perpetuation = has("perpetuation");
    let has_actions = has("potential_actions") || has("action_planning");

    let ai_interaction_analysis = format!(
        "AI Interaction Log Analysis: During this session, you received AI \
assistance on {} occasion(s) across the following stages: {}. Use this \
information to provide adaptive feedback that recognizes whether the user \
incorporated AI suggestions effectively or missed valuable opportunities \
for improvement.",
        log.len(),
        stages.join(", ")
    );

    fn opt(included: bool, sentence: &str) -> &str {
        if included {
            sentence
        } else {
            ""
        }
    }

    let feedback_strengths = format!(
        "Provide a concise analysis of where the user's thinking was most \
effective, taking into account their engagement with AI assistance. Your \
analysis must specifically evaluate their performance on the following \
four dimensions: 1. Root Cause Identification: Did they distinguish \
between symptoms and true root causes? {}2. Assumption Surfacing: Did they \
uncover non-obvious or deeply held assumptions? {}3. Self-Awareness (from \
Perpetuations): Did they identify specific, plausible actions that could \
perpetuate the problem and acknowledge their own role? {}4. Action Plan \
Quality: Is their action plan specific, measurable, and directly linked to \
the root causes? {}{STRENGTHS_CLOSING}",
        opt(
            has_root_cause,
            "Consider how they responded to AI guidance on root causes. "
        ),
        opt(
            has_assumptions,
            "Consider how they engaged with AI assistance on assumptions. "
        ),
        opt(
            has_perpetuation,
            "Consider how they responded to AI guidance on perpetuation patterns. "
        ),
        opt(
            has_actions,
            "Consider how they incorporated AI feedback on their action planning. "
        ),
    );

    let feedback_growth = format!(
        "Provide specific, actionable recommendations for improvement, \
considering their use of AI assistance. Your analysis must evaluate their \
performance on the same four dimensions and provide concrete next steps: \
1. Root Cause Identification: If they mistook symptoms for root causes, \
explain why and suggest deeper causes to explore. {}2. Assumption \
Surfacing: If their assumptions were surface-level, suggest specific \
deeper beliefs to examine. {}3. Self-Awareness (from Perpetuations): If \
they struggled to see their own role, provide specific behaviors to watch \
for. {}4. Action Plan Quality: If their plan was vague, provide specific \
ways to make it more actionable. {}{GROWTH_CLOSING}",
        opt(
            has_root_cause,
            "If they received AI guidance on root causes but didn't fully incorporate it, \
gently challenge them to revisit those insights. "
        ),
        opt(
            has_assumptions,
            "If they received AI help with assumptions but didn't act on it, encourage \
them to test those assumptions. "
        ),
        opt(
            has_perpetuation,
            "If they received AI insights about perpetuation patterns but didn't \
acknowledge their role, provide specific examples to watch for. "
        ),
        opt(
            has_actions,
            "If they received AI feedback on their actions but didn't refine them, \
suggest specific improvements. "
        ),
    );

    InteractionAnalysis {
        ai_interaction_analysis,
        feedback_strengths,
        feedback_growth,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryActionPlan {
    pub primary_action: String,
    #[serde(default)]
    pub supporting_actions: Vec<String>,
    #[serde(default)]
    pub timeline: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryFeedback {
    pub strengths: String,
    pub areas_for_growth: String,
}

/// The structured summary the model is asked to return.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub title: String,
    pub problem_overview: String,
    pub key_insights: Vec<String>,
    pub action_plan: SummaryActionPlan,
    pub feedback: SummaryFeedback,
    pub conclusion: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TokenUsage;

    fn record(stage: &str) -> InteractionRecord {
        InteractionRecord::new("u1", "s1", stage, TokenUsage::default(), 0.0)
    }

    #[test]
    fn empty_log_yields_generic_feedback() {
        let analysis = analyze_interactions(&[]);
        assert!(analysis
            .ai_interaction_analysis
            .contains("No AI interactions"));
        assert!(!analysis.feedback_strengths.contains("AI guidance"));
        assert!(!analysis.feedback_growth.contains("revisit those insights"));
    }

    #[test]
    fn logged_stages_are_enumerated() {
        let log = vec![record("root_cause"), record("perpetuation")];
        let analysis = analyze_interactions(&log);
        assert!(analysis.ai_interaction_analysis.contains("2 occasion(s)"));
        assert!(analysis
            .ai_interaction_analysis
            .contains("root_cause, perpetuation"));
    }

    #[test]
    fn dimension_sentences_track_used_stages() {
        let log = vec![record("root_cause"), record("action_planning")];
        let analysis = analyze_interactions(&log);

        assert!(analysis
            .feedback_strengths
            .contains("responded to AI guidance on root causes"));
        assert!(analysis
            .feedback_strengths
            .contains("incorporated AI feedback on their action planning"));
        assert!(!analysis
            .feedback_strengths
            .contains("engaged with AI assistance on assumptions"));

        assert!(analysis
            .feedback_growth
            .contains("revisit those insights"));
        assert!(!analysis
            .feedback_growth
            .contains("test those assumptions"));
    }

    #[test]
    fn potential_actions_counts_toward_action_dimension() {
        let log = vec![record("potential_actions")];
        let analysis = analyze_interactions(&log);
        assert!(analysis
            .feedback_strengths
            .contains("incorporated AI feedback on their action planning"));
    }

    #[test]
    fn summary_deserializes_with_optional_fields_defaulted() {
        let json = r#"{
            "title": "Breaking the Late-Night Loop",
            "problem_overview": "You described disrupted sleep.",
            "key_insights": ["Scrolling fills an unmet need for downtime"],
            "action_plan": { "primary_action": "Charge the phone outside the bedroom" },
            "feedback": { "strengths": "s", "areas_for_growth": "g" },
            "conclusion": "You have a clear first step."
        }"#;
        let summary: SessionSummary = serde_json::from_str(json).unwrap();
        assert!(summary.action_plan.supporting_actions.is_empty());
        assert!(summary.action_plan.timeline.is_empty());
        assert_eq!(summary.key_insights.len(), 1);
    }
}
