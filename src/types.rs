//! Core types for the rootwise reflection engine
//!
//! The engine is stateless per call: conversation history is owned by the
//! calling session record and passed in whole on every turn. Controllers are
//! pure functions of (accumulated state, new input) -> (decision, output).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A named phase of the guided session. Each stage maps to either a prompt
/// template or a conversation controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ProblemArticulationDirect,
    ProblemArticulationIntervention,
    ProblemArticulationInterventionGoal,
    ProblemArticulationContextAware,
    ProblemArticulationContextAwareGoal,
    RootCause,
    IdentifyAssumptions,
    IdentifyAssumptionsDiscovery,
    PotentialActions,
    Perpetuation,
    ActionPlanning,
    ConversationalCauseAnalysis,
    ConversationalActionPlanning,
    FearMitigation,
    FearContingency,
    SessionSummary,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::ProblemArticulationDirect => "problem_articulation_direct",
            Stage::ProblemArticulationIntervention => "problem_articulation_intervention",
            Stage::ProblemArticulationInterventionGoal => "problem_articulation_intervention_goal",
            Stage::ProblemArticulationContextAware => "problem_articulation_context_aware",
            Stage::ProblemArticulationContextAwareGoal => "problem_articulation_context_aware_goal",
            Stage::RootCause => "root_cause",
            Stage::IdentifyAssumptions => "identify_assumptions",
            Stage::IdentifyAssumptionsDiscovery => "identify_assumptions_discovery",
            Stage::PotentialActions => "potential_actions",
            Stage::Perpetuation => "perpetuation",
            Stage::ActionPlanning => "action_planning",
            Stage::ConversationalCauseAnalysis => "conversational_cause_analysis",
            Stage::ConversationalActionPlanning => "conversational_action_planning",
            Stage::FearMitigation => "fear_mitigation",
            Stage::FearContingency => "fear_contingency",
            Stage::SessionSummary => "session_summary",
        }
    }

    /// The goal-phrased variant of a problem-articulation stage, if one exists.
    pub fn goal_variant(&self) -> Option<Stage> {
        match self {
            Stage::ProblemArticulationIntervention => {
                Some(Stage::ProblemArticulationInterventionGoal)
            }
            Stage::ProblemArticulationContextAware => {
                Some(Stage::ProblemArticulationContextAwareGoal)
            }
            _ => None,
        }
    }

    /// Stages whose raw model output gets wrapped between a randomly chosen
    /// intro and conclusion before being returned.
    pub fn wraps_response(&self) -> bool {
        matches!(
            self,
            Stage::ProblemArticulationIntervention
                | Stage::ProblemArticulationInterventionGoal
                | Stage::ProblemArticulationContextAwareGoal
        )
    }

    /// Stages whose assembled prompt asks the model for bare questions only;
    /// intro/conclusion text is added by the engine, not the model.
    pub fn questions_only(&self) -> bool {
        self.wraps_response()
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Stage {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_string()))
            .map_err(|_| anyhow::anyhow!("unknown stage: {}", s))
    }
}

/// Heterogeneous session fields supplied by the client. Values may be plain
/// strings, lists of strings or records, or maps of records; the context
/// formatter flattens them for prompt interpolation.
pub type SessionContext = serde_json::Map<String, serde_json::Value>;

/// One inbound request to the stage dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRequest {
    pub user_id: String,
    pub session_id: String,
    pub stage: Stage,
    #[serde(default)]
    pub user_input: String,
    #[serde(default)]
    pub context: SessionContext,
}

/// Completed question/answer exchanges in an alternating history.
/// History begins with an asker turn, so two entries make one exchange.
pub fn exchange_count(history: &[String]) -> usize {
    history.len() / 2
}

/// User turns sit at odd indices; the asker opens every exchange.
pub fn user_turns(history: &[String]) -> impl Iterator<Item = &String> {
    history.iter().skip(1).step_by(2)
}

/// The most recent user turn, whether or not the asker has replied since.
pub fn latest_user_turn(history: &[String]) -> Option<&str> {
    if history.len() % 2 == 0 {
        history.last().map(String::as_str)
    } else if history.len() > 1 {
        history.get(history.len() - 2).map(String::as_str)
    } else {
        None
    }
}

/// A single entry of a prior analysis transcript, as the client stores it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscriptEntry {
    #[serde(default)]
    pub text: String,
}

/// The weaker axis of a depth evaluation, used to aim the next question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowUpAxis {
    Actionable,
    Foundational,
    Causal,
}

impl Default for FollowUpAxis {
    fn default() -> Self {
        FollowUpAxis::Foundational
    }
}

/// Result of the Root Cause Litmus Test. Produced fresh per evaluation and
/// never persisted; `success=false` marks the degraded heuristic path so the
/// caller can keep probing rather than trust a score it didn't compute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepthEvaluation {
    pub success: bool,
    pub total_score: u8,
    pub foundational_score: u8,
    pub causal_score: u8,
    pub is_root_cause: bool,
    pub reasoning: String,
    pub suggested_follow_up: FollowUpAxis,
}

/// Token counts accumulated across the LLM calls of one request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn add(&mut self, input: u32, output: u32) {
        self.input_tokens += input;
        self.output_tokens += output;
    }

    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// One approved LLM interaction, immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub id: String,
    pub user_id: String,
    pub session_id: String,
    pub stage: String,
    pub created_at: DateTime<Utc>,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cost_usd: f64,
}

impl InteractionRecord {
    pub fn new(
        user_id: &str,
        session_id: &str,
        stage: &str,
        usage: TokenUsage,
        cost_usd: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            stage: stage.to_string(),
            created_at: Utc::now(),
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            cost_usd,
        }
    }
}

/// Quota snapshot for a (user, session, stage) triple. The daily and
/// whole-session fields are unlimited sentinels kept for older clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageStatus {
    pub stage_allowed: bool,
    pub stage_usage: u32,
    pub stage_limit: u32,
    pub session_usage: u32,
    pub stage_usage_by_stage: HashMap<String, u32>,
    pub daily_allowed: bool,
    pub session_allowed: bool,
    pub daily_usage: u32,
    pub daily_limit: u32,
    pub session_limit: u32,
}

/// Outcome of one cause-analysis turn.
#[derive(Debug, Clone, PartialEq)]
pub enum CauseAnalysisTurn {
    Question { next_question: String },
    Complete { root_cause_options: Vec<String> },
}

impl CauseAnalysisTurn {
    pub fn is_complete(&self) -> bool {
        matches!(self, CauseAnalysisTurn::Complete { .. })
    }
}

/// Outcome of one action-planning turn.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionPlanningTurn {
    Question {
        response: String,
    },
    Complete {
        response: String,
        action_plan_options: Vec<String>,
    },
}

impl ActionPlanningTurn {
    pub fn is_complete(&self) -> bool {
        matches!(self, ActionPlanningTurn::Complete { .. })
    }
}

/// Mitigation and contingency strategies for a single fear, each half
/// generated and parsed independently.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FearAnalysisOptions {
    pub mitigation_options: Vec<String>,
    pub contingency_options: Vec<String>,
}

/// Everything the fear-analysis generator needs about one fear.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FearContext {
    #[serde(default)]
    pub pain_point: String,
    #[serde(default)]
    pub contributing_cause: String,
    #[serde(default)]
    pub action_plan: String,
    #[serde(default)]
    pub fear_name: String,
    #[serde(default)]
    pub user_mitigation_input: String,
    #[serde(default)]
    pub user_contingency_input: String,
    #[serde(default)]
    pub mitigation_strategies: Vec<String>,
}

/// Reply envelope returned by the stage dispatcher. Failure classes (quota,
/// gateway outage) are structured replies with an in-voice fallback message,
/// never raw errors.
#[derive(Debug, Clone, Serialize)]
pub struct EngineReply {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
    pub cost_usd: f64,
    pub tokens_used: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_complete: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_cause_options: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_plan_options: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mitigation_options: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contingency_options: Option<Vec<String>>,
    pub usage: UsageStatus,
}

impl EngineReply {
    /// An empty successful reply; callers fill in what their path produced.
    pub fn ok(usage: UsageStatus) -> Self {
        Self {
            success: true,
            interaction_id: None,
            response: None,
            error: None,
            fallback: None,
            cost_usd: 0.0,
            tokens_used: 0,
            is_complete: None,
            root_cause_options: None,
            action_plan_options: None,
            mitigation_options: None,
            contingency_options: None,
            usage,
        }
    }

    pub fn failed(error: String, fallback: String, usage: UsageStatus) -> Self {
        Self {
            success: false,
            error: Some(error),
            fallback: Some(fallback),
            ..Self::ok(usage)
        }
    }
}

/// Reply envelope for session-summary generation. A summary that fails JSON
/// parsing is the one hard failure: the raw text rides along as fallback.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryReply {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<crate::summary::SessionSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
    pub cost_usd: f64,
    pub tokens_used: u32,
    pub usage: UsageStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_round_trips_through_snake_case() {
        let s: Stage = "identify_assumptions_discovery".parse().unwrap();
        assert_eq!(s, Stage::IdentifyAssumptionsDiscovery);
        assert_eq!(s.as_str(), "identify_assumptions_discovery");
        assert!("not_a_stage".parse::<Stage>().is_err());
    }

    #[test]
    fn exchange_count_is_half_the_history() {
        let history: Vec<String> = (0..10).map(|i| format!("turn {}", i)).collect();
        assert_eq!(exchange_count(&history), 5);
        assert_eq!(exchange_count(&history[..7]), 3);
        assert_eq!(exchange_count(&[]), 0);
    }

    #[test]
    fn latest_user_turn_handles_both_parities() {
        let history = vec![
            "q1".to_string(),
            "a1".to_string(),
            "q2".to_string(),
            "a2".to_string(),
        ];
        assert_eq!(latest_user_turn(&history), Some("a2"));
        assert_eq!(latest_user_turn(&history[..3]), Some("a1"));
        assert_eq!(latest_user_turn(&history[..1]), None);
        assert_eq!(latest_user_turn(&[]), None);
    }

    #[test]
    fn user_turns_are_odd_indices() {
        let history = vec![
            "q1".to_string(),
            "a1".to_string(),
            "q2".to_string(),
            "a2".to_string(),
            "q3".to_string(),
        ];
        let turns: Vec<&String> = user_turns(&history).collect();
        assert_eq!(turns, vec!["a1", "a2"]);
    }

    #[test]
    fn goal_variants_exist_only_for_articulation_stages() {
        assert_eq!(
            Stage::ProblemArticulationIntervention.goal_variant(),
            Some(Stage::ProblemArticulationInterventionGoal)
        );
        assert_eq!(Stage::RootCause.goal_variant(), None);
    }
}
