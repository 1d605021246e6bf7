//! Conversational action planning
//!
//! A Socratic coaching loop that turns a chosen cause into concrete action
//! options. Completion after three full exchanges or on explicit
//! regeneration; regenerated batches escalate sampling temperature so the
//! user doesn't get the same four plans back.

use crate::detectors;
use crate::gateway::LlmGateway;
use crate::jsonx;
use crate::templates::OPTION_GENERATION_SYSTEM_PROMPT;
use crate::types::{ActionPlanningTurn, SessionContext, TranscriptEntry, user_turns};

const COMPLETE_RESPONSE: &str = "Choose your action plan from the options below:";

/// Everything one action-planning turn needs, owned so the dispatcher can
/// assemble it from request context.
#[derive(Debug, Clone, Default)]
pub struct ActionPlanningInput {
    pub cause: String,
    pub history: Vec<String>,
    pub is_contribution: bool,
    pub regenerate: bool,
    pub session_context: Option<SessionContext>,
    pub generation_count: u32,
    pub existing_plans: Vec<String>,
    pub pain_point: Option<String>,
    pub cause_analysis_history: Vec<TranscriptEntry>,
}

/// Temperature rises with each regeneration batch.
pub fn escalated_temperature(generation_count: u32) -> f32 {
    match generation_count {
        0 => 0.4,
        1 => 0.7,
        _ => 1.0,
    }
}

pub struct ActionPlanningController<'a> {
    gateway: &'a LlmGateway,
}

impl<'a> ActionPlanningController<'a> {
    pub fn new(gateway: &'a LlmGateway) -> Self {
        Self { gateway }
    }

    /// Decide the next turn: a coaching question, or completion with
    /// generated action-plan options. Never errors.
    pub async fn next_turn(&self, input: &ActionPlanningInput) -> ActionPlanningTurn {
        if input.history.len() >= 6 || input.regenerate {
            return self.complete(input).await;
        }
        ActionPlanningTurn::Question {
            response: self.coaching_question(input).await,
        }
    }

    async fn complete(&self, input: &ActionPlanningInput) -> ActionPlanningTurn {
        let responses: Vec<String> = user_turns(&input.history).cloned().collect();
        let vague = detectors::is_vague_action_input(&responses);
        let action_type = if input.is_contribution {
            "contribution"
        } else {
            "cause"
        };

        // Vague answers with no session context to lean on: skip the model
        // and hand out guidance options directly.
        if vague && input.session_context.is_none() {
            return ActionPlanningTurn::Complete {
                response: COMPLETE_RESPONSE.to_string(),
                action_plan_options: guidance_options(&input.cause, action_type),
            };
        }

        let prompt = self.generation_prompt(input);
        let temperature = escalated_temperature(input.generation_count);

        let options = match self
            .gateway
            .complete(&prompt, OPTION_GENERATION_SYSTEM_PROMPT, temperature)
            .await
        {
            Ok(completion) => match jsonx::extract_json(&completion.text) {
                Ok(value) => jsonx::string_array(&value, "action_plan_options"),
                Err(e) => {
                    tracing::warn!(error = %e, "action plan options were not valid JSON");
                    Vec::new()
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "action plan option generation failed");
                Vec::new()
            }
        };

        let action_plan_options = if !options.is_empty() {
            options
        } else if vague {
            guidance_options(&input.cause, action_type)
        } else {
            vec![
                format!(
                    "Create a specific plan to address this {action_type} with clear steps and timeline"
                ),
                format!(
                    "Set up environmental changes or cues to help you change this {action_type}"
                ),
                format!(
                    "Start with one small, immediate step you can take today about this {action_type}"
                ),
                format!("Find support or accountability to help you address this {action_type}"),
            ]
        };

        ActionPlanningTurn::Complete {
            response: COMPLETE_RESPONSE.to_string(),
            action_plan_options,
        }
    }

    fn generation_prompt(&self, input: &ActionPlanningInput) -> String {
        let context_section = context_section(input);
        let history_text = transcript(&input.history);

        if input.generation_count > 0 {
            let existing: String = input
                .existing_plans
                .iter()
                .map(|plan| format!("- {plan}\n"))
                .collect();
            format!(
                "You are an expert action planning coach. Your task is to generate 4 \
new, specific, and actionable options to address the user's stated \
cause/contribution.\n\n\
Cause/Contribution to Address: \"{cause}\"\n\
{context_section}\
Previously Generated Action Plans (for context):\n{existing}\n\
User's Planning Conversation:\n{history_text}\n\n\
Instructions:\n\
- You MUST generate 4 NEW options that are distinct from the previously \
generated plans listed above.\n\
- PRIORITIZE session context over conversation details to ensure \
suggestions are highly relevant and effective.\n\
- Focus on actions that directly address the specific cause while \
connecting to the user's broader situation.\n\
- If user responses were limited, rely more heavily on the session \
context.\n\
- Make actions specific to their actual situation, not generic advice.\n\n\
Each option must be new and distinct, concrete and specific, directly \
address the stated cause/contribution, include implementation details when \
possible, and be realistic and achievable.\n\n\
Return ONLY valid JSON:\n\
{{\n\
  \"action_plan_options\": [\n\
    \"New, specific action option 1\",\n\
    \"New, specific action option 2\",\n\
    \"New, specific action option 3\",\n\
    \"New, specific action option 4\"\n\
  ]\n\
}}",
                cause = input.cause,
            )
        } else {
            format!(
                "You are an expert action planning coach. Generate 4 specific, \
actionable options to address this cause/contribution.\n\n\
Cause/Contribution to Address: \"{cause}\"\n\
{context_section}\
User's Planning Conversation:\n{history_text}\n\n\
Instructions:\n\
- PRIORITIZE session context over conversation details when available\n\
- Use the original problem and related causes to ensure suggestions are \
highly relevant\n\
- Focus on actions that address the specific cause while connecting to \
their broader situation\n\
- If user responses were limited, rely more heavily on the session \
context\n\
- Make actions specific to their actual situation, not generic advice\n\n\
Each option must be concrete and specific, directly address the stated \
cause/contribution, include implementation details when possible, and be \
realistic and achievable.\n\n\
Return ONLY valid JSON:\n\
{{\n\
  \"action_plan_options\": [\n\
    \"Specific action option 1\",\n\
    \"Specific action option 2\",\n\
    \"Specific action option 3\",\n\
    \"Specific action option 4\"\n\
  ]\n\
}}",
                cause = input.cause,
            )
        }
    }

    async fn coaching_question(&self, input: &ActionPlanningInput) -> String {
        let history_text = if input.history.is_empty() {
            "This is the first question of the conversation.".to_string()
        } else {
            transcript(&input.history)
        };
        let qa_text = {
            let pairs = qa_pairs(&input.cause_analysis_history);
            if pairs.is_empty() {
                "No root cause analysis was performed for this cause.".to_string()
            } else {
                pairs.join("\n")
            }
        };

        let prompt = format!(
            "You are an expert action planning coach. Your goal is to help the user \
brainstorm and commit to a concrete, actionable plan to address their \
stated cause.\n\n\
Your Coaching Persona:\n\
- Forward-Looking and Practical: focus on solutions and next steps, not on \
further analysis of the past.\n\
- Encouraging and Collaborative: you are a partner in brainstorming, \
helping the user build on their own ideas.\n\
- Focused on Specificity: guide the user from vague intentions to \
specific, measurable actions.\n\n\
Comprehensive Context:\n\
- Original Problem: \"{pain_point}\"\n\
- Cause to Address: \"{cause}\"\n\
- Root Cause Analysis Q&A (if available):\n{qa_text}\n\
- Action Planning Conversation So Far:\n{history_text}\n\n\
Your Task: Based on all the context, generate a single, insightful \
follow-up question that moves the user toward a concrete action plan. If \
their last idea is vague, ask a question that makes it concrete. If it is \
a good first step, ask about building on it or about obstacles. If they \
are stuck, prompt for the smallest, easiest first step.\n\n\
CRITICAL: Your questions must be about actions and solutions, not about \
further diagnosing the cause. Return only the single question you've \
generated. No extra text, formatting, or explanation.",
            pain_point = input.pain_point.as_deref().unwrap_or(""),
            cause = input.cause,
        );

        match self
            .gateway
            .complete_default(&prompt, crate::templates::GUIDANCE_SYSTEM_PROMPT)
            .await
        {
            Ok(completion) => completion.text.trim().to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "coaching question generation failed");
                "That's a helpful start. What would be the next logical step to take?"
                    .to_string()
            }
        }
    }
}

fn transcript(history: &[String]) -> String {
    history
        .iter()
        .enumerate()
        .map(|(i, msg)| {
            let speaker = if i % 2 == 0 { "AI" } else { "User" };
            format!("{speaker}: {msg}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Consecutive transcript entries pair up as question/answer; a trailing
/// unanswered question is dropped.
fn qa_pairs(entries: &[TranscriptEntry]) -> Vec<String> {
    entries
        .chunks_exact(2)
        .filter(|pair| !pair[0].text.is_empty() && !pair[1].text.is_empty())
        .map(|pair| format!("  Q: {}\n  A: {}", pair[0].text, pair[1].text))
        .collect()
}

fn context_section(input: &ActionPlanningInput) -> String {
    let mut parts = Vec::new();

    let pain_point = input.pain_point.clone().or_else(|| {
        input
            .session_context
            .as_ref()
            .and_then(|ctx| ctx.get("pain_point"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    });
    if let Some(pain_point) = pain_point.filter(|p| !p.is_empty()) {
        parts.push(format!("- Original Problem: \"{pain_point}\""));
    }

    if let Some(ctx) = &input.session_context {
        for (key, label) in [
            ("causes", "Contributing Causes"),
            ("assumptions", "Identified Assumptions"),
            ("perpetuations", "Perpetuating Behaviors"),
        ] {
            if let Some(value) = ctx.get(key).filter(|v| !v.is_null()) {
                let text = crate::context::format_context_value(key, value);
                if !text.is_empty() {
                    parts.push(format!("- {label}: \"{text}\""));
                }
            }
        }
    }

    let pairs = qa_pairs(&input.cause_analysis_history);
    if !pairs.is_empty() {
        parts.push(format!("- Root Cause Analysis Q&A:\n{}", pairs.join("\n")));
    }

    if parts.is_empty() {
        return String::new();
    }
    format!(
        "\nCOMPREHENSIVE CONTEXT (for highly personalized coaching):\n{}\n\n\
Use this context to provide Socratic coaching that builds on their \
specific insights and situation.\n",
        parts.join("\n")
    )
}

/// Planning-oriented options for users whose answers were too vague to turn
/// into concrete plans. Keyword cues in the cause steer two of the four.
fn guidance_options(cause: &str, action_type: &str) -> Vec<String> {
    let cause_lower = cause.to_lowercase();
    let mut options = Vec::with_capacity(4);

    if ["habit", "always", "keep"].iter().any(|k| cause_lower.contains(k)) {
        options.push(format!(
            "Spend 10 minutes tracking when and why this {action_type} happens over the \
next 3 days, noting triggers, timing, and your mindset each time"
        ));
    } else {
        options.push(format!(
            "Write down 3 specific situations where this {action_type} typically occurs, \
including what leads up to it and how you feel during those moments"
        ));
    }

    options.push(format!(
        "Identify the single smallest change you could make tomorrow that would start \
addressing this {action_type}, even if it's just 5 minutes of preparation or research"
    ));

    if ["replace", "instead", "new"].iter().any(|k| cause_lower.contains(k)) {
        options.push(
            "List 3 alternative behaviors you could try instead, then choose one to test \
for just 2 days to see how it feels"
                .to_string(),
        );
    } else {
        options.push(format!(
            "Define exactly what it would look like if this {action_type} was no longer a \
problem, then identify one specific behavior that would indicate progress"
        ));
    }

    options.push(format!(
        "Identify one person you could talk to about this {action_type} or one resource \
(app, book, method) you could explore this week to get clearer on your approach"
    ));

    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::{stub_gateway, StubClient};
    use serde_json::json;
    use std::sync::Arc;

    fn input(history: &[&str]) -> ActionPlanningInput {
        ActionPlanningInput {
            cause: "I skip meal prep when work runs late".to_string(),
            history: history.iter().map(|t| t.to_string()).collect(),
            pain_point: Some("I eat badly all week".to_string()),
            ..Default::default()
        }
    }

    fn concrete_history() -> Vec<&'static str> {
        vec![
            "q1",
            "Every Sunday evening I will prepare five lunches and label them by weekday",
            "q2",
            "I plan to set up a shared calendar reminder and start this coming weekend",
            "q3",
            "I will schedule grocery delivery for Saturday morning so ingredients are ready",
        ]
    }

    #[tokio::test]
    async fn short_history_asks_a_coaching_question() {
        let client = Arc::new(StubClient::new());
        client.push_text("What would the very first step look like?");
        let gateway = stub_gateway(&client);

        let turn = ActionPlanningController::new(&gateway)
            .next_turn(&input(&["q1", "I could prep on Sundays maybe"]))
            .await;
        let ActionPlanningTurn::Question { response } = turn else {
            panic!("expected a question");
        };
        assert_eq!(response, "What would the very first step look like?");
        assert!(client.prompts()[0].contains("I eat badly all week"));
    }

    #[tokio::test]
    async fn coaching_question_has_a_fallback() {
        let client = Arc::new(StubClient::new());
        client.push_error("down");
        let gateway = stub_gateway(&client);

        let turn = ActionPlanningController::new(&gateway)
            .next_turn(&input(&[]))
            .await;
        let ActionPlanningTurn::Question { response } = turn else {
            panic!("expected a question");
        };
        assert!(response.contains("next logical step"));
    }

    #[tokio::test]
    async fn three_exchanges_complete_with_parsed_options() {
        let client = Arc::new(StubClient::new());
        client.push_text(
            r#"{"action_plan_options": ["Prep Sunday", "Order groceries", "Set reminder", "Batch cook"]}"#,
        );
        let gateway = stub_gateway(&client);

        let turn = ActionPlanningController::new(&gateway)
            .next_turn(&input(&concrete_history()))
            .await;
        let ActionPlanningTurn::Complete {
            response,
            action_plan_options,
        } = turn
        else {
            panic!("expected completion");
        };
        assert_eq!(response, COMPLETE_RESPONSE);
        assert_eq!(action_plan_options.len(), 4);
        assert!((client.temperatures()[0] - 0.4).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn vague_input_without_context_skips_the_model() {
        let client = Arc::new(StubClient::new());
        let gateway = stub_gateway(&client);

        let turn = ActionPlanningController::new(&gateway)
            .next_turn(&input(&["q1", "not sure", "q2", "maybe", "q3", "i guess"]))
            .await;
        let ActionPlanningTurn::Complete {
            action_plan_options, ..
        } = turn
        else {
            panic!("expected completion");
        };
        assert_eq!(action_plan_options.len(), 4);
        assert_eq!(client.request_count(), 0);
    }

    #[tokio::test]
    async fn vague_input_with_context_still_calls_the_model() {
        let client = Arc::new(StubClient::new());
        client.push_text(r#"{"action_plan_options": ["context-informed plan"]}"#);
        let gateway = stub_gateway(&client);

        let mut planning_input = input(&["q1", "not sure", "q2", "maybe", "q3", "i guess"]);
        let mut ctx = SessionContext::new();
        ctx.insert("causes".to_string(), json!(["late work nights"]));
        planning_input.session_context = Some(ctx);

        let turn = ActionPlanningController::new(&gateway)
            .next_turn(&planning_input)
            .await;
        assert!(turn.is_complete());
        assert_eq!(client.request_count(), 1);
        assert!(client.prompts()[0].contains("late work nights"));
    }

    #[tokio::test]
    async fn regeneration_escalates_temperature_and_names_existing_plans() {
        let client = Arc::new(StubClient::new());
        client.push_text(r#"{"action_plan_options": ["new plan"]}"#);
        let gateway = stub_gateway(&client);

        let mut planning_input = input(&concrete_history());
        planning_input.regenerate = true;
        planning_input.generation_count = 1;
        planning_input.existing_plans = vec!["Prep Sunday".to_string()];

        let turn = ActionPlanningController::new(&gateway)
            .next_turn(&planning_input)
            .await;
        assert!(turn.is_complete());
        assert!((client.temperatures()[0] - 0.7).abs() < f32::EPSILON);
        let prompt = &client.prompts()[0];
        assert!(prompt.contains("- Prep Sunday"));
        assert!(prompt.contains("4 NEW options"));
    }

    #[tokio::test]
    async fn second_regeneration_reaches_full_temperature() {
        assert!((escalated_temperature(0) - 0.4).abs() < f32::EPSILON);
        assert!((escalated_temperature(1) - 0.7).abs() < f32::EPSILON);
        assert!((escalated_temperature(2) - 1.0).abs() < f32::EPSILON);
        assert!((escalated_temperature(9) - 1.0).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn model_failure_with_concrete_input_uses_generic_fallbacks() {
        let client = Arc::new(StubClient::new());
        client.push_error("down");
        let gateway = stub_gateway(&client);

        let mut planning_input = input(&concrete_history());
        planning_input.is_contribution = true;

        let turn = ActionPlanningController::new(&gateway)
            .next_turn(&planning_input)
            .await;
        let ActionPlanningTurn::Complete {
            action_plan_options, ..
        } = turn
        else {
            panic!("expected completion");
        };
        assert_eq!(action_plan_options.len(), 4);
        assert!(action_plan_options[0].contains("contribution"));
    }

    #[test]
    fn guidance_options_react_to_cause_keywords() {
        let habit = guidance_options("I keep snoozing my alarm", "cause");
        assert!(habit[0].contains("tracking"));

        let replace = guidance_options("I want something new instead of scrolling", "cause");
        assert!(replace[2].contains("alternative behaviors"));

        let plain = guidance_options("meetings run over", "cause");
        assert!(plain[0].contains("3 specific situations"));
        assert_eq!(plain.len(), 4);
    }

    #[test]
    fn qa_pairs_drop_unpaired_and_empty_entries() {
        let entries = vec![
            TranscriptEntry { text: "Q1".into() },
            TranscriptEntry { text: "A1".into() },
            TranscriptEntry { text: "".into() },
            TranscriptEntry { text: "A2".into() },
            TranscriptEntry { text: "Q3".into() },
        ];
        let pairs = qa_pairs(&entries);
        assert_eq!(pairs.len(), 1);
        assert!(pairs[0].contains("Q: Q1"));
        assert!(pairs[0].contains("A: A1"));
    }
}
