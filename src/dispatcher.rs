//! Stage dispatcher
//!
//! The engine's front door. Every inbound request passes the per-stage
//! quota gate, gets routed to a template, a conversation controller, or
//! the fear generator, and leaves behind exactly one interaction record
//! covering all the model calls it fanned out to. Provider failures come
//! back as structured replies with an in-voice fallback, never as errors.

use crate::action_planning::{ActionPlanningController, ActionPlanningInput};
use crate::cause_analysis::CauseAnalysisController;
use crate::config::{ConversationTuning, QuotaConfig};
use crate::context::format_context_value;
use crate::db;
use crate::detectors;
use crate::fears;
use crate::gateway::LlmGateway;
use crate::jsonx;
use crate::limits::check_rate_limits;
use crate::summary::{analyze_interactions, SessionSummary};
use crate::templates::{
    template_for, PhrasePicker, PromptTemplate, TemplateBody, GUIDANCE_SYSTEM_PROMPT,
    OPTION_GENERATION_SYSTEM_PROMPT,
};
use crate::types::{
    ActionPlanningTurn, CauseAnalysisTurn, EngineReply, FearContext, InteractionRecord,
    SessionContext, Stage, StageRequest, SummaryReply, TranscriptEntry,
};
use anyhow::{bail, Result};
use rusqlite::Connection;
use serde_json::Value;

const GATEWAY_FALLBACK: &str =
    "It seems the AI is having a moment to itself. Please continue with your own thoughts for now.";

const QUOTA_FALLBACK: &str = "You've reached the limit for this button. Continue with your own \
thinking—you've got this! Other AI buttons are still available.";

const SUMMARY_QUOTA_FALLBACK: &str =
    "You've reached the limit for AI summaries. You can still review your session data.";

const SUMMARY_FALLBACK: &str =
    "Unable to generate AI summary at this time. You can still review your session data.";

pub struct SessionEngine<'a> {
    conn: &'a Connection,
    gateway: &'a LlmGateway,
    picker: &'a dyn PhrasePicker,
    quota: QuotaConfig,
    tuning: ConversationTuning,
}

impl<'a> SessionEngine<'a> {
    pub fn new(
        conn: &'a Connection,
        gateway: &'a LlmGateway,
        picker: &'a dyn PhrasePicker,
    ) -> Self {
        Self {
            conn,
            gateway,
            picker,
            quota: QuotaConfig::default(),
            tuning: ConversationTuning::default(),
        }
    }

    pub fn with_quota(mut self, quota: QuotaConfig) -> Self {
        self.quota = quota;
        self
    }

    /// Handle one stage request end to end.
    pub async fn respond(&self, req: &StageRequest) -> Result<EngineReply> {
        let limits = check_rate_limits(
            self.conn,
            &self.quota,
            &req.user_id,
            &req.session_id,
            Some(req.stage.as_str()),
        )?;
        if !limits.stage_allowed {
            tracing::info!(stage = %req.stage, session = %req.session_id, "stage quota reached");
            return Ok(EngineReply::failed(
                format!(
                    "Rate limit reached for this button. You've used {}/{} requests for this type of assistance.",
                    limits.stage_usage, limits.stage_limit
                ),
                QUOTA_FALLBACK.to_string(),
                limits,
            ));
        }

        let actual_stage = self.redirect_stage(req);
        if actual_stage != req.stage {
            tracing::debug!(requested = %req.stage, actual = %actual_stage, "stage redirected");
        }

        match actual_stage {
            Stage::ConversationalCauseAnalysis => self.cause_analysis_turn(req).await,
            Stage::ConversationalActionPlanning => self.action_planning_turn(req).await,
            Stage::FearMitigation | Stage::FearContingency => self.fear_options(req).await,
            _ => self.template_response(req, actual_stage, limits).await,
        }
    }

    /// Input-driven reroutes: off-topic assumption input falls back to the
    /// discovery template, goal-phrased input gets the goal variant.
    /// Quota and logging stay on the requested stage.
    fn redirect_stage(&self, req: &StageRequest) -> Stage {
        if req.stage == Stage::IdentifyAssumptions {
            let causes = causes_list(&req.context);
            if detectors::is_assumption_irrelevant(&req.user_input, &causes) {
                return Stage::IdentifyAssumptionsDiscovery;
            }
        }
        if let Some(goal_stage) = req.stage.goal_variant() {
            if detectors::is_goal_oriented(&req.user_input) {
                return goal_stage;
            }
        }
        req.stage
    }

    async fn cause_analysis_turn(&self, req: &StageRequest) -> Result<EngineReply> {
        let metered = self.gateway.metered();
        let cause = ctx_str(&req.context, "cause");
        let history = ctx_string_vec(&req.context, "history");
        let pain_point = ctx_str(&req.context, "painPoint");
        let regenerate = ctx_bool(&req.context, "regenerate");

        let controller = CauseAnalysisController::new(&metered, self.tuning.clone());
        let turn = controller
            .next_turn(&cause, &history, &pain_point, regenerate)
            .await;

        let logged = self.record_usage(&metered, req)?;
        let usage = check_rate_limits(self.conn, &self.quota, &req.user_id, &req.session_id, None)?;

        let mut reply = EngineReply::ok(usage);
        if let Some((id, cost, tokens)) = logged {
            reply.interaction_id = Some(id);
            reply.cost_usd = cost;
            reply.tokens_used = tokens;
        }
        match turn {
            CauseAnalysisTurn::Complete { root_cause_options } => {
                reply.response =
                    Some("Please select a root cause option from the choices provided.".to_string());
                reply.is_complete = Some(true);
                reply.root_cause_options = Some(root_cause_options);
            }
            CauseAnalysisTurn::Question { next_question } => {
                reply.response = Some(next_question);
                reply.is_complete = Some(false);
            }
        }
        Ok(reply)
    }

    async fn action_planning_turn(&self, req: &StageRequest) -> Result<EngineReply> {
        let metered = self.gateway.metered();
        let input = ActionPlanningInput {
            cause: ctx_str(&req.context, "cause"),
            history: ctx_string_vec(&req.context, "history"),
            is_contribution: ctx_bool(&req.context, "isContribution"),
            regenerate: ctx_bool(&req.context, "regenerate"),
            session_context: rich_session_context(&req.context),
            generation_count: ctx_u32(&req.context, "generationCount"),
            existing_plans: ctx_string_vec(&req.context, "existingPlans"),
            pain_point: Some(ctx_str(&req.context, "painPoint")).filter(|p| !p.is_empty()),
            cause_analysis_history: transcript_entries(&req.context, "causeAnalysisHistory"),
        };

        let controller = ActionPlanningController::new(&metered);
        let turn = controller.next_turn(&input).await;

        let logged = self.record_usage(&metered, req)?;
        let usage = check_rate_limits(self.conn, &self.quota, &req.user_id, &req.session_id, None)?;

        let mut reply = EngineReply::ok(usage);
        if let Some((id, cost, tokens)) = logged {
            reply.interaction_id = Some(id);
            reply.cost_usd = cost;
            reply.tokens_used = tokens;
        }
        match turn {
            ActionPlanningTurn::Complete {
                response,
                action_plan_options,
            } => {
                reply.response = Some(response);
                reply.is_complete = Some(true);
                reply.action_plan_options = Some(action_plan_options);
            }
            ActionPlanningTurn::Question { response } => {
                reply.response = Some(response);
                reply.is_complete = Some(false);
            }
        }
        Ok(reply)
    }

    async fn fear_options(&self, req: &StageRequest) -> Result<EngineReply> {
        let metered = self.gateway.metered();
        let fear_context: FearContext =
            serde_json::from_value(Value::Object(req.context.clone())).unwrap_or_default();

        let options = fears::fear_analysis_options(&metered, &fear_context).await;

        let logged = self.record_usage(&metered, req)?;
        let usage = check_rate_limits(self.conn, &self.quota, &req.user_id, &req.session_id, None)?;

        let mut reply = EngineReply::ok(usage);
        if let Some((id, cost, tokens)) = logged {
            reply.interaction_id = Some(id);
            reply.cost_usd = cost;
            reply.tokens_used = tokens;
        }
        reply.mitigation_options = Some(options.mitigation_options);
        reply.contingency_options = Some(options.contingency_options);
        Ok(reply)
    }

    async fn template_response(
        &self,
        req: &StageRequest,
        actual_stage: Stage,
        limits: crate::types::UsageStatus,
    ) -> Result<EngineReply> {
        let Some(template) = template_for(actual_stage) else {
            bail!("no template for stage {}", actual_stage);
        };

        let prompt = self.assemble_prompt(req, actual_stage, template);
        let metered = self.gateway.metered();

        let completion = match metered.complete_default(&prompt, GUIDANCE_SYSTEM_PROMPT).await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(stage = %actual_stage, error = %e, "stage response failed");
                return Ok(EngineReply::failed(
                    e.to_string(),
                    GATEWAY_FALLBACK.to_string(),
                    limits,
                ));
            }
        };

        let final_response = if actual_stage.wraps_response() {
            let PromptTemplate::Structured(t) = template else {
                unreachable!("wrapped stages are structured");
            };
            format!(
                "{}\n\n{}\n\n{}",
                self.picker.pick(t.intros),
                completion.text,
                self.picker.pick(t.conclusions)
            )
        } else {
            completion.text
        };

        let logged = self.record_usage(&metered, req)?;
        let usage = check_rate_limits(self.conn, &self.quota, &req.user_id, &req.session_id, None)?;

        let mut reply = EngineReply::ok(usage);
        if let Some((id, cost, tokens)) = logged {
            reply.interaction_id = Some(id);
            reply.cost_usd = cost;
            reply.tokens_used = tokens;
        }
        reply.response = Some(final_response);
        Ok(reply)
    }

    fn assemble_prompt(
        &self,
        req: &StageRequest,
        stage: Stage,
        template: &'static PromptTemplate,
    ) -> String {
        let mut prompt = match template {
            PromptTemplate::Plain(text) => text.to_string(),
            PromptTemplate::Structured(t) => {
                if stage.questions_only() {
                    let TemplateBody::Unified(body) = t.body else {
                        unreachable!("questions-only stages have unified bodies");
                    };
                    format!(
                        "[INSTRUCTIONS_START]\n\
These are your specific instructions for this response:\n\n\
{body}\n\n\
CRITICAL: Your response must contain ONLY the 2-3 questions you generate, \
formatted as a markdown bulleted list using '- '. Do not add any other \
text, headers, intros, or conclusions.\n\
[INSTRUCTIONS_END]\n\n\
Your response (questions only) begins now:"
                    )
                } else {
                    match (&t.body, &t.headers) {
                        (
                            TemplateBody::Sections {
                                analysis,
                                discovery,
                                conclusion,
                            },
                            Some(headers),
                        ) => format!(
                            "[INSTRUCTIONS_START]\n\
These are your specific instructions for this response:\n\n\
SECTION 1 - Header: {h1}\nInstructions: {analysis}\n\n\
SECTION 2 - Header: {h2}\nInstructions: {discovery}\n\n\
SECTION 3 - Header: {h3}\nInstructions: {conclusion}\n\n\
CRITICAL: Do not include any of the above instruction text in your \
response. Your response should be conversational and follow the \
instructions above. Start your response directly with the content for \
Section 1.\n\
[INSTRUCTIONS_END]\n\n\
Your conversational response begins now:",
                            h1 = headers.analysis,
                            h2 = headers.discovery,
                            h3 = headers.conclusion,
                        ),
                        (TemplateBody::Unified(body), _) => {
                            let mut text = body.to_string();
                            if text.contains("{{dynamic_intro}}") {
                                text = text
                                    .replace("{{dynamic_intro}}", self.picker.pick(t.intros));
                            }
                            if text.contains("{{dynamic_conclusion}}") {
                                text = text.replace(
                                    "{{dynamic_conclusion}}",
                                    self.picker.pick(t.conclusions),
                                );
                            }
                            text
                        }
                        (TemplateBody::Sections { analysis, .. }, None) => analysis.to_string(),
                    }
                }
            }
        };

        prompt = prompt.replace("{{userInput}}", &req.user_input);
        for (key, value) in &req.context {
            let placeholder = format!("{{{{{key}}}}}");
            if prompt.contains(&placeholder) {
                prompt = prompt.replace(&placeholder, &format_context_value(key, value));
            }
        }
        scrub_placeholders(&prompt)
    }

    /// Generate the end-of-session structured summary.
    pub async fn summarize(
        &self,
        user_id: &str,
        session_id: &str,
        context: &SessionContext,
    ) -> Result<SummaryReply> {
        let stage = Stage::SessionSummary.as_str();
        let limits =
            check_rate_limits(self.conn, &self.quota, user_id, session_id, Some(stage))?;
        if !limits.stage_allowed {
            return Ok(SummaryReply {
                success: false,
                interaction_id: None,
                summary: None,
                error: Some(format!(
                    "Rate limit reached for session summary. You've used {}/{} summary requests.",
                    limits.stage_usage, limits.stage_limit
                )),
                fallback: Some(SUMMARY_QUOTA_FALLBACK.to_string()),
                cost_usd: 0.0,
                tokens_used: 0,
                usage: limits,
            });
        }

        let Some(PromptTemplate::Plain(template)) = template_for(Stage::SessionSummary) else {
            bail!("session summary template missing");
        };

        let analysis = analyze_interactions(&db::session_log(self.conn, session_id)?);
        let mut prompt = template
            .replace("{{aiInteractionAnalysis}}", &analysis.ai_interaction_analysis)
            .replace("{{feedbackStrengths}}", &analysis.feedback_strengths)
            .replace("{{feedbackGrowth}}", &analysis.feedback_growth);
        for (key, value) in context {
            let placeholder = format!("{{{{{key}}}}}");
            if prompt.contains(&placeholder) {
                prompt = prompt.replace(&placeholder, &format_context_value(key, value));
            }
        }
        prompt = scrub_placeholders(&prompt);

        let metered = self.gateway.metered();
        let completion = match metered
            .complete_default(&prompt, OPTION_GENERATION_SYSTEM_PROMPT)
            .await
        {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "summary generation failed");
                return Ok(SummaryReply {
                    success: false,
                    interaction_id: None,
                    summary: None,
                    error: Some(e.to_string()),
                    fallback: Some(SUMMARY_FALLBACK.to_string()),
                    cost_usd: 0.0,
                    tokens_used: 0,
                    usage: limits,
                });
            }
        };

        let recorded = metered.recorded();
        let cost = metered.cost_usd(&recorded);

        let parsed = jsonx::extract_json(&completion.text)
            .and_then(|value| Ok(serde_json::from_value::<SessionSummary>(value)?));
        let summary = match parsed {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(error = %e, "summary was not valid structured JSON");
                return Ok(SummaryReply {
                    success: false,
                    interaction_id: None,
                    summary: None,
                    error: Some("Failed to generate structured summary".to_string()),
                    fallback: Some(completion.text),
                    cost_usd: cost,
                    tokens_used: recorded.total(),
                    usage: limits,
                });
            }
        };

        let record = InteractionRecord::new(user_id, session_id, stage, recorded, cost);
        db::insert_interaction(self.conn, &record)?;
        let usage = check_rate_limits(self.conn, &self.quota, user_id, session_id, None)?;

        Ok(SummaryReply {
            success: true,
            interaction_id: Some(record.id),
            summary: Some(summary),
            error: None,
            fallback: None,
            cost_usd: cost,
            tokens_used: recorded.total(),
            usage,
        })
    }

    /// Log the request's metered usage under its original stage name.
    /// Pure-heuristic paths that made no model call leave no record.
    fn record_usage(
        &self,
        metered: &LlmGateway,
        req: &StageRequest,
    ) -> Result<Option<(String, f64, u32)>> {
        let usage = metered.recorded();
        if usage.total() == 0 {
            return Ok(None);
        }
        let cost = metered.cost_usd(&usage);
        let record =
            InteractionRecord::new(&req.user_id, &req.session_id, req.stage.as_str(), usage, cost);
        db::insert_interaction(self.conn, &record)?;
        Ok(Some((record.id, cost, usage.total())))
    }
}

/// Drop any `{{name}}` spans that survived interpolation.
fn scrub_placeholders(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        match rest[start..].find("}}") {
            Some(end) => rest = &rest[start + end + 2..],
            None => {
                rest = &rest[start..];
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

fn ctx_str(ctx: &SessionContext, key: &str) -> String {
    ctx.get(key)
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string()
}

fn ctx_bool(ctx: &SessionContext, key: &str) -> bool {
    ctx.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn ctx_u32(ctx: &SessionContext, key: &str) -> u32 {
    ctx.get(key).and_then(Value::as_u64).unwrap_or(0) as u32
}

fn ctx_string_vec(ctx: &SessionContext, key: &str) -> Vec<String> {
    ctx.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn transcript_entries(ctx: &SessionContext, key: &str) -> Vec<TranscriptEntry> {
    ctx.get(key)
        .cloned()
        .map(serde_json::from_value)
        .and_then(Result::ok)
        .unwrap_or_default()
}

/// Causes may arrive as plain strings or records with a `cause` attribute.
fn causes_list(ctx: &SessionContext) -> Vec<String> {
    ctx.get("causes")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Object(map) => map
                        .get("cause")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

/// The full context, but only when it carries enough session substance to
/// be worth feeding to the planning prompt.
fn rich_session_context(ctx: &SessionContext) -> Option<SessionContext> {
    let rich = ["causes", "assumptions", "perpetuations", "pain_point"]
        .iter()
        .any(|key| {
            ctx.get(*key)
                .map(|v| !format_context_value(key, v).is_empty())
                .unwrap_or(false)
        });
    rich.then(|| ctx.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db_in_memory;
    use crate::gateway::testing::{stub_gateway, StubClient};
    use crate::templates::FixedPicker;
    use crate::types::TokenUsage;
    use serde_json::json;
    use std::sync::Arc;

    fn request(stage: Stage, input: &str, context: serde_json::Value) -> StageRequest {
        StageRequest {
            user_id: "u1".to_string(),
            session_id: "s1".to_string(),
            stage,
            user_input: input.to_string(),
            context: context.as_object().cloned().unwrap_or_default(),
        }
    }

    fn log_n(conn: &Connection, stage: &str, n: u32) {
        for _ in 0..n {
            let record = InteractionRecord::new("u1", "s1", stage, TokenUsage::default(), 0.0);
            db::insert_interaction(conn, &record).unwrap();
        }
    }

    #[tokio::test]
    async fn quota_gate_blocks_with_structured_fallback() {
        let conn = init_db_in_memory().unwrap();
        log_n(&conn, "root_cause", 5);
        let client = Arc::new(StubClient::new());
        let gateway = stub_gateway(&client);
        let picker = FixedPicker(0);
        let engine = SessionEngine::new(&conn, &gateway, &picker);

        let reply = engine
            .respond(&request(Stage::RootCause, "stress", json!({})))
            .await
            .unwrap();
        assert!(!reply.success);
        assert!(reply.error.as_deref().unwrap().contains("5/5"));
        assert_eq!(reply.fallback.as_deref(), Some(QUOTA_FALLBACK));
        assert_eq!(client.request_count(), 0);
    }

    #[tokio::test]
    async fn template_stage_interpolates_logs_and_costs() {
        let conn = init_db_in_memory().unwrap();
        let client = Arc::new(StubClient::new());
        client.push_text("- When you mention stress at work...");
        let gateway = stub_gateway(&client);
        let picker = FixedPicker(0);
        let engine = SessionEngine::new(&conn, &gateway, &picker);

        let reply = engine
            .respond(&request(
                Stage::RootCause,
                "stress at work, poor sleep",
                json!({ "painPoint": "I burn out every quarter", "causes": ["stress at work"] }),
            ))
            .await
            .unwrap();

        assert!(reply.success);
        assert!(reply.interaction_id.is_some());
        assert!(reply.cost_usd > 0.0);
        assert_eq!(reply.tokens_used, 200);

        let prompt = &client.prompts()[0];
        assert!(prompt.contains("SECTION 1"));
        assert!(prompt.contains("stress at work, poor sleep"));
        assert!(prompt.contains("I burn out every quarter"));
        assert!(!prompt.contains("{{"));

        let log = db::session_log(&conn, "s1").unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].stage, "root_cause");
        assert_eq!(reply.usage.stage_usage_by_stage.get("root_cause"), Some(&1));
    }

    #[tokio::test]
    async fn intervention_response_is_wrapped_by_the_picker() {
        let conn = init_db_in_memory().unwrap();
        let client = Arc::new(StubClient::new());
        client.push_text("- What does a typical evening look like?");
        let gateway = stub_gateway(&client);
        let picker = FixedPicker(0);
        let engine = SessionEngine::new(&conn, &gateway, &picker);

        let reply = engine
            .respond(&request(
                Stage::ProblemArticulationIntervention,
                "my sleep is terrible lately and it drags the whole week down",
                json!({}),
            ))
            .await
            .unwrap();

        let response = reply.response.unwrap();
        assert!(response.starts_with("Good start."));
        assert!(response.contains("- What does a typical evening look like?"));
        assert!(response.ends_with("update your problem description."));
        assert!(client.prompts()[0].contains("[INSTRUCTIONS_START]"));
    }

    #[tokio::test]
    async fn goal_phrased_input_reroutes_to_the_goal_variant() {
        let conn = init_db_in_memory().unwrap();
        let client = Arc::new(StubClient::new());
        client.push_text("- What's currently in the way?");
        let gateway = stub_gateway(&client);
        let picker = FixedPicker(0);
        let engine = SessionEngine::new(&conn, &gateway, &picker);

        let reply = engine
            .respond(&request(
                Stage::ProblemArticulationIntervention,
                "I want to get in shape",
                json!({}),
            ))
            .await
            .unwrap();

        let response = reply.response.unwrap();
        assert!(response.starts_with("That's a great goal to have."));
        assert!(client.prompts()[0].contains("stated a goal"));
        // Logged under the requested stage.
        let log = db::session_log(&conn, "s1").unwrap();
        assert_eq!(log[0].stage, "problem_articulation_intervention");
    }

    #[tokio::test]
    async fn irrelevant_assumption_input_reroutes_to_discovery() {
        let conn = init_db_in_memory().unwrap();
        let client = Arc::new(StubClient::new());
        client.push_text("Here are some hidden assumptions to consider...");
        let gateway = stub_gateway(&client);
        let picker = FixedPicker(0);
        let engine = SessionEngine::new(&conn, &gateway, &picker);

        let reply = engine
            .respond(&request(
                Stage::IdentifyAssumptions,
                "i don't know",
                json!({ "painPoint": "I overspend", "causes": ["impulse buying online"] }),
            ))
            .await
            .unwrap();

        assert!(reply.success);
        assert!(client.prompts()[0].contains("Potential Assumptions to Consider"));
        let log = db::session_log(&conn, "s1").unwrap();
        assert_eq!(log[0].stage, "identify_assumptions");
    }

    #[tokio::test]
    async fn relevant_assumption_input_stays_on_analysis() {
        let conn = init_db_in_memory().unwrap();
        let client = Arc::new(StubClient::new());
        client.push_text("analysis response");
        let gateway = stub_gateway(&client);
        let picker = FixedPicker(0);
        let engine = SessionEngine::new(&conn, &gateway, &picker);

        engine
            .respond(&request(
                Stage::IdentifyAssumptions,
                "I assume impulse buying makes me feel in control",
                json!({ "causes": ["impulse buying online"] }),
            ))
            .await
            .unwrap();
        assert!(client.prompts()[0].contains("Testing Your Assumptions"));
    }

    #[tokio::test]
    async fn gateway_failure_becomes_a_structured_fallback() {
        let conn = init_db_in_memory().unwrap();
        let client = Arc::new(StubClient::new());
        client.push_error("service unavailable");
        let gateway = stub_gateway(&client);
        let picker = FixedPicker(0);
        let engine = SessionEngine::new(&conn, &gateway, &picker);

        let reply = engine
            .respond(&request(Stage::Perpetuation, "I hit snooze", json!({})))
            .await
            .unwrap();
        assert!(!reply.success);
        assert_eq!(reply.fallback.as_deref(), Some(GATEWAY_FALLBACK));
        assert!(db::session_log(&conn, "s1").unwrap().is_empty());
    }

    #[tokio::test]
    async fn cause_analysis_turn_is_metered_and_logged_once() {
        let conn = init_db_in_memory().unwrap();
        let client = Arc::new(StubClient::new());
        client.push_text("What does the evening drink do for you?");
        let gateway = stub_gateway(&client);
        let picker = FixedPicker(0);
        let engine = SessionEngine::new(&conn, &gateway, &picker);

        let reply = engine
            .respond(&request(
                Stage::ConversationalCauseAnalysis,
                "",
                json!({ "cause": "I drink every evening", "history": [], "painPoint": "drinking" }),
            ))
            .await
            .unwrap();

        assert!(reply.success);
        assert_eq!(reply.is_complete, Some(false));
        assert_eq!(
            reply.response.as_deref(),
            Some("What does the evening drink do for you?")
        );
        assert!(reply.tokens_used > 0);
        let log = db::session_log(&conn, "s1").unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].stage, "conversational_cause_analysis");
    }

    #[tokio::test]
    async fn completed_cause_analysis_returns_options() {
        let conn = init_db_in_memory().unwrap();
        let client = Arc::new(StubClient::new());
        client.push_text(
            r#"{"total_score": 5, "foundational_score": 3, "causal_score": 2,
                "is_root_cause": true, "reasoning": "", "suggested_follow_up": "causal"}"#,
        );
        client.push_text(r#"{"root_cause_options": ["o1", "o2", "o3", "o4"]}"#);
        let gateway = stub_gateway(&client);
        let picker = FixedPicker(0);
        let engine = SessionEngine::new(&conn, &gateway, &picker);

        let reply = engine
            .respond(&request(
                Stage::ConversationalCauseAnalysis,
                "",
                json!({
                    "cause": "I overwork",
                    "history": ["q1", "a1", "q2", "a2", "q3", "I believe I must earn rest"],
                    "painPoint": "burnout"
                }),
            ))
            .await
            .unwrap();

        assert_eq!(reply.is_complete, Some(true));
        assert_eq!(
            reply.root_cause_options.as_ref().map(Vec::len),
            Some(4)
        );
        // Two model calls, one ledger row.
        assert_eq!(client.request_count(), 2);
        assert_eq!(db::session_log(&conn, "s1").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn vague_action_planning_logs_nothing() {
        let conn = init_db_in_memory().unwrap();
        let client = Arc::new(StubClient::new());
        let gateway = stub_gateway(&client);
        let picker = FixedPicker(0);
        let engine = SessionEngine::new(&conn, &gateway, &picker);

        let reply = engine
            .respond(&request(
                Stage::ConversationalActionPlanning,
                "",
                json!({
                    "cause": "I skip workouts",
                    "history": ["q1", "not sure", "q2", "maybe", "q3", "i guess"]
                }),
            ))
            .await
            .unwrap();

        assert_eq!(reply.is_complete, Some(true));
        assert!(reply.action_plan_options.is_some());
        assert!(reply.interaction_id.is_none());
        assert_eq!(reply.tokens_used, 0);
        assert!(db::session_log(&conn, "s1").unwrap().is_empty());
    }

    #[tokio::test]
    async fn fear_stage_returns_both_option_lists() {
        let conn = init_db_in_memory().unwrap();
        let client = Arc::new(StubClient::new());
        client.push_text(r#"{"mitigation_options": ["m1", "m2"]}"#);
        client.push_text(r#"{"contingency_options": ["c1"]}"#);
        let gateway = stub_gateway(&client);
        let picker = FixedPicker(0);
        let engine = SessionEngine::new(&conn, &gateway, &picker);

        let reply = engine
            .respond(&request(
                Stage::FearMitigation,
                "",
                json!({
                    "painPoint": "public speaking",
                    "fearName": "freezing up",
                    "userMitigationInput": "rehearse beforehand"
                }),
            ))
            .await
            .unwrap();

        assert!(reply.success);
        assert_eq!(reply.mitigation_options.as_ref().map(Vec::len), Some(2));
        assert_eq!(reply.contingency_options.as_ref().map(Vec::len), Some(1));
        assert_eq!(db::session_log(&conn, "s1").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn summary_parses_and_logs() {
        let conn = init_db_in_memory().unwrap();
        log_n(&conn, "root_cause", 1);
        let client = Arc::new(StubClient::new());
        client.push_text(
            r#"{
                "title": "t", "problem_overview": "p",
                "key_insights": ["k"],
                "action_plan": { "primary_action": "a" },
                "feedback": { "strengths": "s", "areas_for_growth": "g" },
                "conclusion": "c"
            }"#,
        );
        let gateway = stub_gateway(&client);
        let picker = FixedPicker(0);
        let engine = SessionEngine::new(&conn, &gateway, &picker);

        let context: SessionContext = json!({
            "painPoint": "I sleep badly",
            "causes": ["late screens"]
        })
        .as_object()
        .cloned()
        .unwrap();

        let reply = engine.summarize("u1", "s1", &context).await.unwrap();
        assert!(reply.success);
        assert_eq!(reply.summary.as_ref().unwrap().title, "t");
        assert!(reply.tokens_used > 0);

        let prompt = &client.prompts()[0];
        assert!(prompt.contains("I sleep badly"));
        assert!(prompt.contains("1 occasion(s)"));
        assert!(!prompt.contains("{{"));

        let log = db::session_log(&conn, "s1").unwrap();
        assert_eq!(log.last().unwrap().stage, "session_summary");
    }

    #[tokio::test]
    async fn unstructured_summary_rides_back_as_fallback() {
        let conn = init_db_in_memory().unwrap();
        let client = Arc::new(StubClient::new());
        client.push_text("Here's a lovely prose summary instead of JSON.");
        let gateway = stub_gateway(&client);
        let picker = FixedPicker(0);
        let engine = SessionEngine::new(&conn, &gateway, &picker);

        let reply = engine
            .summarize("u1", "s1", &SessionContext::new())
            .await
            .unwrap();
        assert!(!reply.success);
        assert_eq!(
            reply.error.as_deref(),
            Some("Failed to generate structured summary")
        );
        assert!(reply
            .fallback
            .as_deref()
            .unwrap()
            .contains("lovely prose summary"));
        assert!(db::session_log(&conn, "s1").unwrap().is_empty());
    }

    #[tokio::test]
    async fn summary_quota_blocks_before_any_call() {
        let conn = init_db_in_memory().unwrap();
        log_n(&conn, "session_summary", 5);
        let client = Arc::new(StubClient::new());
        let gateway = stub_gateway(&client);
        let picker = FixedPicker(0);
        let engine = SessionEngine::new(&conn, &gateway, &picker);

        let reply = engine
            .summarize("u1", "s1", &SessionContext::new())
            .await
            .unwrap();
        assert!(!reply.success);
        assert_eq!(reply.fallback.as_deref(), Some(SUMMARY_QUOTA_FALLBACK));
        assert_eq!(client.request_count(), 0);
    }

    #[test]
    fn placeholder_scrubbing_removes_unfilled_spans() {
        assert_eq!(scrub_placeholders("a {{gone}} b"), "a  b");
        assert_eq!(scrub_placeholders("{{x}}{{y}}"), "");
        assert_eq!(scrub_placeholders("plain text"), "plain text");
        assert_eq!(scrub_placeholders("open {{never"), "open {{never");
    }

    #[test]
    fn session_context_richness_gates_the_clone() {
        let empty: SessionContext = json!({ "history": ["a"] }).as_object().cloned().unwrap();
        assert!(rich_session_context(&empty).is_none());

        let rich: SessionContext = json!({ "causes": ["late nights"] })
            .as_object()
            .cloned()
            .unwrap();
        assert!(rich_session_context(&rich).is_some());
    }
}
