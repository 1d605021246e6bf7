//! Conversational cause analysis
//!
//! An adaptive question loop bounded by guardrails: at least three
//! exchanges before completion, never more than five. The depth evaluator
//! decides whether the latest answer has reached a root cause; repeated
//! uncertainty short-circuits to hedged option generation instead of
//! grinding a stuck user through more questions.
//!
//! The controller never errors. Every LLM failure lands on a canned
//! question or canned options so the conversation always moves.

use crate::config::ConversationTuning;
use crate::detectors;
use crate::evaluator::DepthEvaluator;
use crate::gateway::LlmGateway;
use crate::jsonx;
use crate::templates::OPTION_GENERATION_SYSTEM_PROMPT;
use crate::types::{
    exchange_count, latest_user_turn, user_turns, CauseAnalysisTurn, FollowUpAxis,
};

const SUMMARY_PREAMBLE: &str = "\
CRITICAL INSTRUCTION - CONTEXT-AWARE TERM INTERPRETATION:\n\
Before analyzing anything, carefully examine the conversation context, \
especially the original problem statement and stated cause, to understand \
the user's specific terminology. Pay special attention to how terms are \
defined in their problem, but also use common sense: if they mentioned \
\"drinking alcohol\" in their original problem, a later reference to \
\"drinking\" should usually be understood as \"drinking alcohol\" unless \
the context clearly implies otherwise. Apply this contextual understanding \
consistently throughout your analysis.\n\n\
Based on the following conversation about a user's cause, generate 3-4 \
potential root cause statements that capture the deeper insights revealed \
through the dialogue.\n\n\
Each root cause option should:\n\
- Be a complete, actionable statement (not a question)\n\
- Reflect the underlying \"why\" behind the surface-level cause\n\
- Be distinct from the others\n\
- Be written in first person from the user's perspective\n\n\
Return your response as valid JSON in this exact format:\n\
{\n\
  \"root_cause_options\": [\n\
    \"First root cause statement here\",\n\
    \"Second root cause statement here\",\n\
    \"Third root cause statement here\",\n\
    \"Fourth root cause statement here\"\n\
  ]\n\
}";

const EVALUATION_FAILED_QUESTIONS: &[&str] = &[
    "What makes this behavior feel necessary or important to you?",
    "When did you first notice this pattern starting?",
    "What would have to change for you to no longer need this behavior?",
];

pub struct CauseAnalysisController<'a> {
    gateway: &'a LlmGateway,
    tuning: ConversationTuning,
}

impl<'a> CauseAnalysisController<'a> {
    pub fn new(gateway: &'a LlmGateway, tuning: ConversationTuning) -> Self {
        Self { gateway, tuning }
    }

    /// Decide the next turn of the conversation: another question or
    /// completion with generated root-cause options.
    pub async fn next_turn(
        &self,
        cause: &str,
        history: &[String],
        pain_point: &str,
        regenerate: bool,
    ) -> CauseAnalysisTurn {
        let exchanges = exchange_count(history);

        let uncertain_turns = user_turns(history)
            .filter(|turn| detectors::is_uncertain(turn))
            .count();

        if uncertain_turns >= 2 && exchanges >= self.tuning.min_questions {
            tracing::info!(
                uncertain_turns,
                exchanges,
                "completing cause analysis due to repeated uncertainty"
            );
            return CauseAnalysisTurn::Complete {
                root_cause_options: self
                    .generate_options(cause, history, pain_point, true)
                    .await,
            };
        }

        if exchanges >= self.tuning.max_questions
            || (regenerate && exchanges >= self.tuning.min_questions)
        {
            return CauseAnalysisTurn::Complete {
                root_cause_options: self
                    .generate_options(cause, history, pain_point, false)
                    .await,
            };
        }

        if exchanges >= self.tuning.min_questions {
            if let Some(latest) = latest_user_turn(history) {
                let evaluation = DepthEvaluator::new(self.gateway)
                    .evaluate(cause, Some(latest))
                    .await;
                let threshold = self.tuning.threshold_at(exchanges);
                if evaluation.success && evaluation.total_score >= threshold {
                    tracing::info!(
                        score = evaluation.total_score,
                        threshold,
                        exchanges,
                        "root cause depth reached"
                    );
                    return CauseAnalysisTurn::Complete {
                        root_cause_options: self
                            .generate_options(cause, history, pain_point, false)
                            .await,
                    };
                }
                if evaluation.success {
                    tracing::debug!(
                        score = evaluation.total_score,
                        threshold,
                        "depth score below threshold, continuing"
                    );
                } else {
                    tracing::debug!("depth evaluation degraded, continuing");
                }
            }
        }

        CauseAnalysisTurn::Question {
            next_question: self.next_question(cause, history, exchanges).await,
        }
    }

    async fn next_question(&self, cause: &str, history: &[String], exchanges: usize) -> String {
        if exchanges == 0 {
            return self.opening_question(cause).await;
        }

        let Some(latest) = latest_user_turn(history) else {
            return "What do you think drives this behavior?".to_string();
        };

        if detectors::is_uncertain(latest) {
            return self.reframing_question(cause, latest, exchanges).await;
        }

        let evaluation = DepthEvaluator::new(self.gateway)
            .evaluate(cause, Some(latest))
            .await;
        if evaluation.success {
            self.adaptive_question(cause, latest, evaluation.suggested_follow_up, exchanges)
                .await
        } else {
            let index = (exchanges - 1).min(EVALUATION_FAILED_QUESTIONS.len() - 1);
            EVALUATION_FAILED_QUESTIONS[index].to_string()
        }
    }

    async fn opening_question(&self, cause: &str) -> String {
        let prompt = format!(
            "You are helping a user start a root cause analysis conversation. \
Generate a single, personalized opening question based on their stated \
cause.\n\n\
User's Stated Cause: \"{cause}\"\n\n\
Instructions:\n\
1. Identify the most significant factor in their statement: an external \
event, a personal behavior, an expressed belief, or a feeling.\n\
2. Formulate a single, open-ended question that directly addresses that \
key factor.\n\
3. The question should encourage more detail about that specific factor \
to understand the \"why\" behind it.\n\
4. Do not make assumptions or introduce new concepts.\n\n\
Be direct and clear, use natural everyday language, and make the question \
an obvious follow-up to their stated cause.\n\n\
Generate only a single, direct question. Do not include any other text, \
explanations, or formatting."
        );

        match self
            .gateway
            .complete_default(&prompt, crate::templates::GUIDANCE_SYSTEM_PROMPT)
            .await
        {
            Ok(completion) => completion.text.trim().to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "opening question generation failed");
                "What's behind this? Can you tell me more about what's driving this situation?"
                    .to_string()
            }
        }
    }

    async fn reframing_question(&self, cause: &str, latest: &str, exchanges: usize) -> String {
        let prompt = format!(
            "The user is expressing uncertainty about the cause: \"{cause}\"\n\n\
Their uncertain response was: \"{latest}\"\n\n\
Generate a single, empathetic follow-up question that:\n\
- Acknowledges their uncertainty without judgment\n\
- Offers a different angle or perspective to explore the cause\n\
- Incorporates their specific situation and response\n\
- Helps them think about the cause in a new way\n\
- Is conversational and supportive\n\n\
Return only the question text, no other formatting."
        );

        match self
            .gateway
            .complete_default(&prompt, crate::templates::GUIDANCE_SYSTEM_PROMPT)
            .await
        {
            Ok(completion) => completion.text.trim().to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "reframing question generation failed");
                let alternatives = [
                    format!(
                        "What if we approached '{cause}' from a different angle - when do you NOT experience this issue?"
                    ),
                    format!(
                        "Instead of focusing on why '{cause}' happens, what would need to change for it to completely disappear?"
                    ),
                    format!(
                        "If someone you trust had the same experience with '{cause}', what would you tell them might be behind it?"
                    ),
                ];
                alternatives[(exchanges - 1).min(alternatives.len() - 1)].clone()
            }
        }
    }

    async fn adaptive_question(
        &self,
        cause: &str,
        latest: &str,
        axis: FollowUpAxis,
        exchanges: usize,
    ) -> String {
        let focus = match axis {
            FollowUpAxis::Actionable => "actionable",
            FollowUpAxis::Foundational => "foundational",
            FollowUpAxis::Causal => "causal",
        };
        let prompt = format!(
            "You are helping someone explore the root cause of their problem \
through thoughtful questioning.\n\n\
Context:\n\
- Original Cause: \"{cause}\"\n\
- User's Response: \"{latest}\"\n\
- Focus Area: {focus} (actionable = what they can control, foundational = \
deeper beliefs/needs, causal = what drives this)\n\
- Question Number: {number}\n\n\
Generate a single, conversational follow-up question that shows you \
understand their specific response, builds naturally on what they just \
shared, guides them to explore the {focus} dimension more deeply, feels \
personalized to their situation, and encourages self-reflection and \
ownership.\n\n\
Instead of asking \"What beliefs drive this?\" ask something like \"You \
mentioned [specific thing they said] - what do you think that reveals \
about what you believe is necessary or important?\"\n\n\
Return only the question text, no other formatting or explanation.",
            number = exchanges + 1,
        );

        match self
            .gateway
            .complete_default(&prompt, crate::templates::GUIDANCE_SYSTEM_PROMPT)
            .await
        {
            Ok(completion) => completion.text.trim().to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "adaptive question generation failed");
                let fallbacks: &[&str] = match axis {
                    FollowUpAxis::Actionable => &[
                        "What part of this feels like something you could actually influence or change?",
                        "If you were advising someone else in this exact situation, what would you tell them they have control over?",
                        "What would taking ownership of just one piece of this look like?",
                    ],
                    FollowUpAxis::Foundational => &[
                        "What does this pattern tell you about what you believe you need or deserve?",
                        "If this behavior is serving some purpose, what might that purpose be?",
                        "What would have to be true about yourself or your situation for this to make sense?",
                    ],
                    FollowUpAxis::Causal => &[
                        "What do you think is really driving this - the engine underneath it all?",
                        "If this pattern completely disappeared tomorrow, what would that mean had changed?",
                        "When you trace this back, what feels like the real starting point?",
                    ],
                };
                fallbacks[(exchanges - 1).min(fallbacks.len() - 1)].to_string()
            }
        }
    }

    async fn generate_options(
        &self,
        cause: &str,
        history: &[String],
        pain_point: &str,
        hedged: bool,
    ) -> Vec<String> {
        let note = if hedged {
            "\n\nThe user has expressed uncertainty multiple times. Generate 4 \
diverse root cause statements that explore different possibilities for why \
this cause might exist, even with limited specific information from the \
conversation."
        } else {
            "\n\nGenerate 4 diverse root cause statements that dig deeper than \
the surface-level cause. Each should offer a different perspective on why \
this cause exists."
        };

        let prompt = format!(
            "{SUMMARY_PREAMBLE}\n\nPain Point: {pain_point}\nCause: {cause}\n\
Conversation History: {history:?}{note}"
        );

        let options = match self
            .gateway
            .complete_default(&prompt, OPTION_GENERATION_SYSTEM_PROMPT)
            .await
        {
            Ok(completion) => match jsonx::extract_json(&completion.text) {
                Ok(value) => jsonx::string_array(&value, "root_cause_options"),
                Err(e) => {
                    tracing::warn!(error = %e, "root cause options were not valid JSON");
                    Vec::new()
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "root cause option generation failed");
                Vec::new()
            }
        };

        if !options.is_empty() {
            return options;
        }

        if hedged {
            vec![
                format!(
                    "I haven't fully explored what drives '{cause}' yet, but it might be a deeper need I'm not addressing"
                ),
                format!(
                    "There could be beliefs or assumptions behind '{cause}' that I haven't identified"
                ),
                format!("'{cause}' might be a pattern that serves a purpose I'm not aware of"),
                format!(
                    "External factors might be influencing '{cause}' in ways I haven't recognized"
                ),
            ]
        } else {
            vec![
                format!("The underlying need behind '{cause}' isn't being met in healthier ways"),
                format!("I have beliefs or assumptions that make '{cause}' feel necessary"),
                format!("There are environmental or situational factors that trigger '{cause}'"),
                "I lack the skills, resources, or support to handle this differently".to_string(),
            ]
        }
    }
}
