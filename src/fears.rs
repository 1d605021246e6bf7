//! Fear analysis
//!
//! Generates mitigation and contingency options for a single named fear.
//! The two halves are independent calls: a failure in one leaves the other
//! intact, and a failed half comes back as an empty list rather than an
//! error.

use crate::gateway::LlmGateway;
use crate::jsonx;
use crate::templates::{self, PromptTemplate, TemplateBody, OPTION_GENERATION_SYSTEM_PROMPT};
use crate::types::{FearAnalysisOptions, FearContext, Stage};

const MAX_OPTIONS: usize = 4;

/// Generate mitigation and contingency strategies for one fear.
pub async fn fear_analysis_options(
    gateway: &LlmGateway,
    context: &FearContext,
) -> FearAnalysisOptions {
    let mitigation_options = generate_half(
        gateway,
        Stage::FearMitigation,
        "mitigation_options",
        context,
    )
    .await;
    let contingency_options = generate_half(
        gateway,
        Stage::FearContingency,
        "contingency_options",
        context,
    )
    .await;

    FearAnalysisOptions {
        mitigation_options,
        contingency_options,
    }
}

async fn generate_half(
    gateway: &LlmGateway,
    stage: Stage,
    key: &str,
    context: &FearContext,
) -> Vec<String> {
    let prompt = fill_template(stage, context);

    let completion = match gateway
        .complete_default(&prompt, OPTION_GENERATION_SYSTEM_PROMPT)
        .await
    {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(stage = %stage, error = %e, "fear option generation failed");
            return Vec::new();
        }
    };

    let mut options = match jsonx::extract_json(&completion.text) {
        Ok(value) => jsonx::string_array(&value, key),
        Err(_) => {
            tracing::debug!(stage = %stage, "fear options not valid JSON, parsing as text");
            parse_suggestions(&completion.text)
        }
    };
    options.truncate(MAX_OPTIONS);
    options
}

fn fill_template(stage: Stage, context: &FearContext) -> String {
    let body = match templates::template_for(stage) {
        Some(PromptTemplate::Structured(t)) => match t.body {
            TemplateBody::Unified(body) => body,
            TemplateBody::Sections { .. } => "",
        },
        _ => "",
    };

    let strategies = context.mitigation_strategies.join(", ");
    body.replace("{{painPoint}}", &context.pain_point)
        .replace("{{contributingCause}}", &context.contributing_cause)
        .replace("{{actionPlan}}", &context.action_plan)
        .replace("{{fearName}}", &context.fear_name)
        .replace("{{userMitigationInput}}", &context.user_mitigation_input)
        .replace("{{userContingencyInput}}", &context.user_contingency_input)
        .replace("{{mitigationStrategies}}", &strategies)
}

/// Salvage strategies from a prose reply: numbered or bulleted lines long
/// enough to be a real suggestion.
fn parse_suggestions(text: &str) -> Vec<String> {
    const PREFIXES: &[&str] = &["1.", "2.", "3.", "4.", "5.", "-", "•", "*"];

    text.lines()
        .map(str::trim)
        .filter_map(|line| {
            let stripped = PREFIXES
                .iter()
                .find_map(|p| line.strip_prefix(p))
                .unwrap_or(line)
                .trim();
            (stripped.len() > 10).then(|| stripped.to_string())
        })
        .take(5)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::{stub_gateway, StubClient};
    use std::sync::Arc;

    fn context() -> FearContext {
        FearContext {
            pain_point: "I avoid public speaking".to_string(),
            contributing_cause: "I fear being judged".to_string(),
            action_plan: "Volunteer for the monthly team demo".to_string(),
            fear_name: "Freezing mid-sentence".to_string(),
            user_mitigation_input: "Rehearse the night before".to_string(),
            user_contingency_input: "Have notes on hand".to_string(),
            mitigation_strategies: vec!["Rehearse with a friend".to_string()],
        }
    }

    #[tokio::test]
    async fn both_halves_parse_independently() {
        let client = Arc::new(StubClient::new());
        client.push_text(r#"{"mitigation_options": ["m1", "m2", "m3", "m4"]}"#);
        client.push_text(r#"{"contingency_options": ["c1", "c2"]}"#);
        let gateway = stub_gateway(&client);

        let options = fear_analysis_options(&gateway, &context()).await;
        assert_eq!(options.mitigation_options, vec!["m1", "m2", "m3", "m4"]);
        assert_eq!(options.contingency_options, vec!["c1", "c2"]);
        assert_eq!(client.request_count(), 2);
    }

    #[tokio::test]
    async fn mitigation_failure_leaves_contingency_intact() {
        let client = Arc::new(StubClient::new());
        client.push_error("connection reset");
        client.push_text(r#"{"contingency_options": ["c1"]}"#);
        let gateway = stub_gateway(&client);

        let options = fear_analysis_options(&gateway, &context()).await;
        assert!(options.mitigation_options.is_empty());
        assert_eq!(options.contingency_options, vec!["c1"]);
    }

    #[tokio::test]
    async fn prose_reply_is_salvaged_and_capped_at_four() {
        let client = Arc::new(StubClient::new());
        client.push_text(
            "Here are some ideas:\n\
             1. Rehearse your opening lines until they are automatic\n\
             2. Ask a colleague to sit in the front row for support\n\
             - Keep a glass of water nearby as a natural pause\n\
             * Practice a breathing exercise before stepping up\n\
             5. Record yourself once to spot nervous habits early\n\
             ok",
        );
        client.push_text(r#"{"contingency_options": []}"#);
        let gateway = stub_gateway(&client);

        let options = fear_analysis_options(&gateway, &context()).await;
        assert_eq!(options.mitigation_options.len(), 4);
        assert_eq!(
            options.mitigation_options[0],
            "Rehearse your opening lines until they are automatic"
        );
    }

    #[tokio::test]
    async fn prompts_interpolate_the_fear_context() {
        let client = Arc::new(StubClient::new());
        client.push_text(r#"{"mitigation_options": []}"#);
        client.push_text(r#"{"contingency_options": []}"#);
        let gateway = stub_gateway(&client);

        fear_analysis_options(&gateway, &context()).await;
        let prompts = client.prompts();
        assert!(prompts[0].contains("Freezing mid-sentence"));
        assert!(prompts[0].contains("Rehearse the night before"));
        assert!(!prompts[0].contains("{{"));
        assert!(prompts[1].contains("Have notes on hand"));
        assert!(prompts[1].contains("Rehearse with a friend"));
        assert!(!prompts[1].contains("{{"));
    }

    #[test]
    fn suggestion_parser_drops_short_lines() {
        let parsed = parse_suggestions("1. ok\n2. A genuinely useful suggestion here\nno");
        assert_eq!(parsed, vec!["A genuinely useful suggestion here"]);
    }
}
