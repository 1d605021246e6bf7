//! Runtime configuration
//!
//! Quotas and conversation thresholds live here rather than as inline
//! constants; the dynamic depth threshold in particular is a tunable, not a
//! load-bearing number.

use std::time::Duration;

/// Configuration for the LLM gateway (Anthropic Messages API, one fixed
/// small/fast model tier).
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// API base URL
    pub api_url: String,

    /// API key (from environment)
    pub api_key: String,

    /// Model to use (default: claude-3-haiku-20240307)
    pub model: String,

    /// Hard cap on generated tokens per call
    pub max_tokens: u32,

    /// Temperature used when a caller doesn't specify one
    pub default_temperature: f32,

    /// Transport timeout; a timeout is the same failure class as any other
    /// gateway error
    pub timeout: Duration,

    /// Pricing per million input tokens, USD
    pub input_price_per_mtok: f64,

    /// Pricing per million output tokens, USD
    pub output_price_per_mtok: f64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.anthropic.com/v1/messages".to_string(),
            api_key: std::env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
            model: "claude-3-haiku-20240307".to_string(),
            max_tokens: 1024,
            default_temperature: 0.4,
            timeout: Duration::from_secs(30),
            input_price_per_mtok: 0.25,
            output_price_per_mtok: 1.25,
        }
    }
}

/// Per-stage usage quota. There is no daily or whole-session cap.
#[derive(Debug, Clone)]
pub struct QuotaConfig {
    pub stage_limit: u32,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self { stage_limit: 5 }
    }
}

/// Guardrails for the cause-analysis conversation loop.
///
/// The depth threshold rises with conversation length: a solid score ends
/// the dialogue after the minimum three exchanges, but once a fourth
/// exchange has happened the bar goes up so the loop doesn't settle for a
/// mediocre insight late in the conversation.
#[derive(Debug, Clone)]
pub struct ConversationTuning {
    pub min_questions: usize,
    pub max_questions: usize,
    /// Required total score at exactly `min_questions` exchanges
    pub depth_threshold_early: u8,
    /// Required total score once more exchanges have accumulated
    pub depth_threshold_late: u8,
}

impl Default for ConversationTuning {
    fn default() -> Self {
        Self {
            min_questions: 3,
            max_questions: 5,
            depth_threshold_early: 4,
            depth_threshold_late: 5,
        }
    }
}

impl ConversationTuning {
    /// The score a depth evaluation must reach to end the conversation at
    /// the given number of completed exchanges.
    pub fn threshold_at(&self, exchanges: usize) -> u8 {
        if exchanges > self.min_questions {
            self.depth_threshold_late
        } else {
            self.depth_threshold_early
        }
    }
}
