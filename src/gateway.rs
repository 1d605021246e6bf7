//! LLM gateway
//!
//! Single point of contact with the model provider. One call in, one
//! completion out: no retries, no streaming. Transport errors, provider
//! errors, and timeouts all propagate to the caller unchanged; callers own
//! the translation into user-facing fallbacks.
//!
//! The gateway also meters token usage. The dispatcher clones a
//! fresh-metered gateway per inbound request, so one interaction record can
//! account for every model call the request fanned out to.

use crate::config::GatewayConfig;
use crate::types::TokenUsage;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// One request to the model.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub model: String,
    pub max_tokens: u32,
    pub system_prompt: String,
    pub temperature: f32,
    pub prompt: String,
}

/// One completed model response.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// The injectable seam to the model provider.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &LlmRequest) -> Result<Completion>;
}

/// Anthropic Messages API client.
pub struct AnthropicClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl AnthropicClient {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, request: &LlmRequest) -> Result<Completion> {
        if self.api_key.is_empty() {
            return Err(anyhow!("ANTHROPIC_API_KEY not set"));
        }

        let body = serde_json::json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "system": request.system_prompt,
            "temperature": request.temperature,
            "messages": [
                { "role": "user", "content": request.prompt }
            ]
        });

        let response = self
            .http
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("API error {}: {}", status, error_text));
        }

        let json: serde_json::Value = response.json().await?;
        let text = json["content"][0]["text"].as_str().unwrap_or("").to_string();
        let input_tokens = json["usage"]["input_tokens"].as_u64().unwrap_or(0) as u32;
        let output_tokens = json["usage"]["output_tokens"].as_u64().unwrap_or(0) as u32;

        Ok(Completion {
            text,
            input_tokens,
            output_tokens,
        })
    }
}

/// Metered front door to the model. Cheap to clone; `metered()` hands out a
/// clone with a fresh counter so concurrent requests never share a meter.
#[derive(Clone)]
pub struct LlmGateway {
    client: Arc<dyn LlmClient>,
    config: GatewayConfig,
    meter: Arc<Mutex<TokenUsage>>,
}

impl LlmGateway {
    pub fn new(client: Arc<dyn LlmClient>, config: GatewayConfig) -> Self {
        Self {
            client,
            config,
            meter: Arc::new(Mutex::new(TokenUsage::default())),
        }
    }

    /// A clone of this gateway with a zeroed meter, for scoping usage to a
    /// single inbound request.
    pub fn metered(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            config: self.config.clone(),
            meter: Arc::new(Mutex::new(TokenUsage::default())),
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Send one prompt. Token usage of successful calls accumulates in this
    /// gateway's meter.
    pub async fn complete(
        &self,
        prompt: &str,
        system_prompt: &str,
        temperature: f32,
    ) -> Result<Completion> {
        let request = LlmRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            system_prompt: system_prompt.to_string(),
            temperature,
            prompt: prompt.to_string(),
        };

        let completion = self.client.complete(&request).await?;
        self.meter
            .lock()
            .expect("token meter poisoned")
            .add(completion.input_tokens, completion.output_tokens);
        Ok(completion)
    }

    /// Shorthand using the configured default temperature.
    pub async fn complete_default(&self, prompt: &str, system_prompt: &str) -> Result<Completion> {
        self.complete(prompt, system_prompt, self.config.default_temperature)
            .await
    }

    /// Usage recorded since this meter was created.
    pub fn recorded(&self) -> TokenUsage {
        *self.meter.lock().expect("token meter poisoned")
    }

    /// Cost of the given usage at the configured pricing tier.
    pub fn cost_usd(&self, usage: &TokenUsage) -> f64 {
        usage.input_tokens as f64 / 1_000_000.0 * self.config.input_price_per_mtok
            + usage.output_tokens as f64 / 1_000_000.0 * self.config.output_price_per_mtok
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted client for exercising controllers without a provider.

    use super::*;
    use std::collections::VecDeque;

    pub enum StubReply {
        Text(String),
        Error(String),
    }

    /// Pops scripted replies in order and records every request it saw.
    /// An exhausted script behaves like a provider outage.
    #[derive(Default)]
    pub struct StubClient {
        pub replies: Mutex<VecDeque<StubReply>>,
        pub requests: Mutex<Vec<LlmRequest>>,
    }

    impl StubClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_text(&self, text: &str) {
            self.replies
                .lock()
                .unwrap()
                .push_back(StubReply::Text(text.to_string()));
        }

        pub fn push_error(&self, message: &str) {
            self.replies
                .lock()
                .unwrap()
                .push_back(StubReply::Error(message.to_string()));
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        pub fn prompts(&self) -> Vec<String> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.prompt.clone())
                .collect()
        }

        pub fn temperatures(&self) -> Vec<f32> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.temperature)
                .collect()
        }
    }

    #[async_trait]
    impl LlmClient for StubClient {
        async fn complete(&self, request: &LlmRequest) -> Result<Completion> {
            self.requests.lock().unwrap().push(request.clone());
            match self.replies.lock().unwrap().pop_front() {
                Some(StubReply::Text(text)) => Ok(Completion {
                    text,
                    input_tokens: 120,
                    output_tokens: 80,
                }),
                Some(StubReply::Error(message)) => Err(anyhow!(message)),
                None => Err(anyhow!("stub script exhausted")),
            }
        }
    }

    /// A gateway over a shared stub client, for controller tests.
    pub fn stub_gateway(client: &Arc<StubClient>) -> LlmGateway {
        LlmGateway::new(
            Arc::clone(client) as Arc<dyn LlmClient>,
            GatewayConfig {
                api_key: "test-key".to_string(),
                ..GatewayConfig::default()
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[tokio::test]
    async fn meter_accumulates_across_calls() {
        let client = Arc::new(StubClient::new());
        client.push_text("one");
        client.push_text("two");
        let gateway = stub_gateway(&client);

        gateway.complete_default("p1", "s").await.unwrap();
        gateway.complete_default("p2", "s").await.unwrap();

        let usage = gateway.recorded();
        assert_eq!(usage.input_tokens, 240);
        assert_eq!(usage.output_tokens, 160);
    }

    #[tokio::test]
    async fn failed_calls_do_not_meter() {
        let client = Arc::new(StubClient::new());
        client.push_error("connection reset");
        let gateway = stub_gateway(&client);

        assert!(gateway.complete_default("p", "s").await.is_err());
        assert_eq!(gateway.recorded().total(), 0);
    }

    #[tokio::test]
    async fn metered_clone_starts_from_zero() {
        let client = Arc::new(StubClient::new());
        client.push_text("hello");
        let gateway = stub_gateway(&client);
        gateway.complete_default("p", "s").await.unwrap();

        let scoped = gateway.metered();
        assert_eq!(scoped.recorded().total(), 0);
        assert!(gateway.recorded().total() > 0);
    }

    #[test]
    fn cost_follows_the_fixed_pricing_table() {
        let client = Arc::new(StubClient::new());
        let gateway = stub_gateway(&client);
        let usage = TokenUsage {
            input_tokens: 1_000_000,
            output_tokens: 2_000_000,
        };
        let cost = gateway.cost_usd(&usage);
        assert!((cost - (0.25 + 2.5)).abs() < 1e-9);
    }
}
