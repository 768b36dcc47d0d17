//! OpenAI vision backend — single-turn chat completion with an inline image.
//!
//! - Bearer auth header
//! - Image travels as a `data:` URI inside an `image_url` content part
//! - Model output at `choices[0].message.content`, sometimes code-fenced
//! - Token usage in `usage.prompt_tokens` / `usage.completion_tokens`

use super::prompts::{IDENTIFY_PROMPT, OPENAI_MAX_TOKENS};
use super::provider::{ProviderKind, RockIdentifier};
use super::response;
use super::transport::HttpTransport;
use super::types::{self, RockIdentification};
use crate::capture::CapturedImage;
use crate::error::{IdentifyError, Result};
use async_trait::async_trait;

const PROVIDER: &str = "openai";

/// GPT-4o pricing (as of 2025):
/// Input:  $2.50 per 1M tokens
/// Output: $10.00 per 1M tokens
const INPUT_COST_PER_MILLION: f64 = 2.50;
const OUTPUT_COST_PER_MILLION: f64 = 10.00;

pub struct OpenAiProvider {
    api_key: String,
    model: String,
    api_base: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: String, api_base: String) -> Self {
        Self {
            api_key,
            model,
            api_base,
        }
    }

    fn auth_headers(&self) -> Vec<(&'static str, String)> {
        vec![("authorization", format!("Bearer {}", self.api_key))]
    }

    /// Chat completion body for one image.
    pub fn build_request(&self, image: &CapturedImage) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": [
                {
                    "role": "user",
                    "content": [
                        {
                            "type": "text",
                            "text": IDENTIFY_PROMPT
                        },
                        {
                            "type": "image_url",
                            "image_url": { "url": image.data_uri() }
                        }
                    ]
                }
            ],
            "max_tokens": OPENAI_MAX_TOKENS
        })
    }
}

#[async_trait]
impl RockIdentifier for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    async fn identify(
        &self,
        image: &CapturedImage,
        transport: &dyn HttpTransport,
    ) -> Result<RockIdentification> {
        log::info!("[OPENAI] Model: {}", self.model);

        let url = format!("{}/v1/chat/completions", self.api_base);
        let body = self.build_request(image);

        let start = std::time::Instant::now();
        let resp = transport.post_json(&url, &self.auth_headers(), &body).await?;
        log::info!("[OPENAI] API latency: {}ms", start.elapsed().as_millis());

        response::ensure_success(PROVIDER, &resp)?;
        let json = response::parse_body(PROVIDER, &resp.body)?;

        if let Some(usage) = json.get("usage") {
            let input_tokens = usage["prompt_tokens"].as_u64().unwrap_or(0);
            let output_tokens = usage["completion_tokens"].as_u64().unwrap_or(0);
            log::info!("[OPENAI] Input tokens: {}", input_tokens);
            log::info!("[OPENAI] Output tokens: {}", output_tokens);
            let cost = (input_tokens as f64 * INPUT_COST_PER_MILLION
                + output_tokens as f64 * OUTPUT_COST_PER_MILLION)
                / 1_000_000.0;
            log::info!("[OPENAI] Estimated cost: ${:.6}", cost);
        }

        let text = response::openai_message_text(&json).ok_or_else(|| IdentifyError::Parse {
            provider: PROVIDER,
            message: "no choices[0].message.content in response".to_string(),
        })?;

        let result = types::parse_identification(PROVIDER, &response::strip_code_fences(text))?;
        log::info!(
            "[OPENAI] Identified {} ({}, {:.1}%)",
            result.name,
            result.rock_type,
            result.confidence
        );
        Ok(result)
    }

    async fn check(&self, transport: &dyn HttpTransport) -> Result<String> {
        let url = format!("{}/v1/models", self.api_base);
        let resp = transport.get(&url, &self.auth_headers()).await?;
        response::ensure_success(PROVIDER, &resp)?;
        Ok(format!("reachable, model {}", self.model))
    }
}
